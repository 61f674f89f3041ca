// The VA render worker
//
// A dedicated thread that owns the VaRenderer for one device. The
// display thread hands it a batch of (layer, surface) pairs, keeps
// going, and later blocks in wait_for_idle before it flips.
//
// There is a single batch slot. Submitting swaps the caller's lists
// with the worker's, so the caller gets the previous (finished)
// batch back.
use crate::layer::LayerState;
use crate::surface::OutputSurface;
use crate::va::{VaDriver, VaRenderer};
use crate::{Result, VaError};
use utils::event::Event;
use utils::log;
use utils::timing::StopWatch;

use std::mem;
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Opens the VA driver for a device fd
///
/// This is called lazily on the worker thread, the first time a batch
/// is run. The fd is the worker's own copy of the device and outlives
/// the driver.
pub type DriverFactory<D> = Box<dyn FnMut(BorrowedFd<'_>) -> Result<D> + Send>;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WorkerState {
    /// Nothing pending, the last batch (if any) is finished
    Idle,
    /// A batch was submitted but the worker has not picked it up
    Queued,
    /// The worker is drawing a batch
    Running,
    /// The thread is gone, either shut down or never started
    Exited,
}

/// Parameters for RenderWorker creation
#[derive(Debug, Clone)]
pub struct WorkerCreateInfo {
    pub thread_name: String,
    /// nice value for the worker thread
    pub thread_priority: Option<i32>,
    /// How long to wait on each layer's acquire fence, None waits forever
    pub fence_timeout: Option<Duration>,
}

impl Default for WorkerCreateInfo {
    fn default() -> Self {
        Self {
            thread_name: "VARenderThread".to_string(),
            thread_priority: Some(-8),
            fence_timeout: None,
        }
    }
}

impl WorkerCreateInfo {
    pub fn builder() -> WorkerCreateInfoBuilder {
        WorkerCreateInfoBuilder {
            ci: WorkerCreateInfo::default(),
        }
    }
}

/// Implements the builder pattern for easier worker creation
pub struct WorkerCreateInfoBuilder {
    ci: WorkerCreateInfo,
}

impl WorkerCreateInfoBuilder {
    pub fn thread_name(mut self, name: &str) -> Self {
        self.ci.thread_name = name.to_string();
        self
    }

    pub fn thread_priority(mut self, priority: Option<i32>) -> Self {
        self.ci.thread_priority = priority;
        self
    }

    pub fn fence_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.ci.fence_timeout = timeout;
        self
    }

    pub fn build(self) -> WorkerCreateInfo {
        self.ci
    }
}

/// State shared between the display thread and the worker
///
/// Only one side touches the batch at a time: the display thread while
/// Idle, the worker while Running.
struct WorkerInner {
    wi_state: WorkerState,
    wi_layers: Vec<LayerState>,
    wi_surfaces: Vec<OutputSurface>,
    wi_exit: bool,
}

struct WorkerShared {
    ws_inner: Mutex<WorkerInner>,
    /// Wakes the worker when a batch is queued or on exit
    ws_wake: Condvar,
    /// Signaled when a batch is done
    ws_done: Event,
}

pub struct RenderWorker<D: VaDriver + 'static> {
    rw_info: WorkerCreateInfo,
    rw_shared: Arc<WorkerShared>,
    /// Handed to the thread when it starts
    rw_factory: Option<DriverFactory<D>>,
    rw_thread: Option<JoinHandle<()>>,
}

/// Lower (or raise) the nice value of the calling thread
fn set_thread_priority(priority: i32) {
    let ret = unsafe {
        let tid = libc::syscall(libc::SYS_gettid) as libc::id_t;
        libc::setpriority(libc::PRIO_PROCESS, tid, priority)
    };

    if ret != 0 {
        log::error!(
            "Could not set render thread priority to {}: {}",
            priority,
            nix::errno::Errno::last()
        );
    }
}

/// Draw one batch
///
/// The renderer is created on first use. If that fails the batch is
/// dropped. Otherwise pairs are drawn in order and the first failure
/// ends the batch.
fn run_batch<D: VaDriver>(
    renderer: &mut Option<VaRenderer<D>>,
    factory: &mut DriverFactory<D>,
    gpu_fd: BorrowedFd<'_>,
    fence_timeout: Option<Duration>,
    layers: &mut [LayerState],
    surfaces: &[OutputSurface],
) {
    if renderer.is_none() {
        match factory(gpu_fd) {
            Ok(drv) => *renderer = Some(VaRenderer::new(drv)),
            Err(e) => {
                log::error!("Failed to initialize VARenderer: {}", e);
                return;
            }
        }
    }
    let renderer = match renderer.as_ref() {
        Some(r) => r,
        None => return,
    };

    if layers.len() != surfaces.len() {
        log::error!(
            "Batch has {} layers but {} surfaces, drawing the first {}",
            layers.len(),
            surfaces.len(),
            layers.len().min(surfaces.len())
        );
    }

    let count = layers.len();
    for (i, (layer, surface)) in layers.iter_mut().zip(surfaces.iter()).enumerate() {
        // The wait takes ownership of the fence, it is closed once done
        let fence = layer.take_acquire_fence();
        if let Err(e) = fence.wait(fence_timeout) {
            log::error!("Acquire fence wait failed for layer {}: {}", i, e);
        }
        drop(fence);

        if let Err(e) = renderer.draw(layer, surface) {
            log::error!(
                "Failed to render the frame by VA, pair {} of {}, error: {}",
                i,
                count,
                e
            );
            break;
        }
    }
}

/// The worker thread's main loop
fn worker_thread<D: VaDriver>(
    shared: Arc<WorkerShared>,
    mut factory: DriverFactory<D>,
    gpu_fd: OwnedFd,
    info: WorkerCreateInfo,
) {
    if let Some(priority) = info.thread_priority {
        set_thread_priority(priority);
    }

    let mut renderer: Option<VaRenderer<D>> = None;

    loop {
        let (mut layers, surfaces) = {
            let mut inner = shared.ws_inner.lock().unwrap();
            while inner.wi_state != WorkerState::Queued && !inner.wi_exit {
                inner = shared.ws_wake.wait(inner).unwrap();
            }
            if inner.wi_exit {
                break;
            }

            inner.wi_state = WorkerState::Running;
            (
                mem::take(&mut inner.wi_layers),
                mem::take(&mut inner.wi_surfaces),
            )
        };

        let watch = StopWatch::new();
        run_batch(
            &mut renderer,
            &mut factory,
            gpu_fd.as_fd(),
            info.fence_timeout,
            layers.as_mut_slice(),
            surfaces.as_slice(),
        );
        log::profiling!(
            "VA batch of {} layers took {} ms",
            layers.len(),
            watch.elapsed_millis()
        );

        // Signal while holding the lock so that a submit can't slip
        // in between going Idle and the signal
        let mut inner = shared.ws_inner.lock().unwrap();
        inner.wi_layers = layers;
        inner.wi_surfaces = surfaces;
        inner.wi_state = WorkerState::Idle;
        shared.ws_done.signal();
    }

    log::debug!("VA render thread exiting");
    // The driver must be gone before the device fd is closed
    drop(renderer);
    drop(gpu_fd);
}

impl<D: VaDriver + 'static> RenderWorker<D> {
    /// Create a worker. No thread is started until `initialize`.
    pub fn new(info: WorkerCreateInfo, factory: DriverFactory<D>) -> Self {
        Self {
            rw_info: info,
            rw_shared: Arc::new(WorkerShared {
                ws_inner: Mutex::new(WorkerInner {
                    wi_state: WorkerState::Idle,
                    wi_layers: Vec::new(),
                    wi_surfaces: Vec::new(),
                    wi_exit: false,
                }),
                ws_wake: Condvar::new(),
                ws_done: Event::new(),
            }),
            rw_factory: Some(factory),
            rw_thread: None,
        }
    }

    /// Bind to a device and start the worker thread
    ///
    /// The worker keeps its own dup of `gpu_fd`. The driver itself is
    /// opened lazily by the thread. If the thread
    /// can't be started the worker is left Exited and every submit
    /// will be refused.
    pub fn initialize(&mut self, gpu_fd: BorrowedFd<'_>) -> Result<()> {
        if self.rw_thread.is_some() {
            log::debug!("VA render thread already running");
            return Ok(());
        }

        let factory = match self.rw_factory.take() {
            Some(f) => f,
            None => {
                log::error!("VA render worker can not be restarted");
                return Err(VaError::NOT_RUNNING);
            }
        };

        let gpu_fd = match gpu_fd.try_clone_to_owned() {
            Ok(fd) => fd,
            Err(e) => {
                log::error!("Could not dup the device fd for VARenderThread: {}", e);
                self.rw_factory = Some(factory);
                return Err(VaError::IO(e));
            }
        };

        let shared = self.rw_shared.clone();
        let info = self.rw_info.clone();
        let spawned = thread::Builder::new()
            .name(self.rw_info.thread_name.clone())
            .spawn(move || worker_thread(shared, factory, gpu_fd, info));

        match spawned {
            Ok(handle) => {
                self.rw_thread = Some(handle);
                Ok(())
            }
            Err(e) => {
                log::error!("Failed to initialize VARenderThread: {}", e);
                self.rw_shared.ws_inner.lock().unwrap().wi_state = WorkerState::Exited;
                Err(VaError::IO(e))
            }
        }
    }

    pub fn state(&self) -> WorkerState {
        self.rw_shared.ws_inner.lock().unwrap().wi_state
    }

    /// Hand a batch to the worker
    ///
    /// The lists are swapped with the worker's: on return they hold
    /// the previous batch. This does not wait for the worker. Only one
    /// batch can be in flight, submitting while one is queued or
    /// running fails with WORKER_BUSY and leaves the lists alone.
    pub fn submit(
        &self,
        layers: &mut Vec<LayerState>,
        surfaces: &mut Vec<OutputSurface>,
    ) -> Result<()> {
        if self.rw_thread.is_none() {
            return Err(VaError::NOT_RUNNING);
        }

        let mut inner = self.rw_shared.ws_inner.lock().unwrap();
        match inner.wi_state {
            WorkerState::Idle => {}
            WorkerState::Queued | WorkerState::Running => return Err(VaError::WORKER_BUSY),
            WorkerState::Exited => return Err(VaError::NOT_RUNNING),
        }

        mem::swap(&mut inner.wi_layers, layers);
        mem::swap(&mut inner.wi_surfaces, surfaces);
        inner.wi_state = WorkerState::Queued;
        // Drop any completion left over from a batch nobody waited on
        self.rw_shared.ws_done.reset();
        self.rw_shared.ws_wake.notify_all();

        Ok(())
    }

    /// Block until the submitted batch is finished
    ///
    /// There is no timeout. This consumes the completion so the next
    /// call blocks again. Returns immediately if nothing is in flight
    /// or the thread is not running.
    pub fn wait_for_idle(&self) {
        {
            let inner = self.rw_shared.ws_inner.lock().unwrap();
            if self.rw_thread.is_none() || inner.wi_state == WorkerState::Exited {
                log::debug!("wait_for_idle called without a running VA render thread");
                return;
            }
            if inner.wi_state == WorkerState::Idle && !self.rw_shared.ws_done.is_signaled() {
                return;
            }
        }

        self.rw_shared.ws_done.wait();
    }

    /// Take the finished batch back without submitting a new one
    pub fn reclaim(&self) -> Result<(Vec<LayerState>, Vec<OutputSurface>)> {
        let mut inner = self.rw_shared.ws_inner.lock().unwrap();
        match inner.wi_state {
            WorkerState::Queued | WorkerState::Running => Err(VaError::WORKER_BUSY),
            _ => Ok((
                mem::take(&mut inner.wi_layers),
                mem::take(&mut inner.wi_surfaces),
            )),
        }
    }

    /// Stop the thread and drop the renderer and the held batch
    ///
    /// A batch that is already running is allowed to finish, a queued
    /// one is never started.
    pub fn shutdown(&mut self) {
        if let Some(handle) = self.rw_thread.take() {
            self.rw_shared.ws_inner.lock().unwrap().wi_exit = true;
            self.rw_shared.ws_wake.notify_all();

            if handle.join().is_err() {
                log::error!("VA render thread panicked");
            }
        }

        let mut inner = self.rw_shared.ws_inner.lock().unwrap();
        inner.wi_state = WorkerState::Exited;
        inner.wi_layers.clear();
        inner.wi_surfaces.clear();
    }
}

impl<D: VaDriver + 'static> Drop for RenderWorker<D> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
