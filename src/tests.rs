/// Vapor tests
///
/// These run against StubDriver, which stands in for the VA hardware
/// and records every call made through it.
use crate as va;
use crate::va::{
    BufferId, ColorStandard, ConfigId, ContextId, ExternalBuffer, PipelineParams, SurfaceId,
    VaRect, VaResult,
};
use crate::format::{DRM_FORMAT_AYUV, DRM_FORMAT_NV12};
use crate::transform::{VA_MIRROR_NONE, VA_ROTATION_90, VA_ROTATION_NONE};
use nix::errno::Errno;

use std::cell::Cell;
use std::fs::File;
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Everything a StubDriver saw
#[derive(Clone, Default)]
struct StubLog {
    calls: Arc<Mutex<Vec<String>>>,
    params: Arc<Mutex<Vec<PipelineParams>>>,
}

impl StubLog {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Call names only, without their arguments
    fn names(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|c| c.split(' ').next().unwrap().to_string())
            .collect()
    }

    fn count(&self, name: &str) -> usize {
        self.names().iter().filter(|n| *n == name).count()
    }

    fn params(&self) -> Vec<PipelineParams> {
        self.params.lock().unwrap().clone()
    }
}

struct StubDriver {
    sd_log: StubLog,
    /// This call always fails
    sd_fail_step: Option<&'static str>,
    /// begin_picture of this draw (1-based) fails
    sd_fail_draw: Option<usize>,
    /// create_surface call (1-based) that fails, 2 is the output
    sd_fail_surface: Option<usize>,
    /// Import zero fourccs instead of refusing them
    sd_accept_any_format: bool,
    sd_draws: Cell<usize>,
    sd_surfaces: Cell<usize>,
    sd_next_id: Cell<u32>,
}

impl StubDriver {
    fn new(log: &StubLog) -> Self {
        Self {
            sd_log: log.clone(),
            sd_fail_step: None,
            sd_fail_draw: None,
            sd_fail_surface: None,
            sd_accept_any_format: false,
            sd_draws: Cell::new(0),
            sd_surfaces: Cell::new(0),
            sd_next_id: Cell::new(1),
        }
    }

    fn failing_at(log: &StubLog, step: &'static str) -> Self {
        let mut drv = Self::new(log);
        drv.sd_fail_step = Some(step);
        drv
    }

    fn record(&self, call: String) {
        self.sd_log.calls.lock().unwrap().push(call);
    }

    fn check(&self, step: &str) -> VaResult<()> {
        match self.sd_fail_step {
            Some(s) if s == step => Err(va::VaStatus::ERROR_OPERATION_FAILED),
            _ => Ok(()),
        }
    }

    fn next_id(&self) -> u32 {
        let id = self.sd_next_id.get();
        self.sd_next_id.set(id + 1);
        id
    }
}

impl va::VaDriver for StubDriver {
    fn create_surface(&self, rt_format: u32, external: &ExternalBuffer<'_>) -> VaResult<SurfaceId> {
        self.record(format!(
            "create_surface {}x{} rt={}",
            external.eb_width, external.eb_height, rt_format
        ));
        self.check("create_surface")?;
        let import = self.sd_surfaces.get() + 1;
        self.sd_surfaces.set(import);
        if self.sd_fail_surface == Some(import) {
            return Err(va::VaStatus::ERROR_ALLOCATION_FAILED);
        }
        if external.eb_pixel_format == 0 && !self.sd_accept_any_format {
            return Err(va::VaStatus::ERROR_UNSUPPORTED_RT_FORMAT);
        }
        Ok(SurfaceId(self.next_id()))
    }

    fn destroy_surface(&self, surface: SurfaceId) {
        self.record(format!("destroy_surface {}", surface.0));
    }

    fn create_config(&self, rt_format: u32) -> VaResult<ConfigId> {
        self.record(format!("create_config rt={}", rt_format));
        self.check("create_config")?;
        Ok(ConfigId(self.next_id()))
    }

    fn destroy_config(&self, config: ConfigId) {
        self.record(format!("destroy_config {}", config.0));
    }

    fn create_context(
        &self,
        config: ConfigId,
        width: i32,
        height: i32,
        render_target: SurfaceId,
    ) -> VaResult<ContextId> {
        self.record(format!(
            "create_context {} {}x{} {}",
            config.0, width, height, render_target.0
        ));
        self.check("create_context")?;
        Ok(ContextId(self.next_id()))
    }

    fn destroy_context(&self, context: ContextId) {
        self.record(format!("destroy_context {}", context.0));
    }

    fn create_pipeline_buffer(
        &self,
        context: ContextId,
        params: &PipelineParams,
    ) -> VaResult<BufferId> {
        self.record(format!("create_pipeline_buffer {}", context.0));
        self.sd_log.params.lock().unwrap().push(*params);
        self.check("create_pipeline_buffer")?;
        Ok(BufferId(self.next_id()))
    }

    fn destroy_buffer(&self, buffer: BufferId) {
        self.record(format!("destroy_buffer {}", buffer.0));
    }

    fn begin_picture(&self, context: ContextId, render_target: SurfaceId) -> VaResult<()> {
        self.record(format!("begin_picture {} {}", context.0, render_target.0));
        let draw = self.sd_draws.get() + 1;
        self.sd_draws.set(draw);
        if self.sd_fail_draw == Some(draw) {
            return Err(va::VaStatus::ERROR_INVALID_CONTEXT);
        }
        self.check("begin_picture")
    }

    fn render_picture(&self, context: ContextId, buffer: BufferId) -> VaResult<()> {
        self.record(format!("render_picture {} {}", context.0, buffer.0));
        self.check("render_picture")
    }

    fn end_picture(&self, context: ContextId) -> VaResult<()> {
        self.record(format!("end_picture {}", context.0));
        self.check("end_picture")
    }

    fn sync_surface(&self, surface: SurfaceId) -> VaResult<()> {
        self.record(format!("sync_surface {}", surface.0));
        self.check("sync_surface")
    }
}

impl Drop for StubDriver {
    fn drop(&mut self) {
        self.record("terminate".to_string());
    }
}

fn dmabuf(width: u32, height: u32, format: u32) -> va::Dmabuf {
    let fd: OwnedFd = File::open("/dev/null").unwrap().into();
    let mut buf = va::Dmabuf::new(fd, width, height, format);
    buf.add_plane(va::DmabufPlane::new(0, width, 0));
    buf.add_plane(va::DmabufPlane::new(width * height, width, 0));
    buf
}

/// A 1080p NV12 layer shown at 720p
fn video_layer(index: u32) -> va::LayerState {
    let mut layer = va::LayerState::new();
    layer.set_layer_index(index);
    layer.set_buffer(dmabuf(1920, 1080, DRM_FORMAT_NV12), va::AcquireFence::none());
    layer.set_source_crop(va::Rect::new(0.0, 0.0, 1920.0, 1080.0));
    layer.set_display_frame(va::Rect::new(0, 0, 1280, 720));
    layer
}

fn output_surface() -> va::OutputSurface {
    va::OutputSurface::new(dmabuf(1280, 720, DRM_FORMAT_NV12))
}

fn pipe_fence() -> (va::AcquireFence, OwnedFd) {
    let (rd, wr) = nix::unistd::pipe().unwrap();
    (va::AcquireFence::new(rd), wr)
}

fn is_closed(wr: &OwnedFd) -> bool {
    nix::unistd::write(wr, b"x") == Err(Errno::EPIPE)
}

#[test]
fn draw_issues_full_sequence() {
    let log = StubLog::default();
    let renderer = va::VaRenderer::new(StubDriver::new(&log));

    assert!(renderer.draw(&video_layer(0), &output_surface()).is_ok());

    // ids: surface_in 1, surface_out 2, config 3, context 4, buffer 5
    assert_eq!(
        log.calls(),
        vec![
            "create_surface 1920x1080 rt=1",
            "create_surface 1280x720 rt=1",
            "create_config rt=1",
            "create_context 3 1280x720 2",
            "create_pipeline_buffer 4",
            "begin_picture 4 2",
            "render_picture 4 5",
            "end_picture 4",
            "sync_surface 2",
            "destroy_buffer 5",
            "destroy_context 4",
            "destroy_config 3",
            "destroy_surface 1",
            "destroy_surface 2",
        ]
    );

    let params = log.params();
    assert_eq!(params.len(), 1);
    assert_eq!(params[0].pp_surface, SurfaceId(1));
    assert_eq!(params[0].pp_surface_region, VaRect::new(0, 0, 1920, 1080));
    assert_eq!(params[0].pp_output_region, VaRect::new(0, 0, 1280, 720));
    assert_eq!(params[0].pp_surface_color_standard, ColorStandard::BT601);
    assert_eq!(params[0].pp_output_color_standard, ColorStandard::BT601);
    assert_eq!(params[0].pp_rotation, VA_ROTATION_NONE);
    assert_eq!(params[0].pp_mirror, VA_MIRROR_NONE);
}

#[test]
fn draw_fails_if_any_step_fails() {
    for step in [
        "create_surface",
        "create_config",
        "create_context",
        "create_pipeline_buffer",
        "begin_picture",
        "render_picture",
        "end_picture",
        "sync_surface",
    ] {
        let log = StubLog::default();
        let renderer = va::VaRenderer::new(StubDriver::failing_at(&log, step));

        assert!(!renderer.draw_ok(&video_layer(0), &output_surface()), "{}", step);

        // Nothing is skipped after the failure
        for name in ["begin_picture", "render_picture", "end_picture", "sync_surface"] {
            assert_eq!(log.count(name), 1, "{} after failing {}", name, step);
        }
        // Surfaces that were never imported are never destroyed
        let imported = match step {
            "create_surface" => 0,
            _ => 2,
        };
        assert_eq!(log.count("destroy_surface"), imported, "failing {}", step);
    }
}

#[test]
fn context_failure_still_releases_surfaces() {
    let log = StubLog::default();
    let renderer = va::VaRenderer::new(StubDriver::failing_at(&log, "create_context"));

    match renderer.draw(&video_layer(0), &output_surface()) {
        Err(va::VaError::VA_STATUS(s)) => assert_eq!(s, va::VaStatus::ERROR_OPERATION_FAILED.0),
        _ => panic!("draw should fail with a VA status"),
    }

    // The context was never created, so it is never destroyed
    assert_eq!(log.count("destroy_context"), 0);
    let calls = log.calls();
    let n = calls.len();
    assert_eq!(calls[n - 4], "destroy_buffer 4");
    assert_eq!(calls[n - 3], "destroy_config 3");
    assert_eq!(calls[n - 2], "destroy_surface 1");
    assert_eq!(calls[n - 1], "destroy_surface 2");
}

#[test]
fn unsupported_input_format() {
    let log = StubLog::default();
    let renderer = va::VaRenderer::new(StubDriver::new(&log));

    let mut layer = video_layer(0);
    layer.set_buffer(dmabuf(1920, 1080, DRM_FORMAT_AYUV), va::AcquireFence::none());

    assert!(matches!(
        renderer.draw(&layer, &output_surface()),
        Err(va::VaError::UNSUPPORTED_FORMAT(DRM_FORMAT_AYUV))
    ));
    // The input surface was refused, only the output is released
    assert_eq!(log.calls().first().unwrap(), "create_surface 1920x1080 rt=0");
    assert_eq!(log.count("destroy_surface"), 1);
    assert_eq!(log.count("sync_surface"), 1);
}

#[test]
fn output_import_failure() {
    let log = StubLog::default();
    let mut drv = StubDriver::new(&log);
    drv.sd_fail_surface = Some(2);
    let renderer = va::VaRenderer::new(drv);

    match renderer.draw(&video_layer(0), &output_surface()) {
        Err(va::VaError::VA_STATUS(s)) => assert_eq!(s, va::VaStatus::ERROR_ALLOCATION_FAILED.0),
        _ => panic!("draw should fail with a VA status"),
    }
    // Only the input was imported
    assert_eq!(log.count("destroy_surface"), 1);
    assert!(log.calls().contains(&"destroy_surface 1".to_string()));
    assert_eq!(log.count("sync_surface"), 1);
}

#[test]
fn unsupported_format_fails_even_if_driver_accepts_it() {
    let log = StubLog::default();
    let mut drv = StubDriver::new(&log);
    drv.sd_accept_any_format = true;
    let renderer = va::VaRenderer::new(drv);

    let mut layer = video_layer(0);
    layer.set_buffer(dmabuf(1920, 1080, DRM_FORMAT_AYUV), va::AcquireFence::none());

    assert!(matches!(
        renderer.draw(&layer, &output_surface()),
        Err(va::VaError::UNSUPPORTED_FORMAT(DRM_FORMAT_AYUV))
    ));
    // Every call still went through and everything was released
    assert_eq!(log.count("sync_surface"), 1);
    assert_eq!(log.count("destroy_surface"), 2);
    assert_eq!(log.count("destroy_buffer"), 1);
}

#[test]
fn draw_without_buffer_touches_nothing() {
    let log = StubLog::default();
    let renderer = va::VaRenderer::new(StubDriver::new(&log));

    let mut layer = video_layer(0);
    layer.reset_buffer();

    assert!(matches!(
        renderer.draw(&layer, &output_surface()),
        Err(va::VaError::NO_BUFFER)
    ));
    assert!(log.calls().is_empty());
}

#[test]
fn draw_applies_layer_rotation() {
    let log = StubLog::default();
    let renderer = va::VaRenderer::new(StubDriver::new(&log));

    let mut layer = video_layer(0);
    layer.set_transform(va::Transform::ROTATE_90);
    assert!(renderer.draw_ok(&layer, &output_surface()));

    assert_eq!(log.params()[0].pp_rotation, VA_ROTATION_90);
}

#[test]
fn draw_crop_is_origin_anchored() {
    let log = StubLog::default();
    let renderer = va::VaRenderer::new(StubDriver::new(&log));

    let mut layer = video_layer(0);
    layer.set_source_crop(va::Rect::new(100.0, 50.0, 740.0, 530.0));
    assert!(renderer.draw_ok(&layer, &output_surface()));

    assert_eq!(
        log.params()[0].pp_surface_region,
        VaRect::new(0, 0, 640, 480)
    );
}

// ------------------------- worker ---------------------------

/// Stands in for the GPU render node
fn device() -> File {
    File::open("/dev/null").unwrap()
}

fn worker_info() -> va::WorkerCreateInfo {
    // Tests may not be allowed to raise priority
    va::WorkerCreateInfo::builder()
        .thread_name("VATestThread")
        .thread_priority(None)
        .build()
}

fn stub_worker(log: &StubLog, fail_draw: Option<usize>) -> va::RenderWorker<StubDriver> {
    let log = log.clone();
    va::RenderWorker::new(
        worker_info(),
        Box::new(move |_fd: BorrowedFd<'_>| {
            let mut drv = StubDriver::new(&log);
            drv.sd_fail_draw = fail_draw;
            Ok(drv)
        }),
    )
}

fn batch(count: u32) -> (Vec<va::LayerState>, Vec<va::OutputSurface>) {
    (
        (0..count).map(video_layer).collect(),
        (0..count).map(|_| output_surface()).collect(),
    )
}

#[test]
fn worker_create_info_defaults() {
    let info = va::WorkerCreateInfo::builder().build();
    assert_eq!(info.thread_name, "VARenderThread");
    assert_eq!(info.thread_priority, Some(-8));
    assert_eq!(info.fence_timeout, None);
}

#[test]
fn worker_runs_batch() {
    let log = StubLog::default();
    let mut worker = stub_worker(&log, None);
    worker.initialize(device().as_fd()).unwrap();
    assert_eq!(worker.state(), va::WorkerState::Idle);

    let (mut layers, mut surfaces) = batch(3);
    worker.submit(&mut layers, &mut surfaces).unwrap();
    worker.wait_for_idle();

    assert_eq!(worker.state(), va::WorkerState::Idle);
    assert_eq!(log.count("sync_surface"), 3);
    assert_eq!(log.count("destroy_surface"), 6);
}

#[test]
fn worker_stops_batch_at_first_failure() {
    let log = StubLog::default();
    let mut worker = stub_worker(&log, Some(2));
    worker.initialize(device().as_fd()).unwrap();

    let (mut layers, mut surfaces) = batch(3);
    worker.submit(&mut layers, &mut surfaces).unwrap();
    // Completion is signaled even though the batch failed
    worker.wait_for_idle();

    // Pairs 1 and 2 were attempted, 3 never was
    assert_eq!(log.count("begin_picture"), 2);
    assert_eq!(log.count("create_surface"), 4);
    assert_eq!(worker.state(), va::WorkerState::Idle);
}

#[test]
fn worker_abandons_batch_without_renderer() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let attempts_thread = attempts.clone();
    let mut worker: va::RenderWorker<StubDriver> = va::RenderWorker::new(
        worker_info(),
        Box::new(move |_fd: BorrowedFd<'_>| {
            attempts_thread.fetch_add(1, Ordering::SeqCst);
            Err(va::VaError::INVALID_DISPLAY)
        }),
    );
    worker.initialize(device().as_fd()).unwrap();

    let (mut layers, mut surfaces) = batch(2);
    worker.submit(&mut layers, &mut surfaces).unwrap();
    worker.wait_for_idle();
    assert_eq!(attempts.load(Ordering::SeqCst), 1);

    // Creation is retried for the next batch
    let (mut layers, mut surfaces) = batch(1);
    worker.submit(&mut layers, &mut surfaces).unwrap();
    worker.wait_for_idle();
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[test]
fn submit_swaps_previous_batch_back() {
    let log = StubLog::default();
    let mut worker = stub_worker(&log, None);
    worker.initialize(device().as_fd()).unwrap();

    let (mut layers, mut surfaces) = batch(2);
    worker.submit(&mut layers, &mut surfaces).unwrap();
    assert!(layers.is_empty());
    assert!(surfaces.is_empty());
    worker.wait_for_idle();

    let mut layers = vec![video_layer(9)];
    let mut surfaces = vec![output_surface()];
    worker.submit(&mut layers, &mut surfaces).unwrap();
    worker.wait_for_idle();

    assert_eq!(layers.len(), 2);
    assert_eq!(surfaces.len(), 2);
    assert_eq!(layers[1].layer_index(), 1);

    let (layers, surfaces) = worker.reclaim().unwrap();
    assert_eq!(layers.len(), 1);
    assert_eq!(surfaces.len(), 1);
    assert_eq!(layers[0].layer_index(), 9);
}

#[test]
fn submit_while_busy_is_refused() {
    let log = StubLog::default();
    let mut worker = stub_worker(&log, None);
    worker.initialize(device().as_fd()).unwrap();

    // The worker blocks on this fence until we signal it
    let (fence, wr) = pipe_fence();
    let mut layer = video_layer(0);
    layer.set_acquire_fence(fence);
    let mut layers = vec![layer];
    let mut surfaces = vec![output_surface()];
    worker.submit(&mut layers, &mut surfaces).unwrap();

    let (mut layers, mut surfaces) = batch(1);
    assert!(matches!(
        worker.submit(&mut layers, &mut surfaces),
        Err(va::VaError::WORKER_BUSY)
    ));
    assert!(matches!(worker.reclaim(), Err(va::VaError::WORKER_BUSY)));
    // A refused submit leaves the lists alone
    assert_eq!(layers.len(), 1);
    assert_eq!(log.count("begin_picture"), 0);

    nix::unistd::write(&wr, b"x").unwrap();
    worker.wait_for_idle();

    assert_eq!(log.count("begin_picture"), 1);
    // The worker took the fence and closed it after waiting
    assert!(is_closed(&wr));
    let (layers, _) = worker.reclaim().unwrap();
    assert_eq!(layers[0].acquire_fence(), -1);
}

#[test]
fn fence_timeout_still_draws() {
    let log = StubLog::default();
    let log_thread = log.clone();
    let info = va::WorkerCreateInfo::builder()
        .thread_priority(None)
        .fence_timeout(Some(Duration::from_millis(10)))
        .build();
    let mut worker = va::RenderWorker::new(
        info,
        Box::new(move |_fd: BorrowedFd<'_>| Ok(StubDriver::new(&log_thread))),
    );
    worker.initialize(device().as_fd()).unwrap();

    let (fence, wr) = pipe_fence();
    let mut layer = video_layer(0);
    layer.set_acquire_fence(fence);
    let mut layers = vec![layer];
    let mut surfaces = vec![output_surface()];
    worker.submit(&mut layers, &mut surfaces).unwrap();
    worker.wait_for_idle();

    assert_eq!(log.count("sync_surface"), 1);
    assert!(is_closed(&wr));
}

#[test]
fn worker_keeps_its_own_device_fd() {
    let log = StubLog::default();
    let log_thread = log.clone();
    let device_open = Arc::new(Mutex::new(None));
    let device_open_thread = device_open.clone();
    let mut worker = va::RenderWorker::new(
        worker_info(),
        Box::new(move |fd: BorrowedFd<'_>| {
            *device_open_thread.lock().unwrap() = Some(fd.try_clone_to_owned().is_ok());
            Ok(StubDriver::new(&log_thread))
        }),
    );

    // The caller's fd is closed before the driver is ever opened
    let dev = device();
    worker.initialize(dev.as_fd()).unwrap();
    drop(dev);

    let (mut layers, mut surfaces) = batch(1);
    worker.submit(&mut layers, &mut surfaces).unwrap();
    worker.wait_for_idle();

    assert_eq!(*device_open.lock().unwrap(), Some(true));
    assert_eq!(log.count("sync_surface"), 1);
}

#[test]
fn worker_not_running() {
    let log = StubLog::default();
    let mut worker = stub_worker(&log, None);

    let (mut layers, mut surfaces) = batch(1);
    assert!(matches!(
        worker.submit(&mut layers, &mut surfaces),
        Err(va::VaError::NOT_RUNNING)
    ));
    // Returns right away
    worker.wait_for_idle();

    worker.initialize(device().as_fd()).unwrap();
    // Nothing in flight, nothing to wait for
    worker.wait_for_idle();
    worker.submit(&mut layers, &mut surfaces).unwrap();
    worker.wait_for_idle();
    assert_eq!(log.count("sync_surface"), 1);
}

#[test]
fn shutdown_releases_renderer() {
    let log = StubLog::default();
    let mut worker = stub_worker(&log, None);
    worker.initialize(device().as_fd()).unwrap();

    let (mut layers, mut surfaces) = batch(1);
    worker.submit(&mut layers, &mut surfaces).unwrap();
    worker.wait_for_idle();

    worker.shutdown();
    assert_eq!(worker.state(), va::WorkerState::Exited);
    assert_eq!(log.calls().last().unwrap(), "terminate");

    let (mut layers, mut surfaces) = batch(1);
    assert!(matches!(
        worker.submit(&mut layers, &mut surfaces),
        Err(va::VaError::NOT_RUNNING)
    ));
    worker.wait_for_idle();
    // Shutting down twice is harmless
    worker.shutdown();
}

#[test]
fn drop_joins_worker() {
    let log = StubLog::default();
    {
        let mut worker = stub_worker(&log, None);
        worker.initialize(device().as_fd()).unwrap();
        let (mut layers, mut surfaces) = batch(1);
        worker.submit(&mut layers, &mut surfaces).unwrap();
        worker.wait_for_idle();
    }
    assert_eq!(log.count("terminate"), 1);
}
