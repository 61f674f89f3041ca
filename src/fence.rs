// Acquire fence ownership
//
// A fence is a sync_file fd that becomes readable once the
// producer is done writing the buffer. Exactly one owner closes it.
use crate::{Result, VaError};
use utils::fdwatch::FdWatch;
use utils::log;

use std::os::fd::{AsFd, AsRawFd, FromRawFd, IntoRawFd, OwnedFd, RawFd};
use std::time::Duration;

/// An exclusively owned acquire fence
///
/// This may be empty, meaning there is nothing to wait for. Dropping
/// it closes the fd. `take` moves the fd out and leaves this empty,
/// so it is never closed twice.
#[derive(Debug, Default)]
pub struct AcquireFence {
    af_fd: Option<OwnedFd>,
}

impl AcquireFence {
    /// An empty fence, already satisfied
    pub fn none() -> Self {
        Self { af_fd: None }
    }

    pub fn new(fd: OwnedFd) -> Self {
        Self { af_fd: Some(fd) }
    }

    /// Take ownership of a raw fence fd
    ///
    /// Values `<= 0` mean "no fence" and produce an empty fence.
    ///
    /// # Safety
    ///
    /// A positive `fd` must be an open fd that nothing else will close.
    pub unsafe fn from_raw_fd(fd: RawFd) -> Self {
        if fd <= 0 {
            return Self::none();
        }

        Self {
            af_fd: Some(OwnedFd::from_raw_fd(fd)),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.af_fd.is_some()
    }

    /// The raw value of the fence, -1 if empty
    pub fn as_raw_fd(&self) -> RawFd {
        self.af_fd.as_ref().map(|fd| fd.as_raw_fd()).unwrap_or(-1)
    }

    /// Move the fence out, leaving this one empty
    ///
    /// Taking from an empty fence returns another empty fence.
    pub fn take(&mut self) -> AcquireFence {
        AcquireFence {
            af_fd: self.af_fd.take(),
        }
    }

    /// Hand the fd to someone else, -1 if empty
    ///
    /// The caller becomes responsible for closing it.
    pub fn into_raw_fd(mut self) -> RawFd {
        self.af_fd.take().map(|fd| fd.into_raw_fd()).unwrap_or(-1)
    }

    pub fn into_owned_fd(mut self) -> Option<OwnedFd> {
        self.af_fd.take()
    }

    /// Close the fence now. Does nothing if empty.
    pub fn release(&mut self) {
        self.af_fd = None;
    }

    /// Store a new fence, closing the one we held
    pub fn replace(&mut self, fence: AcquireFence) {
        self.release();
        self.af_fd = fence.af_fd;
    }

    /// Block until the fence signals
    ///
    /// `timeout` of None waits forever. An empty fence returns
    /// immediately.
    pub fn wait(&self, timeout: Option<Duration>) -> Result<()> {
        let fd = match self.af_fd.as_ref() {
            Some(fd) => fd,
            None => return Ok(()),
        };

        let mut watch = FdWatch::new();
        watch.add_fd(fd.as_fd());

        match watch.wait_for_events(timeout.map(|t| t.as_millis() as usize))? {
            true => Ok(()),
            false => {
                log::error!("Timed out waiting on acquire fence {}", fd.as_raw_fd());
                Err(VaError::FENCE_TIMEOUT)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::AcquireFence;
    use nix::errno::Errno;
    use std::os::fd::OwnedFd;
    use std::time::Duration;

    /// Returns a fence plus the write end of its pipe. Writing to the
    /// write end fails with EPIPE once the fence has been closed.
    fn pipe_fence() -> (AcquireFence, OwnedFd) {
        let (rd, wr) = nix::unistd::pipe().unwrap();
        (AcquireFence::new(rd), wr)
    }

    fn is_closed(wr: &OwnedFd) -> bool {
        nix::unistd::write(wr, b"x") == Err(Errno::EPIPE)
    }

    #[test]
    fn replace_releases_old_fence_once() {
        let (mut fence, old_wr) = pipe_fence();
        let (new_fence, new_wr) = pipe_fence();
        let new_raw = new_fence.as_raw_fd();

        fence.replace(new_fence);
        assert!(is_closed(&old_wr));
        assert!(!is_closed(&new_wr));
        assert_eq!(fence.as_raw_fd(), new_raw);
    }

    #[test]
    fn release_closes_once() {
        let (mut fence, wr) = pipe_fence();
        fence.release();
        assert!(!fence.is_valid());
        assert!(is_closed(&wr));
        // Nothing left to close
        fence.release();
        assert_eq!(fence.as_raw_fd(), -1);
    }

    #[test]
    fn take_leaves_empty() {
        let (mut fence, wr) = pipe_fence();
        let taken = fence.take();

        assert!(!fence.is_valid());
        assert_eq!(fence.as_raw_fd(), -1);
        assert!(taken.is_valid());
        // the taken fence still owns the fd
        assert!(!is_closed(&wr));
        drop(taken);
        assert!(is_closed(&wr));
    }

    #[test]
    fn empty_fence_is_a_noop() {
        let mut fence = AcquireFence::none();
        let taken = fence.take();
        assert!(!taken.is_valid());
        assert_eq!(taken.into_raw_fd(), -1);

        fence.release();
        fence.release();
        assert!(!fence.is_valid());
        assert!(fence.wait(Some(Duration::from_millis(0))).is_ok());
    }

    #[test]
    fn non_positive_raw_values_are_empty() {
        let zero = unsafe { AcquireFence::from_raw_fd(0) };
        let neg = unsafe { AcquireFence::from_raw_fd(-1) };
        assert!(!zero.is_valid());
        assert!(!neg.is_valid());
    }

    #[test]
    fn wait_times_out_until_signaled() {
        let (fence, wr) = pipe_fence();
        assert!(fence.wait(Some(Duration::from_millis(5))).is_err());

        nix::unistd::write(&wr, b"x").unwrap();
        assert!(fence.wait(None).is_ok());
    }
}
