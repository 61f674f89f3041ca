// Helper class for watching file descriptors
//
// This is used to block on sync_file fences, which become
// readable once they are signaled.
extern crate nix;

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};

use std::os::fd::{AsRawFd, BorrowedFd, RawFd};

// A file descriptor watcher
//
// The watcher only borrows the fds, the caller keeps
// ownership and is in charge of closing them.
pub struct FdWatch<'a> {
    // fds to watch for readability
    fdw_fds: Vec<BorrowedFd<'a>>,
    // which fds were readable after the last wait
    fdw_ready: Vec<bool>,
}

impl<'a> FdWatch<'a> {
    pub fn new() -> FdWatch<'a> {
        FdWatch {
            fdw_fds: Vec::new(),
            fdw_ready: Vec::new(),
        }
    }

    pub fn add_fd(&mut self, fd: BorrowedFd<'a>) {
        self.fdw_fds.push(fd);
        self.fdw_ready.push(false);
    }

    /// Was this fd readable after the last call to `wait_for_events`
    pub fn is_ready(&self, fd: RawFd) -> bool {
        self.fdw_fds
            .iter()
            .position(|f| f.as_raw_fd() == fd)
            .map(|i| self.fdw_ready[i])
            .unwrap_or(false)
    }

    // timeout in ms, None blocks forever
    // returns true if something is ready to be read
    pub fn wait_for_events(&mut self, timeout: Option<usize>) -> nix::Result<bool> {
        let timeout = match timeout {
            Some(ms) => {
                PollTimeout::try_from(ms.min(i32::MAX as usize) as i32).unwrap_or(PollTimeout::MAX)
            }
            None => PollTimeout::NONE,
        };

        let mut pollfds: Vec<PollFd> = self
            .fdw_fds
            .iter()
            .map(|fd| PollFd::new(*fd, PollFlags::POLLIN))
            .collect();

        let count = loop {
            match poll(pollfds.as_mut_slice(), timeout) {
                Ok(count) => break count,
                // interrupted by a signal, try again
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(e),
            }
        };

        for (ready, pfd) in self.fdw_ready.iter_mut().zip(pollfds.iter()) {
            *ready = pfd
                .revents()
                .map(|ev| ev.intersects(PollFlags::POLLIN))
                .unwrap_or(false);
        }

        Ok(count > 0)
    }
}
