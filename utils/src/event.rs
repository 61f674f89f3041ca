// A resettable event for handing completion between threads
//
// One side signals, the other blocks until signaled. Waiting
// consumes the signal so the next wait blocks again.
use std::sync::{Condvar, Mutex};

#[derive(Debug, Default)]
pub struct Event {
    ev_signaled: Mutex<bool>,
    ev_cond: Condvar,
}

impl Event {
    pub fn new() -> Self {
        Self {
            ev_signaled: Mutex::new(false),
            ev_cond: Condvar::new(),
        }
    }

    /// Mark the event as signaled and wake any waiters
    pub fn signal(&self) {
        let mut signaled = self.ev_signaled.lock().unwrap();
        *signaled = true;
        self.ev_cond.notify_all();
    }

    /// Block until the event is signaled, then clear it
    pub fn wait(&self) {
        let mut signaled = self.ev_signaled.lock().unwrap();
        while !*signaled {
            signaled = self.ev_cond.wait(signaled).unwrap();
        }
        *signaled = false;
    }

    /// Clear the event without waiting on it
    pub fn reset(&self) {
        *self.ev_signaled.lock().unwrap() = false;
    }

    pub fn is_signaled(&self) -> bool {
        *self.ev_signaled.lock().unwrap()
    }
}
