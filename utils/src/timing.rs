// Timing helpers for logging and profiling
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Milliseconds since the unix epoch
///
/// Used to timestamp log lines
pub fn get_current_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// A simple stopwatch for profiling a section of work
#[derive(Debug)]
pub struct StopWatch {
    sw_start: Instant,
}

impl StopWatch {
    pub fn new() -> Self {
        Self {
            sw_start: Instant::now(),
        }
    }

    /// Time since the watch was started
    pub fn elapsed(&self) -> Duration {
        self.sw_start.elapsed()
    }

    pub fn elapsed_millis(&self) -> u128 {
        self.elapsed().as_millis()
    }
}
