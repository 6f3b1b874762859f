use std::{thread, time::Duration, time::Instant};

use alert_core::hardware::{Clock, Restart};
use log::info;

/// Milliseconds since the runner started.
#[derive(Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn sleep_ms(&self, ms: u64) {
        thread::sleep(Duration::from_millis(ms));
    }
}

/// The runner's main loop boots a fresh device whenever the old one halts,
/// so a restart request only needs to be acknowledged.
pub struct HostRestart;

impl Restart for HostRestart {
    fn restart(&mut self) {
        info!("Restart requested, rebooting device");
    }
}
