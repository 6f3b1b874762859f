use std::{
    io::BufRead,
    sync::{
        mpsc::{self, Receiver, RecvTimeoutError, TryRecvError},
        Arc, Mutex,
    },
    thread,
    time::Duration,
};

use anyhow::{anyhow, Result};
use log::{debug, warn};

/// Lines typed on stdin, shared between the simulated button and terminal
/// provisioning.
///
/// One reader thread owns stdin for the life of the process and outlives
/// every device instance booted on it.
#[derive(Clone)]
pub struct Console {
    lines: Arc<Mutex<Receiver<String>>>,
}

impl Console {
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            for line in std::io::stdin().lock().lines() {
                match line {
                    Ok(line) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("Failed to read stdin: {}", e);
                        break;
                    }
                }
            }
            debug!("stdin closed");
        });
        Self::from_receiver(rx)
    }

    pub fn from_receiver(lines: Receiver<String>) -> Self {
        Self {
            lines: Arc::new(Mutex::new(lines)),
        }
    }

    /// A line if one is already waiting.
    pub fn try_line(&self) -> Option<String> {
        let lines = self.lines.lock().ok()?;
        match lines.try_recv() {
            Ok(line) => Some(line),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Wait up to `timeout` for a line. Errors once stdin has closed.
    pub fn read_line(&self, timeout: Duration) -> Result<Option<String>> {
        let lines = self
            .lines
            .lock()
            .map_err(|_| anyhow!("console reader poisoned"))?;
        match lines.recv_timeout(timeout) {
            Ok(line) => Ok(Some(line)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(anyhow!("stdin closed")),
        }
    }
}
