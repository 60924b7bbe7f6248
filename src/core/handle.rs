//! Ownership of a spawned launcher process

use crate::config::EXIT_POLL_INTERVAL;
use std::io;
use std::process::{Child, ExitStatus};
use std::thread;
use std::time::{Duration, Instant};

/// Exclusive handle on the OS process created by a launch.
///
/// Dropping the handle releases it without killing the process.
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
    pid: u32,
    status: Option<ExitStatus>,
}

impl ProcessHandle {
    pub fn new(child: Child) -> Self {
        let pid = child.id();
        Self {
            child,
            pid,
            status: None,
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Non-blocking liveness poll; reaps the process once it has exited
    pub fn poll(&mut self) -> Option<ExitStatus> {
        if self.status.is_some() {
            return self.status;
        }
        match self.child.try_wait() {
            Ok(status) => {
                self.status = status;
                status
            }
            // Already reaped elsewhere; nothing left to wait for
            Err(_) => None,
        }
    }

    pub fn has_exited(&mut self) -> bool {
        if self.poll().is_some() {
            return true;
        }
        matches!(self.child.try_wait(), Err(_))
    }

    pub fn is_alive(&mut self) -> bool {
        !self.has_exited()
    }

    /// Wait up to `timeout` for the process to exit. Returns whether it did.
    pub fn wait_timeout(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.has_exited() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            thread::sleep(EXIT_POLL_INTERVAL.min(deadline - now));
        }
    }

    /// Unconditional kill (SIGKILL on POSIX, TerminateProcess on Windows)
    pub fn kill(&mut self) -> io::Result<()> {
        if self.status.is_some() {
            return Ok(());
        }
        match self.child.kill() {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::InvalidInput => Ok(()),
            Err(err) => Err(err),
        }
    }

    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.status
    }
}
