//! Platform-specific process plumbing
//!
//! Everything that touches OS process APIs lives here: command preparation,
//! liveness checks, counter reads for the metrics probe and short-lived
//! helper subprocesses that must never block the control thread forever.

#[cfg(unix)]
mod unix;
#[cfg(windows)]
mod windows;

#[cfg(unix)]
pub use self::unix::*;
#[cfg(windows)]
pub use self::windows::*;

use crate::error::ProbeError;
use crate::logging::debug;
use std::io;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Point-in-time counters of a single live process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessReading {
    pub rss_bytes: u64,
    /// user + system CPU time consumed so far
    pub cpu_time: Duration,
    pub num_threads: u64,
}

/// Source of per-process counters.
///
/// The system implementation reads the live OS; tests substitute a scripted one.
pub trait ProcessProbe {
    fn read(&self, pid: u32) -> Result<ProcessReading, ProbeError>;
    fn total_memory(&self) -> Result<u64, ProbeError>;
}

/// Probe backed by the running operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProbe;

impl ProcessProbe for SystemProbe {
    fn read(&self, pid: u32) -> Result<ProcessReading, ProbeError> {
        read_process(pid)
    }

    fn total_memory(&self) -> Result<u64, ProbeError> {
        total_memory()
    }
}

/// Run a helper program to completion, giving up after `timeout`.
///
/// A helper that overruns is killed and reported as
/// [`ProbeError::EnumerationTimeout`]; a helper that cannot be started is
/// [`ProbeError::HelperUnavailable`]. Returns stdout of a successful run.
pub fn run_helper(mut command: Command, timeout: Duration) -> Result<String, ProbeError> {
    let helper = command.get_program().to_string_lossy().into_owned();
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());
    hide_helper_window(&mut command);

    let mut child = command
        .spawn()
        .map_err(|source| ProbeError::HelperUnavailable {
            helper: helper.clone(),
            source,
        })?;

    let started = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(_)) => break,
            Ok(None) => {
                if started.elapsed() >= timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    debug(format!("helper {} timed out after {:?}", helper, timeout));
                    return Err(ProbeError::EnumerationTimeout { helper, timeout });
                }
                thread::sleep(Duration::from_millis(25));
            }
            Err(source) => return Err(ProbeError::HelperUnavailable { helper, source }),
        }
    }

    let output = child
        .wait_with_output()
        .map_err(|source| ProbeError::HelperUnavailable {
            helper: helper.clone(),
            source,
        })?;
    if !output.status.success() {
        return Err(ProbeError::HelperUnavailable {
            helper,
            source: io::Error::other(format!("exited with {}", output.status)),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
