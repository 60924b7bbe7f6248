use super::ProcessReading;
use crate::error::ProbeError;
use crate::logging::debug;
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use psutil::process::Process;
use std::io;
use std::process::Command;

/// Prepare the shell command of a run before it is spawned
///
/// The script gets its own process group so a Ctrl-C aimed at the host does
/// not reach it directly; termination stays under our control.
pub fn prepare_command(cmd: &mut Command) -> io::Result<()> {
    use std::os::unix::process::CommandExt;

    unsafe {
        cmd.pre_exec(|| {
            if set_process_group() != 0 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        });
    }

    Ok(())
}

pub(crate) fn hide_helper_window(_cmd: &mut Command) {}

/// Send `sig` to `pid`, treating "no such process" as success
pub fn send_signal(pid: u32, sig: Signal) -> Result<(), Errno> {
    match signal::kill(to_pid(pid), sig) {
        Ok(()) => Ok(()),
        Err(Errno::ESRCH) => {
            debug(format!("pid={} already gone before {}", pid, sig));
            Ok(())
        }
        Err(errno) => Err(errno),
    }
}

pub fn read_process(pid: u32) -> Result<ProcessReading, ProbeError> {
    let process = Process::new(pid).map_err(|_| ProbeError::ProcessLookup(pid))?;
    let memory = process
        .memory_info()
        .map_err(|_| ProbeError::ProcessLookup(pid))?;
    let times = process
        .cpu_times()
        .map_err(|_| ProbeError::ProcessLookup(pid))?;

    Ok(ProcessReading {
        rss_bytes: memory.rss(),
        cpu_time: times.user() + times.system(),
        num_threads: thread_count(pid).unwrap_or(1),
    })
}

pub fn total_memory() -> Result<u64, ProbeError> {
    psutil::memory::virtual_memory()
        .map(|memory| memory.total())
        .map_err(|_| ProbeError::SystemMetricsUnavailable)
}

#[cfg(target_os = "linux")]
fn thread_count(pid: u32) -> Option<u64> {
    let status = std::fs::read_to_string(format!("/proc/{pid}/status")).ok()?;
    parse_status_threads(&status)
}

#[cfg(not(target_os = "linux"))]
fn thread_count(_pid: u32) -> Option<u64> {
    None
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_status_threads(status: &str) -> Option<u64> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("Threads:"))
        .and_then(|value| value.trim().parse().ok())
}

fn to_pid(pid: u32) -> Pid {
    Pid::from_raw(pid as libc::pid_t)
}

/// Safely set process group ID
///
/// Encapsulates unsafe setpgid call
unsafe fn set_process_group() -> libc::c_int {
    unsafe { libc::setpgid(0, 0) }
}
