use super::{run_helper, ProcessReading};
use crate::config::ENUMERATION_TIMEOUT;
use crate::error::ProbeError;
use std::io;
use std::os::windows::process::CommandExt;
use std::process::Command;
use std::time::Duration;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};
use windows::Win32::Foundation::{CloseHandle, FILETIME};
use windows::Win32::System::Diagnostics::ToolHelp::{
    CreateToolhelp32Snapshot, Process32FirstW, Process32NextW, PROCESSENTRY32W,
    TH32CS_SNAPPROCESS,
};
use windows::Win32::System::Threading::{
    GetProcessTimes, OpenProcess, PROCESS_QUERY_LIMITED_INFORMATION,
};

const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// The terminal is a regular GUI/console process; nothing to prepare
pub fn prepare_command(_cmd: &mut Command) -> io::Result<()> {
    Ok(())
}

pub(crate) fn hide_helper_window(cmd: &mut Command) {
    cmd.creation_flags(CREATE_NO_WINDOW);
}

pub fn process_alive(pid: u32) -> bool {
    let mut system = System::new();
    let sys_pid = Pid::from_u32(pid);
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[sys_pid]),
        true,
        ProcessRefreshKind::new(),
    );
    system.process(sys_pid).is_some()
}

/// Forcefully end `pid` with `taskkill /F`, bounded by the enumeration timeout
pub fn force_kill(pid: u32) -> Result<(), ProbeError> {
    let mut cmd = Command::new("taskkill");
    cmd.args(["/PID", &pid.to_string(), "/F"]);
    run_helper(cmd, ENUMERATION_TIMEOUT).map(|_| ())
}

pub fn read_process(pid: u32) -> Result<ProcessReading, ProbeError> {
    let mut system = System::new();
    let sys_pid = Pid::from_u32(pid);
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[sys_pid]),
        true,
        ProcessRefreshKind::new().with_memory(),
    );
    let process = system
        .process(sys_pid)
        .ok_or(ProbeError::ProcessLookup(pid))?;

    Ok(ProcessReading {
        rss_bytes: process.memory(),
        cpu_time: cpu_time(pid).ok_or(ProbeError::ProcessLookup(pid))?,
        num_threads: thread_count(pid).unwrap_or(1),
    })
}

pub fn total_memory() -> Result<u64, ProbeError> {
    let mut system = System::new();
    system.refresh_memory();
    match system.total_memory() {
        0 => Err(ProbeError::SystemMetricsUnavailable),
        total => Ok(total),
    }
}

fn filetime_to_duration(time: &FILETIME) -> Duration {
    let ticks = ((time.dwHighDateTime as u64) << 32) | time.dwLowDateTime as u64;
    // FILETIME counts 100ns intervals
    Duration::from_nanos(ticks.saturating_mul(100))
}

fn cpu_time(pid: u32) -> Option<Duration> {
    unsafe {
        let handle = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid).ok()?;
        let mut creation = FILETIME::default();
        let mut exit = FILETIME::default();
        let mut kernel = FILETIME::default();
        let mut user = FILETIME::default();
        let result = GetProcessTimes(handle, &mut creation, &mut exit, &mut kernel, &mut user);
        let _ = CloseHandle(handle);
        result.ok()?;
        Some(filetime_to_duration(&kernel) + filetime_to_duration(&user))
    }
}

fn thread_count(pid: u32) -> Option<u64> {
    unsafe {
        let snapshot = CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0).ok()?;
        let mut entry = PROCESSENTRY32W {
            dwSize: std::mem::size_of::<PROCESSENTRY32W>() as u32,
            ..Default::default()
        };
        let mut found = None;
        let mut more = Process32FirstW(snapshot, &mut entry).is_ok();
        while more {
            if entry.th32ProcessID == pid {
                found = Some(entry.cntThreads as u64);
                break;
            }
            more = Process32NextW(snapshot, &mut entry).is_ok();
        }
        let _ = CloseHandle(snapshot);
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filetime_conversion() {
        let time = FILETIME {
            dwLowDateTime: 10_000_000,
            dwHighDateTime: 0,
        };
        assert_eq!(filetime_to_duration(&time), Duration::from_secs(1));
    }

    #[test]
    fn test_current_process_reading() {
        let reading = read_process(std::process::id()).unwrap();
        assert!(reading.rss_bytes > 0);
        assert!(reading.num_threads >= 1);
    }
}
