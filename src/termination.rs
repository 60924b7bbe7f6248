//! Ending a run's process tree
//!
//! POSIX escalates interrupt → terminate → kill with tightening waits so a
//! script can run its cleanup handlers; Windows force-kills every tracked PID.
//! Neither path reports "already gone" conditions as errors.

use crate::config::{KILL_FORCE_WAIT, KILL_GRACEFUL_WAIT, KILL_REAP_WAIT};
use crate::core::handle::ProcessHandle;
use crate::logging::{debug, info};
use std::fmt;
use std::time::Duration;

/// Signals used while stopping a run, mildest first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    Interrupt,
    Terminate,
    Kill,
}

impl fmt::Display for StopSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StopSignal::Interrupt => "SIGINT",
            StopSignal::Terminate => "SIGTERM",
            StopSignal::Kill => "SIGKILL",
        };
        f.write_str(name)
    }
}

/// Where a run is in its shutdown sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationState {
    Alive,
    Interrupted,
    TerminateSent,
    Killed,
    Gone,
}

impl TerminationState {
    fn after(signal: StopSignal) -> Self {
        match signal {
            StopSignal::Interrupt => TerminationState::Interrupted,
            StopSignal::Terminate => TerminationState::TerminateSent,
            StopSignal::Kill => TerminationState::Killed,
        }
    }
}

/// One rung of the escalation ladder. `wait: None` means completion is assumed;
/// the process is still reaped briefly so it does not linger as a zombie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationStep {
    pub signal: StopSignal,
    pub wait: Option<Duration>,
}

pub const POSIX_ESCALATION: [EscalationStep; 3] = [
    EscalationStep {
        signal: StopSignal::Interrupt,
        wait: Some(KILL_GRACEFUL_WAIT),
    },
    EscalationStep {
        signal: StopSignal::Terminate,
        wait: Some(KILL_FORCE_WAIT),
    },
    EscalationStep {
        signal: StopSignal::Kill,
        wait: None,
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminationReport {
    pub pids: Vec<u32>,
    pub signals_sent: Vec<StopSignal>,
    pub final_state: TerminationState,
}

/// PIDs a termination acts on: the captured tree, else the launcher if it still runs
pub fn effective_pids(handle: &mut ProcessHandle, tracked_pids: Option<&[u32]>) -> Vec<u32> {
    match tracked_pids {
        Some(pids) if !pids.is_empty() => pids.to_vec(),
        _ if handle.is_alive() => vec![handle.pid()],
        _ => Vec::new(),
    }
}

/// Best-effort stop of a run. Never fails.
pub fn terminate(handle: &mut ProcessHandle, tracked_pids: Option<&[u32]>) -> TerminationReport {
    let pids = effective_pids(handle, tracked_pids);
    let report = terminate_platform(handle, pids);
    info(format!(
        "terminated pid={} ({:?}, signals: {:?})",
        handle.pid(),
        report.final_state,
        report.signals_sent
    ));
    report
}

#[cfg(unix)]
fn terminate_platform(handle: &mut ProcessHandle, pids: Vec<u32>) -> TerminationReport {
    if handle.has_exited() {
        return TerminationReport {
            pids,
            signals_sent: Vec::new(),
            final_state: TerminationState::Gone,
        };
    }
    let (signals_sent, final_state) = escalate(handle, &POSIX_ESCALATION, deliver_posix);
    TerminationReport {
        pids,
        signals_sent,
        final_state,
    }
}

#[cfg(unix)]
fn deliver_posix(handle: &mut ProcessHandle, signal: StopSignal) {
    use nix::sys::signal::Signal;

    let result = match signal {
        StopSignal::Interrupt => crate::platform::send_signal(handle.pid(), Signal::SIGINT)
            .map_err(|errno| errno.to_string()),
        StopSignal::Terminate => crate::platform::send_signal(handle.pid(), Signal::SIGTERM)
            .map_err(|errno| errno.to_string()),
        StopSignal::Kill => handle.kill().map_err(|err| err.to_string()),
    };
    if let Err(err) = result {
        debug(format!("{} to pid={} failed: {}", signal, handle.pid(), err));
    }
}

#[cfg(windows)]
fn terminate_platform(handle: &mut ProcessHandle, pids: Vec<u32>) -> TerminationReport {
    for &pid in pids.iter().filter(|&&pid| crate::platform::process_alive(pid)) {
        if let Err(err) = crate::platform::force_kill(pid) {
            debug(format!("taskkill pid={} ignored: {}", pid, err));
        }
    }
    let signals_sent = if pids.is_empty() {
        Vec::new()
    } else {
        vec![StopSignal::Kill]
    };
    let final_state = if handle.wait_timeout(KILL_FORCE_WAIT) {
        TerminationState::Gone
    } else {
        TerminationState::Killed
    };
    TerminationReport {
        pids,
        signals_sent,
        final_state,
    }
}

/// Walk the escalation ladder, stopping as soon as the process is confirmed gone.
pub fn escalate<F>(
    handle: &mut ProcessHandle,
    steps: &[EscalationStep],
    mut deliver: F,
) -> (Vec<StopSignal>, TerminationState)
where
    F: FnMut(&mut ProcessHandle, StopSignal),
{
    let mut state = TerminationState::Alive;
    let mut sent = Vec::new();

    for step in steps {
        if handle.has_exited() {
            return (sent, TerminationState::Gone);
        }
        debug(format!("sending {} to pid={}", step.signal, handle.pid()));
        deliver(handle, step.signal);
        sent.push(step.signal);
        state = TerminationState::after(step.signal);

        match step.wait {
            Some(wait) if handle.wait_timeout(wait) => return (sent, TerminationState::Gone),
            Some(_) => {}
            None => {
                if !handle.wait_timeout(KILL_REAP_WAIT) {
                    debug(format!("pid={} not reaped after {}", handle.pid(), step.signal));
                }
                return (sent, state);
            }
        }
    }
    (sent, state)
}
