//! Live resource metrics for a tracked process tree
//!
//! [`sample`] is a pure function of its inputs plus the OS counters: all
//! cross-tick memory (CPU baselines, peak RSS) lives in the caller-owned
//! [`RunMetricsState`].

use crate::core::models::{CpuBaseline, MetricsSnapshot, RunMetricsState};
use crate::logging::debug;
use crate::platform::{ProcessProbe, SystemProbe};
use std::collections::HashSet;
use std::time::Instant;

/// Aggregate metrics over every live member of `pids` using the OS probe.
pub fn sample(
    pids: &[u32],
    start_time: Option<Instant>,
    state: &mut RunMetricsState,
) -> MetricsSnapshot {
    sample_with(&SystemProbe, pids, start_time, state, Instant::now())
}

/// Same as [`sample`] with an explicit probe and clock reading.
///
/// PIDs that cannot be read are skipped. A PID seen for the first time is
/// primed: its counters become the baseline and it contributes no CPU
/// percentage to this snapshot.
pub fn sample_with(
    probe: &dyn ProcessProbe,
    pids: &[u32],
    start_time: Option<Instant>,
    state: &mut RunMetricsState,
    now: Instant,
) -> MetricsSnapshot {
    let mut total_rss: u64 = 0;
    let mut total_cpu_percent = 0.0;
    let mut total_cpu_time = 0.0;
    let mut total_threads: u64 = 0;
    let mut live = 0;
    let mut seen = HashSet::with_capacity(pids.len());

    for &pid in pids {
        if !seen.insert(pid) {
            continue;
        }
        let reading = match probe.read(pid) {
            Ok(reading) => reading,
            Err(err) => {
                debug(format!("skipping pid={} in sample: {}", pid, err));
                continue;
            }
        };
        live += 1;
        total_rss += reading.rss_bytes;
        total_cpu_time += reading.cpu_time.as_secs_f64();
        total_threads += reading.num_threads;

        let baseline = CpuBaseline {
            cpu_time: reading.cpu_time,
            taken_at: now,
        };
        if let Some(previous) = state.rebase(pid, baseline) {
            total_cpu_percent += cpu_percent_between(&previous, &baseline);
        }
    }

    state.peak_rss_bytes = state.peak_rss_bytes.max(total_rss);

    let ram_percent = match probe.total_memory() {
        Ok(total) if total > 0 => total_rss as f64 / total as f64 * 100.0,
        Ok(_) => 0.0,
        Err(err) => {
            debug(format!("ram percent unavailable: {}", err));
            0.0
        }
    };
    let elapsed_seconds = start_time
        .map(|start| now.saturating_duration_since(start).as_secs_f64())
        .unwrap_or(0.0);

    MetricsSnapshot {
        cpu_percent: total_cpu_percent,
        rss_bytes: total_rss,
        rss_megabytes: MetricsSnapshot::bytes_to_megabytes(total_rss),
        ram_percent,
        elapsed_seconds,
        peak_rss_bytes: state.peak_rss_bytes,
        peak_rss_megabytes: MetricsSnapshot::bytes_to_megabytes(state.peak_rss_bytes),
        cpu_time_seconds: total_cpu_time,
        num_threads: total_threads,
        live_processes: live,
    }
}

fn cpu_percent_between(previous: &CpuBaseline, current: &CpuBaseline) -> f64 {
    let wall = current
        .taken_at
        .saturating_duration_since(previous.taken_at)
        .as_secs_f64();
    if wall <= 0.0 {
        return 0.0;
    }
    let busy = current.cpu_time.saturating_sub(previous.cpu_time).as_secs_f64();
    busy / wall * 100.0
}

/// `HH:MM:SS`, seconds truncated; negative input renders as zero
pub fn format_elapsed(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

/// `H:MM:SS.s` (hours unpadded); negative input renders as zero
pub fn format_cpu_time(seconds: f64) -> String {
    let tenths = if seconds.is_finite() && seconds > 0.0 {
        (seconds * 10.0).round() as u64
    } else {
        0
    };
    let hours = tenths / 36_000;
    let minutes = (tenths % 36_000) / 600;
    let secs_tenths = tenths % 600;
    format!(
        "{}:{:02}:{:02}.{}",
        hours,
        minutes,
        secs_tenths / 10,
        secs_tenths % 10
    )
}

/// One human-readable status line for a snapshot
pub fn render_line(snapshot: &MetricsSnapshot) -> String {
    format!(
        "CPU {:.1}% | RAM {:.2} MB ({:.1}%) | Elapsed {} | Peak {:.2} MB | CPU time {} | Threads {}",
        snapshot.cpu_percent,
        snapshot.rss_megabytes,
        snapshot.ram_percent,
        format_elapsed(snapshot.elapsed_seconds),
        snapshot.peak_rss_megabytes,
        format_cpu_time(snapshot.cpu_time_seconds),
        snapshot.num_threads
    )
}
