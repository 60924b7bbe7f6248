//! 统一数据模型定义
//!
//! Script categories, metrics snapshots and the per-run sampling state.

use crate::config::BYTES_PER_MB;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

/// Which part of a project a script belongs to.
///
/// Only affects virtual-environment resolution at launch time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Backend,
    Frontend,
    #[default]
    None,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Backend => "backend",
            Category::Frontend => "frontend",
            Category::None => "none",
        }
    }

    /// Categories in the order they are offered to the user
    pub fn all() -> [Category; 3] {
        [Category::Backend, Category::Frontend, Category::None]
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "backend" => Ok(Category::Backend),
            "frontend" => Ok(Category::Frontend),
            "none" | "" => Ok(Category::None),
            other => Err(format!(
                "Invalid category: {}. Allowed values: backend, frontend, none",
                other
            )),
        }
    }
}

/// Counter reading kept for a PID after its priming sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CpuBaseline {
    pub cpu_time: Duration,
    pub taken_at: Instant,
}

/// Caller-owned state threaded through successive metric samples of one run.
///
/// Holds the peak-RSS high-water mark and the CPU baseline of every PID that
/// has been primed. Dropping it (or calling [`RunMetricsState::reset`]) is all
/// it takes to forget a run.
#[derive(Debug, Clone, Default)]
pub struct RunMetricsState {
    pub peak_rss_bytes: u64,
    cpu_baselines: HashMap<u32, CpuBaseline>,
}

impl RunMetricsState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_primed(&self, pid: u32) -> bool {
        self.cpu_baselines.contains_key(&pid)
    }

    /// PIDs that already had their priming read
    pub fn primed_pids(&self) -> impl Iterator<Item = u32> + '_ {
        self.cpu_baselines.keys().copied()
    }

    pub fn baseline(&self, pid: u32) -> Option<&CpuBaseline> {
        self.cpu_baselines.get(&pid)
    }

    /// Record a fresh counter reading, returning the previous one if any
    pub(crate) fn rebase(&mut self, pid: u32, baseline: CpuBaseline) -> Option<CpuBaseline> {
        self.cpu_baselines.insert(pid, baseline)
    }

    pub fn reset(&mut self) {
        self.peak_rss_bytes = 0;
        self.cpu_baselines.clear();
    }
}

/// Aggregated metrics for every live member of a tracked PID set.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub cpu_percent: f64,
    pub rss_bytes: u64,
    pub rss_megabytes: f64,
    pub ram_percent: f64,
    pub elapsed_seconds: f64,
    pub peak_rss_bytes: u64,
    pub peak_rss_megabytes: f64,
    pub cpu_time_seconds: f64,
    pub num_threads: u64,
    /// How many of the requested PIDs were alive and readable
    pub live_processes: usize,
}

impl MetricsSnapshot {
    pub fn bytes_to_megabytes(bytes: u64) -> f64 {
        bytes as f64 / BYTES_PER_MB
    }
}
