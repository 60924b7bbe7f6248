use crate::core::handle::ProcessHandle;
use crate::core::models::{Category, MetricsSnapshot, RunMetricsState};
use crate::core::process_tree::{platform_resolver, resolve_tree_with, TreeResolver};
use crate::error::LaunchResult;
use crate::launcher::{launch, LaunchRequest};
use crate::logging::{debug, info};
use crate::metrics;
use crate::settings::Settings;
use crate::termination::{self, TerminationReport};
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::time::Instant;

/// Outcome of one metrics tick
#[derive(Debug, Clone, PartialEq)]
pub enum RunTick {
    Running(MetricsSnapshot),
    Exited(Option<ExitStatus>),
}

/// Build a launch request for `script` from the persisted settings
pub fn request_for(script: &Path, category: Category, settings: &Settings) -> LaunchRequest {
    LaunchRequest::new(script, category)
        .with_project_path(settings.project_path.clone())
        .with_terminal_path(settings.terminal_path.clone())
        .with_venv_activate_path(settings.venv_activate_path.clone())
}

/// A launched script and everything tracked about it.
pub struct ScriptRun {
    script_path: PathBuf,
    category: Category,
    handle: ProcessHandle,
    tracked_pids: Option<Vec<u32>>,
    start_time: Instant,
    metrics: RunMetricsState,
}

impl ScriptRun {
    pub fn start(request: &LaunchRequest) -> LaunchResult<Self> {
        let handle = launch(request)?;
        Ok(Self::from_handle(
            request.script_path.clone(),
            request.category,
            handle,
        ))
    }

    /// Track an already spawned launcher
    pub fn from_handle(script_path: PathBuf, category: Category, handle: ProcessHandle) -> Self {
        Self {
            script_path,
            category,
            handle,
            tracked_pids: None,
            start_time: Instant::now(),
            metrics: RunMetricsState::new(),
        }
    }

    pub fn script_path(&self) -> &Path {
        &self.script_path
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn pid(&self) -> u32 {
        self.handle.pid()
    }

    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    pub fn tracked_pids(&self) -> Option<&[u32]> {
        self.tracked_pids.as_deref()
    }

    pub fn capture_tree(&mut self) {
        self.capture_tree_with(platform_resolver().as_ref());
    }

    /// Resolve the tree once. Later calls, or calls after the launcher exited, do nothing.
    pub fn capture_tree_with(&mut self, resolver: &dyn TreeResolver) {
        if self.tracked_pids.is_some() {
            return;
        }
        let pids = resolve_tree_with(&mut self.handle, resolver);
        if !pids.is_empty() {
            self.tracked_pids = Some(pids);
        }
    }

    pub fn effective_pids(&self) -> Vec<u32> {
        match &self.tracked_pids {
            Some(pids) if !pids.is_empty() => pids.clone(),
            _ => vec![self.handle.pid()],
        }
    }

    pub fn poll_exit(&mut self) -> Option<ExitStatus> {
        self.handle.poll()
    }

    pub fn has_exited(&mut self) -> bool {
        self.handle.has_exited()
    }

    pub fn sample(&mut self) -> MetricsSnapshot {
        let pids = self.effective_pids();
        metrics::sample(&pids, Some(self.start_time), &mut self.metrics)
    }

    pub fn tick(&mut self) -> RunTick {
        if self.handle.has_exited() {
            return RunTick::Exited(self.handle.exit_status());
        }
        RunTick::Running(self.sample())
    }

    pub fn kill(mut self) -> TerminationReport {
        termination::terminate(&mut self.handle, self.tracked_pids.as_deref())
    }
}

/// Holds at most one run for a script entry.
///
/// A replaced run is released, not killed. Its launcher stays in `released`
/// until a later tick reaps it.
#[derive(Default)]
pub struct RunSlot {
    current: Option<ScriptRun>,
    released: Vec<ProcessHandle>,
}

impl RunSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.current.is_some()
    }

    pub fn current(&self) -> Option<&ScriptRun> {
        self.current.as_ref()
    }

    /// Released launchers that have not been reaped yet
    pub fn released_count(&self) -> usize {
        self.released.len()
    }

    /// Launch and take ownership. A previous run is released, not killed.
    pub fn run(&mut self, request: &LaunchRequest) -> LaunchResult<u32> {
        let run = ScriptRun::start(request)?;
        Ok(self.attach(run))
    }

    pub fn attach(&mut self, run: ScriptRun) -> u32 {
        let pid = run.pid();
        if let Some(previous) = self.current.replace(run) {
            info(format!("releasing previous run pid={}", previous.pid()));
            self.released.push(previous.handle);
        }
        self.reap_released();
        pid
    }

    /// Capture the tree of the run launched as `pid`.
    ///
    /// Returns false and does nothing when the slot has moved on to another run.
    pub fn capture_tree(&mut self, pid: u32) -> bool {
        self.capture_tree_with(pid, platform_resolver().as_ref())
    }

    pub fn capture_tree_with(&mut self, pid: u32, resolver: &dyn TreeResolver) -> bool {
        match self.current.as_mut() {
            Some(run) if run.pid() == pid => {
                run.capture_tree_with(resolver);
                true
            }
            _ => {
                debug(format!("stale tree capture for pid={} ignored", pid));
                false
            }
        }
    }

    /// `None` when nothing is running. An exited run is cleared.
    pub fn tick(&mut self) -> Option<RunTick> {
        self.reap_released();
        let tick = self.current.as_mut()?.tick();
        if let RunTick::Exited(status) = &tick {
            if let Some(run) = self.current.take() {
                info(format!("pid={} exited: {:?}", run.pid(), status));
            }
        }
        Some(tick)
    }

    pub fn kill(&mut self) -> Option<TerminationReport> {
        self.current.take().map(ScriptRun::kill)
    }

    fn reap_released(&mut self) {
        self.released.retain_mut(|handle| {
            let exited = handle.has_exited();
            if exited {
                debug(format!("reaped released run pid={}", handle.pid()));
            }
            !exited
        });
    }
}
