//! `scripthub run`: launch, capture the tree, stream metrics, stop on Ctrl-C

use super::{absolute, category_of};
use crate::config::{METRICS_TICK, TREE_CAPTURE_DELAY};
use crate::core::models::Category;
use crate::metrics::render_line;
use crate::settings::SettingsStore;
use crate::supervisor::{request_for, RunTick, ScriptRun};
use anyhow::Result;
use chrono::Local;
use std::path::{Path, PathBuf};
use std::process::{ExitCode, ExitStatus};
use tokio::time::{interval, sleep, MissedTickBehavior};

/// Exit code reported after the user interrupted the run
const INTERRUPTED_EXIT_CODE: u8 = 130;

pub async fn run(
    store: &SettingsStore,
    script: &Path,
    category: Option<Category>,
    project: Option<PathBuf>,
) -> Result<ExitCode> {
    let settings = store.load();
    let script = absolute(script);
    let project = project
        .or_else(|| settings.project_path.clone())
        .map(|p| absolute(&p));
    let category = category.unwrap_or_else(|| category_of(&script, &settings, project.as_deref()));

    let request = request_for(&script, category, &settings).with_project_path(project);
    let mut run = ScriptRun::start(&request)?;
    println!(
        "[{}] started {} ({}) pid={}",
        Local::now().format("%H:%M:%S"),
        script.display(),
        category,
        run.pid()
    );

    let capture = sleep(TREE_CAPTURE_DELAY);
    tokio::pin!(capture);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut captured = false;

    let mut ticker = interval(METRICS_TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = &mut capture, if !captured => {
                captured = true;
                run.capture_tree();
                if let Some(pids) = run.tracked_pids() {
                    println!("tracking {} process(es): {:?}", pids.len(), pids);
                }
            }
            _ = ticker.tick() => match run.tick() {
                RunTick::Running(snapshot) => println!("{}", render_line(&snapshot)),
                RunTick::Exited(status) => {
                    println!(
                        "[{}] {} exited ({})",
                        Local::now().format("%H:%M:%S"),
                        script.display(),
                        describe(status)
                    );
                    return Ok(exit_code(status));
                }
            },
            result = &mut ctrl_c => {
                result?;
                let report = run.kill();
                println!(
                    "[{}] stopped {} pids={:?} signals={:?} state={:?}",
                    Local::now().format("%H:%M:%S"),
                    script.display(),
                    report.pids,
                    report.signals_sent,
                    report.final_state
                );
                return Ok(ExitCode::from(INTERRUPTED_EXIT_CODE));
            }
        }
    }
}

fn describe(status: Option<ExitStatus>) -> String {
    match status {
        Some(status) => status.to_string(),
        None => "status unknown".to_string(),
    }
}

fn exit_code(status: Option<ExitStatus>) -> ExitCode {
    match status.and_then(|s| s.code()) {
        Some(code) => ExitCode::from(u8::try_from(code).unwrap_or(1)),
        None => ExitCode::from(1),
    }
}
