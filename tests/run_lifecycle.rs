#![cfg(unix)]

use scripthub::core::process_tree::resolve_tree;
use scripthub::launcher::{launch, LaunchPlan, LaunchFlavor, LaunchRequest};
use scripthub::metrics;
use scripthub::supervisor::{RunTick, ScriptRun};
use scripthub::termination::{terminate, StopSignal, TerminationState};
use scripthub::{Category, RunMetricsState};
use serial_test::serial;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn write(root: &Path, relative: &str, body: &str) -> PathBuf {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, body).unwrap();
    path
}

/// Backend project whose script records the venv marker and then idles
fn backend_project() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "backend/.venv/bin/activate",
        "export SCRIPTHUB_TEST_VENV=active\n",
    );
    let script = write(
        dir.path(),
        "backend/serve.sh",
        "echo \"$SCRIPTHUB_TEST_VENV\" > venv-marker.txt\nsleep 5\n",
    );
    (dir, script)
}

fn wait_for_file(path: &Path, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if path.is_file() {
            return true;
        }
        thread::sleep(Duration::from_millis(50));
    }
    false
}

#[test]
#[serial]
fn backend_run_activates_venv_and_reports_metrics() {
    let (dir, script) = backend_project();
    let request = LaunchRequest::new(&script, Category::Backend);

    let plan = LaunchPlan::resolve(&request, LaunchFlavor::Posix).unwrap();
    assert_eq!(plan.shell_command, "source .venv/bin/activate && bash serve.sh");

    let started = Instant::now();
    let mut handle = launch(&request).unwrap();
    thread::sleep(Duration::from_millis(400));
    let pids = resolve_tree(&mut handle);
    assert_eq!(pids, vec![handle.pid()]);

    thread::sleep(Duration::from_millis(600));
    let mut state = RunMetricsState::new();
    let first = metrics::sample(&pids, Some(started), &mut state);
    assert!(
        (first.elapsed_seconds - 1.0).abs() <= 0.2,
        "elapsed {}",
        first.elapsed_seconds
    );
    assert!(first.num_threads >= 1);
    assert_eq!(first.cpu_percent, 0.0);
    assert!(first.rss_bytes > 0);
    assert_eq!(first.peak_rss_bytes, first.rss_bytes);

    thread::sleep(Duration::from_millis(200));
    let second = metrics::sample(&pids, Some(started), &mut state);
    assert!(second.cpu_percent.is_finite() && second.cpu_percent >= 0.0);
    assert!(second.peak_rss_bytes >= first.peak_rss_bytes);

    let marker = dir.path().join("backend/venv-marker.txt");
    assert!(wait_for_file(&marker, Duration::from_secs(2)));
    assert_eq!(fs::read_to_string(marker).unwrap().trim(), "active");

    let report = terminate(&mut handle, Some(&pids));
    assert_eq!(report.final_state, TerminationState::Gone);
}

const IGNORE_STOP_SIGNALS: &str = "trap '' INT TERM\nwhile :; do sleep 0.1; done\n";

fn assert_escalated_to_kill(request: &LaunchRequest) {
    let mut handle = launch(request).unwrap();
    thread::sleep(Duration::from_millis(400));
    assert!(handle.is_alive());
    let pids = resolve_tree(&mut handle);

    let started = Instant::now();
    let report = terminate(&mut handle, Some(&pids));
    let took = started.elapsed();

    assert_eq!(
        report.signals_sent,
        vec![StopSignal::Interrupt, StopSignal::Terminate, StopSignal::Kill]
    );
    assert_eq!(report.final_state, TerminationState::Killed);
    assert!(took >= Duration::from_millis(2900), "took {:?}", took);
    assert!(took < Duration::from_secs(10), "took {:?}", took);
    assert!(handle.wait_timeout(Duration::from_secs(2)));
}

#[test]
#[serial]
fn trap_ignoring_script_is_escalated_to_kill() {
    let dir = TempDir::new().unwrap();
    let script = write(dir.path(), "stubborn.sh", IGNORE_STOP_SIGNALS);
    let request = LaunchRequest::new(&script, Category::None);

    let plan = LaunchPlan::resolve(&request, LaunchFlavor::Posix).unwrap();
    assert_eq!(plan.shell_command, "bash stubborn.sh");
    assert_escalated_to_kill(&request);
}

#[test]
#[serial]
fn trap_ignoring_backend_run_is_escalated_to_kill() {
    let dir = TempDir::new().unwrap();
    // Sourced into the launcher shell itself, so the launcher ignores the signals too
    write(dir.path(), "backend/.venv/bin/activate", "trap '' INT TERM\n");
    let script = write(dir.path(), "backend/stubborn.sh", IGNORE_STOP_SIGNALS);
    let request = LaunchRequest::new(&script, Category::Backend);

    let plan = LaunchPlan::resolve(&request, LaunchFlavor::Posix).unwrap();
    assert_eq!(
        plan.shell_command,
        "source .venv/bin/activate && bash stubborn.sh"
    );
    assert_escalated_to_kill(&request);
}

#[test]
#[serial]
fn sampling_before_capture_uses_launcher() {
    let dir = TempDir::new().unwrap();
    let script = write(dir.path(), "idle.sh", "sleep 5\n");
    let mut run = ScriptRun::start(&LaunchRequest::new(&script, Category::None)).unwrap();

    assert_eq!(run.tracked_pids(), None);
    assert_eq!(run.effective_pids(), vec![run.pid()]);
    match run.tick() {
        RunTick::Running(snapshot) => {
            assert_eq!(snapshot.live_processes, 1);
            assert!(snapshot.elapsed_seconds < 1.0);
        }
        other => panic!("unexpected tick: {:?}", other),
    }

    run.capture_tree();
    assert_eq!(run.tracked_pids(), Some(&[run.pid()][..]));
    let report = run.kill();
    assert_eq!(report.final_state, TerminationState::Gone);
}

#[test]
#[serial]
fn exited_script_is_reported_once() {
    let dir = TempDir::new().unwrap();
    let script = write(dir.path(), "quick.sh", "exit 0\n");
    let mut run = ScriptRun::start(&LaunchRequest::new(&script, Category::None)).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        if let RunTick::Exited(status) = run.tick() {
            assert_eq!(status.and_then(|s| s.code()), Some(0));
            break;
        }
        assert!(Instant::now() < deadline, "script never exited");
        thread::sleep(Duration::from_millis(50));
    }

    run.capture_tree();
    assert_eq!(run.tracked_pids(), None);
    let report = run.kill();
    assert!(report.signals_sent.is_empty());
    assert_eq!(report.final_state, TerminationState::Gone);
}
