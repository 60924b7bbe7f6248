use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

struct TempConfig {
    dir: TempDir,
}

impl TempConfig {
    fn new() -> Self {
        Self {
            dir: TempDir::new().expect("temp dir"),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::cargo_bin("scripthub").expect("binary built");
        cmd.env("SCRIPTHUB_CONFIG_DIR", self.dir.path());
        cmd.env("RUST_LOG", "off");
        cmd
    }

    fn config_file(&self) -> std::path::PathBuf {
        self.dir.path().join("config.json")
    }
}

fn write_script(root: &Path, relative: &str, body: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

#[test]
fn help_lists_subcommands() {
    let config = TempConfig::new();
    config
        .command()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn list_without_project_fails_with_hint() {
    let config = TempConfig::new();
    config
        .command()
        .arg("list")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("set-project"));
}

#[test]
fn set_project_then_list_shows_scripts() {
    let config = TempConfig::new();
    let project = TempDir::new().unwrap();
    write_script(project.path(), "backend/api.sh", "echo api\n");
    write_script(project.path(), "frontend/dev.sh", "echo dev\n");
    write_script(project.path(), "README.md", "docs\n");

    config
        .command()
        .args(["config", "set-project"])
        .arg(project.path())
        .assert()
        .success();
    assert!(config.config_file().is_file());

    config
        .command()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("api.sh"))
        .stdout(predicate::str::contains("dev.sh"))
        .stdout(predicate::str::contains("README.md").not());

    config
        .command()
        .args(["list", "--folder", "frontend"])
        .assert()
        .success()
        .stdout(predicate::str::contains("dev.sh"))
        .stdout(predicate::str::contains("api.sh").not());
}

#[test]
fn favorite_and_category_are_persisted() {
    let config = TempConfig::new();
    let project = TempDir::new().unwrap();
    write_script(project.path(), "deploy.sh", "echo deploy\n");
    let script = project.path().join("deploy.sh");

    config
        .command()
        .arg("favorite")
        .arg(&script)
        .assert()
        .success()
        .stdout(predicate::str::contains("Added"));
    config
        .command()
        .arg("category")
        .arg(&script)
        .arg("backend")
        .assert()
        .success();

    config
        .command()
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"favorites\""))
        .stdout(predicate::str::contains("deploy.sh"))
        .stdout(predicate::str::contains("\"backend\""));
}

#[test]
fn unknown_category_is_rejected_by_parser() {
    let config = TempConfig::new();
    config
        .command()
        .args(["category", "a.sh", "database"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid category"));
}

#[test]
fn run_missing_script_reports_launch_error() {
    let config = TempConfig::new();
    let project = TempDir::new().unwrap();
    config
        .command()
        .arg("run")
        .arg(project.path().join("missing.sh"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("missing.sh"));
}

#[cfg(unix)]
#[test]
fn run_reports_script_exit_code() {
    let config = TempConfig::new();
    let project = TempDir::new().unwrap();
    write_script(project.path(), "fail.sh", "echo working\nexit 3\n");

    config
        .command()
        .arg("run")
        .arg(project.path().join("fail.sh"))
        .assert()
        .code(3)
        .stdout(predicate::str::contains("started"))
        .stdout(predicate::str::contains("working"))
        .stdout(predicate::str::contains("exited"));
}
