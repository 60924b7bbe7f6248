//! Script launcher
//!
//! Builds the bash command line for a script (with optional virtual
//! environment activation) and spawns it, either straight through bash on
//! POSIX or through the configured terminal emulator on Windows.

use crate::config::SHELL_BIN;
use crate::core::handle::ProcessHandle;
use crate::core::models::Category;
use crate::error::{LaunchError, LaunchResult};
use crate::logging::info;
use crate::platform;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Everything needed to start one run of a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchRequest {
    pub script_path: PathBuf,
    pub category: Category,
    pub project_path: Option<PathBuf>,
    pub terminal_path: Option<PathBuf>,
    pub venv_activate_path: Option<PathBuf>,
}

impl LaunchRequest {
    pub fn new(script_path: impl Into<PathBuf>, category: Category) -> Self {
        Self {
            script_path: script_path.into(),
            category,
            project_path: None,
            terminal_path: None,
            venv_activate_path: None,
        }
    }

    pub fn with_project_path(mut self, path: Option<PathBuf>) -> Self {
        self.project_path = path;
        self
    }

    pub fn with_terminal_path(mut self, path: Option<PathBuf>) -> Self {
        self.terminal_path = path;
        self
    }

    pub fn with_venv_activate_path(mut self, path: Option<PathBuf>) -> Self {
        self.venv_activate_path = path;
        self
    }
}

/// How the shell command reaches bash on the target OS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchFlavor {
    /// bash runs the command directly; the spawned process is the work
    Posix,
    /// a terminal emulator is a launcher that starts the real shell
    WindowsTerminal,
}

impl LaunchFlavor {
    pub fn current() -> Self {
        if cfg!(windows) {
            LaunchFlavor::WindowsTerminal
        } else {
            LaunchFlavor::Posix
        }
    }

    /// Conventional activation scripts, relative to the script directory
    fn venv_candidates(&self) -> [&'static str; 2] {
        match self {
            LaunchFlavor::WindowsTerminal => [".venv/Scripts/activate", "venv/Scripts/activate"],
            LaunchFlavor::Posix => [".venv/bin/activate", "venv/bin/activate"],
        }
    }
}

/// Fully resolved launch, before any process exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub working_directory: PathBuf,
    pub script_name: String,
    pub activation: Option<String>,
    /// `[<activate> &&] bash <script>`
    pub shell_command: String,
}

impl LaunchPlan {
    pub fn resolve(request: &LaunchRequest, flavor: LaunchFlavor) -> LaunchResult<Self> {
        let script = &request.script_path;
        if !script.is_file() {
            return Err(LaunchError::invalid_script(script, "file not found"));
        }
        let working_directory = script
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| LaunchError::invalid_script(script, "has no parent directory"))?;
        let script_name = script
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| LaunchError::invalid_script(script, "has no file name"))?;

        let activation = activation_command(
            &working_directory,
            request.category,
            request.venv_activate_path.as_deref(),
            flavor,
        );
        let shell_command = build_shell_command(activation.as_deref(), &script_name);

        Ok(Self {
            working_directory,
            script_name,
            activation,
            shell_command,
        })
    }
}

/// Pick the command that activates a virtual environment for this run.
///
/// A configured override wins for backend scripts; otherwise `.venv` then
/// `venv` next to the script, in the layout of the target platform.
pub fn activation_command(
    working_directory: &Path,
    category: Category,
    venv_override: Option<&Path>,
    flavor: LaunchFlavor,
) -> Option<String> {
    if category == Category::Backend {
        if let Some(path) = venv_override.map(expand_home) {
            if path.is_file() {
                let forward = path.to_string_lossy().replace('\\', "/");
                return Some(format!("source {}", quote(&forward)));
            }
        }
    }

    flavor
        .venv_candidates()
        .into_iter()
        .find(|relative| working_directory.join(relative).is_file())
        .map(|relative| format!("source {}", relative))
}

pub fn build_shell_command(activation: Option<&str>, script_name: &str) -> String {
    let run = format!("{} {}", SHELL_BIN, quote(script_name));
    match activation {
        Some(activate) => format!("{} && {}", activate, run),
        None => run,
    }
}

/// Keep the terminal window open after the script finishes
pub fn wrap_for_terminal(command: &str) -> String {
    format!("({}); exec {}", command, SHELL_BIN)
}

/// Spawn a script. Does not wait for it.
pub fn launch(request: &LaunchRequest) -> LaunchResult<ProcessHandle> {
    launch_with(request, LaunchFlavor::current())
}

pub fn launch_with(request: &LaunchRequest, flavor: LaunchFlavor) -> LaunchResult<ProcessHandle> {
    let plan = LaunchPlan::resolve(request, flavor)?;

    let mut command = match flavor {
        LaunchFlavor::WindowsTerminal => terminal_command(request, &plan)?,
        LaunchFlavor::Posix => posix_command(&plan),
    };
    platform::prepare_command(&mut command).map_err(|source| LaunchError::Spawn {
        command: plan.shell_command.clone(),
        source,
    })?;

    let child = command.spawn().map_err(|source| LaunchError::Spawn {
        command: plan.shell_command.clone(),
        source,
    })?;
    let handle = ProcessHandle::new(child);

    info(format!(
        "launched {} pid={} cwd={} command=`{}`",
        plan.script_name,
        handle.pid(),
        plan.working_directory.display(),
        plan.shell_command
    ));
    Ok(handle)
}

fn terminal_command(request: &LaunchRequest, plan: &LaunchPlan) -> LaunchResult<Command> {
    let terminal = request
        .terminal_path
        .as_deref()
        .map(expand_home)
        .filter(|path| !path.as_os_str().is_empty())
        .ok_or_else(|| {
            LaunchError::configuration(
                "Terminal executable is not set. Configure the terminal path first.",
            )
        })?;
    if !terminal.exists() {
        return Err(LaunchError::configuration(format!(
            "Terminal executable not found: {}",
            terminal.display()
        )));
    }

    let mut command = Command::new(&terminal);
    command
        .arg(format!("--cd={}", plan.working_directory.display()))
        .arg("-c")
        .arg(wrap_for_terminal(&plan.shell_command));
    Ok(command)
}

fn posix_command(plan: &LaunchPlan) -> Command {
    let mut command = Command::new(shell_path());
    command
        .arg("-c")
        .arg(&plan.shell_command)
        .current_dir(&plan.working_directory);
    command
}

fn shell_path() -> PathBuf {
    #[cfg(unix)]
    {
        let default = Path::new(crate::config::POSIX_SHELL_PATH);
        if default.is_file() {
            return default.to_path_buf();
        }
    }
    which::which(SHELL_BIN).unwrap_or_else(|_| PathBuf::from(SHELL_BIN))
}

fn expand_home(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(raw.trim()).into_owned())
}

fn quote(word: &str) -> String {
    shell_escape::unix::escape(Cow::Borrowed(word)).into_owned()
}
