use std::time::Duration;

pub const SHELL_BIN: &str = "bash";
#[cfg(unix)]
pub const POSIX_SHELL_PATH: &str = "/bin/bash";
pub const SCRIPT_EXTENSION: &str = "sh";

pub const CONFIG_FILENAME: &str = "config.json";
pub const CONFIG_DIR_ENV: &str = "SCRIPTHUB_CONFIG_DIR";
pub const APP_DIRECTORY: &str = "scripthub";

// Launcher processes (git-bash style terminals) may exit right after handing
// the work to a child shell; the tree is captured after this delay.
pub const TREE_CAPTURE_DELAY: Duration = Duration::from_millis(400);
pub const METRICS_TICK: Duration = Duration::from_secs(1);

pub const KILL_GRACEFUL_WAIT: Duration = Duration::from_millis(2000);
pub const KILL_FORCE_WAIT: Duration = Duration::from_millis(1000);
// Bounded reap after SIGKILL; the reported state stays `Killed`
pub const KILL_REAP_WAIT: Duration = Duration::from_millis(250);
pub const ENUMERATION_TIMEOUT: Duration = Duration::from_secs(5);
pub const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
