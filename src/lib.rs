//! ScriptHub Library
//!
//! Launches project shell scripts, tracks the process tree they spawn, samples
//! its resource usage and stops it on request.

pub mod commands;
pub mod config;
pub mod core;
pub mod error;
pub mod launcher;
pub mod logging;
pub mod metrics;
pub mod platform;
pub mod scanner;
pub mod settings;
pub mod supervisor;
pub mod termination;
pub mod utils;

// Re-export commonly used types for convenience
pub use core::handle::ProcessHandle;
pub use core::models::*;
pub use core::process_tree::{resolve_tree, TreeResolver};
pub use error::{ErrorCategory, LaunchError, LaunchResult, ProbeError, SettingsError};
pub use launcher::{launch, LaunchRequest};
pub use metrics::sample;
pub use settings::{Settings, SettingsStore};
pub use supervisor::{RunSlot, RunTick, ScriptRun};
pub use termination::{terminate, StopSignal, TerminationReport, TerminationState};
