//! CLI 命令处理模块
//!
//! Each handler loads settings through a [`SettingsStore`] and prints plain
//! text to stdout. Logging goes to stderr.

pub mod parser;
pub mod run;

pub use parser::*;

use crate::core::models::Category;
use crate::logging::warn;
use crate::scanner::{self, ScriptEntry};
use crate::settings::{Settings, SettingsStore};
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

/// One line of `scripthub list`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptRow {
    pub entry: ScriptEntry,
    pub category: Category,
    pub folder: String,
    pub favorite: bool,
    pub environment: Option<String>,
}

impl ScriptRow {
    pub fn render(&self) -> String {
        format!(
            "{} {:<28} {:<9} {:<13} {}",
            if self.favorite { "*" } else { " " },
            self.entry.name,
            self.category,
            self.environment.as_deref().unwrap_or("-"),
            self.folder
        )
    }
}

/// Filters applied by `scripthub list`
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub folder: Option<String>,
    pub search: Option<String>,
    pub favorites_only: bool,
}

/// Absolute form of a user-supplied path; left untouched when it does not exist
pub fn absolute(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Stored category, else one derived from the script's folder
pub fn category_of(script: &Path, settings: &Settings, project: Option<&Path>) -> Category {
    settings
        .category_for(script)
        .or_else(|| project.map(|project| scanner::default_category(script, project)))
        .unwrap_or_default()
}

/// Rows for every script under `project`, favorites first
pub fn list_rows(project: &Path, settings: &Settings, filter: &ListFilter) -> Vec<ScriptRow> {
    let mut rows: Vec<ScriptRow> = scanner::discover_scripts(project)
        .into_iter()
        .filter(|entry| {
            filter
                .search
                .as_deref()
                .map_or(true, |text| scanner::matches_search(entry, project, text))
        })
        .map(|entry| {
            let category = category_of(&entry.path, settings, Some(project));
            ScriptRow {
                folder: scanner::folder_of(&entry.path, project),
                favorite: settings.is_favorite(&entry.path),
                environment: scanner::environment_label(
                    &entry.path,
                    category,
                    Some(project),
                    settings.venv_activate_path.as_deref(),
                ),
                category,
                entry,
            }
        })
        .filter(|row| !filter.favorites_only || row.favorite)
        .filter(|row| {
            filter
                .folder
                .as_deref()
                .map_or(true, |folder| row.folder == folder.trim_end_matches('/'))
        })
        .collect();
    rows.sort_by_key(|row| (!row.favorite, row.entry.path.to_string_lossy().to_lowercase()));
    rows
}

pub fn list(store: &SettingsStore, project: Option<PathBuf>, filter: &ListFilter) -> Result<()> {
    let settings = store.load();
    let project = match project.or_else(|| settings.project_path.clone()) {
        Some(project) => absolute(&project),
        None => bail!("No project selected. Use `scripthub config set-project <DIR>` or --project."),
    };
    if !project.is_dir() {
        bail!("Project directory not found: {}", project.display());
    }

    let rows = list_rows(&project, &settings, filter);
    if rows.is_empty() {
        println!("No scripts found in {}", project.display());
        return Ok(());
    }
    for row in &rows {
        println!("{}", row.render());
    }
    Ok(())
}

pub fn config(store: &SettingsStore, action: &ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let settings = store.load();
            println!("# {}", store.path().display());
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        ConfigAction::SetProject { path } => {
            let project = absolute(path);
            if !project.is_dir() {
                bail!("Project directory not found: {}", project.display());
            }
            store.update(|s| s.set_project_path(Some(project.clone())))?;
            println!("Project set to {}", project.display());
        }
        ConfigAction::SetTerminal { path } => {
            if !path.exists() {
                warn(format!("terminal {} does not exist yet", path.display()));
            }
            store.update(|s| s.set_terminal_path(Some(path.clone())))?;
            println!("Terminal set to {}", path.display());
        }
        ConfigAction::SetVenv { path } => {
            let activate = absolute(path);
            if !activate.is_file() {
                warn(format!(
                    "activation script {} not found; backend runs fall back to probing",
                    activate.display()
                ));
            }
            store.update(|s| s.set_venv_activate_path(Some(activate.clone())))?;
            println!("Backend venv set to {}", activate.display());
        }
        ConfigAction::ClearVenv => {
            store.update(|s| s.set_venv_activate_path(None))?;
            println!("Backend venv cleared");
        }
    }
    Ok(())
}

pub fn favorite(store: &SettingsStore, script: &Path) -> Result<()> {
    let script = absolute(script);
    let now_favorite = store
        .update(|s| s.toggle_favorite(&script))
        .context("saving favorites")?;
    if now_favorite {
        println!("Added {} to favorites", script.display());
    } else {
        println!("Removed {} from favorites", script.display());
    }
    Ok(())
}

pub fn set_category(store: &SettingsStore, script: &Path, category: Category) -> Result<()> {
    let script = absolute(script);
    store
        .update(|s| s.set_category(&script, category))
        .context("saving category")?;
    println!("{} is now {}", script.display(), category);
    Ok(())
}
