//! Persisted user settings
//!
//! A small JSON document: the selected project, the terminal executable, the
//! backend venv override, per-script categories and favorites. Loading is
//! lenient (missing or corrupt files yield defaults, unknown categories are
//! dropped); saving pretty-prints and creates the directory.

use crate::core::models::Category;
use crate::error::SettingsError;
use crate::logging::warn;
use crate::utils::config_paths::ConfigPaths;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venv_activate_path: Option<PathBuf>,
    #[serde(default)]
    pub script_categories: BTreeMap<String, Category>,
    #[serde(default)]
    pub favorites: BTreeSet<String>,
}

impl Settings {
    /// Lenient parse; anything malformed is ignored field by field
    pub fn from_json(value: &Value) -> Self {
        let text = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
        };

        let script_categories = value
            .get("script_categories")
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .filter_map(|(path, cat)| {
                        let category = match cat.as_str()? {
                            "backend" => Category::Backend,
                            "frontend" => Category::Frontend,
                            "none" => Category::None,
                            _ => return None,
                        };
                        Some((path.clone(), category))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let favorites = value
            .get("favorites")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| match item {
                        Value::String(s) => Some(s.clone()),
                        Value::Null => None,
                        other => Some(other.to_string()),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self {
            project_path: text("project_path"),
            terminal_path: text("terminal_path"),
            venv_activate_path: text("venv_activate_path"),
            script_categories,
            favorites,
        }
    }

    pub fn category_for(&self, script: &Path) -> Option<Category> {
        self.script_categories.get(&key(script)).copied()
    }

    pub fn set_category(&mut self, script: &Path, category: Category) {
        self.script_categories.insert(key(script), category);
    }

    pub fn is_favorite(&self, script: &Path) -> bool {
        self.favorites.contains(&key(script))
    }

    /// Flip the favorite flag; returns whether the script is now a favorite
    pub fn toggle_favorite(&mut self, script: &Path) -> bool {
        let key = key(script);
        if self.favorites.remove(&key) {
            false
        } else {
            self.favorites.insert(key);
            true
        }
    }

    pub fn set_project_path(&mut self, path: Option<PathBuf>) {
        self.project_path = normalize(path);
    }

    pub fn set_terminal_path(&mut self, path: Option<PathBuf>) {
        self.terminal_path = normalize(path);
    }

    pub fn set_venv_activate_path(&mut self, path: Option<PathBuf>) {
        self.venv_activate_path = normalize(path);
    }
}

fn key(script: &Path) -> String {
    script.to_string_lossy().into_owned()
}

fn normalize(path: Option<PathBuf>) -> Option<PathBuf> {
    path.filter(|p| !p.to_string_lossy().trim().is_empty())
}

/// Reads and writes [`Settings`] at a fixed location.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn open_default() -> Result<Self, SettingsError> {
        Ok(Self::new(ConfigPaths::new()?.config_file))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Settings {
        if !self.path.is_file() {
            return Settings::default();
        }
        match self.read_value() {
            Ok(value) => Settings::from_json(&value),
            Err(err) => {
                warn(format!("ignoring unreadable settings: {}", err));
                Settings::default()
            }
        }
    }

    fn read_value(&self) -> Result<Value, SettingsError> {
        let content = fs::read_to_string(&self.path).map_err(|source| SettingsError::Io {
            path: self.path.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| SettingsError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    pub fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        let io_err = |source: std::io::Error| SettingsError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        let json = serde_json::to_string_pretty(settings).map_err(|source| SettingsError::Parse {
            path: self.path.clone(),
            source,
        })?;
        fs::write(&self.path, json).map_err(io_err)
    }

    /// Load, apply `change`, save; returns whatever `change` returned
    pub fn update<T>(&self, change: impl FnOnce(&mut Settings) -> T) -> Result<T, SettingsError> {
        let mut settings = self.load();
        let out = change(&mut settings);
        self.save(&settings)?;
        Ok(out)
    }
}
