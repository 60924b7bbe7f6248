//! Script discovery under a project directory

use crate::config::SCRIPT_EXTENSION;
use crate::core::models::Category;
use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Folder label for scripts directly in the project directory
pub const ROOT_FOLDER: &str = "root";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptEntry {
    pub name: String,
    pub path: PathBuf,
}

/// Every `*.sh` file below `project`, sorted by path
pub fn discover_scripts(project: &Path) -> Vec<ScriptEntry> {
    let mut scripts: Vec<ScriptEntry> = WalkDir::new(project)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .is_some_and(|ext| ext == SCRIPT_EXTENSION)
        })
        .map(|entry| ScriptEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            path: entry.into_path(),
        })
        .collect();
    scripts.sort_by(|a, b| a.path.cmp(&b.path));
    scripts
}

fn first_segment(script: &Path, project: &Path) -> Option<String> {
    let relative = script.strip_prefix(project).ok()?;
    match relative.components().next()? {
        Component::Normal(segment) => Some(segment.to_string_lossy().into_owned()),
        _ => None,
    }
}

/// Category suggested by where the script sits in the project
pub fn default_category(script: &Path, project: &Path) -> Category {
    match first_segment(script, project).as_deref() {
        Some("backend") => Category::Backend,
        Some("frontend") => Category::Frontend,
        _ => Category::None,
    }
}

/// Top-level folder of a script inside the project, `root` for scripts at the top
pub fn folder_of(script: &Path, project: &Path) -> String {
    let Ok(relative) = script.strip_prefix(project) else {
        return ROOT_FOLDER.to_string();
    };
    if relative.components().count() <= 1 {
        return ROOT_FOLDER.to_string();
    }
    first_segment(script, project).unwrap_or_else(|| ROOT_FOLDER.to_string())
}

/// Case-insensitive match on the project-relative path, the file name or the
/// name of the folder holding the script inside the project
pub fn matches_search(entry: &ScriptEntry, project: &Path, text: &str) -> bool {
    let needle = text.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    let relative = entry.path.strip_prefix(project).unwrap_or(&entry.path);
    let relative_text = relative.to_string_lossy().replace('\\', "/").to_lowercase();
    let parent = relative
        .parent()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    relative_text.contains(&needle)
        || entry.name.to_lowercase().contains(&needle)
        || parent.contains(&needle)
}

/// Short description of the environment a run would use
pub fn environment_label(
    script: &Path,
    category: Category,
    project: Option<&Path>,
    venv_override: Option<&Path>,
) -> Option<String> {
    let cwd = script.parent()?;
    if !cwd.is_dir() {
        return None;
    }

    if category == Category::Backend {
        if let Some(activate) = venv_override.filter(|p| p.is_file()) {
            return activate
                .parent()
                .and_then(Path::parent)
                .and_then(Path::file_name)
                .map(|name| name.to_string_lossy().into_owned());
        }
    }

    let mut roots = vec![cwd];
    if let Some(project) = project.filter(|p| p.is_dir() && *p != cwd) {
        roots.push(project);
    }
    for root in roots {
        for (relative, name) in [
            (".venv/Scripts/activate", ".venv"),
            (".venv/bin/activate", ".venv"),
            ("venv/Scripts/activate", "venv"),
            ("venv/bin/activate", "venv"),
        ] {
            if root.join(relative).is_file() {
                return Some(name.to_string());
            }
        }
    }

    cwd.join("node_modules")
        .is_dir()
        .then(|| "node_modules".to_string())
}
