//! Project and plugin root resolution plus the on-disk state layout.
//!
//! Resolution order for the project root:
//! 1. `CLAUDE_PROJECT_DIR`
//! 2. the event's `cwd`
//! 3. nearest ancestor of the current directory holding the state directory
//! 4. the current directory
//!
//! Plugin root: `CLAUDE_PLUGIN_ROOT`, else the nearest ancestor of the
//! executable's directory holding `.claude-plugin/`, else that directory.

use std::env;
use std::path::{Path, PathBuf};

use crate::analytics::LogCategory;

/// Environment variable naming the project root.
pub const PROJECT_DIR_ENV: &str = "CLAUDE_PROJECT_DIR";

/// Environment variable naming the plugin install root.
pub const PLUGIN_ROOT_ENV: &str = "CLAUDE_PLUGIN_ROOT";

/// Marker directory of an installed plugin.
pub const PLUGIN_MARKER_DIR: &str = ".claude-plugin";

/// Queue file name inside `memory/`.
pub const QUEUE_FILE: &str = "graph-queue.jsonl";

/// Walk up from `start` to the first directory containing `marker`.
pub fn find_ancestor_with(start: &Path, marker: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(marker).is_dir())
        .map(Path::to_path_buf)
}

/// Resolve the project root.
pub fn resolve_project_dir(event_dir: Option<&Path>, state_dir_name: &str) -> PathBuf {
    resolve_project_dir_from(env::var_os(PROJECT_DIR_ENV).map(PathBuf::from), event_dir, state_dir_name)
}

/// Resolution with the environment value passed in explicitly.
pub fn resolve_project_dir_from(
    env_dir: Option<PathBuf>,
    event_dir: Option<&Path>,
    state_dir_name: &str,
) -> PathBuf {
    if let Some(dir) = env_dir.filter(|d| !d.as_os_str().is_empty()) {
        return dir;
    }
    if let Some(dir) = event_dir.filter(|d| !d.as_os_str().is_empty()) {
        return dir.to_path_buf();
    }
    let cwd = env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_ancestor_with(&cwd, state_dir_name).unwrap_or(cwd)
}

/// Resolve the plugin root.
pub fn resolve_plugin_root() -> PathBuf {
    let exe_dir = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));
    resolve_plugin_root_from(env::var_os(PLUGIN_ROOT_ENV).map(PathBuf::from), &exe_dir)
}

/// Plugin root resolution with the environment value and executable
/// directory passed in explicitly.
pub fn resolve_plugin_root_from(env_root: Option<PathBuf>, exe_dir: &Path) -> PathBuf {
    if let Some(dir) = env_root.filter(|d| !d.as_os_str().is_empty()) {
        return dir;
    }
    find_ancestor_with(exe_dir, PLUGIN_MARKER_DIR).unwrap_or_else(|| exe_dir.to_path_buf())
}

/// Locations of every persisted artifact for one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    project_dir: PathBuf,
    state_dir: PathBuf,
}

impl ProjectPaths {
    /// Layout for `project_dir` with the given state directory name.
    pub fn new(project_dir: impl Into<PathBuf>, state_dir_name: &str) -> Self {
        let project_dir = project_dir.into();
        let state_dir = project_dir.join(state_dir_name);
        Self {
            project_dir,
            state_dir,
        }
    }

    /// Project root.
    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    /// `<project>/.claude`
    pub fn state_dir(&self) -> &Path {
        &self.state_dir
    }

    /// `<state>/memory`
    pub fn memory_dir(&self) -> PathBuf {
        self.state_dir.join("memory")
    }

    /// `<state>/memory/graph-queue.jsonl`
    pub fn queue_path(&self) -> PathBuf {
        self.memory_dir().join(QUEUE_FILE)
    }

    /// `<state>/logs`
    pub fn logs_dir(&self) -> PathBuf {
        self.state_dir.join("logs")
    }

    /// `<state>/spool`, payload files handed to detached workers
    pub fn spool_dir(&self) -> PathBuf {
        self.state_dir.join("spool")
    }

    /// `<state>/logs/<category>.jsonl`
    pub fn log_path(&self, category: LogCategory) -> PathBuf {
        self.logs_dir().join(category.file_name())
    }
}
