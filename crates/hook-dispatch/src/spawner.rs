//! Fire-and-forget execution offload.
//!
//! [`ProcessSpawner`] writes the payload to a spool file under
//! `<state>/spool`, starts `hook-runner worker <kind> --payload-file <path>`
//! as a detached child in its own process group and returns without
//! waiting. Nothing is piped to the child, so a worker that is slow to
//! start can never stall the dispatching process. The child's stdio goes to
//! the null device; its outcome is never observed by the dispatcher.
//!
//! Spawn failures are logged and swallowed: a failed offload must never
//! turn into a failed dispatch.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Mutex, PoisonError};

use serde_json::Value;
use tracing::{debug, warn};
use ulid::Ulid;

use hook_types::{resolve_plugin_root, ProjectPaths, Settings};

use crate::worker::{self, WorkerKind};

/// Worker binary location inside an installed plugin.
pub const PLUGIN_WORKER_BIN: &str = "bin/hook-runner";

/// Seam for offloading work. Implementations must never block on the work
/// itself and must never report its outcome.
pub trait Spawn: Send + Sync {
    /// Hand `payload` to a detached job of `kind`.
    fn spawn(&self, kind: WorkerKind, payload: &Value);
}

/// Spawns detached worker processes.
#[derive(Debug, Clone)]
pub struct ProcessSpawner {
    program: PathBuf,
    paths: ProjectPaths,
}

impl ProcessSpawner {
    /// Spawner running `program --project-dir <dir> worker <kind>`.
    pub fn new(program: impl Into<PathBuf>, paths: ProjectPaths) -> Self {
        Self {
            program: program.into(),
            paths,
        }
    }

    /// Spawner for the configured program, else the plugin's bundled
    /// runner, else the current executable.
    pub fn from_settings(settings: &Settings, paths: &ProjectPaths) -> Self {
        let program = worker_program(settings.spawner.program.as_deref(), &resolve_plugin_root());
        Self::new(program, paths.clone())
    }

    /// Program the spawner starts.
    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self, kind: WorkerKind, payload_file: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--project-dir")
            .arg(self.paths.project_dir())
            .arg("worker")
            .arg(kind.as_str())
            .arg("--payload-file")
            .arg(payload_file)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // Own process group: the host's signals to our group skip the worker.
            cmd.process_group(0);
        }
        cmd
    }

    fn spool(&self, kind: WorkerKind, bytes: &[u8]) -> std::io::Result<PathBuf> {
        let dir = self.paths.spool_dir();
        fs::create_dir_all(&dir)?;
        let path = dir.join(format!("{kind}-{}.json", Ulid::new()));
        fs::write(&path, bytes)?;
        Ok(path)
    }
}

/// Worker program: explicit setting, then `<plugin>/bin/hook-runner` when
/// present, then the current executable.
pub fn worker_program(configured: Option<&str>, plugin_root: &Path) -> PathBuf {
    if let Some(program) = configured.filter(|p| !p.trim().is_empty()) {
        return PathBuf::from(program);
    }
    let bundled = plugin_root.join(PLUGIN_WORKER_BIN);
    if bundled.is_file() {
        return bundled;
    }
    std::env::current_exe().unwrap_or_else(|_| PathBuf::from("hook-runner"))
}

impl Spawn for ProcessSpawner {
    fn spawn(&self, kind: WorkerKind, payload: &Value) {
        let bytes = match serde_json::to_vec(payload) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(kind = %kind, error = %e, "Failed to serialize worker payload");
                return;
            }
        };

        let payload_file = match self.spool(kind, &bytes) {
            Ok(path) => path,
            Err(e) => {
                warn!(kind = %kind, error = %e, "Failed to spool worker payload");
                return;
            }
        };

        match self.command(kind, &payload_file).spawn() {
            // The child handle is dropped without wait(); the worker outlives us.
            Ok(child) => debug!(kind = %kind, pid = child.id(), "Spawned detached worker"),
            Err(e) => {
                warn!(program = %self.program.display(), kind = %kind, error = %e, "Failed to spawn worker");
                let _ = fs::remove_file(&payload_file);
            }
        }
    }
}

/// Runs jobs in-process with the same containment as a worker process.
///
/// Used when spawning is disabled in settings.
#[derive(Debug, Clone)]
pub struct InlineSpawner {
    paths: ProjectPaths,
}

impl InlineSpawner {
    /// Inline runner writing to `paths`.
    pub fn new(paths: ProjectPaths) -> Self {
        Self { paths }
    }
}

impl Spawn for InlineSpawner {
    fn spawn(&self, kind: WorkerKind, payload: &Value) {
        worker::run_contained(kind, payload, &self.paths);
    }
}

/// Records spawn requests instead of running them.
#[derive(Debug, Default)]
pub struct RecordingSpawner {
    calls: Mutex<Vec<(WorkerKind, Value)>>,
}

impl RecordingSpawner {
    /// Empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every recorded `(kind, payload)` in call order.
    pub fn calls(&self) -> Vec<(WorkerKind, Value)> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Spawn for RecordingSpawner {
    fn spawn(&self, kind: WorkerKind, payload: &Value) {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((kind, payload.clone()));
    }
}
