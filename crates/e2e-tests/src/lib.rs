//! End-to-end test infrastructure for the hook runtime.
//!
//! Provides a shared TestHarness and helpers for scenarios that span the
//! dispatcher, the graph queue, the buffered writer and the health analyzer.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Value};

use hook_dispatch::{builtin_registry, Dispatcher, HookContext, HookRegistry, RecordingSpawner};
use hook_store::GraphQueue;
use hook_types::{Event, EventType, LogCategory, ProjectPaths, QueueEntry, Settings};

/// Shared test harness for E2E tests.
///
/// Owns a temporary project directory and a spawner that records instead
/// of forking, so dispatches stay in-process.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    /// Project layout inside the temp dir
    pub paths: ProjectPaths,
    /// Settings every dispatcher is built with
    pub settings: Settings,
    /// Spawner shared by every dispatcher of this harness
    pub spawner: Arc<RecordingSpawner>,
}

impl TestHarness {
    /// Create a new harness with default settings.
    pub fn new() -> Self {
        Self::with_settings(Settings::default())
    }

    /// Create a new harness with explicit settings.
    pub fn with_settings(settings: Settings) -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let paths = ProjectPaths::new(temp_dir.path(), &settings.state_dir_name);
        Self {
            _temp_dir: temp_dir,
            paths,
            settings,
            spawner: Arc::new(RecordingSpawner::new()),
        }
    }

    /// Fresh handler context, as a new hook process would build it.
    pub fn context(&self) -> HookContext {
        HookContext::new(self.paths.clone(), self.settings.clone())
            .with_spawner(self.spawner.clone())
    }

    /// Dispatcher over the built-in handlers.
    pub fn dispatcher(&self) -> Dispatcher {
        let registry = builtin_registry(&self.settings).expect("Built-in registry is valid");
        Dispatcher::new(registry, self.context())
    }

    /// Dispatcher over a custom registry.
    pub fn dispatcher_with(&self, registry: HookRegistry) -> Dispatcher {
        Dispatcher::new(registry, self.context())
    }

    /// The project graph queue.
    pub fn queue(&self) -> GraphQueue {
        GraphQueue::for_project(&self.paths)
    }

    /// Path of the graph queue file.
    pub fn queue_path(&self) -> PathBuf {
        self.paths.queue_path()
    }

    /// Append raw lines to the queue file, bypassing validation.
    pub fn append_raw_queue_lines(&self, lines: &[String]) {
        let path = self.queue_path();
        fs::create_dir_all(path.parent().expect("Queue path has a parent"))
            .expect("Failed to create memory dir");
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .expect("Failed to open queue");
        for line in lines {
            writeln!(file, "{line}").expect("Failed to append queue line");
        }
    }

    /// Parsed records of one analytics log, in file order.
    pub fn read_log(&self, category: LogCategory) -> Vec<Value> {
        match fs::read_to_string(self.paths.log_path(category)) {
            Ok(text) => text
                .lines()
                .filter(|l| !l.trim().is_empty())
                .map(|l| serde_json::from_str(l).expect("Log line is valid JSON"))
                .collect(),
            Err(_) => Vec::new(),
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed base timestamp for deterministic queue entries.
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0)
        .single()
        .expect("Valid base timestamp")
}

/// `count` valid queue lines cycling through all three operations, one
/// second apart.
pub fn valid_queue_lines(count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            let entry = match i % 3 {
                0 => QueueEntry::create_entity(format!("file:src/mod_{}.rs", i % 500), "file", vec![]),
                1 => QueueEntry::create_relation("session:bench", format!("file:src/mod_{}.rs", i % 500), "modified"),
                _ => QueueEntry::add_observation(
                    format!("file:src/mod_{}.rs", i % 500),
                    vec![format!("touched in step {}", i % 7)],
                ),
            };
            entry
                .with_timestamp(base_time() + Duration::seconds(i as i64))
                .to_line()
                .expect("Queue entry serializes")
        })
        .collect()
}

/// A PreToolUse Bash event.
pub fn bash_event(session_id: &str, command: &str) -> Event {
    Event::new(EventType::PreToolUse, session_id).with_tool("Bash", json!({ "command": command }))
}

/// A PostToolUse event for a file-editing tool.
pub fn edit_event(session_id: &str, tool: &str, file_path: &str) -> Event {
    Event::new(EventType::PostToolUse, session_id)
        .with_tool(tool, json!({ "file_path": file_path }))
        .with_extra("tool_response", json!({ "success": true }))
}
