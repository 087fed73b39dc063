//! Handler trait and execution context.

use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use hook_store::{BufferedWriter, GraphQueue};
use hook_types::{AnalyticsRecord, Decision, Event, LogCategory, ProjectPaths, Settings};

use crate::error::HandlerError;
use crate::spawner::{InlineSpawner, ProcessSpawner, Spawn};

/// Everything a handler may touch during one invocation.
///
/// Owns the process-scoped [`BufferedWriter`]; the queue and logs are the
/// only state that outlives the process.
pub struct HookContext {
    paths: ProjectPaths,
    settings: Settings,
    writer: BufferedWriter,
    queue: GraphQueue,
    spawner: Arc<dyn Spawn>,
}

impl HookContext {
    /// Context for a project. The spawner follows `settings.spawner.enabled`.
    pub fn new(paths: ProjectPaths, settings: Settings) -> Self {
        let spawner: Arc<dyn Spawn> = if settings.spawner.enabled {
            Arc::new(ProcessSpawner::from_settings(&settings, &paths))
        } else {
            Arc::new(InlineSpawner::new(paths.clone()))
        };
        Self {
            writer: BufferedWriter::for_project(&paths),
            queue: GraphQueue::for_project(&paths),
            paths,
            settings,
            spawner,
        }
    }

    /// Replace the spawner.
    pub fn with_spawner(mut self, spawner: Arc<dyn Spawn>) -> Self {
        self.spawner = spawner;
        self
    }

    /// Project layout.
    pub fn paths(&self) -> &ProjectPaths {
        &self.paths
    }

    /// Loaded settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Process-scoped buffered writer.
    pub fn writer(&self) -> &BufferedWriter {
        &self.writer
    }

    /// Project graph queue.
    pub fn queue(&self) -> &GraphQueue {
        &self.queue
    }

    /// Fire-and-forget spawner.
    pub fn spawner(&self) -> &dyn Spawn {
        self.spawner.as_ref()
    }

    /// Buffer an analytics record. Failures are logged, never raised.
    pub fn record(&self, category: LogCategory, session_id: &str, data: Value) {
        let record = AnalyticsRecord::new(category, session_id, data);
        if let Err(e) = self.writer.write_record(&record) {
            warn!(category = category.as_str(), error = %e, "Dropping analytics record");
        }
    }
}

/// A unit of logic registered against an event matcher.
pub trait Handler: Send + Sync {
    /// Unique name within its event type.
    fn name(&self) -> &str;

    /// Produce a verdict for `event`.
    fn handle(&self, event: &Event, ctx: &HookContext) -> Result<Decision, HandlerError>;
}

/// Handler backed by a closure.
pub struct FnHandler<F> {
    name: String,
    f: F,
}

impl<F> Handler for FnHandler<F>
where
    F: Fn(&Event, &HookContext) -> Result<Decision, HandlerError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, event: &Event, ctx: &HookContext) -> Result<Decision, HandlerError> {
        (self.f)(event, ctx)
    }
}

/// Wrap a closure as a shareable handler.
pub fn handler_fn<F>(name: impl Into<String>, f: F) -> Arc<dyn Handler>
where
    F: Fn(&Event, &HookContext) -> Result<Decision, HandlerError> + Send + Sync + 'static,
{
    Arc::new(FnHandler {
        name: name.into(),
        f,
    })
}
