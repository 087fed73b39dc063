//! Synchronous dispatch of one event through its matching handlers.
//!
//! Handlers run in registration order. Each invocation is isolated: an
//! `Err` or a panic is logged, recorded as a timing outcome and replaced by
//! the permissive [`Decision::allow`]. The first blocking decision ends the
//! chain and is returned unchanged. Otherwise results are merged:
//!
//! - the last non-empty `system_message` and `additional_context` win
//! - the last present `permission_decision` wins
//! - `suppress_output` holds only if every handler asked for it

use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, warn};
use ulid::Ulid;

use hook_store::StoreError;
use hook_types::{Decision, Event, LogCategory};

use crate::handler::{Handler, HookContext};
use crate::registry::HookRegistry;

/// How one handler invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// Returned a non-blocking decision
    Continue,
    /// Returned `continue=false`
    Blocked,
    /// Returned an error
    Error,
    /// Panicked
    Panic,
}

impl Outcome {
    /// Wire name used in timing records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Continue => "continue",
            Outcome::Blocked => "blocked",
            Outcome::Error => "error",
            Outcome::Panic => "panic",
        }
    }
}

/// Routes events to handlers and merges their verdicts.
pub struct Dispatcher {
    registry: HookRegistry,
    ctx: HookContext,
}

impl Dispatcher {
    /// Dispatcher over a fixed registry.
    pub fn new(registry: HookRegistry, ctx: HookContext) -> Self {
        Self { registry, ctx }
    }

    /// Handler context shared by every invocation.
    pub fn ctx(&self) -> &HookContext {
        &self.ctx
    }

    /// The registry.
    pub fn registry(&self) -> &HookRegistry {
        &self.registry
    }

    /// Dispatch `event` and produce the merged decision. Never fails.
    pub fn dispatch(&self, event: &Event) -> Decision {
        let dispatch_id = Ulid::new().to_string();
        let entries = self.registry.select(event);
        if entries.is_empty() {
            debug!(event_type = %event.event_type, tool = %event.tool_name, "No handler matched");
            return Decision::allow();
        }

        let mut merged = Decision::allow();
        for entry in entries {
            let started = Instant::now();
            let (decision, outcome) = invoke(entry.handler(), event, &self.ctx);
            let duration_ms = started.elapsed().as_millis() as u64;

            self.ctx.record(
                LogCategory::HookTiming,
                &event.session_id,
                json!({
                    "dispatch_id": dispatch_id,
                    "event_type": event.event_type.as_str(),
                    "tool_name": event.tool_name,
                    "handler": entry.name(),
                    "duration_ms": duration_ms,
                    "outcome": outcome.as_str(),
                }),
            );

            if outcome == Outcome::Blocked {
                info!(handler = entry.name(), event_type = %event.event_type, "Handler blocked event");
                return decision;
            }
            merge(&mut merged, decision);
        }
        merged
    }

    /// Flush buffered analytics writes.
    pub fn flush(&self) -> Result<usize, StoreError> {
        self.ctx.writer().flush()
    }
}

fn invoke(handler: &dyn Handler, event: &Event, ctx: &HookContext) -> (Decision, Outcome) {
    match panic::catch_unwind(AssertUnwindSafe(|| handler.handle(event, ctx))) {
        Ok(Ok(decision)) if decision.is_blocking() => (decision, Outcome::Blocked),
        Ok(Ok(decision)) => (decision, Outcome::Continue),
        Ok(Err(e)) => {
            warn!(handler = handler.name(), error = %e, "Handler failed, continuing");
            (Decision::allow(), Outcome::Error)
        }
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "non-string panic payload".to_string());
            warn!(handler = handler.name(), panic = %message, "Handler panicked, continuing");
            (Decision::allow(), Outcome::Panic)
        }
    }
}

fn merge(merged: &mut Decision, next: Decision) {
    merged.suppress_output &= next.suppress_output;
    if let Some(message) = next.system_message.filter(|m| !m.is_empty()) {
        merged.system_message = Some(message);
    }
    if let Some(context) = next.additional_context.filter(|c| !c.is_empty()) {
        merged.additional_context = Some(context);
    }
    if next.permission_decision.is_some() {
        merged.permission_decision = next.permission_decision;
    }
}
