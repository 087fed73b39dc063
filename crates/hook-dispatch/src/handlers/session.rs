//! Session lifecycle handlers around the graph queue.

use serde_json::json;
use tracing::info;

use hook_store::FlushReport;
use hook_types::{AggregatedOperationSet, Decision, Event};

use crate::error::HandlerError;
use crate::handler::{Handler, HookContext};

/// Name of the session start notice.
pub const PENDING_NOTICE: &str = "pending-graph-notice";
/// Name of the session end flush.
pub const QUEUE_FLUSH: &str = "graph-queue-flush";

/// Surfaces graph operations left behind by an earlier session.
#[derive(Debug, Default)]
pub struct PendingGraphNotice;

impl Handler for PendingGraphNotice {
    fn name(&self) -> &str {
        PENDING_NOTICE
    }

    fn handle(&self, _event: &Event, ctx: &HookContext) -> Result<Decision, HandlerError> {
        let pending = ctx.queue().pending();
        if pending == 0 {
            return Ok(Decision::allow());
        }
        Ok(Decision::allow().with_additional_context(format!(
            "{pending} memory graph operation(s) are pending from an earlier session. \
             They will be emitted when this session ends."
        )))
    }
}

/// Flushes the graph queue at session end and emits the aggregated set.
///
/// Only a terminal event flushes; anything else leaves the queue alone.
#[derive(Debug, Default)]
pub struct GraphQueueFlush;

impl Handler for GraphQueueFlush {
    fn name(&self) -> &str {
        QUEUE_FLUSH
    }

    fn handle(&self, event: &Event, ctx: &HookContext) -> Result<Decision, HandlerError> {
        if !event.event_type.is_terminal() {
            return Ok(Decision::allow());
        }
        let report = ctx.queue().flush()?;
        if report.is_empty() && report.corrupt_lines == 0 {
            return Ok(Decision::allow());
        }
        info!(
            session_id = %event.session_id,
            valid = report.valid_lines,
            corrupt = report.corrupt_lines,
            "Flushed graph queue"
        );

        let mut decision = Decision::allow().with_system_message(flush_message(&report));
        if !report.is_empty() {
            decision = decision.with_additional_context(render_operations(&report.set)?);
        }
        Ok(decision)
    }
}

fn flush_message(report: &FlushReport) -> String {
    let mut message = format!("Memory graph sync: {}", report.set.summary());
    if report.corrupt_lines > 0 {
        message.push_str(&format!(" ({} corrupt queue lines skipped)", report.corrupt_lines));
    }
    message
}

/// Render the set as the payloads of the downstream graph tools.
pub fn render_operations(set: &AggregatedOperationSet) -> Result<String, serde_json::Error> {
    let entities: Vec<_> = set.entities.values().collect();
    let observations: Vec<_> = set
        .observations
        .iter()
        .filter(|(_, contents)| !contents.is_empty())
        .map(|(name, contents)| json!({ "entityName": name, "contents": contents }))
        .collect();

    let body = serde_json::to_string_pretty(&json!({
        "create_entities": { "entities": entities },
        "create_relations": { "relations": set.relations },
        "add_observations": { "observations": observations },
    }))?;
    Ok(format!(
        "Apply these pending memory graph operations with the memory tools:\n{body}"
    ))
}
