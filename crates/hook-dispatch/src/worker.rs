//! Background jobs run by detached worker processes.
//!
//! A worker is `hook-runner worker <kind> --payload-file <spooled json>`.
//! It owns its own [`BufferedWriter`], never prints, and contains every
//! failure: errors become a `worker-errors` record instead of surfacing to
//! anyone.

use std::fmt;
use std::str::FromStr;

use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use hook_store::BufferedWriter;
use hook_types::{AnalyticsRecord, Event, LogCategory, ProjectPaths};

use crate::error::HandlerError;

/// Closed set of deferred jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerKind {
    /// Post-tool analytics: tool usage, agent spawns, skill invocations
    ToolBookkeeping,
}

impl WorkerKind {
    /// CLI name of the job.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerKind::ToolBookkeeping => "tool-bookkeeping",
        }
    }
}

impl fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkerKind {
    type Err = HandlerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "tool-bookkeeping" => Ok(WorkerKind::ToolBookkeeping),
            other => Err(HandlerError::failed(format!("unknown worker kind: {other}"))),
        }
    }
}

/// `tool_input` fields whose values `tool-bookkeeping` reads.
const BOOKKEEPING_INPUT_FIELDS: [&str; 5] = ["subagent_type", "description", "skill", "command", "args"];

/// The part of a post-tool event the `tool-bookkeeping` job reads.
///
/// Tool inputs and responses can carry whole files; only the input keys,
/// a few short string fields and the error flags of the response are kept.
pub fn bookkeeping_payload(event: &Event) -> Value {
    let tool_input: Map<String, Value> = event
        .tool_input
        .iter()
        .map(|(key, value)| {
            let kept = BOOKKEEPING_INPUT_FIELDS.contains(&key.as_str()) && value.is_string();
            (key.clone(), if kept { value.clone() } else { Value::Null })
        })
        .collect();

    let mut payload = json!({
        "hook_event_name": event.event_type,
        "session_id": event.session_id,
        "tool_name": event.tool_name,
        "tool_input": tool_input,
    });
    if let Some(response) = event.extra.get("tool_response") {
        let mut flags = Map::new();
        if response.get("error").is_some() {
            flags.insert("error".to_string(), Value::Bool(true));
        }
        if let Some(is_error) = response.get("is_error") {
            flags.insert("is_error".to_string(), is_error.clone());
        }
        payload["tool_response"] = Value::Object(flags);
    }
    payload
}

/// Run one job, writing through `writer`.
pub fn run_job(kind: WorkerKind, payload: &Value, writer: &BufferedWriter) -> Result<(), HandlerError> {
    match kind {
        WorkerKind::ToolBookkeeping => {
            let event: Event = serde_json::from_value(payload.clone())?;
            tool_bookkeeping(&event, writer)
        }
    }
}

/// Run one job with full error containment and flush its writes.
///
/// Never returns an error; failures are recorded in `worker-errors.jsonl`
/// and logged.
pub fn run_contained(kind: WorkerKind, payload: &Value, paths: &ProjectPaths) {
    let writer = BufferedWriter::for_project(paths);
    if let Err(e) = run_job(kind, payload, &writer) {
        warn!(kind = %kind, error = %e, "Worker job failed");
        let session_id = payload
            .get("session_id")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let record = AnalyticsRecord::new(
            LogCategory::WorkerErrors,
            session_id,
            json!({ "kind": kind.as_str(), "error": e.to_string() }),
        );
        if let Err(e) = writer.write_record(&record) {
            warn!(error = %e, "Could not record worker error");
        }
    }
    if let Err(e) = writer.flush() {
        warn!(kind = %kind, error = %e, "Worker flush failed");
    }
}

fn tool_bookkeeping(event: &Event, writer: &BufferedWriter) -> Result<(), HandlerError> {
    if event.tool_name.is_empty() {
        return Err(HandlerError::failed("tool bookkeeping needs a tool event"));
    }

    let succeeded = event
        .extra
        .get("tool_response")
        .map(|r| r.get("error").is_none() && r.get("is_error") != Some(&Value::Bool(true)))
        .unwrap_or(true);

    writer.write_record(&AnalyticsRecord::new(
        LogCategory::ToolUsage,
        &event.session_id,
        json!({
            "tool": event.tool_name,
            "input_keys": event.tool_input.keys().collect::<Vec<_>>(),
            "succeeded": succeeded,
        }),
    ))?;

    match event.tool_name.as_str() {
        "Task" | "Agent" => {
            writer.write_record(&AnalyticsRecord::new(
                LogCategory::AgentSpawns,
                &event.session_id,
                json!({
                    "subagent_type": event.input_str("subagent_type").unwrap_or("general-purpose"),
                    "description": event.input_str("description").unwrap_or_default(),
                }),
            ))?;
        }
        "Skill" => {
            let skill = event
                .input_str("skill")
                .or_else(|| event.input_str("command"))
                .unwrap_or("unknown");
            writer.write_record(&AnalyticsRecord::new(
                LogCategory::SkillInvocations,
                &event.session_id,
                json!({ "skill": skill, "args": event.input_str("args") }),
            ))?;
        }
        _ => {}
    }

    debug!(tool = %event.tool_name, "Recorded tool bookkeeping");
    Ok(())
}
