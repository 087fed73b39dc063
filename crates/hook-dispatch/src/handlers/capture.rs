//! Handlers that defer memory graph mutations to session end.
//!
//! Both append straight to the graph queue: the process may be the last
//! one the host runs before the session ends.

use std::path::Path;

use hook_types::{Decision, Event, QueueEntry};

use crate::error::HandlerError;
use crate::handler::{Handler, HookContext};

/// Name of the file change handler.
pub const FILE_CHANGE: &str = "file-change-capture";
/// Name of the sub-agent outcome handler.
pub const AGENT_OUTCOME: &str = "agent-outcome-capture";

const DEFAULT_AGENT_TYPE: &str = "general-purpose";

/// Graph entity name of a session.
pub fn session_entity(session_id: &str) -> String {
    if session_id.is_empty() {
        "session:unknown".to_string()
    } else {
        format!("session:{session_id}")
    }
}

/// Records which files a session modified.
#[derive(Debug, Default)]
pub struct FileChangeCapture;

impl Handler for FileChangeCapture {
    fn name(&self) -> &str {
        FILE_CHANGE
    }

    fn handle(&self, event: &Event, ctx: &HookContext) -> Result<Decision, HandlerError> {
        let Some(file_path) = event
            .input_str("file_path")
            .or_else(|| event.input_str("path"))
        else {
            return Ok(Decision::allow());
        };

        let file = format!("file:{}", relative_to(Path::new(file_path), ctx.paths().project_dir()));
        let session = session_entity(&event.session_id);

        let queue = ctx.queue();
        queue.enqueue(&QueueEntry::create_entity(&file, "file", Vec::new()))?;
        queue.enqueue(&QueueEntry::create_relation(&session, &file, "modified"))?;
        Ok(Decision::allow())
    }
}

/// Records which agents a session spawned and that they completed.
#[derive(Debug, Default)]
pub struct AgentOutcomeCapture;

impl Handler for AgentOutcomeCapture {
    fn name(&self) -> &str {
        AGENT_OUTCOME
    }

    fn handle(&self, event: &Event, ctx: &HookContext) -> Result<Decision, HandlerError> {
        let agent_type = event
            .extra_str("agent_type")
            .or_else(|| event.extra_str("subagent_type"))
            .or_else(|| event.input_str("subagent_type"))
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(DEFAULT_AGENT_TYPE);
        let agent = format!("agent:{agent_type}");
        let session = session_entity(&event.session_id);

        let mut observation = format!("completed in {session}");
        if let Some(agent_id) = event.extra_str("agent_id") {
            observation.push_str(&format!(" (agent id {agent_id})"));
        }

        let queue = ctx.queue();
        queue.enqueue(&QueueEntry::create_entity(&agent, "agent", Vec::new()))?;
        queue.enqueue(&QueueEntry::create_relation(&session, &agent, "spawned"))?;
        queue.enqueue(&QueueEntry::add_observation(&agent, vec![observation]))?;
        Ok(Decision::allow())
    }
}

fn relative_to(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .to_string_lossy()
        .into_owned()
}
