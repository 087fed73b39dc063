//! Shell command audit trail.

use serde_json::json;

use hook_types::{Decision, Event, LogCategory};

use crate::error::HandlerError;
use crate::handler::{Handler, HookContext};

/// Handler name.
pub const NAME: &str = "command-audit";

/// Appends every `Bash` command to `logs/command-audit.jsonl`.
#[derive(Debug, Default)]
pub struct CommandAudit;

impl Handler for CommandAudit {
    fn name(&self) -> &str {
        NAME
    }

    fn handle(&self, event: &Event, ctx: &HookContext) -> Result<Decision, HandlerError> {
        let Some(command) = event.command() else {
            return Ok(Decision::allow());
        };
        ctx.record(
            LogCategory::CommandAudit,
            &event.session_id,
            json!({
                "command": command,
                "description": event.input_str("description"),
                "permission_mode": event.permission_mode,
            }),
        );
        Ok(Decision::allow())
    }
}
