//! Offloads post-tool analytics to a detached worker.

use tracing::debug;

use hook_types::{Decision, Event};

use crate::error::HandlerError;
use crate::handler::{Handler, HookContext};
use crate::worker::{bookkeeping_payload, WorkerKind};

/// Handler name.
pub const NAME: &str = "tool-bookkeeping";

/// Hands every finished tool call to a `tool-bookkeeping` worker and
/// answers immediately.
#[derive(Debug, Default)]
pub struct ToolBookkeeping;

impl Handler for ToolBookkeeping {
    fn name(&self) -> &str {
        NAME
    }

    fn handle(&self, event: &Event, ctx: &HookContext) -> Result<Decision, HandlerError> {
        let payload = bookkeeping_payload(event);
        ctx.spawner().spawn(WorkerKind::ToolBookkeeping, &payload);
        debug!(tool = %event.tool_name, "Queued tool bookkeeping");
        Ok(Decision::allow())
    }
}
