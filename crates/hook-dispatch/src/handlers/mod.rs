//! Built-in handlers and the default registry.

pub mod audit;
pub mod bookkeeping;
pub mod capture;
pub mod guard;
pub mod session;

use std::sync::Arc;

use tracing::debug;

use hook_types::{EventType, Settings};

use crate::error::DispatchError;
use crate::handler::Handler;
use crate::registry::HookRegistry;

pub use audit::CommandAudit;
pub use bookkeeping::ToolBookkeeping;
pub use capture::{AgentOutcomeCapture, FileChangeCapture};
pub use guard::DangerousCommandGuard;
pub use session::{GraphQueueFlush, PendingGraphNotice};

/// The built-in table: `(event type, matcher, handler)` in registration order.
pub fn builtin_handlers() -> Vec<(EventType, &'static str, Arc<dyn Handler>)> {
    vec![
        entry(EventType::PreToolUse, "Bash", DangerousCommandGuard),
        entry(EventType::PreToolUse, "Bash", CommandAudit),
        entry(EventType::PostToolUse, "*", ToolBookkeeping),
        entry(EventType::PostToolUse, "Write|Edit|MultiEdit", FileChangeCapture),
        entry(EventType::SubagentStop, "*", AgentOutcomeCapture),
        entry(EventType::SessionStart, "*", PendingGraphNotice),
        entry(EventType::SessionEnd, "*", GraphQueueFlush),
    ]
}

fn entry<H: Handler + 'static>(
    event_type: EventType,
    matcher: &'static str,
    handler: H,
) -> (EventType, &'static str, Arc<dyn Handler>) {
    (event_type, matcher, Arc::new(handler))
}

/// Registry of every built-in handler not disabled in `settings`.
pub fn builtin_registry(settings: &Settings) -> Result<HookRegistry, DispatchError> {
    let mut registry = HookRegistry::new();
    for (event_type, matcher, handler) in builtin_handlers() {
        if !settings.handler_enabled(handler.name()) {
            debug!(handler = handler.name(), "Handler disabled by settings");
            continue;
        }
        registry.register(event_type, matcher, handler)?;
    }
    Ok(registry)
}
