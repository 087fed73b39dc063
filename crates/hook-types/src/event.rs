//! Host lifecycle events delivered to the hook runtime.
//!
//! One event arrives on stdin per invocation. The host's field names are
//! `hook_event_name` and `cwd`; the shorter `event_type` / `project_dir`
//! spellings are accepted as aliases. Unknown top-level fields are kept in
//! [`Event::extra`] so handlers can read host-specific data without the
//! contract having to list it.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lifecycle points the host can report.
///
/// Closed set: any name the host sends that is not listed here
/// deserializes to [`EventType::Unknown`] instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum EventType {
    /// Before a tool runs; handlers may deny it
    PreToolUse,
    /// After a tool returned
    PostToolUse,
    /// Host is about to show a permission prompt
    PermissionRequest,
    /// User submitted a prompt
    UserPromptSubmit,
    /// Session started (startup, resume, compact)
    SessionStart,
    /// Session ended; terminal event
    SessionEnd,
    /// Main agent finished a turn
    Stop,
    /// Subagent started
    SubagentStart,
    /// Subagent finished
    SubagentStop,
    /// Host notification
    Notification,
    /// Before context compaction
    PreCompact,
    /// Anything else
    #[default]
    #[serde(other)]
    Unknown,
}

impl EventType {
    /// Every known event type, in registry order.
    pub const ALL: [EventType; 12] = [
        EventType::PreToolUse,
        EventType::PostToolUse,
        EventType::PermissionRequest,
        EventType::UserPromptSubmit,
        EventType::SessionStart,
        EventType::SessionEnd,
        EventType::Stop,
        EventType::SubagentStart,
        EventType::SubagentStop,
        EventType::Notification,
        EventType::PreCompact,
        EventType::Unknown,
    ];

    /// Host-facing name (e.g. `PreToolUse`).
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::PreToolUse => "PreToolUse",
            EventType::PostToolUse => "PostToolUse",
            EventType::PermissionRequest => "PermissionRequest",
            EventType::UserPromptSubmit => "UserPromptSubmit",
            EventType::SessionStart => "SessionStart",
            EventType::SessionEnd => "SessionEnd",
            EventType::Stop => "Stop",
            EventType::SubagentStart => "SubagentStart",
            EventType::SubagentStop => "SubagentStop",
            EventType::Notification => "Notification",
            EventType::PreCompact => "PreCompact",
            EventType::Unknown => "Unknown",
        }
    }

    /// Short category used as the first segment of compound matcher keys.
    pub fn category(&self) -> &'static str {
        match self {
            EventType::PreToolUse => "pretool",
            EventType::PostToolUse => "posttool",
            EventType::PermissionRequest => "permission",
            EventType::UserPromptSubmit => "prompt",
            EventType::SessionStart => "session-start",
            EventType::SessionEnd => "session-end",
            EventType::Stop => "stop",
            EventType::SubagentStart => "subagent-start",
            EventType::SubagentStop => "subagent-stop",
            EventType::Notification => "notification",
            EventType::PreCompact => "precompact",
            EventType::Unknown => "unknown",
        }
    }

    /// Parse either the host name or the category, case-insensitively.
    ///
    /// Unrecognized names map to [`EventType::Unknown`].
    pub fn from_name(name: &str) -> Self {
        let trimmed = name.trim();
        Self::ALL
            .into_iter()
            .find(|t| {
                t.as_str().eq_ignore_ascii_case(trimmed) || t.category().eq_ignore_ascii_case(trimmed)
            })
            .unwrap_or(EventType::Unknown)
    }

    /// Whether this event ends the session.
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventType::SessionEnd)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single host-originated occurrence. Immutable for the invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Event {
    /// Lifecycle point
    #[serde(default, rename = "hook_event_name", alias = "event_type")]
    pub event_type: EventType,

    /// Tool name for tool events (empty otherwise)
    #[serde(default)]
    pub tool_name: String,

    /// Tool arguments as sent by the host
    #[serde(default)]
    pub tool_input: Map<String, Value>,

    /// Session identifier
    #[serde(default)]
    pub session_id: String,

    /// Project directory the host is working in
    #[serde(default, rename = "cwd", alias = "project_dir", skip_serializing_if = "Option::is_none")]
    pub project_dir: Option<PathBuf>,

    /// Host permission mode (default, plan, acceptEdits, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_mode: Option<String>,

    /// Every other top-level field
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Event {
    /// Create an event without a tool.
    pub fn new(event_type: EventType, session_id: impl Into<String>) -> Self {
        Self {
            event_type,
            session_id: session_id.into(),
            ..Default::default()
        }
    }

    /// Set the tool name and input.
    pub fn with_tool(mut self, tool_name: impl Into<String>, tool_input: Value) -> Self {
        self.tool_name = tool_name.into();
        self.tool_input = match tool_input {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self
    }

    /// Set the project directory.
    pub fn with_project_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.project_dir = Some(dir.into());
        self
    }

    /// Add an extra top-level field.
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Parse an event from raw stdin text.
    pub fn from_json(input: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(input.trim())
    }

    /// Compound `category/tool` key, or just the category for toolless events.
    pub fn compound_key(&self) -> String {
        if self.tool_name.is_empty() {
            self.event_type.category().to_string()
        } else {
            format!(
                "{}/{}",
                self.event_type.category(),
                self.tool_name.to_ascii_lowercase()
            )
        }
    }

    /// String field from `tool_input`.
    pub fn input_str(&self, key: &str) -> Option<&str> {
        self.tool_input.get(key).and_then(Value::as_str)
    }

    /// String field from the extra host fields.
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }

    /// The shell command of a `Bash` tool call.
    pub fn command(&self) -> Option<&str> {
        self.input_str("command")
    }
}
