//! Handler verdicts and the wire format written back to the host.

use serde::{Deserialize, Serialize};

use crate::event::EventType;

/// Permission verdict for tool events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionDecision {
    /// Let the tool run without prompting
    Allow,
    /// Block the tool
    Deny,
    /// Ask the user
    Ask,
}

/// Verdict of one handler, or of a whole dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Decision {
    /// Whether the host should proceed (`continue` on the wire)
    #[serde(rename = "continue")]
    pub proceed: bool,

    /// Hide handler output from the transcript
    pub suppress_output: bool,

    /// Message shown to the user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,

    /// Why the host should stop (only meaningful when `proceed` is false)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,

    /// Permission verdict for tool events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_decision: Option<PermissionDecision>,

    /// Text injected into the model context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<String>,
}

impl Default for Decision {
    fn default() -> Self {
        Self::allow()
    }
}

impl Decision {
    /// Permissive default: continue, output suppressed.
    pub fn allow() -> Self {
        Self {
            proceed: true,
            suppress_output: true,
            system_message: None,
            stop_reason: None,
            permission_decision: None,
            additional_context: None,
        }
    }

    /// Block the current action.
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            proceed: false,
            suppress_output: false,
            system_message: None,
            stop_reason: Some(reason.into()),
            permission_decision: Some(PermissionDecision::Deny),
            additional_context: None,
        }
    }

    /// Set a user-visible message (and stop suppressing output).
    pub fn with_system_message(mut self, message: impl Into<String>) -> Self {
        self.system_message = Some(message.into());
        self.suppress_output = false;
        self
    }

    /// Set text for the model context.
    pub fn with_additional_context(mut self, context: impl Into<String>) -> Self {
        self.additional_context = Some(context.into());
        self
    }

    /// Set a permission verdict.
    pub fn with_permission(mut self, permission: PermissionDecision) -> Self {
        self.permission_decision = Some(permission);
        self
    }

    /// Whether this decision blocks further handlers.
    pub fn is_blocking(&self) -> bool {
        !self.proceed
    }

    /// Convert to the host wire format for the given event.
    pub fn to_output(&self, event_type: EventType) -> HookOutput {
        let specific = if self.permission_decision.is_some() || self.additional_context.is_some() {
            Some(HookSpecificOutput {
                hook_event_name: event_type.as_str().to_string(),
                permission_decision: self.permission_decision,
                permission_decision_reason: self
                    .permission_decision
                    .filter(|p| *p != PermissionDecision::Allow)
                    .and(self.stop_reason.clone()),
                additional_context: self.additional_context.clone(),
            })
        } else {
            None
        };

        HookOutput {
            proceed: self.proceed,
            suppress_output: self.suppress_output,
            system_message: self.system_message.clone(),
            stop_reason: self.stop_reason.clone(),
            hook_specific_output: specific,
        }
    }
}

/// JSON object printed on stdout for the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookOutput {
    /// Whether the host should proceed
    #[serde(rename = "continue")]
    pub proceed: bool,

    /// Hide output from the transcript
    pub suppress_output: bool,

    /// Message shown to the user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,

    /// Stop reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,

    /// Event-specific output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hook_specific_output: Option<HookSpecificOutput>,
}

impl HookOutput {
    /// Output used whenever anything inside the runtime fails.
    pub fn fail_open() -> Self {
        Decision::allow().to_output(EventType::Unknown)
    }

    /// Serialize to a single JSON line. Never fails.
    pub fn to_json_line(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"continue":true,"suppressOutput":true}"#.to_string())
    }
}

/// Event-specific section of [`HookOutput`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookSpecificOutput {
    /// Host event name this output answers
    pub hook_event_name: String,

    /// Permission verdict
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_decision: Option<PermissionDecision>,

    /// Reason for a deny/ask verdict
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_decision_reason: Option<String>,

    /// Text injected into the model context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional_context: Option<String>,
}
