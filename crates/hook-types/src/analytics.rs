//! Analytics records appended to per-category log files.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Log category. Each category is its own `logs/<name>.jsonl` file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogCategory {
    /// One record per handler invocation
    HookTiming,
    /// Tool calls seen after they ran
    ToolUsage,
    /// Subagent spawns (Task tool)
    AgentSpawns,
    /// Skill invocations (Skill tool)
    SkillInvocations,
    /// Shell commands seen before they ran
    CommandAudit,
    /// Failures inside detached workers
    WorkerErrors,
}

impl LogCategory {
    /// File stem for this category.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogCategory::HookTiming => "hook-timing",
            LogCategory::ToolUsage => "tool-usage",
            LogCategory::AgentSpawns => "agent-spawns",
            LogCategory::SkillInvocations => "skill-invocations",
            LogCategory::CommandAudit => "command-audit",
            LogCategory::WorkerErrors => "worker-errors",
        }
    }

    /// File name (`<stem>.jsonl`).
    pub fn file_name(&self) -> String {
        format!("{}.jsonl", self.as_str())
    }
}

/// One write-once analytics line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsRecord {
    /// When the record was produced
    pub ts: DateTime<Utc>,
    /// Category the record belongs to
    pub category: LogCategory,
    /// Session the record belongs to
    #[serde(default)]
    pub session_id: String,
    /// Category-specific fields
    #[serde(default)]
    pub data: Value,
}

impl AnalyticsRecord {
    /// Create a record stamped now.
    pub fn new(category: LogCategory, session_id: impl Into<String>, data: Value) -> Self {
        Self {
            ts: Utc::now(),
            category,
            session_id: session_id.into(),
            data,
        }
    }
}
