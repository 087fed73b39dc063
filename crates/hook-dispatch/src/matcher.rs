//! Matcher patterns for registry entries.
//!
//! A matcher is one or more `|`-separated alternatives:
//!
//! - `*` (or an empty matcher) matches every event
//! - a plain word matches the tool name exactly (`Bash`) or the compound
//!   key exactly (`pretool/bash`)
//! - anything containing `*`, `?` or `[` is a glob tried against the tool
//!   name and the compound key (`pretool/bash*`, `mcp__memory__*`); the key
//!   is also tried with a trailing `/` so `pretool/bash/*` covers every
//!   `Bash` pre-tool event

use std::fmt;

use hook_types::Event;

#[derive(Debug, Clone)]
enum Alternative {
    Any,
    Exact(String),
    Glob(glob::Pattern),
    Never,
}

/// Compiled matcher. Evaluation is deterministic and side-effect free.
#[derive(Debug, Clone)]
pub struct Matcher {
    raw: String,
    alternatives: Vec<Alternative>,
}

impl Matcher {
    /// Compile a matcher. Invalid glob alternatives never match.
    pub fn new(raw: &str) -> Self {
        let trimmed = raw.trim();
        let alternatives = if trimmed.is_empty() {
            vec![Alternative::Any]
        } else {
            trimmed.split('|').map(str::trim).map(compile).collect()
        };
        Self {
            raw: trimmed.to_string(),
            alternatives,
        }
    }

    /// Matcher that applies to every event.
    pub fn any() -> Self {
        Self::new("*")
    }

    /// The pattern as registered.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether this matcher applies to `event`.
    pub fn matches(&self, event: &Event) -> bool {
        let key = event.compound_key();
        let scope = format!("{key}/");
        self.alternatives.iter().any(|alt| match alt {
            Alternative::Any => true,
            Alternative::Exact(s) => *s == event.tool_name || s.eq_ignore_ascii_case(&key),
            Alternative::Glob(p) => {
                p.matches(&event.tool_name) || p.matches(&key) || p.matches(&scope)
            }
            Alternative::Never => false,
        })
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn compile(alt: &str) -> Alternative {
    if alt.is_empty() || alt == "*" {
        return Alternative::Any;
    }
    if !alt.contains(['*', '?', '[']) {
        return Alternative::Exact(alt.to_string());
    }
    match glob::Pattern::new(alt) {
        Ok(pattern) => Alternative::Glob(pattern),
        Err(e) => {
            tracing::warn!(
                pattern = %alt,
                error = %e,
                "invalid matcher glob, alternative will never match"
            );
            Alternative::Never
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hook_types::EventType;
    use serde_json::json;

    fn tool_event(event_type: EventType, tool: &str) -> Event {
        Event::new(event_type, "s").with_tool(tool, json!({}))
    }

    #[test]
    fn test_wildcard_and_empty() {
        let event = Event::new(EventType::SessionStart, "s");
        assert!(Matcher::new("*").matches(&event));
        assert!(Matcher::new("").matches(&event));
        assert!(Matcher::any().matches(&tool_event(EventType::PreToolUse, "Read")));
    }

    #[test]
    fn test_exact_tool_name_is_case_sensitive() {
        let event = tool_event(EventType::PreToolUse, "Bash");
        assert!(Matcher::new("Bash").matches(&event));
        assert!(!Matcher::new("bash").matches(&event));
        assert!(!Matcher::new("Read").matches(&event));
    }

    #[test]
    fn test_exact_compound_key() {
        let event = tool_event(EventType::PreToolUse, "Bash");
        assert!(Matcher::new("pretool/bash").matches(&event));
        assert!(!Matcher::new("posttool/bash").matches(&event));
    }

    #[test]
    fn test_glob_on_compound_key() {
        let matcher = Matcher::new("pretool/*");
        assert!(matcher.matches(&tool_event(EventType::PreToolUse, "Bash")));
        assert!(matcher.matches(&tool_event(EventType::PreToolUse, "Write")));
        assert!(!matcher.matches(&tool_event(EventType::PostToolUse, "Bash")));
    }

    #[test]
    fn test_trailing_segment_glob_covers_tool() {
        let matcher = Matcher::new("pretool/bash/*");
        assert!(matcher.matches(&tool_event(EventType::PreToolUse, "Bash")));
        assert!(!matcher.matches(&tool_event(EventType::PreToolUse, "Write")));
        assert!(!matcher.matches(&tool_event(EventType::PostToolUse, "Bash")));
        assert!(!matcher.matches(&Event::new(EventType::PreToolUse, "s")));
    }

    #[test]
    fn test_glob_on_tool_name() {
        let matcher = Matcher::new("mcp__memory__*");
        assert!(matcher.matches(&tool_event(EventType::PostToolUse, "mcp__memory__create_entities")));
        assert!(!matcher.matches(&tool_event(EventType::PostToolUse, "mcp__github__list")));
    }

    #[test]
    fn test_alternatives() {
        let matcher = Matcher::new("Write|Edit | MultiEdit");
        assert!(matcher.matches(&tool_event(EventType::PostToolUse, "Edit")));
        assert!(matcher.matches(&tool_event(EventType::PostToolUse, "MultiEdit")));
        assert!(!matcher.matches(&tool_event(EventType::PostToolUse, "Read")));
        assert_eq!(matcher.as_str(), "Write|Edit | MultiEdit");
    }

    #[test]
    fn test_invalid_glob_never_matches() {
        let matcher = Matcher::new("[unclosed*");
        assert!(!matcher.matches(&tool_event(EventType::PreToolUse, "[unclosed")));

        let matcher = Matcher::new("[unclosed*|Bash");
        assert!(matcher.matches(&tool_event(EventType::PreToolUse, "Bash")));
    }

    #[test]
    fn test_toolless_event_against_category() {
        let event = Event::new(EventType::SessionEnd, "s");
        assert!(Matcher::new("session-end").matches(&event));
        assert!(!Matcher::new("Bash").matches(&event));
    }
}
