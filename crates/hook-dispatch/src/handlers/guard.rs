//! Denies shell commands that destroy the machine or the user's home.

use tracing::info;

use hook_types::{Decision, Event};

use crate::error::HandlerError;
use crate::handler::{Handler, HookContext};

/// Handler name.
pub const NAME: &str = "dangerous-command-guard";

const PROTECTED_TARGETS: &[&str] = &["/", "/*", "~", "~/", "~/*", "$HOME", "${HOME}", "$HOME/", "${HOME}/"];

/// Blocks destructive `Bash` commands before they run.
#[derive(Debug, Default)]
pub struct DangerousCommandGuard;

impl Handler for DangerousCommandGuard {
    fn name(&self) -> &str {
        NAME
    }

    fn handle(&self, event: &Event, ctx: &HookContext) -> Result<Decision, HandlerError> {
        let guard = &ctx.settings().guard;
        if !guard.enabled {
            return Ok(Decision::allow());
        }
        let Some(command) = event.command() else {
            return Ok(Decision::allow());
        };

        match find_danger(command, &guard.extra_patterns) {
            Some(reason) => {
                info!(handler = NAME, reason = %reason, "Denying command");
                Ok(Decision::deny(format!("Blocked dangerous command: {reason}"))
                    .with_system_message(format!("dangerous-command-guard blocked: {reason}")))
            }
            None => Ok(Decision::allow()),
        }
    }
}

/// Reason `command` is dangerous, if it is.
pub fn find_danger(command: &str, extra_patterns: &[String]) -> Option<String> {
    let compact: String = command.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.contains(":(){") {
        return Some("fork bomb".to_string());
    }
    if compact.contains(">/dev/sd") || compact.contains(">/dev/nvme") {
        return Some("raw write to a block device".to_string());
    }
    if let Some(pattern) = extra_patterns
        .iter()
        .find(|p| !p.is_empty() && command.contains(p.as_str()))
    {
        return Some(format!("matches configured pattern '{pattern}'"));
    }

    command
        .split(['\n', ';', '&', '|'])
        .find_map(segment_danger)
}

fn segment_danger(segment: &str) -> Option<String> {
    let mut tokens: Vec<String> = segment
        .split_whitespace()
        .map(|t| t.trim_matches(|c| c == '"' || c == '\'').to_string())
        .collect();
    while tokens.first().is_some_and(|t| t == "sudo" || t == "command" || t == "exec") {
        tokens.remove(0);
    }
    let program = tokens.first()?.rsplit('/').next()?.to_string();
    let args = &tokens[1..];

    match program.as_str() {
        "rm" if is_recursive_force(args) => args
            .iter()
            .find(|a| PROTECTED_TARGETS.contains(&a.as_str()))
            .map(|target| format!("recursive forced removal of {target}")),
        p if p.starts_with("mkfs") => Some("filesystem creation".to_string()),
        "dd" if args.iter().any(|a| a.starts_with("of=/dev/")) => {
            Some("dd onto a device".to_string())
        }
        "chmod"
            if args.iter().any(|a| short_flags(a).contains('R') || a == "--recursive")
                && args.iter().any(|a| a == "777")
                && args.iter().any(|a| a == "/") =>
        {
            Some("world-writable root".to_string())
        }
        _ => None,
    }
}

fn short_flags(arg: &str) -> &str {
    match arg.strip_prefix('-') {
        Some(rest) if !rest.starts_with('-') => rest,
        _ => "",
    }
}

fn is_recursive_force(args: &[String]) -> bool {
    let recursive = args
        .iter()
        .any(|a| short_flags(a).contains(['r', 'R']) || a == "--recursive");
    let force = args.iter().any(|a| short_flags(a).contains('f') || a == "--force");
    recursive && force
}
