//! Command implementations for the hook runner.
//!
//! `run` and `worker` are invoked by the host and must never fail visibly:
//! `run` always prints a valid output line, `worker` never prints at all.
//! The remaining commands are for scripts and humans and report errors.

use std::fs;
use std::io::{self, Read};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

use hook_dispatch::{builtin_registry, run_contained, Dispatcher, HookContext, WorkerKind};
use hook_store::{analyze, GraphQueue, HealthAnalyzer};
use hook_types::{
    resolve_project_dir, Event, EventType, GraphOp, HookOutput, ProjectPaths, QueueEntry, Settings,
};

/// Options shared by every command.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Explicit project root
    pub project_dir: Option<PathBuf>,
    /// Extra config file
    pub config: Option<String>,
    /// Log level override
    pub log_level: Option<String>,
}

impl RunOptions {
    /// Project root: the explicit flag, else the usual resolution.
    fn project_dir(&self, event_dir: Option<&Path>) -> PathBuf {
        self.project_dir
            .clone()
            .unwrap_or_else(|| resolve_project_dir(event_dir, &Settings::default().state_dir_name))
    }

    /// Settings and paths for a project. Config errors fall back to defaults
    /// and are reported once logging is up.
    fn load(&self, event_dir: Option<&Path>) -> (Settings, ProjectPaths) {
        let project_dir = self.project_dir(event_dir);
        let (settings, error) = Settings::load_or_default(Some(&project_dir), self.config.as_deref());
        init_logging(self.log_level.as_deref(), &settings.log_level);
        if let Some(e) = error {
            warn!(error = %e, "Falling back to default settings");
        }
        let paths = ProjectPaths::new(project_dir, &settings.state_dir_name);
        (settings, paths)
    }
}

/// Install the stderr subscriber. `RUST_LOG` wins, then the CLI flag, then
/// the configured level. Later calls are no-ops.
pub fn init_logging(cli_level: Option<&str>, configured_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli_level.unwrap_or(configured_level)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

/// `hook-runner run`: read stdin, dispatch, print one output line.
pub fn run_hook(opts: &RunOptions, event_override: Option<&str>) {
    let mut input = String::new();
    let output = match io::stdin().read_to_string(&mut input) {
        Ok(_) => run_event(&input, event_override, opts),
        Err(e) => {
            init_logging(opts.log_level.as_deref(), "warn");
            warn!(error = %e, "Could not read event from stdin");
            HookOutput::fail_open()
        }
    };
    println!("{}", output.to_json_line());
}

/// Dispatch one raw event. Any failure, including a panic, yields the
/// permissive output.
pub fn run_event(input: &str, event_override: Option<&str>, opts: &RunOptions) -> HookOutput {
    match panic::catch_unwind(AssertUnwindSafe(|| try_run_event(input, event_override, opts))) {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            init_logging(opts.log_level.as_deref(), "warn");
            warn!(error = %e, "Hook run failed, continuing");
            HookOutput::fail_open()
        }
        Err(_) => {
            init_logging(opts.log_level.as_deref(), "warn");
            warn!("Hook run panicked, continuing");
            HookOutput::fail_open()
        }
    }
}

fn try_run_event(input: &str, event_override: Option<&str>, opts: &RunOptions) -> Result<HookOutput> {
    let mut event = Event::from_json(input).context("Failed to parse hook event")?;
    if let Some(name) = event_override {
        event.event_type = EventType::from_name(name);
    }

    let (settings, paths) = opts.load(event.project_dir.as_deref());
    let registry = builtin_registry(&settings).context("Invalid handler registry")?;
    let dispatcher = Dispatcher::new(registry, HookContext::new(paths, settings));

    let decision = dispatcher.dispatch(&event);
    if let Err(e) = dispatcher.flush() {
        warn!(error = %e, "Failed to flush analytics");
    }
    debug!(event_type = %event.event_type, proceed = decision.proceed, "Dispatched event");
    Ok(decision.to_output(event.event_type))
}

/// `hook-runner worker <kind>`: run one detached job. Never prints.
///
/// The payload comes from the spooled `payload_file`, which is removed once
/// read, or from stdin when no file is given.
pub fn run_worker(opts: &RunOptions, kind: &str, payload_file: Option<&Path>) {
    let (_, paths) = opts.load(None);
    let payload = read_worker_payload(payload_file);
    let kind: WorkerKind = match kind.parse() {
        Ok(kind) => kind,
        Err(e) => {
            warn!(error = %e, "Ignoring worker invocation");
            return;
        }
    };
    run_contained(kind, &payload, &paths);
}

fn read_worker_payload(payload_file: Option<&Path>) -> Value {
    let input = match payload_file {
        Some(path) => {
            let read = fs::read_to_string(path);
            if let Err(e) = fs::remove_file(path) {
                warn!(path = %path.display(), error = %e, "Could not remove spooled payload");
            }
            read
        }
        None => {
            let mut input = String::new();
            io::stdin().read_to_string(&mut input).map(|_| input)
        }
    };
    match input {
        Ok(input) => serde_json::from_str(&input).unwrap_or(Value::Null),
        Err(e) => {
            warn!(error = %e, "Could not read worker payload");
            Value::Null
        }
    }
}

/// `hook-runner enqueue <op> <payload>`: append one graph mutation.
pub fn enqueue(opts: &RunOptions, op: &str, payload: &str) -> Result<()> {
    let (_, paths) = opts.load(None);
    let op = GraphOp::from_name(op).ok_or_else(|| anyhow!("Unknown graph operation: {op}"))?;
    let payload: Value = serde_json::from_str(payload).context("Payload is not valid JSON")?;
    let entry = QueueEntry::new(op, payload).context("Invalid payload")?;

    GraphQueue::for_project(&paths)
        .enqueue(&entry)
        .context("Failed to append to graph queue")?;
    Ok(())
}

/// `hook-runner flush`: aggregate and clear the queue, print the report.
pub fn flush(opts: &RunOptions) -> Result<()> {
    let (_, paths) = opts.load(None);
    let report = GraphQueue::for_project(&paths)
        .flush()
        .context("Failed to flush graph queue")?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// `hook-runner health`: print project health, or stats for one file.
pub fn health(opts: &RunOptions, file: Option<&Path>) -> Result<()> {
    let (settings, paths) = opts.load(None);
    let json = match file {
        Some(path) => serde_json::to_string_pretty(&analyze(path))?,
        None => serde_json::to_string_pretty(
            &HealthAnalyzer::new(paths, settings.health).check_health(),
        )?,
    };
    println!("{json}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn opts(dir: &TempDir) -> RunOptions {
        RunOptions {
            project_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        }
    }

    #[test]
    fn test_invalid_json_fails_open() {
        let dir = TempDir::new().unwrap();
        let output = run_event("not json at all", None, &opts(&dir));
        assert_eq!(output, HookOutput::fail_open());
        assert!(output.proceed);
    }

    #[test]
    fn test_empty_input_fails_open() {
        let dir = TempDir::new().unwrap();
        assert_eq!(run_event("", None, &opts(&dir)), HookOutput::fail_open());
    }

    #[test]
    fn test_dangerous_command_is_denied() {
        let dir = TempDir::new().unwrap();
        let input = r#"{"hook_event_name":"PreToolUse","session_id":"s-1","tool_name":"Bash","tool_input":{"command":"rm -rf /"}}"#;

        let output = run_event(input, None, &opts(&dir));
        assert!(!output.proceed);
        let specific = output.hook_specific_output.unwrap();
        assert_eq!(specific.hook_event_name, "PreToolUse");
        assert!(specific.permission_decision_reason.unwrap().contains("recursive forced removal"));

        let audit = dir.path().join(".claude/logs/command-audit.jsonl");
        assert!(!audit.exists(), "audit runs after the guard and must be skipped");
        let timing = fs::read_to_string(dir.path().join(".claude/logs/hook-timing.jsonl")).unwrap();
        assert!(timing.contains("\"outcome\":\"blocked\""));
    }

    #[test]
    fn test_safe_command_is_audited() {
        let dir = TempDir::new().unwrap();
        let input = r#"{"hook_event_name":"PreToolUse","session_id":"s-1","tool_name":"Bash","tool_input":{"command":"cargo fmt"}}"#;

        let output = run_event(input, None, &opts(&dir));
        assert!(output.proceed);
        let audit = fs::read_to_string(dir.path().join(".claude/logs/command-audit.jsonl")).unwrap();
        assert!(audit.contains("cargo fmt"));
    }

    #[test]
    fn test_event_override() {
        let dir = TempDir::new().unwrap();
        let input = r#"{"session_id":"s-1","tool_name":"Bash","tool_input":{"command":"mkfs.ext4 /dev/sdb"}}"#;

        assert!(run_event(input, None, &opts(&dir)).proceed);
        assert!(!run_event(input, Some("PreToolUse"), &opts(&dir)).proceed);
    }

    #[test]
    fn test_unknown_event_is_permissive() {
        let dir = TempDir::new().unwrap();
        let input = r#"{"hook_event_name":"SomethingNew","session_id":"s"}"#;
        let output = run_event(input, None, &opts(&dir));
        assert!(output.proceed);
        assert!(output.hook_specific_output.is_none());
    }

    #[test]
    fn test_worker_consumes_spooled_payload() {
        let dir = TempDir::new().unwrap();
        let spool = dir.path().join(".claude/spool");
        fs::create_dir_all(&spool).unwrap();
        let payload = spool.join("tool-bookkeeping-1.json");
        fs::write(
            &payload,
            r#"{"hook_event_name":"PostToolUse","session_id":"s-4","tool_name":"Skill","tool_input":{"skill":"commit"}}"#,
        )
        .unwrap();

        run_worker(&opts(&dir), "tool-bookkeeping", Some(&payload));
        assert!(!payload.exists());
        let skills =
            fs::read_to_string(dir.path().join(".claude/logs/skill-invocations.jsonl")).unwrap();
        assert!(skills.contains("\"skill\":\"commit\""));
    }

    #[test]
    fn test_unknown_worker_kind_still_removes_payload() {
        let dir = TempDir::new().unwrap();
        let payload = dir.path().join("p.json");
        fs::write(&payload, "{}").unwrap();

        run_worker(&opts(&dir), "reindex", Some(&payload));
        assert!(!payload.exists());
        assert!(!dir.path().join(".claude/logs").exists());
    }

    #[test]
    fn test_enqueue_then_session_end() {
        let dir = TempDir::new().unwrap();
        let opts = opts(&dir);
        enqueue(
            &opts,
            "create_entity",
            r#"{"name":"decision:use-rust","entityType":"decision"}"#,
        )
        .unwrap();
        assert!(enqueue(&opts, "drop_table", "{}").is_err());
        assert!(enqueue(&opts, "create_relation", r#"{"from":"a"}"#).is_err());

        let output = run_event(r#"{"hook_event_name":"SessionEnd","session_id":"s"}"#, None, &opts);
        assert_eq!(
            output.system_message.as_deref(),
            Some("Memory graph sync: 1 entities, 0 relations, 0 observations")
        );
        let context = output.hook_specific_output.unwrap().additional_context.unwrap();
        assert!(context.contains("decision:use-rust"));
    }
}
