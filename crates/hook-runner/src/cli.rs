//! CLI argument parsing for the hook runner.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Hook Runner
///
/// Routes one host lifecycle event through the registered handlers and
/// prints the merged decision.
#[derive(Parser, Debug)]
#[command(name = "hook-runner")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Project root (overrides CLAUDE_PROJECT_DIR and the event's cwd)
    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Path to an extra config file, applied after user and project files
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Runner commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Dispatch one event read from stdin and print the host output
    Run {
        /// Event name overriding `hook_event_name` (e.g. PreToolUse)
        event: Option<String>,
    },

    /// Run a detached background job
    #[command(hide = true)]
    Worker {
        /// Job kind (tool-bookkeeping)
        kind: String,

        /// Spooled payload file, removed once read (stdin when absent)
        #[arg(long)]
        payload_file: Option<PathBuf>,
    },

    /// Append one graph mutation to the queue
    Enqueue {
        /// Operation: create_entity, create_relation or add_observation
        op: String,

        /// Operation payload as a JSON object
        payload: String,
    },

    /// Aggregate and clear the graph queue, printing the result as JSON
    Flush,

    /// Report queue and log health as JSON
    Health {
        /// Analyze a single file instead of the whole project
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_run_without_event() {
        let cli = Cli::parse_from(["hook-runner", "run"]);
        match cli.command {
            Commands::Run { event } => assert!(event.is_none()),
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_cli_run_with_event_and_globals() {
        let cli = Cli::parse_from([
            "hook-runner",
            "run",
            "PreToolUse",
            "--project-dir",
            "/work/proj",
            "-l",
            "debug",
        ]);
        assert_eq!(cli.project_dir, Some(PathBuf::from("/work/proj")));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        match cli.command {
            Commands::Run { event } => assert_eq!(event.as_deref(), Some("PreToolUse")),
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_cli_worker() {
        let cli = Cli::parse_from(["hook-runner", "--project-dir", "/p", "worker", "tool-bookkeeping"]);
        match cli.command {
            Commands::Worker { kind, payload_file } => {
                assert_eq!(kind, "tool-bookkeeping");
                assert!(payload_file.is_none());
            }
            _ => panic!("Expected Worker command"),
        }

        let cli = Cli::parse_from([
            "hook-runner",
            "worker",
            "tool-bookkeeping",
            "--payload-file",
            "/p/.claude/spool/x.json",
        ]);
        match cli.command {
            Commands::Worker { payload_file, .. } => {
                assert_eq!(payload_file, Some(PathBuf::from("/p/.claude/spool/x.json")))
            }
            _ => panic!("Expected Worker command"),
        }
    }

    #[test]
    fn test_cli_enqueue() {
        let cli = Cli::parse_from([
            "hook-runner",
            "enqueue",
            "create_entity",
            r#"{"name":"decision:use-rust","entityType":"decision"}"#,
        ]);
        match cli.command {
            Commands::Enqueue { op, payload } => {
                assert_eq!(op, "create_entity");
                assert!(payload.contains("decision:use-rust"));
            }
            _ => panic!("Expected Enqueue command"),
        }
    }

    #[test]
    fn test_cli_health_with_file() {
        let cli = Cli::parse_from(["hook-runner", "health", "--file", "/tmp/q.jsonl"]);
        match cli.command {
            Commands::Health { file } => assert_eq!(file, Some(PathBuf::from("/tmp/q.jsonl"))),
            _ => panic!("Expected Health command"),
        }
    }

    #[test]
    fn test_cli_with_config() {
        let cli = Cli::parse_from(["hook-runner", "--config", "/path/to/hooks.toml", "flush"]);
        assert_eq!(cli.config.as_deref(), Some("/path/to/hooks.toml"));
        assert!(matches!(cli.command, Commands::Flush));
    }
}
