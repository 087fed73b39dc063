//! Hook Runner
//!
//! Entry point invoked by the host for every lifecycle event.
//!
//! # Usage
//!
//! ```bash
//! echo '{"hook_event_name":"PreToolUse","session_id":"s","tool_name":"Bash","tool_input":{"command":"ls"}}' | hook-runner run
//! hook-runner enqueue create_entity '{"name":"decision:x","entityType":"decision"}'
//! hook-runner flush
//! hook-runner health
//! ```
//!
//! `run` is fail-open: it prints a valid output and exits 0 no matter what
//! happens inside.
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. User config file (<config_dir>/hook-runtime/config.toml)
//! 3. Project config file (<project>/.claude/hook-runtime.toml)
//! 4. `--config` file
//! 5. Environment variables (HOOK_RUNTIME_*)

use anyhow::Result;
use clap::Parser;

use hook_runner::{enqueue, flush, health, run_hook, run_worker, Cli, Commands, RunOptions};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let opts = RunOptions {
        project_dir: cli.project_dir,
        config: cli.config,
        log_level: cli.log_level,
    };

    match cli.command {
        Commands::Run { event } => {
            run_hook(&opts, event.as_deref());
        }
        Commands::Worker { kind, payload_file } => {
            run_worker(&opts, &kind, payload_file.as_deref());
        }
        Commands::Enqueue { op, payload } => {
            enqueue(&opts, &op, &payload)?;
        }
        Commands::Flush => {
            flush(&opts)?;
        }
        Commands::Health { file } => {
            health(&opts, file.as_deref())?;
        }
    }

    Ok(())
}
