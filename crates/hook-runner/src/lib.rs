//! Hook runner library.
//!
//! Exposes the CLI definition and command implementations so the binary
//! stays a thin dispatcher and tests can drive commands directly.

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands};
pub use commands::{enqueue, flush, health, init_logging, run_event, run_hook, run_worker, RunOptions};
