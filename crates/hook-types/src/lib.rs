//! # hook-types
//!
//! Shared domain types for the hook runtime.
//!
//! This crate defines the data contract every other crate builds on:
//! - Events: what the host sends on stdin
//! - Decisions: what handlers return and what goes back on stdout
//! - Queue entries and the aggregated operation set for deferred graph writes
//! - Analytics records
//! - Settings and project path resolution
//!
//! ## Usage
//!
//! ```rust
//! use hook_types::{Decision, Event, EventType};
//!
//! let event = Event::new(EventType::SessionStart, "session-1");
//! let output = Decision::allow().to_output(event.event_type);
//! assert!(output.proceed);
//! ```

pub mod analytics;
pub mod config;
pub mod decision;
pub mod error;
pub mod event;
pub mod graph;
pub mod paths;

pub use analytics::{AnalyticsRecord, LogCategory};
pub use config::{GuardSettings, HealthSettings, Settings, SpawnerSettings};
pub use decision::{Decision, HookOutput, HookSpecificOutput, PermissionDecision};
pub use error::HookError;
pub use event::{Event, EventType};
pub use graph::{AggregatedOperationSet, Entity, GraphMutation, GraphOp, QueueEntry, Relation};
pub use paths::{resolve_plugin_root, resolve_plugin_root_from, resolve_project_dir, ProjectPaths};
