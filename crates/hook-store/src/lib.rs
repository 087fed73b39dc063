//! File-backed state for the hook runtime.
//!
//! Everything here persists through the filesystem only; nothing outlives
//! one invocation in memory.
//!
//! - [`BufferedWriter`]: batches analytics/log lines, one append per file
//! - [`GraphQueue`]: durable graph mutation queue with aggregate-and-clear flush
//! - [`HealthAnalyzer`]: re-reads queue and logs to report corruption, depth
//!   and staleness

pub mod error;
pub mod health;
pub mod queue;
pub mod writer;

pub use error::StoreError;
pub use health::{
    analyze, analyze_queue, check_health, FileStats, HealthAnalyzer, HealthReport, HealthStatus,
    TierHealth,
};
pub use queue::{FlushReport, GraphQueue, QueueDepth};
pub use writer::BufferedWriter;
