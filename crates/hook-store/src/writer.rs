//! Buffered append-only writer for analytics and log lines.
//!
//! ## Key Design Principles
//!
//! - **Batched writes**: `write()` only queues; `flush()` appends each
//!   destination's lines with a single write call
//! - **Append-only**: files are opened with `O_APPEND` and never rewritten,
//!   so a crash loses at most the lines still sitting in this process
//! - **Implicit directories**: missing parent directories are created on flush
//! - **Process-scoped**: the buffer lives as long as one invocation and is
//!   flushed on drop
//!
//! ```text
//! handler ── write(path, line) ──▶ pending: BTreeMap<PathBuf, Vec<String>>
//!                                          │ flush()
//!                                          ▼
//!                              one append per distinct path
//! ```

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use hook_types::{AnalyticsRecord, ProjectPaths};

use crate::error::StoreError;

/// In-process line buffer keyed by destination file.
///
/// Shared by reference between handlers; interior mutability keeps the
/// `write` signature `&self`.
#[derive(Debug, Default)]
pub struct BufferedWriter {
    pending: Mutex<BTreeMap<PathBuf, Vec<String>>>,
    logs_dir: Option<PathBuf>,
}

impl BufferedWriter {
    /// Writer without a logs directory; only `write` is usable.
    pub fn new() -> Self {
        Self::default()
    }

    /// Writer whose analytics records go to the project's `logs/` directory.
    pub fn for_project(paths: &ProjectPaths) -> Self {
        Self {
            pending: Mutex::new(BTreeMap::new()),
            logs_dir: Some(paths.logs_dir()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<PathBuf, Vec<String>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue one line for `path`. Trailing newlines are stripped.
    pub fn write(&self, path: impl AsRef<Path>, line: impl Into<String>) {
        let mut line = line.into();
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        self.lock()
            .entry(path.as_ref().to_path_buf())
            .or_default()
            .push(line);
    }

    /// Queue an analytics record for `logs/<category>.jsonl`.
    pub fn write_record(&self, record: &AnalyticsRecord) -> Result<(), StoreError> {
        let logs_dir = self.logs_dir.as_ref().ok_or_else(|| {
            StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "writer has no logs directory",
            ))
        })?;
        let line = serde_json::to_string(record)?;
        self.write(logs_dir.join(record.category.file_name()), line);
        Ok(())
    }

    /// Number of lines waiting to be flushed.
    pub fn pending_lines(&self) -> usize {
        self.lock().values().map(Vec::len).sum()
    }

    /// Append every buffered line to its destination.
    ///
    /// Idempotent: an empty buffer is a no-op. A failing destination does
    /// not stop the others; its lines are dropped and reported in the error.
    /// Returns the number of lines written.
    pub fn flush(&self) -> Result<usize, StoreError> {
        let batches = std::mem::take(&mut *self.lock());
        if batches.is_empty() {
            return Ok(0);
        }

        let mut written = 0;
        let mut failures = Vec::new();
        for (path, lines) in batches {
            match append_lines(&path, &lines) {
                Ok(()) => {
                    debug!(path = %path.display(), lines = lines.len(), "Flushed buffered lines");
                    written += lines.len();
                }
                Err(e) => {
                    warn!(path = %path.display(), lines = lines.len(), error = %e, "Dropping buffered lines");
                    failures.push(e.to_string());
                }
            }
        }

        match failures.first() {
            None => Ok(written),
            Some(first) => Err(StoreError::PartialFlush {
                failed: failures.len(),
                first: first.clone(),
            }),
        }
    }
}

impl Drop for BufferedWriter {
    fn drop(&mut self) {
        if self.pending_lines() > 0 {
            if let Err(e) = self.flush() {
                warn!(error = %e, "Buffered writer flush on drop failed");
            }
        }
    }
}

/// Append `lines` to `path` in a single write call.
pub(crate) fn append_lines(path: &Path, lines: &[String]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let capacity = lines.iter().map(|l| l.len() + 1).sum();
    let mut chunk = String::with_capacity(capacity);
    for line in lines {
        chunk.push_str(line);
        chunk.push('\n');
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(chunk.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use hook_types::LogCategory;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_flush_groups_lines_per_path() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.jsonl");
        let b = dir.path().join("nested").join("b.jsonl");

        let writer = BufferedWriter::new();
        writer.write(&a, "1");
        writer.write(&b, "x\n");
        writer.write(&a, "2");
        assert_eq!(writer.pending_lines(), 3);

        assert_eq!(writer.flush().unwrap(), 3);
        assert_eq!(writer.pending_lines(), 0);
        assert_eq!(fs::read_to_string(&a).unwrap(), "1\n2\n");
        assert_eq!(fs::read_to_string(&b).unwrap(), "x\n");
    }

    #[test]
    fn test_flush_empty_is_noop() {
        let writer = BufferedWriter::new();
        assert_eq!(writer.flush().unwrap(), 0);
        assert_eq!(writer.flush().unwrap(), 0);
    }

    #[test]
    fn test_flush_appends_never_truncates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.jsonl");
        fs::write(&path, "old\n").unwrap();

        let writer = BufferedWriter::new();
        writer.write(&path, "new");
        writer.flush().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "old\nnew\n");
    }

    #[test]
    fn test_drop_flushes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dropped.jsonl");
        {
            let writer = BufferedWriter::new();
            writer.write(&path, "kept");
        }
        assert_eq!(fs::read_to_string(&path).unwrap(), "kept\n");
    }

    #[test]
    fn test_write_record_targets_category_file() {
        let dir = TempDir::new().unwrap();
        let paths = ProjectPaths::new(dir.path(), ".claude");
        let writer = BufferedWriter::for_project(&paths);

        let record = AnalyticsRecord::new(LogCategory::ToolUsage, "s-1", json!({"tool": "Read"}));
        writer.write_record(&record).unwrap();
        writer.flush().unwrap();

        let content = fs::read_to_string(paths.log_path(LogCategory::ToolUsage)).unwrap();
        let parsed: AnalyticsRecord = serde_json::from_str(content.trim()).unwrap();
        assert_eq!(parsed.data["tool"], "Read");
    }

    #[test]
    fn test_write_record_without_logs_dir_fails() {
        let writer = BufferedWriter::new();
        let record = AnalyticsRecord::new(LogCategory::ToolUsage, "s", json!({}));
        assert!(writer.write_record(&record).is_err());
    }

    #[test]
    fn test_failed_path_does_not_block_others() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file-not-dir");
        fs::write(&blocker, "").unwrap();
        let bad = blocker.join("x.jsonl");
        let good = dir.path().join("good.jsonl");

        let writer = BufferedWriter::new();
        writer.write(&bad, "lost");
        writer.write(&good, "kept");

        let err = writer.flush().unwrap_err();
        assert!(matches!(err, StoreError::PartialFlush { failed: 1, .. }));
        assert_eq!(fs::read_to_string(&good).unwrap(), "kept\n");
    }
}
