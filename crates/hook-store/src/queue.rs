//! Durable append-only queue of deferred memory graph mutations.
//!
//! `enqueue` appends exactly one line with one write call and is never
//! buffered: the enqueuing process may be the last one the host runs.
//!
//! `flush` uses rename-then-clear:
//!
//! 1. take the advisory queue lock (`graph-queue.lock`)
//! 2. rename the live queue to a claim file
//!    (`graph-queue.jsonl.flushing-<micros>`) so later enqueues start a
//!    fresh file
//! 3. stream every claim file, including leftovers of an interrupted
//!    flush, into an [`AggregatedOperationSet`]; unparsable lines are
//!    counted and skipped
//! 4. on success delete the claim files, on failure append them back to
//!    the live queue
//!
//! Re-processing a claim file whose deletion failed is harmless: entity
//! writes are last-write-wins and relations/observations are set unions.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use hook_types::{AggregatedOperationSet, ProjectPaths, QueueEntry};

use crate::error::StoreError;

const CLAIM_MARKER: &str = ".flushing-";
const LOCK_FILE: &str = "graph-queue.lock";

/// Result of a successful flush.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FlushReport {
    /// Aggregated operations ready for a downstream consumer
    pub set: AggregatedOperationSet,
    /// Lines that parsed and were folded in
    pub valid_lines: u64,
    /// Lines that failed to parse or validate
    pub corrupt_lines: u64,
}

impl FlushReport {
    /// Whether the flush produced nothing to emit.
    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }
}

/// Snapshot of what a flush would process, without flushing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueueDepth {
    /// Valid pending entries
    pub valid: u64,
    /// Corrupt pending lines
    pub corrupt: u64,
    /// Oldest valid entry timestamp
    pub oldest: Option<DateTime<Utc>>,
    /// Claim files left behind by an interrupted flush
    pub leftover_claims: usize,
}

/// The graph queue of one project.
#[derive(Debug, Clone)]
pub struct GraphQueue {
    path: PathBuf,
}

impl GraphQueue {
    /// Queue backed by `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Queue at `<state>/memory/graph-queue.jsonl`.
    pub fn for_project(paths: &ProjectPaths) -> Self {
        Self::new(paths.queue_path())
    }

    /// Live queue file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn dir(&self) -> PathBuf {
        self.path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Append one entry durably.
    pub fn enqueue(&self, entry: &QueueEntry) -> Result<(), StoreError> {
        let mut line = entry.to_line()?;
        line.push('\n');

        fs::create_dir_all(self.dir())?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        debug!(op = ?entry.op, path = %self.path.display(), "Enqueued graph mutation");
        Ok(())
    }

    /// Claim files left by interrupted flushes, oldest first.
    pub fn leftover_claims(&self) -> Vec<PathBuf> {
        let prefix = format!("{}{}", self.file_name(), CLAIM_MARKER);
        let mut claims: Vec<PathBuf> = match fs::read_dir(self.dir()) {
            Ok(entries) => entries
                .filter_map(Result::ok)
                .map(|e| e.path())
                .filter(|p| {
                    p.file_name()
                        .map(|n| n.to_string_lossy().starts_with(&prefix))
                        .unwrap_or(false)
                })
                .collect(),
            Err(_) => Vec::new(),
        };
        claims.sort();
        claims
    }

    /// Count pending entries in the live queue and any leftover claims.
    pub fn depth(&self) -> QueueDepth {
        let claims = self.leftover_claims();
        let mut depth = QueueDepth {
            leftover_claims: claims.len(),
            ..Default::default()
        };

        for path in claims.iter().chain(std::iter::once(&self.path)) {
            let _ = for_each_line(path, |line| {
                match line.map(QueueEntry::from_line) {
                    Some(Ok(entry)) => {
                        depth.valid += 1;
                        depth.oldest = Some(match depth.oldest {
                            Some(oldest) if oldest <= entry.timestamp => oldest,
                            _ => entry.timestamp,
                        });
                    }
                    _ => depth.corrupt += 1,
                }
                Ok(())
            });
        }
        depth
    }

    /// Number of valid pending entries, without flushing.
    pub fn pending(&self) -> u64 {
        self.depth().valid
    }

    /// Aggregate and clear every pending entry.
    ///
    /// An empty or missing queue yields an empty report without touching
    /// the filesystem. Entries are only removed after aggregation succeeded.
    pub fn flush(&self) -> Result<FlushReport, StoreError> {
        if !self.path.exists() && self.leftover_claims().is_empty() {
            return Ok(FlushReport::default());
        }

        let _lock = QueueLock::acquire(&self.dir().join(LOCK_FILE))?;

        let mut claims = self.leftover_claims();
        if self.path.exists() {
            let claim = self.dir().join(format!(
                "{}{}{:020}",
                self.file_name(),
                CLAIM_MARKER,
                Utc::now().timestamp_micros().max(0)
            ));
            fs::rename(&self.path, &claim)?;
            claims.push(claim);
        }

        match aggregate_files(&claims) {
            Ok(report) => {
                for claim in &claims {
                    if let Err(e) = fs::remove_file(claim) {
                        warn!(path = %claim.display(), error = %e, "Could not remove flushed claim file");
                    }
                }
                // Leave an empty live queue behind so health checks see it.
                OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)?;
                info!(
                    valid = report.valid_lines,
                    corrupt = report.corrupt_lines,
                    summary = %report.set.summary(),
                    "Flushed graph queue"
                );
                Ok(report)
            }
            Err(e) => {
                warn!(error = %e, "Graph queue flush failed; restoring entries");
                self.restore(&claims);
                Err(e)
            }
        }
    }

    /// Put claimed entries back into the live queue.
    ///
    /// A claim that cannot be restored stays on disk and is picked up as a
    /// leftover by the next flush.
    fn restore(&self, claims: &[PathBuf]) {
        for claim in claims {
            let restored = fs::read(claim).and_then(|bytes| {
                let mut file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&self.path)?;
                file.write_all(&bytes)?;
                fs::remove_file(claim)
            });
            if let Err(e) = restored {
                warn!(path = %claim.display(), error = %e, "Leaving claim file for next flush");
            }
        }
    }
}

/// Stream claim files in order into one report.
fn aggregate_files(files: &[PathBuf]) -> Result<FlushReport, StoreError> {
    let mut report = FlushReport::default();
    for path in files {
        for_each_line(path, |line| {
            match line.map(QueueEntry::from_line) {
                Some(Ok(entry)) => {
                    report.set.apply(&entry)?;
                    report.valid_lines += 1;
                }
                Some(Err(e)) => {
                    debug!(error = %e, "Skipping corrupt queue line");
                    report.corrupt_lines += 1;
                }
                None => {
                    debug!(path = %path.display(), "Skipping queue line that is not UTF-8");
                    report.corrupt_lines += 1;
                }
            }
            Ok(())
        })?;
    }
    Ok(report)
}

/// Call `f` for every non-blank line of `path`. A missing file has no lines.
///
/// Lines that are not valid UTF-8 are passed as `None`; they are never
/// repaired into something parseable.
pub(crate) fn for_each_line<F>(path: &Path, mut f: F) -> Result<(), StoreError>
where
    F: FnMut(Option<&str>) -> Result<(), StoreError>,
{
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };

    let mut reader = BufReader::new(file);
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        match std::str::from_utf8(&buf) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => f(Some(line.trim()))?,
            Err(_) => f(None)?,
        }
    }
    Ok(())
}

/// Exclusive advisory lock held for the duration of a flush.
struct QueueLock {
    _file: File,
}

impl QueueLock {
    fn acquire(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;

        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            // Released when the file is closed.
            let ret = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
            if ret != 0 {
                return Err(StoreError::Lock(
                    std::io::Error::last_os_error().to_string(),
                ));
            }
        }

        Ok(Self { _file: file })
    }
}
