//! Health analysis of on-disk queue and log state.
//!
//! Every call re-reads the files; nothing is cached and no in-memory state
//! of a live invocation is consulted. Missing inputs never error: they
//! resolve to zero-valued stats and an `unavailable` tier.
//!
//! Classification is monotonic: more corrupt lines, a deeper queue or an
//! older pending entry can only move a tier from `healthy` towards
//! `degraded`, never back. Queue depth counts corrupt lines too, so
//! corrupting a pending line never makes the queue look shallower.
//! Staleness is judged on the oldest valid entry's own timestamp; file
//! modification times say nothing about how long an entry has waited.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use walkdir::WalkDir;

use hook_types::{HealthSettings, ProjectPaths, QueueEntry, Settings};

use crate::queue::{for_each_line, GraphQueue};

/// Health classification, ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Everything within policy
    Healthy,
    /// Present but outside policy
    Degraded,
    /// Missing
    Unavailable,
}

/// Line-level statistics of one JSONL file (or a sum of several).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStats {
    /// Whether the file exists
    pub exists: bool,
    /// Non-blank lines
    pub line_count: u64,
    /// Lines that failed validation
    pub corrupt_lines: u64,
    /// Last modification time
    pub last_modified: Option<DateTime<Utc>>,
}

impl FileStats {
    /// Corrupt lines as a fraction of all lines.
    pub fn corrupt_ratio(&self) -> f64 {
        if self.line_count == 0 {
            0.0
        } else {
            self.corrupt_lines as f64 / self.line_count as f64
        }
    }

    fn absorb(&mut self, other: &FileStats) {
        self.exists |= other.exists;
        self.line_count += other.line_count;
        self.corrupt_lines += other.corrupt_lines;
        self.last_modified = self.last_modified.max(other.last_modified);
    }
}

/// Health of one tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierHealth {
    /// Classification
    pub status: HealthStatus,
    /// Underlying stats
    pub stats: FileStats,
    /// Human-readable findings
    #[serde(default)]
    pub issues: Vec<String>,
}

/// Result of a full health check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Worst-case summary over all tiers
    pub overall: HealthStatus,
    /// Per-tier detail (`queue`, `logs`)
    pub tiers: BTreeMap<String, TierHealth>,
    /// When the check ran
    pub checked_at: DateTime<Utc>,
}

/// Stats for a JSONL file whose lines must be JSON objects.
pub fn analyze(path: &Path) -> FileStats {
    analyze_with(path, |line| {
        serde_json::from_str::<serde_json::Value>(line)
            .map(|v| v.is_object())
            .unwrap_or(false)
    })
}

/// Stats for a graph queue file; lines must be valid queue entries.
pub fn analyze_queue(path: &Path) -> FileStats {
    analyze_with(path, |line| QueueEntry::from_line(line).is_ok())
}

/// Stats for a JSONL file with a custom line validator.
///
/// Lines that are not valid UTF-8 are corrupt without consulting `is_valid`.
pub fn analyze_with<F>(path: &Path, mut is_valid: F) -> FileStats
where
    F: FnMut(&str) -> bool,
{
    let metadata = match fs::metadata(path) {
        Ok(m) if m.is_file() => m,
        _ => return FileStats::default(),
    };

    let mut stats = FileStats {
        exists: true,
        last_modified: metadata.modified().ok().map(DateTime::<Utc>::from),
        ..Default::default()
    };

    let result = for_each_line(path, |line| {
        stats.line_count += 1;
        if !line.is_some_and(|l| is_valid(l)) {
            stats.corrupt_lines += 1;
        }
        Ok(())
    });
    if let Err(e) = result {
        warn!(path = %path.display(), error = %e, "Partial read during health analysis");
    }
    stats
}

/// Health analyzer for one project.
pub struct HealthAnalyzer {
    paths: ProjectPaths,
    policy: HealthSettings,
}

impl HealthAnalyzer {
    /// Analyzer with an explicit policy.
    pub fn new(paths: ProjectPaths, policy: HealthSettings) -> Self {
        Self { paths, policy }
    }

    /// Stats for one file.
    pub fn analyze(&self, path: &Path) -> FileStats {
        analyze(path)
    }

    /// Classify every tier and the project as a whole.
    pub fn check_health(&self) -> HealthReport {
        let now = Utc::now();
        let mut tiers = BTreeMap::new();
        tiers.insert("queue".to_string(), self.queue_tier(now));
        tiers.insert("logs".to_string(), self.logs_tier());

        let overall = if !self.paths.state_dir().is_dir()
            || tiers
                .values()
                .all(|t| t.status == HealthStatus::Unavailable)
        {
            HealthStatus::Unavailable
        } else if tiers.values().any(|t| t.status != HealthStatus::Healthy) {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        };

        HealthReport {
            overall,
            tiers,
            checked_at: now,
        }
    }

    fn queue_tier(&self, now: DateTime<Utc>) -> TierHealth {
        let queue = GraphQueue::for_project(&self.paths);
        let mut oldest: Option<DateTime<Utc>> = None;
        let stats = analyze_with(queue.path(), |line| match QueueEntry::from_line(line) {
            Ok(entry) => {
                oldest = Some(oldest.map_or(entry.timestamp, |o| o.min(entry.timestamp)));
                true
            }
            Err(_) => false,
        });
        let mut tier = classify(&stats, &self.policy);
        if !stats.exists {
            return tier;
        }

        // Depth counts every pending line, corrupt or not.
        if stats.line_count > self.policy.max_queue_depth {
            tier.issues.push(format!(
                "queue depth {} exceeds {}",
                stats.line_count, self.policy.max_queue_depth
            ));
        }

        let stale_after = Duration::hours(self.policy.stale_after_hours as i64);
        if let Some(oldest) = oldest {
            if now - oldest > stale_after {
                tier.issues.push(format!(
                    "oldest pending entry queued at {}",
                    oldest.to_rfc3339()
                ));
            }
        }

        let leftovers = queue.leftover_claims().len();
        if leftovers > 0 {
            tier.issues
                .push(format!("{leftovers} claim file(s) left by an interrupted flush"));
        }

        if !tier.issues.is_empty() {
            tier.status = HealthStatus::Degraded;
        }
        tier
    }

    fn logs_tier(&self) -> TierHealth {
        let logs_dir = self.paths.logs_dir();
        if !logs_dir.is_dir() {
            return TierHealth {
                status: HealthStatus::Unavailable,
                stats: FileStats::default(),
                issues: vec!["logs directory missing".to_string()],
            };
        }

        let mut total = FileStats {
            exists: true,
            ..Default::default()
        };
        for entry in WalkDir::new(&logs_dir)
            .max_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "jsonl"))
        {
            total.absorb(&analyze(entry.path()));
        }
        classify(&total, &self.policy)
    }
}

/// Corruption-based classification shared by every tier.
fn classify(stats: &FileStats, policy: &HealthSettings) -> TierHealth {
    if !stats.exists {
        return TierHealth {
            status: HealthStatus::Unavailable,
            stats: stats.clone(),
            issues: vec!["file missing".to_string()],
        };
    }

    let mut issues = Vec::new();
    if stats.corrupt_ratio() > policy.max_corrupt_ratio {
        issues.push(format!(
            "{} of {} lines corrupt ({:.1}%)",
            stats.corrupt_lines,
            stats.line_count,
            stats.corrupt_ratio() * 100.0
        ));
    }

    TierHealth {
        status: if issues.is_empty() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        },
        stats: stats.clone(),
        issues,
    }
}

/// Check a project's health with the default policy.
pub fn check_health(project_dir: &Path) -> HealthReport {
    let settings = Settings::default();
    HealthAnalyzer::new(
        ProjectPaths::new(project_dir, &settings.state_dir_name),
        settings.health,
    )
    .check_health()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hook_types::LogCategory;
    use tempfile::TempDir;

    fn seeded_project() -> (TempDir, ProjectPaths) {
        let dir = TempDir::new().unwrap();
        let paths = ProjectPaths::new(dir.path(), ".claude");
        fs::create_dir_all(paths.memory_dir()).unwrap();
        fs::create_dir_all(paths.logs_dir()).unwrap();
        fs::write(paths.queue_path(), "").unwrap();
        (dir, paths)
    }

    #[test]
    fn test_analyze_missing_path() {
        let stats = analyze(Path::new("/definitely/not/here.jsonl"));
        assert_eq!(
            stats,
            FileStats {
                exists: false,
                line_count: 0,
                corrupt_lines: 0,
                last_modified: None,
            }
        );
    }

    #[test]
    fn test_analyze_counts_corrupt_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.jsonl");
        fs::write(&path, "{\"a\":1}\n\nnot json\n[1,2]\n{\"b\":2}\n").unwrap();

        let stats = analyze(&path);
        assert!(stats.exists);
        assert_eq!(stats.line_count, 4);
        assert_eq!(stats.corrupt_lines, 2);
        assert!(stats.last_modified.is_some());
    }

    #[test]
    fn test_analyze_directory_is_not_a_file() {
        let dir = TempDir::new().unwrap();
        assert!(!analyze(dir.path()).exists);
    }

    #[test]
    fn test_missing_project_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let report = check_health(&dir.path().join("nowhere"));
        assert_eq!(report.overall, HealthStatus::Unavailable);
        assert_eq!(report.tiers["queue"].status, HealthStatus::Unavailable);
        assert_eq!(report.tiers["logs"].status, HealthStatus::Unavailable);
    }

    #[test]
    fn test_clean_project_is_healthy() {
        let (_dir, paths) = seeded_project();
        fs::write(paths.log_path(LogCategory::HookTiming), "{\"ok\":true}\n").unwrap();

        let analyzer = HealthAnalyzer::new(paths, HealthSettings::default());
        let report = analyzer.check_health();
        assert_eq!(report.overall, HealthStatus::Healthy);
        assert_eq!(report.tiers["logs"].stats.line_count, 1);
    }

    #[test]
    fn test_corruption_degrades_monotonically() {
        let (_dir, paths) = seeded_project();
        let log = paths.log_path(LogCategory::ToolUsage);
        let analyzer = HealthAnalyzer::new(paths, HealthSettings::default());

        let mut content = "{\"ok\":true}\n".repeat(100);
        fs::write(&log, &content).unwrap();
        assert_eq!(analyzer.check_health().overall, HealthStatus::Healthy);

        content.push_str(&"garbage\n".repeat(10));
        fs::write(&log, &content).unwrap();
        assert_eq!(analyzer.check_health().overall, HealthStatus::Degraded);

        content.push_str(&"garbage\n".repeat(50));
        fs::write(&log, &content).unwrap();
        assert_eq!(analyzer.check_health().overall, HealthStatus::Degraded);
    }

    #[test]
    fn test_deep_queue_degrades() {
        let (_dir, paths) = seeded_project();
        let queue = GraphQueue::for_project(&paths);
        for i in 0..3 {
            queue
                .enqueue(&QueueEntry::create_entity(format!("e{i}"), "t", vec![]))
                .unwrap();
        }

        let policy = HealthSettings {
            max_queue_depth: 2,
            ..Default::default()
        };
        let report = HealthAnalyzer::new(paths, policy).check_health();
        let tier = &report.tiers["queue"];
        assert_eq!(tier.status, HealthStatus::Degraded);
        assert!(tier.issues[0].contains("queue depth 3"));
    }

    #[test]
    fn test_corrupting_a_line_keeps_deep_queue_degraded() {
        let (_dir, paths) = seeded_project();
        let queue = GraphQueue::for_project(&paths);
        for i in 0..3 {
            queue
                .enqueue(&QueueEntry::create_entity(format!("e{i}"), "t", vec![]))
                .unwrap();
        }
        let policy = HealthSettings {
            max_queue_depth: 2,
            max_corrupt_ratio: 0.5,
            ..Default::default()
        };
        let analyzer = HealthAnalyzer::new(paths.clone(), policy);
        assert_eq!(analyzer.check_health().tiers["queue"].status, HealthStatus::Degraded);

        let content = fs::read_to_string(paths.queue_path()).unwrap();
        let mut lines: Vec<&str> = content.lines().collect();
        lines[1] = "garbage";
        fs::write(paths.queue_path(), format!("{}\n", lines.join("\n"))).unwrap();

        let tier = &analyzer.check_health().tiers["queue"];
        assert_eq!(tier.stats.corrupt_lines, 1);
        assert_eq!(tier.status, HealthStatus::Degraded);
        assert!(tier.issues[0].contains("queue depth 3 exceeds 2"));
    }

    #[test]
    fn test_old_entry_is_stale_despite_recent_append() {
        let (_dir, paths) = seeded_project();
        let queue = GraphQueue::for_project(&paths);
        let analyzer = HealthAnalyzer::new(paths.clone(), HealthSettings::default());

        queue
            .enqueue(&QueueEntry::create_entity("fresh", "t", vec![]))
            .unwrap();
        assert_eq!(analyzer.check_health().tiers["queue"].status, HealthStatus::Healthy);

        queue
            .enqueue(
                &QueueEntry::create_entity("old", "t", vec![])
                    .with_timestamp(Utc::now() - Duration::hours(48)),
            )
            .unwrap();
        queue
            .enqueue(&QueueEntry::create_entity("newest", "t", vec![]))
            .unwrap();

        let tier = &analyzer.check_health().tiers["queue"];
        assert_eq!(tier.status, HealthStatus::Degraded);
        assert!(tier.issues.iter().any(|i| i.starts_with("oldest pending entry")));

        // Corruption on top of a stale queue never makes it healthy.
        let mut file = fs::OpenOptions::new().append(true).open(paths.queue_path()).unwrap();
        std::io::Write::write_all(&mut file, b"garbage\n").unwrap();
        assert_eq!(analyzer.check_health().tiers["queue"].status, HealthStatus::Degraded);

        queue.flush().unwrap();
        assert_eq!(analyzer.check_health().tiers["queue"].status, HealthStatus::Healthy);
    }

    #[test]
    fn test_non_utf8_log_line_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("log.jsonl");
        fs::write(&path, b"{\"a\":\"\xff\"}\n{\"b\":1}\n").unwrap();

        let stats = analyze(&path);
        assert_eq!(stats.line_count, 2);
        assert_eq!(stats.corrupt_lines, 1);
    }

    #[test]
    fn test_missing_logs_dir_degrades_overall() {
        let dir = TempDir::new().unwrap();
        let paths = ProjectPaths::new(dir.path(), ".claude");
        fs::create_dir_all(paths.memory_dir()).unwrap();
        fs::write(paths.queue_path(), "").unwrap();

        let report = HealthAnalyzer::new(paths, HealthSettings::default()).check_health();
        assert_eq!(report.tiers["queue"].status, HealthStatus::Healthy);
        assert_eq!(report.tiers["logs"].status, HealthStatus::Unavailable);
        assert_eq!(report.overall, HealthStatus::Degraded);
    }

    #[test]
    fn test_status_ordering() {
        assert!(HealthStatus::Healthy < HealthStatus::Degraded);
        assert!(HealthStatus::Degraded < HealthStatus::Unavailable);
    }
}
