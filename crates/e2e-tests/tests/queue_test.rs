//! Graph queue E2E tests.
//!
//! Covers enqueue/flush aggregation, corrupt line accounting, interrupted
//! flush recovery and streaming over large queues.

use std::fs;
use std::sync::Arc;
use std::thread;

use chrono::Duration;
use pretty_assertions::assert_eq;

use e2e_tests::{base_time, valid_queue_lines, TestHarness};
use hook_types::QueueEntry;

/// Two writes to one entity plus a distinct entity: the later payload wins.
#[test]
fn test_duplicate_entity_last_write_wins() {
    let harness = TestHarness::new();
    let queue = harness.queue();

    queue
        .enqueue(
            &QueueEntry::create_entity("session-demo", "session", vec!["first".into()])
                .with_timestamp(base_time()),
        )
        .unwrap();
    queue
        .enqueue(
            &QueueEntry::create_entity("session-demo", "session", vec!["second".into()])
                .with_timestamp(base_time() + Duration::seconds(5)),
        )
        .unwrap();
    queue
        .enqueue(
            &QueueEntry::create_entity("agent:planner", "agent", vec![])
                .with_timestamp(base_time() + Duration::seconds(6)),
        )
        .unwrap();

    let report = queue.flush().unwrap();

    assert_eq!(report.set.entities.len(), 2);
    assert_eq!(report.set.entities["session-demo"].observations, vec!["second".to_string()]);
    assert_eq!(report.valid_lines, 3);
    assert_eq!(report.corrupt_lines, 0);
}

/// An older entry appended later does not overwrite a newer one.
#[test]
fn test_entity_resolution_follows_timestamps_not_append_order() {
    let harness = TestHarness::new();
    let queue = harness.queue();

    queue
        .enqueue(
            &QueueEntry::create_entity("file:a.rs", "file", vec!["new".into()])
                .with_timestamp(base_time() + Duration::minutes(1)),
        )
        .unwrap();
    queue
        .enqueue(
            &QueueEntry::create_entity("file:a.rs", "file", vec!["old".into()])
                .with_timestamp(base_time()),
        )
        .unwrap();

    let report = queue.flush().unwrap();
    assert_eq!(report.set.entities["file:a.rs"].observations, vec!["new".to_string()]);
}

/// Relations and observations appear at most once however often enqueued.
#[test]
fn test_relations_and_observations_are_deduplicated() {
    let harness = TestHarness::new();
    let queue = harness.queue();

    for _ in 0..3 {
        queue
            .enqueue(&QueueEntry::create_relation("session:s", "file:a.rs", "modified"))
            .unwrap();
        queue
            .enqueue(&QueueEntry::add_observation("file:a.rs", vec!["edited".into(), "edited".into()]))
            .unwrap();
    }
    queue
        .enqueue(&QueueEntry::add_observation("file:a.rs", vec!["reviewed".into()]))
        .unwrap();

    let report = queue.flush().unwrap();
    assert_eq!(report.set.relations.len(), 1);
    let observations: Vec<_> = report.set.observations["file:a.rs"].iter().cloned().collect();
    assert_eq!(observations, vec!["edited".to_string(), "reviewed".to_string()]);
    assert_eq!(report.set.summary(), "0 entities, 1 relations, 2 observations");
}

/// Flushing a missing queue and then an emptied queue never errors.
#[test]
fn test_flush_empty_queue_is_noop() {
    let harness = TestHarness::new();
    let queue = harness.queue();

    let report = queue.flush().unwrap();
    assert!(report.is_empty());
    assert!(!harness.queue_path().exists());

    queue
        .enqueue(&QueueEntry::create_relation("a", "b", "uses"))
        .unwrap();
    assert!(!queue.flush().unwrap().is_empty());

    let again = queue.flush().unwrap();
    assert!(again.is_empty());
    assert_eq!(again.valid_lines, 0);
}

/// N valid and K malformed lines: N folded in, K counted.
#[test]
fn test_corrupt_lines_counted_and_skipped() {
    let harness = TestHarness::new();
    let mut lines = valid_queue_lines(30);
    lines.insert(4, "{not json".to_string());
    lines.insert(10, r#"{"op":"create_entity","payload":{"entityType":"file"},"timestamp":"2026-03-01T12:00:00Z"}"#.to_string());
    lines.insert(20, r#"{"op":"drop_everything","payload":{},"timestamp":"2026-03-01T12:00:00Z"}"#.to_string());
    lines.push(String::new());
    harness.append_raw_queue_lines(&lines);

    let report = harness.queue().flush().unwrap();
    assert_eq!(report.valid_lines, 30);
    assert_eq!(report.corrupt_lines, 3);
    assert!(!report.set.is_empty());
}

/// 50,000 valid lines aggregate with no corruption.
#[test]
fn test_large_queue_streams_without_corruption() {
    let harness = TestHarness::new();
    harness.append_raw_queue_lines(&valid_queue_lines(50_000));

    let depth = harness.queue().depth();
    assert_eq!(depth.valid, 50_000);
    assert_eq!(depth.corrupt, 0);

    let report = harness.queue().flush().unwrap();
    assert_eq!(report.corrupt_lines, 0);
    assert_eq!(report.valid_lines, 50_000);
    assert_eq!(report.set.entities.len(), 500);
    assert_eq!(report.set.relations.len(), 500);
    assert_eq!(harness.queue().pending(), 0);
}

/// A claim file left by a killed flush is picked up by the next one.
#[test]
fn test_leftover_claim_is_processed_first() {
    let harness = TestHarness::new();
    let queue = harness.queue();

    queue
        .enqueue(&QueueEntry::create_entity("x", "note", vec!["stale".into()]).with_timestamp(base_time()))
        .unwrap();
    let claim = harness
        .queue_path()
        .with_file_name("graph-queue.jsonl.flushing-00000000000000000001");
    fs::rename(harness.queue_path(), &claim).unwrap();

    queue
        .enqueue(
            &QueueEntry::create_entity("x", "note", vec!["fresh".into()])
                .with_timestamp(base_time() + Duration::seconds(1)),
        )
        .unwrap();
    assert_eq!(queue.leftover_claims(), vec![claim.clone()]);
    assert_eq!(queue.pending(), 2);

    let report = queue.flush().unwrap();
    assert_eq!(report.valid_lines, 2);
    assert_eq!(report.set.entities["x"].observations, vec!["fresh".to_string()]);
    assert!(!claim.exists());
    assert!(queue.leftover_claims().is_empty());
}

/// Concurrent flushes claim every entry exactly once between them.
#[test]
fn test_concurrent_flushes_claim_each_entry_once() {
    let harness = Arc::new(TestHarness::new());
    harness.append_raw_queue_lines(&valid_queue_lines(3_000));

    let flushers: Vec<_> = (0..4)
        .map(|_| {
            let harness = Arc::clone(&harness);
            thread::spawn(move || harness.queue().flush().unwrap().valid_lines)
        })
        .collect();
    let claimed: u64 = flushers.into_iter().map(|f| f.join().unwrap()).sum();

    assert_eq!(claimed, 3_000);
    assert_eq!(harness.queue().pending(), 0);
    assert!(harness.queue().leftover_claims().is_empty());
}

/// Entries enqueued after a flush land in a fresh live queue.
#[test]
fn test_enqueue_after_flush_starts_fresh_queue() {
    let harness = TestHarness::new();
    let queue = harness.queue();

    queue
        .enqueue(&QueueEntry::create_relation("writer:0", "item:0", "wrote"))
        .unwrap();
    assert_eq!(queue.flush().unwrap().valid_lines, 1);

    queue
        .enqueue(&QueueEntry::create_relation("writer:0", "item:1", "wrote"))
        .unwrap();
    let report = queue.flush().unwrap();
    assert_eq!(report.valid_lines, 1);
    assert_eq!(report.set.relations.iter().next().unwrap().to, "item:1");
}
