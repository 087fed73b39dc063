use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use serde::Serialize;

use e2e_tests::{valid_queue_lines, TestHarness};
use hook_store::{analyze_queue, check_health};

const DEFAULT_LINES: usize = 50_000;
const DEFAULT_ITERATIONS: usize = 3;

#[derive(Parser, Debug)]
#[command(name = "queue_bench", about = "Graph queue flush and health benchmark")]
struct Args {
    /// Valid queue lines per iteration
    #[arg(long, default_value_t = DEFAULT_LINES)]
    lines: usize,
    /// Insert one corrupt line after every N valid lines (0 disables)
    #[arg(long, default_value_t = 0)]
    corrupt_every: usize,
    #[arg(long, default_value_t = DEFAULT_ITERATIONS)]
    iterations: usize,
    /// Write the JSON report here instead of stdout
    #[arg(long)]
    out: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct Sample {
    iteration: usize,
    analyze_ms: f64,
    health_ms: f64,
    flush_ms: f64,
    valid_lines: u64,
    corrupt_lines: u64,
    operations: usize,
}

#[derive(Debug, Serialize)]
struct Report {
    lines: usize,
    corrupt_every: usize,
    samples: Vec<Sample>,
    mean_flush_ms: f64,
}

fn build_lines(lines: usize, corrupt_every: usize) -> Vec<String> {
    let mut out = Vec::with_capacity(lines + lines / corrupt_every.max(1));
    for (i, line) in valid_queue_lines(lines).into_iter().enumerate() {
        out.push(line);
        if corrupt_every > 0 && (i + 1) % corrupt_every == 0 {
            out.push(format!("{{\"op\":\"create_entity\",\"truncated\":{i}"));
        }
    }
    out
}

fn millis(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let lines = build_lines(args.lines, args.corrupt_every);

    let mut samples = Vec::with_capacity(args.iterations);
    for iteration in 0..args.iterations {
        let harness = TestHarness::new();
        harness.append_raw_queue_lines(&lines);

        let started = Instant::now();
        let stats = analyze_queue(&harness.queue_path());
        let analyze_ms = millis(started);

        let started = Instant::now();
        let _ = check_health(harness.paths.project_dir());
        let health_ms = millis(started);

        let started = Instant::now();
        let report = harness.queue().flush()?;
        let flush_ms = millis(started);

        debug_assert_eq!(stats.corrupt_lines, report.corrupt_lines);
        samples.push(Sample {
            iteration,
            analyze_ms,
            health_ms,
            flush_ms,
            valid_lines: report.valid_lines,
            corrupt_lines: report.corrupt_lines,
            operations: report.set.operation_count(),
        });
    }

    let mean_flush_ms = if samples.is_empty() {
        0.0
    } else {
        samples.iter().map(|s| s.flush_ms).sum::<f64>() / samples.len() as f64
    };
    let report = Report {
        lines: args.lines,
        corrupt_every: args.corrupt_every,
        samples,
        mean_flush_ms,
    };

    let json = serde_json::to_string_pretty(&report)?;
    match args.out {
        Some(path) => std::fs::write(path, json)?,
        None => println!("{json}"),
    }
    Ok(())
}
