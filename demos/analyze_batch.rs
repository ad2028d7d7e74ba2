//! Example: Detect BPM and offset of multiple audio files in parallel
//!
//! Usage:
//!   cargo run --release --example analyze_batch -- [--jobs N] [--json] <file1> <file2> ...
//!
//! Notes:
//! - Parallelism is across files (batch-level); candidate scoring within a file
//!   is left sequential so the pool is not oversubscribed.
//! - Default workers: (available CPU threads - 1), keeping one core free for the system.

use beatmap_dsp::{AnalysisError, DetectRequest, Detection, DetectorConfig, TempoDetector};
use rayon::prelude::*;
use serde::Serialize;
use std::env;
use std::path::Path;
use std::time::Instant;

#[derive(Serialize)]
struct ItemOut {
    file: String,
    #[serde(flatten)]
    detection: Option<Detection>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

const USAGE: &str = "Usage: analyze_batch [--jobs N] [--json] <file1> <file2> ...

  --jobs N   Parallel workers (default: CPU-1)
  --json     Emit one JSON object per line (JSONL)";

fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|v| v.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}

/// Nearest-rank percentile of an ascending slice
fn percentile(sorted: &[f32], p: f32) -> f32 {
    let rank = ((sorted.len() - 1) as f32 * p).round() as usize;
    sorted[rank.min(sorted.len() - 1)]
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let mut json = false;
    let mut jobs: Option<usize> = None;
    let mut paths: Vec<String> = Vec::new();

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--json" => json = true,
            "--jobs" => {
                let n: usize = args.next().ok_or("--jobs requires a value")?.parse()?;
                jobs = Some(n.max(1));
            }
            "--help" | "-h" => {
                eprintln!("{}", USAGE);
                return Ok(());
            }
            _ => paths.push(arg),
        }
    }

    if paths.is_empty() {
        eprintln!("ERROR: no input files\n\n{}", USAGE);
        std::process::exit(2);
    }

    let jobs = jobs.unwrap_or_else(default_jobs);
    eprintln!("Batch: {} files, jobs={}", paths.len(), jobs);

    let detector = TempoDetector::new(DetectorConfig {
        parallel_scoring: false,
        ..DetectorConfig::default()
    })?;

    let t0 = Instant::now();
    let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;

    let outs: Vec<ItemOut> = pool.install(|| {
        paths
            .par_iter()
            .map(|path| {
                let result: Result<Detection, AnalysisError> =
                    detector.detect(&DetectRequest::from_path(Path::new(path)));
                match result {
                    Ok(detection) => ItemOut {
                        file: path.clone(),
                        detection: Some(detection),
                        error: None,
                    },
                    Err(e) => ItemOut {
                        file: path.clone(),
                        detection: None,
                        error: Some(e.to_string()),
                    },
                }
            })
            .collect()
    });

    for (idx, o) in outs.iter().enumerate() {
        if json {
            println!("{}", serde_json::to_string(o)?);
            continue;
        }
        match (&o.detection, &o.error) {
            (Some(d), _) => println!(
                "[{}/{}] {}: BPM={:.2} subdivision={} offset={:.4}s time={:.2}ms",
                idx + 1,
                outs.len(),
                o.file,
                d.bpm,
                d.subdivision,
                d.offset.unwrap_or(0.0),
                d.metadata.processing_time_ms
            ),
            (None, error) => println!(
                "[{}/{}] {}: ERROR: {}",
                idx + 1,
                outs.len(),
                o.file,
                error.as_deref().unwrap_or("unknown error")
            ),
        }
    }

    let mut times: Vec<f32> = outs
        .iter()
        .filter_map(|o| o.detection.as_ref())
        .map(|d| d.metadata.processing_time_ms)
        .collect();
    times.sort_by(|a, b| a.total_cmp(b));

    eprintln!(
        "Done: {}/{} detected in {:.0} ms wall time",
        times.len(),
        outs.len(),
        t0.elapsed().as_secs_f64() * 1000.0
    );
    if let (Some(fastest), Some(slowest)) = (times.first(), times.last()) {
        let mean = times.iter().sum::<f32>() / times.len() as f32;
        eprintln!(
            "Per file: mean {:.1} ms, median {:.1} ms, p90 {:.1} ms, range {:.1}..{:.1} ms",
            mean,
            percentile(&times, 0.5),
            percentile(&times, 0.9),
            fastest,
            slowest
        );
    }

    Ok(())
}
