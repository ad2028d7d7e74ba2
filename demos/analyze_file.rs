//! Example: Detect BPM, subdivision and offset of a single audio file
//!
//! Usage:
//!   cargo run --release --example analyze_file -- <file> [--bpm BPM] [--subdivision 3|4] [--simple]

use beatmap_dsp::{DetectRequest, DetectorConfig, SelectionMode, TempoDetector};
use std::env;
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::init();

    let mut args = env::args().skip(1);
    let mut path: Option<PathBuf> = None;
    let mut bpm: Option<f64> = None;
    let mut subdivision: Option<u32> = None;
    let mut config = DetectorConfig::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--bpm" => bpm = Some(args.next().ok_or("--bpm requires a value")?.parse()?),
            "--subdivision" => {
                subdivision = Some(args.next().ok_or("--subdivision requires a value")?.parse()?)
            }
            "--simple" => config.selection = SelectionMode::Simple,
            _ => path = Some(PathBuf::from(arg)),
        }
    }
    let path = path.ok_or("Usage: analyze_file <file> [--bpm BPM] [--subdivision 3|4] [--simple]")?;

    let mut request = DetectRequest::from_path(&path);
    request.known_bpm = bpm;
    request.known_subdivision = subdivision;

    let detection = TempoDetector::new(config)?.detect(&request)?;

    println!("Detection Results:");
    println!("  BPM: {:.2}", detection.bpm);
    println!("  Subdivision: {}", detection.subdivision);
    if let (Some(offset), Some(add)) = (detection.offset, detection.add) {
        println!("  Offset: {:.4}s (add {:.4}s)", offset, add);
    }
    println!("  Onsets: {}", detection.metadata.onset_count);
    if !detection.metadata.flags.is_empty() {
        println!("  Flags: {:?}", detection.metadata.flags);
    }
    println!("  Processing time: {:.2} ms", detection.metadata.processing_time_ms);

    Ok(())
}
