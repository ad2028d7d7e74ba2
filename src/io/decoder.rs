//! Audio decoding using Symphonia

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::{SampleBuffer, SignalSpec};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};

use crate::error::AnalysisError;

fn decoding_error(path: &Path, err: impl std::fmt::Display) -> AnalysisError {
    AnalysisError::DecodingError(format!("{}: {}", path.display(), err))
}

/// Whether the interleaving buffer must be rebuilt for the next packet
///
/// `current` is the existing buffer's capacity in samples and the spec it was
/// built for. Any spec change (channel layout or rate) reallocates.
fn needs_realloc(current: Option<(usize, SignalSpec)>, frames: usize, spec: SignalSpec) -> bool {
    match current {
        Some((capacity, current_spec)) => {
            current_spec != spec || capacity < frames * spec.channels.count().max(1)
        }
        None => true,
    }
}

/// Decode an audio file to mono PCM samples
///
/// Channels are averaged. Corrupt packets are skipped with a warning.
///
/// # Arguments
///
/// * `path` - Path to any container/codec Symphonia supports
///
/// # Returns
///
/// Tuple of (mono samples, native sample rate)
pub fn decode_audio(path: &Path) -> Result<(Vec<f32>, u32), AnalysisError> {
    log::debug!("Decoding audio file: {}", path.display());

    let file = File::open(path).map_err(|e| decoding_error(path, e))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| decoding_error(path, e))?;
    let mut format = probed.format;

    let (track_id, codec_params) = {
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| decoding_error(path, "no supported audio track"))?;
        (track.id, track.codec_params.clone())
    };

    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| decoding_error(path, "unknown sample rate"))?;
    let mut decoder = get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| decoding_error(path, e))?;

    let mut sample_buf: Option<(SampleBuffer<f32>, SignalSpec)> = None;
    let mut mono: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => return Err(decoding_error(path, e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("Skipping corrupt packet in {}: {}", path.display(), e);
                continue;
            }
            Err(e) => return Err(decoding_error(path, e)),
        };

        let spec = *decoded.spec();
        let channels = spec.channels.count().max(1);

        let current = sample_buf.as_ref().map(|(buf, buf_spec)| (buf.capacity(), *buf_spec));
        if needs_realloc(current, decoded.capacity(), spec) {
            if current.is_some_and(|(_, buf_spec)| buf_spec != spec) {
                log::debug!("Signal spec changed mid-stream in {}: {:?}", path.display(), spec);
            }
            sample_buf = Some((SampleBuffer::<f32>::new(decoded.capacity() as u64, spec), spec));
        }
        if let Some((buf, _)) = sample_buf.as_mut() {
            buf.copy_interleaved_ref(decoded);
            mono.extend(
                buf.samples()
                    .chunks(channels)
                    .map(|frame| frame.iter().sum::<f32>() / channels as f32),
            );
        }
    }

    log::debug!(
        "Decoded {} mono samples at {} Hz from {}",
        mono.len(),
        sample_rate,
        path.display()
    );

    Ok((mono, sample_rate))
}
