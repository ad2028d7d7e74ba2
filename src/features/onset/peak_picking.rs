//! Onset peak picking
//!
//! Picks onset frames from a strength envelope with the usual adaptive rule.
//! A frame `n` is an onset when:
//!
//! 1. `x[n] == max(x[n - pre_max ..= n + post_max - 1])`
//! 2. `x[n] >= mean(x[n - pre_avg ..= n + post_avg - 1]) + delta`
//! 3. `n > previous_onset + wait`
//!
//! Windows are truncated at the signal edges. The envelope is normalised to
//! `[0, 1]` first, so `delta` is relative to the envelope's range.
//!
//! # Example
//!
//! ```
//! use beatmap_dsp::features::onset::peak_picking::{pick_onsets, PeakPickConfig};
//!
//! let mut envelope = vec![0.0f32; 64];
//! envelope[10] = 1.0;
//! envelope[40] = 0.8;
//! let onsets = pick_onsets(&envelope, &PeakPickConfig::default());
//! assert_eq!(onsets, vec![10, 40]);
//! ```

const EPSILON: f32 = 1e-10;

/// Peak picking windows, in frames
#[derive(Debug, Clone, PartialEq)]
pub struct PeakPickConfig {
    /// Frames before `n` in the max window (default: 2, ~30 ms)
    pub pre_max: usize,
    /// Frames from `n` (exclusive end) in the max window (default: 1)
    pub post_max: usize,
    /// Frames before `n` in the mean window (default: 8, ~100 ms)
    pub pre_avg: usize,
    /// Frames from `n` (exclusive end) in the mean window (default: 9)
    pub post_avg: usize,
    /// Threshold above the local mean, on the normalised envelope (default: 0.07)
    pub delta: f32,
    /// Minimum frames between onsets (default: 2, ~30 ms)
    pub wait: usize,
}

impl Default for PeakPickConfig {
    fn default() -> Self {
        Self {
            pre_max: 2,
            post_max: 1,
            pre_avg: 8,
            post_avg: 9,
            delta: 0.07,
            wait: 2,
        }
    }
}

/// Normalise an envelope to `[0, 1]`
fn normalize(envelope: &[f32]) -> Vec<f32> {
    let min = envelope.iter().copied().fold(f32::INFINITY, f32::min);
    let shifted: Vec<f32> = envelope.iter().map(|&x| x - min).collect();
    let max = shifted.iter().copied().fold(0.0f32, f32::max);
    shifted.into_iter().map(|x| x / (max + EPSILON)).collect()
}

/// Pick onset frames from an onset-strength envelope
///
/// # Returns
///
/// Ascending onset frame indices; empty for an empty or flat envelope
pub fn pick_onsets(envelope: &[f32], config: &PeakPickConfig) -> Vec<usize> {
    if envelope.is_empty() {
        return Vec::new();
    }
    if !envelope.iter().any(|&x| x > 0.0) {
        return Vec::new();
    }

    let x = normalize(envelope);
    let len = x.len();

    // Prefix sums for the moving mean
    let mut prefix = Vec::with_capacity(len + 1);
    prefix.push(0.0f64);
    for &v in &x {
        let last = prefix[prefix.len() - 1];
        prefix.push(last + v as f64);
    }

    let mut onsets: Vec<usize> = Vec::new();
    for n in 0..len {
        let max_start = n.saturating_sub(config.pre_max);
        let max_end = (n + config.post_max.max(1)).min(len);
        let local_max = x[max_start..max_end]
            .iter()
            .copied()
            .fold(f32::MIN, f32::max);
        if x[n] < local_max {
            continue;
        }

        let avg_start = n.saturating_sub(config.pre_avg);
        let avg_end = (n + config.post_avg.max(1)).min(len);
        let local_mean = (prefix[avg_end] - prefix[avg_start]) / (avg_end - avg_start) as f64;
        if (x[n] as f64) < local_mean + config.delta as f64 {
            continue;
        }

        if let Some(&previous) = onsets.last() {
            if n <= previous + config.wait {
                continue;
            }
        }
        onsets.push(n);
    }

    log::debug!("Picked {} onsets from {} envelope frames", onsets.len(), len);

    onsets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pick_onsets_basic() {
        let mut envelope = vec![0.05f32; 100];
        for &i in &[10usize, 30, 50, 70] {
            envelope[i] = 1.0;
            envelope[i + 1] = 0.5;
        }
        let onsets = pick_onsets(&envelope, &PeakPickConfig::default());
        assert_eq!(onsets, vec![10, 30, 50, 70]);
    }

    #[test]
    fn test_pick_onsets_empty_and_flat() {
        let config = PeakPickConfig::default();
        assert!(pick_onsets(&[], &config).is_empty());
        assert!(pick_onsets(&[0.0; 50], &config).is_empty());
    }

    #[test]
    fn test_pick_onsets_respects_wait() {
        let mut envelope = vec![0.0f32; 40];
        envelope[10] = 1.0;
        envelope[12] = 1.0;
        envelope[20] = 1.0;
        let onsets = pick_onsets(&envelope, &PeakPickConfig::default());
        assert_eq!(onsets, vec![10, 20]);
    }

    #[test]
    fn test_pick_onsets_ignores_weak_bumps() {
        let mut envelope = vec![0.0f32; 60];
        envelope[10] = 1.0;
        envelope[30] = 0.03;
        let onsets = pick_onsets(&envelope, &PeakPickConfig::default());
        assert_eq!(onsets, vec![10]);
    }

    #[test]
    fn test_pick_onsets_sorted() {
        let envelope: Vec<f32> = (0..200)
            .map(|i| if i % 17 == 0 { 1.0 } else { (i % 5) as f32 * 0.01 })
            .collect();
        let onsets = pick_onsets(&envelope, &PeakPickConfig::default());
        assert!(!onsets.is_empty());
        for pair in onsets.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }
}
