//! Sample-rate conversion by linear interpolation

/// Resample a mono signal from `from_rate` to `to_rate`
///
/// Output length is `round(len * to_rate / from_rate)`. Returns the input
/// unchanged when the rates match.
pub fn resample_linear(input: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if input.is_empty() || from_rate == 0 || to_rate == 0 {
        return vec![];
    }
    if from_rate == to_rate {
        return input.to_vec();
    }

    let output_len = (input.len() as f64 * to_rate as f64 / from_rate as f64).round() as usize;
    let step = from_rate as f64 / to_rate as f64;
    let mut output = Vec::with_capacity(output_len);

    for i in 0..output_len {
        let pos = i as f64 * step;
        let idx = pos as usize;
        let frac = (pos - idx as f64) as f32;

        if idx + 1 < input.len() {
            output.push(input[idx] * (1.0 - frac) + input[idx + 1] * frac);
        } else {
            output.push(input[input.len() - 1]);
        }
    }

    output
}
