//! PCM helpers — channel downmix and linear resampling.
//!
//! Recorded audio arrives at the device's native rate and channel count;
//! both the WAV encoder and the recognition engine want 16 kHz mono. The
//! resampler is plain linear interpolation, which is plenty for speech
//! analysis rates.

/// Mix interleaved multi-channel audio down to mono by averaging channels.
///
/// The output length is `samples.len() / channels`. Mono input is returned
/// as an owned copy without averaging; `channels == 0` yields an empty
/// vector.
pub fn downmix_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels == 0 {
        return Vec::new();
    }
    if channels == 1 {
        return samples.to_vec();
    }

    let channels = channels as usize;
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Resample mono audio from `from_hz` to `to_hz` by linear interpolation.
///
/// Equal rates (and empty input) pass through untouched.
pub fn resample(samples: &[f32], from_hz: u32, to_hz: u32) -> Vec<f32> {
    if samples.is_empty() || from_hz == to_hz || from_hz == 0 || to_hz == 0 {
        return samples.to_vec();
    }

    let ratio = from_hz as f64 / to_hz as f64;
    let out_len = ((samples.len() as f64) / ratio).floor() as usize;
    let mut out = Vec::with_capacity(out_len);

    for i in 0..out_len {
        let pos = i as f64 * ratio;
        let idx = pos.floor() as usize;
        let frac = (pos - idx as f64) as f32;

        let a = samples[idx];
        let b = if idx + 1 < samples.len() {
            samples[idx + 1]
        } else {
            a
        };
        out.push(a + (b - a) * frac);
    }

    out
}

/// Downmix and resample one captured chunk to `target_hz` mono.
pub fn normalize_chunk(samples: &[f32], channels: u16, from_hz: u32, target_hz: u32) -> Vec<f32> {
    let mono = downmix_mono(samples, channels);
    resample(&mono, from_hz, target_hz)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_averages_stereo_frames() {
        let stereo = [0.5_f32, -0.5, 0.4, 0.0];
        let mono = downmix_mono(&stereo, 2);
        assert_eq!(mono.len(), 2);
        assert!((mono[0]).abs() < 1e-6);
        assert!((mono[1] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn downmix_mono_is_a_copy() {
        let samples = [0.1_f32, 0.2, 0.3];
        assert_eq!(downmix_mono(&samples, 1), samples.to_vec());
    }

    #[test]
    fn downmix_zero_channels_is_empty() {
        assert!(downmix_mono(&[0.1, 0.2], 0).is_empty());
    }

    #[test]
    fn resample_equal_rates_passes_through() {
        let samples = [0.1_f32, 0.2, 0.3];
        assert_eq!(resample(&samples, 16_000, 16_000), samples.to_vec());
    }

    #[test]
    fn resample_halves_length_for_2x_downsample() {
        let samples: Vec<f32> = (0..100).map(|i| i as f32 / 100.0).collect();
        let out = resample(&samples, 32_000, 16_000);
        assert_eq!(out.len(), 50);
        // Linear interpolation keeps the ramp monotone.
        assert!(out.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn resample_upsamples_without_panicking_at_the_tail() {
        let samples = [0.0_f32, 1.0];
        let out = resample(&samples, 8_000, 16_000);
        assert_eq!(out.len(), 4);
        assert!((out[0]).abs() < 1e-6);
    }

    #[test]
    fn normalize_chunk_combines_both_steps() {
        let stereo: Vec<f32> = vec![0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5, 0.5];
        let out = normalize_chunk(&stereo, 2, 32_000, 16_000);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|s| (s - 0.5).abs() < 1e-6));
    }
}
