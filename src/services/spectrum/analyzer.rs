//! Pure spectral analysis: Hann window, FFT magnitude spectrum, and
//! perceptually scaled band grouping.
//!
//! No smoothing state lives here; blending consecutive frames is the
//! consumer's choice.

use rustfft::FftPlanner;
use rustfft::num_complex::Complex32;

use super::types::FrequencyBandConfig;

/// Decibel floor mapped to band level 0.0; 0 dB maps to 1.0.
const DB_FLOOR: f32 = -60.0;

/// Guard against log of zero when a band has no energy.
const DB_EPSILON: f32 = 1e-10;

/// Apply a Hann window in place.
pub fn apply_hann_window(samples: &mut [f32]) {
    let n = samples.len();
    if n < 2 {
        return;
    }
    let denom = (n - 1) as f32;
    for (i, sample) in samples.iter_mut().enumerate() {
        *sample *= 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / denom).cos());
    }
}

/// Analyze one block of mono samples into normalized band energies.
///
/// Takes the first `fft_size` samples, windows them, computes the magnitude
/// spectrum of the non-negative frequencies and groups it into `band_count`
/// log-spaced bands in `[0, 1]`. A block shorter than the window yields all
/// zeros.
pub fn process_block(
    samples: &[f32],
    sample_rate: u32,
    config: &FrequencyBandConfig,
    band_count: usize,
) -> Vec<f32> {
    if samples.len() < config.fft_size {
        return vec![0.0; band_count];
    }

    let mut windowed: Vec<f32> = samples[..config.fft_size].to_vec();
    apply_hann_window(&mut windowed);

    let mut buffer: Vec<Complex32> = windowed
        .into_iter()
        .map(|sample| Complex32::new(sample, 0.0))
        .collect();
    let mut planner = FftPlanner::new();
    planner.plan_fft_forward(config.fft_size).process(&mut buffer);

    let half = config.fft_size / 2;
    let magnitudes: Vec<f32> = buffer[..half].iter().map(|c| c.norm()).collect();

    group_into_bands(&magnitudes, sample_rate, config, band_count)
}

/// Group a magnitude spectrum into logarithmically equal-width bands.
///
/// Each band's value is the mean magnitude over its FFT-bin range converted
/// to decibels and rescaled so −60 dB..0 dB maps to 0..1, clamped.
pub fn group_into_bands(
    magnitudes: &[f32],
    sample_rate: u32,
    config: &FrequencyBandConfig,
    band_count: usize,
) -> Vec<f32> {
    let half = magnitudes.len();
    if half == 0 || band_count == 0 {
        return vec![0.0; band_count];
    }
    let freq_per_bin = sample_rate as f32 / (half * 2) as f32;

    let log_min = config.freq_min.log10();
    let log_max = config.freq_max.log10();
    let log_step = (log_max - log_min) / band_count as f32;

    let mut bands = Vec::with_capacity(band_count);
    for band in 0..band_count {
        let freq_start = 10f32.powf(log_min + band as f32 * log_step);
        let freq_end = 10f32.powf(log_min + (band + 1) as f32 * log_step);

        let mut bin_start = (freq_start / freq_per_bin) as usize;
        let mut bin_end = (freq_end / freq_per_bin) as usize;
        bin_start = bin_start.min(half - 1);
        bin_end = bin_end.min(half - 1);
        // Every band covers at least one bin, even past the Nyquist clamp.
        if bin_end <= bin_start {
            bin_end = bin_start + 1;
        }

        let slice = &magnitudes[bin_start..bin_end.min(half)];
        let mean = if slice.is_empty() {
            0.0
        } else {
            slice.iter().sum::<f32>() / slice.len() as f32
        };

        let db = 20.0 * (mean + DB_EPSILON).log10();
        let level = ((db - DB_FLOOR) / -DB_FLOOR).clamp(0.0, 1.0);
        bands.push(level);
    }
    bands
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::spectrum::types::BAND_COUNT;

    const SAMPLE_RATE: u32 = 48_000;

    fn sine(frequency: f32, length: usize) -> Vec<f32> {
        (0..length)
            .map(|i| {
                (2.0 * std::f32::consts::PI * frequency * i as f32 / SAMPLE_RATE as f32).sin()
            })
            .collect()
    }

    #[test]
    fn hann_window_zeroes_edges_and_keeps_center() {
        let mut samples = vec![1.0f32; 8];
        apply_hann_window(&mut samples);
        assert!(samples[0].abs() < 1e-6);
        assert!(samples[7].abs() < 1e-6);
        assert!(samples[3] > 0.5);
    }

    #[test]
    fn output_is_always_band_count_long_and_bounded() {
        let config = FrequencyBandConfig::default();
        let bands = process_block(&sine(440.0, 2048), SAMPLE_RATE, &config, BAND_COUNT);
        assert_eq!(bands.len(), BAND_COUNT);
        assert!(bands.iter().all(|&level| (0.0..=1.0).contains(&level)));
    }

    #[test]
    fn short_block_yields_zeros() {
        let config = FrequencyBandConfig::default();
        let bands = process_block(&sine(440.0, 100), SAMPLE_RATE, &config, BAND_COUNT);
        assert_eq!(bands, vec![0.0; BAND_COUNT]);
    }

    #[test]
    fn pure_tone_peaks_in_the_matching_band() {
        let config = FrequencyBandConfig::default();
        let frequency = 1_000.0;
        let bands = process_block(&sine(frequency, 2048), SAMPLE_RATE, &config, BAND_COUNT);

        let peak_band = bands
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(band, _)| band)
            .unwrap();

        // Band edges are log-spaced between freq_min and freq_max.
        let log_min = config.freq_min.log10();
        let log_step = (config.freq_max.log10() - log_min) / BAND_COUNT as f32;
        let expected = ((frequency.log10() - log_min) / log_step) as usize;

        assert!(
            peak_band.abs_diff(expected) <= 1,
            "peak at band {peak_band}, expected near {expected}"
        );
    }

    #[test]
    fn band_boundaries_are_non_decreasing() {
        let config = FrequencyBandConfig::default();
        let log_min = config.freq_min.log10();
        let log_step = (config.freq_max.log10() - log_min) / BAND_COUNT as f32;

        let mut previous = 0.0f32;
        for band in 0..=BAND_COUNT {
            let edge = 10f32.powf(log_min + band as f32 * log_step);
            assert!(edge >= previous);
            previous = edge;
        }
    }

    #[test]
    fn silence_maps_to_the_decibel_floor() {
        let config = FrequencyBandConfig::default();
        let bands = process_block(&[0.0; 2048], SAMPLE_RATE, &config, BAND_COUNT);
        assert!(bands.iter().all(|&level| level == 0.0));
    }
}
