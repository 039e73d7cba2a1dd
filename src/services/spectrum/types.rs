use super::error::SpectrumError;

/// Number of frequency bands in every emitted vector. The visual contract
/// is fixed at 64.
pub const BAND_COUNT: usize = 64;

/// Capture tick rate in frames per second.
pub const REFRESH_RATE: u32 = 60;

/// Band level emitted for silence. A small positive floor rather than zero
/// so the visual baseline never goes fully dead.
pub const SILENCE_FLOOR: f32 = 0.05;

/// Runtime-tunable analysis parameters.
///
/// Mutations are atomic with respect to the capture loop: a tick reads a
/// complete configuration, never a half-written one, and an in-flight window
/// is not retroactively resized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrequencyBandConfig {
    /// FFT window size in samples, a power of two
    pub fft_size: usize,
    /// Lower edge of the analyzed range, Hz
    pub freq_min: f32,
    /// Upper edge of the analyzed range, Hz
    pub freq_max: f32,
}

impl FrequencyBandConfig {
    /// Validate and build a configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SpectrumError::InvalidConfiguration`] when the window size
    /// is not a positive power of two or the frequency range is not
    /// `0 < freq_min < freq_max`.
    pub fn new(fft_size: usize, freq_min: f32, freq_max: f32) -> Result<Self, SpectrumError> {
        if fft_size == 0 || !fft_size.is_power_of_two() {
            return Err(SpectrumError::InvalidConfiguration(format!(
                "fft size {fft_size} is not a power of two"
            )));
        }
        if !freq_min.is_finite() || !freq_max.is_finite() || freq_min <= 0.0 || freq_min >= freq_max
        {
            return Err(SpectrumError::InvalidConfiguration(format!(
                "frequency range {freq_min}..{freq_max} Hz is not ascending and positive"
            )));
        }
        Ok(Self {
            fft_size,
            freq_min,
            freq_max,
        })
    }
}

impl Default for FrequencyBandConfig {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            freq_min: 20.0,
            freq_max: 20_000.0,
        }
    }
}

/// The vector emitted when no audio is flowing.
pub fn silence_bands() -> Vec<f32> {
    vec![SILENCE_FLOOR; BAND_COUNT]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_rejects_bad_sizes_and_ranges() {
        assert!(FrequencyBandConfig::new(2048, 20.0, 20_000.0).is_ok());
        assert!(FrequencyBandConfig::new(0, 20.0, 20_000.0).is_err());
        assert!(FrequencyBandConfig::new(1000, 20.0, 20_000.0).is_err());
        assert!(FrequencyBandConfig::new(2048, 0.0, 20_000.0).is_err());
        assert!(FrequencyBandConfig::new(2048, 500.0, 100.0).is_err());
    }

    #[test]
    fn silence_vector_is_all_floor() {
        let bands = silence_bands();
        assert_eq!(bands.len(), BAND_COUNT);
        assert!(bands.iter().all(|&level| level == SILENCE_FLOOR));
    }
}
