use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// All tuning constants for the analysis and switching engine.
///
/// Every value here is calibration, not derivation: the defaults were tuned
/// against live music on a real strip, and genre or microphone changes are
/// expected to need adjustment. Load overrides from a JSON file rather than
/// editing code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    // Sampling
    pub sample_rate: u32,
    /// Samples per analysis block. Must be a power of two (FFT requirement).
    pub block_size: usize,

    // Smoothing
    /// First-stage exponential smoothing of RMS volume. Higher = smoother
    /// and slower to react; this is the single most important knob in the
    /// system, trading beat latency against stability.
    pub volume_smoothing: f32,
    /// Second, independent smoothing applied to the displayed loudness.
    pub loudness_smoothing: f32,

    // Frequency bands
    pub bass_cutoff_hz: f32,
    pub mid_cutoff_hz: f32,
    /// Empirical per-band divisors that map averaged FFT magnitudes into
    /// roughly the 0..1 range for typical program material.
    pub bass_scale: f32,
    pub mid_scale: f32,
    pub treble_scale: f32,

    // Signal presence
    /// Minimum raw RMS before the input counts as a real signal.
    pub noise_threshold: f32,

    // Beat detection
    /// Minimum rise in smoothed volume between two frames to flag a beat.
    pub beat_delta_threshold: f32,
    /// Refractory window between flagged beats.
    pub beat_refractory_ms: u64,
    /// Inter-beat intervals outside this range are noise, not tempo changes.
    pub min_beat_interval_ms: u64,
    pub max_beat_interval_ms: u64,
    /// Normalized bass level a beat must carry to count as a bass hit.
    pub bass_hit_threshold: f32,

    // Trend detection (two-point finite difference, not a regression)
    pub trend_lag: usize,
    pub build_up_threshold: f32,
    pub drop_threshold: f32,

    // Mode switching
    /// Consecutive detected-beat frames required before the beat is "stable".
    pub beat_debounce_frames: u32,
    /// Absolute floor on dwell time regardless of tempo.
    pub min_switch_interval_ms: u64,
    /// Dwell scales to roughly this many beats at the current tempo.
    pub dwell_beats: f32,
    /// Suppress switching this long after a detected drop.
    pub drop_holdoff_ms: u64,

    // Mood classification
    /// Trailing window the mood classifier averages over.
    pub mood_window_ms: u64,

    // Output
    pub led_count: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            block_size: 512,

            volume_smoothing: 0.9,
            loudness_smoothing: 0.9,

            bass_cutoff_hz: 200.0,
            mid_cutoff_hz: 2000.0,
            bass_scale: 8.0,
            mid_scale: 4.0,
            treble_scale: 2.0,

            noise_threshold: 0.02,

            beat_delta_threshold: 0.05,
            beat_refractory_ms: 250,
            min_beat_interval_ms: 250,
            max_beat_interval_ms: 2000,
            bass_hit_threshold: 0.5,

            trend_lag: 5,
            build_up_threshold: 0.1,
            drop_threshold: -0.15,

            beat_debounce_frames: 3,
            min_switch_interval_ms: 6000,
            dwell_beats: 8.0,
            drop_holdoff_ms: 10000,

            mood_window_ms: 5000,

            led_count: 100,
        }
    }
}

impl Config {
    /// Validate at startup so per-frame code never has to re-check.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            bail!("sample_rate must be non-zero");
        }
        if self.block_size < 2 || !self.block_size.is_power_of_two() {
            bail!("block_size must be a power of two >= 2, got {}", self.block_size);
        }
        let nyquist = self.sample_rate as f32 / 2.0;
        if self.bass_cutoff_hz <= 0.0 || self.bass_cutoff_hz > nyquist {
            bail!("bass_cutoff_hz {} outside (0, {}]", self.bass_cutoff_hz, nyquist);
        }
        if self.mid_cutoff_hz <= self.bass_cutoff_hz || self.mid_cutoff_hz > nyquist {
            bail!(
                "mid_cutoff_hz {} must lie in ({}, {}]",
                self.mid_cutoff_hz,
                self.bass_cutoff_hz,
                nyquist
            );
        }
        if !(0.0..1.0).contains(&self.volume_smoothing)
            || !(0.0..1.0).contains(&self.loudness_smoothing)
        {
            bail!("smoothing coefficients must lie in [0, 1)");
        }
        if self.trend_lag == 0 || self.trend_lag >= crate::control::VOLUME_HISTORY_SIZE {
            bail!(
                "trend_lag must lie in 1..{}",
                crate::control::VOLUME_HISTORY_SIZE
            );
        }
        if self.min_beat_interval_ms == 0 || self.max_beat_interval_ms <= self.min_beat_interval_ms
        {
            bail!("beat interval range is empty");
        }
        if self.mood_window_ms == 0 {
            bail!("mood_window_ms must be non-zero");
        }
        if self.led_count == 0 {
            bail!("led_count must be non-zero");
        }
        Ok(())
    }

    pub fn load(path: &str) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &str) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// FFT bin index for a frequency, `freq * N / sample_rate`.
    pub fn bin_index(&self, freq_hz: f32) -> usize {
        (freq_hz * self.block_size as f32 / self.sample_rate as f32) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn rejects_non_power_of_two_block() {
        let config = Config {
            block_size: 500,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_cutoffs_beyond_nyquist() {
        let config = Config {
            mid_cutoff_hz: 30000.0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            bass_cutoff_hz: 0.0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_inverted_band_order() {
        let config = Config {
            bass_cutoff_hz: 2000.0,
            mid_cutoff_hz: 200.0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_mood_window() {
        let config = Config {
            mood_window_ms: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn bin_index_matches_formula() {
        let config = Config::default();
        // 200 Hz * 512 / 44100 = 2.32 -> bin 2
        assert_eq!(config.bin_index(200.0), 2);
        assert_eq!(config.bin_index(2000.0), 23);
    }
}
