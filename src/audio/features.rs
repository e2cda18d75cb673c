use log::debug;

use super::AudioFeatures;
use crate::config::Config;

/// Turns one raw sample block plus its magnitude spectrum into an
/// [`AudioFeatures`] snapshot.
///
/// All smoothing state lives on the struct and is threaded through
/// explicitly; `analyze` is called once per frame with the caller's clock.
/// The beat detector is a single-previous-sample volume-delta edge detector
/// with a fixed refractory window. It will double-trigger on sustained loud
/// passages just outside the refractory window and under-detect gradual
/// attacks; the dwell-time math downstream is tuned against exactly these
/// statistics, so do not swap in a smarter onset detector without retuning.
pub struct FeatureExtractor {
    config: Config,
    bass_limit: usize,
    mid_limit: usize,

    normalized_volume: f32,
    smoothed_loudness: f32,
    previous_volume: f32,
    noise_floor: f32,

    last_beat_ms: u64,
    current_bpm: f32,
    bass_hits: u32,
}

impl FeatureExtractor {
    pub fn new(config: &Config) -> Self {
        let half = config.block_size / 2;
        let bass_limit = config.bin_index(config.bass_cutoff_hz).clamp(1, half);
        let mid_limit = config.bin_index(config.mid_cutoff_hz).clamp(bass_limit, half);

        Self {
            config: config.clone(),
            bass_limit,
            mid_limit,
            normalized_volume: 0.0,
            smoothed_loudness: 0.0,
            previous_volume: 0.0,
            noise_floor: 0.0,
            last_beat_ms: 0,
            current_bpm: 0.0,
            bass_hits: 0,
        }
    }

    /// Analyze one frame. `samples` is the raw block (borrowed into the
    /// returned snapshot as `waveform`), `magnitudes` the matching spectrum,
    /// `now_ms` the caller's monotonic clock.
    ///
    /// Never fails: an empty or all-zero block yields a zeroed snapshot
    /// with `signal_presence = false`. Downstream code branches on the
    /// snapshot's fields, never on an error from here.
    pub fn analyze<'a>(
        &mut self,
        samples: &'a [f32],
        magnitudes: &[f32],
        now_ms: u64,
    ) -> AudioFeatures<'a> {
        if samples.is_empty() || samples.iter().all(|&s| s == 0.0) {
            return self.silent_frame(samples, magnitudes.len());
        }

        // Raw block statistics, clamped against upstream clipping bugs.
        let mut sum_squares = 0.0f32;
        let mut sum_abs = 0.0f32;
        let mut peak = 0.0f32;
        for &sample in samples {
            let s = sample.clamp(-1.0, 1.0);
            sum_squares += s * s;
            sum_abs += s.abs();
            peak = peak.max(s.abs());
        }
        let raw_volume = (sum_squares / samples.len() as f32).sqrt();
        let average = sum_abs / samples.len() as f32;

        // Two-stage smoothing: the first stabilizes the beat detector's
        // input, the second the displayed loudness.
        let alpha = self.config.volume_smoothing;
        self.normalized_volume = alpha * self.normalized_volume + (1.0 - alpha) * raw_volume;
        let volume = self.normalized_volume.clamp(0.0, 1.0);

        let l_alpha = self.config.loudness_smoothing;
        self.smoothed_loudness =
            l_alpha * self.smoothed_loudness + (1.0 - l_alpha) * (volume * 100.0);
        let loudness = self.smoothed_loudness.clamp(0.0, 100.0);

        let (bass, mid, treble) = self.band_energies(magnitudes);
        let (spectrum_centroid, dominant_band, energy) = Self::spectral_shape(magnitudes);

        self.update_noise_floor(raw_volume);
        let signal_presence =
            raw_volume > self.config.noise_threshold.max(1.5 * self.noise_floor);

        let beat_detected = self.detect_beat(volume, bass, now_ms);
        self.previous_volume = volume;

        AudioFeatures {
            volume,
            loudness,
            peak,
            average,
            dynamics: peak - average,
            bass,
            mid,
            treble,
            spectrum: magnitudes.to_vec(),
            spectrum_centroid,
            dominant_band,
            energy,
            beat_detected,
            bpm: self.current_bpm,
            bass_hits: self.bass_hits,
            noise_floor: self.noise_floor,
            signal_presence,
            waveform: samples,
        }
    }

    /// Zeroed snapshot for an invalid or silent block. Smoothing state
    /// decays toward silence so recovery after a dropout stays smooth.
    fn silent_frame<'a>(&mut self, samples: &'a [f32], spectrum_len: usize) -> AudioFeatures<'a> {
        self.normalized_volume *= self.config.volume_smoothing;
        self.smoothed_loudness *= self.config.loudness_smoothing;
        self.previous_volume = 0.0;

        AudioFeatures {
            volume: 0.0,
            loudness: 0.0,
            peak: 0.0,
            average: 0.0,
            dynamics: 0.0,
            bass: 0.0,
            mid: 0.0,
            treble: 0.0,
            spectrum: vec![0.0; spectrum_len],
            spectrum_centroid: 0.0,
            dominant_band: 0,
            energy: 0.0,
            beat_detected: false,
            bpm: self.current_bpm,
            bass_hits: self.bass_hits,
            noise_floor: self.noise_floor,
            signal_presence: false,
            waveform: samples,
        }
    }

    /// Sum the magnitude bins of each band, average by bin count, and map
    /// through the calibration divisors into 0..1.
    fn band_energies(&self, magnitudes: &[f32]) -> (f32, f32, f32) {
        let half = magnitudes.len();
        let bass_limit = self.bass_limit.min(half);
        let mid_limit = self.mid_limit.min(half);

        let band = |range: std::ops::Range<usize>, scale: f32| -> f32 {
            if range.is_empty() {
                return 0.0;
            }
            let count = range.len() as f32;
            let sum: f32 = magnitudes[range].iter().sum();
            (sum / count / scale).clamp(0.0, 1.0)
        };

        (
            band(0..bass_limit, self.config.bass_scale),
            band(bass_limit..mid_limit, self.config.mid_scale),
            band(mid_limit..half, self.config.treble_scale),
        )
    }

    /// Centroid, dominant bin and total energy in one pass. Bin 0 carries
    /// DC offset, not tonal content, so it is excluded from the shape
    /// descriptors (but counted into total energy).
    fn spectral_shape(magnitudes: &[f32]) -> (f32, usize, f32) {
        let mut weighted_sum = 0.0f32;
        let mut tonal_sum = 0.0f32;
        let mut dominant_band = 0usize;
        let mut dominant_mag = 0.0f32;
        let mut energy = 0.0f32;

        for (i, &magnitude) in magnitudes.iter().enumerate() {
            energy += magnitude;
            if i == 0 {
                continue;
            }
            weighted_sum += magnitude * i as f32;
            tonal_sum += magnitude;
            if magnitude > dominant_mag {
                dominant_mag = magnitude;
                dominant_band = i;
            }
        }

        let centroid = if tonal_sum > 0.0 {
            weighted_sum / tonal_sum
        } else {
            0.0
        };

        (centroid, dominant_band, energy)
    }

    /// Asymmetric EMA: drops fast when the input gets quieter, rises slowly
    /// so sustained music does not get absorbed into the floor.
    fn update_noise_floor(&mut self, raw_volume: f32) {
        if raw_volume < self.noise_floor {
            self.noise_floor = 0.9 * self.noise_floor + 0.1 * raw_volume;
        } else {
            self.noise_floor = 0.995 * self.noise_floor + 0.005 * raw_volume;
        }
    }

    /// Volume-delta edge detector with refractory window. BPM only updates
    /// when the inter-beat interval is plausible; a too-fast or too-slow
    /// interval is noise, not a tempo change.
    fn detect_beat(&mut self, volume: f32, bass: f32, now_ms: u64) -> bool {
        let delta = volume - self.previous_volume;
        let since_last = now_ms.saturating_sub(self.last_beat_ms);

        if delta <= self.config.beat_delta_threshold || since_last <= self.config.beat_refractory_ms
        {
            return false;
        }

        if (self.config.min_beat_interval_ms..=self.config.max_beat_interval_ms)
            .contains(&since_last)
        {
            self.current_bpm = 60000.0 / since_last as f32;
        }
        self.last_beat_ms = now_ms;

        if bass >= self.config.bass_hit_threshold {
            self.bass_hits = self.bass_hits.wrapping_add(1);
        }

        debug!("Beat detected, delta {:.3}, BPM {:.1}", delta, self.current_bpm);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn extractor() -> FeatureExtractor {
        FeatureExtractor::new(&Config::default())
    }

    fn constant_block(amplitude: f32, len: usize) -> Vec<f32> {
        vec![amplitude; len]
    }

    #[test]
    fn zero_block_yields_silent_snapshot() {
        let mut fx = extractor();
        let samples = constant_block(0.0, 512);
        let magnitudes = vec![0.5; 256];

        let features = fx.analyze(&samples, &magnitudes, 1000);
        assert!(!features.signal_presence);
        assert!(!features.beat_detected);
        assert_eq!(features.volume, 0.0);
        assert_eq!(features.bass, 0.0);
        assert_eq!(features.mid, 0.0);
        assert_eq!(features.treble, 0.0);
        assert_eq!(features.energy, 0.0);
        assert!(features.spectrum.iter().all(|&m| m == 0.0));
    }

    #[test]
    fn normalized_fields_stay_in_range_for_random_input() {
        let mut fx = extractor();
        let mut rng = StdRng::seed_from_u64(7);

        for frame in 0..200u64 {
            // Deliberately exceed [-1, 1] to exercise the input clamp.
            let samples: Vec<f32> = (0..512).map(|_| rng.gen_range(-2.0..2.0)).collect();
            let magnitudes: Vec<f32> = (0..256).map(|_| rng.gen_range(0.0..50.0)).collect();

            let features = fx.analyze(&samples, &magnitudes, frame * 12);
            assert!((0.0..=1.0).contains(&features.volume));
            assert!((0.0..=100.0).contains(&features.loudness));
            assert!((0.0..=1.0).contains(&features.peak));
            assert!((0.0..=1.0).contains(&features.average));
            assert!((0.0..=1.0).contains(&features.bass));
            assert!((0.0..=1.0).contains(&features.mid));
            assert!((0.0..=1.0).contains(&features.treble));
            assert!(features.spectrum_centroid.is_finite());
            assert!(features.energy.is_finite());
        }
    }

    #[test]
    fn smoothed_volume_converges_to_raw_rms() {
        let mut fx = extractor();
        let samples = constant_block(0.5, 512);
        let magnitudes = vec![0.0; 256];

        let mut volume = 0.0;
        for frame in 0..400u64 {
            volume = fx.analyze(&samples, &magnitudes, frame * 12).volume;
        }
        // RMS of a constant 0.5 block is 0.5; the exponential filter's
        // fixed point is the raw input.
        assert!((volume - 0.5).abs() < 1e-3, "volume {volume}");
    }

    #[test]
    fn centroid_guard_handles_zero_energy() {
        let mut fx = extractor();
        let samples = constant_block(0.3, 512);
        let magnitudes = vec![0.0; 256];

        let features = fx.analyze(&samples, &magnitudes, 100);
        assert_eq!(features.spectrum_centroid, 0.0);
        assert_eq!(features.dominant_band, 0);
    }

    #[test]
    fn dominant_band_ignores_dc_bin() {
        let mut fx = extractor();
        let samples = constant_block(0.3, 512);
        let mut magnitudes = vec![0.0; 256];
        magnitudes[0] = 100.0; // DC
        magnitudes[40] = 1.0;

        let features = fx.analyze(&samples, &magnitudes, 100);
        assert_eq!(features.dominant_band, 40);
    }

    /// Drive the extractor with a spike/quiet pattern and collect the
    /// timestamps of detected beats.
    fn beat_times(fx: &mut FeatureExtractor, spike_period_ms: u64, duration_ms: u64) -> Vec<u64> {
        let magnitudes = vec![0.0; 256];
        let mut beats = Vec::new();
        let mut now = 0u64;
        while now < duration_ms {
            let amplitude = if now % spike_period_ms < 12 { 1.0 } else { 0.01 };
            let samples = constant_block(amplitude, 512);
            if fx.analyze(&samples, &magnitudes, now).beat_detected {
                beats.push(now);
            }
            now += 12; // ~512 samples at 44.1 kHz
        }
        beats
    }

    #[test]
    fn refractory_window_separates_beats() {
        let mut fx = extractor();
        // Spikes every 60 ms, far faster than the 250 ms refractory.
        let beats = beat_times(&mut fx, 60, 5000);
        assert!(!beats.is_empty());
        for pair in beats.windows(2) {
            assert!(pair[1] - pair[0] > 250, "beats {} and {} too close", pair[0], pair[1]);
        }
    }

    #[test]
    fn click_track_yields_tempo_estimate() {
        let mut fx = extractor();
        let beats = beat_times(&mut fx, 500, 6000);
        assert!(beats.len() >= 8, "expected regular beats, got {beats:?}");

        let samples = constant_block(0.01, 512);
        let features = fx.analyze(&samples, &vec![0.0; 256], 6000);
        // 500 ms inter-beat interval is 120 BPM.
        assert!((features.bpm - 120.0).abs() < 6.0, "bpm {}", features.bpm);
    }

    #[test]
    fn implausible_interval_retains_previous_bpm() {
        let mut fx = extractor();
        let _ = beat_times(&mut fx, 500, 6000);
        let bpm_before = fx.current_bpm;
        assert!(bpm_before > 0.0);

        // Next beat arrives 3 s later, outside the 2000 ms plausible
        // ceiling: flagged as a beat but the tempo estimate is kept.
        let magnitudes = vec![0.0; 256];
        let quiet = constant_block(0.01, 512);
        for t in 0..249u64 {
            fx.analyze(&quiet, &magnitudes, 6000 + t * 12);
        }
        let loud = constant_block(1.0, 512);
        let features = fx.analyze(&loud, &magnitudes, 9000);
        assert!(features.beat_detected);
        assert_eq!(features.bpm, bpm_before);
    }

    #[test]
    fn bass_hits_count_only_bassy_beats() {
        let mut fx = extractor();
        let quiet = constant_block(0.01, 512);
        let loud = constant_block(1.0, 512);
        let bassy: Vec<f32> = (0..256).map(|i| if i < 3 { 100.0 } else { 0.0 }).collect();
        let thin = vec![0.0; 256];

        for t in 0..50u64 {
            fx.analyze(&quiet, &thin, t * 12);
        }
        let f = fx.analyze(&loud, &thin, 1000);
        assert!(f.beat_detected);
        assert_eq!(f.bass_hits, 0);

        for t in 0..50u64 {
            fx.analyze(&quiet, &thin, 1200 + t * 12);
        }
        let f = fx.analyze(&loud, &bassy, 2000);
        assert!(f.beat_detected);
        assert_eq!(f.bass_hits, 1);
    }

    #[test]
    fn loud_input_registers_signal_presence() {
        let mut fx = extractor();
        let samples = constant_block(0.8, 512);
        let features = fx.analyze(&samples, &vec![0.0; 256], 50);
        assert!(features.signal_presence);
        assert!(features.noise_floor < 0.8);
    }

    #[test]
    fn waveform_borrows_the_raw_block() {
        let mut fx = extractor();
        let samples = constant_block(0.2, 512);
        let features = fx.analyze(&samples, &vec![0.0; 256], 50);
        assert_eq!(features.waveform.len(), 512);
        assert_eq!(features.waveform[0], 0.2);
    }
}
