use anyhow::Result;
use log::warn;

use crate::animations::AnimationManager;
use crate::audio::{FeatureExtractor, SampleSource, SpectralAnalyzer};
use crate::config::Config;
use crate::control::{HoldReason, Mood, MoodClassifier, SwitchDecisionEngine};
use crate::led::LedStrip;

/// Status snapshot for the display/logging surface, one per frame.
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub signal_presence: bool,
    pub beat_detected: bool,
    pub volume: f32,
    pub loudness: f32,
    pub bpm: f32,
    pub hold_reason: HoldReason,
    pub mood: Mood,
    pub animation: &'static str,
    pub switched: bool,
}

/// The per-frame loop: capture -> transform -> extract -> decide -> render.
///
/// Single-threaded by design; everything here is single-owner state mutated
/// once per `step`. A capture failure or timeout substitutes a zero block,
/// so `step` itself never fails. Degraded input presents as
/// `signal_presence = false` and near-zero features rather than an error.
pub struct Pipeline {
    source: Box<dyn SampleSource>,
    analyzer: SpectralAnalyzer,
    extractor: FeatureExtractor,
    engine: SwitchDecisionEngine,
    mood: MoodClassifier,
    animations: AnimationManager,
    strip: LedStrip,
    block: Vec<f32>,
}

impl Pipeline {
    pub fn new(config: &Config, source: Box<dyn SampleSource>) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            source,
            analyzer: SpectralAnalyzer::new(config.block_size),
            extractor: FeatureExtractor::new(config),
            engine: SwitchDecisionEngine::new(config),
            mood: MoodClassifier::new(config.mood_window_ms),
            animations: AnimationManager::new(),
            strip: LedStrip::new(config.led_count),
            block: vec![0.0; config.block_size],
        })
    }

    /// Run one frame at the caller's clock and return the status snapshot.
    pub fn step(&mut self, now_ms: u64) -> FrameReport {
        match self.source.fill_block(&mut self.block) {
            Ok(_) => {}
            Err(e) => {
                warn!("Audio capture failed, substituting silence: {}", e);
                self.block.fill(0.0);
            }
        }

        let magnitudes = self.analyzer.transform(&self.block);
        let features = self.extractor.analyze(&self.block, magnitudes, now_ms);

        let switched = self.engine.update(&features, now_ms, &mut self.animations);
        self.mood.push(&features, now_ms);
        self.animations.render(&features, &mut self.strip, now_ms);

        FrameReport {
            signal_presence: features.signal_presence,
            beat_detected: features.beat_detected,
            volume: features.volume,
            loudness: features.loudness,
            bpm: features.bpm,
            hold_reason: self.engine.hold_reason(),
            mood: self.mood.classify(now_ms),
            animation: self.animations.current_name(),
            switched,
        }
    }

    // Manual override surface, wired to whatever input device the binary
    // has (keyboard, web, encoder).

    pub fn request_next(&mut self, now_ms: u64) {
        self.engine.request_next(&mut self.animations, now_ms);
    }

    pub fn request_previous(&mut self, now_ms: u64) {
        self.engine.request_previous(&mut self.animations, now_ms);
    }

    pub fn toggle_auto_switch(&mut self) {
        self.engine.toggle_auto_switch();
    }

    pub fn is_auto_switch_enabled(&self) -> bool {
        self.engine.is_auto_switch_enabled()
    }

    pub fn current_animation(&self) -> &'static str {
        self.animations.current_name()
    }

    pub fn strip(&self) -> &LedStrip {
        &self.strip
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::SilenceSource;
    use anyhow::Result;

    /// Spike block on a fixed period, quiet blocks in between.
    struct ClickSource {
        calls: u64,
        period: u64,
    }

    impl SampleSource for ClickSource {
        fn fill_block(&mut self, block: &mut [f32]) -> Result<bool> {
            let amplitude = if self.calls % self.period == 0 { 1.0 } else { 0.01 };
            block.fill(amplitude);
            self.calls += 1;
            Ok(true)
        }
    }

    #[test]
    fn silence_presents_as_no_signal_not_an_error() {
        let config = Config::default();
        let mut pipeline = Pipeline::new(&config, Box::new(SilenceSource)).unwrap();

        for i in 0..50u64 {
            let report = pipeline.step(i * 12);
            assert!(!report.signal_presence);
            assert!(!report.beat_detected);
            assert_eq!(report.volume, 0.0);
            assert!(!report.switched);
            assert_eq!(report.mood, Mood::Calm);
        }
    }

    #[test]
    fn click_track_produces_beats_with_plausible_tempo() {
        let config = Config::default();
        // One block per 12 ms of simulated time, spike every ~504 ms.
        let source = ClickSource { calls: 0, period: 42 };
        let mut pipeline = Pipeline::new(&config, Box::new(source)).unwrap();

        let mut beat_times = Vec::new();
        let mut last_bpm = 0.0;
        for i in 0..500u64 {
            let report = pipeline.step(i * 12);
            if report.beat_detected {
                beat_times.push(i * 12);
            }
            last_bpm = report.bpm;
        }

        assert!(beat_times.len() >= 8, "beats: {beat_times:?}");
        for pair in beat_times.windows(2) {
            assert!(pair[1] - pair[0] > 250);
        }
        // ~504 ms inter-beat interval.
        assert!((last_bpm - 119.0).abs() < 6.0, "bpm {last_bpm}");
    }

    #[test]
    fn manual_override_changes_animation_immediately() {
        let config = Config::default();
        let mut pipeline = Pipeline::new(&config, Box::new(SilenceSource)).unwrap();

        let first = pipeline.current_animation();
        pipeline.request_next(100);
        assert_ne!(pipeline.current_animation(), first);

        pipeline.request_previous(200);
        assert_eq!(pipeline.current_animation(), first);
    }

    #[test]
    fn strip_matches_configured_led_count() {
        let config = Config {
            led_count: 17,
            ..Config::default()
        };
        let pipeline = Pipeline::new(&config, Box::new(SilenceSource)).unwrap();
        assert_eq!(pipeline.strip().len(), 17);
    }

    #[test]
    fn invalid_config_fails_at_construction() {
        let config = Config {
            block_size: 300,
            ..Config::default()
        };
        assert!(Pipeline::new(&config, Box::new(SilenceSource)).is_err());
    }
}
