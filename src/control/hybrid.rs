use log::{debug, info};

use super::{AnimationSelector, TrendTracker};
use crate::audio::AudioFeatures;
use crate::config::Config;

/// Why the engine kept (or finally released) the current animation this
/// frame. Shown on the status surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldReason {
    None,
    NoBeat,
    TooEarly,
    UnstableBeat,
    BuildUp,
    RecentDrop,
    Disabled,
    StableBeat,
}

impl HoldReason {
    pub fn text(&self) -> &'static str {
        match self {
            HoldReason::None => "None",
            HoldReason::NoBeat => "No beat",
            HoldReason::TooEarly => "Too early",
            HoldReason::UnstableBeat => "Unstable beat",
            HoldReason::BuildUp => "Build-up",
            HoldReason::RecentDrop => "Recent drop",
            HoldReason::Disabled => "Auto disabled",
            HoldReason::StableBeat => "Stable beat + time",
        }
    }
}

/// Decides once per frame whether to advance to the next animation.
///
/// Dwell time scales with tempo (roughly `dwell_beats` beats, never below
/// the absolute floor), beats must be stable for a few consecutive frames,
/// and switching is suppressed during build-ups and right after drops.
/// Manual requests bypass all of that.
pub struct SwitchDecisionEngine {
    trend: TrendTracker,
    auto_switch: bool,
    last_switch_ms: u64,
    debounce_counter: u32,
    reason: HoldReason,

    beat_debounce_frames: u32,
    min_switch_interval_ms: u64,
    dwell_beats: f32,
    drop_holdoff_ms: u64,
}

impl SwitchDecisionEngine {
    pub fn new(config: &Config) -> Self {
        Self {
            trend: TrendTracker::new(
                config.trend_lag,
                config.build_up_threshold,
                config.drop_threshold,
            ),
            auto_switch: true,
            last_switch_ms: 0,
            debounce_counter: 0,
            reason: HoldReason::None,
            beat_debounce_frames: config.beat_debounce_frames,
            min_switch_interval_ms: config.min_switch_interval_ms,
            dwell_beats: config.dwell_beats,
            drop_holdoff_ms: config.drop_holdoff_ms,
        }
    }

    /// Per-frame evaluation. Pushes the frame's volume into the trend
    /// history, then either performs a switch through `selector` or records
    /// why not. Returns true when a switch happened.
    pub fn update(
        &mut self,
        features: &AudioFeatures,
        now_ms: u64,
        selector: &mut dyn AnimationSelector,
    ) -> bool {
        self.trend.push(features.volume);

        if self.should_switch(features, now_ms) {
            self.perform_switch(selector, now_ms);
            true
        } else {
            false
        }
    }

    /// First matching condition wins; the order encodes priority and must
    /// not be rearranged.
    fn should_switch(&mut self, features: &AudioFeatures, now_ms: u64) -> bool {
        if !self.auto_switch {
            self.reason = HoldReason::Disabled;
            return false;
        }

        let elapsed = now_ms.saturating_sub(self.last_switch_ms);

        // Dwell for ~dwell_beats at the current tempo, never under the
        // floor. A non-positive BPM estimate falls back to 120.
        let bpm = if features.bpm > 0.0 { features.bpm } else { 120.0 };
        let beat_duration = (1000.0 * (60.0 / bpm) * self.dwell_beats) as u64;
        let required_delay = self.min_switch_interval_ms.max(beat_duration);

        if features.beat_detected {
            self.debounce_counter += 1;
        } else {
            self.debounce_counter = 0;
            self.reason = HoldReason::NoBeat;
        }
        let beat_stable = self.debounce_counter >= self.beat_debounce_frames;

        if self.trend.is_build_up() {
            debug!("Build-up detected, holding pattern");
            self.reason = HoldReason::BuildUp;
            return false;
        }

        if self.trend.is_drop() && elapsed < self.drop_holdoff_ms {
            self.debounce_counter = 0;
            self.reason = HoldReason::RecentDrop;
            return false;
        }

        if elapsed <= required_delay {
            self.reason = HoldReason::TooEarly;
            return false;
        }

        if !beat_stable {
            self.reason = HoldReason::UnstableBeat;
            return false;
        }

        self.reason = HoldReason::StableBeat;
        true
    }

    fn perform_switch(&mut self, selector: &mut dyn AnimationSelector, now_ms: u64) {
        selector.advance();
        self.last_switch_ms = now_ms;
        self.debounce_counter = 0;
        info!("Animation switched ({})", self.reason.text());
    }

    /// Manual control always wins immediately; no gating applies.
    pub fn request_next(&mut self, selector: &mut dyn AnimationSelector, now_ms: u64) {
        selector.advance();
        self.last_switch_ms = now_ms;
        self.debounce_counter = 0;
        self.reason = HoldReason::None;
    }

    pub fn request_previous(&mut self, selector: &mut dyn AnimationSelector, now_ms: u64) {
        selector.retreat();
        self.last_switch_ms = now_ms;
        self.debounce_counter = 0;
        self.reason = HoldReason::None;
    }

    pub fn toggle_auto_switch(&mut self) {
        self.auto_switch = !self.auto_switch;
        info!(
            "Auto-switch {}",
            if self.auto_switch { "enabled" } else { "disabled" }
        );
    }

    pub fn is_auto_switch_enabled(&self) -> bool {
        self.auto_switch
    }

    pub fn hold_reason(&self) -> HoldReason {
        self.reason
    }
}
