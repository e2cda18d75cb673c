use std::collections::VecDeque;

use crate::audio::AudioFeatures;

/// Snapshots retained, roughly a minute at 25 fps.
pub const MOOD_HISTORY_CAPACITY: usize = 1500;

/// Coarse musical mood over the recent window. Published on the status
/// surface; the switch engine does not consume it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mood {
    Unknown,
    Calm,
    Drop,
    Groove,
    Chaos,
    Buildup,
    Idle,
}

impl Mood {
    pub fn text(&self) -> &'static str {
        match self {
            Mood::Unknown => "Unknown",
            Mood::Calm => "Calm",
            Mood::Drop => "Drop",
            Mood::Groove => "Groove",
            Mood::Chaos => "Chaos",
            Mood::Buildup => "Buildup",
            Mood::Idle => "Idle",
        }
    }
}

/// One retained frame of the fields the classifier averages.
#[derive(Debug, Clone, Copy)]
struct MoodSnapshot {
    timestamp_ms: u64,
    volume: f32,
    energy: f32,
    centroid: f32,
    beat: bool,
}

/// Bounded history of feature snapshots plus a thresholded mood
/// classification over the trailing window.
///
/// The thresholds are calibration against the analyzer's normalized
/// magnitude scale, same as the band divisors in the config.
pub struct MoodClassifier {
    history: VecDeque<MoodSnapshot>,
    window_ms: u64,
}

impl MoodClassifier {
    pub fn new(window_ms: u64) -> Self {
        Self {
            history: VecDeque::with_capacity(MOOD_HISTORY_CAPACITY),
            window_ms,
        }
    }

    pub fn push(&mut self, features: &AudioFeatures, now_ms: u64) {
        self.history.push_back(MoodSnapshot {
            timestamp_ms: now_ms,
            volume: features.volume,
            energy: features.energy,
            centroid: features.spectrum_centroid,
            beat: features.beat_detected,
        });
        if self.history.len() > MOOD_HISTORY_CAPACITY {
            self.history.pop_front();
        }
    }

    /// Average volume/energy/centroid and the beat rate over the trailing
    /// window, then walk the threshold ladder. First match wins; the more
    /// specific moods sit above the broader ones.
    pub fn classify(&self, now_ms: u64) -> Mood {
        let mut count = 0usize;
        let mut volume = 0.0f32;
        let mut energy = 0.0f32;
        let mut centroid = 0.0f32;
        let mut beats = 0u32;
        let mut first_ms = now_ms;
        let mut last_ms = now_ms;

        for snap in self.history.iter().rev() {
            if now_ms.saturating_sub(snap.timestamp_ms) > self.window_ms {
                break;
            }
            if count == 0 {
                last_ms = snap.timestamp_ms;
            }
            first_ms = snap.timestamp_ms;
            volume += snap.volume;
            energy += snap.energy;
            centroid += snap.centroid;
            if snap.beat {
                beats += 1;
            }
            count += 1;
        }

        if count == 0 {
            return Mood::Unknown;
        }

        let n = count as f32;
        volume /= n;
        energy /= n;
        centroid /= n;
        // Beats per second across the window's actual span.
        let beat_rate = beats as f32 * 1000.0 / (last_ms.saturating_sub(first_ms) + 1) as f32;

        if volume < 0.1 && energy < 0.25 {
            return Mood::Calm;
        }
        if centroid > 150.0 && energy > 5.0 && volume > 0.5 {
            return Mood::Drop;
        }
        if energy > 4.5 && beat_rate > 1.5 {
            return Mood::Groove;
        }
        if energy > 5.5 && centroid > 140.0 {
            return Mood::Chaos;
        }
        if energy > 4.0 && centroid > 120.0 {
            return Mood::Buildup;
        }
        Mood::Idle
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.history.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(volume: f32, energy: f32, centroid: f32, beat: bool) -> AudioFeatures<'static> {
        AudioFeatures {
            volume,
            energy,
            spectrum_centroid: centroid,
            beat_detected: beat,
            ..AudioFeatures::default()
        }
    }

    fn classifier() -> MoodClassifier {
        MoodClassifier::new(5000)
    }

    #[test]
    fn empty_history_is_unknown() {
        let mood = classifier();
        assert_eq!(mood.classify(1000), Mood::Unknown);
    }

    #[test]
    fn quiet_frames_classify_as_calm() {
        let mut mood = classifier();
        for i in 0..20u64 {
            mood.push(&snapshot(0.02, 0.1, 10.0, false), i * 40);
        }
        assert_eq!(mood.classify(800), Mood::Calm);
    }

    #[test]
    fn energetic_beats_classify_as_groove() {
        let mut mood = classifier();
        // A beat every 250 ms (4 per second) with sustained energy.
        for i in 0..40u64 {
            let beat = i % 6 == 0;
            mood.push(&snapshot(0.4, 5.0, 100.0, beat), i * 40);
        }
        assert_eq!(mood.classify(1600), Mood::Groove);
    }

    #[test]
    fn loud_bright_sustain_classifies_as_drop() {
        let mut mood = classifier();
        for i in 0..20u64 {
            mood.push(&snapshot(0.7, 5.5, 160.0, false), i * 40);
        }
        assert_eq!(mood.classify(800), Mood::Drop);
    }

    #[test]
    fn chaos_outranks_buildup() {
        let mut mood = classifier();
        // Satisfies both the chaos and buildup thresholds without the
        // volume or beat rate for drop/groove; the ladder must report the
        // more specific mood.
        for i in 0..20u64 {
            mood.push(&snapshot(0.3, 6.0, 150.0, false), i * 40);
        }
        assert_eq!(mood.classify(800), Mood::Chaos);
    }

    #[test]
    fn stale_samples_fall_out_of_the_window() {
        let mut mood = classifier();
        for i in 0..20u64 {
            mood.push(&snapshot(0.7, 5.5, 160.0, false), i * 40);
        }
        // Ten seconds later the loud passage is outside the 5 s window.
        assert_eq!(mood.classify(11000), Mood::Unknown);
    }

    #[test]
    fn history_is_bounded() {
        let mut mood = classifier();
        for i in 0..(MOOD_HISTORY_CAPACITY as u64 + 500) {
            mood.push(&snapshot(0.3, 1.0, 50.0, false), i * 40);
        }
        assert_eq!(mood.len(), MOOD_HISTORY_CAPACITY);
    }
}
