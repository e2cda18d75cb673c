use rand::{rngs::StdRng, Rng, SeedableRng};

use super::Animation;
use crate::audio::AudioFeatures;
use crate::led::{LedStrip, Rgb};

/// The closed set of animations. New routines are added here and nowhere
/// else; the decision engine only ever advances through this list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationKind {
    BassPulse,
    NeonFlow,
    SpectrumBars,
    Sparkle,
    EnergySwirl,
}

impl AnimationKind {
    pub const ALL: &'static [AnimationKind] = &[
        AnimationKind::BassPulse,
        AnimationKind::NeonFlow,
        AnimationKind::SpectrumBars,
        AnimationKind::Sparkle,
        AnimationKind::EnergySwirl,
    ];

    pub fn build(&self) -> Box<dyn Animation> {
        match self {
            AnimationKind::BassPulse => Box::new(BassPulse::default()),
            AnimationKind::NeonFlow => Box::new(NeonFlow::default()),
            AnimationKind::SpectrumBars => Box::new(SpectrumBars),
            AnimationKind::Sparkle => Box::new(Sparkle::new()),
            AnimationKind::EnergySwirl => Box::new(EnergySwirl::default()),
        }
    }
}

/// Red pulse expanding from the strip center on bass energy, white flash
/// on a beat.
#[derive(Default)]
struct BassPulse {
    flash: f32,
}

impl Animation for BassPulse {
    fn name(&self) -> &'static str {
        "Bass Pulse"
    }

    fn render(&mut self, features: &AudioFeatures, strip: &mut LedStrip, _now_ms: u64) {
        if features.beat_detected {
            self.flash = 1.0;
        } else {
            self.flash *= 0.82;
        }

        let len = strip.len();
        let center = len as f32 / 2.0;
        let reach = features.bass * center;

        for i in 0..len {
            let distance = (i as f32 - center).abs();
            let mut color = if distance <= reach {
                Rgb::new(255, 20, 20).scaled(1.0 - distance / center.max(1.0))
            } else {
                Rgb::BLACK
            };
            if self.flash > 0.05 {
                let w = (self.flash * 255.0) as u8;
                color = Rgb::new(
                    color.r.saturating_add(w / 2),
                    color.g.saturating_add(w / 2),
                    color.b.saturating_add(w / 2),
                );
            }
            strip.set(i, color);
        }
    }
}

/// Scrolling hue gradient; scroll speed follows volume, brightness follows
/// loudness.
#[derive(Default)]
struct NeonFlow {
    offset: f32,
}

impl Animation for NeonFlow {
    fn name(&self) -> &'static str {
        "Neon Flow"
    }

    fn render(&mut self, features: &AudioFeatures, strip: &mut LedStrip, _now_ms: u64) {
        self.offset += 1.0 + features.volume * 8.0;
        let brightness = 0.15 + 0.85 * (features.loudness / 100.0);

        for i in 0..strip.len() {
            let hue = self.offset + i as f32 * 4.0;
            strip.set(i, Rgb::from_hsv(hue, 1.0, brightness));
        }
    }
}

/// Maps the magnitude spectrum across the strip, low bins at the start.
struct SpectrumBars;

impl Animation for SpectrumBars {
    fn name(&self) -> &'static str {
        "Spectrum Bars"
    }

    fn render(&mut self, features: &AudioFeatures, strip: &mut LedStrip, _now_ms: u64) {
        let len = strip.len();
        if features.spectrum.is_empty() {
            strip.clear();
            return;
        }

        let bins_per_pixel = (features.spectrum.len() / len).max(1);
        for i in 0..len {
            let start = i * bins_per_pixel;
            let end = (start + bins_per_pixel).min(features.spectrum.len());
            let level = if start < end {
                let sum: f32 = features.spectrum[start..end].iter().sum();
                (sum / (end - start) as f32 * 4.0).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let hue = 120.0 + 120.0 * (i as f32 / len as f32);
            strip.set(i, Rgb::from_hsv(hue, 1.0, level));
        }
    }
}

/// Random white sparks on beats and treble content, fading into trails.
struct Sparkle {
    rng: StdRng,
}

impl Sparkle {
    fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl Animation for Sparkle {
    fn name(&self) -> &'static str {
        "Sparkle"
    }

    fn render(&mut self, features: &AudioFeatures, strip: &mut LedStrip, _now_ms: u64) {
        if strip.is_empty() {
            return;
        }
        strip.fade(0.85);

        let sparks = if features.beat_detected {
            strip.len() / 8
        } else {
            (features.treble * strip.len() as f32 / 16.0) as usize
        };

        for _ in 0..sparks {
            let index = self.rng.gen_range(0..strip.len());
            let hue = self.rng.gen_range(0.0..360.0);
            strip.set(index, Rgb::from_hsv(hue, 0.3, 1.0));
        }
    }
}

/// Slow sine swirl whose speed tracks total spectral energy and whose hue
/// tracks the centroid.
#[derive(Default)]
struct EnergySwirl {
    phase: f32,
}

impl Animation for EnergySwirl {
    fn name(&self) -> &'static str {
        "Energy Swirl"
    }

    fn render(&mut self, features: &AudioFeatures, strip: &mut LedStrip, _now_ms: u64) {
        self.phase += 0.05 + (features.energy * 0.002).min(0.4);
        let base_hue = 200.0 + features.spectrum_centroid * 1.5;

        for i in 0..strip.len() {
            let wave =
                ((i as f32 * 0.35 + self.phase).sin() * 0.5 + 0.5) * (0.2 + 0.8 * features.volume);
            strip.set(i, Rgb::from_hsv(base_hue + wave * 40.0, 0.9, wave));
        }
    }
}
