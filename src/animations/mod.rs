pub mod catalog;

pub use catalog::AnimationKind;

use log::debug;

use crate::audio::AudioFeatures;
use crate::control::AnimationSelector;
use crate::led::LedStrip;

/// One generative pixel routine. Implementations are per-frame color
/// formulas; any state they keep (phases, trails) is their own.
pub trait Animation {
    fn name(&self) -> &'static str;
    fn render(&mut self, features: &AudioFeatures, strip: &mut LedStrip, now_ms: u64);
}

/// Owns the closed animation catalog and the current selection.
///
/// The set of animations is fixed at build time, so this is an explicit
/// enum-backed registry rather than anything runtime-extensible.
pub struct AnimationManager {
    animations: Vec<Box<dyn Animation>>,
    current: usize,
}

impl AnimationManager {
    pub fn new() -> Self {
        let animations: Vec<Box<dyn Animation>> =
            AnimationKind::ALL.iter().map(|kind| kind.build()).collect();

        Self {
            animations,
            current: 0,
        }
    }

    pub fn next(&mut self) {
        self.current = (self.current + 1) % self.animations.len();
        debug!(
            "Animation -> {} ({}/{})",
            self.current_name(),
            self.current_index() + 1,
            self.len()
        );
    }

    pub fn previous(&mut self) {
        self.current = (self.current + self.animations.len() - 1) % self.animations.len();
        debug!(
            "Animation -> {} ({}/{})",
            self.current_name(),
            self.current_index() + 1,
            self.len()
        );
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_name(&self) -> &'static str {
        self.animations[self.current].name()
    }

    pub fn len(&self) -> usize {
        self.animations.len()
    }

    pub fn render(&mut self, features: &AudioFeatures, strip: &mut LedStrip, now_ms: u64) {
        self.animations[self.current].render(features, strip, now_ms);
    }
}

impl Default for AnimationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl AnimationSelector for AnimationManager {
    fn advance(&mut self) {
        self.next();
    }

    fn retreat(&mut self) {
        self.previous();
    }
}
