pub mod hybrid;
pub mod mood;
pub mod trend;

pub use hybrid::{HoldReason, SwitchDecisionEngine};
pub use mood::{Mood, MoodClassifier};
pub use trend::{TrendTracker, VOLUME_HISTORY_SIZE};

/// Scene-advance boundary the decision engine drives. The engine never
/// inspects which animation is active; its only side effect is calling one
/// of these.
pub trait AnimationSelector {
    fn advance(&mut self);
    fn retreat(&mut self);
}
