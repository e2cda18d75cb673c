/// Capacity of the volume trend history.
pub const VOLUME_HISTORY_SIZE: usize = 10;

/// Bounded circular history of recent smoothed volume values, answering
/// build-up / drop queries for switch gating.
///
/// Both queries are a two-point finite difference between the newest sample
/// and the one `lag` pushes earlier, not a regression. Slots start
/// zero-filled, so early-session queries compare against silence and bias
/// toward "no trend"; that is expected.
pub struct TrendTracker {
    history: [f32; VOLUME_HISTORY_SIZE],
    pos: usize,
    lag: usize,
    build_up_threshold: f32,
    drop_threshold: f32,
}

impl TrendTracker {
    /// `lag` must be less than [`VOLUME_HISTORY_SIZE`]; config validation
    /// guarantees this.
    pub fn new(lag: usize, build_up_threshold: f32, drop_threshold: f32) -> Self {
        Self {
            history: [0.0; VOLUME_HISTORY_SIZE],
            pos: 0,
            lag,
            build_up_threshold,
            drop_threshold,
        }
    }

    pub fn push(&mut self, volume: f32) {
        self.history[self.pos] = volume;
        self.pos = (self.pos + 1) % VOLUME_HISTORY_SIZE;
    }

    /// Newest sample minus the sample `lag` pushes before it.
    fn trailing_delta(&self) -> f32 {
        let newest = (self.pos + VOLUME_HISTORY_SIZE - 1) % VOLUME_HISTORY_SIZE;
        let lagged = (self.pos + VOLUME_HISTORY_SIZE - 1 - self.lag) % VOLUME_HISTORY_SIZE;
        self.history[newest] - self.history[lagged]
    }

    pub fn is_build_up(&self) -> bool {
        self.trailing_delta() > self.build_up_threshold
    }

    pub fn is_drop(&self) -> bool {
        self.trailing_delta() < self.drop_threshold
    }
}
