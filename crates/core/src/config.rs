use std::time::Duration;

use jukebox_transport::MIN_RAMP_GAIN;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Tunables for the scheduler and jump policy.
///
/// Every field has a default, so a partial TOML table is enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JukeboxConfig {
    /// How far past the playback clock audio is kept enqueued.
    pub lookahead_secs: f64,
    /// Period of the scheduling tick.
    pub tick_interval_ms: u64,
    /// Jumps shorter than this many segments sound like stutters.
    pub min_jump_separation: usize,
    /// Segments that must play after a jump before the next one may happen.
    pub min_segments_between_jumps: usize,
    /// Segments crossfaded when the walk wraps from the end back to the start.
    pub closure_window: usize,
    /// Gain the loop closure fades to and from.
    pub fade_floor: f32,
    pub jump_probability: f64,
    /// Fixed seed for reproducible walks.
    pub seed: Option<u64>,
}

impl Default for JukeboxConfig {
    fn default() -> Self {
        Self {
            lookahead_secs: 0.1,
            tick_interval_ms: 25,
            min_jump_separation: 16,
            min_segments_between_jumps: 8,
            closure_window: 8,
            fade_floor: 0.001,
            jump_probability: 0.3,
            seed: None,
        }
    }
}

impl JukeboxConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    /// Pull out-of-range values back to something the scheduler can run with.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();

        if !(self.lookahead_secs.is_finite() && self.lookahead_secs > 0.0) {
            warn!(
                "lookahead {} is not usable, falling back to {}s",
                self.lookahead_secs, defaults.lookahead_secs
            );
            self.lookahead_secs = defaults.lookahead_secs;
        }

        // the loop must refill faster than the window drains
        let tick_secs = self.tick_interval().as_secs_f64();
        if tick_secs >= self.lookahead_secs {
            warn!(
                "tick interval {}ms is not shorter than the {}s lookahead",
                self.tick_interval_ms, self.lookahead_secs
            );
        }

        if self.closure_window == 0 {
            self.closure_window = 1;
        }

        self.fade_floor = if self.fade_floor.is_finite() {
            self.fade_floor.clamp(MIN_RAMP_GAIN, 1.0)
        } else {
            defaults.fade_floor
        };

        self.jump_probability = if self.jump_probability.is_nan() {
            defaults.jump_probability
        } else {
            self.jump_probability.clamp(0.0, 1.0)
        };

        self
    }
}
