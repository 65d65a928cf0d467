//! Simulation timings.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Timings for one player's simulation.
///
/// Defaults match the classic pace: one row per second, a one-second grace
/// before the first piece, a 200 ms + 200 ms line-clear animation, and a
/// ten-second speed penalty window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Delay between launch and the first piece.
    pub spawn_delay: Duration,
    /// Gravity period with no speed penalty.
    pub gravity_interval: Duration,
    /// Delay before completed rows are blanked.
    pub clear_blank_delay: Duration,
    /// Delay between blanking and collapsing completed rows.
    pub clear_collapse_delay: Duration,
    /// How long an opponent's speed penalty lasts.
    pub spin_penalty_window: Duration,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            spawn_delay: Duration::from_millis(1000),
            gravity_interval: Duration::from_millis(1000),
            clear_blank_delay: Duration::from_millis(200),
            clear_collapse_delay: Duration::from_millis(200),
            spin_penalty_window: Duration::from_secs(10),
        }
    }
}

impl GameConfig {
    /// Shortest accepted duration. A zero period would make a timer due
    /// again the instant it fires.
    pub const MIN_DURATION: Duration = Duration::from_millis(1);

    /// Raises any duration below [`Self::MIN_DURATION`].
    pub fn validated(mut self) -> Self {
        for (name, value) in [
            ("spawn_delay", &mut self.spawn_delay),
            ("gravity_interval", &mut self.gravity_interval),
            ("clear_blank_delay", &mut self.clear_blank_delay),
            ("clear_collapse_delay", &mut self.clear_collapse_delay),
            ("spin_penalty_window", &mut self.spin_penalty_window),
        ] {
            if *value < Self::MIN_DURATION {
                warn!(field = name, "duration below minimum, clamping to 1ms");
                *value = Self::MIN_DURATION;
            }
        }
        self
    }

    /// Gravity period under a speed penalty of `multiplier`.
    pub fn gravity_with_penalty(&self, multiplier: u32) -> Duration {
        (self.gravity_interval / (1 + multiplier)).max(Self::MIN_DURATION)
    }
}
