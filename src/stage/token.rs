//! Tick tokens: Keep a tick's buffers alive and pace the next tick.

use super::Stage;
use std::fmt;
use std::sync::Weak;

/// Handle carried with one tick's frames.
///
/// Dropping it tells the stage the frames are no longer read and schedules
/// the next tick. It never blocks the stage.
pub struct Token {
    /// Sequence number of the tick that issued it.
    tick: u64,
    /// Issuing stage.
    stage: Weak<Stage>,
    /// Whether release schedules another tick.
    armed: bool,
}

impl Token {
    pub(crate) const fn new(tick: u64, stage: Weak<Stage>) -> Self {
        Self {
            tick,
            stage,
            armed: true,
        }
    }

    /// Sequence number of the tick that issued this token.
    #[inline]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Release without scheduling another tick.
    pub fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for Token {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Some(stage) = self.stage.upgrade() else {
            return;
        };
        if let Err(err) = stage.spawn_token() {
            tracing::debug!(tick = self.tick, %err, "token released after stage stopped");
        }
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("tick", &self.tick)
            .field("armed", &self.armed)
            .finish_non_exhaustive()
    }
}
