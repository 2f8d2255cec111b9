//! Exponential spin backoff for the retry loops.

use crate::sync::{spin_loop, yield_now};

/// Upper bound on the exponent: a single round spins at most `1 << 6` times.
/// Under loom every spin is already a scheduling point, so one is enough.
const MAX_SPIN_SHIFT: u32 = if cfg!(feature = "loom") { 0 } else { 6 };

/// Rounds of pure spinning before each round also yields the thread.
const YIELD_AFTER_ROUNDS: u32 = 10;

/// Spin backoff state for one contended loop.
///
/// Each call to [`snooze`](Self::snooze) spins for twice as many
/// `spin_loop` hints as the previous one, capped at 64, and starts yielding
/// to the scheduler once the contention has lasted more than ten rounds.
/// It never parks the thread.
#[derive(Debug, Default)]
pub(crate) struct Backoff {
    rounds: u32,
}

impl Backoff {
    #[inline]
    pub(crate) const fn new() -> Self {
        Self { rounds: 0 }
    }

    /// Waits for one backoff round.
    pub(crate) fn snooze(&mut self) {
        let iterations = 1u32 << self.rounds.min(MAX_SPIN_SHIFT);
        for _ in 0..iterations {
            spin_loop();
        }

        self.rounds = self.rounds.saturating_add(1);

        if self.rounds > YIELD_AFTER_ROUNDS {
            yield_now();
        }
    }

    #[cfg(test)]
    #[inline]
    pub(crate) const fn rounds(&self) -> u32 {
        self.rounds
    }
}
