//! Drawn-number history and the caller's draw pool.

use crate::error::{GameError, GameResult};
use crate::ticket::MAX_NUMBER;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Ordered history of the numbers called this round.
///
/// Append-only between round resets; a number appears at most once. The
/// last entry is the one claim verification measures against.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DrawnNumbers {
    numbers: Vec<u8>,
}

impl DrawnNumbers {
    /// Empty history, as at the start of a round.
    pub fn new() -> Self {
        Self::default()
    }

    /// Draws a uniformly random number from those not yet called.
    ///
    /// Picking an index into the remaining pool terminates regardless
    /// of how few numbers are left. Once all ninety are out, further
    /// draws fail with [`GameError::NumbersExhausted`] and the history
    /// stays as it is.
    pub fn draw(&mut self, rng: &mut impl Rng) -> GameResult<u8> {
        let remaining: Vec<u8> = (1..=MAX_NUMBER).filter(|n| !self.contains(*n)).collect();
        if remaining.is_empty() {
            return Err(GameError::NumbersExhausted);
        }
        let number = remaining[rng.random_range(0..remaining.len())];
        self.numbers.push(number);
        Ok(number)
    }

    /// Appends `number` without drawing it.
    ///
    /// Exists for replaying known histories; duplicates are ignored so
    /// the at-most-once invariant holds however the history is built.
    pub fn record(&mut self, number: u8) {
        if !self.contains(number) {
            self.numbers.push(number);
        }
    }

    /// Returns true if `number` has been called this round.
    #[must_use]
    pub fn contains(&self, number: u8) -> bool {
        self.numbers.contains(&number)
    }

    /// The most recent draw, `None` before the first call.
    pub fn last(&self) -> Option<u8> {
        self.numbers.last().copied()
    }

    /// Count of numbers called so far.
    pub fn len(&self) -> usize {
        self.numbers.len()
    }

    /// True when nothing has been called yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.numbers.is_empty()
    }

    /// The call history in draw order.
    pub fn as_slice(&self) -> &[u8] {
        &self.numbers
    }

    /// Forgets the round's calls, making every number eligible again.
    pub fn clear(&mut self) {
        self.numbers.clear();
    }
}
