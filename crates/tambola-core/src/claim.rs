//! Claim categories and win verification.

use crate::draw::DrawnNumbers;
use crate::ticket::{Ticket, NUMBERS_PER_TICKET};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Numbers a player must have matched for an Early Five.
pub const EARLY_FIVE_COUNT: usize = 5;

// ============================================================================
// Claim Category
// ============================================================================

/// The five prize categories a player can claim.
///
/// Serialized by variant name ("FirstRow", "EarlyFive", ...), which is
/// also how clients spell categories on the wire. An unknown spelling
/// fails deserialization at the protocol boundary and never reaches the
/// session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClaimCategory {
    /// All five numbers of the top row.
    FirstRow,
    /// All five numbers of the middle row.
    SecondRow,
    /// All five numbers of the bottom row.
    ThirdRow,
    /// Any five of the ticket's fifteen numbers.
    EarlyFive,
    /// The whole ticket.
    FullHouse,
}

impl ClaimCategory {
    /// Every category, in announcement order.
    pub const ALL: [ClaimCategory; 5] = [
        ClaimCategory::FirstRow,
        ClaimCategory::SecondRow,
        ClaimCategory::ThirdRow,
        ClaimCategory::EarlyFive,
        ClaimCategory::FullHouse,
    ];

    /// Returns the row a row-category refers to, `None` otherwise.
    pub fn row_index(&self) -> Option<usize> {
        match self {
            Self::FirstRow => Some(0),
            Self::SecondRow => Some(1),
            Self::ThirdRow => Some(2),
            Self::EarlyFive | Self::FullHouse => None,
        }
    }

    /// Wire and display spelling of the category.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FirstRow => "FirstRow",
            Self::SecondRow => "SecondRow",
            Self::ThirdRow => "ThirdRow",
            Self::EarlyFive => "EarlyFive",
            Self::FullHouse => "FullHouse",
        }
    }
}

impl fmt::Display for ClaimCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Verification
// ============================================================================

/// Decides whether `category` is a winning claim for `ticket` given the
/// numbers drawn so far.
///
/// A claim holds only when the category's required numbers are all
/// drawn AND the most recent draw is itself one of them. The second
/// rule stops a player from cashing in a finished pattern on some
/// later, unrelated draw. With nothing drawn yet every claim is false.
#[must_use]
pub fn verify(ticket: &Ticket, category: ClaimCategory, drawn: &DrawnNumbers) -> bool {
    let Some(last) = drawn.last() else {
        return false;
    };

    match category.row_index() {
        Some(row) => {
            let required = ticket.row_numbers(row);
            required.iter().all(|n| drawn.contains(*n)) && required.contains(&last)
        }
        None => {
            let numbers = ticket.numbers();
            if !numbers.contains(&last) {
                return false;
            }
            let matched = numbers.iter().filter(|n| drawn.contains(**n)).count();
            match category {
                ClaimCategory::EarlyFive => matched >= EARLY_FIVE_COUNT,
                ClaimCategory::FullHouse => matched == NUMBERS_PER_TICKET,
                // Row categories are handled above.
                _ => false,
            }
        }
    }
}
