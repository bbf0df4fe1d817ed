//! Ticket grid and the constrained random generator.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

// ============================================================================
// Grid Constants
// ============================================================================

/// Rows in a ticket.
pub const TICKET_ROWS: usize = 3;

/// Columns in a ticket, one per decade band.
pub const TICKET_COLS: usize = 9;

/// Non-blank cells required in every row.
pub const NUMBERS_PER_ROW: usize = 5;

/// Non-blank cells in a complete ticket.
pub const NUMBERS_PER_TICKET: usize = NUMBERS_PER_ROW * TICKET_ROWS;

/// Most numbers a single decade band may contribute to one ticket.
pub const MAX_PER_BAND: usize = 3;

/// Highest callable number.
pub const MAX_NUMBER: u8 = 90;

/// Returns the column that owns `number`'s decade band.
///
/// Bands are contiguous runs of ten: 1-10 map to column 0, 11-20 to
/// column 1, up to 81-90 in column 8.
#[must_use]
pub fn band_column(number: u8) -> usize {
    (usize::from(number.saturating_sub(1)) / 10).min(TICKET_COLS - 1)
}

/// Returns the inclusive number range of the band in `col`.
fn band_range(col: usize) -> RangeInclusive<u8> {
    let low = (col * 10 + 1) as u8;
    low..=low + 9
}

// ============================================================================
// Ticket
// ============================================================================

/// A 3x9 Tambola ticket.
///
/// Each cell is blank or holds a number in [1,90]. Every row carries
/// exactly five numbers, numbers never repeat within a ticket, a decade
/// band contributes at most three numbers (all in its own column), and
/// each column's numbers ascend top to bottom.
///
/// Serializes as the bare grid, blanks as `null`:
/// `[[4,16,null,null,48,null,63,76,null], ...]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ticket {
    cells: [[Option<u8>; TICKET_COLS]; TICKET_ROWS],
}

impl Ticket {
    /// Generates a fresh random ticket.
    ///
    /// Two phases. Placement: for each row, pick a random column and a
    /// random number inside that column's band, accepting the pick only
    /// if the cell is blank, the band is below its cap, and the number
    /// is not already on the ticket; retry until the row holds five.
    /// Sort: rewrite each column's numbers in ascending order into the
    /// cells they already occupy, leaving the blank pattern untouched.
    ///
    /// The placement loop retries with fresh randomness and always
    /// terminates: a row short of five numbers has at least five blank
    /// columns, at most four bands can be at their cap before the
    /// fifteenth placement, and a band below its cap still holds
    /// unplaced numbers.
    pub fn generate(rng: &mut impl Rng) -> Self {
        let mut cells = [[None; TICKET_COLS]; TICKET_ROWS];
        let mut band_counts = [0usize; TICKET_COLS];
        let mut placed = [false; MAX_NUMBER as usize + 1];

        for row in cells.iter_mut() {
            let mut filled = 0;
            while filled < NUMBERS_PER_ROW {
                let col = rng.random_range(0..TICKET_COLS);
                if row[col].is_some() || band_counts[col] >= MAX_PER_BAND {
                    continue;
                }
                let number = rng.random_range(band_range(col));
                if placed[number as usize] {
                    continue;
                }
                row[col] = Some(number);
                band_counts[col] += 1;
                placed[number as usize] = true;
                filled += 1;
            }
        }

        for col in 0..TICKET_COLS {
            let mut values: Vec<u8> = cells.iter().filter_map(|row| row[col]).collect();
            values.sort_unstable();
            let mut sorted = values.into_iter();
            for row in cells.iter_mut() {
                if row[col].is_some() {
                    row[col] = sorted.next();
                }
            }
        }

        Self { cells }
    }

    /// Builds a ticket directly from a cell grid.
    ///
    /// Does not validate the grid; callers constructing tickets by hand
    /// are expected to supply one that satisfies the ticket invariants.
    pub fn from_rows(cells: [[Option<u8>; TICKET_COLS]; TICKET_ROWS]) -> Self {
        Self { cells }
    }

    /// Returns the cell at (`row`, `col`), `None` when blank or out of bounds.
    pub fn get(&self, row: usize, col: usize) -> Option<u8> {
        self.cells.get(row).and_then(|r| r.get(col)).copied().flatten()
    }

    /// Returns the raw cell grid.
    pub fn cells(&self) -> &[[Option<u8>; TICKET_COLS]; TICKET_ROWS] {
        &self.cells
    }

    /// Returns the numbers of `row` in column order.
    ///
    /// An out-of-range row yields an empty vec.
    pub fn row_numbers(&self, row: usize) -> Vec<u8> {
        self.cells
            .get(row)
            .map(|r| r.iter().flatten().copied().collect())
            .unwrap_or_default()
    }

    /// Returns all fifteen numbers, row by row.
    pub fn numbers(&self) -> Vec<u8> {
        self.cells
            .iter()
            .flat_map(|row| row.iter().flatten().copied())
            .collect()
    }

    /// Returns true if `number` appears anywhere on the ticket.
    #[must_use]
    pub fn contains(&self, number: u8) -> bool {
        self.cells
            .iter()
            .any(|row| row.iter().any(|cell| *cell == Some(number)))
    }
}

impl From<[[Option<u8>; TICKET_COLS]; TICKET_ROWS]> for Ticket {
    fn from(cells: [[Option<u8>; TICKET_COLS]; TICKET_ROWS]) -> Self {
        Self::from_rows(cells)
    }
}
