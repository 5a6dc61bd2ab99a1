//! Page-range normalisation.
//!
//! A selection never fails. Whatever the caller passes is turned into an
//! inclusive 1-based range using this table, then the upper bound is clipped
//! to the document's page count:
//!
//! | Selector                       | Range before clipping |
//! |--------------------------------|-----------------------|
//! | `Pair(a, b)`, `min(a, b) >= 1` | `(min, max)`          |
//! | `Pair(a, b)`, `min(a, b) < 1`  | `(1, ∞)`              |
//! | `Single(n)`, `n > 0`           | `(n, n)`              |
//! | `Single(n)`, `n <= 0`          | `(1, ∞)`              |
//! | `All`                          | `(1, ∞)`              |
//!
//! The lower bound is never raised or clipped: a first page past the end of
//! the document gives an empty range, not an error.

use crate::config::PageSelector;
use std::ops::RangeInclusive;

/// Inclusive, 1-based page range resolved against a concrete document.
///
/// `first > last` is a valid, empty range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    pub first: usize,
    pub last: usize,
}

impl PageRange {
    pub fn is_empty(&self) -> bool {
        self.first > self.last
    }

    /// Number of pages the range covers.
    pub fn len(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            self.last - self.first + 1
        }
    }

    /// Page numbers in ascending order.
    pub fn pages(&self) -> RangeInclusive<usize> {
        self.first..=self.last
    }
}

impl PageSelector {
    /// Resolve the selection against a document with `page_count` pages.
    pub fn normalize(&self, page_count: usize) -> PageRange {
        let (first, last) = match *self {
            PageSelector::Pair(a, b) => {
                let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
                if lo < 1 {
                    (1, usize::MAX)
                } else {
                    (to_page(lo), to_page(hi))
                }
            }
            PageSelector::Single(n) if n > 0 => (to_page(n), to_page(n)),
            PageSelector::Single(_) | PageSelector::All => (1, usize::MAX),
        };

        PageRange {
            first,
            last: last.min(page_count),
        }
    }
}

fn to_page(n: i64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}
