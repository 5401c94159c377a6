//! Consistency checking for spread words.
//!
//! A spread word with `m` entries takes an `n`-letter candidate (`n <= m`) by placing its letters
//! in order into some `n` of the entries and a dash into each of the others. For each candidate we
//! count, by dynamic programming, how many such placements fit the current entry bitmaps and how
//! many of them put each letter in each entry. Counts are kept as `f64`; for long words they can
//! exceed any integer type, and they're only used as relative weights.

use smallvec::SmallVec;

use crate::grid::{Entry, Word};
use crate::lights::Light;
use crate::types::{glyph_bit, Flbm, GlyphId, FLBM_ALL, FLBM_DASH};
use crate::MAX_SLOT_LENGTH;

/// Placement counts for one candidate of a spread word.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpreadData {
    /// Letters (and dash) that some placement puts in each slot.
    pub flbm: SmallVec<[Flbm; MAX_SLOT_LENGTH]>,
    /// `counts[i * slots + j]` is the number of placements that put letter `i` of the candidate
    /// in slot `j`.
    pub counts: Vec<f64>,
    /// Number of placements that leave each slot as a dash.
    pub dash_counts: SmallVec<[f64; MAX_SLOT_LENGTH]>,
    /// Total number of placements.
    pub total: f64,
}

impl SpreadData {
    /// Placeholder for a candidate that hasn't been checked yet: every slot is unconstrained.
    #[must_use]
    pub fn unconstrained(slots: usize) -> SpreadData {
        SpreadData {
            flbm: SmallVec::from_elem(FLBM_ALL, slots),
            counts: vec![],
            dash_counts: SmallVec::from_elem(0.0, slots),
            total: 0.0,
        }
    }

    #[must_use]
    pub fn slots(&self) -> usize {
        self.flbm.len()
    }

    /// Number of placements that put letter `letter` of the candidate in slot `slot`.
    #[must_use]
    pub fn count(&self, letter: usize, slot: usize) -> f64 {
        self.counts[letter * self.slots() + slot]
    }
}

/// Count the placements of `glyphs` into `slots`.
///
/// `left[i][j]` counts the ways letters `[0, i)` can fill slots `[0, j)`, and `right[i][j]` the
/// ways letters `[i, n)` can fill slots `[j, m)`; a slot that admits the dash may take no letter.
/// A placement putting letter `i` in slot `j` is then any left placement of `[0, i)` into
/// `[0, j)` joined with any right placement of `[i + 1, n)` into `[j + 1, m)`.
#[must_use]
pub fn spread_counts(glyphs: &[GlyphId], slots: &[Flbm]) -> SpreadData {
    let n = glyphs.len();
    let m = slots.len();
    let index = |i: usize, j: usize| i * (m + 1) + j;

    let mut left = vec![0.0; (n + 1) * (m + 1)];
    left[index(0, 0)] = 1.0;
    for j in 1..=m {
        let slot = slots[j - 1];
        for i in 0..=n {
            let mut count = 0.0;
            if slot & FLBM_DASH != 0 {
                count = left[index(i, j - 1)];
            }
            if i > 0 && slot & glyph_bit(glyphs[i - 1]) != 0 {
                count += left[index(i - 1, j - 1)];
            }
            left[index(i, j)] = count;
        }
    }

    let mut right = vec![0.0; (n + 1) * (m + 1)];
    right[index(n, m)] = 1.0;
    for j in (0..m).rev() {
        let slot = slots[j];
        for i in (0..=n).rev() {
            let mut count = 0.0;
            if slot & FLBM_DASH != 0 {
                count = right[index(i, j + 1)];
            }
            if i < n && slot & glyph_bit(glyphs[i]) != 0 {
                count += right[index(i + 1, j + 1)];
            }
            right[index(i, j)] = count;
        }
    }

    let mut data = SpreadData {
        flbm: SmallVec::from_elem(0, m),
        counts: vec![0.0; n * m],
        dash_counts: SmallVec::from_elem(0.0, m),
        total: left[index(n, m)],
    };

    for i in 0..n {
        let bit = glyph_bit(glyphs[i]);
        for j in 0..m {
            if slots[j] & bit == 0 {
                continue;
            }
            let count = left[index(i, j)] * right[index(i + 1, j + 1)];
            data.counts[i * m + j] = count;
            if count != 0.0 {
                data.flbm[j] |= bit;
            }
        }
    }

    for j in 0..m {
        if slots[j] & FLBM_DASH == 0 {
            continue;
        }
        let count: f64 = (0..=n)
            .map(|i| left[index(i, j)] * right[index(i, j + 1)])
            .sum();
        data.dash_counts[j] = count;
        if count != 0.0 {
            data.flbm[j] |= FLBM_DASH;
        }
    }

    data
}

/// Count the placements of `light` into `word` under the current entry bitmaps.
#[must_use]
pub fn check_spread(light: &Light, word: &Word, entries: &[Entry]) -> SpreadData {
    let slots: SmallVec<[Flbm; MAX_SLOT_LENGTH]> = word
        .entries
        .iter()
        .map(|&entry_id| entries[entry_id].flbm)
        .collect();
    spread_counts(&light.glyphs, &slots)
}
