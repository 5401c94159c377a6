//! Choosing where to branch and in what order to try letters.

use float_ord::FloatOrd;
use rand::Rng;
use smallvec::SmallVec;

use crate::grid::{Entry, EntryId};
use crate::types::{GlyphId, DASH, GLYPH_CAPACITY, GLYPH_CODES};

/// How much to shuffle the letter order at each branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Randomization {
    #[default]
    None,
    Light,
    Heavy,
}

impl Randomization {
    /// How far a letter may be swapped forward from its place in score order.
    #[must_use]
    pub fn radius(self) -> usize {
        match self {
            Randomization::None => 0,
            Randomization::Light => 1,
            Randomization::Heavy => 2,
        }
    }

    /// Map a numeric level (0, 1, 2+) to a randomization.
    #[must_use]
    pub fn from_level(level: u8) -> Randomization {
        match level {
            0 => Randomization::None,
            1 => Randomization::Light,
            _ => Randomization::Heavy,
        }
    }
}

/// The letters to try at an entry, best first.
pub type Possibilities = SmallVec<[GlyphId; GLYPH_CAPACITY]>;

/// Find the entry to branch on: among unforced entries in the most words, the one whose best
/// letter scores lowest. Ties go to the lowest index.
///
/// Returns `None` when no unforced entry (or, with `selection_only`, no selected unforced entry)
/// is in any word, meaning there is nothing left to decide.
#[must_use]
pub fn find_critical_entry(entries: &[Entry], selection_only: bool) -> Option<EntryId> {
    let open = || {
        entries
            .iter()
            .enumerate()
            .filter(move |(_, entry)| !entry.is_forced() && (!selection_only || entry.selected))
    };

    let max_checking = open().map(|(_, entry)| entry.checking).max()?;
    if max_checking == 0 {
        return None;
    }

    open()
        .filter(|(_, entry)| entry.checking >= max_checking)
        .min_by_key(|(_, entry)| FloatOrd(entry.crux))
        .map(|(entry_id, _)| entry_id)
}

/// List the letters worth trying at `entry`, in descending score order with equal scores in
/// ascending letter order. Letters scoring zero or less are left out. The dash is only considered
/// when `include_dash` is set.
pub fn get_possibilities(
    entry: &Entry,
    randomization: Randomization,
    include_dash: bool,
    rng: &mut impl Rng,
) -> Possibilities {
    let limit = if include_dash { GLYPH_CODES } else { DASH };
    let mut result = Possibilities::new();
    let mut ceiling: Option<f64> = None;

    loop {
        let band = (1..limit)
            .map(|glyph| entry.score[glyph])
            .filter(|&score| ceiling.map_or(true, |ceiling| score < ceiling))
            .fold(f64::NEG_INFINITY, f64::max);
        if band <= 0.0 {
            break;
        }
        result.extend((1..limit).filter(|&glyph| entry.score[glyph] == band));
        ceiling = Some(band);
    }

    let radius = randomization.radius();
    if radius > 0 {
        let len = result.len();
        for i in 0..len {
            let swap_with = i + rng.gen_range(0..=2 * radius);
            if swap_with < len {
                result.swap(i, swap_with);
            }
        }
    }

    result
}
