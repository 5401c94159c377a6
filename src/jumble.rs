//! Consistency checking for jumbled words.
//!
//! A jumbled word can take any permutation of a candidate's letters that its entry methods allow.
//! Deciding exactly whether a permutation fits the current entry bitmaps is a bipartite matching
//! problem per candidate, which is too slow to run at every propagation step, so `check_jumble`
//! runs a cheaper series of counting arguments instead. It never rejects a candidate that has a
//! fitting arrangement, but it can accept candidates that don't.

use smallvec::SmallVec;

use crate::lights::{EntryMethods, Light};
use crate::types::{
    forced_glyph, glyph_bit, glyphs_in, Flbm, GlyphId, GlyphString, GLYPH_CAPACITY, GLYPH_CODES,
};
use crate::MAX_SLOT_LENGTH;

/// What `check_jumble` learned about one candidate, kept for scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct JumbleData {
    /// Number of slots not yet forced.
    pub unforced: usize,
    /// Letters of the candidate not yet placed in a forced slot.
    pub unforced_histogram: [u8; GLYPH_CODES],
    /// For each letter, the number of unforced slots that could still take it.
    pub position_counts: [u8; GLYPH_CODES],
}

impl Default for JumbleData {
    fn default() -> Self {
        JumbleData {
            unforced: 0,
            unforced_histogram: [0; GLYPH_CODES],
            position_counts: [0; GLYPH_CODES],
        }
    }
}

/// Is `s` a non-trivial rotation of `t`?
fn is_cyclic_shift(s: &[GlyphId], t: &[GlyphId]) -> bool {
    let len = s.len();
    (1..len).any(|shift| (0..len).all(|i| s[i] == t[(i + shift) % len]))
}

/// Check that placing `forced` in a jumbled word isn't one of the special arrangements of
/// `candidate` that the word's entry methods rule out (forwards, reversed, or a rotation of
/// either).
#[must_use]
pub fn check_permutation(forced: &[GlyphId], candidate: &[GlyphId], methods: EntryMethods) -> bool {
    let candidate = &candidate[..forced.len()];
    let reversed: GlyphString = forced.iter().rev().copied().collect();

    if !methods.contains(EntryMethods::FORWARD) && forced == candidate {
        return false;
    }
    if !methods.contains(EntryMethods::REVERSED) && reversed.as_slice() == candidate {
        return false;
    }
    if !methods.contains(EntryMethods::CYCLIC) && is_cyclic_shift(forced, candidate) {
        return false;
    }
    if !methods.contains(EntryMethods::REVERSED_CYCLIC) && is_cyclic_shift(&reversed, candidate) {
        return false;
    }
    true
}

/// Test whether some arrangement of `light`'s untagged letters might fit `slots`, the bitmaps of
/// the word's jumbled entries. On success, `deduced` holds the narrowed bitmap for each slot.
///
/// The checks, repeated until nothing changes:
///
/// - Letters in forced slots are taken off the candidate's histogram; a forced letter the
///   histogram has run out of is a contradiction.
/// - Letters the histogram has run out of are knocked out of every other slot.
/// - A letter with exactly as many possible slots as remaining copies is forced into them.
/// - Taking letters in order of increasing slack, any group whose remaining copies exactly fill
///   the slots that could take them claims those slots, and no other letter may use them (Hall's
///   condition, applied greedily).
pub fn check_jumble(
    light: &Light,
    slots: &[Flbm],
    methods: EntryMethods,
    deduced: &mut [Flbm],
) -> Option<JumbleData> {
    let len = slots.len();
    debug_assert_eq!(deduced.len(), len);

    for (deduced, &slot) in deduced.iter_mut().zip(slots) {
        *deduced = slot & light.letters;
    }

    let mut histogram;
    let mut done: SmallVec<[bool; MAX_SLOT_LENGTH]>;
    let mut excess = [0i32; GLYPH_CODES];

    loop {
        histogram = light.histogram;
        done = SmallVec::from_elem(false, len);

        loop {
            for k in 0..len {
                if done[k] {
                    continue;
                }
                if deduced[k] == 0 {
                    return None;
                }
                if let Some(glyph) = forced_glyph(deduced[k]) {
                    if histogram[glyph] == 0 {
                        return None;
                    }
                    histogram[glyph] -= 1;
                    done[k] = true;
                }
            }

            let exhausted = glyphs_in(light.letters)
                .filter(|&glyph| histogram[glyph] == 0)
                .fold(0, |flbm, glyph| flbm | glyph_bit(glyph));

            let mut changed = false;
            for k in 0..len {
                if !done[k] && deduced[k] & exhausted != 0 {
                    deduced[k] &= !exhausted;
                    changed = true;
                }
            }
            if changed {
                continue;
            }

            for glyph in glyphs_in(light.letters) {
                if histogram[glyph] == 0 {
                    continue;
                }
                let bit = glyph_bit(glyph);
                let places = (0..len)
                    .filter(|&k| !done[k] && deduced[k] & bit != 0)
                    .count();
                excess[glyph] = places as i32 - i32::from(histogram[glyph]);
                if excess[glyph] < 0 {
                    return None;
                }
                if excess[glyph] == 0 {
                    for k in 0..len {
                        if !done[k] && deduced[k] & bit != 0 {
                            deduced[k] = bit;
                            changed = true;
                        }
                    }
                }
            }
            if !changed {
                break;
            }
        }

        let mut order: SmallVec<[GlyphId; GLYPH_CAPACITY]> = glyphs_in(light.letters)
            .filter(|&glyph| histogram[glyph] > 0)
            .collect();
        order.sort_by_key(|&glyph| (excess[glyph], glyph));

        let mut changed = false;
        let mut group_count = 0;
        let mut group_bits: Flbm = 0;
        for glyph in order {
            group_count += usize::from(histogram[glyph]);
            group_bits |= glyph_bit(glyph);

            let places = (0..len)
                .filter(|&k| !done[k] && deduced[k] & group_bits != 0)
                .count();
            if places < group_count {
                return None;
            }
            if places == group_count {
                for k in 0..len {
                    if !done[k] && deduced[k] & group_bits != 0 {
                        if deduced[k] & !group_bits != 0 {
                            changed = true;
                        }
                        deduced[k] &= group_bits;
                    }
                }
                group_count = 0;
                group_bits = 0;
            }
        }
        if !changed {
            break;
        }
    }

    let mut data = JumbleData {
        unforced: done.iter().filter(|&&done| !done).count(),
        ..JumbleData::default()
    };
    for glyph in glyphs_in(light.letters) {
        let bit = glyph_bit(glyph);
        data.unforced_histogram[glyph] = histogram[glyph];
        data.position_counts[glyph] = (0..len)
            .filter(|&k| !done[k] && deduced[k] & bit != 0)
            .count() as u8;
    }

    if data.unforced == 0 {
        let forced: GlyphString = deduced.iter().filter_map(|&flbm| forced_glyph(flbm)).collect();
        if !check_permutation(&forced, &light.glyphs, methods) {
            return None;
        }
    }

    Some(data)
}
