//! Keeping entry bitmaps and candidate lists consistent with each other.
//!
//! Two passes alternate until neither changes anything. `settle_entries` filters the candidate
//! lists of words with a changed entry, and `settle_words` narrows the bitmaps of entries in words
//! whose list changed. At the fixed point every surviving candidate fits every entry of its word,
//! and every entry bitmap holds exactly the letters that some surviving candidate puts there.

use log::trace;
use smallvec::SmallVec;
use std::mem;

use crate::cancel::CancellationToken;
use crate::error::PropagationFailure;
use crate::grid::{Grid, LetterMode, WordLists};
use crate::jumble::{check_jumble, check_permutation};
use crate::lights::{LightId, LightTable, UsedTracker};
use crate::spread::check_spread;
use crate::types::{forced_glyph, glyph_bit, is_forced, Flbm, GlyphString};
use crate::MAX_SLOT_LENGTH;

/// Allocate an empty vector with room for `capacity` items, reporting failure instead of
/// aborting.
pub(crate) fn try_vec<T>(capacity: usize) -> Result<Vec<T>, PropagationFailure> {
    let mut result = Vec::new();
    result
        .try_reserve_exact(capacity)
        .map_err(|_| PropagationFailure::OutOfMemory)?;
    Ok(result)
}

/// Filter the candidate lists of every word that has an entry marked as changed.
///
/// The first time a word is touched at a given depth its current arrays are moved into `saved`,
/// so that popping the frame can put them back. When every entry of a word is forced, the word is
/// committed at `depth`: its surviving candidates are marked as used, for "no duplicate answers"
/// mode.
///
/// Returns whether any list changed. Clears every entry's changed flag.
pub(crate) fn settle_entries(
    grid: &mut Grid,
    lights: &LightTable,
    used: &mut UsedTracker,
    saved: &mut [Option<WordLists>],
    depth: usize,
    unique_answers: bool,
    cancel: &CancellationToken,
) -> Result<bool, PropagationFailure> {
    let Grid { entries, words, .. } = grid;
    let mut changed = false;

    for (word_id, word) in words.iter_mut().enumerate() {
        if cancel.is_cancelled() {
            return Err(PropagationFailure::Aborted);
        }
        if !word.entries.iter().any(|&entry_id| entries[entry_id].upd) {
            continue;
        }

        let all_forced = word
            .entries
            .iter()
            .all(|&entry_id| is_forced(entries[entry_id].flbm));
        let mode = word.mode();
        let methods = word.props.entry_methods;
        let jlen = word.jlen;
        let old_len = word.lists.flist.len();

        if saved[word_id].is_none() {
            let mut fresh = WordLists {
                flist: try_vec(old_len)?,
                ..WordLists::default()
            };
            fresh.flist.extend_from_slice(&word.lists.flist);
            // Jumble and spread data are rebuilt below, so only the list itself is carried over.
            saved[word_id] = Some(mem::replace(&mut word.lists, fresh));
        }

        let mut list = mem::take(&mut word.lists.flist);
        if unique_answers {
            list.retain(|&light_id| !used.is_used(lights.light(light_id)));
        }

        let filter_positions = |list: &mut Vec<LightId>, range: std::ops::Range<usize>| {
            for k in range {
                let entry = &entries[word.entries[k]];
                if !entry.upd {
                    continue;
                }
                let flbm = entry.flbm;
                list.retain(|&light_id| flbm & glyph_bit(lights.light(light_id).glyphs[k]) != 0);
                if list.is_empty() {
                    break;
                }
            }
        };

        match mode {
            LetterMode::Normal => {
                filter_positions(&mut list, 0..word.entries.len());
            }
            LetterMode::Jumble => {
                filter_positions(&mut list, jlen..word.entries.len());

                let slots: SmallVec<[Flbm; MAX_SLOT_LENGTH]> = word.entries[..jlen]
                    .iter()
                    .map(|&entry_id| entries[entry_id].flbm)
                    .collect();
                let mut jdata = try_vec(list.len())?;
                let mut jflbm = try_vec(list.len() * jlen)?;
                let mut deduced: SmallVec<[Flbm; MAX_SLOT_LENGTH]> = SmallVec::from_elem(0, jlen);

                list.retain(|&light_id| {
                    match check_jumble(lights.light(light_id), &slots, methods, &mut deduced) {
                        Some(data) => {
                            jdata.push(data);
                            jflbm.extend_from_slice(&deduced);
                            true
                        }
                        None => false,
                    }
                });
                word.lists.jdata = jdata;
                word.lists.jflbm = jflbm;

                // The deductions may have narrowed even if no candidate was dropped.
                word.upd = true;
                changed = true;
            }
            LetterMode::Spread => {
                let mut sdata = try_vec(list.len())?;

                list.retain(|&light_id| {
                    let data = check_spread(lights.light(light_id), &*word, &entries[..]);
                    if data.total > 0.0 {
                        sdata.push(data);
                        true
                    } else {
                        false
                    }
                });
                word.lists.sdata = sdata;

                word.upd = true;
                changed = true;
            }
        }

        if list.len() != old_len {
            word.upd = true;
            changed = true;
        }

        if list.is_empty() && !word.fully_entered {
            trace!("word {word_id} has run out of candidates");
            word.lists.flist = list;
            return Err(PropagationFailure::Infeasible { word: word_id });
        }

        if all_forced {
            if mode == LetterMode::Jumble {
                let forced: GlyphString = word.entries[..jlen]
                    .iter()
                    .filter_map(|&entry_id| forced_glyph(entries[entry_id].flbm))
                    .collect();
                let keep: SmallVec<[bool; 32]> = list
                    .iter()
                    .map(|&light_id| check_permutation(&forced, &lights.light(light_id).glyphs, methods))
                    .collect();
                if keep.iter().any(|&keep| !keep) {
                    let lists = &mut word.lists;
                    let mut index = 0;
                    list.retain(|_| {
                        index += 1;
                        keep[index - 1]
                    });
                    let mut index = 0;
                    lists.jdata.retain(|_| {
                        index += 1;
                        keep[index - 1]
                    });
                    let mut kept_flbms = try_vec(list.len() * jlen)?;
                    for (index, &keep) in keep.iter().enumerate() {
                        if keep {
                            kept_flbms.extend_from_slice(lists.jumble_flbms(index, jlen));
                        }
                    }
                    lists.jflbm = kept_flbms;
                    word.upd = true;
                    changed = true;
                }

                if list.is_empty() && !word.fully_entered {
                    word.lists.flist = list;
                    return Err(PropagationFailure::Infeasible { word: word_id });
                }
            }

            if word.commit_depth.is_none() {
                for &light_id in &list {
                    used.set_used(lights.light(light_id), true);
                }
                word.commit_depth = Some(depth);
                trace!("committed word {word_id} at depth {depth}");
            }
        }

        word.lists.flist = list;
    }

    for entry in entries.iter_mut() {
        entry.upd = false;
    }

    Ok(changed)
}

/// Narrow the entry bitmaps of every word whose candidate list changed to the letters its
/// surviving candidates can put there. Fully entered words are skipped.
///
/// Returns whether any entry changed; changed entries are marked for the next `settle_entries`.
/// Clears every word's changed flag.
pub(crate) fn settle_words(
    grid: &mut Grid,
    lights: &LightTable,
    cancel: &CancellationToken,
) -> Result<bool, PropagationFailure> {
    let Grid { entries, words, .. } = grid;
    let mut changed = false;
    let mut union: SmallVec<[Flbm; MAX_SLOT_LENGTH]> = SmallVec::new();

    for word in words.iter_mut() {
        if cancel.is_cancelled() {
            return Err(PropagationFailure::Aborted);
        }
        if !word.upd || word.fully_entered {
            continue;
        }

        let len = word.entries.len();
        let jlen = word.jlen;
        union.clear();
        union.resize(len, 0);

        match word.mode() {
            LetterMode::Normal => {
                for &light_id in &word.lists.flist {
                    let glyphs = &lights.light(light_id).glyphs;
                    for k in 0..len {
                        union[k] |= glyph_bit(glyphs[k]);
                    }
                }
            }
            LetterMode::Jumble => {
                for (index, &light_id) in word.lists.flist.iter().enumerate() {
                    for (k, &flbm) in word.lists.jumble_flbms(index, jlen).iter().enumerate() {
                        union[k] |= flbm;
                    }
                    let glyphs = &lights.light(light_id).glyphs;
                    for k in jlen..len {
                        union[k] |= glyph_bit(glyphs[k]);
                    }
                }
            }
            LetterMode::Spread => {
                for data in &word.lists.sdata {
                    for (k, &flbm) in data.flbm.iter().enumerate() {
                        union[k] |= flbm;
                    }
                }
            }
        }

        for (k, &entry_id) in word.entries.iter().enumerate() {
            let entry = &mut entries[entry_id];
            if entry.flbm & !union[k] != 0 {
                entry.flbm &= union[k];
                entry.upd = true;
                changed = true;
            }
        }
    }

    for word in words.iter_mut() {
        word.upd = false;
    }

    Ok(changed)
}
