//! Scoring letters for branching.
//!
//! Each word that isn't fully entered adds up, for every slot and letter, the weight of the
//! candidates that would put that letter there. An entry's score for a letter is the product of
//! those sums over the words through it, so a letter only scores well if every crossing word has
//! good candidates with it. The highest of an entry's scores is its "crux".

use crate::cancel::CancellationToken;
use crate::error::PropagationFailure;
use crate::grid::{Grid, LetterMode};
use crate::jumble::JumbleData;
use crate::lights::{LightTable, UsedTracker};
use crate::spread::SpreadData;
use crate::types::{forced_glyph, glyphs_in, Flbm, GlyphId, DASH, GLYPH_CODES};

/// Per-slot, per-letter accumulator.
pub type SlotScores = Vec<[f64; GLYPH_CODES]>;

fn reset(scores: &mut SlotScores, slots: usize) {
    scores.clear();
    scores.resize(slots, [0.0; GLYPH_CODES]);
}

/// Estimate the number of arrangements of a jumble candidate, and how they split by letter over
/// each jumbled slot; writes the split into `scores` and returns the estimate.
///
/// The estimate treats each letter's slots as interpolating linearly between "confined to exactly
/// as many slots as it has copies" and "free to go anywhere", which is rough but cheap. Each
/// slot's letter scores are proportional to the remaining copies of that letter over the number
/// of slots it could go in, rescaled to add up to the estimate.
pub fn jumble_scores(data: &JumbleData, deduced: &[Flbm], scores: &mut SlotScores) -> f64 {
    let unforced = data.unforced as f64;
    let mut remaining = unforced;
    let mut total = 1.0;

    for glyph in 1..GLYPH_CODES {
        let copies = f64::from(data.unforced_histogram[glyph]);
        let places = f64::from(data.position_counts[glyph]);
        if copies == 0.0 || copies == unforced {
            continue;
        }
        let mut choices = (places - copies) / (unforced - copies) * (remaining - copies) + copies;
        for k in 1..=data.unforced_histogram[glyph] {
            total *= choices;
            total /= f64::from(k);
            choices -= 1.0;
        }
        remaining -= copies;
    }
    if total > f64::MAX {
        total = f64::MAX;
    }

    reset(scores, deduced.len());
    for (k, &flbm) in deduced.iter().enumerate() {
        if flbm == 0 {
            continue;
        }
        if let Some(glyph) = forced_glyph(flbm) {
            scores[k][glyph] = total;
            continue;
        }

        let mut sum = 0.0;
        for glyph in glyphs_in(flbm) {
            if data.position_counts[glyph] == 0 {
                continue;
            }
            let share =
                f64::from(data.unforced_histogram[glyph]) / f64::from(data.position_counts[glyph]);
            scores[k][glyph] = share;
            sum += share;
        }
        if sum > 0.0 {
            let scale = total / sum;
            for score in &mut scores[k] {
                *score *= scale;
            }
        }
    }

    total
}

/// Split the placement counts of a spread candidate by letter over each slot.
pub fn spread_scores(glyphs: &[GlyphId], data: &SpreadData, scores: &mut SlotScores) {
    let slots = data.slots();
    reset(scores, slots);
    for (i, &glyph) in glyphs.iter().enumerate() {
        for (j, slot_scores) in scores.iter_mut().enumerate() {
            slot_scores[glyph] += data.count(i, j);
        }
    }
    for (j, slot_scores) in scores.iter_mut().enumerate() {
        slot_scores[DASH] += data.dash_counts[j];
    }
}

/// Recompute every entry's letter scores and crux from the current candidate lists.
pub(crate) fn make_scores(
    grid: &mut Grid,
    lights: &LightTable,
    used: &UsedTracker,
    unique_answers: bool,
    cancel: &CancellationToken,
) -> Result<(), PropagationFailure> {
    let Grid { entries, words, .. } = grid;

    for entry in entries.iter_mut() {
        entry.score = [1.0; GLYPH_CODES];
    }

    let mut word_scores = SlotScores::new();
    let mut candidate_scores = SlotScores::new();

    for word in words.iter() {
        if cancel.is_cancelled() {
            return Err(PropagationFailure::Aborted);
        }
        if word.fully_entered {
            continue;
        }

        let len = word.entries.len();
        let jlen = word.jlen;
        let list = &word.lists.flist;
        reset(&mut word_scores, len);

        match word.mode() {
            LetterMode::Normal => {
                if unique_answers && word.commit_depth.is_some() {
                    // A committed word's own candidate is marked as used; count it anyway.
                    if list.len() == 1 {
                        let glyphs = &lights.light(list[0]).glyphs;
                        for k in 0..len {
                            word_scores[k][glyphs[k]] += 1.0;
                        }
                    }
                } else {
                    for &light_id in list {
                        let light = lights.light(light_id);
                        if unique_answers && used.is_used(light) {
                            continue;
                        }
                        let weight = lights.weight(light_id);
                        for k in 0..len {
                            word_scores[k][light.glyphs[k]] += weight;
                        }
                    }
                }
            }
            LetterMode::Jumble => {
                for (index, &light_id) in list.iter().enumerate() {
                    let arrangements = jumble_scores(
                        &word.lists.jdata[index],
                        word.lists.jumble_flbms(index, jlen),
                        &mut candidate_scores,
                    );
                    for k in 0..jlen {
                        for glyph in 1..GLYPH_CODES {
                            word_scores[k][glyph] += candidate_scores[k][glyph];
                        }
                    }
                    // Tags are in fixed positions, so they score once per arrangement.
                    let weight = arrangements * lights.weight(light_id);
                    let glyphs = &lights.light(light_id).glyphs;
                    for k in jlen..len {
                        word_scores[k][glyphs[k]] += weight;
                    }
                }
            }
            LetterMode::Spread => {
                for (index, &light_id) in list.iter().enumerate() {
                    spread_scores(
                        &lights.light(light_id).glyphs,
                        &word.lists.sdata[index],
                        &mut candidate_scores,
                    );
                    for k in 0..len {
                        for glyph in 1..GLYPH_CODES {
                            word_scores[k][glyph] += candidate_scores[k][glyph];
                        }
                    }
                }
            }
        }

        for (k, &entry_id) in word.entries.iter().enumerate() {
            let entry = &mut entries[entry_id];
            for glyph in 1..GLYPH_CODES {
                entry.score[glyph] *= word_scores[k][glyph];
            }
        }
    }

    for entry in entries.iter_mut() {
        entry.crux = entry.score[1..].iter().copied().fold(f64::MIN, f64::max);
    }

    Ok(())
}
