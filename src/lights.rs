//! The global light table.
//!
//! A "light" is a string that can be entered into a word: an answer after treatment and after its
//! entry method has been applied, plus any tag letters. Lights are deduplicated across the whole
//! run so that candidate lists can be plain index vectors, and every distinct string (ignoring
//! tags) gets a uniquifying number so that "no duplicate answers" mode can tell when two lights
//! would put the same text in the grid.

use bit_set::BitSet;
use std::collections::HashMap;
use std::ops::BitOr;
use std::sync::Arc;

use crate::types::{glyph_bit, Flbm, GlyphId, GlyphString, GLYPH_CODES};

/// Index of a light in the `LightTable`.
pub type LightId = usize;

/// Index of an answer in the dictionary the table was built from.
pub type AnswerId = usize;

/// A set of entry methods, as configured on a word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EntryMethods(u32);

impl EntryMethods {
    pub const NONE: EntryMethods = EntryMethods(0);
    pub const FORWARD: EntryMethods = EntryMethods(1);
    pub const REVERSED: EntryMethods = EntryMethods(2);
    pub const CYCLIC: EntryMethods = EntryMethods(4);
    pub const REVERSED_CYCLIC: EntryMethods = EntryMethods(8);
    pub const JUMBLED: EntryMethods = EntryMethods(16);
    /// Every method that places the light directly into the word's entries.
    pub const ALL: EntryMethods = EntryMethods(31);
    /// Letters are spread monotonically over a longer word, with dashes in between.
    pub const SPREAD: EntryMethods = EntryMethods(32);

    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn from_bits(bits: u32) -> EntryMethods {
        EntryMethods(bits & (EntryMethods::ALL.0 | EntryMethods::SPREAD.0))
    }

    #[must_use]
    pub const fn contains(self, other: EntryMethods) -> bool {
        self.0 & other.0 == other.0
    }

    #[must_use]
    pub const fn intersects(self, other: EntryMethods) -> bool {
        self.0 & other.0 != 0
    }

    #[must_use]
    pub const fn intersection(self, other: EntryMethods) -> EntryMethods {
        EntryMethods(self.0 & other.0)
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for EntryMethods {
    type Output = EntryMethods;

    fn bitor(self, rhs: EntryMethods) -> EntryMethods {
        EntryMethods(self.0 | rhs.0)
    }
}

/// Per-word configuration for which lights it may take.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightProps {
    /// Bitmask of dictionaries this word draws answers from.
    pub dictionaries: u32,
    pub entry_methods: EntryMethods,
    /// Should answers be passed through the builder's treatment before entry?
    pub treated: bool,
    /// If set, the word takes the given message string instead of dictionary answers.
    pub message: Option<usize>,
}

impl Default for LightProps {
    fn default() -> Self {
        LightProps {
            dictionaries: 1,
            entry_methods: EntryMethods::FORWARD,
            treated: false,
            message: None,
        }
    }
}

/// Where a light's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightSource {
    Answer(AnswerId),
    Message(usize),
}

/// How a light was derived from its source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryMethod {
    Forward,
    Reversed,
    Cyclic,
    ReversedCyclic,
    Jumbled,
    Spread,
}

/// A dictionary answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    pub glyphs: GlyphString,
    /// Branching weight; answers with a non-positive score are never proposed.
    pub score: f64,
    pub dictionaries: u32,
    pub banned: bool,
}

impl Answer {
    #[must_use]
    pub fn new(text: &str, glyphs: GlyphString, score: f64) -> Answer {
        Answer {
            text: text.to_string(),
            glyphs,
            score,
            dictionaries: 1,
            banned: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    /// Full text, including any trailing tag letters.
    pub glyphs: GlyphString,
    pub source: LightSource,
    pub method: EntryMethod,
    /// Shared by every light with the same untagged text.
    pub uniq: usize,
    /// Number of tag letters at the end of `glyphs`.
    pub tags: usize,
    /// Letters occurring in the untagged text.
    pub letters: Flbm,
    /// Letter counts over the untagged text.
    pub histogram: [u8; GLYPH_CODES],
}

impl Light {
    #[must_use]
    pub fn untagged(&self) -> &[GlyphId] {
        &self.glyphs[..self.glyphs.len() - self.tags]
    }
}

#[derive(Debug, Clone)]
pub struct LightTable {
    answers: Arc<[Answer]>,
    message_count: usize,
    lights: Vec<Light>,
    by_content: HashMap<(LightSource, EntryMethod, GlyphString), LightId>,
    uniq_by_text: HashMap<GlyphString, usize>,
}

impl LightTable {
    #[must_use]
    pub fn new(answers: Arc<[Answer]>, message_count: usize) -> LightTable {
        LightTable {
            answers,
            message_count,
            lights: vec![],
            by_content: HashMap::new(),
            uniq_by_text: HashMap::new(),
        }
    }

    /// Find or add the light with the given text, source and method. `tags` trailing letters of
    /// `glyphs` are tag letters, which don't count towards the uniquifying number or histogram.
    pub fn add_light(
        &mut self,
        glyphs: &[GlyphId],
        tags: usize,
        source: LightSource,
        method: EntryMethod,
    ) -> LightId {
        let key = (source, method, GlyphString::from_slice(glyphs));
        if let Some(&light_id) = self.by_content.get(&key) {
            return light_id;
        }

        let untagged = &glyphs[..glyphs.len() - tags];
        let next_uniq = self.uniq_by_text.len();
        let uniq = *self
            .uniq_by_text
            .entry(GlyphString::from_slice(untagged))
            .or_insert(next_uniq);

        let mut histogram = [0u8; GLYPH_CODES];
        let mut letters = 0;
        for &glyph in untagged {
            histogram[glyph] = histogram[glyph].saturating_add(1);
            letters |= glyph_bit(glyph);
        }

        let light_id = self.lights.len();
        self.lights.push(Light {
            glyphs: key.2.clone(),
            source,
            method,
            uniq,
            tags,
            letters,
            histogram,
        });
        self.by_content.insert(key, light_id);
        light_id
    }

    #[must_use]
    pub fn light(&self, light_id: LightId) -> &Light {
        &self.lights[light_id]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lights.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    #[must_use]
    pub fn answers(&self) -> &[Answer] {
        &self.answers
    }

    #[must_use]
    pub fn message_count(&self) -> usize {
        self.message_count
    }

    /// Number of distinct untagged strings seen so far.
    #[must_use]
    pub fn unique_count(&self) -> usize {
        self.uniq_by_text.len()
    }

    /// The weight a light contributes when scoring: its answer's score, or 1 for message lights.
    #[must_use]
    pub fn weight(&self, light_id: LightId) -> f64 {
        match self.lights[light_id].source {
            LightSource::Answer(answer_id) => self.answers[answer_id].score,
            LightSource::Message(_) => 1.0,
        }
    }

    /// Human-readable source text for a light.
    #[must_use]
    pub fn source_text(&self, light_id: LightId) -> Option<&str> {
        match self.lights[light_id].source {
            LightSource::Answer(answer_id) => Some(&self.answers[answer_id].text),
            LightSource::Message(_) => None,
        }
    }

    /// Sort a list of lights by descending weight, keeping the existing order for ties.
    pub fn sort_by_weight(&self, list: &mut [LightId]) {
        list.sort_by(|&a, &b| self.weight(b).total_cmp(&self.weight(a)));
    }
}

/// "Used" flags for "no duplicate answers" mode: one bit per unique string and one bit per
/// answer or message.
#[derive(Debug, Clone, Default)]
pub struct UsedTracker {
    strings: BitSet,
    sources: BitSet,
    message_count: usize,
}

impl UsedTracker {
    #[must_use]
    pub fn new(table: &LightTable) -> UsedTracker {
        UsedTracker {
            strings: BitSet::with_capacity(table.unique_count()),
            sources: BitSet::with_capacity(table.answers().len() + table.message_count()),
            message_count: table.message_count(),
        }
    }

    fn source_index(&self, source: LightSource) -> usize {
        match source {
            LightSource::Message(message) => message,
            LightSource::Answer(answer_id) => self.message_count + answer_id,
        }
    }

    #[must_use]
    pub fn is_used(&self, light: &Light) -> bool {
        self.strings.contains(light.uniq) || self.sources.contains(self.source_index(light.source))
    }

    pub fn set_used(&mut self, light: &Light, used: bool) {
        let source_index = self.source_index(light.source);
        if used {
            self.strings.insert(light.uniq);
            self.sources.insert(source_index);
        } else {
            self.strings.remove(light.uniq);
            self.sources.remove(source_index);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty() && self.sources.is_empty()
    }
}
