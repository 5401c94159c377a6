//! Building the initial candidate list for each word.
//!
//! The search core only sees the `CandidateListBuilder` trait; `DictionaryCandidates` is the
//! stock implementation, which expands every answer in a word list according to the word's entry
//! methods and registers the resulting lights in the shared `LightTable`.

use std::collections::HashSet;
use std::sync::Arc;

use crate::cancel::CancellationToken;
use crate::error::CandidateListError;
use crate::grid::WordId;
use crate::lights::{
    Answer, EntryMethod, EntryMethods, LightId, LightProps, LightSource, LightTable,
};
use crate::types::{Alphabet, GlyphId, GlyphString, DASH};

/// How often the dictionary scan checks for cancellation.
const CANCEL_CHECK_INTERVAL: usize = 1024;

/// What the search needs a candidate list for.
#[derive(Debug, Clone, Copy)]
pub struct CandidateRequest<'a> {
    pub word: WordId,
    /// Length of each candidate, not counting tag letters.
    pub length: usize,
    /// Number of tag letters each candidate must carry.
    pub tags: usize,
    pub props: &'a LightProps,
}

/// Produces the initial list of candidate lights for each word at the start of a run.
pub trait CandidateListBuilder: Send {
    /// Called once before any list is built; returns the table the lights will be added to.
    fn prepare(&mut self) -> Result<LightTable, CandidateListError>;

    /// Build the list for one word. Implementations should poll `cancel` while they work.
    fn build(
        &mut self,
        request: &CandidateRequest<'_>,
        table: &mut LightTable,
        cancel: &CancellationToken,
    ) -> Result<Vec<LightId>, CandidateListError>;

    /// Called once after every list has been built.
    fn finish(&mut self, _table: &mut LightTable) -> Result<(), CandidateListError> {
        Ok(())
    }
}

/// One output of a `Treatment`: the treated text plus any tag letters to append after entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreatedForm {
    pub glyphs: GlyphString,
    pub tags: GlyphString,
}

/// Transforms an answer before it's entered into a word whose props ask for treatment.
pub trait Treatment: Send + Sync {
    fn treat(&self, answer: &Answer) -> Vec<TreatedForm>;
}

impl<F> Treatment for F
where
    F: Fn(&Answer) -> Vec<TreatedForm> + Send + Sync,
{
    fn treat(&self, answer: &Answer) -> Vec<TreatedForm> {
        self(answer)
    }
}

/// Candidate lists drawn from an in-memory word list.
#[derive(Clone)]
pub struct DictionaryCandidates {
    answers: Arc<[Answer]>,
    messages: Vec<GlyphString>,
    treatment: Option<Arc<dyn Treatment>>,
}

impl DictionaryCandidates {
    #[must_use]
    pub fn new(answers: Vec<Answer>) -> DictionaryCandidates {
        DictionaryCandidates {
            answers: answers.into(),
            messages: vec![],
            treatment: None,
        }
    }

    /// Build from `(word, score)` pairs, dropping characters the alphabet doesn't know about and
    /// skipping words that end up empty.
    #[must_use]
    pub fn from_word_list(word_list: &[(String, i32)], alphabet: &Alphabet) -> DictionaryCandidates {
        let answers = word_list
            .iter()
            .filter_map(|(text, score)| {
                let glyphs = alphabet.encode(text);
                if glyphs.is_empty() {
                    None
                } else {
                    Some(Answer::new(text, glyphs, f64::from(*score)))
                }
            })
            .collect();
        DictionaryCandidates::new(answers)
    }

    #[must_use]
    pub fn with_messages(mut self, messages: Vec<GlyphString>) -> DictionaryCandidates {
        self.messages = messages;
        self
    }

    #[must_use]
    pub fn with_treatment(mut self, treatment: Arc<dyn Treatment>) -> DictionaryCandidates {
        self.treatment = Some(treatment);
        self
    }

    #[must_use]
    pub fn answers(&self) -> &[Answer] {
        &self.answers
    }
}

/// Accumulates one word's list, skipping lights that are already in it.
struct ListAccumulator<'a> {
    table: &'a mut LightTable,
    list: Vec<LightId>,
    seen: HashSet<LightId>,
}

impl ListAccumulator<'_> {
    fn push(
        &mut self,
        form: &[GlyphId],
        tags: &[GlyphId],
        source: LightSource,
        method: EntryMethod,
    ) -> Result<(), CandidateListError> {
        let mut glyphs = GlyphString::from_slice(form);
        glyphs.extend_from_slice(tags);
        let light_id = self.table.add_light(&glyphs, tags.len(), source, method);
        if self.seen.insert(light_id) {
            self.list
                .try_reserve(1)
                .map_err(|_| CandidateListError::OutOfMemory)?;
            self.list.push(light_id);
        }
        Ok(())
    }

    /// Add every entry form of `glyphs` permitted by `methods`.
    fn push_entry_forms(
        &mut self,
        glyphs: &[GlyphId],
        tags: &[GlyphId],
        methods: EntryMethods,
        source: LightSource,
    ) -> Result<(), CandidateListError> {
        let len = glyphs.len();

        // Jumbled words keep just the forward text; the jumble checker handles the arrangements.
        if methods.contains(EntryMethods::JUMBLED) {
            return self.push(glyphs, tags, source, EntryMethod::Jumbled);
        }

        if methods.contains(EntryMethods::FORWARD) {
            self.push(glyphs, tags, source, EntryMethod::Forward)?;
        }
        if methods.contains(EntryMethods::REVERSED) {
            let reversed: GlyphString = glyphs.iter().rev().copied().collect();
            self.push(&reversed, tags, source, EntryMethod::Reversed)?;
        }
        // For two-letter lights the only rotation is the reversal.
        if methods.contains(EntryMethods::CYCLIC)
            && !(len == 2 && methods.contains(EntryMethods::REVERSED))
        {
            for shift in 1..len {
                let rotated: GlyphString = (0..len).map(|i| glyphs[(i + shift) % len]).collect();
                self.push(&rotated, tags, source, EntryMethod::Cyclic)?;
            }
        }
        if methods.contains(EntryMethods::REVERSED_CYCLIC)
            && !(len == 2 && methods.contains(EntryMethods::FORWARD))
        {
            for shift in 1..len {
                let rotated: GlyphString = (0..len)
                    .map(|i| glyphs[(len - i - 1 + shift) % len])
                    .collect();
                self.push(&rotated, tags, source, EntryMethod::ReversedCyclic)?;
            }
        }
        Ok(())
    }
}

impl CandidateListBuilder for DictionaryCandidates {
    fn prepare(&mut self) -> Result<LightTable, CandidateListError> {
        Ok(LightTable::new(self.answers.clone(), self.messages.len()))
    }

    fn build(
        &mut self,
        request: &CandidateRequest<'_>,
        table: &mut LightTable,
        cancel: &CancellationToken,
    ) -> Result<Vec<LightId>, CandidateListError> {
        if cancel.is_cancelled() {
            return Err(CandidateListError::Aborted);
        }

        let props = request.props;
        let mut accumulator = ListAccumulator {
            table,
            list: vec![],
            seen: HashSet::new(),
        };

        if let Some(message) = props.message {
            let text = self
                .messages
                .get(message)
                .ok_or(CandidateListError::UnknownMessage {
                    word: request.word,
                    message,
                })?;
            if text.len() > request.length {
                return Ok(vec![]);
            }
            let mut padded = text.clone();
            padded.resize(request.length, DASH);
            let method = if props.entry_methods.contains(EntryMethods::SPREAD) {
                EntryMethod::Spread
            } else {
                EntryMethod::Forward
            };
            accumulator.push(&padded, &[], LightSource::Message(message), method)?;
            return Ok(accumulator.list);
        }

        let mut methods = props.entry_methods.intersection(EntryMethods::ALL);
        if methods.is_empty() {
            methods = EntryMethods::FORWARD;
        }

        let treatment = if props.treated {
            self.treatment.as_deref()
        } else {
            None
        };

        for (answer_id, answer) in self.answers.iter().enumerate() {
            if answer_id % CANCEL_CHECK_INTERVAL == 0 && cancel.is_cancelled() {
                return Err(CandidateListError::Aborted);
            }
            if answer.banned || answer.dictionaries & props.dictionaries == 0 {
                continue;
            }
            let source = LightSource::Answer(answer_id);

            match treatment {
                Some(treatment) => {
                    for form in treatment.treat(answer) {
                        if form.glyphs.len() == request.length && form.tags.len() == request.tags {
                            accumulator.push_entry_forms(&form.glyphs, &form.tags, methods, source)?;
                        }
                    }
                }
                None => {
                    if answer.glyphs.len() == request.length && request.tags == 0 {
                        accumulator.push_entry_forms(&answer.glyphs, &[], methods, source)?;
                    }
                }
            }
        }

        Ok(accumulator.list)
    }
}
