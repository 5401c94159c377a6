//! An autofill engine for crossword-style grids.
//!
//! A grid is described as a set of shared `Entry` cells, each holding a bitmap of the letters that
//! can still go there, and a set of `Word`s, each an ordered list of entries plus a list of
//! candidate strings. Filling alternates between two propagation passes (`settle_entries` and
//! `settle_words`) until the entries and candidate lists agree, scores every remaining letter,
//! branches on the most constrained entry, and backtracks through an explicit stack of frames when
//! a branch dies.
//!
//! Besides plain entry, words can take their letters in "jumble" mode (any allowed permutation of
//! a candidate) or "spread" mode (a candidate's letters placed monotonically into a longer word,
//! with the leftover slots taking a dash).

#![warn(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::float_cmp)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::too_many_lines)]

pub mod branching;
pub mod cancel;
pub mod candidates;
pub mod error;
pub mod grid;
pub mod jumble;
pub mod lights;
pub mod propagation;
pub mod scoring;
pub mod search;
pub mod spread;
pub mod types;
pub mod worker;

/// The expected maximum length for a single word; used as the inline capacity for per-word
/// buffers, which spill to the heap for longer words.
pub const MAX_SLOT_LENGTH: usize = 21;

/// The maximum number of entries in a single word (light plus any tags). Letter histograms are
/// stored as `u8`, so this must stay below 256.
pub const MAX_WORD_ENTRIES: usize = 255;

/// The maximum width and height of a template grid.
pub const MAX_GRID_SIZE: usize = 63;

pub use branching::{find_critical_entry, get_possibilities, Possibilities, Randomization};
pub use cancel::CancellationToken;
pub use candidates::{
    CandidateListBuilder, CandidateRequest, DictionaryCandidates, TreatedForm, Treatment,
};
pub use error::{CandidateListError, FillError, TemplateError};
pub use grid::{Direction, Entry, EntryId, Grid, LetterMode, Word, WordId, WordLists};
pub use lights::{
    Answer, AnswerId, EntryMethod, EntryMethods, Light, LightId, LightProps, LightSource,
    LightTable, UsedTracker,
};
pub use search::{run_search, FillMode, FillOptions, FillStatus, SearchReport, Solution, Statistics};
pub use types::{Alphabet, Flbm, GlyphId, GlyphString};
pub use worker::{fill, FillObserver, FillOutcome, Filler, HintBoard};
