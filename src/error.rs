use std::fmt;

use crate::grid::WordId;

/// Failures raised by a `CandidateListBuilder` while producing the initial lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateListError {
    /// The run was cancelled while lists were being built.
    Aborted,
    /// A word refers to a message that the builder doesn't have.
    UnknownMessage { word: WordId, message: usize },
    /// The builder couldn't allocate a list.
    OutOfMemory,
    /// Any other builder-specific failure.
    Other(String),
}

impl fmt::Display for CandidateListError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CandidateListError::Aborted => write!(f, "candidate list build was aborted"),
            CandidateListError::UnknownMessage { word, message } => {
                write!(f, "word {word} refers to unknown message {message}")
            }
            CandidateListError::OutOfMemory => {
                write!(f, "out of memory while building candidate lists")
            }
            CandidateListError::Other(message) => write!(f, "candidate list build failed: {message}"),
        }
    }
}

impl std::error::Error for CandidateListError {}

/// Failures that end a fill run. Running out of options isn't one of these; that's reported as
/// `FillStatus::NoSolution`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FillError {
    OutOfMemory,
    /// The search tried to go deeper than there are entries in the grid.
    OutOfStack { depth: usize },
    CandidateList(CandidateListError),
    WorkerSpawn(String),
}

impl fmt::Display for FillError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FillError::OutOfMemory => write!(f, "out of memory during search"),
            FillError::OutOfStack { depth } => {
                write!(f, "search stack overflowed at depth {depth}")
            }
            FillError::CandidateList(err) => write!(f, "{err}"),
            FillError::WorkerSpawn(message) => {
                write!(f, "couldn't start the fill worker: {message}")
            }
        }
    }
}

impl std::error::Error for FillError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FillError::CandidateList(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CandidateListError> for FillError {
    fn from(err: CandidateListError) -> Self {
        FillError::CandidateList(err)
    }
}

/// Problems with a template string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    Empty,
    TooLarge { width: usize, height: usize },
    UnknownCharacter { char: char, x: usize, y: usize },
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateError::Empty => write!(f, "template has no cells"),
            TemplateError::TooLarge { width, height } => {
                write!(f, "template is {width}x{height}, which is too large")
            }
            TemplateError::UnknownCharacter { char, x, y } => {
                write!(f, "unknown character {char:?} at ({x}, {y})")
            }
        }
    }
}

impl std::error::Error for TemplateError {}

/// Why a propagation pass stopped early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PropagationFailure {
    /// A word that isn't fully entered ran out of candidates.
    Infeasible { word: WordId },
    OutOfMemory,
    Aborted,
}

impl fmt::Display for PropagationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropagationFailure::Infeasible { word } => {
                write!(f, "word {word} has no remaining candidates")
            }
            PropagationFailure::OutOfMemory => write!(f, "out of memory"),
            PropagationFailure::Aborted => write!(f, "aborted"),
        }
    }
}
