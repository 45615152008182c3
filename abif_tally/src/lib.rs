mod approval;
mod fptp;
mod irv;
mod model;
mod pairwise;
mod parse;
pub mod quick_start;
mod score;

use std::error::Error;
use std::fmt::Display;

pub use crate::approval::*;
pub use crate::fptp::*;
pub use crate::irv::*;
pub use crate::model::*;
pub use crate::pairwise::*;
pub use crate::parse::*;
pub use crate::score::*;

/// Severity of a structured annotation attached to a tally result.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum NoticeKind {
    Info,
    Warning,
}

impl NoticeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NoticeKind::Info => "info",
            NoticeKind::Warning => "warning",
        }
    }
}

/// A human-readable annotation describing an anomaly in one method's result,
/// such as a tie or an estimation caveat.
///
/// Every tally result carries a list of notices. An empty list is the normal
/// no-anomaly state, not an absence of information.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Notice {
    pub kind: NoticeKind,
    pub short: String,
    pub long: String,
}

impl Notice {
    pub fn info(short: impl Into<String>, long: impl Into<String>) -> Notice {
        Notice {
            kind: NoticeKind::Info,
            short: short.into(),
            long: long.into(),
        }
    }

    pub fn warning(short: impl Into<String>, long: impl Into<String>) -> Notice {
        Notice {
            kind: NoticeKind::Warning,
            short: short.into(),
            long: long.into(),
        }
    }
}

/// Errors that prevent a tally function from completing.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum TallyError {
    /// The model has no candidates.
    EmptyElection,
    /// The method needs ratings and the model carries none.
    NoRatings,
    /// A requested option is not implemented by this version of the engine.
    UnsupportedOption { option: String },
    /// The round loop did not terminate within the expected bound.
    NoConvergence,
}

impl Error for TallyError {}

impl Display for TallyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TallyError::EmptyElection => write!(f, "the election has no candidates"),
            TallyError::NoRatings => write!(f, "the ballots carry no ratings"),
            TallyError::UnsupportedOption { option } => {
                write!(f, "unsupported tally option: {}", option)
            }
            TallyError::NoConvergence => write!(f, "the tally did not converge"),
        }
    }
}

/// Errors raised while parsing ABIF text.
///
/// ```
/// use abif_tally::{parse, ParseOptions};
///
/// let model = parse("2:A>B\n1:B>A\n", &ParseOptions::default())?;
/// assert_eq!(model.candidate_count(), 2);
/// assert_eq!(model.total_ballots(), 3);
/// # Ok::<(), abif_tally::AbifError>(())
/// ```
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum AbifError {
    /// A voteline could not be understood. Lines are numbered from 1.
    Voteline { line: usize, message: String },
    /// A `{...}` metadata line is not valid JSON.
    Metadata { line: usize, message: String },
    /// A `=tok:[Name]` candidate declaration is malformed.
    CandidateDecl { line: usize, message: String },
    /// The input declares no candidates and contains no votelines.
    EmptyInput,
}

impl Error for AbifError {}

impl Display for AbifError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbifError::Voteline { line, message } => {
                write!(f, "line {}: bad voteline: {}", line, message)
            }
            AbifError::Metadata { line, message } => {
                write!(f, "line {}: bad metadata: {}", line, message)
            }
            AbifError::CandidateDecl { line, message } => {
                write!(f, "line {}: bad candidate declaration: {}", line, message)
            }
            AbifError::EmptyInput => write!(f, "no candidates or votelines found in the input"),
        }
    }
}
