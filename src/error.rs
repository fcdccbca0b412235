use alloc::string::String;
use core::fmt;

/// Everything that can go wrong while configuring or running the codebook
/// generator.
///
/// The generator is a batch computation (see the crate-level docs): there is
/// no retry path, so every variant here is meant to carry enough context
/// (column, symbol, or a short message) that a caller can diagnose the
/// failure without re-running under a debugger.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreError {
    /// `alphabet_size` outside `1..=64`, a negative `comp`, `clusters == 0`,
    /// or an otherwise malformed [`Config`](crate::config::Config).
    ConfigurationInvalid { message: String },
    /// The training corpus handed to the generator has zero lines or zero
    /// columns.
    TrainingCorpusEmpty,
    /// A PMF that the algorithm expected to carry mass turned out to have
    /// none (e.g. an unseen context, or a renormalization of an all-zero
    /// accumulator).
    EmptyDistribution { column: usize, context: Option<u8> },
    /// A context symbol was looked up in a column's input alphabet and was
    /// not present. Reaching this is always a driver bug: a column's input
    /// alphabet is supposed to exactly track the previous column's output
    /// union (see `ConditionalQuantizerStore`'s invariants).
    AlphabetLookupMiss { column: usize, symbol: u8 },
    /// Catch-all for states that the algorithm's invariants say cannot
    /// occur (non-finite entropy, a cell with no candidate reproduction
    /// point, etc.), annotated with whatever context was on hand.
    InternalInvariantViolated { column: usize, message: String },
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::ConfigurationInvalid { message } => {
                write!(f, "invalid configuration: {}", message)
            }
            CoreError::TrainingCorpusEmpty => {
                write!(f, "training corpus has zero lines or zero columns")
            }
            CoreError::EmptyDistribution { column, context } => match context {
                Some(s) => write!(
                    f,
                    "empty distribution at column {} for context symbol {}",
                    column, s
                ),
                None => write!(f, "empty distribution at column {}", column),
            },
            CoreError::AlphabetLookupMiss { column, symbol } => write!(
                f,
                "symbol {} is not in the input alphabet of column {}",
                symbol, column
            ),
            CoreError::InternalInvariantViolated { column, message } => write!(
                f,
                "internal invariant violated at column {}: {}",
                column, message
            ),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CoreError {}

pub type Result<T> = core::result::Result<T, CoreError>;
