//! Error types for split decomposition and split-system parsing.

use thiserror::Error;

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, DecompositionError>;

/// Failures surfaced by the split-system engine.
///
/// None of these are retried internally. Numeric edge cases (near-zero
/// isolation indices, ordering ties) are absorbed by tolerances and never
/// show up here.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecompositionError {
    /// Matrix not square, dimension mismatch with the taxon count, or a split
    /// side that does not fit the taxon universe.
    #[error("Shape error: {message}")]
    Shape { message: String },

    /// Distances outside the valid range (negative or non-finite).
    #[error("Saturated input: {message}")]
    SaturatedInput { message: String },

    /// The caller's cancellation token fired.
    #[error("Computation cancelled")]
    Cancelled,

    /// Fewer than one taxon.
    #[error("Degenerate input: {message}")]
    DegenerateInput { message: String },

    /// A phylogenetic tree could not be turned into splits.
    #[error("Invalid tree: {message}")]
    InvalidTree { message: String },
}

impl DecompositionError {
    pub fn shape(message: impl Into<String>) -> Self {
        Self::Shape {
            message: message.into(),
        }
    }

    pub fn saturated_input(message: impl Into<String>) -> Self {
        Self::SaturatedInput {
            message: message.into(),
        }
    }

    pub fn degenerate_input(message: impl Into<String>) -> Self {
        Self::DegenerateInput {
            message: message.into(),
        }
    }

    pub fn invalid_tree(message: impl Into<String>) -> Self {
        Self::InvalidTree {
            message: message.into(),
        }
    }

    /// Cancellation is the only kind a caller may sensibly retry.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Error raised while reading the split-system text format.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Parse error at byte {position}: {message}")]
pub struct ParseError {
    pub position: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}
