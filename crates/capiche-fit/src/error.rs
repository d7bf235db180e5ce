//! Error types for capiche-fit.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Too few distinct sweep points to determine the model.
    #[error("{pair}: {found} distinct sweep points, at least {required} needed")]
    InsufficientData {
        pair: String,
        found: usize,
        required: usize,
    },

    /// The optimizer ran out of iterations or left a large residual.
    #[error("{pair}: fit did not converge after {iterations} iterations (normalised residual {residual:.3e})")]
    FitDidNotConverge {
        pair: String,
        iterations: usize,
        residual: f64,
    },

    #[error("singular system")]
    SingularSystem,

    #[error("invalid matrix dimensions: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A fit needs a coefficient that could not be derived first.
    #[error("{pair}: missing {kind} reference value")]
    MissingReference { kind: &'static str, pair: String },

    /// Malformed coefficient file.
    #[error("coefficient file line {line}: {message}")]
    Coefficients { line: usize, message: String },

    #[error(transparent)]
    Stack(#[from] capiche_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
