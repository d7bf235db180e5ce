//! Error types for capiche-geometry.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The requested test makes no physical sense for these layers.
    #[error("incompatible topology: {0}")]
    IncompatibleTopology(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error(transparent)]
    Stack(#[from] capiche_core::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
