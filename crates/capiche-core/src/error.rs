//! Error types for capiche-core.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The stack description is malformed or internally inconsistent.
    #[error("invalid stack: {0}")]
    InvalidStack(String),

    /// A layer name does not resolve to a layer of the required kind.
    #[error("unresolved layer: {0}")]
    UnresolvedLayer(String),

    /// A result table line could not be parsed.
    #[error("{path}:{line}: {message}")]
    Table {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
