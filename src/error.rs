//! Error type of the public muxer API.
//!
//! The serializer layer below speaks plain `std::io::Result`; everything
//! that reaches a library caller is folded into [`Error`].
use std::io;

use thiserror::Error;

/// Errors returned by the muxer and importer entry points.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O failure on the byte sink or source.
    #[error("i/o: {0}")]
    Io(#[from] io::Error),

    /// Malformed input bytes (elementary stream, chapter file, box data).
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Recognized but unsupported construct.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// API misuse: bad argument, wrong call order, unknown track id.
    #[error("invalid parameter: {0}")]
    Param(String),

    /// Generic failure with no more specific kind.
    #[error("{0}")]
    Other(String),
}

impl Error {
    pub(crate) fn invalid_data(msg: impl Into<String>) -> Error {
        Error::InvalidData(msg.into())
    }

    pub(crate) fn unsupported(msg: impl Into<String>) -> Error {
        Error::Unsupported(msg.into())
    }

    pub(crate) fn param(msg: impl Into<String>) -> Error {
        Error::Param(msg.into())
    }
}

/// Result alias used throughout the public API.
pub type Result<T> = std::result::Result<T, Error>;
