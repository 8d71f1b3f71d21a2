//! Error types for this crate.
//!
//! All fallible operations return [`Result<T>`] which uses [`EncoderError`]
//! as the error type. Variants follow the failure classes callers actually
//! handle differently, so they can pattern-match instead of string-matching.

use thiserror::Error;

/// A [`Result`](std::result::Result) alias using [`EncoderError`] as the error type.
pub type Result<T> = std::result::Result<T, EncoderError>;

/// The unified error type for all crate errors.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum EncoderError {
    /// `encode` was called before `prepare`. Caller bug, not retryable.
    #[error("encoder is not prepared; call prepare() first")]
    NotPrepared,

    /// `prepare` was called on an already prepared encoder.
    #[error("encoder is already prepared")]
    AlreadyPrepared,

    /// The capability exists in the API surface but has no implementation
    /// yet. Never degrades to a silent default.
    #[error("not implemented: {0}")]
    Unimplemented(String),

    /// Network or cache failure while fetching checkpoint artifacts.
    /// Surfaced unchanged; retry policy belongs to the surrounding pipeline.
    #[error("{0}")]
    Download(String),

    /// Tokenizer loading or encoding failure.
    #[error("{0}")]
    Tokenization(String),

    /// Device initialization failure. Fall back to CPU.
    #[error("{0}")]
    Device(String),

    // Pass-through from dependencies
    #[error(transparent)]
    Candle(#[from] candle_core::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
}

impl From<hf_hub::api::sync::ApiError> for EncoderError {
    fn from(value: hf_hub::api::sync::ApiError) -> Self {
        EncoderError::Download(value.to_string())
    }
}
