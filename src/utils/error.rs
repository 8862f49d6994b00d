// src/utils/error.rs

use thiserror::Error;

/// Error raised by [`BinaryStream`](crate::utils::BinaryStream) and the
/// codecs built on top of it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BinaryDataError {
    #[error("not enough bytes left in buffer: need {needed}, have {have}")]
    NotEnoughData { needed: usize, have: usize },

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("string field is not valid UTF-8")]
    InvalidUtf8,

    #[error("value too large for wire field: {0}")]
    ValueTooLarge(String),
}

pub type Result<T> = std::result::Result<T, BinaryDataError>;
