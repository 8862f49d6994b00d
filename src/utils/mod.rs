// src/utils/mod.rs

pub mod binary_stream;
pub mod error;

pub use binary_stream::BinaryStream;
pub use error::{BinaryDataError, Result};
