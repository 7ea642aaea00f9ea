//! # Errors
//!
//! Only malformed input is an error. Unknown dimensions, unrecognised custom
//! expressions and restricted filter values all degrade to data, never to
//! a [`QueryError`].

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("malformed request body: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("duplicate select alias `{0}`")]
    DuplicateAlias(String),

    #[error("invalid timestamp `{value}` in timeRange.{bound}")]
    InvalidTimestamp { bound: &'static str, value: String },
}

pub type Result<T> = std::result::Result<T, QueryError>;
