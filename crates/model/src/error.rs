//! Error types for the model crate.
//!
//! These are all soft errors: the tuner treats any of them as "no guidance"
//! and proceeds with its default candidate sets.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("environment variable {0} is not set")]
    MissingEnv(&'static str),

    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("model shape error: {0}")]
    Shape(String),

    #[error("category {index} maps to unknown codec/filter codes ({codec}, {filter})")]
    UnknownCategory { index: usize, codec: u8, filter: u8 },

    #[error("category index {0} is outside the category table")]
    CategoryOutOfRange(usize),

    #[error("chunk produced no probe samples")]
    EmptyChunk,
}
