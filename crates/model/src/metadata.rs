//! Normalization statistics and the category table.

use crate::error::ModelError;
use btune_core::{Codec, Filter};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Environment variable pointing at the metadata JSON file.
pub const METADATA_ENV: &str = "BTUNE_METADATA";

/// Per-feature normalization statistics.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct NormStats {
    pub mean: f32,
    pub std: f32,
    pub min: f32,
    pub max: f32,
}

impl NormStats {
    /// Standardize, then rescale: `((v - mean) / std - min) / max`.
    pub fn normalize(&self, value: f32) -> f32 {
        ((value - self.mean) / self.std - self.min) / self.max
    }
}

/// Classifier companion data: how to normalize the probe features and what
/// codec/filter pair each output category stands for.
#[derive(Debug, Clone, Deserialize)]
pub struct Metadata {
    pub cratio: NormStats,
    pub speed: NormStats,
    /// `categories[i]` holds the `(codec, filter)` wire codes for classifier
    /// output `i`.
    pub categories: Vec<(u8, u8)>,
}

impl Metadata {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let blob = fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let metadata: Metadata = serde_json::from_str(&blob)?;
        Ok(metadata)
    }

    /// Load from the path in `BTUNE_METADATA`.
    pub fn from_env() -> Result<Self, ModelError> {
        let path =
            std::env::var(METADATA_ENV).map_err(|_| ModelError::MissingEnv(METADATA_ENV))?;
        Self::load(path)
    }

    /// Resolve a classifier output index to a codec/filter pair.
    pub fn category(&self, index: usize) -> Result<(Codec, Filter), ModelError> {
        let &(codec, filter) = self
            .categories
            .get(index)
            .ok_or(ModelError::CategoryOutOfRange(index))?;
        match (Codec::from_code(codec), Filter::from_code(filter)) {
            (Some(codec), Some(filter)) => Ok((codec, filter)),
            _ => Err(ModelError::UnknownCategory {
                index,
                codec,
                filter,
            }),
        }
    }
}
