//! First-chunk inference: probe the blocks, classify each, vote.

use crate::error::ModelError;
use crate::metadata::Metadata;
use crate::predictor::{MlpPredictor, Predictor, NCODECS};
use btune_core::{Codec, CompMode, CparamsInference, Filter};
use btune_probe::probe_chunk;
use tracing::debug;

/// Chunk-0 codec/filter selection backed by a [`Predictor`].
pub struct ModelInference {
    metadata: Metadata,
    predictor: Box<dyn Predictor>,
}

impl ModelInference {
    /// Build from the environment: `BTUNE_METADATA` plus the model variable
    /// for the given mode. Any missing piece is a soft error and the caller
    /// should fall back to the default candidate sets.
    pub fn from_env(comp_mode: CompMode) -> Result<Self, ModelError> {
        let metadata = Metadata::from_env()?;
        let predictor = MlpPredictor::from_env(comp_mode)?;
        Ok(Self {
            metadata,
            predictor: Box::new(predictor),
        })
    }

    /// Build from already-loaded parts.
    pub fn with_parts(metadata: Metadata, predictor: Box<dyn Predictor>) -> Self {
        Self {
            metadata,
            predictor,
        }
    }

    /// The winning codec/filter pair for a chunk: every block votes with the
    /// argmax of its classified probe features.
    pub fn best_for_chunk(
        &self,
        chunk: &[u8],
        blocksize: usize,
    ) -> Result<(Codec, Filter), ModelError> {
        let blocks = probe_chunk(chunk, blocksize);
        if blocks.is_empty() {
            return Err(ModelError::EmptyChunk);
        }

        let mut votes = [0u32; NCODECS];
        for instr in &blocks {
            let features = [
                self.metadata.cratio.normalize(instr.cratio),
                self.metadata.speed.normalize(instr.cspeed),
            ];
            let scores = self.predictor.predict(features);
            let best = argmax(&scores);
            votes[best] += 1;
        }

        let winner = argmax(&votes);
        self.metadata.category(winner)
    }
}

fn argmax<T: PartialOrd>(values: &[T]) -> usize {
    let mut best = 0;
    for (i, value) in values.iter().enumerate() {
        if value > &values[best] {
            best = i;
        }
    }
    best
}

impl CparamsInference for ModelInference {
    fn infer(&self, chunk: &[u8], blocksize: usize, _typesize: usize) -> Option<(Codec, Filter)> {
        match self.best_for_chunk(chunk, blocksize) {
            Ok(pair) => Some(pair),
            Err(err) => {
                debug!(error = %err, "model inference unavailable, keeping defaults");
                None
            }
        }
    }
}
