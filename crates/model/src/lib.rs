//! Model-guided codec/filter bootstrap.
//!
//! On the first chunk the tuner can ask a trained classifier which codec and
//! filter to start from, instead of sweeping the whole candidate product.
//! The pipeline: probe every block of the chunk ([`btune_probe`]), normalize
//! the `(cratio, cspeed)` features with externally supplied statistics,
//! classify each block, and let the blocks vote. The winning category maps
//! to a `(codec, filter)` pair through the same metadata file.
//!
//! Everything here fails soft: with no metadata or model configured, the
//! tuner simply keeps its default candidate sets.

pub mod error;
pub mod inference;
pub mod metadata;
pub mod predictor;

pub use error::ModelError;
pub use inference::ModelInference;
pub use metadata::{Metadata, NormStats, METADATA_ENV};
pub use predictor::{model_env, MlpPredictor, Predictor, NCODECS};
