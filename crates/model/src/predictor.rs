//! The classifier behind the first-chunk bootstrap.
//!
//! The tuner only needs a narrow capability: score the codec categories for
//! one `[cratio, cspeed]` feature pair. [`MlpPredictor`] is a small dense
//! network whose weights are loaded from a JSON file; anything else that can
//! produce the score vector plugs in through [`Predictor`].

use crate::error::ModelError;
use btune_core::CompMode;
use ndarray::{Array1, Array2};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Number of codec categories the classifier scores.
pub const NCODECS: usize = 15;

/// Score the categories for one feature pair; the caller takes the argmax.
pub trait Predictor {
    fn predict(&self, features: [f32; 2]) -> [f32; NCODECS];
}

/// Environment variable holding the model path for the given mode.
pub fn model_env(comp_mode: CompMode) -> &'static str {
    match comp_mode {
        CompMode::Hsp => "BTUNE_MODEL_HSP",
        CompMode::Balanced => "BTUNE_MODEL_BALANCED",
        CompMode::Hcr => "BTUNE_MODEL_HCR",
    }
}

#[derive(Debug, Deserialize)]
struct RawLayer {
    weights: Vec<Vec<f32>>,
    bias: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct RawModel {
    layers: Vec<RawLayer>,
}

struct DenseLayer {
    // (out, in)
    weights: Array2<f32>,
    bias: Array1<f32>,
}

/// Dense network with ReLU between layers and a linear output layer.
pub struct MlpPredictor {
    layers: Vec<DenseLayer>,
}

impl MlpPredictor {
    /// Load weights from a JSON file of the form
    /// `{"layers": [{"weights": [[..], ..], "bias": [..]}, ..]}` where each
    /// weights row holds one output unit. Input width must be 2 and output
    /// width [`NCODECS`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let blob = fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let raw: RawModel = serde_json::from_str(&blob)?;
        Self::from_raw(raw)
    }

    /// Load from the environment variable for the given mode.
    pub fn from_env(comp_mode: CompMode) -> Result<Self, ModelError> {
        let env = model_env(comp_mode);
        let path = std::env::var(env).map_err(|_| ModelError::MissingEnv(env))?;
        Self::load(path)
    }

    fn from_raw(raw: RawModel) -> Result<Self, ModelError> {
        if raw.layers.is_empty() {
            return Err(ModelError::Shape("model has no layers".into()));
        }
        let mut layers = Vec::with_capacity(raw.layers.len());
        let mut width = 2;
        for (i, layer) in raw.layers.into_iter().enumerate() {
            let rows = layer.weights.len();
            let cols = layer.weights.first().map_or(0, Vec::len);
            if rows == 0 || cols != width {
                return Err(ModelError::Shape(format!(
                    "layer {} expects input width {}, weights are {}x{}",
                    i, width, rows, cols
                )));
            }
            if layer.weights.iter().any(|row| row.len() != cols) {
                return Err(ModelError::Shape(format!("layer {} rows are ragged", i)));
            }
            if layer.bias.len() != rows {
                return Err(ModelError::Shape(format!(
                    "layer {} bias length {} does not match {} units",
                    i,
                    layer.bias.len(),
                    rows
                )));
            }
            let flat: Vec<f32> = layer.weights.into_iter().flatten().collect();
            layers.push(DenseLayer {
                weights: Array2::from_shape_vec((rows, cols), flat)
                    .map_err(|e| ModelError::Shape(e.to_string()))?,
                bias: Array1::from_vec(layer.bias),
            });
            width = rows;
        }
        if width != NCODECS {
            return Err(ModelError::Shape(format!(
                "output width is {}, expected {}",
                width, NCODECS
            )));
        }
        Ok(Self { layers })
    }
}

impl Predictor for MlpPredictor {
    fn predict(&self, features: [f32; 2]) -> [f32; NCODECS] {
        let mut activations = Array1::from_vec(features.to_vec());
        let last = self.layers.len() - 1;
        for (i, layer) in self.layers.iter().enumerate() {
            activations = layer.weights.dot(&activations) + &layer.bias;
            if i != last {
                activations.mapv_inplace(|v| v.max(0.0));
            }
        }
        let mut scores = [0.0; NCODECS];
        for (out, v) in scores.iter_mut().zip(activations.iter()) {
            *out = *v;
        }
        scores
    }
}
