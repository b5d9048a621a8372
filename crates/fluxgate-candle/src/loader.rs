//! Loads a model directory: `model_info.json` next to `model.safetensors`.

use crate::{CandleBackend, CandleRegressor, Error, Result};
use candle_core::DType;
use candle_nn::VarBuilder;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const INFO_FILE: &str = "model_info.json";
pub const WEIGHTS_FILE: &str = "model.safetensors";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    Linear,
    Mlp,
}

impl Architecture {
    pub fn as_str(&self) -> &str {
        match self {
            Architecture::Linear => "linear",
            Architecture::Mlp => "mlp",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    pub architecture: Architecture,
    pub input_dim: usize,
    #[serde(default)]
    pub hidden_dim: Option<usize>,
    #[serde(default = "default_output_dim")]
    pub output_dim: usize,
}

fn default_version() -> String {
    "1".to_string()
}

fn default_output_dim() -> usize {
    1
}

pub struct ModelLoader {
    model_dir: PathBuf,
    backend: CandleBackend,
}

impl ModelLoader {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
            backend: CandleBackend::default(),
        }
    }

    pub fn with_backend(mut self, backend: CandleBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    pub fn read_info(&self) -> Result<ModelInfo> {
        let content = std::fs::read_to_string(self.model_dir.join(INFO_FILE))?;
        let info: ModelInfo = serde_json::from_str(&content)?;
        if info.input_dim == 0 || info.output_dim == 0 {
            return Err(Error::InvalidModel(format!(
                "dimensions must be positive (input_dim={}, output_dim={})",
                info.input_dim, info.output_dim
            )));
        }
        Ok(info)
    }

    /// Weights are memory-mapped rather than read into a buffer.
    pub fn load(&self) -> Result<CandleRegressor> {
        let info = self.read_info()?;
        let weights = self.model_dir.join(WEIGHTS_FILE);
        if !weights.exists() {
            return Err(Error::InvalidModel(format!(
                "weights not found: {}",
                weights.display()
            )));
        }

        tracing::info!(
            model = %info.name,
            architecture = info.architecture.as_str(),
            device = self.backend.name(),
            path = %weights.display(),
            "Loading model weights"
        );

        let device = self.backend.device().clone();
        // SAFETY: the weights file is treated as immutable for the lifetime of the process.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights], DType::F32, &device)? };
        Ok(CandleRegressor::new(info, vb, device)?)
    }
}
