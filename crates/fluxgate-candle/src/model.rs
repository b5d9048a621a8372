use crate::tensor::{rows_to_tensor, tensor_to_predictions};
use crate::{Architecture, ModelInfo};
use candle_core::{Device, Tensor};
use candle_nn::{Linear, Module, VarBuilder};
use fluxgate_core::{FeatureVector, Model, ModelError, ModelMetadata, Predictions};

enum Network {
    Linear(Linear),
    Mlp { fc1: Linear, fc2: Linear, fc3: Linear },
}

/// Tabular regressor: either a single affine layer or a three-layer
/// perceptron with ReLU activations.
pub struct CandleRegressor {
    network: Network,
    info: ModelInfo,
    device: Device,
}

impl CandleRegressor {
    pub fn new(info: ModelInfo, vb: VarBuilder, device: Device) -> candle_core::Result<Self> {
        let network = match info.architecture {
            Architecture::Linear => {
                Network::Linear(candle_nn::linear(
                    info.input_dim,
                    info.output_dim,
                    vb.pp("linear"),
                )?)
            }
            Architecture::Mlp => {
                let hidden = info.hidden_dim.unwrap_or(info.input_dim);
                Network::Mlp {
                    fc1: candle_nn::linear(info.input_dim, hidden, vb.pp("fc1"))?,
                    fc2: candle_nn::linear(hidden, hidden, vb.pp("fc2"))?,
                    fc3: candle_nn::linear(hidden, info.output_dim, vb.pp("fc3"))?,
                }
            }
        };
        Ok(Self {
            network,
            info,
            device,
        })
    }

    pub fn info(&self) -> &ModelInfo {
        &self.info
    }

    fn run(&self, input: &Tensor) -> candle_core::Result<Tensor> {
        match &self.network {
            Network::Linear(linear) => linear.forward(input),
            Network::Mlp { fc1, fc2, fc3 } => {
                let x = fc1.forward(input)?.relu()?;
                let x = fc2.forward(&x)?.relu()?;
                fc3.forward(&x)
            }
        }
    }
}

impl Model for CandleRegressor {
    fn name(&self) -> &str {
        &self.info.name
    }

    fn input_dim(&self) -> usize {
        self.info.input_dim
    }

    fn forward(&self, rows: &[FeatureVector]) -> Result<Predictions, ModelError> {
        let backend = |e: candle_core::Error| ModelError::Backend(e.to_string());
        let input = rows_to_tensor(rows, &self.device).map_err(backend)?;
        let output = self.run(&input).map_err(backend)?;
        tensor_to_predictions(&output).map_err(backend)
    }

    fn metadata(&self) -> ModelMetadata {
        let shape = match self.info.architecture {
            Architecture::Linear => format!("{} → {}", self.info.input_dim, self.info.output_dim),
            Architecture::Mlp => {
                let hidden = self.info.hidden_dim.unwrap_or(self.info.input_dim);
                format!(
                    "{} → {} → {} → {}",
                    self.info.input_dim, hidden, hidden, self.info.output_dim
                )
            }
        };
        ModelMetadata {
            name: self.info.name.clone(),
            version: self.info.version.clone(),
            description: format!("{} regressor ({})", self.info.architecture.as_str(), shape),
            tags: vec!["regression".to_string(), "tabular".to_string()],
            custom: Default::default(),
        }
    }
}
