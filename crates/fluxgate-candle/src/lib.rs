mod backend;
mod error;
mod loader;
mod model;
mod tensor;

pub use backend::CandleBackend;
pub use error::{Error, Result};
pub use loader::{Architecture, ModelInfo, ModelLoader, INFO_FILE, WEIGHTS_FILE};
pub use model::CandleRegressor;
pub use tensor::{rows_to_tensor, tensor_to_predictions};
