pub mod codec;
pub mod error;
pub mod model;
pub mod payload;

pub use codec::{AcceptType, ContentType};
pub use error::{CodecError, ModelError};
pub use model::{Model, ModelMetadata};
pub use payload::{EntityId, FeatureVector, Payload, Predictions};
