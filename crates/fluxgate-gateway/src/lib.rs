pub mod config;
mod error;
pub mod orchestrator;
pub mod request;
pub mod response;
mod server;

pub use config::{ConfigError, GatewayConfig, RequestMode};
pub use error::GatewayError;
pub use orchestrator::{Gateway, Stage};
pub use request::{GatewayEvent, InferenceRequest};
pub use response::{GatewayResponse, InferenceResponse};
pub use server::create_app;
