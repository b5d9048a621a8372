mod config;
mod error;
mod runtime;
mod server;

pub use config::ServingConfig;
pub use error::{Error, Result};
pub use runtime::{ServingRuntime, SharedModel};
pub use server::create_app;
