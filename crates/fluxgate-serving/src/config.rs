use std::path::PathBuf;

pub struct ServingConfig {
    pub model_dir: PathBuf,
    pub endpoint_name: String,
    pub host: String,
    pub port: u16,
    pub use_gpu: bool,
}

impl Default for ServingConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("/opt/ml/model"),
            endpoint_name: "fluxgate-endpoint".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8080,
            use_gpu: false,
        }
    }
}

impl ServingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_model_dir(mut self, model_dir: impl Into<PathBuf>) -> Self {
        self.model_dir = model_dir.into();
        self
    }

    pub fn with_endpoint_name(mut self, name: impl Into<String>) -> Self {
        self.endpoint_name = name.into();
        self
    }

    pub fn with_bind(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    pub fn with_gpu(mut self, enable: bool) -> Self {
        self.use_gpu = enable;
        self
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
