use candle_core::Device;

/// Device selection for loaded models.
#[derive(Clone, Debug)]
pub struct CandleBackend {
    device: Device,
}

impl CandleBackend {
    /// Picks CUDA device 0 when the build supports it, CPU otherwise.
    pub fn new() -> Result<Self, candle_core::Error> {
        let device = Device::cuda_if_available(0)?;
        Ok(Self { device })
    }

    pub fn with_device(device: Device) -> Self {
        Self { device }
    }

    pub fn cpu() -> Self {
        Self {
            device: Device::Cpu,
        }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn name(&self) -> &str {
        if self.device.is_cuda() {
            "candle-cuda"
        } else if self.device.is_metal() {
            "candle-metal"
        } else {
            "candle-cpu"
        }
    }
}

impl Default for CandleBackend {
    fn default() -> Self {
        Self::cpu()
    }
}
