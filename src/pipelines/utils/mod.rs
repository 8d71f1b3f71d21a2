//! Shared pipeline utilities: compute-device selection.

use candle_core::Device;

use crate::error::{EncoderError, Result};

/// Request for a specific device, used by pipeline builders.
#[derive(Debug, Clone, Default)]
pub enum DeviceRequest {
    /// Use CUDA if available, otherwise CPU (default behavior).
    #[default]
    Default,
    /// Force CPU even if CUDA is available.
    Cpu,
    /// Select a specific CUDA device by index.
    Cuda(usize),
}

impl DeviceRequest {
    /// Resolve the request into an actual [`Device`].
    pub fn resolve(self) -> Result<Device> {
        match self {
            DeviceRequest::Default => Ok(Device::new_cuda(0).unwrap_or(Device::Cpu)),
            DeviceRequest::Cpu => Ok(Device::Cpu),
            DeviceRequest::Cuda(i) => Device::new_cuda(i).map_err(|e| {
                EncoderError::Device(format!(
                    "failed to init CUDA device {i}: {e}. Try CPU as fallback."
                ))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_request_resolves_to_cpu() {
        let device = DeviceRequest::Cpu.resolve().unwrap();
        assert!(matches!(device, Device::Cpu));
    }

    #[test]
    fn default_request_always_resolves() {
        // Falls back to CPU on machines without CUDA.
        assert!(DeviceRequest::Default.resolve().is_ok());
    }
}
