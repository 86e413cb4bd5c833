//! Texture sampler resource.

use std::sync::Arc;

use crate::device::GraphicsDevice;
use crate::types::SamplerDescriptor;

/// A texture sampler.
///
/// Created by [`GraphicsDevice::create_sampler`] and reference-counted.
pub struct Sampler {
    device: Arc<GraphicsDevice>,
    descriptor: SamplerDescriptor,
}

impl Sampler {
    /// Create a new sampler (called by GraphicsDevice).
    pub(crate) fn new(device: Arc<GraphicsDevice>, descriptor: SamplerDescriptor) -> Self {
        Self { device, descriptor }
    }

    /// Get the parent device.
    pub fn device(&self) -> &Arc<GraphicsDevice> {
        &self.device
    }

    /// Get the sampler descriptor.
    pub fn descriptor(&self) -> &SamplerDescriptor {
        &self.descriptor
    }

    /// Get the sampler label, if set.
    pub fn label(&self) -> Option<&str> {
        self.descriptor.label.as_deref()
    }
}

impl std::fmt::Debug for Sampler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sampler")
            .field("label", &self.descriptor.label)
            .field("mag_filter", &self.descriptor.mag_filter)
            .field("min_filter", &self.descriptor.min_filter)
            .finish()
    }
}

static_assertions::assert_impl_all!(Sampler: Send, Sync);

#[cfg(test)]
mod tests {
    use crate::instance::GraphicsInstance;
    use crate::types::{FilterMode, SamplerDescriptor};

    #[test]
    fn test_create_sampler() {
        let instance = GraphicsInstance::new().unwrap();
        let device = instance.create_device().unwrap();
        let sampler = device
            .create_sampler(&SamplerDescriptor::linear().with_label("linear"))
            .unwrap();
        assert_eq!(sampler.label(), Some("linear"));
        assert_eq!(sampler.descriptor().mag_filter, FilterMode::Linear);
    }
}
