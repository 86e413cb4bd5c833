//! Graphics instance and adapter enumeration.
//!
//! The [`GraphicsInstance`] is the entry point of the crate: it enumerates
//! adapters and creates [`GraphicsDevice`]s. The instance runs entirely on
//! the CPU, so devices created from it work on machines without GPU
//! hardware (including CI); submissions are recorded and tracked rather
//! than executed by a driver.

use std::sync::{Arc, Weak};

use crate::device::GraphicsDevice;
use crate::error::{GraphicsError, GraphicsResult};

/// The type of a graphics adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdapterType {
    /// A discrete GPU.
    DiscreteGpu,
    /// An integrated GPU.
    IntegratedGpu,
    /// A software rasterizer.
    Cpu,
}

/// Description of an available graphics adapter.
#[derive(Debug, Clone)]
pub struct AdapterInfo {
    /// Human-readable adapter name.
    pub name: String,
    /// Adapter type.
    pub adapter_type: AdapterType,
}

/// Entry point for the graphics API.
///
/// Owns no GPU state itself; it hands out [`GraphicsDevice`]s that carry
/// a backreference to it.
pub struct GraphicsInstance {
    weak_self: Weak<GraphicsInstance>,
    adapters: Vec<AdapterInfo>,
}

impl GraphicsInstance {
    /// Create a new graphics instance.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::InitializationFailed`] if no adapter is
    /// available. The built-in CPU adapter is always present, so this only
    /// fails if enumeration itself breaks.
    pub fn new() -> GraphicsResult<Arc<Self>> {
        let adapters = vec![AdapterInfo {
            name: "CPU Reference Adapter".to_string(),
            adapter_type: AdapterType::Cpu,
        }];
        if adapters.is_empty() {
            return Err(GraphicsError::InitializationFailed(
                "no graphics adapters available".to_string(),
            ));
        }

        log::info!(
            "GraphicsInstance: initialized with {} adapter(s)",
            adapters.len()
        );

        Ok(Arc::new_cyclic(|weak_self| Self {
            weak_self: weak_self.clone(),
            adapters,
        }))
    }

    /// List the available adapters.
    pub fn enumerate_adapters(&self) -> &[AdapterInfo] {
        &self.adapters
    }

    /// Create a device on the first available adapter.
    pub fn create_device(&self) -> GraphicsResult<Arc<GraphicsDevice>> {
        let adapter = self
            .adapters
            .first()
            .ok_or_else(|| {
                GraphicsError::InitializationFailed("no graphics adapters available".to_string())
            })?;
        let instance = self.weak_self.upgrade().ok_or_else(|| {
            GraphicsError::InvalidState("graphics instance already dropped".to_string())
        })?;

        log::info!("GraphicsInstance: creating device on {:?}", adapter.name);
        Ok(Arc::new(GraphicsDevice::new(instance, adapter.name.clone())))
    }
}

impl std::fmt::Debug for GraphicsInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsInstance")
            .field("adapters", &self.adapters)
            .finish()
    }
}

static_assertions::assert_impl_all!(GraphicsInstance: Send, Sync);
