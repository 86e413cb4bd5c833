//! GPU resources.
//!
//! This module contains the GPU resource types created by
//! [`GraphicsDevice`], plus the queue used to hand them off between
//! threads:
//! - [`Texture`] - GPU texture/image
//! - [`Sampler`] - Texture sampler
//! - [`TextureQueue`] - Cross-thread texture handoff FIFO
//!
//! Resources are reference-counted with [`Arc`] and can be shared across
//! threads. Each resource holds a strong reference back to its parent
//! device.
//!
//! [`GraphicsDevice`]: crate::GraphicsDevice
//! [`Arc`]: std::sync::Arc

mod sampler;
mod texture;
mod texture_queue;

pub use sampler::Sampler;
pub use texture::Texture;
pub use texture_queue::TextureQueue;
