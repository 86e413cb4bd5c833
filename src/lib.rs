//! Asynchronous GPU compute pipeline.
//!
//! A small graphics layer built around one pattern: a compute queue
//! producing textures while the graphics queue consumes them, with
//! cross-queue ordering expressed through submission ids instead of
//! CPU-side blocking.
//!
//! The entry point is [`GraphicsInstance`], which creates
//! [`GraphicsDevice`]s. A device exposes two queues
//! ([`QueueKind::Graphics`] and [`QueueKind::Compute`]) and resource
//! constructors; [`AsyncComputePass`] ties them together into a running
//! producer/consumer pair.
//!
//! ```no_run
//! use amaranth_graphics::{
//!     AsyncComputeConfig, AsyncComputePass, Framebuffer, GraphicsInstance,
//!     TextureDescriptor, TextureFormat, TextureUsage,
//! };
//!
//! # fn main() -> amaranth_graphics::GraphicsResult<()> {
//! let instance = GraphicsInstance::new()?;
//! let device = instance.create_device()?;
//!
//! let backbuffer = device.create_texture(&TextureDescriptor::new_2d(
//!     1280,
//!     720,
//!     TextureFormat::Bgra8Unorm,
//!     TextureUsage::RENDER_ATTACHMENT,
//! ))?;
//! let framebuffer = Framebuffer::for_texture(backbuffer)?;
//!
//! let mut pass = AsyncComputePass::new(device, AsyncComputeConfig::default())?;
//! for _ in 0..60 {
//!     pass.render(&framebuffer)?;
//! }
//! pass.shutdown();
//! # Ok(())
//! # }
//! ```

mod async_compute;
mod bindings;
mod command;
mod compute;
mod device;
mod error;
mod instance;
mod pipeline;
mod resources;
mod sync;
mod types;

pub use async_compute::{AsyncComputeConfig, AsyncComputePass};
pub use bindings::{
    BindingCache, BindingLayout, BindingLayoutDesc, BindingLayoutItem, BindingSet, BindingSetDesc,
    BindingSetItem, ShaderVisibility,
};
pub use command::{CommandList, CommandListParams, CommandSummary};
pub use compute::{ComputeWorker, ComputeWorkerConfig};
pub use device::{DeviceCapabilities, GraphicsDevice, SubmissionRecord};
pub use error::{GraphicsError, GraphicsResult};
pub use instance::{AdapterInfo, AdapterType, GraphicsInstance};
pub use pipeline::{
    ComputePipeline, ComputePipelineDescriptor, Framebuffer, FramebufferInfo, GraphicsPipeline,
    GraphicsPipelineDescriptor, PrimitiveTopology,
};
pub use resources::{Sampler, Texture, TextureQueue};
pub use sync::{CancellationToken, QueueKind, SubmissionId};
pub use types::{
    AddressMode, ClearValue, Extent3d, FilterMode, SamplerDescriptor, TextureDescriptor,
    TextureFormat, TextureUsage,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
