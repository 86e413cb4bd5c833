//! Pipeline state objects and render targets.
//!
//! Shader compilation happens outside this crate; pipeline descriptors
//! reference compiled shader entry points by name. Graphics pipelines are
//! bound to a [`FramebufferInfo`] at creation, which is why the render loop
//! recreates them lazily after a display-surface resize.

use std::sync::Arc;

use crate::bindings::BindingLayout;
use crate::device::GraphicsDevice;
use crate::error::{GraphicsError, GraphicsResult};
use crate::resources::Texture;
use crate::types::{TextureFormat, TextureUsage};

/// Primitive topology for graphics pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    /// Independent triangles.
    #[default]
    TriangleList,
    /// Triangle strip.
    TriangleStrip,
}

/// Descriptor for creating a [`ComputePipeline`].
#[derive(Debug, Clone)]
pub struct ComputePipelineDescriptor {
    /// Debug label.
    pub label: Option<String>,
    /// Compute shader entry point.
    pub entry_point: String,
    /// Binding layouts consumed by the shader.
    pub binding_layouts: Vec<Arc<BindingLayout>>,
}

impl ComputePipelineDescriptor {
    /// Create a descriptor for the given compute entry point.
    pub fn new(entry_point: impl Into<String>) -> Self {
        Self {
            label: None,
            entry_point: entry_point.into(),
            binding_layouts: Vec::new(),
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Add a binding layout.
    pub fn with_binding_layout(mut self, layout: Arc<BindingLayout>) -> Self {
        self.binding_layouts.push(layout);
        self
    }
}

/// A compute pipeline state object.
///
/// Created by [`GraphicsDevice::create_compute_pipeline`].
pub struct ComputePipeline {
    device: Arc<GraphicsDevice>,
    desc: ComputePipelineDescriptor,
}

impl ComputePipeline {
    pub(crate) fn new(device: Arc<GraphicsDevice>, desc: ComputePipelineDescriptor) -> Self {
        Self { device, desc }
    }

    /// Get the parent device.
    pub fn device(&self) -> &Arc<GraphicsDevice> {
        &self.device
    }

    /// Get the pipeline descriptor.
    pub fn desc(&self) -> &ComputePipelineDescriptor {
        &self.desc
    }
}

impl std::fmt::Debug for ComputePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputePipeline")
            .field("label", &self.desc.label)
            .field("entry_point", &self.desc.entry_point)
            .finish()
    }
}

/// Descriptor for creating a [`GraphicsPipeline`].
#[derive(Debug, Clone)]
pub struct GraphicsPipelineDescriptor {
    /// Debug label.
    pub label: Option<String>,
    /// Vertex shader entry point.
    pub vertex_entry: String,
    /// Pixel shader entry point.
    pub pixel_entry: String,
    /// Primitive topology.
    pub topology: PrimitiveTopology,
    /// Whether depth testing is enabled.
    pub depth_test: bool,
    /// Binding layouts consumed by the shaders.
    pub binding_layouts: Vec<Arc<BindingLayout>>,
}

impl GraphicsPipelineDescriptor {
    /// Create a descriptor for the given vertex/pixel entry points.
    pub fn new(vertex_entry: impl Into<String>, pixel_entry: impl Into<String>) -> Self {
        Self {
            label: None,
            vertex_entry: vertex_entry.into(),
            pixel_entry: pixel_entry.into(),
            topology: PrimitiveTopology::default(),
            depth_test: true,
            binding_layouts: Vec::new(),
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the primitive topology.
    pub fn with_topology(mut self, topology: PrimitiveTopology) -> Self {
        self.topology = topology;
        self
    }

    /// Enable or disable depth testing.
    pub fn with_depth_test(mut self, enabled: bool) -> Self {
        self.depth_test = enabled;
        self
    }

    /// Add a binding layout.
    pub fn with_binding_layout(mut self, layout: Arc<BindingLayout>) -> Self {
        self.binding_layouts.push(layout);
        self
    }
}

/// Shape of a render target a graphics pipeline is compatible with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FramebufferInfo {
    /// Target width in pixels.
    pub width: u32,
    /// Target height in pixels.
    pub height: u32,
    /// Color attachment format.
    pub color_format: TextureFormat,
}

/// A render target wrapping a color attachment texture.
///
/// Stands in for the swapchain image the enclosing application would
/// provide; the render loop only needs its [`FramebufferInfo`] and the
/// attachment for clear/draw recording.
#[derive(Debug, Clone)]
pub struct Framebuffer {
    info: FramebufferInfo,
    color: Arc<Texture>,
}

impl Framebuffer {
    /// Wrap a texture as a single-attachment framebuffer.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::InvalidParameter`] if the texture was not
    /// created with `RENDER_ATTACHMENT` usage.
    pub fn for_texture(color: Arc<Texture>) -> GraphicsResult<Self> {
        if !color.usage().contains(TextureUsage::RENDER_ATTACHMENT) {
            return Err(GraphicsError::InvalidParameter(format!(
                "texture {:?} lacks RENDER_ATTACHMENT usage",
                color.label()
            )));
        }
        let info = FramebufferInfo {
            width: color.width(),
            height: color.height(),
            color_format: color.format(),
        };
        Ok(Self { info, color })
    }

    /// Get the framebuffer shape.
    pub fn info(&self) -> &FramebufferInfo {
        &self.info
    }

    /// Get the color attachment.
    pub fn color(&self) -> &Arc<Texture> {
        &self.color
    }
}

/// A graphics pipeline state object, bound to a framebuffer shape.
///
/// Created by [`GraphicsDevice::create_graphics_pipeline`].
pub struct GraphicsPipeline {
    device: Arc<GraphicsDevice>,
    desc: GraphicsPipelineDescriptor,
    framebuffer_info: FramebufferInfo,
}

impl GraphicsPipeline {
    pub(crate) fn new(
        device: Arc<GraphicsDevice>,
        desc: GraphicsPipelineDescriptor,
        framebuffer_info: FramebufferInfo,
    ) -> Self {
        Self {
            device,
            desc,
            framebuffer_info,
        }
    }

    /// Get the parent device.
    pub fn device(&self) -> &Arc<GraphicsDevice> {
        &self.device
    }

    /// Get the pipeline descriptor.
    pub fn desc(&self) -> &GraphicsPipelineDescriptor {
        &self.desc
    }

    /// The framebuffer shape this pipeline was created for.
    pub fn framebuffer_info(&self) -> &FramebufferInfo {
        &self.framebuffer_info
    }
}

impl std::fmt::Debug for GraphicsPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsPipeline")
            .field("label", &self.desc.label)
            .field("topology", &self.desc.topology)
            .field("framebuffer", &self.framebuffer_info)
            .finish()
    }
}

static_assertions::assert_impl_all!(ComputePipeline: Send, Sync);
static_assertions::assert_impl_all!(GraphicsPipeline: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::GraphicsInstance;
    use crate::types::TextureDescriptor;

    fn create_test_device() -> Arc<GraphicsDevice> {
        let instance = GraphicsInstance::new().unwrap();
        instance.create_device().unwrap()
    }

    #[test]
    fn test_framebuffer_requires_attachment_usage() {
        let device = create_test_device();
        let texture = device
            .create_texture(&TextureDescriptor::new_2d(
                64,
                64,
                TextureFormat::Rgba8Unorm,
                TextureUsage::TEXTURE_BINDING,
            ))
            .unwrap();
        assert!(matches!(
            Framebuffer::for_texture(texture),
            Err(GraphicsError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_framebuffer_info() {
        let device = create_test_device();
        let texture = device
            .create_texture(&TextureDescriptor::new_2d(
                640,
                480,
                TextureFormat::Bgra8Unorm,
                TextureUsage::RENDER_ATTACHMENT,
            ))
            .unwrap();
        let framebuffer = Framebuffer::for_texture(texture).unwrap();
        assert_eq!(framebuffer.info().width, 640);
        assert_eq!(framebuffer.info().height, 480);
        assert_eq!(framebuffer.info().color_format, TextureFormat::Bgra8Unorm);
    }

    #[test]
    fn test_graphics_pipeline_creation() {
        let device = create_test_device();
        let desc = GraphicsPipelineDescriptor::new("main_vs", "main_ps")
            .with_label("fullscreen")
            .with_topology(PrimitiveTopology::TriangleStrip)
            .with_depth_test(false);
        let info = FramebufferInfo {
            width: 800,
            height: 600,
            color_format: TextureFormat::Rgba8Unorm,
        };
        let pipeline = device.create_graphics_pipeline(&desc, &info).unwrap();
        assert_eq!(pipeline.desc().topology, PrimitiveTopology::TriangleStrip);
        assert_eq!(pipeline.framebuffer_info().width, 800);
        assert!(!pipeline.desc().depth_test);
    }
}
