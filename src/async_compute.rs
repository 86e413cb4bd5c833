//! Async compute pass.
//!
//! [`AsyncComputePass`] overlaps compute and graphics work on the device's
//! two queues. A background [`ComputeWorker`] thread repeatedly fills
//! textures from a small pool; the render side picks up the freshest filled
//! texture, draws with it, and recycles the previous one back to the
//! worker. Two [`TextureQueue`]s carry the textures between the threads,
//! each entry tagged with the submission id the receiver must wait on
//! before touching the texture.

use std::sync::Arc;
use std::thread::JoinHandle;

use crate::bindings::{BindingCache, BindingLayout, BindingLayoutDesc, BindingSetDesc, ShaderVisibility};
use crate::command::{CommandList, CommandListParams};
use crate::compute::{ComputeWorker, ComputeWorkerConfig};
use crate::device::GraphicsDevice;
use crate::error::{GraphicsError, GraphicsResult};
use crate::pipeline::{
    Framebuffer, GraphicsPipeline, GraphicsPipelineDescriptor, PrimitiveTopology,
};
use crate::resources::{Sampler, Texture, TextureQueue};
use crate::sync::{CancellationToken, QueueKind, SubmissionId};
use crate::types::{ClearValue, TextureDescriptor, TextureFormat, TextureUsage};

/// Configuration for an [`AsyncComputePass`].
#[derive(Debug, Clone)]
pub struct AsyncComputeConfig {
    /// Dimensions of the pooled textures.
    pub texture_size: (u32, u32),
    /// Format of the pooled textures.
    pub format: TextureFormat,
    /// Number of textures cycling between the two queues. Two is enough to
    /// keep both queues busy; more adds latency without throughput.
    pub pool_size: usize,
    /// Worker loop settings.
    pub worker: ComputeWorkerConfig,
    /// Backbuffer clear color.
    pub clear_color: ClearValue,
}

impl Default for AsyncComputeConfig {
    fn default() -> Self {
        Self {
            texture_size: (512, 512),
            format: TextureFormat::Rgba8Unorm,
            pool_size: 2,
            worker: ComputeWorkerConfig::default(),
            clear_color: ClearValue::BLACK,
        }
    }
}

impl AsyncComputeConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> GraphicsResult<()> {
        if self.texture_size.0 == 0 || self.texture_size.1 == 0 {
            return Err(GraphicsError::InvalidParameter(
                "texture dimensions cannot be zero".to_string(),
            ));
        }
        // The render side keeps one texture until the next fill arrives, so
        // a single-texture pool would starve the worker permanently.
        if self.pool_size < 2 {
            return Err(GraphicsError::InvalidParameter(
                "texture pool needs at least two textures".to_string(),
            ));
        }
        self.worker.validate()
    }
}

/// Consumer side and lifecycle owner of the async compute pipeline.
///
/// Created with [`new`](AsyncComputePass::new), which seeds the texture
/// pool and spawns the worker thread. Call
/// [`render`](AsyncComputePass::render) once per frame;
/// [`shutdown`](AsyncComputePass::shutdown) (or drop) stops the worker.
pub struct AsyncComputePass {
    device: Arc<GraphicsDevice>,
    config: AsyncComputeConfig,
    /// render -> compute.
    free_textures: Arc<TextureQueue>,
    /// compute -> render.
    filled_textures: Arc<TextureQueue>,
    cancellation: CancellationToken,
    worker_thread: Option<JoinHandle<()>>,
    /// Texture currently drawn from, if a compute result arrived yet.
    current_texture: Option<Arc<Texture>>,
    /// Id of the last graphics submission that sampled `current_texture`.
    last_render_use: SubmissionId,
    binding_layout: Arc<BindingLayout>,
    binding_cache: BindingCache,
    sampler: Arc<Sampler>,
    command_list: CommandList,
    /// Built lazily against the backbuffer shape, reset on resize.
    graphics_pipeline: Option<Arc<GraphicsPipeline>>,
}

impl AsyncComputePass {
    /// Create the pass and start the compute worker thread.
    pub fn new(device: Arc<GraphicsDevice>, config: AsyncComputeConfig) -> GraphicsResult<Self> {
        let mut pass = Self::new_without_worker(device, config)?;

        let mut worker = ComputeWorker::new(
            pass.device.clone(),
            pass.config.worker.clone(),
            pass.free_textures.clone(),
            pass.filled_textures.clone(),
            pass.cancellation.clone(),
        )?;
        let thread = std::thread::Builder::new()
            .name("compute-worker".to_string())
            .spawn(move || {
                if let Err(error) = worker.run() {
                    log::error!("ComputeWorker: stopped with error: {error}");
                }
            })
            .map_err(|e| {
                GraphicsError::InitializationFailed(format!("failed to spawn worker thread: {e}"))
            })?;
        pass.worker_thread = Some(thread);

        Ok(pass)
    }

    /// Create the pass without spawning the worker thread.
    ///
    /// The texture pool is seeded and both queues are live, so the caller
    /// can drive a [`ComputeWorker`] manually. Used when the producer
    /// cadence must be controlled externally.
    pub fn new_without_worker(
        device: Arc<GraphicsDevice>,
        config: AsyncComputeConfig,
    ) -> GraphicsResult<Self> {
        config.validate()?;

        let free_textures = Arc::new(TextureQueue::new());
        let filled_textures = Arc::new(TextureQueue::new());

        // Seed the pool; nothing has rendered from these yet.
        let descriptor = TextureDescriptor::new_2d(
            config.texture_size.0,
            config.texture_size.1,
            config.format,
            TextureUsage::STORAGE_BINDING | TextureUsage::TEXTURE_BINDING,
        )
        .with_label("async_compute_pool");
        for _ in 0..config.pool_size {
            let texture = device.create_texture(&descriptor)?;
            free_textures.push(texture, SubmissionId::NONE);
        }

        let binding_layout = device.create_binding_layout(
            &BindingLayoutDesc::new(ShaderVisibility::Pixel)
                .with_label("async_compute_blit")
                .add_texture(0)
                .add_sampler(0),
        )?;
        let sampler = device.create_sampler(
            &crate::types::SamplerDescriptor::linear().with_label("async_compute_blit"),
        )?;
        let command_list = device.create_command_list(
            CommandListParams::new(QueueKind::Graphics).with_label("async_compute_render"),
        )?;

        log::info!(
            "AsyncComputePass: pool of {} texture(s), {}x{} {:?}",
            config.pool_size,
            config.texture_size.0,
            config.texture_size.1,
            config.format
        );

        Ok(Self {
            binding_cache: BindingCache::new(device.clone()),
            device,
            config,
            free_textures,
            filled_textures,
            cancellation: CancellationToken::new(),
            worker_thread: None,
            current_texture: None,
            last_render_use: SubmissionId::NONE,
            binding_layout,
            sampler,
            command_list,
            graphics_pipeline: None,
        })
    }

    /// Render one frame into `framebuffer`.
    ///
    /// Picks up the oldest filled texture if one is ready, recycling the
    /// previously displayed one to the worker; otherwise keeps drawing the
    /// current texture. Before the first compute result arrives the frame
    /// is clear-only. Never blocks on the worker. Returns the id of the
    /// graphics submission.
    pub fn render(&mut self, framebuffer: &Framebuffer) -> GraphicsResult<SubmissionId> {
        self.device.run_deferred_cleanup(QueueKind::Graphics);

        if let Some((texture, fill_id)) = self.filled_textures.try_pop() {
            if let Some(previous) = self.current_texture.take() {
                self.free_textures.push(previous, self.last_render_use);
            }
            // The new texture was written on the compute queue.
            self.device
                .queue_wait_for(QueueKind::Graphics, QueueKind::Compute, fill_id);
            self.current_texture = Some(texture);
        }

        let pipeline = match &self.graphics_pipeline {
            Some(pipeline) => pipeline.clone(),
            None => {
                let pipeline = self.device.create_graphics_pipeline(
                    &GraphicsPipelineDescriptor::new("main_vs", "main_ps")
                        .with_label("async_compute_blit")
                        .with_topology(PrimitiveTopology::TriangleStrip)
                        .with_depth_test(false)
                        .with_binding_layout(self.binding_layout.clone()),
                    framebuffer.info(),
                )?;
                self.graphics_pipeline = Some(pipeline.clone());
                pipeline
            }
        };

        self.command_list.open()?;
        self.command_list
            .clear_color(framebuffer, self.config.clear_color)?;

        if let Some(texture) = &self.current_texture {
            let bindings = self.binding_cache.get_or_create(
                &BindingSetDesc::new()
                    .with_texture(0, texture.clone())
                    .with_sampler(0, self.sampler.clone()),
                &self.binding_layout,
            )?;
            self.command_list.set_graphics_state(pipeline, bindings)?;
            // Fullscreen quad as a triangle strip.
            self.command_list.draw(4)?;
        }

        self.command_list.close()?;
        let id = self.device.execute_command_list(&mut self.command_list)?;
        self.last_render_use = id;
        Ok(id)
    }

    /// Drop the lazily built graphics pipeline; the next
    /// [`render`](Self::render) rebuilds it against the new backbuffer.
    pub fn handle_resize(&mut self) {
        self.graphics_pipeline = None;
    }

    /// Stop the worker thread and wait for it to finish.
    ///
    /// An iteration already past its cancellation check completes and its
    /// submission stays valid. Idempotent; also runs on drop.
    pub fn shutdown(&mut self) {
        self.cancellation.cancel();
        if let Some(thread) = self.worker_thread.take() {
            log::info!("AsyncComputePass: joining worker thread");
            if thread.join().is_err() {
                log::error!("AsyncComputePass: worker thread panicked");
            }
        }
    }

    /// Texture currently being drawn from, if any compute result arrived.
    pub fn current_texture(&self) -> Option<&Arc<Texture>> {
        self.current_texture.as_ref()
    }

    /// Queue of free textures waiting for the compute worker.
    pub fn free_textures(&self) -> &Arc<TextureQueue> {
        &self.free_textures
    }

    /// Queue of filled textures waiting for the render side.
    pub fn filled_textures(&self) -> &Arc<TextureQueue> {
        &self.filled_textures
    }

    /// Cancellation token shared with the worker.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }
}

impl Drop for AsyncComputePass {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for AsyncComputePass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncComputePass")
            .field("pool_size", &self.config.pool_size)
            .field("worker_running", &self.worker_thread.is_some())
            .finish()
    }
}

static_assertions::assert_impl_all!(AsyncComputePass: Send);
