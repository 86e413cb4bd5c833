//! Compute worker loop.
//!
//! The [`ComputeWorker`] runs on a dedicated thread at a fixed cadence.
//! Each iteration it takes a free texture from the inbound queue, records a
//! compute dispatch that fills it, submits the batch to the compute queue,
//! and hands the texture to the render side together with the submission id
//! the consumer must wait on before sampling it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytemuck::{Pod, Zeroable};

use crate::bindings::{BindingCache, BindingLayout, BindingLayoutDesc, BindingSetDesc, ShaderVisibility};
use crate::command::{CommandList, CommandListParams};
use crate::device::GraphicsDevice;
use crate::error::{GraphicsError, GraphicsResult};
use crate::pipeline::{ComputePipeline, ComputePipelineDescriptor};
use crate::resources::TextureQueue;
use crate::sync::{CancellationToken, QueueKind};

/// Push constants for the fill shader, one `u32` frame counter.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct FillConstants {
    frame_index: u32,
}

/// Configuration for the compute worker.
#[derive(Debug, Clone)]
pub struct ComputeWorkerConfig {
    /// Target time between iterations. Work shorter than the interval is
    /// padded with sleep; work longer than it is not compensated for.
    pub interval: Duration,
    /// Thread-group counts of the fill dispatch.
    pub dispatch_groups: (u32, u32),
}

impl Default for ComputeWorkerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(10),
            dispatch_groups: (64, 64),
        }
    }
}

impl ComputeWorkerConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> GraphicsResult<()> {
        if self.interval.is_zero() {
            return Err(GraphicsError::InvalidParameter(
                "worker interval cannot be zero".to_string(),
            ));
        }
        if self.dispatch_groups.0 == 0 || self.dispatch_groups.1 == 0 {
            return Err(GraphicsError::InvalidParameter(
                "dispatch group counts cannot be zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Producer side of the async compute pipeline.
///
/// Construct with [`ComputeWorker::new`] and drive with
/// [`run`](ComputeWorker::run) on a dedicated thread, or step manually
/// with [`iteration`](ComputeWorker::iteration) for deterministic tests.
pub struct ComputeWorker {
    device: Arc<GraphicsDevice>,
    config: ComputeWorkerConfig,
    pipeline: Arc<ComputePipeline>,
    layout: Arc<BindingLayout>,
    binding_cache: BindingCache,
    command_list: CommandList,
    /// render -> compute: free textures with their last render use.
    inbound: Arc<TextureQueue>,
    /// compute -> render: filled textures with their fill submission id.
    outbound: Arc<TextureQueue>,
    cancellation: CancellationToken,
    frame_index: u32,
}

impl ComputeWorker {
    /// Create a worker and its compute pipeline.
    pub fn new(
        device: Arc<GraphicsDevice>,
        config: ComputeWorkerConfig,
        inbound: Arc<TextureQueue>,
        outbound: Arc<TextureQueue>,
        cancellation: CancellationToken,
    ) -> GraphicsResult<Self> {
        config.validate()?;

        let layout = device.create_binding_layout(
            &BindingLayoutDesc::new(ShaderVisibility::Compute)
                .with_label("compute_fill")
                .add_push_constants(0, std::mem::size_of::<FillConstants>() as u32)
                .add_storage_texture(0),
        )?;
        let pipeline = device.create_compute_pipeline(
            &ComputePipelineDescriptor::new("main_cs")
                .with_label("compute_fill")
                .with_binding_layout(layout.clone()),
        )?;
        let command_list = device.create_command_list(
            CommandListParams::new(QueueKind::Compute).with_label("compute_fill"),
        )?;

        Ok(Self {
            binding_cache: BindingCache::new(device.clone()),
            device,
            config,
            pipeline,
            layout,
            command_list,
            inbound,
            outbound,
            cancellation,
            frame_index: 0,
        })
    }

    /// Number of iterations completed so far.
    pub fn frame_index(&self) -> u32 {
        self.frame_index
    }

    /// Run iterations at the configured cadence until cancelled.
    pub fn run(&mut self) -> GraphicsResult<()> {
        log::info!(
            "ComputeWorker: starting, interval={:?}, groups={}x{}",
            self.config.interval,
            self.config.dispatch_groups.0,
            self.config.dispatch_groups.1
        );

        while !self.cancellation.is_cancelled() {
            let deadline = Instant::now() + self.config.interval;
            if !self.iteration()? {
                break;
            }
            let now = Instant::now();
            if now < deadline {
                std::thread::sleep(deadline - now);
            }
        }

        log::info!(
            "ComputeWorker: stopped after {} iteration(s)",
            self.frame_index
        );
        Ok(())
    }

    /// Run a single iteration.
    ///
    /// Returns `Ok(false)` if cancellation was observed while waiting for a
    /// free texture, before any work was submitted. Once a texture has been
    /// taken the iteration runs to completion so the texture is never lost.
    pub fn iteration(&mut self) -> GraphicsResult<bool> {
        self.device.run_deferred_cleanup(QueueKind::Compute);

        // Wait for the render side to hand back a texture. Both queues hold
        // textures briefly, so yield rather than block.
        let (texture, last_render_use) = loop {
            if self.cancellation.is_cancelled() {
                return Ok(false);
            }
            match self.inbound.try_pop() {
                Some(entry) => break entry,
                None => std::thread::yield_now(),
            }
        };

        // The texture may still be read by an in-flight draw.
        self.device
            .queue_wait_for(QueueKind::Compute, QueueKind::Graphics, last_render_use);

        let bindings = self.binding_cache.get_or_create(
            &BindingSetDesc::new().with_storage_texture(0, texture.clone()),
            &self.layout,
        )?;

        let constants = FillConstants {
            frame_index: self.frame_index,
        };

        self.command_list.open()?;
        self.command_list
            .set_compute_state(self.pipeline.clone(), bindings)?;
        self.command_list
            .set_push_constants(bytemuck::bytes_of(&constants))?;
        self.command_list
            .dispatch(self.config.dispatch_groups.0, self.config.dispatch_groups.1)?;
        self.command_list.close()?;

        let id = self.device.execute_command_list(&mut self.command_list)?;
        debug_assert!(id.is_some());

        self.outbound.push(texture, id);
        self.frame_index = self.frame_index.wrapping_add(1);

        log::trace!("ComputeWorker: iteration {} submitted as {id}", self.frame_index);
        Ok(true)
    }
}

static_assertions::assert_impl_all!(ComputeWorker: Send);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::GraphicsInstance;
    use crate::sync::SubmissionId;
    use crate::types::{TextureDescriptor, TextureFormat, TextureUsage};

    fn setup() -> (Arc<GraphicsDevice>, Arc<TextureQueue>, Arc<TextureQueue>, ComputeWorker) {
        let instance = GraphicsInstance::new().unwrap();
        let device = instance.create_device().unwrap();
        let inbound = Arc::new(TextureQueue::new());
        let outbound = Arc::new(TextureQueue::new());
        let worker = ComputeWorker::new(
            device.clone(),
            ComputeWorkerConfig::default(),
            inbound.clone(),
            outbound.clone(),
            CancellationToken::new(),
        )
        .unwrap();
        (device, inbound, outbound, worker)
    }

    fn seed_texture(device: &Arc<GraphicsDevice>, inbound: &TextureQueue, last_use: SubmissionId) {
        let texture = device
            .create_texture(&TextureDescriptor::new_2d(
                64,
                64,
                TextureFormat::Rgba8Unorm,
                TextureUsage::STORAGE_BINDING | TextureUsage::TEXTURE_BINDING,
            ))
            .unwrap();
        inbound.push(texture, last_use);
    }

    #[test]
    fn test_config_validation() {
        let config = ComputeWorkerConfig {
            dispatch_groups: (0, 64),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let zero_interval = ComputeWorkerConfig {
            interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(zero_interval.validate().is_err());

        assert!(ComputeWorkerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_iteration_moves_texture_with_fresh_id() {
        let (device, inbound, outbound, mut worker) = setup();
        seed_texture(&device, &inbound, SubmissionId::NONE);

        assert!(worker.iteration().unwrap());
        assert!(inbound.is_empty());

        let (_texture, id) = outbound.try_pop().unwrap();
        assert_eq!(id, SubmissionId::new(1));
        assert_eq!(worker.frame_index(), 1);
    }

    #[test]
    fn test_iteration_waits_on_last_render_use() {
        let (device, inbound, outbound, mut worker) = setup();
        seed_texture(&device, &inbound, SubmissionId::new(5));

        assert!(worker.iteration().unwrap());
        let (_texture, id) = outbound.try_pop().unwrap();

        let log = device.submission_log();
        let record = log.iter().find(|r| r.id == id).unwrap();
        assert_eq!(record.waits, vec![(QueueKind::Graphics, SubmissionId::new(5))]);
        assert_eq!(record.commands.dispatch_groups, (64, 64));
    }

    #[test]
    fn test_iteration_skips_wait_for_unused_texture() {
        let (device, inbound, outbound, mut worker) = setup();
        seed_texture(&device, &inbound, SubmissionId::NONE);

        assert!(worker.iteration().unwrap());
        let (_texture, id) = outbound.try_pop().unwrap();

        let log = device.submission_log();
        assert!(log.iter().find(|r| r.id == id).unwrap().waits.is_empty());
    }

    #[test]
    fn test_cancelled_poll_returns_without_work() {
        let instance = GraphicsInstance::new().unwrap();
        let device = instance.create_device().unwrap();
        let inbound = Arc::new(TextureQueue::new());
        let outbound = Arc::new(TextureQueue::new());
        let cancellation = CancellationToken::new();
        cancellation.cancel();

        let mut worker = ComputeWorker::new(
            device,
            ComputeWorkerConfig::default(),
            inbound,
            outbound.clone(),
            cancellation,
        )
        .unwrap();

        assert!(!worker.iteration().unwrap());
        assert!(outbound.is_empty());
        assert_eq!(worker.frame_index(), 0);
    }

    #[test]
    fn test_push_constants_carry_frame_counter() {
        let (device, inbound, outbound, mut worker) = setup();
        seed_texture(&device, &inbound, SubmissionId::NONE);
        assert!(worker.iteration().unwrap());
        let (texture, _) = outbound.try_pop().unwrap();
        inbound.push(texture, SubmissionId::NONE);
        assert!(worker.iteration().unwrap());

        let log = device.submission_log();
        assert_eq!(log.len(), 2);
        assert_eq!(log[0].commands.dispatches, 1);
        assert_eq!(log[1].commands.dispatches, 1);
        assert_eq!(worker.frame_index(), 2);
    }
}
