//! Graphics device.
//!
//! The [`GraphicsDevice`] is the main interface for creating GPU resources
//! and submitting work. It is created by
//! [`GraphicsInstance::create_device`].
//!
//! # Queues and submission
//!
//! The device exposes two hardware queues ([`QueueKind::Graphics`] and
//! [`QueueKind::Compute`]). Each queue has its own monotonically increasing
//! [`SubmissionId`] counter; [`execute_command_list`](GraphicsDevice::execute_command_list)
//! returns the id assigned to the batch it submitted. Cross-queue ordering
//! is requested with [`queue_wait_for`](GraphicsDevice::queue_wait_for),
//! which applies to the *next* submission on the waiting queue (the wait is
//! recorded device-side, not on the command list).
//!
//! Resources referenced by a submission are retained by the device until
//! [`run_deferred_cleanup`](GraphicsDevice::run_deferred_cleanup) retires
//! the submission's tracking, so dropping the last user-visible handle
//! never frees memory the queue may still touch.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::bindings::{
    BindingLayout, BindingLayoutDesc, BindingSet, BindingSetDesc, validate_binding_set,
};
use crate::command::{CommandList, CommandListParams, CommandSummary};
use crate::error::{GraphicsError, GraphicsResult};
use crate::instance::GraphicsInstance;
use crate::pipeline::{
    ComputePipeline, ComputePipelineDescriptor, FramebufferInfo, GraphicsPipeline,
    GraphicsPipelineDescriptor,
};
use crate::resources::{Sampler, Texture};
use crate::sync::{QueueKind, SubmissionId};
use crate::types::{SamplerDescriptor, TextureDescriptor};

/// Capabilities of a graphics device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceCapabilities {
    /// Maximum texture dimension.
    pub max_texture_dimension: u32,
    /// Whether compute shaders are supported.
    pub compute_shaders: bool,
    /// Whether a dedicated async compute queue is available.
    pub async_compute_queue: bool,
}

impl Default for DeviceCapabilities {
    fn default() -> Self {
        Self {
            max_texture_dimension: 16384,
            compute_shaders: true,
            async_compute_queue: true,
        }
    }
}

/// One entry in the device's submission log.
///
/// The log records, per queue, which submissions were made, which
/// cross-queue waits preceded them, and which textures they referenced.
/// Integration tests use it to verify hazard ordering.
#[derive(Debug, Clone)]
pub struct SubmissionRecord {
    /// Queue the batch was submitted to.
    pub queue: QueueKind,
    /// Id assigned to the batch.
    pub id: SubmissionId,
    /// Cross-queue waits consumed by this submission.
    pub waits: Vec<(QueueKind, SubmissionId)>,
    /// Ids of the textures referenced by the batch.
    pub texture_ids: Vec<u64>,
    /// Command counts.
    pub commands: CommandSummary,
}

/// A submission whose CPU-side tracking has not been retired yet.
#[derive(Debug)]
struct InFlightSubmission {
    id: SubmissionId,
    textures: Vec<Arc<Texture>>,
}

/// Mutable per-queue state.
#[derive(Debug, Default)]
struct QueueState {
    /// Value of the most recent submission id (0 before any submission).
    last_submitted: u64,
    /// Waits to apply to the next submission on this queue.
    pending_waits: Vec<(QueueKind, SubmissionId)>,
    /// Submissions with live CPU-side tracking.
    in_flight: Vec<InFlightSubmission>,
}

/// A graphics device for creating GPU resources and submitting work.
///
/// The device is created by [`GraphicsInstance::create_device`].
///
/// # Thread Safety
///
/// `GraphicsDevice` is `Send + Sync` and can be safely shared across
/// threads; all submission methods use interior mutability. The internal
/// lock is held only for bookkeeping, never while recording commands.
pub struct GraphicsDevice {
    instance: Arc<GraphicsInstance>,
    name: String,
    capabilities: DeviceCapabilities,
    next_texture_id: AtomicU64,
    queues: Mutex<[QueueState; QueueKind::COUNT]>,
    submission_log: Mutex<VecDeque<SubmissionRecord>>,
}

/// Oldest records are dropped past this point so the log stays O(1) in the
/// number of frames.
const SUBMISSION_LOG_CAP: usize = 4096;

impl GraphicsDevice {
    /// Create a new graphics device (called by GraphicsInstance).
    pub(crate) fn new(instance: Arc<GraphicsInstance>, name: String) -> Self {
        Self {
            instance,
            name,
            capabilities: DeviceCapabilities::default(),
            next_texture_id: AtomicU64::new(1),
            queues: Mutex::new(Default::default()),
            submission_log: Mutex::new(VecDeque::new()),
        }
    }

    /// Get the parent instance.
    pub fn instance(&self) -> &Arc<GraphicsInstance> {
        &self.instance
    }

    /// Get the device name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the device capabilities.
    pub fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    /// Create a GPU texture.
    ///
    /// # Errors
    ///
    /// Returns an error if the texture dimensions exceed device limits or
    /// the descriptor is invalid.
    pub fn create_texture(
        self: &Arc<Self>,
        descriptor: &TextureDescriptor,
    ) -> GraphicsResult<Arc<Texture>> {
        let max_dim = self.capabilities.max_texture_dimension;
        if descriptor.size.width > max_dim || descriptor.size.height > max_dim {
            return Err(GraphicsError::InvalidParameter(format!(
                "texture dimension exceeds maximum {max_dim}"
            )));
        }
        if descriptor.size.width == 0 || descriptor.size.height == 0 {
            return Err(GraphicsError::InvalidParameter(
                "texture dimensions cannot be zero".to_string(),
            ));
        }
        if descriptor.usage.is_empty() {
            return Err(GraphicsError::InvalidParameter(
                "texture must declare at least one usage".to_string(),
            ));
        }

        let id = self.next_texture_id.fetch_add(1, Ordering::Relaxed);
        let texture = Arc::new(Texture::new(Arc::clone(self), id, descriptor.clone()));

        log::trace!(
            "GraphicsDevice: created texture #{id} {:?}, size={}x{}",
            descriptor.label,
            descriptor.size.width,
            descriptor.size.height
        );

        Ok(texture)
    }

    /// Create a texture sampler.
    pub fn create_sampler(
        self: &Arc<Self>,
        descriptor: &SamplerDescriptor,
    ) -> GraphicsResult<Arc<Sampler>> {
        let sampler = Arc::new(Sampler::new(Arc::clone(self), descriptor.clone()));
        log::trace!("GraphicsDevice: created sampler {:?}", descriptor.label);
        Ok(sampler)
    }

    /// Create a binding layout.
    ///
    /// # Errors
    ///
    /// Returns an error if the layout declares duplicate slots of the same
    /// kind or more than one push-constants block.
    pub fn create_binding_layout(
        self: &Arc<Self>,
        descriptor: &BindingLayoutDesc,
    ) -> GraphicsResult<Arc<BindingLayout>> {
        use crate::bindings::BindingLayoutItem;

        let push_constant_blocks = descriptor
            .items
            .iter()
            .filter(|item| matches!(item, BindingLayoutItem::PushConstants { .. }))
            .count();
        if push_constant_blocks > 1 {
            return Err(GraphicsError::InvalidParameter(
                "binding layout declares more than one push-constants block".to_string(),
            ));
        }
        for (i, a) in descriptor.items.iter().enumerate() {
            if descriptor.items[i + 1..]
                .iter()
                .any(|b| std::mem::discriminant(a) == std::mem::discriminant(b) && slot_of(a) == slot_of(b))
            {
                return Err(GraphicsError::InvalidParameter(
                    "binding layout declares the same slot twice".to_string(),
                ));
            }
        }

        Ok(Arc::new(BindingLayout::new(
            Arc::clone(self),
            descriptor.clone(),
        )))
    }

    /// Create a binding set, validating it against its layout.
    pub fn create_binding_set(
        self: &Arc<Self>,
        descriptor: BindingSetDesc,
        layout: Arc<BindingLayout>,
    ) -> GraphicsResult<Arc<BindingSet>> {
        validate_binding_set(&descriptor, &layout)?;
        Ok(Arc::new(BindingSet::new(layout, descriptor)))
    }

    /// Create a compute pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::FeatureNotSupported`] if the device lacks
    /// compute shader support.
    pub fn create_compute_pipeline(
        self: &Arc<Self>,
        descriptor: &ComputePipelineDescriptor,
    ) -> GraphicsResult<Arc<ComputePipeline>> {
        if !self.capabilities.compute_shaders {
            return Err(GraphicsError::FeatureNotSupported(
                "compute shaders".to_string(),
            ));
        }
        log::trace!(
            "GraphicsDevice: created compute pipeline {:?} ({})",
            descriptor.label,
            descriptor.entry_point
        );
        Ok(Arc::new(ComputePipeline::new(
            Arc::clone(self),
            descriptor.clone(),
        )))
    }

    /// Create a graphics pipeline compatible with the given framebuffer shape.
    pub fn create_graphics_pipeline(
        self: &Arc<Self>,
        descriptor: &GraphicsPipelineDescriptor,
        framebuffer_info: &FramebufferInfo,
    ) -> GraphicsResult<Arc<GraphicsPipeline>> {
        if framebuffer_info.width == 0 || framebuffer_info.height == 0 {
            return Err(GraphicsError::InvalidParameter(
                "framebuffer dimensions cannot be zero".to_string(),
            ));
        }
        log::trace!(
            "GraphicsDevice: created graphics pipeline {:?} for {}x{}",
            descriptor.label,
            framebuffer_info.width,
            framebuffer_info.height
        );
        Ok(Arc::new(GraphicsPipeline::new(
            Arc::clone(self),
            descriptor.clone(),
            *framebuffer_info,
        )))
    }

    /// Create a command list bound to a queue.
    pub fn create_command_list(
        self: &Arc<Self>,
        params: CommandListParams,
    ) -> GraphicsResult<CommandList> {
        if params.queue == QueueKind::Compute && !self.capabilities.async_compute_queue {
            return Err(GraphicsError::FeatureNotSupported(
                "async compute queue".to_string(),
            ));
        }
        Ok(CommandList::new(params))
    }

    /// Submit a closed command list to its queue.
    ///
    /// Consumes any waits previously enqueued for that queue via
    /// [`queue_wait_for`](Self::queue_wait_for) and returns the new
    /// submission id (first id on each queue is 1, so a real submission is
    /// never [`SubmissionId::NONE`]). The list returns to the idle state
    /// and can be reopened; the textures it referenced stay retained until
    /// [`run_deferred_cleanup`](Self::run_deferred_cleanup).
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::InvalidState`] if the list is not closed.
    pub fn execute_command_list(
        self: &Arc<Self>,
        command_list: &mut CommandList,
    ) -> GraphicsResult<SubmissionId> {
        let queue = command_list.queue();
        let (summary, textures) = command_list.finish_submit()?;

        let mut queues = self.queues.lock();
        let state = &mut queues[queue.index()];
        state.last_submitted += 1;
        let id = SubmissionId::new(state.last_submitted);
        let waits = std::mem::take(&mut state.pending_waits);

        let texture_ids: Vec<u64> = textures.iter().map(|t| t.id()).collect();
        state.in_flight.push(InFlightSubmission { id, textures });
        drop(queues);

        log::trace!(
            "GraphicsDevice: submit {}#{id} waits={:?} textures={:?}",
            queue.name(),
            waits,
            texture_ids
        );

        let mut submission_log = self.submission_log.lock();
        if submission_log.len() == SUBMISSION_LOG_CAP {
            submission_log.pop_front();
        }
        submission_log.push_back(SubmissionRecord {
            queue,
            id,
            waits,
            texture_ids,
            commands: summary,
        });

        Ok(id)
    }

    /// Block future execution on `waiting` until `signaling` completes the
    /// submission identified by `id`.
    ///
    /// The wait applies to the next submission on `waiting`. Passing
    /// [`SubmissionId::NONE`] is a no-op, so callers can forward a
    /// last-use id without checking it first.
    pub fn queue_wait_for(&self, waiting: QueueKind, signaling: QueueKind, id: SubmissionId) {
        if id.is_none() {
            return;
        }
        debug_assert_ne!(waiting, signaling, "a queue cannot wait on itself");
        log::trace!(
            "GraphicsDevice: {} waits for {}#{id}",
            waiting.name(),
            signaling.name()
        );
        self.queues.lock()[waiting.index()]
            .pending_waits
            .push((signaling, id));
    }

    /// Retire CPU-side tracking for completed submissions on a queue.
    ///
    /// Releases the resource references retained at submit time for every
    /// submission the queue has moved past; the newest submission is
    /// treated as still executing and keeps its references. Called once
    /// per iteration by both long-running loops.
    pub fn run_deferred_cleanup(&self, queue: QueueKind) {
        let retired: Vec<InFlightSubmission> = {
            let mut queues = self.queues.lock();
            let state = &mut queues[queue.index()];
            let newest = SubmissionId::new(state.last_submitted);
            let (done, live): (Vec<_>, Vec<_>) = state
                .in_flight
                .drain(..)
                .partition(|submission| submission.id < newest);
            state.in_flight = live;
            done
        };
        if !retired.is_empty() {
            log::trace!(
                "GraphicsDevice: retired {} submission(s) on {}",
                retired.len(),
                queue.name()
            );
        }
        // Texture references drop here, outside the lock.
    }

    /// Id of the most recent submission on a queue.
    pub fn last_submitted(&self, queue: QueueKind) -> SubmissionId {
        SubmissionId::new(self.queues.lock()[queue.index()].last_submitted)
    }

    /// Number of submissions on a queue whose tracking is still live.
    pub fn in_flight_count(&self, queue: QueueKind) -> usize {
        self.queues.lock()[queue.index()].in_flight.len()
    }

    /// Snapshot of the submission log.
    ///
    /// The log is bounded; only the most recent records are kept.
    pub fn submission_log(&self) -> Vec<SubmissionRecord> {
        self.submission_log.lock().iter().cloned().collect()
    }
}

/// Slot number of a layout item, for duplicate detection.
fn slot_of(item: &crate::bindings::BindingLayoutItem) -> u32 {
    use crate::bindings::BindingLayoutItem::*;
    match item {
        Texture { slot }
        | StorageTexture { slot }
        | Sampler { slot }
        | PushConstants { slot, .. } => *slot,
    }
}

impl std::fmt::Debug for GraphicsDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicsDevice")
            .field("name", &self.name)
            .field("capabilities", &self.capabilities)
            .finish()
    }
}

static_assertions::assert_impl_all!(GraphicsDevice: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::{BindingLayoutDesc, BindingSetDesc, ShaderVisibility};
    use crate::types::{TextureFormat, TextureUsage};

    fn create_test_device() -> Arc<GraphicsDevice> {
        let instance = GraphicsInstance::new().unwrap();
        instance.create_device().unwrap()
    }

    fn storage_texture(device: &Arc<GraphicsDevice>) -> Arc<Texture> {
        device
            .create_texture(&TextureDescriptor::new_2d(
                16,
                16,
                TextureFormat::Rgba8Unorm,
                TextureUsage::STORAGE_BINDING | TextureUsage::TEXTURE_BINDING,
            ))
            .unwrap()
    }

    fn submit_dispatch(
        device: &Arc<GraphicsDevice>,
        list: &mut CommandList,
        texture: &Arc<Texture>,
    ) -> SubmissionId {
        let layout = device
            .create_binding_layout(
                &BindingLayoutDesc::new(ShaderVisibility::Compute).add_storage_texture(0),
            )
            .unwrap();
        let pipeline = device
            .create_compute_pipeline(
                &ComputePipelineDescriptor::new("main_cs").with_binding_layout(layout.clone()),
            )
            .unwrap();
        let bindings = device
            .create_binding_set(
                BindingSetDesc::new().with_storage_texture(0, texture.clone()),
                layout,
            )
            .unwrap();

        list.open().unwrap();
        list.set_compute_state(pipeline, bindings).unwrap();
        list.dispatch(8, 8).unwrap();
        list.close().unwrap();
        device.execute_command_list(list).unwrap()
    }

    #[test]
    fn test_create_texture_validation() {
        let device = create_test_device();
        let zero = device.create_texture(&TextureDescriptor::new_2d(
            0,
            16,
            TextureFormat::Rgba8Unorm,
            TextureUsage::TEXTURE_BINDING,
        ));
        assert!(matches!(zero, Err(GraphicsError::InvalidParameter(_))));

        let no_usage = device.create_texture(&TextureDescriptor::new_2d(
            16,
            16,
            TextureFormat::Rgba8Unorm,
            TextureUsage::empty(),
        ));
        assert!(matches!(no_usage, Err(GraphicsError::InvalidParameter(_))));
    }

    #[test]
    fn test_submission_ids_monotonic_per_queue() {
        let device = create_test_device();
        let texture = storage_texture(&device);
        let mut list = device
            .create_command_list(CommandListParams::new(QueueKind::Compute))
            .unwrap();

        let a = submit_dispatch(&device, &mut list, &texture);
        let b = submit_dispatch(&device, &mut list, &texture);
        assert_eq!(a, SubmissionId::new(1));
        assert_eq!(b, SubmissionId::new(2));
        assert!(a.is_some());

        // The graphics queue counter is independent.
        assert_eq!(device.last_submitted(QueueKind::Graphics), SubmissionId::NONE);
        assert_eq!(device.last_submitted(QueueKind::Compute), b);
    }

    #[test]
    fn test_wait_applies_to_next_submission_only() {
        let device = create_test_device();
        let texture = storage_texture(&device);
        let mut list = device
            .create_command_list(CommandListParams::new(QueueKind::Compute))
            .unwrap();

        device.queue_wait_for(QueueKind::Compute, QueueKind::Graphics, SubmissionId::new(7));
        let first = submit_dispatch(&device, &mut list, &texture);
        let second = submit_dispatch(&device, &mut list, &texture);

        let log = device.submission_log();
        let first_record = log.iter().find(|r| r.id == first).unwrap();
        let second_record = log.iter().find(|r| r.id == second).unwrap();
        assert_eq!(
            first_record.waits,
            vec![(QueueKind::Graphics, SubmissionId::new(7))]
        );
        assert!(second_record.waits.is_empty());
    }

    #[test]
    fn test_none_wait_is_noop() {
        let device = create_test_device();
        let texture = storage_texture(&device);
        let mut list = device
            .create_command_list(CommandListParams::new(QueueKind::Compute))
            .unwrap();

        device.queue_wait_for(QueueKind::Compute, QueueKind::Graphics, SubmissionId::NONE);
        let id = submit_dispatch(&device, &mut list, &texture);
        let log = device.submission_log();
        assert!(log.iter().find(|r| r.id == id).unwrap().waits.is_empty());
    }

    #[test]
    fn test_deferred_cleanup_retains_newest_submission() {
        let device = create_test_device();
        let texture = storage_texture(&device);
        let mut list = device
            .create_command_list(CommandListParams::new(QueueKind::Compute))
            .unwrap();

        submit_dispatch(&device, &mut list, &texture);
        submit_dispatch(&device, &mut list, &texture);
        submit_dispatch(&device, &mut list, &texture);
        assert_eq!(device.in_flight_count(QueueKind::Compute), 3);

        // Everything before the newest submission retires; the newest is
        // still executing and keeps its references.
        device.run_deferred_cleanup(QueueKind::Compute);
        assert_eq!(device.in_flight_count(QueueKind::Compute), 1);

        device.run_deferred_cleanup(QueueKind::Compute);
        assert_eq!(device.in_flight_count(QueueKind::Compute), 1);
    }

    #[test]
    fn test_submission_log_is_bounded() {
        let device = create_test_device();
        let texture = storage_texture(&device);
        let layout = device
            .create_binding_layout(
                &BindingLayoutDesc::new(ShaderVisibility::Compute).add_storage_texture(0),
            )
            .unwrap();
        let pipeline = device
            .create_compute_pipeline(
                &ComputePipelineDescriptor::new("main_cs").with_binding_layout(layout.clone()),
            )
            .unwrap();
        let bindings = device
            .create_binding_set(
                BindingSetDesc::new().with_storage_texture(0, texture.clone()),
                layout,
            )
            .unwrap();
        let mut list = device
            .create_command_list(CommandListParams::new(QueueKind::Compute))
            .unwrap();

        let total = SUBMISSION_LOG_CAP + 10;
        for _ in 0..total {
            device.run_deferred_cleanup(QueueKind::Compute);
            list.open().unwrap();
            list.set_compute_state(pipeline.clone(), bindings.clone())
                .unwrap();
            list.dispatch(8, 8).unwrap();
            list.close().unwrap();
            device.execute_command_list(&mut list).unwrap();
        }

        let log = device.submission_log();
        assert_eq!(log.len(), SUBMISSION_LOG_CAP);
        // Oldest records fell off the front.
        assert_eq!(log[0].id, SubmissionId::new(11));
        assert_eq!(log.last().unwrap().id, SubmissionId::new(total as u64));
    }

    #[test]
    fn test_submission_log_records_textures() {
        let device = create_test_device();
        let texture = storage_texture(&device);
        let mut list = device
            .create_command_list(CommandListParams::new(QueueKind::Compute))
            .unwrap();

        let id = submit_dispatch(&device, &mut list, &texture);
        let log = device.submission_log();
        let record = log.iter().find(|r| r.id == id).unwrap();
        assert_eq!(record.queue, QueueKind::Compute);
        assert_eq!(record.texture_ids, vec![texture.id()]);
        assert_eq!(record.commands.dispatches, 1);
    }

    #[test]
    fn test_duplicate_layout_slot_rejected() {
        let device = create_test_device();
        let result = device.create_binding_layout(
            &BindingLayoutDesc::new(ShaderVisibility::Compute)
                .add_storage_texture(0)
                .add_storage_texture(0),
        );
        assert!(matches!(result, Err(GraphicsError::InvalidParameter(_))));
    }
}
