//! Cross-thread texture handoff queue.
//!
//! [`TextureQueue`] is the handoff point between the render thread and the
//! compute worker thread. It transfers ownership of a texture together with
//! the submission id of the last GPU operation that touched it, so the
//! receiving side can enqueue the correct cross-queue wait before reusing
//! the texture.
//!
//! The queue is an unbounded FIFO guarded by a mutex. The lock is held only
//! for the structural push/pop, never for any GPU work: the queue orders
//! CPU-side ownership transfer, while GPU-side content safety is
//! established exclusively through
//! [`GraphicsDevice::queue_wait_for`](crate::GraphicsDevice::queue_wait_for)
//! on the carried submission id.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::resources::Texture;
use crate::sync::SubmissionId;

/// Thread-safe FIFO of (texture, last-use submission id) pairs.
///
/// Two independent instances circulate a fixed texture pool between the
/// render and compute threads: one carries textures to the compute worker,
/// the other carries computed results back. There is no ordering guarantee
/// across the two instances, only within each.
#[derive(Debug, Default)]
pub struct TextureQueue {
    inner: Mutex<VecDeque<(Arc<Texture>, SubmissionId)>>,
}

impl TextureQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a texture at the tail, transferring ownership into the queue.
    ///
    /// `last_use` must reflect the last submission that read or wrote the
    /// texture ([`SubmissionId::NONE`] for a texture never yet submitted).
    /// Never blocks beyond the structural lock; never fails.
    pub fn push(&self, texture: Arc<Texture>, last_use: SubmissionId) {
        self.inner.lock().push_back((texture, last_use));
    }

    /// Remove and return the head element, or `None` if the queue is empty.
    ///
    /// Non-blocking: returns immediately in either case.
    pub fn try_pop(&self) -> Option<(Arc<Texture>, SubmissionId)> {
        self.inner.lock().pop_front()
    }

    /// Number of textures currently in transit inside this queue.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Returns true if no texture is currently in transit.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

static_assertions::assert_impl_all!(TextureQueue: Send, Sync);
