//! Queue synchronization primitives.
//!
//! This module provides the types used to order work across the graphics
//! and compute hardware queues:
//!
//! - [`QueueKind`] - Identifies a hardware queue
//! - [`SubmissionId`] - Monotonically increasing fence value returned on submission
//! - [`CancellationToken`] - Cooperative shutdown flag shared between threads
//!
//! A [`SubmissionId`] expresses "all commands submitted to this queue up to
//! and including this point have completed" without any CPU-side blocking.
//! Cross-queue ordering is established by
//! [`GraphicsDevice::queue_wait_for`](crate::GraphicsDevice::queue_wait_for),
//! which blocks one queue's future execution until another queue reaches a
//! given submission id.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Identifies a hardware command queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueKind {
    /// The graphics queue. Supports draw, dispatch, and transfer commands.
    Graphics,
    /// The async compute queue. Supports dispatch and transfer commands.
    Compute,
}

impl QueueKind {
    /// Number of queue kinds.
    pub(crate) const COUNT: usize = 2;

    /// Stable index for per-queue storage.
    pub(crate) fn index(self) -> usize {
        match self {
            Self::Graphics => 0,
            Self::Compute => 1,
        }
    }

    /// Human-readable queue name for logging.
    pub fn name(self) -> &'static str {
        match self {
            Self::Graphics => "graphics",
            Self::Compute => "compute",
        }
    }
}

/// Identifier of a batch of commands submitted to a queue.
///
/// Submission ids increase monotonically per queue, starting at 1.
/// [`SubmissionId::NONE`] (the zero value) means "no prior submission" and
/// is never returned by a real submission, so it can be used as the initial
/// last-use marker for freshly created resources.
///
/// The id is an opaque fence value: it orders GPU execution, it says nothing
/// about whether the work has completed from the CPU's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SubmissionId(u64);

impl SubmissionId {
    /// Sentinel meaning "no prior submission to wait on".
    pub const NONE: Self = Self(0);

    /// Create a submission id from a raw fence value.
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns true if this is the "no prior submission" sentinel.
    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Returns true if this id refers to an actual submission.
    pub fn is_some(self) -> bool {
        self.0 != 0
    }

    /// Raw fence value.
    pub fn value(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SubmissionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_none() {
            f.write_str("none")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Token that signals cooperative shutdown to worker threads.
///
/// Cloning a token creates another handle to the same flag. Calling
/// [`cancel()`](CancellationToken::cancel) on any clone affects all.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Creates a new token (not cancelled).
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Signals cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Returns whether cancellation has been signalled.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

static_assertions::assert_impl_all!(CancellationToken: Send, Sync);
