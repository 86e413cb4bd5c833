//! Command list recording.
//!
//! A [`CommandList`] records commands between [`open()`](CommandList::open)
//! and [`close()`](CommandList::close), then is handed to
//! [`GraphicsDevice::execute_command_list`](crate::GraphicsDevice::execute_command_list)
//! for submission to its queue. A list is bound to one queue kind for its
//! lifetime and can be reopened and reused after each submission; the
//! resources it referenced stay alive in the device's in-flight tracking
//! until deferred cleanup retires them.

use std::sync::Arc;

use crate::bindings::BindingSet;
use crate::error::{GraphicsError, GraphicsResult};
use crate::pipeline::{ComputePipeline, Framebuffer, GraphicsPipeline};
use crate::resources::Texture;
use crate::sync::QueueKind;
use crate::types::ClearValue;

/// Parameters for creating a command list.
#[derive(Debug, Clone)]
pub struct CommandListParams {
    /// The queue this list submits to.
    pub queue: QueueKind,
    /// Debug label.
    pub label: Option<String>,
}

impl CommandListParams {
    /// Create parameters for the given queue.
    pub fn new(queue: QueueKind) -> Self {
        Self { queue, label: None }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

impl Default for CommandListParams {
    fn default() -> Self {
        Self::new(QueueKind::Graphics)
    }
}

/// Recording state of a command list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordingState {
    /// Not recording; ready to open.
    Idle,
    /// Between open() and close().
    Open,
    /// Closed; ready to submit.
    Closed,
}

/// A recorded command.
#[derive(Debug, Clone)]
pub(crate) enum Command {
    ClearColor(ClearValue),
    SetComputeState,
    SetGraphicsState,
    SetPushConstants { bytes: u32 },
    Dispatch { groups_x: u32, groups_y: u32 },
    Draw { vertex_count: u32 },
}

/// Digest of a recorded command stream, kept in the device's submission log.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CommandSummary {
    /// Number of recorded clears.
    pub clears: u32,
    /// Number of recorded draws.
    pub draws: u32,
    /// Number of recorded dispatches.
    pub dispatches: u32,
    /// Total vertices across recorded draws.
    pub vertices: u32,
    /// Group grid of the last recorded dispatch, zero if none.
    pub dispatch_groups: (u32, u32),
    /// Size in bytes of the last recorded push-constant update.
    pub push_constant_bytes: u32,
    /// Value of the last recorded clear.
    pub clear_color: Option<ClearValue>,
}

/// Records GPU commands for submission to one queue.
///
/// Created by [`GraphicsDevice::create_command_list`](crate::GraphicsDevice::create_command_list).
/// Single-owner and `Send`, so a list can move to the thread that records
/// with it.
pub struct CommandList {
    queue: QueueKind,
    label: Option<String>,
    state: RecordingState,
    commands: Vec<Command>,
    referenced: Vec<Arc<Texture>>,
    current_compute: Option<Arc<BindingSet>>,
    current_graphics: Option<Arc<BindingSet>>,
}

impl CommandList {
    pub(crate) fn new(params: CommandListParams) -> Self {
        Self {
            queue: params.queue,
            label: params.label,
            state: RecordingState::Idle,
            commands: Vec::new(),
            referenced: Vec::new(),
            current_compute: None,
            current_graphics: None,
        }
    }

    /// The queue this list submits to.
    pub fn queue(&self) -> QueueKind {
        self.queue
    }

    /// Debug label, if set.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Returns true while recording.
    pub fn is_open(&self) -> bool {
        self.state == RecordingState::Open
    }

    /// Begin recording, discarding any previously recorded commands.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::InvalidState`] if the list is already open.
    pub fn open(&mut self) -> GraphicsResult<()> {
        if self.state == RecordingState::Open {
            return Err(GraphicsError::InvalidState(
                "command list is already open".to_string(),
            ));
        }
        self.commands.clear();
        self.referenced.clear();
        self.current_compute = None;
        self.current_graphics = None;
        self.state = RecordingState::Open;
        Ok(())
    }

    /// Finish recording.
    ///
    /// # Errors
    ///
    /// Returns [`GraphicsError::InvalidState`] if the list is not open.
    pub fn close(&mut self) -> GraphicsResult<()> {
        self.require_open()?;
        self.state = RecordingState::Closed;
        Ok(())
    }

    /// Record a clear of the framebuffer's color attachment.
    ///
    /// Only valid on the graphics queue.
    pub fn clear_color(
        &mut self,
        framebuffer: &Framebuffer,
        value: ClearValue,
    ) -> GraphicsResult<()> {
        self.require_open()?;
        self.require_queue(QueueKind::Graphics, "clear_color")?;
        self.referenced.push(framebuffer.color().clone());
        self.commands.push(Command::ClearColor(value));
        Ok(())
    }

    /// Bind a compute pipeline and its resources.
    ///
    /// The binding set must have been created against one of the pipeline's
    /// declared layouts.
    pub fn set_compute_state(
        &mut self,
        pipeline: Arc<ComputePipeline>,
        bindings: Arc<BindingSet>,
    ) -> GraphicsResult<()> {
        self.require_open()?;
        if !pipeline
            .desc()
            .binding_layouts
            .iter()
            .any(|layout| Arc::ptr_eq(layout, bindings.layout()))
        {
            return Err(GraphicsError::InvalidParameter(
                "binding set layout is not declared by the compute pipeline".to_string(),
            ));
        }
        self.referenced.extend(bindings.textures().cloned());
        self.current_compute = Some(bindings);
        self.current_graphics = None;
        self.commands.push(Command::SetComputeState);
        Ok(())
    }

    /// Bind a graphics pipeline and its resources.
    ///
    /// Only valid on the graphics queue. The binding set must have been
    /// created against one of the pipeline's declared layouts.
    pub fn set_graphics_state(
        &mut self,
        pipeline: Arc<GraphicsPipeline>,
        bindings: Arc<BindingSet>,
    ) -> GraphicsResult<()> {
        self.require_open()?;
        self.require_queue(QueueKind::Graphics, "set_graphics_state")?;
        if !pipeline
            .desc()
            .binding_layouts
            .iter()
            .any(|layout| Arc::ptr_eq(layout, bindings.layout()))
        {
            return Err(GraphicsError::InvalidParameter(
                "binding set layout is not declared by the graphics pipeline".to_string(),
            ));
        }
        self.referenced.extend(bindings.textures().cloned());
        self.current_graphics = Some(bindings);
        self.current_compute = None;
        self.commands.push(Command::SetGraphicsState);
        Ok(())
    }

    /// Set inline constant data for the currently bound state.
    ///
    /// The bound binding layout must declare a push-constants slot of
    /// exactly `data.len()` bytes.
    pub fn set_push_constants(&mut self, data: &[u8]) -> GraphicsResult<()> {
        self.require_open()?;
        let bound = self
            .current_compute
            .as_ref()
            .or(self.current_graphics.as_ref())
            .ok_or_else(|| {
                GraphicsError::InvalidState(
                    "set_push_constants requires a bound pipeline state".to_string(),
                )
            })?;
        let declared = bound.layout().push_constants_size().ok_or_else(|| {
            GraphicsError::InvalidState(
                "bound binding layout declares no push constants".to_string(),
            )
        })?;
        if declared as usize != data.len() {
            return Err(GraphicsError::InvalidParameter(format!(
                "push constants size mismatch: layout declares {declared} bytes, got {}",
                data.len()
            )));
        }
        self.commands.push(Command::SetPushConstants {
            bytes: data.len() as u32,
        });
        Ok(())
    }

    /// Record a compute dispatch with the currently bound compute state.
    pub fn dispatch(&mut self, groups_x: u32, groups_y: u32) -> GraphicsResult<()> {
        self.require_open()?;
        if self.current_compute.is_none() {
            return Err(GraphicsError::InvalidState(
                "dispatch requires a bound compute state".to_string(),
            ));
        }
        if groups_x == 0 || groups_y == 0 {
            return Err(GraphicsError::InvalidParameter(
                "dispatch group count cannot be zero".to_string(),
            ));
        }
        self.commands.push(Command::Dispatch { groups_x, groups_y });
        Ok(())
    }

    /// Record a non-indexed draw with the currently bound graphics state.
    ///
    /// Only valid on the graphics queue.
    pub fn draw(&mut self, vertex_count: u32) -> GraphicsResult<()> {
        self.require_open()?;
        self.require_queue(QueueKind::Graphics, "draw")?;
        if self.current_graphics.is_none() {
            return Err(GraphicsError::InvalidState(
                "draw requires a bound graphics state".to_string(),
            ));
        }
        self.commands.push(Command::Draw { vertex_count });
        Ok(())
    }

    /// Summary of the recorded commands.
    pub(crate) fn summary(&self) -> CommandSummary {
        let mut summary = CommandSummary::default();
        for command in &self.commands {
            match command {
                Command::ClearColor(value) => {
                    summary.clears += 1;
                    summary.clear_color = Some(*value);
                }
                Command::Draw { vertex_count } => {
                    summary.draws += 1;
                    summary.vertices += vertex_count;
                }
                Command::Dispatch { groups_x, groups_y } => {
                    summary.dispatches += 1;
                    summary.dispatch_groups = (*groups_x, *groups_y);
                }
                Command::SetPushConstants { bytes } => summary.push_constant_bytes = *bytes,
                Command::SetComputeState | Command::SetGraphicsState => {}
            }
        }
        summary
    }

    /// Take the recorded contents for submission and reset to idle.
    ///
    /// Called by the device after validating the list is closed; returns
    /// the referenced textures so the device can retain them until deferred
    /// cleanup.
    pub(crate) fn finish_submit(&mut self) -> GraphicsResult<(CommandSummary, Vec<Arc<Texture>>)> {
        if self.state != RecordingState::Closed {
            return Err(GraphicsError::InvalidState(
                "command list must be closed before execution".to_string(),
            ));
        }
        let summary = self.summary();
        self.commands.clear();
        self.current_compute = None;
        self.current_graphics = None;
        self.state = RecordingState::Idle;
        Ok((summary, std::mem::take(&mut self.referenced)))
    }

    fn require_open(&self) -> GraphicsResult<()> {
        if self.state != RecordingState::Open {
            return Err(GraphicsError::InvalidState(
                "command list is not open for recording".to_string(),
            ));
        }
        Ok(())
    }

    fn require_queue(&self, queue: QueueKind, operation: &str) -> GraphicsResult<()> {
        if self.queue != queue {
            return Err(GraphicsError::InvalidState(format!(
                "{operation} is only valid on the {} queue, list targets {}",
                queue.name(),
                self.queue.name()
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for CommandList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandList")
            .field("queue", &self.queue)
            .field("label", &self.label)
            .field("state", &self.state)
            .field("commands", &self.commands.len())
            .finish()
    }
}

static_assertions::assert_impl_all!(CommandList: Send);
