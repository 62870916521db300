//! Pass nodes: one per `add_pass` call, plus the render-target attachment
//! bookkeeping `compile` resolves into concrete discard/readonly state
//! (§4.3.4).

use ember_core::ids::{NodeIdx, ResourceIdx};
use ember_driver::{DriverApi, RenderTargetHandle, TargetBufferFlags, Viewport};

use crate::ids::ResourceNodeIdx;

/// A pass's user-supplied body. Boxed dynamic dispatch, the same rationale
/// `ember_command` gives for command records (§9, "Dynamic dispatch for
/// pass executors"). `Send` so a compiled `FrameGraph` can itself be handed
/// off to the backend thread as a single command.
pub trait PassExecutor:
    for<'a> FnMut(&crate::frame_graph::FrameGraphResources<'a>, &mut dyn DriverApi) + Send
{
}
impl<F> PassExecutor for F where
    F: for<'a> FnMut(&crate::frame_graph::FrameGraphResources<'a>, &mut dyn DriverApi) + Send
{
}

/// One attachment slot on a declared render target.
#[derive(Default, Clone, Copy)]
pub(crate) struct Attachment {
    pub resource: Option<ResourceIdx>,
    /// The node this pass produces for the attachment, if it writes it.
    pub write_node: Option<ResourceNodeIdx>,
    /// The resource node this pass's view of the attachment succeeds: what
    /// `write_node` replaces when this pass writes it, or the node this
    /// pass reads when it doesn't. `discard_start` depends only on whether
    /// this node has a live writer, independent of whether this pass itself
    /// writes the attachment.
    pub incoming: Option<ResourceNodeIdx>,
}

impl Attachment {
    pub(crate) fn is_present(&self) -> bool {
        self.resource.is_some()
    }
}

#[derive(Clone, Copy)]
pub(crate) struct ImportedRenderTargetInfo {
    pub handle: RenderTargetHandle,
    pub viewport: Viewport,
    pub samples: u8,
    pub clear_color: [f32; 4],
    pub clear_flags: TargetBufferFlags,
    pub keep_override_start: TargetBufferFlags,
    pub keep_override_end: TargetBufferFlags,
    /// Consumed (cleared) after the first pass that uses this target runs.
    pub clear_pending: bool,
}

pub(crate) struct RenderPassData {
    pub name: String,
    pub color: [Attachment; ember_driver::MAX_COLOR_ATTACHMENTS],
    pub depth: Attachment,
    pub stencil: Attachment,
    pub viewport: Viewport,
    pub clear_color: [f32; 4],
    pub clear_flags: TargetBufferFlags,
    pub samples: u8,
    pub layer_count: u16,
    pub imported: Option<usize>,
}

pub(crate) struct PassNodeData {
    pub name: String,
    pub dep_node: NodeIdx,
    pub render_pass: Option<RenderPassData>,
    pub executor: Option<Box<dyn PassExecutor + Send>>,
}
