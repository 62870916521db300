//! The authoring API a pass's setup closure sees (§4.3.1, §4.3.2).

use ember_core::ids::PassIdx;
use ember_driver::{BufferUsage, RenderTargetHandle, TargetBufferFlags, TextureUsage, Viewport};

use crate::frame_graph::FrameGraph;
use crate::resource::{BufferId, BufferResourceDesc, TextureId, TextureResourceDesc};

#[derive(Default, Clone, Copy)]
pub struct RenderPassDescriptor {
    pub color: [Option<TextureId>; ember_driver::MAX_COLOR_ATTACHMENTS],
    pub depth: Option<TextureId>,
    pub stencil: Option<TextureId>,
    pub viewport: Viewport,
    pub clear_color: [f32; 4],
    pub clear_flags: TargetBufferFlags,
    pub samples: u8,
    pub layer_count: u16,
}

/// Overrides for a render target the caller already owns (e.g. a
/// swap-chain back buffer), rather than one the graph should allocate.
#[derive(Clone, Copy)]
pub struct ImportedRenderTargetDescriptor {
    pub handle: RenderTargetHandle,
    pub viewport: Viewport,
    pub samples: u8,
    pub clear_color: [f32; 4],
    pub clear_flags: TargetBufferFlags,
    pub keep_override_start: TargetBufferFlags,
    pub keep_override_end: TargetBufferFlags,
}

/// Handed to a pass's setup closure. Every method records a dependency
/// edge (or a new resource version) rather than doing anything itself;
/// the actual DAG is only walked once `compile` runs.
pub struct FrameGraphBuilder<'a> {
    pub(crate) fg: &'a mut FrameGraph,
    pub(crate) pass: PassIdx,
}

impl<'a> FrameGraphBuilder<'a> {
    #[must_use]
    pub fn create_texture(&mut self, name: &str, desc: TextureResourceDesc) -> TextureId {
        self.fg.create_texture(name, desc)
    }

    #[must_use]
    pub fn create_buffer(&mut self, name: &str, desc: BufferResourceDesc) -> BufferId {
        self.fg.create_buffer(name, desc)
    }

    #[must_use]
    pub fn create_subresource(
        &mut self,
        parent: TextureId,
        name: &str,
        desc: TextureResourceDesc,
    ) -> TextureId {
        self.fg.create_subresource_texture(parent, name, desc)
    }

    #[must_use]
    pub fn import_render_target(
        &mut self,
        name: &str,
        desc: TextureResourceDesc,
        info: ImportedRenderTargetDescriptor,
    ) -> TextureId {
        self.fg.import_render_target(name, desc, info)
    }

    #[must_use]
    pub fn read(&mut self, id: TextureId, usage: TextureUsage) -> TextureId {
        self.fg.read_texture(self.pass, id, usage)
    }

    #[must_use]
    pub fn write(&mut self, id: TextureId, usage: TextureUsage) -> TextureId {
        self.fg.write_texture(self.pass, id, usage)
    }

    #[must_use]
    pub fn read_buffer(&mut self, id: BufferId, usage: BufferUsage) -> BufferId {
        self.fg.read_buffer(self.pass, id, usage)
    }

    #[must_use]
    pub fn write_buffer(&mut self, id: BufferId, usage: BufferUsage) -> BufferId {
        self.fg.write_buffer(self.pass, id, usage)
    }

    /// Sugar for `read(id, SAMPLEABLE)`, the common case of binding a
    /// texture for shader sampling without writing it.
    #[must_use]
    pub fn sample(&mut self, id: TextureId) -> TextureId {
        self.read(id, TextureUsage::SAMPLEABLE)
    }

    pub fn declare_render_pass(&mut self, name: &str, desc: RenderPassDescriptor) {
        self.fg.declare_render_pass(self.pass, name, desc);
    }

    /// Marks this pass as having an effect outside the graph (e.g. a
    /// present), so it and everything it depends on survive culling even
    /// with no reader.
    pub fn side_effect(&mut self) {
        self.fg.mark_side_effect(self.pass);
    }
}
