//! The `DriverApi` trait: the sole interface the core uses to reach a
//! concrete backend. Every call is fire-and-forget from the producer's point
//! of view — a handle comes back synchronously even though the actual GPU
//! object may be constructed later on the backend thread (§4.1, §5).

use crate::handles::*;

/// Maximum simultaneous color attachments on a render target (§3.2).
pub const MAX_COLOR_ATTACHMENTS: usize = 8;

bitflags::bitflags! {
    /// Which render-target attachment slots a bit of state applies to.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct TargetBufferFlags: u32 {
        const COLOR0 = 1 << 0;
        const COLOR1 = 1 << 1;
        const COLOR2 = 1 << 2;
        const COLOR3 = 1 << 3;
        const COLOR4 = 1 << 4;
        const COLOR5 = 1 << 5;
        const COLOR6 = 1 << 6;
        const COLOR7 = 1 << 7;
        const DEPTH = 1 << 8;
        const STENCIL = 1 << 9;
        const ALL_COLOR = Self::COLOR0.bits() | Self::COLOR1.bits() | Self::COLOR2.bits()
            | Self::COLOR3.bits() | Self::COLOR4.bits() | Self::COLOR5.bits()
            | Self::COLOR6.bits() | Self::COLOR7.bits();
    }
}

impl TargetBufferFlags {
    #[must_use]
    pub const fn color(index: usize) -> Self {
        Self::from_bits_truncate(1 << index)
    }
}

bitflags::bitflags! {
    /// Usage bits accumulated on a (virtual) resource by `resolve_resource_usage`
    /// (§4.3.3 step 5) and consumed when it is devirtualized into a concrete
    /// backend resource.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct TextureUsage: u32 {
        const SAMPLEABLE        = 1 << 0;
        const COLOR_ATTACHMENT  = 1 << 1;
        const DEPTH_ATTACHMENT  = 1 << 2;
        const STENCIL_ATTACHMENT = 1 << 3;
        const STORAGE           = 1 << 4;
        const SUBPASS_INPUT     = 1 << 5;
        const BLIT_SRC          = 1 << 6;
        const BLIT_DST          = 1 << 7;
    }
}

bitflags::bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct BufferUsage: u32 {
        const VERTEX  = 1 << 0;
        const INDEX   = 1 << 1;
        const UNIFORM = 1 << 2;
        const STORAGE = 1 << 3;
        const INDIRECT = 1 << 4;
    }
}

/// Pixel format of a texture, trimmed to the formats the frame graph needs to
/// reason about (color vs. depth vs. depth-stencil).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgba8Unorm,
    Rgba16Float,
    R32Float,
    Depth32Float,
    Depth24Stencil8,
}

impl PixelFormat {
    #[must_use]
    pub const fn is_depth(self) -> bool {
        matches!(self, Self::Depth32Float | Self::Depth24Stencil8)
    }

    #[must_use]
    pub const fn is_stencil(self) -> bool {
        matches!(self, Self::Depth24Stencil8)
    }
}

/// Concrete texture creation parameters.
#[derive(Debug, Clone, Copy)]
pub struct TextureDescriptor {
    pub width: u32,
    pub height: u32,
    pub depth_or_layers: u32,
    pub levels: u8,
    pub samples: u8,
    pub format: PixelFormat,
    pub usage: TextureUsage,
}

/// Concrete buffer creation parameters.
#[derive(Debug, Clone, Copy)]
pub struct GpuBufferDescriptor {
    pub size_bytes: u64,
    pub usage: BufferUsage,
}

/// Upload payload for `update_buffer`/`update_image`: owned bytes plus an
/// optional callback the backend invokes once it has released the data
/// (e.g. after a staging copy completes), handing ownership back to the
/// caller. This is the safe-Rust rendering of "pointer + size + optional
/// release callback" from §4.1.
pub struct BufferDescriptor {
    pub data: Box<[u8]>,
    pub on_release: Option<Box<dyn FnOnce(Box<[u8]>) + Send>>,
}

impl BufferDescriptor {
    #[must_use]
    pub fn new(data: Box<[u8]>) -> Self {
        Self {
            data,
            on_release: None,
        }
    }

    #[must_use]
    pub fn with_release_callback(
        data: Box<[u8]>,
        on_release: Box<dyn FnOnce(Box<[u8]>) + Send>,
    ) -> Self {
        Self {
            data,
            on_release: Some(on_release),
        }
    }

    /// Invoked by the backend once it no longer needs the bytes.
    pub fn release(self) {
        if let Some(cb) = self.on_release {
            cb(self.data);
        }
    }
}

/// Concrete (post-devirtualization) render-target creation parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderTargetDescriptor {
    pub color: [Option<TextureHandle>; MAX_COLOR_ATTACHMENTS],
    pub depth: Option<TextureHandle>,
    pub stencil: Option<TextureHandle>,
    pub samples: u8,
    pub layer_count: u16,
}

/// Per-render-pass clear/discard/readonly state, resolved by the frame graph
/// (§4.3.4) and handed to the backend's `beginRenderPass`-equivalent call.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderPassParams {
    pub viewport: Viewport,
    pub clear_color: [f32; 4],
    pub target_buffer_flags: TargetBufferFlags,
    pub clear_flags: TargetBufferFlags,
    pub discard_start: TargetBufferFlags,
    pub discard_end: TargetBufferFlags,
    pub read_only: TargetBufferFlags,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Viewport {
    pub left: i32,
    pub bottom: i32,
    pub width: u32,
    pub height: u32,
}

/// Priority hint for asynchronous program compilation (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompilePriority {
    High,
    Low,
}

/// A specialization constant's bound value (§4.7.4), attached to a
/// [`ProgramDescriptor`] at program-creation time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpecConstantValue {
    Bool(bool),
    Int(i32),
    Float(f32),
}

/// One `(id, value)` override a [`ProgramDescriptor`] carries into
/// `create_program`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpecConstantOverride {
    pub id: u32,
    pub value: SpecConstantValue,
}

/// Shader source + metadata handed to `create_program`. The material system
/// (§4.7.3) is responsible for filling this in from a parsed package.
#[derive(Default)]
pub struct ProgramDescriptor {
    pub vertex_shader: Vec<u8>,
    pub fragment_shader: Vec<u8>,
    pub cache_id: u64,
    pub multiview: bool,
    pub spec_constants: Vec<SpecConstantOverride>,
}

/// The abstract sink of GPU commands (§4.1). A concrete backend (out of
/// scope here) implements this trait; the core only ever calls through it.
///
/// All creation calls are fire-and-forget: they return a handle
/// synchronously even though construction of the underlying object may be
/// deferred to whenever the backend thread gets around to draining the
/// command that requested it.
pub trait DriverApi: Send {
    // ---- Handle factories -------------------------------------------------
    fn create_texture(&mut self, desc: &TextureDescriptor) -> TextureHandle;
    fn destroy_texture(&mut self, handle: TextureHandle);

    fn create_buffer(&mut self, desc: &GpuBufferDescriptor) -> BufferHandle;
    fn destroy_buffer(&mut self, handle: BufferHandle);

    fn create_render_target(&mut self, desc: &RenderTargetDescriptor) -> RenderTargetHandle;
    fn destroy_render_target(&mut self, handle: RenderTargetHandle);

    fn create_fence(&mut self) -> FenceHandle;
    fn destroy_fence(&mut self, handle: FenceHandle);

    fn create_descriptor_set_layout(&mut self) -> DescriptorSetLayoutHandle;
    fn create_descriptor_set(&mut self, layout: DescriptorSetLayoutHandle) -> DescriptorSetHandle;
    fn destroy_descriptor_set(&mut self, handle: DescriptorSetHandle);

    // ---- Update / upload ----------------------------------------------------
    fn update_buffer(&mut self, handle: BufferHandle, offset: u64, descriptor: BufferDescriptor);
    fn update_image(&mut self, handle: TextureHandle, level: u8, descriptor: BufferDescriptor);

    // ---- Program creation & compile hints ----------------------------------
    /// Synchronous creation: logs and returns [`ProgramHandle::INVALID`] on
    /// link failure rather than propagating an error (§7 "Backend failure").
    fn create_program(&mut self, desc: &ProgramDescriptor, name: &str) -> ProgramHandle;
    fn destroy_program(&mut self, handle: ProgramHandle);

    /// Requests that the backend pre-warm its shader compiler. `callback` is
    /// invoked once the backend considers the batch ready; this models the
    /// source's async `compilePrograms(priority, handler, callback, user)`
    /// as a completion-based op (§9 "Coroutines / async").
    fn compile_programs(&mut self, priority: CompilePriority, callback: Box<dyn FnOnce() + Send>);

    // ---- Render pass envelope ----------------------------------------------
    fn begin_render_pass(&mut self, target: RenderTargetHandle, params: &RenderPassParams);
    fn end_render_pass(&mut self);
    fn push_group_marker(&mut self, name: &str);
    fn pop_group_marker(&mut self);

    // ---- Frame lifecycle -----------------------------------------------------
    fn begin_frame(&mut self);
    fn end_frame(&mut self);
    /// Blocks the calling (backend) thread until the GPU is idle.
    fn finish(&mut self);
    fn make_current(&mut self, draw_sc: SwapChainHandle, read_sc: SwapChainHandle);
    fn commit(&mut self, swap_chain: SwapChainHandle);

    /// Inserts a GPU fence wait with the given signaled value into the
    /// command stream; blocks the backend thread for up to `timeout_ns`.
    fn wait_fence(&mut self, handle: FenceHandle, timeout_ns: u64) -> bool;

    // ---- Feature queries -----------------------------------------------------
    fn caps(&self) -> DriverCaps;
}
