//! The null backend: accepts every call, logs at `trace`, and fabricates
//! plausible handles. Used by the engine's own test suite and the
//! `frame_demo` binary to drive a full frame without a real GPU.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::handles::*;
use crate::traits::*;

/// Monotonically increasing handle allocator shared by every resource kind
/// in the null backend (handles from different kinds are never compared to
/// each other, so collisions across kinds are harmless).
#[derive(Default)]
struct HandleAllocator(AtomicU32);

impl HandleAllocator {
    fn next(&self) -> u32 {
        self.0.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// A backend that performs no real GPU work. Every creation call returns a
/// freshly minted handle; every other call is a logged no-op.
#[derive(Default)]
pub struct NullDriver {
    handles: HandleAllocator,
    caps: DriverCaps,
    in_render_pass: bool,
    /// Number of outstanding `create_*` calls not yet matched by a
    /// `destroy_*`, tracked per kind purely so tests can assert no leaks.
    live_textures: u32,
    live_buffers: u32,
    live_render_targets: u32,
}

impl NullDriver {
    #[must_use]
    pub fn new() -> Self {
        Self {
            caps: DriverCaps {
                feature_level: ember_core::config::FeatureLevel::Level3,
                flags: FeatureFlags::STEREO_SUPPORT | FeatureFlags::PARALLEL_SHADER_COMPILE,
                ubo_offset_alignment: 256,
            },
            ..Self::default()
        }
    }

    #[must_use]
    pub fn live_texture_count(&self) -> u32 {
        self.live_textures
    }

    #[must_use]
    pub fn live_buffer_count(&self) -> u32 {
        self.live_buffers
    }

    #[must_use]
    pub fn live_render_target_count(&self) -> u32 {
        self.live_render_targets
    }
}

impl DriverApi for NullDriver {
    fn create_texture(&mut self, desc: &TextureDescriptor) -> TextureHandle {
        self.live_textures += 1;
        log::trace!(
            "null: create_texture {}x{} fmt={:?} usage={:?}",
            desc.width,
            desc.height,
            desc.format,
            desc.usage
        );
        TextureHandle::from_raw(self.handles.next())
    }

    fn destroy_texture(&mut self, handle: TextureHandle) {
        assert!(handle.is_valid(), "destroy_texture: invalid handle");
        self.live_textures = self.live_textures.saturating_sub(1);
        log::trace!("null: destroy_texture {handle:?}");
    }

    fn create_buffer(&mut self, desc: &GpuBufferDescriptor) -> BufferHandle {
        self.live_buffers += 1;
        log::trace!("null: create_buffer {} bytes usage={:?}", desc.size_bytes, desc.usage);
        BufferHandle::from_raw(self.handles.next())
    }

    fn destroy_buffer(&mut self, handle: BufferHandle) {
        assert!(handle.is_valid(), "destroy_buffer: invalid handle");
        self.live_buffers = self.live_buffers.saturating_sub(1);
        log::trace!("null: destroy_buffer {handle:?}");
    }

    fn create_render_target(&mut self, desc: &RenderTargetDescriptor) -> RenderTargetHandle {
        self.live_render_targets += 1;
        log::trace!("null: create_render_target samples={} layers={}", desc.samples, desc.layer_count);
        RenderTargetHandle::from_raw(self.handles.next())
    }

    fn destroy_render_target(&mut self, handle: RenderTargetHandle) {
        assert!(handle.is_valid(), "destroy_render_target: invalid handle");
        self.live_render_targets = self.live_render_targets.saturating_sub(1);
        log::trace!("null: destroy_render_target {handle:?}");
    }

    fn create_fence(&mut self) -> FenceHandle {
        FenceHandle::from_raw(self.handles.next())
    }

    fn destroy_fence(&mut self, handle: FenceHandle) {
        assert!(handle.is_valid(), "destroy_fence: invalid handle");
    }

    fn create_descriptor_set_layout(&mut self) -> DescriptorSetLayoutHandle {
        DescriptorSetLayoutHandle::from_raw(self.handles.next())
    }

    fn create_descriptor_set(&mut self, layout: DescriptorSetLayoutHandle) -> DescriptorSetHandle {
        assert!(layout.is_valid(), "create_descriptor_set: invalid layout");
        DescriptorSetHandle::from_raw(self.handles.next())
    }

    fn destroy_descriptor_set(&mut self, handle: DescriptorSetHandle) {
        assert!(handle.is_valid(), "destroy_descriptor_set: invalid handle");
    }

    fn update_buffer(&mut self, handle: BufferHandle, offset: u64, descriptor: BufferDescriptor) {
        assert!(handle.is_valid(), "update_buffer: invalid handle");
        log::trace!("null: update_buffer {handle:?} offset={offset} len={}", descriptor.data.len());
        descriptor.release();
    }

    fn update_image(&mut self, handle: TextureHandle, level: u8, descriptor: BufferDescriptor) {
        assert!(handle.is_valid(), "update_image: invalid handle");
        log::trace!("null: update_image {handle:?} level={level} len={}", descriptor.data.len());
        descriptor.release();
    }

    fn create_program(&mut self, desc: &ProgramDescriptor, name: &str) -> ProgramHandle {
        if desc.vertex_shader.is_empty() || desc.fragment_shader.is_empty() {
            log::error!("null: program '{name}' has an empty shader stage, refusing to link");
            return ProgramHandle::INVALID;
        }
        log::trace!("null: create_program '{name}' cache_id={:#x}", desc.cache_id);
        ProgramHandle::from_raw(self.handles.next())
    }

    fn destroy_program(&mut self, handle: ProgramHandle) {
        if handle.is_valid() {
            log::trace!("null: destroy_program {handle:?}");
        }
    }

    fn compile_programs(&mut self, _priority: CompilePriority, callback: Box<dyn FnOnce() + Send>) {
        // The null backend has nothing to compile in the background; it is
        // "ready" the instant the call returns.
        callback();
    }

    fn begin_render_pass(&mut self, target: RenderTargetHandle, params: &RenderPassParams) {
        assert!(!self.in_render_pass, "begin_render_pass: already inside a render pass");
        assert!(target.is_valid(), "begin_render_pass: invalid target");
        self.in_render_pass = true;
        log::trace!(
            "null: begin_render_pass {target:?} clear={:?} discard_start={:?} discard_end={:?}",
            params.clear_flags,
            params.discard_start,
            params.discard_end
        );
    }

    fn end_render_pass(&mut self) {
        assert!(self.in_render_pass, "end_render_pass: not inside a render pass");
        self.in_render_pass = false;
    }

    fn push_group_marker(&mut self, name: &str) {
        log::trace!("null: >> {name}");
    }

    fn pop_group_marker(&mut self) {
        log::trace!("null: <<");
    }

    fn begin_frame(&mut self) {
        log::trace!("null: begin_frame");
    }

    fn end_frame(&mut self) {
        log::trace!("null: end_frame");
    }

    fn finish(&mut self) {
        log::trace!("null: finish (GPU idle)");
    }

    fn make_current(&mut self, draw_sc: SwapChainHandle, read_sc: SwapChainHandle) {
        log::trace!("null: make_current draw={draw_sc:?} read={read_sc:?}");
    }

    fn commit(&mut self, swap_chain: SwapChainHandle) {
        log::trace!("null: commit {swap_chain:?}");
    }

    fn wait_fence(&mut self, handle: FenceHandle, _timeout_ns: u64) -> bool {
        assert!(handle.is_valid(), "wait_fence: invalid handle");
        true
    }

    fn caps(&self) -> DriverCaps {
        self.caps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_destroy_texture_balances_live_count() {
        let mut driver = NullDriver::new();
        let handle = driver.create_texture(&TextureDescriptor {
            width: 4,
            height: 4,
            depth_or_layers: 1,
            levels: 1,
            samples: 1,
            format: PixelFormat::Rgba8Unorm,
            usage: TextureUsage::SAMPLEABLE,
        });
        assert!(handle.is_valid());
        assert_eq!(driver.live_texture_count(), 1);
        driver.destroy_texture(handle);
        assert_eq!(driver.live_texture_count(), 0);
    }

    #[test]
    fn empty_shader_stage_yields_sentinel_handle() {
        let mut driver = NullDriver::new();
        let handle = driver.create_program(&ProgramDescriptor::default(), "broken");
        assert!(!handle.is_valid());
    }

    #[test]
    #[should_panic(expected = "already inside a render pass")]
    fn nested_render_pass_is_a_contract_violation() {
        let mut driver = NullDriver::new();
        let target = driver.create_render_target(&RenderTargetDescriptor::default());
        driver.begin_render_pass(target, &RenderPassParams::default());
        driver.begin_render_pass(target, &RenderPassParams::default());
    }
}
