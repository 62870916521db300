//! Virtual resources, resource nodes and slots (§3.2, §4.3.2).
//!
//! A `VirtualResource` is the thing a name refers to for the whole frame; a
//! `ResourceNode` is one version of it at one point in the pass timeline,
//! and is itself a node in the shared [`DependencyGraph`](crate::dependency_graph::DependencyGraph)
//! (writer edges run pass → node, reader edges run node → pass). A slot is
//! the handle-backing record the builder mutates in place on every
//! `read`/`write`: the index is stable for the virtual resource's lifetime,
//! only the version advances.

use std::marker::PhantomData;

use ember_core::ids::{GenerationalHandle, NodeIdx, PassIdx, ResourceIdx};
use ember_driver::{BufferUsage, PixelFormat, TextureUsage};

/// A typed handle into the frame graph's resource table. `R` is a
/// zero-sized marker (see [`Texture`], [`Buffer`]) so a `FrameGraphId<Texture>`
/// can never be passed to an API expecting a `FrameGraphId<Buffer>`.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameGraphId<R> {
    pub(crate) handle: GenerationalHandle,
    _marker: PhantomData<R>,
}

impl<R> FrameGraphId<R> {
    pub(crate) fn new(handle: GenerationalHandle) -> Self {
        Self {
            handle,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub fn is_invalid(self) -> bool {
        self.handle.is_invalid()
    }
}

impl<R> std::fmt::Debug for FrameGraphId<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "FrameGraphId({:?})", self.handle)
    }
}

/// Marker type for texture-shaped resources.
#[derive(Debug, Clone, Copy)]
pub struct Texture;
/// Marker type for buffer-shaped resources.
#[derive(Debug, Clone, Copy)]
pub struct Buffer;

pub type TextureId = FrameGraphId<Texture>;
pub type BufferId = FrameGraphId<Buffer>;

#[derive(Debug, Clone, Copy)]
pub struct TextureResourceDesc {
    pub width: u32,
    pub height: u32,
    pub depth_or_layers: u32,
    pub levels: u8,
    pub samples: u8,
    pub format: PixelFormat,
}

#[derive(Debug, Clone, Copy)]
pub struct BufferResourceDesc {
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Copy)]
pub(crate) enum ResourceDescriptor {
    Texture(TextureResourceDesc),
    Buffer(BufferResourceDesc),
}

impl ResourceDescriptor {
    pub(crate) fn is_texture(&self) -> bool {
        matches!(self, Self::Texture(_))
    }
}

/// A resource's identity for the whole frame: what it's named, what kind
/// and shape it has, and (once `compile` has run) when it's alive and how
/// it's used. See §3.2's `VirtualResource` row.
pub(crate) struct VirtualResource {
    pub name: String,
    pub desc: ResourceDescriptor,
    pub parent: Option<ResourceIdx>,
    /// The slot allocated for this resource at `create`/`create_subresource`
    /// time; writes and reads mutate it in place rather than allocating a
    /// new one, so this index never changes.
    pub primary_slot: u16,
    pub imported_texture: Option<ember_driver::TextureHandle>,
    pub imported_buffer: Option<ember_driver::BufferHandle>,
    /// Accumulated from every surviving read/write edge during `compile`'s
    /// usage-resolution step (§4.3.3 step 5).
    pub usage_bits: u32,
    pub refcount: i32,
    pub first_pass: Option<PassIdx>,
    pub last_pass: Option<PassIdx>,
    pub concrete_texture: Option<ember_driver::TextureHandle>,
    pub concrete_buffer: Option<ember_driver::BufferHandle>,
}

impl VirtualResource {
    #[must_use]
    pub fn is_imported(&self) -> bool {
        self.imported_texture.is_some() || self.imported_buffer.is_some()
    }

    pub(crate) fn texture_usage(&self) -> TextureUsage {
        TextureUsage::from_bits_truncate(self.usage_bits)
    }

    pub(crate) fn buffer_usage(&self) -> BufferUsage {
        BufferUsage::from_bits_truncate(self.usage_bits)
    }
}

/// One version of a resource in the pass timeline; a node in the shared
/// dependency graph.
pub(crate) struct ResourceNode {
    pub resource: ResourceIdx,
    pub dep_node: NodeIdx,
    pub writer_pass: Option<PassIdx>,
    /// The node this one superseded, if any (the "incoming" version for
    /// render-target discard inference, §4.3.4).
    pub replaces: Option<super::ids::ResourceNodeIdx>,
}

/// The handle-backing record a `FrameGraphId` actually addresses.
pub(crate) struct ResourceSlot {
    pub resource: ResourceIdx,
    pub node: super::ids::ResourceNodeIdx,
    /// Set on a subresource write: the parent's pre-write node, so a
    /// subsequent `read` of the parent routes to the state from before the
    /// subresource write rather than racing it (§4.3.2, "four transitions").
    pub subresource_node: Option<super::ids::ResourceNodeIdx>,
    /// -1 once `forward` has retired this slot.
    pub version: i16,
}

impl ResourceSlot {
    pub(crate) fn is_retired(&self) -> bool {
        self.version < 0
    }
}
