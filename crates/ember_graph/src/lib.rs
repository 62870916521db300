//! Render-pass dependency graph: a per-frame DAG of passes and virtual
//! resources that is culled, lifetime-attributed and devirtualized before
//! a single driver call is made (§3, §4).
//!
//! The shape mirrors the teacher's pipeline cache in spirit: build up a
//! description of what's wanted, resolve it once against what's actually
//! reachable, then hand the resolved form to the driver. Here the
//! description is a whole frame's passes rather than a single PSO.

mod builder;
mod dependency_graph;
mod frame_graph;
mod ids;
mod pass;
mod render_target;
mod resource;

pub use builder::{FrameGraphBuilder, ImportedRenderTargetDescriptor, RenderPassDescriptor};
pub use dependency_graph::{DependencyGraph, Edge};
pub use frame_graph::{FrameGraph, FrameGraphResources, Mode};
pub use resource::{
    Buffer, BufferId, BufferResourceDesc, FrameGraphId, Texture, TextureId, TextureResourceDesc,
};
