//! Ember: a physically-based real-time rendering engine core — frame
//! graph, command stream, material system, and the engine orchestrator
//! that wires them together (§1, §2).
//!
//! This crate is a thin umbrella: it re-exports the workspace's component
//! crates under one name so a consumer depends on `ember` rather than
//! five separate paths, the way `myth` re-exports its subsystem crates.

pub use ember_command as command;
pub use ember_core as core;
pub use ember_driver as driver;
pub use ember_graph as graph;
pub use ember_material as material;
pub use ember_engine as engine;

/// The common set of names a caller building a frame typically needs,
/// gathered into one `use ember::prelude::*`.
pub mod prelude {
    pub use ember_command::{Command, CommandBuffer, CommandQueue, Consumer, Producer};
    pub use ember_core::config::{Backend, EngineConfig, FeatureLevel, StereoscopicType};
    pub use ember_core::error::{EmberError, Result};
    pub use ember_driver::{DriverApi, NullDriver};
    pub use ember_engine::{Engine, EngineBuilder, MaterialHandle, MaterialInstanceHandle};
    pub use ember_graph::{FrameGraph, FrameGraphBuilder, Mode};
    pub use ember_material::{Material, MaterialDefinition, ShaderLanguage, Variant};
}
