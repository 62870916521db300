//! The Driver-API contract (§4.1 of the design spec).
//!
//! This crate defines the boundary between the engine core and any concrete
//! backend (OpenGL/ES, Vulkan, Metal, WebGPU, DX12, ...). The core never
//! depends on a concrete backend; it only calls through [`DriverApi`].
//!
//! Exactly one concrete backend ships here: [`NullDriver`], which accepts
//! every call and fabricates plausible handles. Real backends are external
//! collaborators (out of scope per §1) that would implement the same trait.

pub mod handles;
pub mod null;
pub mod traits;

pub use handles::*;
pub use null::NullDriver;
pub use traits::*;
