//! Engine orchestrator (§4.8): the backend thread, the command stream's
//! producer half, engine-lifetime resource lists, default resources, and
//! the per-frame UBO slot ring.

mod default_resources;
mod engine;
mod handles;
mod logging;
mod ubo_manager;

pub use default_resources::DefaultResources;
pub use engine::{DriverFactory, Engine, EngineBuilder};
pub use handles::{EngineFenceHandle, MaterialHandle, MaterialInstanceHandle};
pub use logging::init_default_logging;
pub use ubo_manager::UboManager;
