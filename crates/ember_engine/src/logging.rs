//! Process-wide log initialization, owned by the app-facing crate the same
//! way `myth_app` owns it rather than any lower-level crate.

use std::sync::Once;

static INIT: Once = Once::new();

/// Installs `env_logger` as the global logger exactly once. Safe to call
/// more than once (and from more than one thread); later calls are no-ops.
pub fn init_default_logging() {
    INIT.call_once(|| {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    });
}
