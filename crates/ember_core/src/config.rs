//! Engine configuration surface (§6.3).
//!
//! `EngineConfig` is a plain data struct; [`EngineConfigBuilder`] is the
//! fluent, `#[must_use]`, `with_x(mut self, ...) -> Self` builder in the
//! style of `myth_app::App` / `myth::renderer::settings::RenderSettings`.

use rustc_hash::FxHashMap;

/// Which concrete driver the engine should instantiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// Let the engine pick a backend appropriate for the host platform.
    #[default]
    Auto,
    Vulkan,
    Metal,
    OpenGl,
    WebGpu,
    Dx12,
    /// In-process backend that accepts every call and fabricates handles;
    /// used by tests and the `frame_demo` binary.
    Null,
}

/// Backend capability tier. 0 = ES2-equivalent, 1 = ES3, 2 = ES3.1+,
/// 3 = compute-class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum FeatureLevel {
    Level0,
    #[default]
    Level1,
    Level2,
    Level3,
}

/// Stereo rendering strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StereoscopicType {
    #[default]
    None,
    Instanced,
    Multiview,
}

/// Driver hint for the GPU context's scheduling priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpuContextPriority {
    #[default]
    Default,
    Low,
    Medium,
    High,
    Realtime,
}

/// Per-`Engine` configuration, covering every row of §6.3.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub backend: Backend,
    pub feature_level: FeatureLevel,
    /// Start the command queue paused (producer may unpause to coalesce frames).
    pub paused: bool,
    pub min_command_buffer_size_mb: usize,
    pub command_buffer_size_mb: usize,
    pub per_frame_commands_size_mb: usize,
    pub per_render_pass_arena_size_mb: usize,
    /// 0 means `hardware_concurrency - 2`, minimum 1.
    pub job_system_thread_count: usize,
    pub stereoscopic_type: StereoscopicType,
    pub stereoscopic_eye_count: u8,
    pub gpu_context_priority: GpuContextPriority,
    /// Run the backend on its own thread. `false` runs `init()`/`execute()`
    /// inline on the calling thread (§4.8.1's "without threading" path).
    pub threaded: bool,
    /// Name → bool feature-flag table, for experimental toggles that don't
    /// warrant a dedicated field yet.
    pub feature_flags: FxHashMap<String, bool>,
}

/// Maximum number of stereo eyes the engine will render in one pass.
pub const MAX_EYES: u8 = 4;

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: Backend::Auto,
            feature_level: FeatureLevel::Level1,
            paused: false,
            min_command_buffer_size_mb: 1,
            command_buffer_size_mb: 3,
            per_frame_commands_size_mb: 2,
            per_render_pass_arena_size_mb: 3,
            job_system_thread_count: 0,
            stereoscopic_type: StereoscopicType::None,
            stereoscopic_eye_count: 1,
            gpu_context_priority: GpuContextPriority::Default,
            threaded: true,
            feature_flags: FxHashMap::default(),
        }
    }
}

impl EngineConfig {
    /// Resolves `job_system_thread_count == 0` against the host's reported
    /// parallelism, per §6.3 ("0 ⇒ `hardware_concurrency − 2`, min 1").
    #[must_use]
    pub fn resolved_job_thread_count(&self) -> usize {
        if self.job_system_thread_count != 0 {
            return self.job_system_thread_count;
        }
        let hw = std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(4);
        hw.saturating_sub(2).max(1)
    }

    /// Producer-visible command byte budget derived from the ring size,
    /// per §4.4.3: `per_frame_commands_bytes <= command_buffer_bytes - 1 MiB`.
    #[must_use]
    pub fn per_frame_commands_bytes(&self) -> usize {
        (self.per_frame_commands_size_mb * 1024 * 1024)
            .min(self.command_buffer_size_mb * 1024 * 1024 - 1024 * 1024)
    }
}

/// Fluent builder for [`EngineConfig`].
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn with_feature_level(mut self, level: FeatureLevel) -> Self {
        self.config.feature_level = level;
        self
    }

    pub fn with_paused(mut self, paused: bool) -> Self {
        self.config.paused = paused;
        self
    }

    pub fn with_command_buffer_sizes(
        mut self,
        min_mb: usize,
        total_mb: usize,
        per_frame_mb: usize,
        per_render_pass_arena_mb: usize,
    ) -> Self {
        self.config.min_command_buffer_size_mb = min_mb;
        self.config.command_buffer_size_mb = total_mb;
        self.config.per_frame_commands_size_mb = per_frame_mb;
        self.config.per_render_pass_arena_size_mb = per_render_pass_arena_mb;
        self
    }

    pub fn with_job_system_thread_count(mut self, count: usize) -> Self {
        self.config.job_system_thread_count = count;
        self
    }

    pub fn with_stereoscopic(mut self, kind: StereoscopicType, eye_count: u8) -> Self {
        self.config.stereoscopic_type = kind;
        let clamped = eye_count.clamp(1, MAX_EYES);
        if clamped != eye_count {
            log::warn!("requested {eye_count} stereo eyes, clamping to {clamped} (max {MAX_EYES})");
        }
        self.config.stereoscopic_eye_count = clamped;
        self
    }

    pub fn with_gpu_context_priority(mut self, priority: GpuContextPriority) -> Self {
        self.config.gpu_context_priority = priority;
        self
    }

    pub fn with_threaded(mut self, threaded: bool) -> Self {
        self.config.threaded = threaded;
        self
    }

    pub fn with_feature_flag(mut self, name: impl Into<String>, value: bool) -> Self {
        self.config.feature_flags.insert(name.into(), value);
        self
    }

    pub fn build(self) -> EngineConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_respects_size_budget() {
        let cfg = EngineConfig::default();
        assert!(cfg.per_frame_commands_bytes() <= cfg.command_buffer_size_mb * 1024 * 1024);
    }

    #[test]
    fn builder_overrides_defaults() {
        let cfg = EngineConfigBuilder::new()
            .with_backend(Backend::Null)
            .with_threaded(false)
            .with_stereoscopic(StereoscopicType::Instanced, 9)
            .build();
        assert_eq!(cfg.backend, Backend::Null);
        assert!(!cfg.threaded);
        assert_eq!(cfg.stereoscopic_eye_count, MAX_EYES);
    }

    #[test]
    fn resolved_job_thread_count_is_never_zero() {
        let cfg = EngineConfigBuilder::new()
            .with_job_system_thread_count(0)
            .build();
        assert!(cfg.resolved_job_thread_count() >= 1);
    }
}
