//! Error Types
//!
//! Recoverable, user-triggerable failures flow through [`EmberError`] /
//! [`Result`]. Contract violations (double free, reading an undeclared
//! frame-graph resource, a stale handle use) are bugs, not recoverable
//! errors, and are reported with `panic!`/`assert!` at the call site instead
//! — see §7 of the design spec for the full policy table.

use thiserror::Error;

/// The workspace-wide error type.
///
/// Every crate that can fail in a way the caller might recover from
/// returns `Result<T, EmberError>`. Internal invariant violations are not
/// represented here; they panic.
#[derive(Error, Debug)]
pub enum EmberError {
    /// The material package is structurally invalid (bad magic, truncated
    /// chunk, or an unknown chunk tag the parser cannot skip safely).
    #[error("malformed material package: {0}")]
    MalformedPackage(String),

    /// The package declares a version the parser does not understand.
    #[error("unsupported material package version: {0}")]
    UnsupportedVersion(u32),

    /// None of the package's shader-language chunks match any language the
    /// platform accepts.
    #[error("no shader language in package matches platform preference list")]
    NoMatchingShaderLanguage,

    /// A chunk the definition needs was not present in the package.
    #[error("material package missing required chunk: {0}")]
    MissingChunk(&'static str),

    /// `Engine::builder().build()` was given an inconsistent configuration.
    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),

    /// The backend reported a program link/compile failure.
    #[error("backend program compilation failed: {0}")]
    ProgramCompileFailed(String),

    /// The command stream could not make progress (ring exhausted past its
    /// configured budget); this is raised as an error only in contexts that
    /// asked to probe rather than panic (e.g. a bounded `try_alloc`).
    #[error("command buffer budget exceeded: requested {requested} bytes, {available} available")]
    CommandBufferExhausted { requested: usize, available: usize },
}

/// Alias for `Result<T, EmberError>`.
pub type Result<T> = std::result::Result<T, EmberError>;
