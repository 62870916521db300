//! Material packages: binary parsing, the immutable per-package
//! definition, the variant-keyed per-instance program cache, and the
//! process-wide definition cache that dedups identical packages (§3.4,
//! §4.5-§4.7).
//!
//! The shape mirrors the teacher's resource/material module: a parser that
//! only understands bytes, a definition that owns the parsed, validated
//! result, and an instance type that layers mutable per-material state
//! (program cache, constant overrides) on top of a shared, immutable
//! definition.

mod builtin;
mod cache;
mod definition;
mod material;
mod parser;
mod tags;
mod variant;

pub use builtin::default_material_package;
pub use cache::MaterialCache;
pub use definition::{
    InterfaceBinding, MaterialDefinition, MaterialDomain, RasterState, SpecConstant,
    SpecConstantValue, CONFIG_MAX_RESERVED_SPEC_CONSTANTS,
};
pub use material::Material;
pub use parser::{Chunk, MaterialParser, ShaderLanguage, ShaderModel, ShaderStage};
pub use variant::{Variant, VALID_DEPTH_MASK};
