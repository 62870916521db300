//! Chunk tag numbers for the material package binary layout (§6.1).
//!
//! These values are an interoperability constraint, not an implementation
//! detail: external tooling identifies chunks by tag number, so the names
//! are kept but the numbers must never be renumbered once shipped.

pub const MATERIAL_VERSION: u32 = 0x4D56_4552; // "MVER"
pub const MATERIAL_FEATURE_LEVEL: u32 = 0x4D46_4C56; // "MFLV"
pub const MATERIAL_NAME: u32 = 0x4D4E_414D; // "MNAM"
pub const MATERIAL_UIB: u32 = 0x4D55_4942; // "MUIB"
pub const MATERIAL_SIB: u32 = 0x4D53_4942; // "MSIB"
pub const MATERIAL_SUBPASS: u32 = 0x4D53_5550; // "MSUP"
/// Packed domain/raster-state/usage blob, one chunk instead of the
/// original's several scalar getters (`getMaterialDomain`, `getDepthWrite`,
/// `getDoubleSided`, `getDepthTest`, ...) — consistent with this package
/// format's existing preference for one TLV chunk over many single-scalar
/// ones (see `MATERIAL_SHADER`'s packed sub-header).
pub const MATERIAL_RASTER_STATE: u32 = 0x4D52_5354; // "MRST"
pub const MATERIAL_BINDING_UNIFORM_INFO: u32 = 0x4D42_5549; // "MBUI"
pub const MATERIAL_ATTRIBUTE_INFO: u32 = 0x4D41_5449; // "MATI"
pub const MATERIAL_DESCRIPTOR_BINDINGS_INFO: u32 = 0x4D44_4249; // "MDBI"
pub const MATERIAL_DESCRIPTOR_SET_LAYOUT_INFO: u32 = 0x4D44_534C; // "MDSL"
pub const MATERIAL_CONSTANTS: u32 = 0x4D43_4F4E; // "MCON"
pub const MATERIAL_PUSH_CONSTANTS: u32 = 0x4D50_4353; // "MPCS"
pub const MATERIAL_SHADER: u32 = 0x4D53_4844; // "MSHD"
pub const MATERIAL_CRC32: u32 = 0x4D43_5243; // "MCRC"

pub const MAGIC: u32 = 0x4650_4948; // "FPIH"
