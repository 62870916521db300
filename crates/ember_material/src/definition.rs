//! One parsed package, immutable once built (§3.4, §4.5).

use ember_core::error::{EmberError, Result};
use ember_driver::{BufferUsage, TextureUsage};

use crate::parser::{Chunk, MaterialParser, ShaderLanguage, ShaderModel, ShaderStage};
use crate::tags;

/// What a material is allowed to be used for (§3.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaterialDomain {
    Surface,
    PostProcess,
    Compute,
}

/// One binding inside an interface block (uniform or sampler).
#[derive(Debug, Clone)]
pub struct InterfaceBinding {
    pub name: String,
    pub binding: u32,
    pub set: u32,
}

/// Raster/blend state a surface material's pipeline is built with.
#[derive(Debug, Clone, Copy)]
pub struct RasterState {
    pub blending_enabled: bool,
    pub depth_write: bool,
    pub depth_test: bool,
    pub double_sided: bool,
}

impl Default for RasterState {
    fn default() -> Self {
        Self {
            blending_enabled: false,
            depth_write: true,
            depth_test: true,
            double_sided: false,
        }
    }
}

/// A single reserved or user specialization constant declaration.
#[derive(Debug, Clone)]
pub struct SpecConstant {
    pub id: u32,
    pub name: String,
    pub default_value: SpecConstantValue,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SpecConstantValue {
    Bool(bool),
    Int(i32),
    Float(f32),
}

/// First `reserved_count` spec-constant ids are engine-controlled (SH
/// bands, shadow sampling method, debug toggles); the rest are
/// material-defined (§4.7.4).
pub const CONFIG_MAX_RESERVED_SPEC_CONSTANTS: u32 = 8;

/// Immutable, parser-backed description of one material package.
pub struct MaterialDefinition {
    pub name: String,
    pub domain: MaterialDomain,
    pub raster_state: RasterState,
    pub uniform_block: Vec<InterfaceBinding>,
    pub sampler_block: Vec<InterfaceBinding>,
    pub spec_constants: Vec<SpecConstant>,
    pub texture_usage: TextureUsage,
    pub buffer_usage: BufferUsage,
    /// Identifies this definition's compiled programs in backend-side
    /// caches (§4.7.3's `hash(definition.cache_id, variant.key)`).
    pub cache_id: u64,
    /// Owning package's CRC32; also the [`crate::cache::MaterialCache`] key.
    pub crc32: u32,
    /// Whether the package embeds its own depth-pass shader, rather than
    /// relying on the default material's (§4.7.2).
    pub has_custom_depth_shader: bool,
    data: Vec<u8>,
}

impl MaterialDefinition {
    /// Parses `data` with the platform's shader-language preference list.
    pub fn parse(data: Vec<u8>, preferred_languages: &[ShaderLanguage]) -> Result<Self> {
        let parser = MaterialParser::new(&data, preferred_languages)?;

        let name = parser
            .chunk(tags::MATERIAL_NAME)
            .map(|c| String::from_utf8_lossy(c.payload).into_owned())
            .unwrap_or_default();

        let crc32 = parser
            .get_precomputed_crc32()
            .unwrap_or_else(|| parser.compute_crc32());

        let cache_id = xxhash_rust::xxh3::xxh3_64(&data);
        let has_custom_depth_shader = parser.has_custom_depth_shader();

        let uniform_block = parser
            .chunk(tags::MATERIAL_UIB)
            .map(parse_interface_block)
            .transpose()?
            .unwrap_or_default();
        let sampler_block = parser
            .chunk(tags::MATERIAL_SIB)
            .map(parse_interface_block)
            .transpose()?
            .unwrap_or_default();
        let spec_constants = parser
            .chunk(tags::MATERIAL_CONSTANTS)
            .map(parse_spec_constants)
            .transpose()?
            .unwrap_or_default();
        let (domain, raster_state, texture_usage, buffer_usage) = parser
            .chunk(tags::MATERIAL_RASTER_STATE)
            .map(parse_raster_state)
            .transpose()?
            .unwrap_or((MaterialDomain::Surface, RasterState::default(), TextureUsage::empty(), BufferUsage::UNIFORM));

        drop(parser);
        Ok(Self {
            name,
            domain,
            raster_state,
            uniform_block,
            sampler_block,
            spec_constants,
            texture_usage,
            buffer_usage,
            cache_id,
            crc32,
            has_custom_depth_shader,
            data,
        })
    }

    /// Re-opens a view over this definition's backing bytes to pull shader
    /// source for a program build (§4.7.3 step 2). The parser is cheap to
    /// reconstruct and not worth keeping alive across the `'static`
    /// lifetime a cached [`MaterialDefinition`] needs.
    pub(crate) fn shader_bytes(
        &self,
        preferred_languages: &[ShaderLanguage],
        model: ShaderModel,
        variant: u8,
        stage: ShaderStage,
    ) -> Option<Vec<u8>> {
        let parser = MaterialParser::new(&self.data, preferred_languages).ok()?;
        parser.shader(model, variant, stage).map(<[u8]>::to_vec)
    }

    #[must_use]
    pub fn chosen_language(&self, preferred_languages: &[ShaderLanguage]) -> Option<ShaderLanguage> {
        MaterialParser::new(&self.data, preferred_languages)
            .ok()
            .map(|p| p.chosen_language())
    }
}

/// Reads a `u32` out of `payload` at `offset`, little-endian.
fn read_u32(payload: &[u8], offset: usize) -> Result<u32> {
    payload
        .get(offset..offset + 4)
        .map(|b| u32::from_le_bytes(b.try_into().unwrap()))
        .ok_or_else(|| EmberError::MalformedPackage("truncated interface block entry".into()))
}

/// `MUIB`/`MSIB` payload: `count:u32`, then per entry
/// `name_len:u32, name:[u8; name_len], binding:u32, set:u32`.
fn parse_interface_block(chunk: Chunk) -> Result<Vec<InterfaceBinding>> {
    let payload = chunk.payload;
    let count = read_u32(payload, 0)? as usize;
    let mut offset = 4;
    let mut bindings = Vec::with_capacity(count);
    for _ in 0..count {
        let name_len = read_u32(payload, offset)? as usize;
        offset += 4;
        let name_bytes = payload
            .get(offset..offset + name_len)
            .ok_or_else(|| EmberError::MalformedPackage("truncated interface block name".into()))?;
        let name = String::from_utf8_lossy(name_bytes).into_owned();
        offset += name_len;
        let binding = read_u32(payload, offset)?;
        offset += 4;
        let set = read_u32(payload, offset)?;
        offset += 4;
        bindings.push(InterfaceBinding { name, binding, set });
    }
    Ok(bindings)
}

/// `MCON` payload: `count:u32`, then per entry `id:u32, name_len:u32,
/// name:[u8; name_len], value_tag:u8 (0=bool,1=int,2=float), value:[u8; 4]`.
/// Entries whose id falls in the engine-reserved range
/// (`id < CONFIG_MAX_RESERVED_SPEC_CONSTANTS`) are a malformed package —
/// those ids are filled in by the engine, never declared by a material —
/// and are skipped with a warning rather than rejecting the whole package.
fn parse_spec_constants(chunk: Chunk) -> Result<Vec<SpecConstant>> {
    let payload = chunk.payload;
    let count = read_u32(payload, 0)? as usize;
    let mut offset = 4;
    let mut constants = Vec::with_capacity(count);
    for _ in 0..count {
        let id = read_u32(payload, offset)?;
        offset += 4;
        let name_len = read_u32(payload, offset)? as usize;
        offset += 4;
        let name_bytes = payload
            .get(offset..offset + name_len)
            .ok_or_else(|| EmberError::MalformedPackage("truncated spec constant name".into()))?;
        let name = String::from_utf8_lossy(name_bytes).into_owned();
        offset += name_len;
        let value_tag = *payload
            .get(offset)
            .ok_or_else(|| EmberError::MalformedPackage("truncated spec constant value".into()))?;
        offset += 1;
        let value_bytes = payload
            .get(offset..offset + 4)
            .ok_or_else(|| EmberError::MalformedPackage("truncated spec constant value".into()))?;
        let default_value = match value_tag {
            0 => SpecConstantValue::Bool(value_bytes[0] != 0),
            1 => SpecConstantValue::Int(i32::from_le_bytes(value_bytes.try_into().unwrap())),
            2 => SpecConstantValue::Float(f32::from_le_bytes(value_bytes.try_into().unwrap())),
            other => {
                return Err(EmberError::MalformedPackage(format!("unknown spec constant value tag {other}")))
            }
        };
        offset += 4;
        if id < CONFIG_MAX_RESERVED_SPEC_CONSTANTS {
            log::warn!("material declares reserved spec constant id {id} ('{name}'), ignoring");
            continue;
        }
        constants.push(SpecConstant { id, name, default_value });
    }
    Ok(constants)
}

/// `MRST` payload (16 bytes): `domain:u8, blending_enabled:u8,
/// depth_write:u8, depth_test:u8, double_sided:u8, _pad:[u8; 3],
/// texture_usage:u32, buffer_usage:u32`.
fn parse_raster_state(chunk: Chunk) -> Result<(MaterialDomain, RasterState, TextureUsage, BufferUsage)> {
    let payload = chunk.payload;
    if payload.len() < 16 {
        return Err(EmberError::MalformedPackage("truncated raster state chunk".into()));
    }
    let domain = match payload[0] {
        0 => MaterialDomain::Surface,
        1 => MaterialDomain::PostProcess,
        2 => MaterialDomain::Compute,
        other => return Err(EmberError::MalformedPackage(format!("unknown material domain tag {other}"))),
    };
    let raster_state = RasterState {
        blending_enabled: payload[1] != 0,
        depth_write: payload[2] != 0,
        depth_test: payload[3] != 0,
        double_sided: payload[4] != 0,
    };
    let texture_usage = TextureUsage::from_bits_truncate(read_u32(payload, 8)?);
    let buffer_usage = BufferUsage::from_bits_truncate(read_u32(payload, 12)?);
    Ok((domain, raster_state, texture_usage, buffer_usage))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::test_support::minimal_package;

    #[test]
    fn parse_extracts_name_and_cache_id() {
        let pkg = minimal_package("lit");
        let def = MaterialDefinition::parse(pkg, &[ShaderLanguage::Essl3]).unwrap();
        assert_eq!(def.name, "lit");
        assert_ne!(def.cache_id, 0);
    }

    #[test]
    fn identical_packages_have_identical_cache_id_and_crc32() {
        let a = MaterialDefinition::parse(minimal_package("lit"), &[ShaderLanguage::Essl3]).unwrap();
        let b = MaterialDefinition::parse(minimal_package("lit"), &[ShaderLanguage::Essl3]).unwrap();
        assert_eq!(a.cache_id, b.cache_id);
        assert_eq!(a.crc32, b.crc32);
    }

    fn push_chunk(data: &mut Vec<u8>, tag: u32, payload: &[u8]) {
        data.extend_from_slice(&tag.to_le_bytes());
        data.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        data.extend_from_slice(payload);
    }

    fn push_interface_binding(payload: &mut Vec<u8>, name: &str, binding: u32, set: u32) {
        let name_bytes = name.as_bytes();
        payload.extend_from_slice(&(name_bytes.len() as u32).to_le_bytes());
        payload.extend_from_slice(name_bytes);
        payload.extend_from_slice(&binding.to_le_bytes());
        payload.extend_from_slice(&set.to_le_bytes());
    }

    /// Builds a package with `MNAM` plus `MUIB`/`MSIB`/`MCON`/`MRST`
    /// structural chunks, exercising every branch `parse()` has beyond
    /// name/crc32 extraction.
    fn package_with_structural_chunks(name: &str) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&tags::MAGIC.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&5u32.to_le_bytes());

        let name_bytes = name.as_bytes();
        push_chunk(&mut data, tags::MATERIAL_NAME, name_bytes);

        let mut uib = Vec::new();
        uib.extend_from_slice(&1u32.to_le_bytes());
        push_interface_binding(&mut uib, "frame_uniforms", 0, 0);
        push_chunk(&mut data, tags::MATERIAL_UIB, &uib);

        let mut sib = Vec::new();
        sib.extend_from_slice(&2u32.to_le_bytes());
        push_interface_binding(&mut sib, "albedo", 0, 1);
        push_interface_binding(&mut sib, "normal", 1, 1);
        push_chunk(&mut data, tags::MATERIAL_SIB, &sib);

        let mut con = Vec::new();
        con.extend_from_slice(&2u32.to_le_bytes());
        // reserved id, must be skipped with a warning rather than kept.
        con.extend_from_slice(&0u32.to_le_bytes());
        con.extend_from_slice(&3u32.to_le_bytes());
        con.extend_from_slice(b"sh_band_count");
        con.push(1); // int
        con.extend_from_slice(&3i32.to_le_bytes());
        // material-declared id, must survive.
        con.extend_from_slice(&CONFIG_MAX_RESERVED_SPEC_CONSTANTS.to_le_bytes());
        con.extend_from_slice(&11u32.to_le_bytes());
        con.extend_from_slice(b"roughness_override");
        con.push(2); // float
        con.extend_from_slice(&0.5f32.to_le_bytes());
        push_chunk(&mut data, tags::MATERIAL_CONSTANTS, &con);

        let mut rst = Vec::new();
        rst.push(1); // PostProcess
        rst.push(1); // blending_enabled
        rst.push(0); // depth_write
        rst.push(0); // depth_test
        rst.push(1); // double_sided
        rst.extend_from_slice(&[0u8; 3]); // pad
        rst.extend_from_slice(&TextureUsage::SAMPLEABLE.bits().to_le_bytes());
        rst.extend_from_slice(&BufferUsage::UNIFORM.bits().to_le_bytes());
        push_chunk(&mut data, tags::MATERIAL_RASTER_STATE, &rst);

        data
    }

    #[test]
    fn parse_reads_interface_blocks_and_raster_state() {
        let pkg = package_with_structural_chunks("coated");
        let def = MaterialDefinition::parse(pkg, &[ShaderLanguage::Essl3]).unwrap();

        assert_eq!(def.uniform_block.len(), 1);
        assert_eq!(def.uniform_block[0].name, "frame_uniforms");
        assert_eq!(def.sampler_block.len(), 2);
        assert_eq!(def.sampler_block[1].name, "normal");
        assert_eq!(def.sampler_block[1].set, 1);

        assert_eq!(def.domain, MaterialDomain::PostProcess);
        assert!(def.raster_state.blending_enabled);
        assert!(!def.raster_state.depth_write);
        assert!(def.raster_state.double_sided);
        assert_eq!(def.texture_usage, TextureUsage::SAMPLEABLE);
        assert_eq!(def.buffer_usage, BufferUsage::UNIFORM);
    }

    #[test]
    fn parse_skips_reserved_spec_constant_ids() {
        let pkg = package_with_structural_chunks("coated");
        let def = MaterialDefinition::parse(pkg, &[ShaderLanguage::Essl3]).unwrap();

        assert_eq!(def.spec_constants.len(), 1);
        assert_eq!(def.spec_constants[0].id, CONFIG_MAX_RESERVED_SPEC_CONSTANTS);
        assert_eq!(def.spec_constants[0].name, "roughness_override");
        assert_eq!(def.spec_constants[0].default_value, SpecConstantValue::Float(0.5));
    }

    #[test]
    fn parse_without_structural_chunks_falls_back_to_defaults() {
        let def = MaterialDefinition::parse(minimal_package("lit"), &[ShaderLanguage::Essl3]).unwrap();
        assert!(def.uniform_block.is_empty());
        assert!(def.sampler_block.is_empty());
        assert!(def.spec_constants.is_empty());
        assert_eq!(def.domain, MaterialDomain::Surface);
        assert_eq!(def.texture_usage, TextureUsage::empty());
        assert_eq!(def.buffer_usage, BufferUsage::UNIFORM);
    }
}
