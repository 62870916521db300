//! Read-only view over a chunked binary material package (§4.5, §6.1).
//!
//! Parsing never allocates GPU resources; it only validates chunk
//! structure and picks the best-matching shader language off the
//! platform's preference list.

use std::ops::Range;
use std::sync::atomic::{AtomicU32, Ordering};

use rustc_hash::FxHashMap;

use ember_core::error::{EmberError, Result};

use crate::tags;

/// Shader source languages a package may embed, in the order the original
/// source tries them (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderLanguage {
    Essl1,
    Essl3,
    Glsl,
    SpirV,
    Msl,
    Wgsl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShaderModel {
    Mobile,
    Desktop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
}

/// A non-owning view over one chunk's payload bytes.
#[derive(Debug, Clone, Copy)]
pub struct Chunk<'a> {
    pub tag: u32,
    pub payload: &'a [u8],
}

/// `(language, model, variant, stage)` — the key a shader chunk is
/// indexed under, since one package embeds a shader per variant per
/// language per stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ShaderKey {
    language: ShaderLanguage,
    model: ShaderModel,
    variant: u8,
    stage: ShaderStage,
}

/// Non-owning view over a package buffer. Holds a blob dictionary index
/// (chunk tag → byte range) plus the platform's preferred language list
/// and the language this parser settled on.
pub struct MaterialParser<'a> {
    data: &'a [u8],
    chunks: FxHashMap<u32, Range<usize>>,
    shaders: FxHashMap<ShaderKey, Range<usize>>,
    chosen_language: ShaderLanguage,
    crc32_cache: AtomicU32,
}

const HEADER_LEN: usize = 12;
const CHUNK_HEADER_LEN: usize = 8;
const SHADER_RECORD_HEADER_LEN: usize = 4;

impl<'a> MaterialParser<'a> {
    /// Indexes every chunk in `data` and chooses the first language in
    /// `preferred_languages` that the package actually embeds a shader for.
    pub fn new(data: &'a [u8], preferred_languages: &[ShaderLanguage]) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(EmberError::MalformedPackage("truncated header".into()));
        }
        let magic = u32::from_le_bytes(data[0..4].try_into().unwrap());
        if magic != tags::MAGIC {
            return Err(EmberError::MalformedPackage("bad magic".into()));
        }
        let version = u32::from_le_bytes(data[4..8].try_into().unwrap());
        if version != 1 {
            return Err(EmberError::UnsupportedVersion(version));
        }
        let chunk_count = u32::from_le_bytes(data[8..12].try_into().unwrap());

        let mut chunks = FxHashMap::default();
        let mut shaders = FxHashMap::default();
        let mut offset = HEADER_LEN;
        for _ in 0..chunk_count {
            if offset + CHUNK_HEADER_LEN > data.len() {
                return Err(EmberError::MalformedPackage("truncated chunk header".into()));
            }
            let tag = u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap());
            let size = u32::from_le_bytes(data[offset + 4..offset + 8].try_into().unwrap()) as usize;
            let payload_start = offset + CHUNK_HEADER_LEN;
            let payload_end = payload_start + size;
            if payload_end > data.len() {
                return Err(EmberError::MalformedPackage("truncated chunk payload".into()));
            }

            if tag == tags::MATERIAL_SHADER {
                let key = parse_shader_record_key(&data[payload_start..payload_end])?;
                let body_start = payload_start + SHADER_RECORD_HEADER_LEN;
                shaders.insert(key, body_start..payload_end);
            } else {
                chunks.insert(tag, payload_start..payload_end);
            }
            offset = payload_end;
        }

        let chosen_language = preferred_languages
            .iter()
            .copied()
            .find(|lang| shaders.keys().any(|k| k.language == *lang))
            .ok_or(EmberError::NoMatchingShaderLanguage)?;

        Ok(Self {
            data,
            chunks,
            shaders,
            chosen_language,
            crc32_cache: AtomicU32::new(0),
        })
    }

    #[must_use]
    pub fn chosen_language(&self) -> ShaderLanguage {
        self.chosen_language
    }

    #[must_use]
    pub fn chunk(&self, tag: u32) -> Option<Chunk<'a>> {
        self.chunks.get(&tag).map(|range| Chunk {
            tag,
            payload: &self.data[range.clone()],
        })
    }

    /// Retrieves shader bytes for `(model, variant, stage)` in whatever
    /// language this parser chose.
    #[must_use]
    pub fn shader(&self, model: ShaderModel, variant: u8, stage: ShaderStage) -> Option<&'a [u8]> {
        let key = ShaderKey {
            language: self.chosen_language,
            model,
            variant,
            stage,
        };
        self.shaders.get(&key).map(|range| &self.data[range.clone()])
    }

    /// A package-embedded CRC32, if the package author precomputed one —
    /// preferred over [`Self::compute_crc32`] when present (§4.5).
    #[must_use]
    pub fn get_precomputed_crc32(&self) -> Option<u32> {
        let chunk = self.chunk(tags::MATERIAL_CRC32)?;
        chunk.payload.get(0..4).map(|b| u32::from_le_bytes(b.try_into().unwrap()))
    }

    /// CRC32 over the whole package buffer, memoized in an atomic (`0`
    /// means "not yet computed", matching the source's sentinel).
    pub fn compute_crc32(&self) -> u32 {
        let cached = self.crc32_cache.load(Ordering::Acquire);
        if cached != 0 {
            return cached;
        }
        let crc = crc32fast::hash(self.data).max(1);
        self.crc32_cache.store(crc, Ordering::Release);
        crc
    }

    #[must_use]
    pub fn package_len(&self) -> usize {
        self.data.len()
    }

    /// Whether this package embeds a shader record whose variant byte has
    /// the depth bit (`1 << 7`) set — i.e. it supplies its own depth-pass
    /// shader rather than relying on the default material's (§4.7.2).
    #[must_use]
    pub fn has_custom_depth_shader(&self) -> bool {
        self.shaders.keys().any(|k| k.variant & (1 << 7) != 0)
    }
}

fn parse_shader_record_key(payload: &[u8]) -> Result<ShaderKey> {
    if payload.len() < SHADER_RECORD_HEADER_LEN {
        return Err(EmberError::MalformedPackage("truncated shader record".into()));
    }
    let language = match payload[0] {
        0 => ShaderLanguage::Essl1,
        1 => ShaderLanguage::Essl3,
        2 => ShaderLanguage::Glsl,
        3 => ShaderLanguage::SpirV,
        4 => ShaderLanguage::Msl,
        5 => ShaderLanguage::Wgsl,
        other => return Err(EmberError::MalformedPackage(format!("unknown shader language tag {other}"))),
    };
    let model = match payload[1] {
        0 => ShaderModel::Mobile,
        1 => ShaderModel::Desktop,
        other => return Err(EmberError::MalformedPackage(format!("unknown shader model tag {other}"))),
    };
    let variant = payload[2];
    let stage = match payload[3] {
        0 => ShaderStage::Vertex,
        1 => ShaderStage::Fragment,
        2 => ShaderStage::Compute,
        other => return Err(EmberError::MalformedPackage(format!("unknown shader stage tag {other}"))),
    };
    Ok(ShaderKey {
        language,
        model,
        variant,
        stage,
    })
}


#[cfg(test)]
mod tests {
    use super::test_support::minimal_package;
    use super::*;

    #[test]
    fn parses_name_and_shader_chunks() {
        let pkg = minimal_package("lit");
        let parser = MaterialParser::new(&pkg, &[ShaderLanguage::Essl3]).unwrap();
        assert_eq!(parser.chosen_language(), ShaderLanguage::Essl3);
        let name_chunk = parser.chunk(tags::MATERIAL_NAME).unwrap();
        assert_eq!(name_chunk.payload, b"lit");
        let shader = parser.shader(ShaderModel::Desktop, 0, ShaderStage::Fragment).unwrap();
        assert_eq!(shader, b"void main() {}");
    }

    #[test]
    fn no_matching_language_is_an_error() {
        let pkg = minimal_package("lit");
        let err = MaterialParser::new(&pkg, &[ShaderLanguage::Wgsl]).unwrap_err();
        assert!(matches!(err, EmberError::NoMatchingShaderLanguage));
    }

    #[test]
    fn crc32_is_memoized_and_stable() {
        let pkg = minimal_package("lit");
        let parser = MaterialParser::new(&pkg, &[ShaderLanguage::Essl3]).unwrap();
        let a = parser.compute_crc32();
        let b = parser.compute_crc32();
        assert_eq!(a, b);
        assert_ne!(a, 0);
    }

    #[test]
    fn identical_packages_share_crc32() {
        let a = minimal_package("lit");
        let b = minimal_package("lit");
        let pa = MaterialParser::new(&a, &[ShaderLanguage::Essl3]).unwrap();
        let pb = MaterialParser::new(&b, &[ShaderLanguage::Essl3]).unwrap();
        assert_eq!(pa.compute_crc32(), pb.compute_crc32());
    }
}
