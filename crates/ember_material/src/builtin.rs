//! The engine's built-in default material package (§4.8: "default
//! resources" an `Engine` creates at startup).
//!
//! A minimal, always-valid package: a name chunk plus one vertex and one
//! fragment shader record at the empty variant, enough for
//! [`crate::Material::get_program`] to link a real program through any
//! backend. Real tooling (out of scope here) would author this material
//! from source and bake it through the same packaging pipeline user
//! materials go through; this is the in-process fallback so the engine
//! never has zero materials to fall back on.

use crate::tags;

const DEFAULT_VERTEX_SOURCE: &[u8] = b"// default material vertex stage\nvoid main() {}\n";
const DEFAULT_FRAGMENT_SOURCE: &[u8] =
    b"// default material fragment stage: flat magenta\nvoid main() { fragColor = vec4(1.0, 0.0, 1.0, 1.0); }\n";

/// Builds the default material's package bytes in this crate's binary
/// layout (§6.1).
#[must_use]
pub fn default_material_package() -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&tags::MAGIC.to_le_bytes());
    data.extend_from_slice(&1u32.to_le_bytes()); // version
    data.extend_from_slice(&3u32.to_le_bytes()); // chunk_count

    let name = b"DefaultMaterial";
    data.extend_from_slice(&tags::MATERIAL_NAME.to_le_bytes());
    data.extend_from_slice(&(name.len() as u32).to_le_bytes());
    data.extend_from_slice(name);

    push_shader_record(&mut data, 0, 0, DEFAULT_VERTEX_SOURCE); // ESSL3, Desktop, variant 0, Vertex
    push_shader_record(&mut data, 0, 1, DEFAULT_FRAGMENT_SOURCE); // ESSL3, Desktop, variant 0, Fragment

    data
}

fn push_shader_record(data: &mut Vec<u8>, variant: u8, stage: u8, body: &[u8]) {
    let mut payload = vec![1u8, 1u8, variant, stage]; // language=ESSL3, model=Desktop
    payload.extend_from_slice(body);
    data.extend_from_slice(&tags::MATERIAL_SHADER.to_le_bytes());
    data.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    data.extend_from_slice(&payload);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::MaterialDefinition;
    use crate::parser::ShaderLanguage;

    #[test]
    fn default_material_package_parses() {
        let def = MaterialDefinition::parse(default_material_package(), &[ShaderLanguage::Essl3]).unwrap();
        assert_eq!(def.name, "DefaultMaterial");
        assert!(!def.has_custom_depth_shader);
    }
}
