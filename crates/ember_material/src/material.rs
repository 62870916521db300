//! A material instance: a definition plus a variant-indexed program cache
//! and effective specialization-constant values (§3.4, §4.7).

use rustc_hash::FxHashMap;
use std::sync::Arc;

use ember_driver::{DriverApi, ProgramDescriptor, ProgramHandle, SpecConstantOverride};

use crate::definition::{MaterialDefinition, SpecConstantValue};
use crate::parser::{ShaderLanguage, ShaderModel, ShaderStage};
use crate::variant::{Variant, VALID_DEPTH_MASK};

/// A material: a definition plus this instance's program cache and
/// specialization-constant overrides.
pub struct Material {
    definition: Arc<MaterialDefinition>,
    preferred_languages: Vec<ShaderLanguage>,
    programs: FxHashMap<Variant, ProgramHandle>,
    constant_overrides: FxHashMap<u32, SpecConstantValue>,
    is_default: bool,
    ubo_batching: bool,
}

impl Material {
    #[must_use]
    pub fn new(definition: Arc<MaterialDefinition>, preferred_languages: Vec<ShaderLanguage>) -> Self {
        Self {
            definition,
            preferred_languages,
            programs: FxHashMap::default(),
            constant_overrides: FxHashMap::default(),
            is_default: false,
            ubo_batching: false,
        }
    }

    /// Builds a non-default material, pre-populating its depth-variant
    /// program slots from `default` when this definition has no custom
    /// depth shader (§4.7.2) — ownership of those programs stays with
    /// `default`; this material's `destroy_programs` never touches them.
    #[must_use]
    pub fn new_with_shared_depth(
        definition: Arc<MaterialDefinition>,
        preferred_languages: Vec<ShaderLanguage>,
        default: &Material,
    ) -> Self {
        let mut material = Self::new(definition, preferred_languages);
        if !material.has_custom_depth_shader() {
            for (&variant, &handle) in &default.programs {
                if variant.is_depth_variant() {
                    material.programs.insert(variant, handle);
                }
            }
        }
        material
    }

    #[must_use]
    pub fn is_default(&self) -> bool {
        self.is_default
    }

    pub fn mark_as_default(&mut self) {
        self.is_default = true;
    }

    #[must_use]
    pub fn ubo_batching_enabled(&self) -> bool {
        self.ubo_batching
    }

    pub fn set_ubo_batching(&mut self, enabled: bool) {
        self.ubo_batching = enabled;
    }

    #[must_use]
    pub fn definition(&self) -> &MaterialDefinition {
        &self.definition
    }

    fn has_custom_depth_shader(&self) -> bool {
        self.definition.has_custom_depth_shader
    }

    /// Runs for the default material only: compiles every depth variant
    /// up front so non-default materials can share the handles (§4.7.2).
    pub fn precache_depth_variants(&mut self, driver: &mut dyn DriverApi) {
        let mut compiled: FxHashMap<Variant, ProgramHandle> = FxHashMap::default();
        for raw in 0u16..=255 {
            let variant = Variant::from_bits_truncate(raw as u8);
            if !variant.is_depth_variant() {
                continue;
            }
            let filtered = variant.filter_vertex();
            let handle = *compiled
                .entry(filtered)
                .or_insert_with(|| self.compile_program(filtered, driver));
            self.programs.insert(variant, handle);
        }
    }

    /// Returns the compiled program for `variant`, compiling and caching
    /// it on first use (§4.7.3).
    pub fn get_program(&mut self, variant: Variant, driver: &mut dyn DriverApi) -> ProgramHandle {
        if let Some(&handle) = self.programs.get(&variant) {
            return handle;
        }
        let handle = self.compile_program(variant, driver);
        self.programs.insert(variant, handle);
        handle
    }

    fn compile_program(&self, variant: Variant, driver: &mut dyn DriverApi) -> ProgramHandle {
        let model = ShaderModel::Desktop;
        let vertex = self
            .definition
            .shader_bytes(&self.preferred_languages, model, variant.filter_vertex().bits(), ShaderStage::Vertex)
            .unwrap_or_default();
        let fragment = self
            .definition
            .shader_bytes(&self.preferred_languages, model, variant.filter_fragment().bits(), ShaderStage::Fragment)
            .unwrap_or_default();
        let language = self
            .definition
            .chosen_language(&self.preferred_languages)
            .unwrap_or(ShaderLanguage::Essl3);
        let multiview = variant.contains(Variant::STEREO);
        let cache_id = xxhash_rust::xxh3::xxh3_64(
            &[self.definition.cache_id.to_le_bytes(), u64::from(variant.bits()).to_le_bytes()].concat(),
        );
        let spec_constants = self
            .constant_overrides
            .iter()
            .map(|(&id, &value)| SpecConstantOverride {
                id,
                value: to_driver_spec_value(value),
            })
            .collect();

        let desc = ProgramDescriptor {
            vertex_shader: vertex,
            fragment_shader: fragment,
            cache_id,
            multiview,
            spec_constants,
        };
        let name = format!("{}#{:02x}", self.definition.name, variant.bits());
        let handle = driver.create_program(&desc, &name);
        if language == ShaderLanguage::Essl1 {
            log::trace!("compiled ESSL1 program {name} with legacy attribute bindings");
        }
        handle
    }

    /// Sets an override for spec-constant `id`. Existing cached programs
    /// are not invalidated automatically; call [`Self::invalidate`] for
    /// the variant range the change actually affects (§4.7.4).
    pub fn set_constant(&mut self, id: u32, value: SpecConstantValue) {
        self.constant_overrides.insert(id, value);
    }

    #[must_use]
    pub fn get_constant(&self, id: u32) -> Option<SpecConstantValue> {
        self.constant_overrides.get(&id).copied().or_else(|| {
            self.definition
                .spec_constants
                .iter()
                .find(|c| c.id == id)
                .map(|c| c.default_value)
        })
    }

    /// Destroys every program this material actually owns, skipping depth
    /// variants it only shares with the default material's cache. Used at
    /// teardown, where [`Self::invalidate`]'s pattern-matching mask/value
    /// pair doesn't express "destroy everything I own."
    pub fn destroy_owned_programs(&mut self, driver: &mut dyn DriverApi) {
        let preserve_shared_depth = !self.is_default && !self.has_custom_depth_shader();
        let to_remove: Vec<Variant> = self
            .programs
            .keys()
            .copied()
            .filter(|v| !(preserve_shared_depth && v.is_depth_variant()))
            .collect();
        for variant in to_remove {
            if let Some(handle) = self.programs.remove(&variant) {
                driver.destroy_program(handle);
            }
        }
    }

    /// Destroys every cached program whose variant bits satisfy
    /// `(k & mask) == value`. Depth variants this material shares with
    /// the default material are force-preserved unless this definition
    /// has its own depth shader (§4.7.5).
    pub fn invalidate(&mut self, mask: Variant, value: Variant, driver: &mut dyn DriverApi) {
        let (mask, value) = if !self.is_default && !self.has_custom_depth_shader() {
            (
                mask | VALID_DEPTH_MASK,
                Variant::from_bits_truncate(value.bits() & !VALID_DEPTH_MASK.bits()),
            )
        } else {
            (mask, value)
        };
        let to_remove: Vec<Variant> = self
            .programs
            .keys()
            .copied()
            .filter(|&k| Variant::from_bits_truncate(k.bits() & mask.bits()) == value)
            .collect();
        for variant in to_remove {
            if let Some(handle) = self.programs.remove(&variant) {
                driver.destroy_program(handle);
            }
        }
    }
}

fn to_driver_spec_value(value: SpecConstantValue) -> ember_driver::SpecConstantValue {
    match value {
        SpecConstantValue::Bool(b) => ember_driver::SpecConstantValue::Bool(b),
        SpecConstantValue::Int(i) => ember_driver::SpecConstantValue::Int(i),
        SpecConstantValue::Float(f) => ember_driver::SpecConstantValue::Float(f),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::test_support::minimal_package;
    use crate::tags;
    use ember_driver::NullDriver;

    /// Like [`minimal_package`] but with real vertex records for variant 0
    /// and variant `SKINNING`, so two distinct variants actually produce
    /// two distinct linked programs through [`NullDriver`] (which refuses
    /// to link a program with an empty stage).
    fn richer_package(name: &str) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&tags::MAGIC.to_le_bytes());
        data.extend_from_slice(&1u32.to_le_bytes());
        data.extend_from_slice(&4u32.to_le_bytes());

        let name_bytes = name.as_bytes();
        data.extend_from_slice(&tags::MATERIAL_NAME.to_le_bytes());
        data.extend_from_slice(&(name_bytes.len() as u32).to_le_bytes());
        data.extend_from_slice(name_bytes);

        let mut push_shader = |data: &mut Vec<u8>, variant: u8, stage: u8, body: &[u8]| {
            let mut payload = vec![1u8, 1u8, variant, stage]; // ESSL3, Desktop
            payload.extend_from_slice(body);
            data.extend_from_slice(&tags::MATERIAL_SHADER.to_le_bytes());
            data.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            data.extend_from_slice(&payload);
        };
        push_shader(&mut data, 0, 0, b"void main() { /* vertex v0 */ }");
        push_shader(&mut data, 1 << 3, 0, b"void main() { /* vertex skinned */ }");
        push_shader(&mut data, 0, 1, b"void main() { /* fragment v0 */ }");

        data
    }

    fn test_material() -> (Material, NullDriver) {
        let def = Arc::new(MaterialDefinition::parse(richer_package("lit"), &[ShaderLanguage::Essl3]).unwrap());
        (Material::new(def, vec![ShaderLanguage::Essl3]), NullDriver::new())
    }

    #[test]
    fn set_then_get_constant_round_trips() {
        let (mut mat, _driver) = test_material();
        mat.set_constant(3, SpecConstantValue::Int(7));
        assert_eq!(mat.get_constant(3), Some(SpecConstantValue::Int(7)));
    }

    #[test]
    fn get_program_caches_by_variant() {
        let (mut mat, mut driver) = test_material();
        let h1 = mat.get_program(Variant::empty(), &mut driver);
        let h2 = mat.get_program(Variant::empty(), &mut driver);
        assert_eq!(h1, h2);
        let h3 = mat.get_program(Variant::SKINNING, &mut driver);
        assert_ne!(h1, h3);
    }

    #[test]
    fn default_material_precaches_depth_variants() {
        let (mut default_mat, mut driver) = test_material();
        default_mat.mark_as_default();
        default_mat.precache_depth_variants(&mut driver);
        assert!(default_mat.programs.keys().all(|v| v.is_depth_variant() || default_mat.programs.is_empty()));
        assert!(!default_mat.programs.is_empty());
    }

    #[test]
    fn non_default_material_shares_depth_programs_with_default() {
        let (mut default_mat, mut driver) = test_material();
        default_mat.mark_as_default();
        default_mat.precache_depth_variants(&mut driver);

        let def = Arc::new(MaterialDefinition::parse(minimal_package("unlit"), &[ShaderLanguage::Essl3]).unwrap());
        let shared = Material::new_with_shared_depth(def, vec![ShaderLanguage::Essl3], &default_mat);

        for (&v, &h) in &default_mat.programs {
            if v.is_depth_variant() {
                assert_eq!(shared.programs.get(&v), Some(&h));
            }
        }
    }

    #[test]
    fn invalidate_preserves_shared_depth_variants_on_non_default_material() {
        let (mut default_mat, mut driver) = test_material();
        default_mat.mark_as_default();
        default_mat.precache_depth_variants(&mut driver);

        let def = Arc::new(MaterialDefinition::parse(minimal_package("unlit"), &[ShaderLanguage::Essl3]).unwrap());
        let mut shared = Material::new_with_shared_depth(def, vec![ShaderLanguage::Essl3], &default_mat);
        let before = shared.programs.len();

        // Without the force-preserve rewrite, this call would match every
        // depth-variant key and destroy all of them.
        shared.invalidate(VALID_DEPTH_MASK, VALID_DEPTH_MASK, &mut driver);
        assert_eq!(shared.programs.len(), before, "shared depth variants must survive invalidation");
    }
}
