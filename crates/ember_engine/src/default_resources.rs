//! Resources `Engine::init()` creates through the driver before any user
//! content exists (§4.8: "default resources (1×1 textures, a 1×1 cube map,
//! dummy UBO, default material, default render target)").

use std::sync::Arc;

use ember_driver::{
    BufferUsage, DriverApi, GpuBufferDescriptor, PixelFormat, RenderTargetDescriptor, TextureDescriptor,
    TextureHandle, TextureUsage,
};
use ember_material::{Material, MaterialDefinition, ShaderLanguage};

const DUMMY_UBO_BYTES: u64 = 256;

/// Resources every `Engine` keeps alive for its whole lifetime as a
/// fallback for incomplete scene state (a material instance bound to no
/// texture samples the 1x1 white texture rather than garbage, etc).
pub struct DefaultResources {
    pub white_texture_1x1: TextureHandle,
    pub white_cubemap_1x1: TextureHandle,
    pub dummy_ubo: ember_driver::BufferHandle,
    pub default_render_target: ember_driver::RenderTargetHandle,
    pub default_material: Material,
}

impl DefaultResources {
    /// Creates every default resource through `driver`. Runs once, inside
    /// the single init command the backend thread executes before the
    /// queue is opened to the application (§4.8.1).
    pub fn create(driver: &mut dyn DriverApi, preferred_languages: &[ShaderLanguage]) -> Self {
        let white_texture_1x1 = driver.create_texture(&TextureDescriptor {
            width: 1,
            height: 1,
            depth_or_layers: 1,
            levels: 1,
            samples: 1,
            format: PixelFormat::Rgba8Unorm,
            usage: TextureUsage::SAMPLEABLE,
        });
        let white_cubemap_1x1 = driver.create_texture(&TextureDescriptor {
            width: 1,
            height: 1,
            depth_or_layers: 6,
            levels: 1,
            samples: 1,
            format: PixelFormat::Rgba8Unorm,
            usage: TextureUsage::SAMPLEABLE,
        });
        let dummy_ubo = driver.create_buffer(&GpuBufferDescriptor {
            size_bytes: DUMMY_UBO_BYTES,
            usage: BufferUsage::UNIFORM,
        });
        let default_render_target = driver.create_render_target(&RenderTargetDescriptor {
            color: [Some(white_texture_1x1), None, None, None, None, None, None, None],
            depth: None,
            stencil: None,
            samples: 1,
            layer_count: 1,
        });

        let definition = Arc::new(
            MaterialDefinition::parse(ember_material::default_material_package(), preferred_languages)
                .expect("built-in default material package must always parse"),
        );
        let mut default_material = Material::new(definition, preferred_languages.to_vec());
        default_material.mark_as_default();
        default_material.precache_depth_variants(driver);

        Self {
            white_texture_1x1,
            white_cubemap_1x1,
            dummy_ubo,
            default_render_target,
            default_material,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_driver::NullDriver;

    #[test]
    fn create_populates_every_default_resource() {
        let mut driver = NullDriver::new();
        let resources = DefaultResources::create(&mut driver, &[ShaderLanguage::Essl3]);
        assert!(resources.white_texture_1x1.is_valid());
        assert!(resources.white_cubemap_1x1.is_valid());
        assert!(resources.dummy_ubo.is_valid());
        assert!(resources.default_render_target.is_valid());
        assert!(resources.default_material.is_default());
    }
}
