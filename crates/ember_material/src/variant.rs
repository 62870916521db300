//! The 8-bit variant key (§3.4, §4.7.1) and per-stage bit filtering.

use bitflags::bitflags;

bitflags! {
    /// Orthogonal bits selecting among a material's compiled shader
    /// permutations. A full key indexes `Material::programs`; the
    /// per-stage `filter_*` functions project it onto the bits that
    /// stage's shader source actually branches on, so two distinct full
    /// variants can still share one compiled vertex (or depth) shader.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
    pub struct Variant: u8 {
        const DIRECTIONAL_LIGHT = 1 << 0;
        const DYNAMIC_LIGHTING  = 1 << 1;
        const SHADOW_RECEIVER   = 1 << 2;
        const SKINNING          = 1 << 3;
        const FOG               = 1 << 4;
        const VSM                = 1 << 5;
        const STEREO            = 1 << 6;
        const DEPTH              = 1 << 7;
    }
}

/// The bits a vertex shader's source can possibly branch on.
const VERTEX_MASK: Variant = Variant::from_bits_truncate(
    Variant::SKINNING.bits() | Variant::STEREO.bits() | Variant::DEPTH.bits(),
);

/// The bits a fragment shader's source can possibly branch on.
const FRAGMENT_MASK: Variant = Variant::from_bits_truncate(
    Variant::DIRECTIONAL_LIGHT.bits()
        | Variant::DYNAMIC_LIGHTING.bits()
        | Variant::SHADOW_RECEIVER.bits()
        | Variant::FOG.bits()
        | Variant::VSM.bits()
        | Variant::STEREO.bits(),
);

/// The only bit that identifies a depth-pass variant (§4.7.2's `VALID_DEPTH` mask).
pub const VALID_DEPTH_MASK: Variant = Variant::DEPTH;

impl Variant {
    #[must_use]
    pub const fn filter_vertex(self) -> Self {
        Self::from_bits_truncate(self.bits() & VERTEX_MASK.bits())
    }

    #[must_use]
    pub const fn filter_fragment(self) -> Self {
        Self::from_bits_truncate(self.bits() & FRAGMENT_MASK.bits())
    }

    #[must_use]
    pub const fn is_depth_variant(self) -> bool {
        self.contains(Variant::DEPTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_filter_is_idempotent() {
        let v = Variant::all();
        assert_eq!(v.filter_vertex().filter_vertex(), v.filter_vertex());
    }

    #[test]
    fn fragment_filter_is_idempotent() {
        let v = Variant::all();
        assert_eq!(v.filter_fragment().filter_fragment(), v.filter_fragment());
    }

    #[test]
    fn vertex_and_fragment_filters_drop_disjoint_bits() {
        let v = Variant::DIRECTIONAL_LIGHT | Variant::SKINNING;
        assert_eq!(v.filter_vertex(), Variant::SKINNING);
        assert_eq!(v.filter_fragment(), Variant::DIRECTIONAL_LIGHT);
    }
}
