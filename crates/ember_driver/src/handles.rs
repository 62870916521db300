//! Opaque, 32-bit generational resource handles (§3.1, §6.2).
//!
//! Zero is always "invalid". After destruction a handle's numeric value may
//! be re-issued to a new object — the core does not use-after-free check;
//! that is the concrete backend's responsibility (see
//! [`FeatureFlags::DISABLE_HANDLE_UAF_CHECK`]).

use std::fmt;

/// Defines a zero-is-invalid 32-bit resource handle type.
macro_rules! resource_handle {
    ($name:ident) => {
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name(u32);

        impl $name {
            pub const INVALID: Self = Self(0);

            #[inline]
            #[must_use]
            pub const fn from_raw(raw: u32) -> Self {
                Self(raw)
            }

            #[inline]
            #[must_use]
            pub const fn raw(self) -> u32 {
                self.0
            }

            #[inline]
            #[must_use]
            pub const fn is_valid(self) -> bool {
                self.0 != 0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if self.is_valid() {
                    write!(f, "{}({})", stringify!($name), self.0)
                } else {
                    write!(f, "{}(invalid)", stringify!($name))
                }
            }
        }
    };
}

resource_handle!(TextureHandle);
resource_handle!(BufferHandle);
resource_handle!(ProgramHandle);
resource_handle!(RenderTargetHandle);
resource_handle!(FenceHandle);
resource_handle!(SwapChainHandle);
resource_handle!(DescriptorSetHandle);
resource_handle!(DescriptorSetLayoutHandle);
resource_handle!(SyncHandle);

/// Value supplied to `Fence::wait(timeout_ns)` to block indefinitely.
pub const FENCE_WAIT_FOR_EVER: u64 = u64::MAX;

bitflags::bitflags! {
    /// Backend workaround / capability toggle flags (§4.1 "feature queries").
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct FeatureFlags: u32 {
        const STEREO_SUPPORT             = 1 << 0;
        const PARALLEL_SHADER_COMPILE    = 1 << 1;
        const DISABLE_HANDLE_UAF_CHECK   = 1 << 2;
        const PROTECTED_MEMORY           = 1 << 3;
    }
}

/// Queryable backend capabilities (§4.1 "Feature queries").
#[derive(Debug, Clone, Copy)]
pub struct DriverCaps {
    pub feature_level: ember_core::config::FeatureLevel,
    pub flags: FeatureFlags,
    pub ubo_offset_alignment: u32,
}

impl Default for DriverCaps {
    fn default() -> Self {
        Self {
            feature_level: ember_core::config::FeatureLevel::Level1,
            flags: FeatureFlags::empty(),
            ubo_offset_alignment: 256,
        }
    }
}
