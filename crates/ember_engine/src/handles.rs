//! Engine-lifetime resource handles (§4.8, **[ADDED]**).
//!
//! Unlike the Frame Graph's single-frame arenas (`NodeIdx`/`ResourceIdx`/
//! `SlotIdx`, generational `u16`+`u8` pairs), these live for the whole
//! `Engine` lifetime and experience arbitrary-order removal, so they're
//! `slotmap` keys rather than a bump-arena index.

use slotmap::new_key_type;

new_key_type! {
    /// A material definition's slot in `Engine`'s resource list.
    pub struct MaterialHandle;
    /// A material instance's slot in `Engine`'s resource list.
    pub struct MaterialInstanceHandle;
    /// A pending fence wait registered with `Engine` (not the same as
    /// `ember_driver::FenceHandle`, which identifies the driver-side GPU
    /// fence object this tracks).
    pub struct EngineFenceHandle;
}
