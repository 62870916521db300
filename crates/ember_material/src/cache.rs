//! Ref-counted map of parsed packages, keyed by CRC32 (§4.6).
//!
//! Key equality in the source is pointer identity on the parser object;
//! the hash is the package's CRC32. Here the map is keyed directly on the
//! CRC32 since there is no separate long-lived parser object to compare
//! pointers against — two packages with identical bytes produce
//! identical CRCs and therefore share one entry, which is the property
//! §8.1 invariant 9 actually requires.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use ember_core::error::Result;

use crate::definition::MaterialDefinition;
use crate::parser::ShaderLanguage;

struct Entry {
    definition: Arc<MaterialDefinition>,
    refcount: u32,
}

/// Shared cache of parsed material definitions, keyed by package CRC32.
#[derive(Default)]
pub struct MaterialCache {
    entries: Mutex<FxHashMap<u32, Entry>>,
}

impl MaterialCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `data` on a cache miss and inserts it with refcount 1; on a
    /// hit, bumps the refcount and returns the existing definition.
    pub fn acquire(
        &self,
        data: Vec<u8>,
        preferred_languages: &[ShaderLanguage],
    ) -> Result<Arc<MaterialDefinition>> {
        // CRC32 is computed before taking the lock so the expensive part
        // of a cache hit never holds it.
        let crc32 = crc32fast::hash(&data).max(1);

        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(&crc32) {
            entry.refcount += 1;
            return Ok(entry.definition.clone());
        }

        drop(entries);
        let definition = Arc::new(MaterialDefinition::parse(data, preferred_languages)?);
        let mut entries = self.entries.lock();
        // Another thread may have inserted the same package while this one
        // was parsing outside the lock; prefer the existing entry so
        // `acquire`/`acquire` really does return the same pointer (§8.1 #9).
        let entry = entries.entry(crc32).or_insert_with(|| Entry {
            definition: definition.clone(),
            refcount: 0,
        });
        entry.refcount += 1;
        Ok(entry.definition.clone())
    }

    /// Decrements the refcount for the definition with CRC32 `crc32`; on
    /// the last release, the entry (and the definition, once every other
    /// `Arc` is dropped) is removed from the cache.
    pub fn release(&self, crc32: u32) {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(&crc32) else {
            log::warn!("release() of a material not held by this cache (crc32={crc32})");
            return;
        };
        entry.refcount -= 1;
        if entry.refcount == 0 {
            entries.remove(&crc32);
        }
    }

    #[must_use]
    pub fn refcount(&self, crc32: u32) -> u32 {
        self.entries.lock().get(&crc32).map_or(0, |e| e.refcount)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Debug-only shutdown check: every acquire must be matched by a
    /// release before the cache itself is torn down (§4.6).
    pub fn assert_empty_on_shutdown(&self) {
        let entries = self.entries.lock();
        if !entries.is_empty() {
            log::error!("material cache shutdown with {} leaked definition(s)", entries.len());
        }
        debug_assert!(entries.is_empty(), "material cache leaked definitions at shutdown");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::test_support::minimal_package;

    #[test]
    fn identical_packages_share_one_definition() {
        let cache = MaterialCache::new();
        let a = cache.acquire(minimal_package("lit"), &[ShaderLanguage::Essl3]).unwrap();
        let b = cache.acquire(minimal_package("lit"), &[ShaderLanguage::Essl3]).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.refcount(a.crc32), 2);
    }

    #[test]
    fn release_to_zero_drops_entry() {
        let cache = MaterialCache::new();
        let def = cache.acquire(minimal_package("lit"), &[ShaderLanguage::Essl3]).unwrap();
        let crc32 = def.crc32;
        cache.release(crc32);
        assert_eq!(cache.refcount(crc32), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn distinct_packages_get_distinct_entries() {
        let cache = MaterialCache::new();
        let a = cache.acquire(minimal_package("lit"), &[ShaderLanguage::Essl3]).unwrap();
        let b = cache.acquire(minimal_package("unlit"), &[ShaderLanguage::Essl3]).unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 2);
    }
}
