//! Per-frame UBO slot ring (§4.8.2's `ubo_manager.begin_frame`/
//! `finish_begin_frame`/`end_frame`).
//!
//! A material instance that opts into UBO batching writes its uniform data
//! into a slot this manager hands out, rather than owning a dedicated
//! buffer; slots are reclaimed once the GPU has finished reading the frame
//! that used them, tracked with a small fence retire queue — the same
//! pattern the command stream's ring buffer uses for command buffers, just
//! applied to uniform storage instead.

use std::collections::VecDeque;

use ember_driver::{BufferHandle, BufferUsage, DriverApi, FenceHandle, GpuBufferDescriptor};

struct RetiringSlot {
    fence: FenceHandle,
    slot: usize,
}

/// Manages a small ring of uniform buffers reused across frames.
pub struct UboManager {
    slot_size_bytes: u64,
    slots: Vec<BufferHandle>,
    free: Vec<usize>,
    retiring: VecDeque<RetiringSlot>,
    current: Option<usize>,
}

impl UboManager {
    #[must_use]
    pub fn new(slot_size_bytes: u64) -> Self {
        Self {
            slot_size_bytes,
            slots: Vec::new(),
            free: Vec::new(),
            retiring: VecDeque::new(),
            current: None,
        }
    }

    /// Reclaims slots whose retiring fence has already signaled, then
    /// allocates (or reuses) the slot this frame will write into.
    pub fn begin_frame(&mut self, driver: &mut dyn DriverApi) {
        while let Some(front) = self.retiring.front() {
            if driver.wait_fence(front.fence, 0) {
                let retired = self.retiring.pop_front().expect("front just peeked");
                self.free.push(retired.slot);
            } else {
                break;
            }
        }

        let slot = self.free.pop().unwrap_or_else(|| {
            let handle = driver.create_buffer(&GpuBufferDescriptor {
                size_bytes: self.slot_size_bytes,
                usage: BufferUsage::UNIFORM,
            });
            self.slots.push(handle);
            self.slots.len() - 1
        });
        self.current = Some(slot);
    }

    /// Marks the current frame's slot allocation as final; no further
    /// `allocate` calls are expected until the next `begin_frame`.
    pub fn finish_begin_frame(&self) {
        log::trace!("ubo_manager: frame slot allocation finalized");
    }

    #[must_use]
    pub fn current_buffer(&self) -> Option<BufferHandle> {
        self.current.map(|slot| self.slots[slot])
    }

    /// Places a fence so this frame's slot can be reclaimed once the GPU
    /// has finished reading it.
    pub fn end_frame(&mut self, driver: &mut dyn DriverApi) {
        let Some(slot) = self.current.take() else {
            return;
        };
        let fence = driver.create_fence();
        self.retiring.push_back(RetiringSlot { fence, slot });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_driver::NullDriver;

    #[test]
    fn begin_frame_allocates_a_new_slot_on_first_use() {
        let mut driver = NullDriver::new();
        let mut mgr = UboManager::new(4096);
        mgr.begin_frame(&mut driver);
        assert!(mgr.current_buffer().is_some());
    }

    #[test]
    fn end_frame_then_begin_frame_reuses_the_slot_once_the_fence_signals() {
        let mut driver = NullDriver::new();
        let mut mgr = UboManager::new(4096);
        mgr.begin_frame(&mut driver);
        let first = mgr.current_buffer();
        mgr.end_frame(&mut driver);

        mgr.begin_frame(&mut driver);
        // NullDriver's wait_fence always reports signaled, so the slot
        // from the first frame must already be back in the free list.
        assert_eq!(mgr.current_buffer(), first);
    }
}
