//! Maps caller-chosen texture ids to GPU-resident resources, reusing device
//! storage across calls.
//!
//! A `SlotMap` holds the live entries, and a side index resolves a caller id
//! to its slot. Unlike a cache that buckets free slots by descriptor for
//! reuse by *shape*, this one is keyed by caller identity — exactly one slot
//! per live id — and never shrinks; `max_texture_cache_memory` is advisory
//! only (see `DESIGN.md`).
//!
//! `R` is whatever resource handle the caller stores per id — production
//! code stores `Arc<wgpu::Buffer>` so a cache hit can clone a handle out
//! without touching the device; unit tests below store plain values so
//! they don't need a live device.

use std::collections::HashMap;
use std::hash::Hash;

use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Opaque slot referencing one cached texture's resources.
    pub struct Slot;
}

struct Entry<R> {
    resources: R,
    width: u32,
    height: u32,
    lanes: usize,
}

/// Resource cache from caller-chosen texture ids to cached GPU resources.
///
/// `Id` is whatever hashable, equatable key the caller uses to name a
/// texture. `R` is the resource handle stored per id; it must be `Clone` so
/// a cache hit can hand the caller an owned copy (e.g. `Arc::clone`) without
/// borrowing the cache itself.
pub struct TextureCache<Id: Eq + Hash + Clone, R: Clone> {
    slots: SlotMap<Slot, Entry<R>>,
    by_id: HashMap<Id, Slot>,
}

impl<Id: Eq + Hash + Clone, R: Clone> Default for TextureCache<Id, R> {
    fn default() -> Self {
        TextureCache {
            slots: SlotMap::with_key(),
            by_id: HashMap::new(),
        }
    }
}

impl<Id: Eq + Hash + Clone, R: Clone> TextureCache<Id, R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `resources` under `id`, allocating a new slot only when `id`
    /// has never been seen (or was invalidated). Returns the slot,
    /// inserting or overwriting in place.
    pub fn store(&mut self, id: Id, resources: R, width: u32, height: u32, lanes: usize) -> Slot {
        if let Some(&slot) = self.by_id.get(&id) {
            let entry = &mut self.slots[slot];
            entry.resources = resources;
            entry.width = width;
            entry.height = height;
            entry.lanes = lanes;
            slot
        } else {
            let slot = self.slots.insert(Entry {
                resources,
                width,
                height,
                lanes,
            });
            self.by_id.insert(id, slot);
            slot
        }
    }

    /// Drop the association for `id`, freeing its slot for reuse by a later
    /// `store` call under a different id. Does not shrink backing storage:
    /// the slot is returned to the slotmap's own free list, not
    /// deallocated. Returns `false` if `id` had no live slot.
    pub fn invalidate(&mut self, id: &Id) -> bool {
        if let Some(slot) = self.by_id.remove(id) {
            self.slots.remove(slot);
            true
        } else {
            false
        }
    }

    /// The `(width, height, lanes)` shape stored for `slot`.
    pub fn shape(&self, slot: Slot) -> (u32, u32, usize) {
        let entry = &self.slots[slot];
        (entry.width, entry.height, entry.lanes)
    }

    /// An owned copy of the resource handle stored at `slot`.
    pub fn resources(&self, slot: Slot) -> R {
        self.slots[slot].resources.clone()
    }

    pub fn slot_for(&self, id: &Id) -> Option<Slot> {
        self.by_id.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
