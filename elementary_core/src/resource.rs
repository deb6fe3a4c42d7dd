//! Shared-resource map and tap bus (spec §3, §4.4).
//!
//! The immutable side is owned by `Runtime` and touched only from the
//! control thread (a single-writer map: inserts are append-only, pruning
//! removes unreferenced entries). The tap bus is mutated exclusively from
//! the audio thread during `Runtime::process`, in the strict read-then-write
//! order spec §4.4 requires; because every tap read and write happens on the
//! one audio thread within a single block, a plain `&mut` borrow threaded
//! through the scheduler is sufficient — no atomics or cells are needed here,
//! unlike the cross-thread node pool in [`crate::pool`].

use std::collections::HashMap;
use std::sync::Arc;

use elementary_primitives::Name;

/// Name → immutable float buffer map (spec §3). Inserts are append-only:
/// an existing name cannot be replaced, mirroring "inserts are append-only"
/// in spec.md's data model.
#[derive(Default)]
pub struct SharedResourceMap {
    entries: HashMap<Name, Arc<[f32]>>,
}
impl SharedResourceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new immutable buffer. Returns `false` if `name` is already
    /// present (spec: "existing names cannot be replaced").
    pub fn insert(&mut self, name: Name, data: Arc<[f32]>) -> bool {
        if self.entries.contains_key(&name) {
            return false;
        }
        self.entries.insert(name, data);
        true
    }

    pub fn get(&self, name: &str) -> Option<Arc<[f32]>> {
        self.entries.get(name).cloned()
    }

    /// Remove entries with no outside references (only the map itself holds them).
    pub fn prune(&mut self) {
        self.entries.retain(|_, data| Arc::strong_count(data) > 1);
    }

    pub fn keys(&self) -> impl Iterator<Item = &Name> {
        self.entries.keys()
    }
}

/// Named, block-sized mutable buffers used as the feedback tap bus (spec §4.4).
/// Buffers are created on first reference, sized to one audio block, and
/// zero-filled until their owning `tapOut` first promotes data into them.
#[derive(Default)]
pub struct TapBus {
    buffers: HashMap<Name, Vec<f32>>,
}
impl TapBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the current contents of the named tap (the data placed there by
    /// the *previous* block's `tapOut`, per spec §4.4). Emits silence if the
    /// name has not yet been registered.
    pub fn read(&mut self, name: &str, block_size: usize) -> &[f32] {
        self.buffers
            .entry(Name::from(name))
            .or_insert_with(|| vec![0.0; block_size])
            .as_slice()
    }

    /// Promote a `tapOut`'s internal one-block delay buffer into the shared
    /// buffer for `name`, making it visible to the next block's `tapIn`.
    pub fn write(&mut self, name: &str, data: &[f32]) {
        let buf = self
            .buffers
            .entry(Name::from(name))
            .or_insert_with(|| vec![0.0; data.len()]);
        if buf.len() != data.len() {
            buf.resize(data.len(), 0.0);
        }
        buf.copy_from_slice(data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immutable_insert_is_append_only() {
        let mut map = SharedResourceMap::new();
        assert!(map.insert(Name::from("a"), Arc::from(vec![1.0].into_boxed_slice())));
        assert!(!map.insert(Name::from("a"), Arc::from(vec![2.0].into_boxed_slice())));
        assert_eq!(map.get("a").unwrap()[0], 1.0);
    }

    #[test]
    fn prune_removes_only_unreferenced_entries() {
        let mut map = SharedResourceMap::new();
        map.insert(Name::from("a"), Arc::from(vec![1.0].into_boxed_slice()));
        let held = map.get("a");
        map.prune();
        assert!(map.get("a").is_some());
        drop(held);
        map.prune();
        assert!(map.get("a").is_none());
    }

    #[test]
    fn tap_round_trip_reads_previous_blocks_write() {
        let mut bus = TapBus::new();
        assert_eq!(bus.read("x", 4), &[0.0; 4]);
        bus.write("x", &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(bus.read("x", 4), &[1.0, 2.0, 3.0, 4.0]);
    }
}
