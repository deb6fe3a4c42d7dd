//! Fixed-capacity pool of shared objects that reuses any slot whose outside
//! refcount has dropped to zero (spec §2 `RefCountedPool<T>`). Grows on
//! demand; growth only ever happens off the realtime path (during
//! `Runtime::apply_instructions` or render-sequence compilation), mirroring
//! how `knaster_graph::buffer_allocator::BufferAllocator` only ever grows
//! between blocks, never inside one.

use std::sync::Arc;

struct Slot<T> {
    value: Option<Arc<T>>,
}

/// A pool of `Arc<T>`. [`RefCountedPool::acquire`] hands out a fresh `Arc<T>`
/// from a reused slot if one's outside references have all been dropped,
/// otherwise builds a new one and grows the pool.
pub struct RefCountedPool<T> {
    slots: Vec<Slot<T>>,
}

impl<T> RefCountedPool<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || Slot { value: None });
        Self { slots }
    }

    /// Number of slots currently allocated (including ones awaiting reuse).
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Get an `Arc<T>` for a fresh value built from `make`. Reuses the first
    /// slot whose only reference is the pool's own (`strong_count == 1`);
    /// otherwise appends a new slot, growing the pool off the realtime path.
    pub fn acquire(&mut self, make: impl FnOnce() -> T) -> Arc<T> {
        for slot in &mut self.slots {
            let reusable = match &slot.value {
                Some(arc) => Arc::strong_count(arc) == 1,
                None => true,
            };
            if reusable {
                let arc = Arc::new(make());
                slot.value = Some(arc.clone());
                return arc;
            }
        }
        let arc = Arc::new(make());
        self.slots.push(Slot {
            value: Some(arc.clone()),
        });
        arc
    }

    /// Number of slots whose value is live (referenced by more than the pool itself).
    pub fn live_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(&s.value, Some(arc) if Arc::strong_count(arc) > 1))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuses_a_slot_once_the_outside_refcount_drops() {
        let mut pool = RefCountedPool::with_capacity(1);
        let a = pool.acquire(|| 1usize);
        assert_eq!(pool.capacity(), 1);
        drop(a);
        let b = pool.acquire(|| 2usize);
        assert_eq!(*b, 2);
        assert_eq!(pool.capacity(), 1, "should reuse the slot, not grow");
    }

    #[test]
    fn grows_when_every_slot_is_still_live() {
        let mut pool = RefCountedPool::with_capacity(1);
        let a = pool.acquire(|| 1usize);
        let _b = pool.acquire(|| 2usize);
        assert_eq!(pool.capacity(), 2);
        drop(a);
    }
}
