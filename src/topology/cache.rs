//! Cache invalidation utilities for data derived from the element forest.
//!
//! Level index sets and marker vectors are computed lazily on first query and
//! dropped exactly once per adaptation cycle through [`InvalidateCache`].

use once_cell::sync::OnceCell;

/// Anything that caches data derived from the forest topology (level index
/// sets, marker vectors, ...) should implement this.
pub trait InvalidateCache {
    /// Invalidate *all* internal caches so future queries recompute correctly.
    fn invalidate_cache(&mut self);
}

// Blanket impl for Box<T>
impl<T: InvalidateCache + ?Sized> InvalidateCache for Box<T> {
    #[inline]
    fn invalidate_cache(&mut self) {
        (**self).invalidate_cache();
    }
}

/// Lazily computed values, one slot per grid level.
///
/// Slots are filled on first access through [`LevelCache::get_or_try_init`]
/// and only cleared by [`InvalidateCache::invalidate_cache`]; levels that are
/// never queried are never computed.
#[derive(Debug)]
pub struct LevelCache<V> {
    slots: Vec<OnceCell<V>>,
}

impl<V> Default for LevelCache<V> {
    fn default() -> Self {
        Self { slots: Vec::new() }
    }
}

impl<V> LevelCache<V> {
    /// Create a cache with room for `levels` levels.
    pub fn with_levels(levels: usize) -> Self {
        Self {
            slots: (0..levels).map(|_| OnceCell::new()).collect(),
        }
    }

    /// Number of level slots.
    pub fn levels(&self) -> usize {
        self.slots.len()
    }

    /// Cached value for `level`, if it has been computed.
    pub fn get(&self, level: usize) -> Option<&V> {
        self.slots.get(level).and_then(OnceCell::get)
    }

    /// Returns the value for `level`, computing it with `init` if absent.
    ///
    /// Returns `None` if `level` has no slot.
    pub fn get_or_try_init<E, F>(&self, level: usize, init: F) -> Option<Result<&V, E>>
    where
        F: FnOnce() -> Result<V, E>,
    {
        self.slots.get(level).map(|slot| slot.get_or_try_init(init))
    }

    /// Number of levels whose value is currently computed.
    pub fn computed(&self) -> usize {
        self.slots.iter().filter(|s| s.get().is_some()).count()
    }
}

impl<V> InvalidateCache for LevelCache<V> {
    fn invalidate_cache(&mut self) {
        for slot in &mut self.slots {
            slot.take();
        }
    }
}

impl<V> LevelCache<V> {
    /// Drop every cached value and resize to `levels` slots.
    pub fn reset(&mut self, levels: usize) {
        self.invalidate_cache();
        self.slots.resize_with(levels, OnceCell::new);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn computes_lazily_and_once() {
        let cache = LevelCache::<usize>::with_levels(3);
        let calls = Cell::new(0);
        let compute = || {
            calls.set(calls.get() + 1);
            Ok::<_, ()>(42)
        };
        assert_eq!(cache.get(1), None);
        assert_eq!(*cache.get_or_try_init(1, compute).unwrap().unwrap(), 42);
        assert_eq!(*cache.get_or_try_init(1, compute).unwrap().unwrap(), 42);
        assert_eq!(calls.get(), 1);
        assert_eq!(cache.computed(), 1);
        assert!(cache.get_or_try_init(5, compute).is_none());
    }

    #[test]
    fn invalidate_clears_every_level() {
        let mut cache = LevelCache::<usize>::with_levels(2);
        let _ = cache.get_or_try_init(0, || Ok::<_, ()>(1));
        let _ = cache.get_or_try_init(1, || Ok::<_, ()>(2));
        cache.invalidate_cache();
        assert_eq!(cache.computed(), 0);
        cache.reset(4);
        assert_eq!(cache.levels(), 4);
    }

    #[test]
    fn failed_init_leaves_slot_empty() {
        let cache = LevelCache::<usize>::with_levels(1);
        assert!(cache.get_or_try_init(0, || Err("boom")).unwrap().is_err());
        assert_eq!(cache.get(0), None);
    }
}
