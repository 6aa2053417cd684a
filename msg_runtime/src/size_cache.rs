//! Memoized serialized size, one slot per message instance.
//!
//! Atomic so that two readers computing the size of a shared message race
//! benignly: both store the same value. Mutation must go through `&mut`,
//! which already excludes concurrent readers.

use std::sync::atomic::{AtomicUsize, Ordering};

const UNCOMPUTED: usize = usize::MAX;

#[derive(Debug)]
pub struct SizeCache(AtomicUsize);

impl SizeCache {
    pub const fn new() -> Self {
        Self(AtomicUsize::new(UNCOMPUTED))
    }

    /// Last computed size, or `None` if not computed since the last change.
    pub fn get(&self) -> Option<usize> {
        match self.0.load(Ordering::Relaxed) {
            UNCOMPUTED => None,
            size => Some(size),
        }
    }

    pub fn set(&self, size: usize) {
        // The sentinel can never be a real size: no buffer is that long.
        debug_assert!(size != UNCOMPUTED);
        self.0.store(size, Ordering::Relaxed);
    }

    pub fn invalidate(&self) {
        self.0.store(UNCOMPUTED, Ordering::Relaxed);
    }
}

impl Default for SizeCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for SizeCache {
    fn clone(&self) -> Self {
        Self(AtomicUsize::new(self.0.load(Ordering::Relaxed)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_uncomputed() {
        assert_eq!(SizeCache::new().get(), None);
    }

    #[test]
    fn set_then_invalidate() {
        let cache = SizeCache::new();
        cache.set(0);
        assert_eq!(cache.get(), Some(0));
        cache.set(42);
        assert_eq!(cache.clone().get(), Some(42));
        cache.invalidate();
        assert_eq!(cache.get(), None);
    }
}
