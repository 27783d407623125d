//! Deferred retirement of shared routing objects.
//!
//! A routing record or operator removed from the registry may still be
//! referenced by a routing call that snapshotted it before the removal.
//! Removed objects are parked here instead of being dropped at the removal
//! site; [`DeferredRetirer::drain`] releases the ones whose reference count
//! shows no remaining outside holder and keeps the rest parked.

use parking_lot::Mutex;
use std::sync::Arc;

/// Holding pen for retired shared objects.
#[derive(Debug)]
pub struct DeferredRetirer<T> {
    pending: Mutex<Vec<Arc<T>>>,
}

impl<T> DeferredRetirer<T> {
    /// Creates an empty retirer.
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Parks an object for later destruction.
    pub fn schedule(&self, obj: Arc<T>) {
        self.pending.lock().push(obj);
    }

    /// Drops every parked object that has quiesced (no references outside
    /// the pen). Returns how many were released; objects still referenced
    /// elsewhere remain parked for a later drain.
    pub fn drain(&self) -> usize {
        let mut pending = self.pending.lock();
        let before = pending.len();
        pending.retain(|obj| Arc::strong_count(obj) > 1);
        before - pending.len()
    }

    /// Number of objects currently parked.
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }
}

impl<T> Default for DeferredRetirer<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_releases_quiesced_objects() {
        let retirer = DeferredRetirer::new();
        retirer.schedule(Arc::new(1u32));
        retirer.schedule(Arc::new(2u32));
        assert_eq!(retirer.pending(), 2);
        assert_eq!(retirer.drain(), 2);
        assert_eq!(retirer.pending(), 0);
    }

    #[test]
    fn test_drain_keeps_live_objects() {
        let retirer = DeferredRetirer::new();
        let live = Arc::new(7u32);
        retirer.schedule(live.clone());
        retirer.schedule(Arc::new(8u32));
        // one object still has an outside holder
        assert_eq!(retirer.drain(), 1);
        assert_eq!(retirer.pending(), 1);
        drop(live);
        assert_eq!(retirer.drain(), 1);
        assert_eq!(retirer.pending(), 0);
    }
}
