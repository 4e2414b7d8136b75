//! Batched synchronous work.
//!
//! Synchronous-lane renders are not performed at the enqueue site; they are
//! recorded here and flushed at microtask timing, so several sync updates
//! issued in one host task batch into a single render. The flushing flag
//! guards re-entrancy: a flush triggered from inside a flush is a no-op.

#[derive(Default)]
pub(crate) struct SyncQueue {
    scheduled: bool,
    pub(crate) flushing: bool,
}

impl SyncQueue {
    /// Record that sync work is wanted. Coalesces until flushed.
    pub fn schedule(&mut self) {
        self.scheduled = true;
    }

    /// Consume the scheduled marker.
    pub fn take_scheduled(&mut self) -> bool {
        std::mem::take(&mut self.scheduled)
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coalesces() {
        let mut queue = SyncQueue::default();
        queue.schedule();
        queue.schedule();
        assert!(queue.take_scheduled());
        assert!(!queue.take_scheduled());
    }
}
