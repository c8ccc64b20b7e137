use std::sync::{Mutex, MutexGuard, PoisonError};

/// Drain order of a queued item. High-priority items always go first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    High,
    Low,
}

#[derive(Debug)]
struct Lanes<T> {
    high: Vec<T>,
    low: Vec<T>,
}

/// Two-lane FIFO buffer shared between producers (network tasks) and the tick.
///
/// `drain` takes both lanes under one lock, so an item enqueued concurrently
/// lands either in this drain or the next one, never in both.
#[derive(Debug)]
pub struct CommandBuffer<T> {
    lanes: Mutex<Lanes<T>>,
}

impl<T> Default for CommandBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CommandBuffer<T> {
    pub fn new() -> Self {
        Self {
            lanes: Mutex::new(Lanes {
                high: Vec::new(),
                low: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Lanes<T>> {
        self.lanes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn enqueue(&self, item: T, priority: Priority) {
        let mut lanes = self.lock();
        match priority {
            Priority::High => lanes.high.push(item),
            Priority::Low => lanes.low.push(item),
        }
    }

    /// Removes and returns everything queued: high lane first, then low, each in
    /// insertion order.
    pub fn drain(&self) -> Vec<T> {
        let mut lanes = self.lock();
        let mut drained = std::mem::take(&mut lanes.high);
        drained.append(&mut lanes.low);
        drained
    }

    pub fn clear(&self) {
        let mut lanes = self.lock();
        lanes.high.clear();
        lanes.low.clear();
    }

    pub fn len(&self) -> usize {
        let lanes = self.lock();
        lanes.high.len() + lanes.low.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
