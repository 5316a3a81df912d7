//! Lane pool: the least-loaded assignor.
//!
//! Lanes are created lazily. Until the pool reaches its capacity every new
//! session gets a fresh lane; after that it goes to the lane with the fewest
//! live sessions, lowest index on ties. Once created, a lane lives as long as
//! the pool.

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use super::lane::LaneEvent;

/// Sending side of a lane's mailbox.
#[derive(Debug, Clone)]
pub struct LaneHandle {
    index: usize,
    mailbox: mpsc::UnboundedSender<LaneEvent>,
}

impl LaneHandle {
    pub fn new(index: usize, mailbox: mpsc::UnboundedSender<LaneEvent>) -> Self {
        Self { index, mailbox }
    }

    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Post an event to the lane. Returns `false` if the lane has stopped.
    pub fn post(&self, event: LaneEvent) -> bool {
        if self.mailbox.send(event).is_err() {
            debug!(lane = self.index, "Lane mailbox closed, event dropped");
            return false;
        }
        true
    }

    /// A handle whose mailbox is read by the caller instead of a lane task.
    #[cfg(test)]
    pub fn detached(index: usize) -> (Self, mpsc::UnboundedReceiver<LaneEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(index, tx), rx)
    }
}

struct LaneSlot {
    handle: LaneHandle,
    load: usize,
}

/// Fixed-capacity set of lanes with per-lane load counters.
pub struct LanePool {
    capacity: usize,
    slots: Mutex<Vec<LaneSlot>>,
}

impl LanePool {
    /// Create an empty pool. `capacity` is clamped to at least one lane.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            slots: Mutex::new(Vec::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Pick a lane for a new session and count it as loaded.
    ///
    /// `spawn` is called with the new lane's index only when the pool still
    /// has room; it must start the lane and return its handle.
    pub fn assign<F>(&self, spawn: F) -> LaneHandle
    where
        F: FnOnce(usize) -> LaneHandle,
    {
        let mut slots = self.slots.lock();

        let index = if slots.len() < self.capacity {
            let index = slots.len();
            slots.push(LaneSlot {
                handle: spawn(index),
                load: 0,
            });
            debug!(lane = index, "Lane created");
            index
        } else {
            // Ties go to the lowest index.
            slots
                .iter()
                .enumerate()
                .min_by_key(|(i, slot)| (slot.load, *i))
                .map(|(i, _)| i)
                .unwrap_or(0)
        };

        let slot = &mut slots[index];
        slot.load += 1;
        crate::metrics::set_lane_load(index, slot.load);
        slot.handle.clone()
    }

    /// Release one session's worth of load from a lane.
    pub fn release(&self, index: usize) {
        let mut slots = self.slots.lock();
        if let Some(slot) = slots.get_mut(index) {
            slot.load = slot.load.saturating_sub(1);
            crate::metrics::set_lane_load(index, slot.load);
        }
    }

    /// Handle of an existing lane.
    pub fn handle(&self, index: usize) -> Option<LaneHandle> {
        self.slots.lock().get(index).map(|slot| slot.handle.clone())
    }

    /// Current load of every created lane, by index.
    pub fn loads(&self) -> Vec<usize> {
        self.slots.lock().iter().map(|slot| slot.load).collect()
    }
}
