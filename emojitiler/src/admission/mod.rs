//! Per-pack admission control.
//!
//! The remote platform has single-writer semantics on a pack: concurrent
//! mutations of the same set interleave badly. The admission queue grants
//! at most one active job per resource key (the pack identity) and
//! FIFO-queues the rest; independent keys never block each other.
//!
//! # Example
//!
//! ```ignore
//! use emojitiler::admission::{Admission, AdmissionQueue};
//!
//! let queue = AdmissionQueue::new();
//! match queue.acquire("my_pack") {
//!     Admission::Granted => { /* run the job */ }
//!     Admission::Queued(waiter) => {
//!         waiter.wait().await?; // fires when it is this caller's turn
//!     }
//! }
//! // ... job done
//! queue.release("my_pack");
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::debug;

/// Errors while waiting for admission.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AdmissionError {
    /// The queue was cleared (shutdown) while this caller was waiting.
    #[error("admission queue shut down while waiting")]
    Shutdown,
}

/// Result of an admission request.
#[derive(Debug)]
pub enum Admission {
    /// No holder for this key; the caller may proceed immediately.
    Granted,
    /// Another job holds the key; wait for the hand-off.
    Queued(Waiter),
}

impl Admission {
    /// True if the slot was granted without queueing.
    pub fn is_immediate(&self) -> bool {
        matches!(self, Admission::Granted)
    }
}

/// Hand-off signal for a queued caller.
///
/// Fires when every earlier holder/waiter for the key has released.
#[derive(Debug)]
pub struct Waiter {
    rx: oneshot::Receiver<()>,
}

impl Waiter {
    /// Waits for this caller's turn.
    pub async fn wait(self) -> Result<(), AdmissionError> {
        self.rx.await.map_err(|_| AdmissionError::Shutdown)
    }
}

/// Slot state for one resource key. Presence in the map means the slot
/// is held; `waiters` holds the FIFO queue behind the holder.
#[derive(Debug, Default)]
struct Slot {
    waiters: VecDeque<oneshot::Sender<()>>,
}

/// FIFO admission queue keyed by resource.
#[derive(Debug, Default)]
pub struct AdmissionQueue {
    slots: Mutex<HashMap<String, Slot>>,
}

impl AdmissionQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests the slot for `key`.
    ///
    /// Grants immediately if no job holds the key, otherwise enqueues the
    /// caller and returns a [`Waiter`] that fires in FIFO order as earlier
    /// holders release.
    pub fn acquire(&self, key: &str) -> Admission {
        let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        match slots.get_mut(key) {
            None => {
                slots.insert(key.to_string(), Slot::default());
                debug!(key, "admission granted immediately");
                Admission::Granted
            }
            Some(slot) => {
                let (tx, rx) = oneshot::channel();
                slot.waiters.push_back(tx);
                debug!(key, queued = slot.waiters.len(), "admission queued");
                Admission::Queued(Waiter { rx })
            }
        }
    }

    /// Releases the slot for `key`, handing off to the next live waiter
    /// if any, else clearing the slot.
    ///
    /// Waiters that dropped their [`Waiter`] (cancelled before their turn)
    /// are skipped.
    pub fn release(&self, key: &str) {
        let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        let Some(slot) = slots.get_mut(key) else {
            return;
        };

        while let Some(tx) = slot.waiters.pop_front() {
            if tx.send(()).is_ok() {
                debug!(key, "admission handed off");
                return;
            }
            // Receiver gone; try the next waiter
        }

        slots.remove(key);
        debug!(key, "admission slot cleared");
    }

    /// Returns the number of callers queued behind the holder of `key`.
    pub fn queued_len(&self, key: &str) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(key)
            .map(|s| s.waiters.len())
            .unwrap_or(0)
    }

    /// Drops all state. Pending waiters observe [`AdmissionError::Shutdown`].
    ///
    /// Shutdown only.
    pub fn clear(&self) {
        self.slots
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_first_acquire_is_immediate() {
        let queue = AdmissionQueue::new();
        assert!(queue.acquire("pack_a").is_immediate());
    }

    #[tokio::test]
    async fn test_independent_keys_do_not_block() {
        let queue = AdmissionQueue::new();
        assert!(queue.acquire("pack_a").is_immediate());
        assert!(queue.acquire("pack_b").is_immediate());
    }

    #[tokio::test]
    async fn test_exactly_one_immediate_grant() {
        let queue = Arc::new(AdmissionQueue::new());
        let mut immediate = 0;
        let mut waiters = Vec::new();

        for _ in 0..10 {
            match queue.acquire("pack_a") {
                Admission::Granted => immediate += 1,
                Admission::Queued(w) => waiters.push(w),
            }
        }

        assert_eq!(immediate, 1);
        assert_eq!(waiters.len(), 9);
    }

    #[tokio::test]
    async fn test_fifo_handoff_order() {
        let queue = Arc::new(AdmissionQueue::new());
        assert!(queue.acquire("pack_a").is_immediate());

        let mut waiters = Vec::new();
        for _ in 0..3 {
            match queue.acquire("pack_a") {
                Admission::Granted => panic!("slot already held"),
                Admission::Queued(w) => waiters.push(w),
            }
        }

        // Spawn waiters that record their completion order
        let (done_tx, mut done_rx) = tokio::sync::mpsc::unbounded_channel();
        for (i, waiter) in waiters.into_iter().enumerate() {
            let done_tx = done_tx.clone();
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                waiter.wait().await.unwrap();
                done_tx.send(i).unwrap();
                queue.release("pack_a");
            });
        }
        drop(done_tx);

        queue.release("pack_a");

        let mut order = Vec::new();
        while let Some(i) = done_rx.recv().await {
            order.push(i);
        }
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_release_skips_dropped_waiters() {
        let queue = AdmissionQueue::new();
        assert!(queue.acquire("pack_a").is_immediate());

        let abandoned = queue.acquire("pack_a");
        let kept = match queue.acquire("pack_a") {
            Admission::Queued(w) => w,
            Admission::Granted => panic!("slot already held"),
        };
        drop(abandoned);

        queue.release("pack_a");
        kept.wait().await.unwrap();
    }

    #[tokio::test]
    async fn test_release_without_waiters_clears_slot() {
        let queue = AdmissionQueue::new();
        assert!(queue.acquire("pack_a").is_immediate());
        queue.release("pack_a");
        assert!(queue.acquire("pack_a").is_immediate());
    }

    #[tokio::test]
    async fn test_clear_notifies_waiters() {
        let queue = AdmissionQueue::new();
        assert!(queue.acquire("pack_a").is_immediate());

        let waiter = match queue.acquire("pack_a") {
            Admission::Queued(w) => w,
            Admission::Granted => panic!("slot already held"),
        };

        queue.clear();
        assert_eq!(waiter.wait().await, Err(AdmissionError::Shutdown));
    }
}
