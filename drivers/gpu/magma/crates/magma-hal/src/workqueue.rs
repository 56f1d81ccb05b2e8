//! # Deferred Work Queue
//!
//! Work items run later, outside the context that queued them, and must
//! take their own locks.

use alloc::boxed::Box;
use alloc::collections::VecDeque;

use magma_core::{Error, GpuInstance, Result};
use spin::Mutex;

// =============================================================================
// WORK ITEM
// =============================================================================

/// Unit of deferred execution
pub type WorkItem = Box<dyn FnOnce() + Send + 'static>;

/// OS work-queue primitive
pub trait WorkQueue: Send + Sync {
    /// Queue `item` on behalf of `gpu`
    ///
    /// Implementations never run the item inline. [`Error::NotSupported`]
    /// tells the caller to perform the action synchronously instead.
    fn queue_work_item(&self, gpu: GpuInstance, item: WorkItem) -> Result<()>;
}

// =============================================================================
// NO WORK QUEUE
// =============================================================================

/// Host without a work queue; every request reports `NotSupported`
#[derive(Debug, Default, Clone, Copy)]
pub struct NoWorkQueue;

impl WorkQueue for NoWorkQueue {
    fn queue_work_item(&self, _gpu: GpuInstance, _item: WorkItem) -> Result<()> {
        Err(Error::NotSupported)
    }
}

// =============================================================================
// BOUNDED WORK QUEUE
// =============================================================================

struct Entry {
    gpu: GpuInstance,
    item: WorkItem,
}

/// FIFO work queue with a fixed capacity, drained by its owner
///
/// The owning thread calls [`BoundedWorkQueue::run_pending`]; items queued
/// while draining run in the same pass.
pub struct BoundedWorkQueue {
    entries: Mutex<VecDeque<Entry>>,
    capacity: usize,
}

impl BoundedWorkQueue {
    /// Create a queue holding at most `capacity` items
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Number of queued items
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Run every queued item, returning how many ran
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        loop {
            // Pop under the lock, run outside it.
            let entry = self.entries.lock().pop_front();
            match entry {
                Some(entry) => {
                    log::trace!("WorkQueue: running item for {:?}", entry.gpu);
                    (entry.item)();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }
}

impl WorkQueue for BoundedWorkQueue {
    fn queue_work_item(&self, gpu: GpuInstance, item: WorkItem) -> Result<()> {
        let mut entries = self.entries.lock();
        if entries.len() >= self.capacity {
            log::warn!("WorkQueue: full ({} items), rejecting item for {:?}", self.capacity, gpu);
            return Err(Error::Busy);
        }
        entries.push_back(Entry { gpu, item });
        Ok(())
    }
}

impl core::fmt::Debug for BoundedWorkQueue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BoundedWorkQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}
