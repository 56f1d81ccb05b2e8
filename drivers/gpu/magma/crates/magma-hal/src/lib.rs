//! # MAGMA Hardware Abstraction Layer
//!
//! OS-layer primitives the driver core consumes without owning: ACPI `_DSM`
//! invocation, the millisecond timestamp, deferred work queues, and the
//! semaphore / API lock / GPU lock trio.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                       magma-hal                          │
//! │  ┌──────────┐ ┌──────────┐ ┌─────────────┐ ┌──────────┐  │
//! │  │ Platform │ │ AcpiDsm  │ │  WorkQueue  │ │  Locks   │  │
//! │  │ (time)   │ │ (_DSM)   │ │ (deferred)  │ │ (RAII)   │  │
//! │  └──────────┘ └──────────┘ └─────────────┘ └──────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

extern crate alloc;

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod acpi;
pub mod locks;
pub mod platform;
pub mod workqueue;

// Re-exports
pub use acpi::{AcpiDsm, DsmFunction, DsmRevision};
pub use locks::{ApiLockGuard, GpuLockGuard, LockFlags, LockProvider, PassiveLocks, SemaphoreGuard};
pub use platform::{ManualClock, Platform};
pub use workqueue::{BoundedWorkQueue, NoWorkQueue, WorkItem, WorkQueue};
