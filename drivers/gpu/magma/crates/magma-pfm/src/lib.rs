//! # MAGMA Platform Request Handler
//!
//! Kernel-side agent that negotiates GPU power and thermal limits with the
//! system firmware (SBIOS) through the GPS ACPI `_DSM` interface, and
//! forwards the agreed limits to the GPU's power and thermal engines.
//!
//! ```text
//!   RM clients ──► ctrl / router ──┐
//!                                  ▼
//!   SBIOS notify ──► status ──► PlatformRequestHandler ──► PhysicalRm
//!                                  │    │                 (PMGR/THERM/PERF)
//!                        counters ◄┘    └► deferred ──► WorkQueue
//!                                  │
//!                                  ▼
//!                           AcpiBridge ──► _DSM (GPS 2.x / 1.x)
//! ```
//!
//! One handler is bound to one GPU. All state sits behind a single lock
//! that callers reach while holding the GPU lock; deferred work takes the
//! full passive lock set first.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(clippy::all)]

extern crate alloc;

#[cfg(any(feature = "std", test))]
extern crate std;

// =============================================================================
// MODULE EXPORTS
// =============================================================================

pub mod acpi;
pub mod config;
pub mod counter;
pub mod ctrl;
pub mod deferred;
pub mod edpp;
pub mod frm;
pub mod handler;
pub mod pcontrol;
pub mod ppm;
pub mod router;
pub mod sampling;
pub mod status;
pub mod wire;

#[cfg(test)]
mod testing;

// Re-exports
pub use acpi::AcpiBridge;
pub use config::PfmConfig;
pub use counter::{CounterCache, CounterId, Sensor};
pub use ctrl::{PerfSensorBlock, PerfSensorMapFlags, PfmCtrlCmd, PfmCtrlParams, ThermLimitSource};
pub use deferred::LimitUpdate;
pub use frm::{FrmSample, FRM_SAMPLE_COUNT};
pub use handler::{PfmEnvironment, PlatformRequestHandler};
pub use router::LOCALE_SYSTEM;
