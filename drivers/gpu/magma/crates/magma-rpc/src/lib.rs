//! # MAGMA Internal Control Calls
//!
//! Typed surface for the engine control calls that kernel-resident code
//! issues and physical RM (usually running on the GSP) services.
//!
//! ```text
//! ┌──────────────────────┐   control call    ┌─────────────────────────┐
//! │ Kernel RM            │ ────────────────► │ Physical RM (GSP)       │
//! │ (platform handler)   │ ◄──────────────── │ PMGR / THERM / PERF     │
//! └──────────────────────┘   typed payload   └─────────────────────────┘
//!            │
//!            │ subdevice events
//!            ▼
//!       RM clients
//! ```
//!
//! How a call reaches the co-processor (RPC queue, direct dispatch on
//! monolithic builds) is not visible at this layer.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

#[cfg(any(feature = "std", test))]
extern crate std;

pub mod control;
pub mod event;
pub mod gpu;

// Re-exports
pub use control::{EdppLimitInfo, EdppLimitRequest, PhysicalRm, VpstatesInfo};
pub use event::{PowerModeChange, PowerModeReason, SubdeviceEvent};
pub use gpu::GpuHandle;
