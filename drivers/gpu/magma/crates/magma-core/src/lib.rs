//! # MAGMA Core
//!
//! Foundational types and error handling shared by the MAGMA driver crates.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      magma-core                             │
//! │  ┌──────────────────────────┐  ┌─────────────────────────┐  │
//! │  │         Types            │  │         Error           │  │
//! │  │ (GpuInstance, GpuMask,   │  │  (status taxonomy used  │  │
//! │  │  Temperature)            │  │   by every crate)       │  │
//! │  └──────────────────────────┘  └─────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::new_without_default)]

#[cfg(feature = "std")]
extern crate std;

// =============================================================================
// MODULE EXPORTS
// =============================================================================

pub mod error;
pub mod types;

// Re-exports for convenience
pub use error::{AcpiError, Error, GspErrorCode, LockError, Result};
pub use types::*;
