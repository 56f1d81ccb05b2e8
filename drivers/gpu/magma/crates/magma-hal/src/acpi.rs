//! # ACPI `_DSM` Invocation
//!
//! The host OS owns the method encoding (GUID, package layout). Driver code
//! only picks the revision, the subfunction and the word buffer.

use core::fmt;

use magma_core::{GpuInstance, Result};

// =============================================================================
// REVISION
// =============================================================================

/// GPS `_DSM` GUID/revision selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DsmRevision {
    /// GPS 1.x
    Gps1x,
    /// GPS 2.x
    Gps2x,
}

impl fmt::Display for DsmRevision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gps1x => write!(f, "GPS 1.x"),
            Self::Gps2x => write!(f, "GPS 2.x"),
        }
    }
}

// =============================================================================
// SUBFUNCTIONS
// =============================================================================

/// GPS `_DSM` subfunction numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum DsmFunction {
    /// Supported subfunction bitmap
    Support          = 0x00,
    /// Legacy v-Pstate negotiation
    Pcontrol         = 0x1C,
    /// Global power-share status
    PshareStatus     = 0x20,
    /// Get CPU package power limits
    GetPpl           = 0x24,
    /// Set CPU package power limits
    SetPpl           = 0x25,
    /// Get CPU turbo ratio (frequency) limit
    GetTrl           = 0x26,
    /// Set CPU turbo ratio (frequency) limit
    SetTrl           = 0x27,
    /// Get platform power mode
    GetPpm           = 0x28,
    /// Set platform power mode
    SetPpm           = 0x29,
    /// Power-share parameter block
    PshareParams     = 0x2A,
    /// Push EDP-peak limit information to the platform
    SetEdppLimitInfo = 0x2B,
    /// Read the platform EDP-peak limit
    GetEdppLimit     = 0x2C,
}

impl DsmFunction {
    /// Subfunction number as passed to the method
    #[inline]
    pub const fn number(self) -> u32 {
        self as u32
    }

    /// Look up a subfunction by number
    pub const fn from_number(number: u32) -> Option<Self> {
        Some(match number {
            0x00 => Self::Support,
            0x1C => Self::Pcontrol,
            0x20 => Self::PshareStatus,
            0x24 => Self::GetPpl,
            0x25 => Self::SetPpl,
            0x26 => Self::GetTrl,
            0x27 => Self::SetTrl,
            0x28 => Self::GetPpm,
            0x29 => Self::SetPpm,
            0x2A => Self::PshareParams,
            0x2B => Self::SetEdppLimitInfo,
            0x2C => Self::GetEdppLimit,
            _ => return None,
        })
    }
}

// =============================================================================
// DSM TRAIT
// =============================================================================

/// ACPI `_DSM` invocation primitive
///
/// `io` carries the input words on entry and the output words on return.
/// The call returns how many words of `io` hold output. Calls are synchronous
/// and may block for as long as the firmware method runs.
pub trait AcpiDsm: Send + Sync {
    /// Evaluate `function` for `gpu` under `revision`
    fn call_dsm(
        &self,
        gpu: GpuInstance,
        revision: DsmRevision,
        function: DsmFunction,
        io: &mut [u32],
    ) -> Result<usize>;
}
