//! # Subdevice Events
//!
//! Notifications delivered to RM clients listening on the GPU subdevice.

use static_assertions::const_assert;

// =============================================================================
// POWER MODE CHANGE
// =============================================================================

/// Why a platform power mode notification fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PowerModeReason {
    /// A driver-initiated mode change completed
    Completion       = 0,
    /// Platform firmware announced a new mode or mask
    AcpiNotification = 1,
}

/// Platform power mode payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerModeChange {
    /// Active mode index
    pub index: u8,
    /// Available modes mask
    pub mask: u8,
    /// Trigger
    pub reason: PowerModeReason,
}

impl PowerModeChange {
    const INDEX_SHIFT: u32 = 0;
    const MASK_SHIFT: u32 = 8;
    const REASON_SHIFT: u32 = 16;

    /// Packed info word: index 7:0, mask 15:8, reason 23:16
    pub const fn info32(&self) -> u32 {
        ((self.index as u32) << Self::INDEX_SHIFT)
            | ((self.mask as u32) << Self::MASK_SHIFT)
            | ((self.reason as u32) << Self::REASON_SHIFT)
    }
}

const_assert!(PowerModeChange::REASON_SHIFT + 8 <= 32);

// =============================================================================
// EVENTS
// =============================================================================

/// Subdevice event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum SubdeviceEvent {
    /// `PLATFORM_POWER_MODE_CHANGE`
    PlatformPowerModeChange(PowerModeChange),
}

impl SubdeviceEvent {
    /// 32-bit info word carried alongside the payload
    pub const fn info32(&self) -> u32 {
        match self {
            Self::PlatformPowerModeChange(change) => change.info32(),
        }
    }
}
