//! # MAGMA Core Types
//!
//! GPU instance numbers, attachment masks, and the thermal engine's
//! fixed-point temperature.

use core::fmt;

use static_assertions::const_assert_eq;

// =============================================================================
// GPU INSTANCE
// =============================================================================

/// Index of an attached GPU
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct GpuInstance(u32);

impl GpuInstance {
    /// Instance `instance`
    #[inline]
    pub const fn new(instance: u32) -> Self {
        Self(instance)
    }

    /// Lock mask covering just this GPU
    #[inline]
    pub const fn mask(self) -> GpuMask {
        GpuMask(1 << self.0)
    }
}

impl fmt::Debug for GpuInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GPU{}", self.0)
    }
}

/// Set of GPU instances, one bit each
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct GpuMask(u32);

impl GpuMask {
    /// Mask from raw bits
    #[inline]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Whether `instance` is in the set
    #[inline]
    pub const fn contains(self, instance: GpuInstance) -> bool {
        instance.0 < 32 && self.0 & (1 << instance.0) != 0
    }
}

impl fmt::Debug for GpuMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GpuMask({:#x})", self.0)
    }
}

// =============================================================================
// TEMPERATURE
// =============================================================================

/// Temperature in signed 24.8 fixed point Celsius
///
/// Limits reach the thermal engine and arrive from clients in this form.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Temperature(i32);

const_assert_eq!(core::mem::size_of::<Temperature>(), 4);

impl Temperature {
    const FRAC_BITS: u32 = 8;

    /// Whole degrees
    #[inline]
    pub const fn from_celsius(celsius: i32) -> Self {
        Self(celsius << Self::FRAC_BITS)
    }

    /// From a raw 24.8 value
    #[inline]
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    /// Raw 24.8 value
    #[inline]
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Nearest whole degree, halves rounding up
    #[inline]
    pub const fn to_celsius_rounded(self) -> i32 {
        (self.0 + (1 << (Self::FRAC_BITS - 1))) >> Self::FRAC_BITS
    }
}

impl fmt::Debug for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/256 C", self.0)
    }
}
