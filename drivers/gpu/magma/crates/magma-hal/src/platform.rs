//! # Platform Abstraction
//!
//! Time source provided by the host OS layer.

// =============================================================================
// PLATFORM TRAIT
// =============================================================================

/// Platform abstraction trait
///
/// Each host (Helix, Linux, FreeBSD) implements this to expose the
/// primitives platform negotiation code needs.
pub trait Platform: Send + Sync {
    /// Get platform name
    fn name(&self) -> &'static str;

    /// Monotonic millisecond counter
    ///
    /// Wraps at 32 bits; consumers must compute ages with wrapping arithmetic.
    fn time_ms(&self) -> u32;
}

/// Fixed, manually advanced clock
///
/// Used where a deterministic time source is needed, such as replaying
/// firmware traces.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: core::sync::atomic::AtomicU32,
}

impl ManualClock {
    /// Create a clock starting at `start` milliseconds
    pub const fn new(start: u32) -> Self {
        Self {
            now: core::sync::atomic::AtomicU32::new(start),
        }
    }

    /// Advance by `ms`, wrapping at 32 bits
    pub fn advance(&self, ms: u32) {
        self.now.fetch_add(ms, core::sync::atomic::Ordering::Relaxed);
    }

    /// Jump to an absolute time
    pub fn set(&self, ms: u32) {
        self.now.store(ms, core::sync::atomic::Ordering::Relaxed);
    }
}

impl Platform for ManualClock {
    fn name(&self) -> &'static str {
        "manual"
    }

    fn time_ms(&self) -> u32 {
        self.now.load(core::sync::atomic::Ordering::Relaxed)
    }
}
