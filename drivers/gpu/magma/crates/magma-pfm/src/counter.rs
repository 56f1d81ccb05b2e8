//! # Counter Cache
//!
//! Fixed table of sensor and limit counters. Each entry carries its value,
//! validity, override pin and sampling window. Nothing here talks to firmware;
//! the sampling engine decides when an entry is refreshed.
//!
//! All timestamps are the wrapping 32-bit millisecond clock.

use magma_core::{Error, Result};
use static_assertions::const_assert;

// =============================================================================
// COUNTER IDS
// =============================================================================

/// Counter identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum CounterId {
    /// Current GPU temperature value reported by the platform
    TgpuValue       = 0,
    /// Current platform power mode value
    PpmdValue       = 1,
    /// GPU temperature limit (Celsius)
    TgpuLimit       = 2,
    /// Platform power mode word (index and mask)
    PpmdLimit       = 3,
    /// Platform sampling period for the GPU temperature
    TgpuPeriod      = 4,
    /// Platform sampling period for the power mode
    PpmdPeriod      = 5,
    /// Mask of sensors the platform reports
    AvailSensorMask = 6,
    /// P-state 2.0 v-Pstates in use
    VpsPs20Support  = 7,
    /// Temperature controller present
    TcEnable        = 8,
    /// PM1 (boost) available
    Pm1StateAvail   = 9,
}

impl CounterId {
    /// Number of counters
    pub const COUNT: usize = 10;

    /// Every counter, in id order
    pub const ALL: [CounterId; Self::COUNT] = [
        Self::TgpuValue,
        Self::PpmdValue,
        Self::TgpuLimit,
        Self::PpmdLimit,
        Self::TgpuPeriod,
        Self::PpmdPeriod,
        Self::AvailSensorMask,
        Self::VpsPs20Support,
        Self::TcEnable,
        Self::Pm1StateAvail,
    ];

    /// Table index
    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Bit in a counter mask
    #[inline]
    pub const fn bit(self) -> u32 {
        1 << (self as u32)
    }

    /// Look up by raw id
    pub fn from_raw(raw: u32) -> Option<Self> {
        Self::ALL.get(raw as usize).copied()
    }
}

// Queued-apply masks are a u32 with one bit per counter.
const_assert!(CounterId::COUNT <= 32);

/// Sensors negotiated through PSHAREPARAMS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sensor {
    /// GPU temperature
    Tgpu,
    /// Platform power mode
    Ppmd,
}

impl Sensor {
    /// Every sensor, in PSHAREPARAMS bit order
    pub const ALL: [Sensor; 2] = [Sensor::Tgpu, Sensor::Ppmd];

    /// Current value counter
    pub const fn value(self) -> CounterId {
        match self {
            Self::Tgpu => CounterId::TgpuValue,
            Self::Ppmd => CounterId::PpmdValue,
        }
    }

    /// Limit counter
    pub const fn limit(self) -> CounterId {
        match self {
            Self::Tgpu => CounterId::TgpuLimit,
            Self::Ppmd => CounterId::PpmdLimit,
        }
    }

    /// Period counter
    pub const fn period(self) -> CounterId {
        match self {
            Self::Tgpu => CounterId::TgpuPeriod,
            Self::Ppmd => CounterId::PpmdPeriod,
        }
    }

    /// Sensor whose limit counter is `id`
    pub fn from_limit(id: CounterId) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.limit() == id)
    }
}

// =============================================================================
// COUNTER
// =============================================================================

/// One cache entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counter {
    /// Payload; meaning depends on the id
    pub value: u32,
    /// Platform reports this counter
    pub supported: bool,
    /// Must be re-sampled periodically
    pub volatile: bool,
    /// Cached value must not be trusted
    pub invalid: bool,
    /// Pinned by a caller; sampling leaves it alone
    pub overridden: bool,
    /// Time of the last successful update
    pub last_sampled: u32,
    /// Minimum time between samples
    pub min_interval: u32,
}

// =============================================================================
// CACHE
// =============================================================================

/// Counter table
#[derive(Debug, Clone)]
pub struct CounterCache {
    counters: [Counter; CounterId::COUNT],
    hold_period: u32,
}

impl CounterCache {
    /// Create an empty cache
    pub fn new(hold_period: u32) -> Self {
        Self {
            counters: [Counter::default(); CounterId::COUNT],
            hold_period,
        }
    }

    /// Forget everything, keeping the hold period
    pub fn clear(&mut self) {
        self.counters = [Counter::default(); CounterId::COUNT];
    }

    /// Hold period (ms)
    pub fn hold_period(&self) -> u32 {
        self.hold_period
    }

    /// Set the hold period (ms)
    pub fn set_hold_period(&mut self, hold_period: u32) {
        self.hold_period = hold_period;
    }

    /// Read an entry
    #[inline]
    pub fn entry(&self, id: CounterId) -> &Counter {
        &self.counters[id.index()]
    }

    #[inline]
    fn entry_mut(&mut self, id: CounterId) -> &mut Counter {
        &mut self.counters[id.index()]
    }

    /// Raw value regardless of validity
    #[inline]
    pub fn value(&self, id: CounterId) -> u32 {
        self.entry(id).value
    }

    /// Whether the platform reports `id`
    #[inline]
    pub fn is_supported(&self, id: CounterId) -> bool {
        self.entry(id).supported
    }

    /// Whether `id` is pinned
    #[inline]
    pub fn is_overridden(&self, id: CounterId) -> bool {
        self.entry(id).overridden
    }

    /// Whether `id` currently holds an untrusted value
    #[inline]
    pub fn is_invalid(&self, id: CounterId) -> bool {
        self.entry(id).invalid
    }

    /// Cached value if trusted
    pub fn cached(&self, id: CounterId) -> Result<u32> {
        let c = self.entry(id);
        if !c.supported {
            return Err(Error::NotSupported);
        }
        if c.invalid {
            return Err(Error::InvalidData);
        }
        Ok(c.value)
    }

    /// One-time setup at init
    pub fn init_supported(&mut self, id: CounterId, volatile: bool, min_interval: u32, now: u32) {
        let c = self.entry_mut(id);
        c.supported = true;
        c.volatile = volatile;
        c.min_interval = min_interval;
        self.reset(id, now);
    }

    /// Invalidate and make immediately eligible for sampling
    ///
    /// No-op while overridden.
    pub fn reset(&mut self, id: CounterId, now: u32) {
        let hold = self.hold_period;
        let c = self.entry_mut(id);
        if c.overridden {
            return;
        }
        c.invalid = true;
        c.last_sampled = now.wrapping_sub(c.min_interval.max(hold)).wrapping_sub(1);
    }

    /// Record a sample result
    ///
    /// An overridden entry keeps its pinned value but is marked fresh.
    pub fn update(&mut self, id: CounterId, value: u32, valid: bool, now: u32) {
        let c = self.entry_mut(id);
        if valid || c.overridden {
            if !c.overridden {
                c.value = value;
            }
            c.last_sampled = now;
            c.invalid = false;
        } else {
            c.invalid = true;
        }
    }

    /// Push a value owned by control logic
    pub fn set(&mut self, id: CounterId, value: u32, now: u32) {
        self.update(id, value, true, now);
    }

    /// Pin `value` until [`CounterCache::cancel_override`]
    pub fn override_value(&mut self, id: CounterId, value: u32, now: u32) {
        let c = self.entry_mut(id);
        c.overridden = false;
        self.update(id, value, true, now);
        self.entry_mut(id).overridden = true;
    }

    /// Drop a pin and invalidate
    pub fn cancel_override(&mut self, id: CounterId, now: u32) {
        if self.entry(id).overridden {
            self.entry_mut(id).overridden = false;
            self.reset(id, now);
        }
    }

    /// Whether the entry must be re-sampled before it is returned
    pub fn is_stale(&self, id: CounterId, now: u32) -> bool {
        let c = self.entry(id);
        if !c.volatile || c.overridden {
            return false;
        }
        // Sample times slightly in the future read as age zero.
        let age = (now.wrapping_sub(c.last_sampled) as i32).max(0) as u32;
        age > self.hold_period && age > c.min_interval
    }

    /// Whether the last sample is younger than the entry's minimum interval
    pub fn within_min_interval(&self, id: CounterId, now: u32) -> bool {
        let c = self.entry(id);
        now.wrapping_sub(c.last_sampled) < c.min_interval
    }

    /// Whether the sampling engine may refresh the entry now
    pub fn may_sample(&self, id: CounterId, now: u32) -> bool {
        let c = self.entry(id);
        c.supported && (c.invalid || !self.within_min_interval(id, now))
    }
}
