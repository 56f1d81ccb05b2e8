//! # Handler Configuration

/// Platform request handler tunables
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PfmConfig {
    /// How long a sampled counter value is trusted (ms)
    pub hold_period_ms: u32,
    /// Default minimum interval between firmware samples (ms)
    pub min_interval_ms: u32,
    /// Upper bound on PCONTROL round trips per negotiation
    pub pcontrol_max_iterations: u32,
    /// PM1 (boost) permanently disabled by registry/policy
    pub pm1_forced_off: bool,
    /// Platform needs GPS 2.x software behavior regardless of DSM revision
    pub platform_legacy: bool,
}

impl PfmConfig {
    /// Default counter hold period
    pub const DEFAULT_HOLD_PERIOD_MS: u32 = 100;
    /// Default PCONTROL iteration cap
    pub const DEFAULT_PCONTROL_MAX_ITERATIONS: u32 = 16;
}

impl Default for PfmConfig {
    fn default() -> Self {
        Self {
            hold_period_ms: Self::DEFAULT_HOLD_PERIOD_MS,
            min_interval_ms: Self::DEFAULT_HOLD_PERIOD_MS,
            pcontrol_max_iterations: Self::DEFAULT_PCONTROL_MAX_ITERATIONS,
            pm1_forced_off: false,
            platform_legacy: false,
        }
    }
}
