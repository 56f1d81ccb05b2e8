//! # Engine Control Calls
//!
//! Calls the platform handler makes into PMGR, THERM and PERF. Every call is
//! synchronous; a physical RM that lacks the control answers
//! [`Error::NotSupported`](magma_core::Error::NotSupported).

use magma_core::{Result, Temperature};

// =============================================================================
// PAYLOADS
// =============================================================================

/// EDP-peak enable/disable request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EdppLimitRequest {
    /// Enable the EDP-peak limit
    pub enable: bool,
    /// Platform-supplied limit, 0 when the engine should use its own
    pub client_limit: u32,
}

/// EDP-peak limit values owned by PMGR (milliwatts)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EdppLimitInfo {
    /// Minimum limit
    pub limit_min: u32,
    /// Rated limit
    pub limit_rated: u32,
    /// Maximum limit
    pub limit_max: u32,
    /// Currently applied limit
    pub limit_curr: u32,
    /// Rated limit on battery
    pub limit_batt_rated: u32,
    /// Maximum limit on battery
    pub limit_batt_max: u32,
}

/// Driver-side v-Pstate bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VpstatesInfo {
    /// Slowest v-Pstate index
    pub slowest: u8,
    /// Fastest v-Pstate index
    pub fastest: u8,
    /// Whether P-state 2.0 v-Pstates are in use
    pub ps20_supported: bool,
}

// =============================================================================
// PHYSICAL RM
// =============================================================================

/// Engine control calls serviced by physical RM
pub trait PhysicalRm: Send + Sync {
    /// Whether every engine the platform handler relies on is present
    fn pfm_dependency_check(&self) -> Result<()>;

    /// Tell PMGR/THERM whether the platform handler is loaded
    fn sync_pmgr_therm_load(&self, loaded: bool) -> Result<()>;

    /// Read PM1 (boost) availability
    fn get_pm1_state(&self) -> Result<bool>;

    /// Set PM1 (boost) availability
    fn set_pm1_state(&self, available: bool) -> Result<()>;

    /// Apply a GPU temperature limit
    fn update_tgpu_limit(&self, limit: Temperature) -> Result<()>;

    /// Enable or disable the EDP-peak limit
    fn update_edpp_limit(&self, request: EdppLimitRequest) -> Result<()>;

    /// Read EDP-peak limit values
    fn get_edpp_limit_info(&self) -> Result<EdppLimitInfo>;

    /// Enable or disable user-configurable TGP mode
    fn configure_tgp_mode(&self, enable: bool) -> Result<()>;

    /// Apply a constant TGP offset (milliwatts) to Turbo v2
    fn configure_turbo_v2(&self, ctgp_offset_mw: u32) -> Result<()>;

    /// Read v-Pstate bounds
    fn get_vpstates_info(&self) -> Result<VpstatesInfo>;

    /// Map a v-Pstate index to its P-state
    fn get_vpstate_mapping(&self, index: u8) -> Result<u8>;

    /// Cap performance at `max_vpstate`
    fn set_vpstate_limit(&self, max_vpstate: u8) -> Result<()>;
}
