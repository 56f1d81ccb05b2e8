//! # State-Change Handler
//!
//! Reacts to firmware "status changed" notifications. Every sub-step runs
//! even when an earlier one failed; `NotSupported` from a sub-step means the
//! platform lacks that feature and is dropped.

use magma_core::{Error, Result};
use magma_hal::{DsmFunction, DsmRevision};

use crate::counter::Sensor;
use crate::handler::{PfmState, PlatformRequestHandler};
use crate::wire::{pshare_params_input, PshareData, PshareFields, PshareStatus, QueryType};

// =============================================================================
// FAN-OUT
// =============================================================================

/// Runs independent steps and keeps the first hard failure
#[derive(Debug, Default)]
pub(crate) struct FanOut {
    first: Option<Error>,
}

impl FanOut {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the outcome of one step
    pub fn step(&mut self, what: &str, result: Result<()>) {
        match result {
            Ok(()) => {}
            Err(e) if e.is_not_supported() => {
                log::debug!("PFM: {} not supported", what);
            }
            Err(e) => {
                log::warn!("PFM: {} failed: {}", what, e);
                self.first.get_or_insert(e);
            }
        }
    }

    /// First hard failure, if any
    pub fn finish(self) -> Result<()> {
        match self.first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

// =============================================================================
// PSHARESTATUS
// =============================================================================

impl PlatformRequestHandler {
    /// Firmware signalled a status change
    ///
    /// Re-reads PSHARESTATUS and acts on it, then runs PCONTROL negotiation
    /// where the platform still uses it.
    pub fn handle_status_change(&self) -> Result<()> {
        let mut st = self.lock_initialized()?;
        self.status_change_locked(&mut st)
    }

    pub(crate) fn status_change_locked(&self, st: &mut PfmState) -> Result<()> {
        let mut fan = FanOut::new();
        fan.step("PSHARESTATUS", self.call_pshare_status(st, false));

        let pcontrol = match self.acpi.revision() {
            DsmRevision::Gps1x => true,
            DsmRevision::Gps2x => match self.acpi.support() {
                Ok(support) => {
                    st.acpi.support = support;
                    support.has(DsmFunction::Pcontrol)
                }
                Err(e) => {
                    fan.step("SUPPORT", Err(e));
                    false
                }
            },
        };
        if pcontrol {
            fan.step("PCONTROL", self.pcontrol_locked(st));
        }
        fan.finish()
    }

    /// One PSHARESTATUS round trip and everything it asks for
    ///
    /// `init` marks the call made while sensors are being set up: enable
    /// toggles are left alone and a platform EDP-peak limit is held until
    /// the PMU has loaded.
    pub(crate) fn call_pshare_status(&self, st: &mut PfmState, init: bool) -> Result<()> {
        let status = self.acpi.pshare_status()?;
        log::debug!("PFM: PSHARESTATUS {:?} (init={})", status, init);

        let mut fan = FanOut::new();

        let edpp_request = status.contains(PshareStatus::EDPPEAK_LIMIT_UPDATE);
        if !init && edpp_request != st.control.edpp_enabled {
            fan.step("EDPp limit update", self.edppeak_limit_update(st, edpp_request));
        }

        if status.contains(PshareStatus::PLATFORM_GETEDPPEAKLIMIT_SET) {
            match self.acpi.get_edpp_limit() {
                Ok(limit) => st.acpi.platform_edpp_limit = limit,
                Err(e) => fan.step("GETEDPPLIMIT", Err(e)),
            }
            if init {
                st.edpp.differ_platform_limit = true;
            } else {
                let limit = st.acpi.platform_edpp_limit;
                fan.step("platform EDPp limit", self.platform_edpp_limit_update(limit));
            }
        }

        let tgp_request = status.contains(PshareStatus::USER_CONFIG_TGP_MODE);
        if !init && tgp_request != st.control.user_tgp_enabled {
            fan.step("user TGP mode", self.user_tgp_mode_update(st, tgp_request));
        }

        if status.contains(PshareStatus::PLAT_USER_CONFIG_TGP_MODE_SUPPORT)
            && !st.control.platform_user_tgp_enabled
        {
            fan.step("platform TGP customization", self.platform_tgp_customization(st));
        }

        if status.contains(PshareStatus::UPDATE_LIMIT) {
            let now = self.now();
            st.counters.reset(Sensor::Tgpu.limit(), now);
            st.counters.reset(Sensor::Ppmd.limit(), now);

            fan.step("TGPU limit", self.update_tgpu_limit(st));
            if st.acpi.sw_2x {
                fan.step("PPMD limit", self.update_ppmd_limit(st, false));
            }
        }

        if status.contains(PshareStatus::PLATFORM_SETEDPPEAKLIMITINFO_SET) {
            fan.step("EDPp limit info", self.platform_set_edpp_limit_info(st));
        }

        fan.finish()
    }

    fn user_tgp_mode_update(&self, st: &mut PfmState, enable: bool) -> Result<()> {
        self.gpu.physical_rm().configure_tgp_mode(enable)?;
        st.control.user_tgp_enabled = enable;
        log::info!("PFM: user-configurable TGP mode {}", if enable { "enabled" } else { "disabled" });
        Ok(())
    }

    /// Apply the platform's constant TGP offset once
    fn platform_tgp_customization(&self, st: &mut PfmState) -> Result<()> {
        let mut data = PshareData {
            status: pshare_params_input(QueryType::CurrentLimits, PshareFields::CTGP),
            version: st.acpi.pshare_version,
            ..PshareData::default()
        };
        self.acpi.pshare_params(&mut data)?;

        if data.fields().contains(PshareFields::CTGP) {
            st.edpp.ctgp_offset_mw = data.ctgp;
            st.control.platform_user_tgp_enabled = true;
            self.gpu.physical_rm().configure_turbo_v2(data.ctgp)?;
            log::info!("PFM: platform TGP offset {} mW applied", data.ctgp);
        }
        Ok(())
    }
}
