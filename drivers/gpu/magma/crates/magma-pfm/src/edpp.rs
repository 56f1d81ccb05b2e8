//! # EDP-Peak Limits
//!
//! The platform can ask the GPU to enable its EDP-peak limit, hand it an
//! explicit limit (GETEDPPLIMIT), or ask for the GPU's limit range
//! (SETEDPPLIMITINFO). Engine calls are only made while the GPU is at full
//! power; otherwise the request is dropped without error.

use magma_core::{Error, Result};
use magma_rpc::{EdppLimitInfo, EdppLimitRequest};

use crate::deferred::DeferredJob;
use crate::handler::{PfmState, PlatformRequestHandler};
use crate::wire::{EdppLimitInfoV1, EDPP_VERSION_V10};

/// EDP-peak bookkeeping
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct EdppData {
    /// Limits last read from PMGR
    pub limit_info: EdppLimitInfo,
    /// Outcome of that read
    pub info_status: Option<Error>,
    /// A platform limit arrived before the PMU was ready
    pub differ_platform_limit: bool,
    /// SETEDPPLIMITINFO is queued and has not run yet
    pub work_item_pending: bool,
    /// Constant TGP offset applied at customization (mW)
    pub ctgp_offset_mw: u32,
}

impl PlatformRequestHandler {
    /// Enable or disable the engine's own EDP-peak limit
    pub(crate) fn edppeak_limit_update(&self, st: &mut PfmState, enable: bool) -> Result<()> {
        if !self.gpu.is_full_power() {
            return Ok(());
        }
        self.gpu
            .physical_rm()
            .update_edpp_limit(EdppLimitRequest {
                enable,
                client_limit: 0,
            })
            .map_err(|e| {
                log::error!("PFM: EDPp limit {} failed: {}", if enable { "enable" } else { "disable" }, e);
                e
            })?;
        st.control.edpp_enabled = enable;
        Ok(())
    }

    /// Apply a platform supplied limit (mW); 0 hands control back to the GPU
    pub(crate) fn platform_edpp_limit_update(&self, limit: u32) -> Result<()> {
        if !self.gpu.is_full_power() {
            return Ok(());
        }
        self.gpu
            .physical_rm()
            .update_edpp_limit(EdppLimitRequest {
                enable: limit != 0,
                client_limit: limit,
            })
            .map_err(|e| {
                log::error!("PFM: platform EDPp limit {} mW failed: {}", limit, e);
                e
            })
    }

    /// Read the GPU's EDP-peak range and queue the push to the platform
    pub(crate) fn platform_set_edpp_limit_info(&self, st: &mut PfmState) -> Result<()> {
        st.edpp.info_status = if self.gpu.is_full_power() {
            match self.gpu.physical_rm().get_edpp_limit_info() {
                Ok(info) => {
                    st.edpp.limit_info = info;
                    None
                }
                Err(e) => {
                    log::warn!("PFM: EDPp limit info unavailable: {}", e);
                    Some(Error::InvalidArgument)
                }
            }
        } else {
            Some(Error::GpuNotFullPower)
        };

        if st.edpp.work_item_pending {
            return Ok(());
        }
        match self.defer(DeferredJob::EdppLimitInfo) {
            Ok(()) => {
                st.edpp.work_item_pending = true;
                Ok(())
            }
            Err(Error::NotSupported) => self.run_job_locked(st, DeferredJob::EdppLimitInfo),
            Err(e) => Err(e),
        }
    }

    /// SETEDPPLIMITINFO with the last platform limit and whatever PMGR reported
    pub(crate) fn push_edpp_limit_info(&self, st: &mut PfmState) -> Result<()> {
        let mut info = EdppLimitInfoV1 {
            version: EDPP_VERSION_V10,
            limit_last: st.acpi.platform_edpp_limit,
            ..EdppLimitInfoV1::default()
        };
        if st.edpp.info_status.is_none() {
            let gpu = &st.edpp.limit_info;
            info.limit_min = gpu.limit_min;
            info.limit_rated = gpu.limit_rated;
            info.limit_max = gpu.limit_max;
            info.limit_curr = gpu.limit_curr;
            info.limit_batt_rated = gpu.limit_batt_rated;
            info.limit_batt_max = gpu.limit_batt_max;
        }
        self.acpi.set_edpp_limit_info(&info)
    }
}
