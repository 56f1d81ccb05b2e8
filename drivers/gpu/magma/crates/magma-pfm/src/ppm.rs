//! # Platform Power Mode
//!
//! The platform offers a small set of power modes (balanced, performance,
//! quiet...) as an index plus an availability mask. Clients switch modes
//! through SET_PPM; the switch itself runs as deferred work and at most one
//! may be in flight.

use magma_core::{Error, Result};
use magma_hal::DsmFunction;
use magma_rpc::{PowerModeChange, PowerModeReason, SubdeviceEvent};

use crate::counter::Sensor;
use crate::deferred::DeferredJob;
use crate::handler::{PfmState, PlatformRequestHandler};
use crate::wire::{ext_version, PpmWord, PPM_WORDS};

/// Cached power mode state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PpmCache {
    /// Available modes, or [`PpmWord::INVALID`]
    pub mask_current: u8,
    /// Active mode, or [`PpmWord::INVALID`]
    pub idx_current: u8,
    /// Target of the in-flight switch
    pub idx_requested: u8,
    /// A switch is queued and has not run yet
    pub work_item_pending: bool,
}

impl PpmCache {
    pub const fn new() -> Self {
        Self {
            mask_current: PpmWord::INVALID,
            idx_current: PpmWord::INVALID,
            idx_requested: PpmWord::INVALID,
            work_item_pending: false,
        }
    }

    /// Forget everything the platform told us
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Close out the in-flight switch
    pub fn finish_request(&mut self) {
        self.idx_requested = PpmWord::INVALID;
        self.work_item_pending = false;
    }

    fn allows(&self, index: u8) -> bool {
        index != PpmWord::INVALID
            && 1u32
                .checked_shl(index as u32)
                .is_some_and(|bit| self.mask_current as u32 & bit != 0)
    }
}

impl PlatformRequestHandler {
    /// Active mode index and available mask
    pub fn get_ppm(&self) -> Result<PpmWord> {
        let st = self.lock_initialized()?;
        Ok(PpmWord::new(st.ppm.idx_current, st.ppm.mask_current))
    }

    /// Request a switch to mode `index`
    ///
    /// Returns once the switch is queued; completion is announced with a
    /// power mode change event.
    pub fn set_ppm(&self, index: u8) -> Result<()> {
        let mut st = self.lock_initialized()?;

        if st.ppm.mask_current == PpmWord::INVALID {
            return Err(Error::InvalidData);
        }
        if index == st.ppm.idx_current {
            return Ok(());
        }
        if !st.ppm.allows(index) {
            log::debug!("PFM: power mode {} not in mask {:#x}", index, st.ppm.mask_current);
            return Err(Error::InvalidData);
        }
        if st.ppm.work_item_pending {
            return Err(Error::Busy);
        }

        st.ppm.idx_requested = index;
        match self.defer(DeferredJob::PlatformPowerMode) {
            Ok(()) => {
                st.ppm.work_item_pending = true;
                Ok(())
            }
            Err(Error::NotSupported) => self.run_job_locked(&mut st, DeferredJob::PlatformPowerMode),
            Err(e) => {
                st.ppm.finish_request();
                Err(e)
            }
        }
    }

    /// SETPPM with the requested index; notifies clients on success
    pub(crate) fn apply_power_mode(&self, st: &mut PfmState) -> Result<()> {
        let requested = st.ppm.idx_requested;
        let input = [ext_version::V1, PpmWord::new(requested, 0).raw()];
        let mut output = [0u32; PPM_WORDS];
        self.acpi.call_extended(DsmFunction::SetPpm, &input, &mut output)?;

        st.ppm.idx_current = requested;
        log::info!("PFM: platform power mode {} active", requested);
        self.gpu.notify_event(SubdeviceEvent::PlatformPowerModeChange(PowerModeChange {
            index: st.ppm.idx_current,
            mask: st.ppm.mask_current,
            reason: PowerModeReason::Completion,
        }));
        Ok(())
    }

    /// Re-read the platform's mode word and tell clients about it
    ///
    /// The active index is only adopted at init; at runtime the platform's
    /// choice is a notification and the client decides whether to switch.
    pub(crate) fn update_ppmd_limit(&self, st: &mut PfmState, init: bool) -> Result<()> {
        let word = PpmWord::from_raw(self.get_counter(st, Sensor::Ppmd.limit())?);

        st.ppm.mask_current = word.mask();
        if init {
            st.ppm.idx_current = word.index();
        }

        self.gpu.notify_event(SubdeviceEvent::PlatformPowerModeChange(PowerModeChange {
            index: word.index(),
            mask: st.ppm.mask_current,
            reason: PowerModeReason::AcpiNotification,
        }));
        Ok(())
    }
}
