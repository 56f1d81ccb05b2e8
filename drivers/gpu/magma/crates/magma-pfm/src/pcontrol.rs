//! # PCONTROL Negotiation
//!
//! Legacy v-Pstate negotiation. Firmware drives the exchange; each response
//! either asks for a v-Pstate mapping, caps performance, or ends the
//! exchange.
//!
//! ```text
//!            ┌──────────────── VpstateInfo ◄───┐
//!            ▼                                 │
//!   request ───► PCONTROL ───► response ───────┤
//!            ▲                                 │
//!            └──────────────── VpstateSet  ◄───┘
//!                                  │
//!                               NoAction ──► done
//! ```

use magma_core::{Error, Result};
use magma_hal::DsmRevision;

use crate::counter::CounterId;
use crate::handler::{PfmState, PlatformRequestHandler};
use crate::wire::{PcontrolRequest, PcontrolRequestType, PcontrolResponse};

/// Driver-side v-Pstate view
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct VpstateCache {
    pub slowest: u8,
    pub fastest: u8,
    pub ps20_supported: bool,
    /// Cap last applied on firmware request
    pub limit: Option<u8>,
}

impl PlatformRequestHandler {
    /// The driver's v-Pstate table changed
    ///
    /// Refreshes the cached bounds; 1.x firmware is then renegotiated.
    pub fn notify_vpstate_change(&self) -> Result<()> {
        let mut st = self.lock_initialized()?;
        self.refresh_vpstates(&mut st)?;
        if self.acpi.revision() == DsmRevision::Gps1x {
            self.pcontrol_locked(&mut st)?;
        }
        Ok(())
    }

    pub(crate) fn refresh_vpstates(&self, st: &mut PfmState) -> Result<()> {
        let info = self.gpu.physical_rm().get_vpstates_info()?;
        st.vpstates.slowest = info.slowest;
        st.vpstates.fastest = info.fastest;
        st.vpstates.ps20_supported = info.ps20_supported;
        st.counters.reset(CounterId::VpsPs20Support, self.now());
        Ok(())
    }

    fn pcontrol_request(st: &PfmState, kind: PcontrolRequestType, index: u8) -> PcontrolRequest {
        PcontrolRequest::new(kind)
            .with_index(index)
            .with_slowest(st.vpstates.slowest)
            .with_fastest(st.vpstates.fastest)
    }

    /// Run PCONTROL until firmware answers NoAction
    pub(crate) fn pcontrol_locked(&self, st: &mut PfmState) -> Result<()> {
        let mut request = Self::pcontrol_request(st, PcontrolRequestType::VpstateInfo, 0);

        for _ in 0..self.config.pcontrol_max_iterations {
            let word = self.acpi.pcontrol(request)?;
            let response = PcontrolResponse::decode(word).ok_or_else(|| {
                log::warn!("PFM: PCONTROL returned reserved response {:#x}", word);
                Error::NotSupported
            })?;

            request = match response {
                PcontrolResponse::NoAction => return Ok(()),
                PcontrolResponse::VpstateInfo { index } => {
                    let mapping = self.gpu.physical_rm().get_vpstate_mapping(index)?;
                    Self::pcontrol_request(st, PcontrolRequestType::VpstateInfo, mapping)
                }
                PcontrolResponse::VpstateSet { max } => {
                    self.gpu.physical_rm().set_vpstate_limit(max)?;
                    let previous = st.vpstates.limit.replace(max).unwrap_or(st.vpstates.fastest);
                    log::debug!("PFM: v-Pstate cap {} -> {}", previous, max);
                    Self::pcontrol_request(st, PcontrolRequestType::VpstateSet, previous)
                }
            };
        }

        log::warn!(
            "PFM: PCONTROL did not settle after {} rounds",
            self.config.pcontrol_max_iterations
        );
        Err(Error::InvalidState)
    }
}
