//! # Sampling Engine
//!
//! The single read path for counters. A stale entry is refreshed from its
//! source before it is handed out; a fresh or pinned entry is returned
//! without touching firmware.

use magma_core::{Error, Result};

use crate::counter::{CounterId, Sensor};
use crate::handler::{PfmState, PlatformRequestHandler};
use crate::wire::{pshare_params_input, PshareData, PshareFields, QueryType};

impl PlatformRequestHandler {
    /// Read a counter, sampling it first if it went stale
    pub fn get_perf_sensor_counter(&self, id: CounterId) -> Result<u32> {
        let mut st = self.lock_initialized()?;
        self.get_counter(&mut st, id)
    }

    pub(crate) fn get_counter(&self, st: &mut PfmState, id: CounterId) -> Result<u32> {
        if !st.counters.is_supported(id) {
            return Err(Error::NotSupported);
        }

        let now = self.now();
        let mut sample_error = None;

        if st.counters.is_stale(id, now) {
            if let Err(e) = self.sample_counter(st, id, now) {
                if st.acpi.sw_2x && !e.is_not_supported() {
                    log::error!("PFM: sampling {:?} failed: {}", id, e);
                    return Err(e);
                }
                sample_error = Some(e);
            }
        }

        // Platforms may advertise a sensor and still leave its limit unset.
        if st.counters.is_stale(id, now) || st.counters.is_invalid(id) {
            return Err(match sample_error {
                Some(e) if e.is_not_supported() => Error::NotSupported,
                _ => Error::InvalidData,
            });
        }
        st.counters.cached(id)
    }

    /// Refresh `id` from its source if its minimum interval allows
    pub(crate) fn sample_counter(&self, st: &mut PfmState, id: CounterId, now: u32) -> Result<()> {
        if !st.counters.may_sample(id, now) {
            return Err(Error::NotSupported);
        }

        match id {
            CounterId::TgpuLimit | CounterId::PpmdLimit => self.sample_sensor_limits(st, now),
            CounterId::Pm1StateAvail => {
                if self.config.pm1_forced_off {
                    return Err(Error::NotSupported);
                }
                let available = self.gpu.physical_rm().get_pm1_state()?;
                st.counters.update(id, available as u32, true, now);
                Ok(())
            }
            CounterId::VpsPs20Support => {
                let value = st.vpstates.ps20_supported as u32;
                st.counters.update(id, value, true, now);
                Ok(())
            }
            CounterId::TcEnable => {
                st.counters.update(id, 1, true, now);
                Ok(())
            }
            _ => Err(Error::NotSupported),
        }
    }

    /// Batched PSHAREPARAMS current-limits query
    ///
    /// Sensors that are pinned or were sampled inside their minimum interval
    /// are left out of the request; nothing is sent when none remain.
    fn sample_sensor_limits(&self, st: &mut PfmState, now: u32) -> Result<()> {
        let mut fields = st.acpi.avail_fields;
        for sensor in Sensor::ALL {
            let id = sensor.limit();
            if st.counters.is_overridden(id) || st.counters.within_min_interval(id, now) {
                fields.remove(PshareFields::for_sensor(sensor));
            }
        }
        if fields.is_empty() {
            return Ok(());
        }

        let mut data = PshareData {
            status: pshare_params_input(QueryType::CurrentLimits, fields),
            version: st.acpi.pshare_version,
            ..PshareData::default()
        };
        self.acpi.pshare_params(&mut data)?;

        let valid = data.fields();
        for sensor in Sensor::ALL {
            let bit = PshareFields::for_sensor(sensor);
            if fields.contains(bit) {
                st.counters.update(sensor.limit(), data.sensor_value(sensor), valid.contains(bit), now);
            }
        }
        Ok(())
    }
}
