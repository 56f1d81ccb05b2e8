//! # Deferred Work Dispatcher
//!
//! Limit applies, power-mode switches and EDP-peak info pushes run on the
//! OS work queue. A work item owns nothing but a weak handle to the handler;
//! when it runs it takes the passive lock set, then the handler state.
//!
//! ```text
//! caller (GPU lock held)            work queue thread
//! ──────────────────────            ─────────────────
//! mark pending, queue item ───────► PassiveLocks::acquire
//!                                   wait for state
//!                                   run job, clear pending
//!                                   release (reverse order)
//! ```
//!
//! A queue that reports `NotSupported` means the host has no work queue; the
//! caller then runs the job body inline on its already locked state.

use alloc::boxed::Box;

use magma_core::{Error, Result, Temperature};
use magma_hal::PassiveLocks;

use crate::counter::Sensor;
use crate::handler::{PfmState, PlatformRequestHandler};

// =============================================================================
// TYPES
// =============================================================================

/// Coalescing queue of limit applies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct SysControlQueue {
    /// One bit per sensor awaiting an apply
    pub queued_mask: u32,
    /// A work item is queued and has not run yet
    pub work_item_pending: bool,
}

/// Outcome of an accepted limit update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitUpdate {
    /// The new limit was applied before returning
    Applied,
    /// The apply will complete on the work queue
    Deferred,
}

/// Work the dispatcher knows how to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeferredJob {
    /// Drain the queued limit mask
    SystemParamLimit,
    /// Switch to the requested platform power mode
    PlatformPowerMode,
    /// Push EDP-peak limit info to the platform
    EdppLimitInfo,
}

impl DeferredJob {
    /// Forget the pending state after the job was abandoned
    fn abandon(self, st: &mut PfmState) {
        match self {
            Self::SystemParamLimit => st.sys_queue.work_item_pending = false,
            Self::PlatformPowerMode => st.ppm.finish_request(),
            Self::EdppLimitInfo => st.edpp.work_item_pending = false,
        }
    }
}

// =============================================================================
// DISPATCH
// =============================================================================

impl PlatformRequestHandler {
    /// Hand `job` to the work queue
    pub(crate) fn defer(&self, job: DeferredJob) -> Result<()> {
        let handler = self.weak();
        self.queue.queue_work_item(
            self.gpu.instance(),
            Box::new(move || {
                if let Some(prh) = handler.upgrade() {
                    prh.run_deferred(job);
                }
            }),
        )
    }

    fn run_deferred(&self, job: DeferredJob) {
        let locks = match PassiveLocks::acquire(&*self.locks, self.gpu.instance().mask()) {
            Ok(locks) => locks,
            Err(e) => {
                log::error!("PFM: {:?} abandoned, locks unavailable: {}", job, e);
                job.abandon(&mut self.wait_state());
                return;
            }
        };

        let mut st = self.wait_state();
        if !st.control.state_initialized {
            log::debug!("PFM: {:?} dropped, handler torn down", job);
            job.abandon(&mut st);
        } else if let Err(e) = self.run_job_locked(&mut st, job) {
            log::warn!("PFM: deferred {:?} failed: {}", job, e);
        }
        drop(st);
        drop(locks);
    }

    /// Job body; clears the job's pending state on every path
    pub(crate) fn run_job_locked(&self, st: &mut PfmState, job: DeferredJob) -> Result<()> {
        let result = match job {
            DeferredJob::SystemParamLimit => {
                self.apply_queued_limits(st);
                Ok(())
            }
            DeferredJob::PlatformPowerMode => {
                if self.gpu.full_sanity_check() {
                    self.apply_power_mode(st)
                } else {
                    Err(Error::GpuNotFullPower)
                }
            }
            DeferredJob::EdppLimitInfo => {
                if self.gpu.full_sanity_check() {
                    self.push_edpp_limit_info(st)
                } else {
                    Err(Error::GpuNotFullPower)
                }
            }
        };
        job.abandon(st);
        result
    }

    fn apply_queued_limits(&self, st: &mut PfmState) {
        let mask = st.sys_queue.queued_mask;
        for (bit, sensor) in Sensor::ALL.into_iter().enumerate() {
            if mask & (1 << bit) == 0 {
                continue;
            }
            if let Err(e) = self.update_system_param_limit(st, sensor) {
                log::warn!("PFM: applying {:?} limit failed: {}", sensor, e);
            }
        }
        st.sys_queue.queued_mask = 0;
    }

    // =========================================================================
    // LIMIT APPLY
    // =========================================================================

    /// Set or remove the operating limit of sensor `id`
    ///
    /// Temperature limits arrive as 24.8 fixed point. Repeated calls while a
    /// work item is pending fold into that item.
    pub fn operating_limit_update(&self, id: u32, limit: u32, set: bool) -> Result<LimitUpdate> {
        let mut st = self.lock_initialized()?;
        let sensor = *Sensor::ALL.get(id as usize).ok_or(Error::InvalidArgument)?;
        let now = self.now();
        let counter = sensor.limit();

        if set {
            let value = match sensor {
                Sensor::Tgpu => Temperature::from_raw(limit as i32).to_celsius_rounded() as u32,
                Sensor::Ppmd => limit,
            };
            st.counters.set(counter, value, now);
        } else {
            st.counters.reset(counter, now);
        }

        st.sys_queue.queued_mask |= 1 << id;

        if !st.sys_queue.work_item_pending {
            match self.defer(DeferredJob::SystemParamLimit) {
                Ok(()) => st.sys_queue.work_item_pending = true,
                Err(Error::NotSupported) => st.sys_queue.queued_mask &= !(1 << id),
                // The bit stays queued for the next item that does get queued.
                Err(e) => return Err(e),
            }
        }

        if st.sys_queue.work_item_pending {
            Ok(LimitUpdate::Deferred)
        } else {
            self.update_system_param_limit(&mut st, sensor)?;
            Ok(LimitUpdate::Applied)
        }
    }

    fn update_system_param_limit(&self, st: &mut PfmState, sensor: Sensor) -> Result<()> {
        match sensor {
            Sensor::Tgpu => self.update_tgpu_limit(st),
            Sensor::Ppmd => Err(Error::NotSupported),
        }
    }

    /// Push the current TGPU limit to THERM
    ///
    /// Goes through the counter read so a pinned value wins. On 2.x a limit
    /// of 0 C leaves the VBIOS default in place.
    pub(crate) fn update_tgpu_limit(&self, st: &mut PfmState) -> Result<()> {
        let celsius = self.get_counter(st, Sensor::Tgpu.limit())?;
        if st.acpi.sw_2x && celsius == 0 {
            return Ok(());
        }
        self.gpu
            .physical_rm()
            .update_tgpu_limit(Temperature::from_celsius(celsius as i32))?;
        st.control.tgpu_override_required = false;
        log::debug!("PFM: TGPU limit {} C applied", celsius);
        Ok(())
    }
}
