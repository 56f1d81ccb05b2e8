//! # Platform Request Handler
//!
//! The handler object: one per driver instance, bound to exactly one GPU.
//! Entry points lock [`PfmState`] and hand it down to the component code in
//! the sibling modules; deferred work re-enters through the same lock after
//! taking the passive lock set.
//!
//! ## Lifecycle
//!
//! ```text
//! probe ──► state_init ──► state_load ◄──► state_unload ──► state_destroy
//! ```

use alloc::sync::{Arc, Weak};

use magma_core::{Error, GpuMask, Result};
use magma_hal::{AcpiDsm, DsmFunction, DsmRevision, LockProvider, Platform, WorkQueue};
use magma_rpc::GpuHandle;
use spin::{Mutex, MutexGuard};

use crate::acpi::AcpiBridge;
use crate::config::PfmConfig;
use crate::counter::{CounterCache, CounterId, Sensor};
use crate::deferred::SysControlQueue;
use crate::edpp::EdppData;
use crate::frm::{FrmRing, FRM_SAMPLE_COUNT};
use crate::pcontrol::VpstateCache;
use crate::ppm::PpmCache;
use crate::wire::{pshare_params_input, PshareData, PshareFields, QueryType, SupportMask};

// =============================================================================
// ENVIRONMENT
// =============================================================================

/// OS-layer collaborators the handler is built from
#[derive(Clone)]
pub struct PfmEnvironment {
    /// `_DSM` primitive
    pub dsm: Arc<dyn AcpiDsm>,
    /// Millisecond clock
    pub platform: Arc<dyn Platform>,
    /// Deferred work queue
    pub queue: Arc<dyn WorkQueue>,
    /// Semaphore, API lock and GPU locks
    pub locks: Arc<dyn LockProvider>,
    /// Tunables
    pub config: PfmConfig,
}

impl core::fmt::Debug for PfmEnvironment {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PfmEnvironment")
            .field("platform", &self.platform.name())
            .field("config", &self.config)
            .finish()
    }
}

// =============================================================================
// STATE
// =============================================================================

/// Firmware negotiation results
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct AcpiData {
    /// PSHARESTATUS and PSHAREPARAMS both advertised
    pub supported: bool,
    /// GPS 2.x software behavior
    pub sw_2x: bool,
    /// Last SUPPORT bitmap
    pub support: SupportMask,
    /// PSHAREPARAMS interface version
    pub pshare_version: u32,
    /// Sensors the platform reports
    pub avail_fields: PshareFields,
    /// Last platform EDP-peak limit read with GETEDPPLIMIT
    pub platform_edpp_limit: u32,
}

/// Driver-lifetime control flags
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ControlData {
    /// The first TGPU limit push after boot is still owed
    pub tgpu_override_required: bool,
    /// EDP-peak limit currently enabled on the GPU
    pub edpp_enabled: bool,
    /// User-configurable TGP mode currently enabled
    pub user_tgp_enabled: bool,
    /// Platform TGP customization applied
    pub platform_user_tgp_enabled: bool,
    /// Between `state_init` and `state_destroy`
    pub state_initialized: bool,
}

/// Everything the handler mutates
#[derive(Debug)]
pub(crate) struct PfmState {
    pub counters: CounterCache,
    pub acpi: AcpiData,
    pub control: ControlData,
    pub ppm: PpmCache,
    pub edpp: EdppData,
    pub sys_queue: SysControlQueue,
    pub vpstates: VpstateCache,
    pub frm: FrmRing<FRM_SAMPLE_COUNT>,
}

impl PfmState {
    fn new(config: &PfmConfig) -> Self {
        Self {
            counters: CounterCache::new(config.hold_period_ms),
            acpi: AcpiData::default(),
            control: ControlData {
                tgpu_override_required: true,
                ..ControlData::default()
            },
            ppm: PpmCache::new(),
            edpp: EdppData::default(),
            sys_queue: SysControlQueue::default(),
            vpstates: VpstateCache::default(),
            frm: FrmRing::new(),
        }
    }
}

// =============================================================================
// HANDLER
// =============================================================================

/// Platform request handler bound to one GPU
pub struct PlatformRequestHandler {
    this: Weak<PlatformRequestHandler>,
    pub(crate) gpu: Arc<dyn GpuHandle>,
    pub(crate) acpi: AcpiBridge,
    pub(crate) platform: Arc<dyn Platform>,
    pub(crate) queue: Arc<dyn WorkQueue>,
    pub(crate) locks: Arc<dyn LockProvider>,
    pub(crate) config: PfmConfig,
    state: Mutex<PfmState>,
}

impl PlatformRequestHandler {
    /// Bind to the first GPU in `attached` that the firmware acknowledges
    ///
    /// A GPU qualifies when SUPPORT answers under GPS 2.x or 1.x and physical
    /// RM confirms the engines the handler relies on.
    pub fn probe(
        env: PfmEnvironment,
        gpus: &[Arc<dyn GpuHandle>],
        attached: GpuMask,
    ) -> Result<Arc<Self>> {
        let mut candidates: alloc::vec::Vec<_> = gpus
            .iter()
            .filter(|gpu| attached.contains(gpu.instance()))
            .collect();
        candidates.sort_by_key(|gpu| gpu.instance());

        for gpu in candidates {
            let Ok((bridge, _)) = AcpiBridge::probe(env.dsm.clone(), gpu.instance()) else {
                continue;
            };
            if let Err(e) = gpu.physical_rm().pfm_dependency_check() {
                log::debug!("PFM: {:?} failed dependency check: {}", gpu.instance(), e);
                continue;
            }
            log::info!("PFM: bound to {:?} ({})", gpu.instance(), bridge.revision());
            return Ok(Self::new(env, gpu.clone(), bridge));
        }

        log::info!("PFM: no GPU in {:?} with platform support", attached);
        Err(Error::NotSupported)
    }

    /// Build around an already negotiated bridge
    pub fn new(env: PfmEnvironment, gpu: Arc<dyn GpuHandle>, acpi: AcpiBridge) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            gpu,
            acpi,
            platform: env.platform,
            queue: env.queue,
            locks: env.locks,
            state: Mutex::new(PfmState::new(&env.config)),
            config: env.config,
        })
    }

    /// Bound GPU
    pub fn gpu(&self) -> &Arc<dyn GpuHandle> {
        &self.gpu
    }

    /// Negotiated `_DSM` revision
    pub fn revision(&self) -> DsmRevision {
        self.acpi.revision()
    }

    /// Tunables
    pub fn config(&self) -> &PfmConfig {
        &self.config
    }

    /// Current millisecond timestamp
    pub(crate) fn now(&self) -> u32 {
        self.platform.time_ms()
    }

    /// Handle for work items
    pub(crate) fn weak(&self) -> Weak<Self> {
        self.this.clone()
    }

    /// Exclusive access to the handler state
    ///
    /// Callers already hold the GPU lock, so the state is never contended;
    /// contention means a caller skipped the lock and is refused rather than
    /// left spinning across a firmware call.
    pub(crate) fn lock_state(&self) -> Result<MutexGuard<'_, PfmState>> {
        self.state.try_lock().ok_or_else(|| {
            log::warn!("PFM: state accessed without the GPU lock");
            Error::Busy
        })
    }

    /// Blocking access for work items
    ///
    /// A work item holds the passive lock set, so whoever has the state
    /// is about to release it.
    pub(crate) fn wait_state(&self) -> MutexGuard<'_, PfmState> {
        self.state.lock()
    }

    /// Exclusive access for an entry point; the handler must be initialized
    pub(crate) fn lock_initialized(&self) -> Result<MutexGuard<'_, PfmState>> {
        let st = self.lock_state()?;
        if !st.control.state_initialized {
            return Err(Error::InvalidState);
        }
        Ok(st)
    }

    /// Fail with `InvalidState` outside `state_init`..`state_destroy`
    pub(crate) fn ensure_initialized(&self) -> Result<()> {
        self.lock_initialized().map(drop)
    }

    /// Whether `state_init` succeeded and `state_destroy` has not run
    pub fn is_initialized(&self) -> bool {
        self.lock_state()
            .map(|st| st.control.state_initialized)
            .unwrap_or(false)
    }

    /// Whether the platform supports PSHARESTATUS and PSHAREPARAMS
    pub fn is_supported(&self) -> Result<bool> {
        Ok(self.lock_state()?.acpi.supported)
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Negotiate with firmware and set up the counter cache
    ///
    /// The handler only accepts requests once this succeeds.
    pub fn state_init(&self) -> Result<()> {
        let mut st = self.lock_state()?;
        st.control.state_initialized = false;
        self.init_sensors(&mut st)?;
        st.control.state_initialized = true;
        Ok(())
    }

    fn init_sensors(&self, st: &mut PfmState) -> Result<()> {
        let now = self.now();
        let min_interval = self.config.min_interval_ms;

        st.counters.clear();
        st.counters.set_hold_period(self.config.hold_period_ms);
        st.acpi = AcpiData {
            sw_2x: self.config.platform_legacy || self.acpi.revision() == DsmRevision::Gps2x,
            ..AcpiData::default()
        };

        let mut result = Ok(());
        match self.acpi.support() {
            Ok(support) => {
                st.acpi.support = support;
                st.acpi.supported =
                    support.has(DsmFunction::PshareStatus) && support.has(DsmFunction::PshareParams);
            }
            Err(e) => log::debug!("PFM: SUPPORT unavailable: {}", e),
        }

        if st.acpi.supported {
            if let Err(e) = self.call_pshare_status(st, true) {
                log::warn!("PFM: initial PSHARESTATUS failed: {}", e);
            }

            let mut data = PshareData {
                status: pshare_params_input(QueryType::SupportedFields, PshareFields::TGPU | PshareFields::PPMD),
                ..PshareData::default()
            };
            match self.acpi.pshare_params(&mut data) {
                Ok(()) => {
                    st.acpi.pshare_version = data.version;
                    st.acpi.avail_fields = data.fields() & (PshareFields::TGPU | PshareFields::PPMD);
                }
                Err(e) => {
                    log::warn!("PFM: PSHAREPARAMS supported-fields query failed: {}", e);
                    result = Err(e);
                }
            }

            st.counters.init_supported(CounterId::AvailSensorMask, false, min_interval, now);
            st.counters.set(CounterId::AvailSensorMask, st.acpi.avail_fields.bits(), now);

            if st.acpi.avail_fields.contains(PshareFields::TGPU) {
                st.counters.init_supported(Sensor::Tgpu.limit(), true, min_interval, now);
                st.counters.init_supported(Sensor::Tgpu.period(), false, min_interval, now);
                st.counters.set(Sensor::Tgpu.period(), data.tgpu, now);
            }

            if st.acpi.sw_2x && st.acpi.avail_fields.contains(PshareFields::PPMD) {
                st.ppm.reset();
                st.counters.init_supported(Sensor::Ppmd.limit(), true, min_interval, now);
                if let Err(e) = self.update_ppmd_limit(st, true) {
                    log::debug!("PFM: initial power mode unavailable: {}", e);
                }
            }
        }

        st.counters.init_supported(CounterId::VpsPs20Support, true, min_interval, now);
        st.counters.init_supported(CounterId::Pm1StateAvail, true, min_interval, now);
        st.counters.init_supported(CounterId::TcEnable, true, min_interval, now);
        if let Err(e) = self.refresh_vpstates(st) {
            log::debug!("PFM: v-Pstate bounds unavailable: {}", e);
        }

        log::info!(
            "PFM: init done ({}, supported={}, sensors={:?})",
            self.acpi.revision(),
            st.acpi.supported,
            st.acpi.avail_fields
        );
        result
    }

    /// GPU subsystems are up; apply work that waited for them
    pub fn state_load(&self) -> Result<()> {
        let mut st = self.lock_initialized()?;
        let mut fan = crate::status::FanOut::new();

        fan.step("PMGR/THERM load sync", self.gpu.physical_rm().sync_pmgr_therm_load(true));

        if st.edpp.differ_platform_limit && self.gpu.is_pmu_loaded() {
            let limit = st.acpi.platform_edpp_limit;
            fan.step("deferred platform EDPp limit", self.platform_edpp_limit_update(limit));
            st.edpp.differ_platform_limit = false;
        }

        if st.control.tgpu_override_required && st.counters.is_supported(Sensor::Tgpu.limit()) {
            fan.step("initial TGPU limit", self.update_tgpu_limit(&mut st));
        }

        fan.finish()
    }

    /// GPU is going down; forget transient platform state
    pub fn state_unload(&self) -> Result<()> {
        let mut st = self.lock_initialized()?;
        st.ppm.reset();
        match self.gpu.physical_rm().sync_pmgr_therm_load(false) {
            Err(e) if !e.is_not_supported() => Err(e),
            _ => Ok(()),
        }
    }

    /// Tear down
    pub fn state_destroy(&self) {
        if let Ok(mut st) = self.lock_state() {
            st.control.state_initialized = false;
        }
    }
}

impl core::fmt::Debug for PlatformRequestHandler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PlatformRequestHandler")
            .field("gpu", &self.gpu.instance())
            .field("acpi", &self.acpi)
            .field("config", &self.config)
            .finish()
    }
}
