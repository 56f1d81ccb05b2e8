//! Scripted firmware, engine and OS doubles shared by the unit tests.

use alloc::collections::VecDeque;
use alloc::sync::Arc;
use alloc::vec::Vec;

use magma_core::{AcpiError, Error, GpuInstance, GpuMask, GspErrorCode, LockError, Result, Temperature};
use magma_hal::{
    AcpiDsm, BoundedWorkQueue, DsmFunction, DsmRevision, LockFlags, LockProvider, ManualClock, Platform,
    WorkQueue,
};
use magma_rpc::{EdppLimitInfo, EdppLimitRequest, GpuHandle, PhysicalRm, SubdeviceEvent, VpstatesInfo};
use spin::Mutex;

use crate::acpi::AcpiBridge;
use crate::config::PfmConfig;
use crate::handler::{PfmEnvironment, PlatformRequestHandler};
use crate::wire::{
    ext_version, EdppLimitInfoV1, PcontrolResponse, PpmWord, PshareData, PshareFields, PshareStatus,
    SupportMask,
};

// =============================================================================
// FIRMWARE
// =============================================================================

const GPS2X_FUNCTIONS: [DsmFunction; 11] = [
    DsmFunction::Support,
    DsmFunction::PshareStatus,
    DsmFunction::PshareParams,
    DsmFunction::GetPpl,
    DsmFunction::SetPpl,
    DsmFunction::GetTrl,
    DsmFunction::SetTrl,
    DsmFunction::GetPpm,
    DsmFunction::SetPpm,
    DsmFunction::SetEdppLimitInfo,
    DsmFunction::GetEdppLimit,
];

const GPS1X_FUNCTIONS: [DsmFunction; 4] = [
    DsmFunction::Support,
    DsmFunction::Pcontrol,
    DsmFunction::PshareStatus,
    DsmFunction::PshareParams,
];

struct FirmwareState {
    support_2x: Option<SupportMask>,
    support_1x: Option<SupportMask>,
    rejected: Vec<GpuInstance>,
    failing: Vec<DsmFunction>,
    short: Vec<(DsmFunction, usize)>,
    /// Function and first input word of every call
    calls: Vec<(DsmFunction, u32)>,
    status: PshareStatus,
    pshare: PshareData,
    valid: PshareFields,
    withheld: PshareFields,
    ext_version: u32,
    ppm: PpmWord,
    ppl: [u32; 2],
    trl: u32,
    edpp_limit: u32,
    edpp_info: Option<EdppLimitInfoV1>,
    pcontrol_script: VecDeque<u32>,
    pcontrol_cycle: Vec<u32>,
    pcontrol_next: usize,
    pcontrol_requests: Vec<u32>,
}

/// GPS `_DSM` implementation with scriptable replies
pub struct Firmware {
    state: Mutex<FirmwareState>,
}

impl Firmware {
    fn build(support_2x: Option<SupportMask>, support_1x: Option<SupportMask>) -> Self {
        let ppm = PpmWord::new(0, 0x07);
        Self {
            state: Mutex::new(FirmwareState {
                support_2x,
                support_1x,
                rejected: Vec::new(),
                failing: Vec::new(),
                short: Vec::new(),
                calls: Vec::new(),
                status: PshareStatus::empty(),
                pshare: PshareData {
                    status: 0,
                    version: 0x0001_0000,
                    tgpu: 75,
                    ppmd: ppm.raw(),
                    ctgp: 0,
                },
                valid: PshareFields::TGPU | PshareFields::PPMD,
                withheld: PshareFields::empty(),
                ext_version: ext_version::V1,
                ppm,
                ppl: [0; 2],
                trl: 0,
                edpp_limit: 0,
                edpp_info: None,
                pcontrol_script: VecDeque::new(),
                pcontrol_cycle: Vec::new(),
                pcontrol_next: 0,
                pcontrol_requests: Vec::new(),
            }),
        }
    }

    /// GPS 2.x platform without PCONTROL
    pub fn gps2x() -> Self {
        Self::build(Some(SupportMask::with(&GPS2X_FUNCTIONS)), None)
    }

    /// GPS 2.x platform that still advertises PCONTROL
    pub fn gps2x_with_pcontrol() -> Self {
        let mut functions = GPS2X_FUNCTIONS.to_vec();
        functions.push(DsmFunction::Pcontrol);
        Self::build(Some(SupportMask::with(&functions)), None)
    }

    /// Platform answering only the GPS 1.x revision
    pub fn gps1x() -> Self {
        Self::build(None, Some(SupportMask::with(&GPS1X_FUNCTIONS)))
    }

    /// GPS 2.x platform advertising nothing beyond SUPPORT
    pub fn support_only() -> Self {
        Self::build(Some(SupportMask::with(&[DsmFunction::Support])), None)
    }

    /// No `_DSM` at all
    pub fn absent() -> Self {
        Self::build(None, None)
    }

    pub fn reject_gpu(&self, gpu: GpuInstance) {
        self.state.lock().rejected.push(gpu);
    }

    /// Fail every later call to `function`
    pub fn fail(&self, function: DsmFunction) {
        self.state.lock().failing.push(function);
    }

    /// Undo every `fail`
    pub fn clear_failures(&self) {
        self.state.lock().failing.clear();
    }

    /// Report at most `words` output words for `function`
    pub fn short_reply(&self, function: DsmFunction, words: usize) {
        self.state.lock().short.push((function, words));
    }

    pub fn set_ext_version(&self, version: u32) {
        self.state.lock().ext_version = version;
    }

    pub fn set_status(&self, status: PshareStatus) {
        self.state.lock().status = status;
    }

    pub fn set_edpp_limit(&self, limit: u32) {
        self.state.lock().edpp_limit = limit;
    }

    pub fn set_tgpu(&self, celsius: u32) {
        self.state.lock().pshare.tgpu = celsius;
    }

    /// Mode word reported by PSHAREPARAMS and GETPPM
    pub fn set_ppm(&self, word: PpmWord) {
        let mut st = self.state.lock();
        st.ppm = word;
        st.pshare.ppmd = word.raw();
    }

    pub fn set_ctgp(&self, offset_mw: u32) {
        let mut st = self.state.lock();
        st.pshare.ctgp = offset_mw;
        st.valid |= PshareFields::CTGP;
    }

    /// Leave `fields` out of the valid bits of later PSHAREPARAMS replies
    pub fn withhold(&self, fields: PshareFields) {
        self.state.lock().withheld |= fields;
    }

    /// Queue PCONTROL replies; NoAction once exhausted
    pub fn script_pcontrol(&self, responses: &[PcontrolResponse]) {
        let words: Vec<u32> = responses.iter().map(|r| r.encode()).collect();
        self.script_pcontrol_raw(&words);
    }

    pub fn script_pcontrol_raw(&self, words: &[u32]) {
        self.state.lock().pcontrol_script.extend(words.iter().copied());
    }

    /// Answer PCONTROL with `responses` forever
    pub fn cycle_pcontrol(&self, responses: &[PcontrolResponse]) {
        let mut st = self.state.lock();
        st.pcontrol_cycle = responses.iter().map(|r| r.encode()).collect();
        st.pcontrol_next = 0;
    }

    pub fn ppm(&self) -> PpmWord {
        self.state.lock().ppm
    }

    pub fn pshare(&self) -> PshareData {
        self.state.lock().pshare
    }

    pub fn calls(&self, function: DsmFunction) -> usize {
        self.state.lock().calls.iter().filter(|(f, _)| *f == function).count()
    }

    pub fn total_calls(&self) -> usize {
        self.state.lock().calls.len()
    }

    /// First input word of the last call to `function`
    pub fn last_input(&self, function: DsmFunction) -> Option<u32> {
        self.state
            .lock()
            .calls
            .iter()
            .rev()
            .find(|(f, _)| *f == function)
            .map(|(_, input)| *input)
    }

    pub fn last_pshare_query(&self) -> u32 {
        self.last_input(DsmFunction::PshareParams).unwrap_or(0)
    }

    pub fn pcontrol_requests(&self) -> Vec<u32> {
        self.state.lock().pcontrol_requests.clone()
    }

    /// Last SETEDPPLIMITINFO buffer
    pub fn edpp_info(&self) -> Option<EdppLimitInfoV1> {
        self.state.lock().edpp_info
    }
}

impl FirmwareState {
    fn next_pcontrol(&mut self) -> u32 {
        if let Some(word) = self.pcontrol_script.pop_front() {
            return word;
        }
        if self.pcontrol_cycle.is_empty() {
            return PcontrolResponse::NoAction.encode();
        }
        let word = self.pcontrol_cycle[self.pcontrol_next % self.pcontrol_cycle.len()];
        self.pcontrol_next += 1;
        word
    }

    fn reply(&mut self, support: SupportMask, function: DsmFunction, io: &mut [u32]) -> usize {
        let version = self.ext_version;
        match function {
            DsmFunction::Support => {
                io[0] = support.lo();
                io[1] = support.hi();
                2
            }
            DsmFunction::Pcontrol => {
                self.pcontrol_requests.push(io[0]);
                io[0] = self.next_pcontrol();
                1
            }
            DsmFunction::PshareStatus => {
                io[0] = self.status.bits();
                1
            }
            DsmFunction::PshareParams => {
                let requested = PshareFields::from_bits_truncate(io[0]);
                let reply = PshareData {
                    status: (requested & self.valid & !self.withheld).bits(),
                    ..self.pshare
                };
                io.copy_from_slice(&reply.to_words());
                PshareData::WORDS
            }
            DsmFunction::GetEdppLimit => {
                io[0] = self.edpp_limit;
                1
            }
            DsmFunction::SetEdppLimitInfo => {
                self.edpp_info = Some(EdppLimitInfoV1 {
                    version: io[0],
                    limit_last: io[1],
                    limit_min: io[2],
                    limit_rated: io[3],
                    limit_max: io[4],
                    limit_curr: io[5],
                    limit_batt_rated: io[6],
                    limit_batt_max: io[7],
                    rsvd: io[8],
                });
                io.len()
            }
            DsmFunction::SetPpl => {
                self.ppl = [io[1], io[2]];
                io[0] = version;
                io.len()
            }
            DsmFunction::GetPpl => {
                io[0] = version;
                io[1] = self.ppl[0];
                io[2] = self.ppl[1];
                io.len()
            }
            DsmFunction::SetTrl => {
                self.trl = io[1];
                io[0] = version;
                io.len()
            }
            DsmFunction::GetTrl => {
                io[0] = version;
                io[1] = self.trl;
                io.len()
            }
            DsmFunction::SetPpm => {
                let index = PpmWord::from_raw(io[1]).index();
                self.ppm = PpmWord::new(index, self.ppm.mask());
                self.pshare.ppmd = self.ppm.raw();
                io[0] = version;
                io[1] = self.ppm.raw();
                io.len()
            }
            DsmFunction::GetPpm => {
                io[0] = version;
                io[1] = self.ppm.raw();
                io.len()
            }
        }
    }
}

impl AcpiDsm for Firmware {
    fn call_dsm(
        &self,
        gpu: GpuInstance,
        revision: DsmRevision,
        function: DsmFunction,
        io: &mut [u32],
    ) -> Result<usize> {
        let mut st = self.state.lock();
        st.calls.push((function, io.first().copied().unwrap_or(0)));

        let support = match revision {
            DsmRevision::Gps2x => st.support_2x,
            DsmRevision::Gps1x => st.support_1x,
        };
        let Some(support) = support else {
            return Err(AcpiError::MethodNotFound.into());
        };
        if st.rejected.contains(&gpu) || (function != DsmFunction::Support && !support.has(function)) {
            return Err(AcpiError::Rejected.into());
        }
        if st.failing.contains(&function) {
            return Err(AcpiError::Failed(0x8000_0002).into());
        }

        let n = st.reply(support, function, io);
        let limit = st
            .short
            .iter()
            .find(|(f, _)| *f == function)
            .map_or(n, |(_, words)| *words);
        Ok(n.min(limit))
    }
}

// =============================================================================
// PHYSICAL RM
// =============================================================================

#[derive(Default)]
struct RmState {
    dependency_error: Option<Error>,
    pm1: bool,
    pm1_reads: u32,
    pm1_error: Option<Error>,
    pm1_writes: Vec<bool>,
    tgpu_limits: Vec<Temperature>,
    edpp_requests: Vec<EdppLimitRequest>,
    edpp_update_error: Option<Error>,
    edpp_info: EdppLimitInfo,
    edpp_info_error: Option<Error>,
    tgp_modes: Vec<bool>,
    turbo_offsets: Vec<u32>,
    vpstates: VpstatesInfo,
    vpstate_limits: Vec<u8>,
}

/// Recording physical RM
#[derive(Default)]
pub struct MockRm {
    state: Mutex<RmState>,
}

impl MockRm {
    pub fn fail_dependency_check(&self) {
        self.state.lock().dependency_error = Some(GspErrorCode::UnhandledControl.into());
    }

    pub fn fail_pm1_read(&self, error: Error) {
        self.state.lock().pm1_error = Some(error);
    }

    pub fn fail_edpp_update(&self, error: Error) {
        self.state.lock().edpp_update_error = Some(error);
    }

    pub fn fail_edpp_info(&self, error: Error) {
        self.state.lock().edpp_info_error = Some(error);
    }

    pub fn set_pm1(&self, available: bool) {
        self.state.lock().pm1 = available;
    }

    pub fn set_vpstates(&self, info: VpstatesInfo) {
        self.state.lock().vpstates = info;
    }

    pub fn set_edpp_info(&self, info: EdppLimitInfo) {
        self.state.lock().edpp_info = info;
    }

    pub fn pm1_reads(&self) -> u32 {
        self.state.lock().pm1_reads
    }

    pub fn pm1_writes(&self) -> Vec<bool> {
        self.state.lock().pm1_writes.clone()
    }

    pub fn tgpu_limits(&self) -> Vec<Temperature> {
        self.state.lock().tgpu_limits.clone()
    }

    pub fn edpp_requests(&self) -> Vec<EdppLimitRequest> {
        self.state.lock().edpp_requests.clone()
    }

    pub fn tgp_modes(&self) -> Vec<bool> {
        self.state.lock().tgp_modes.clone()
    }

    pub fn turbo_offsets(&self) -> Vec<u32> {
        self.state.lock().turbo_offsets.clone()
    }

    pub fn vpstate_limits(&self) -> Vec<u8> {
        self.state.lock().vpstate_limits.clone()
    }

    /// P-state the engine maps v-Pstate `index` to
    pub fn vpstate_mapping(&self, index: u8) -> u8 {
        index.wrapping_add(1)
    }
}

impl PhysicalRm for MockRm {
    fn pfm_dependency_check(&self) -> Result<()> {
        match self.state.lock().dependency_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn sync_pmgr_therm_load(&self, _loaded: bool) -> Result<()> {
        Ok(())
    }

    fn get_pm1_state(&self) -> Result<bool> {
        let mut st = self.state.lock();
        st.pm1_reads += 1;
        match st.pm1_error {
            Some(e) => Err(e),
            None => Ok(st.pm1),
        }
    }

    fn set_pm1_state(&self, available: bool) -> Result<()> {
        let mut st = self.state.lock();
        st.pm1_writes.push(available);
        st.pm1 = available;
        Ok(())
    }

    fn update_tgpu_limit(&self, limit: Temperature) -> Result<()> {
        self.state.lock().tgpu_limits.push(limit);
        Ok(())
    }

    fn update_edpp_limit(&self, request: EdppLimitRequest) -> Result<()> {
        let mut st = self.state.lock();
        if let Some(e) = st.edpp_update_error {
            return Err(e);
        }
        st.edpp_requests.push(request);
        Ok(())
    }

    fn get_edpp_limit_info(&self) -> Result<EdppLimitInfo> {
        let st = self.state.lock();
        match st.edpp_info_error {
            Some(e) => Err(e),
            None => Ok(st.edpp_info),
        }
    }

    fn configure_tgp_mode(&self, enable: bool) -> Result<()> {
        self.state.lock().tgp_modes.push(enable);
        Ok(())
    }

    fn configure_turbo_v2(&self, ctgp_offset_mw: u32) -> Result<()> {
        self.state.lock().turbo_offsets.push(ctgp_offset_mw);
        Ok(())
    }

    fn get_vpstates_info(&self) -> Result<VpstatesInfo> {
        Ok(self.state.lock().vpstates)
    }

    fn get_vpstate_mapping(&self, index: u8) -> Result<u8> {
        Ok(self.vpstate_mapping(index))
    }

    fn set_vpstate_limit(&self, max_vpstate: u8) -> Result<()> {
        self.state.lock().vpstate_limits.push(max_vpstate);
        Ok(())
    }
}

// =============================================================================
// GPU
// =============================================================================

/// GPU at full power with its PMU loaded
pub struct MockGpu {
    instance: GpuInstance,
    full_power: Mutex<bool>,
    events: Mutex<Vec<SubdeviceEvent>>,
    pub rm: MockRm,
}

impl MockGpu {
    pub fn new(instance: u32) -> Self {
        Self {
            instance: GpuInstance::new(instance),
            full_power: Mutex::new(true),
            events: Mutex::new(Vec::new()),
            rm: MockRm::default(),
        }
    }

    /// Also decides the sanity check
    pub fn set_full_power(&self, on: bool) {
        *self.full_power.lock() = on;
    }

    /// Take the events delivered so far
    pub fn events(&self) -> Vec<SubdeviceEvent> {
        core::mem::take(&mut *self.events.lock())
    }
}

impl GpuHandle for MockGpu {
    fn instance(&self) -> GpuInstance {
        self.instance
    }

    fn is_full_power(&self) -> bool {
        *self.full_power.lock()
    }

    fn full_sanity_check(&self) -> bool {
        *self.full_power.lock()
    }

    fn is_pmu_loaded(&self) -> bool {
        true
    }

    fn physical_rm(&self) -> &dyn PhysicalRm {
        &self.rm
    }

    fn notify_event(&self, event: SubdeviceEvent) {
        self.events.lock().push(event);
    }
}

// =============================================================================
// LOCKS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Held {
    Semaphore,
    Api,
    Gpu,
}

#[derive(Default)]
struct LockLog {
    fail_at: Option<LockError>,
    /// `true` for acquire, `false` for release
    events: Vec<(Held, bool)>,
}

/// Lock provider that records every acquire and release
#[derive(Default)]
pub struct LockRecorder {
    log: Mutex<LockLog>,
}

impl LockRecorder {
    /// Fail `step` from now on
    pub fn fail_at(&self, step: LockError) {
        self.log.lock().fail_at = Some(step);
    }

    /// Every acquire released, innermost first
    pub fn is_balanced(&self) -> bool {
        let log = self.log.lock();
        let mut stack = Vec::new();
        for (lock, acquire) in log.events.iter().copied() {
            if acquire {
                stack.push(lock);
            } else if stack.pop() != Some(lock) {
                return false;
            }
        }
        stack.is_empty()
    }

    /// Complete lock sets taken
    pub fn acquisitions(&self) -> usize {
        let log = self.log.lock();
        log.events.iter().filter(|e| **e == (Held::Gpu, true)).count()
    }

    fn acquire(&self, lock: Held, step: LockError) -> Result<()> {
        let mut log = self.log.lock();
        if log.fail_at == Some(step) {
            return Err(step.into());
        }
        log.events.push((lock, true));
        Ok(())
    }

    fn release(&self, lock: Held) {
        self.log.lock().events.push((lock, false));
    }
}

impl LockProvider for LockRecorder {
    fn semaphore_try_acquire(&self) -> Result<()> {
        self.acquire(Held::Semaphore, LockError::Semaphore)
    }

    fn semaphore_release(&self) {
        self.release(Held::Semaphore);
    }

    fn api_lock_acquire(&self, _flags: LockFlags) -> Result<()> {
        self.acquire(Held::Api, LockError::ApiLock)
    }

    fn api_lock_release(&self) {
        self.release(Held::Api);
    }

    fn gpu_locks_acquire(&self, _mask: GpuMask, _flags: LockFlags) -> Result<()> {
        self.acquire(Held::Gpu, LockError::GpuLock)
    }

    fn gpu_locks_release(&self, _mask: GpuMask, _flags: LockFlags) {
        self.release(Held::Gpu);
    }
}

// =============================================================================
// HARNESS
// =============================================================================

/// Handler bound to GPU 0 with every collaborator inspectable
pub struct Harness {
    pub prh: Arc<PlatformRequestHandler>,
    pub fw: Arc<Firmware>,
    pub gpu: Arc<MockGpu>,
    pub clock: Arc<ManualClock>,
    pub queue: Arc<BoundedWorkQueue>,
    pub locks: Arc<LockRecorder>,
}

impl Harness {
    const START_MS: u32 = 10_000;
    const QUEUE_CAPACITY: usize = 8;

    pub fn gps2x() -> Self {
        Self::builder().build()
    }

    pub fn gps1x() -> Self {
        Self::with_firmware(Firmware::gps1x(), DsmRevision::Gps1x)
    }

    pub fn with_firmware(fw: Firmware, revision: DsmRevision) -> Self {
        Self::builder().firmware(fw, revision).build()
    }

    pub fn with_config(fw: Firmware, revision: DsmRevision, config: PfmConfig) -> Self {
        Self::builder().firmware(fw, revision).config(config).build()
    }

    pub fn builder() -> HarnessBuilder {
        HarnessBuilder {
            fw: Firmware::gps2x(),
            revision: DsmRevision::Gps2x,
            config: PfmConfig::default(),
            queue: None,
            queue_capacity: Self::QUEUE_CAPACITY,
        }
    }

    pub fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(Self::START_MS))
    }

    /// Environment with a private queue and lock provider
    pub fn environment(fw: Arc<Firmware>, clock: Arc<ManualClock>) -> PfmEnvironment {
        PfmEnvironment {
            dsm: fw,
            platform: clock,
            queue: Arc::new(BoundedWorkQueue::new(Self::QUEUE_CAPACITY)),
            locks: Arc::new(LockRecorder::default()),
            config: PfmConfig::default(),
        }
    }

    pub fn clock_now(&self) -> u32 {
        self.clock.time_ms()
    }
}

pub struct HarnessBuilder {
    fw: Firmware,
    revision: DsmRevision,
    config: PfmConfig,
    queue: Option<Arc<dyn WorkQueue>>,
    queue_capacity: usize,
}

impl HarnessBuilder {
    pub fn firmware(mut self, fw: Firmware, revision: DsmRevision) -> Self {
        self.fw = fw;
        self.revision = revision;
        self
    }

    pub fn config(mut self, config: PfmConfig) -> Self {
        self.config = config;
        self
    }

    /// Hand deferred work to `queue` instead of the inspectable one
    pub fn queue(mut self, queue: impl WorkQueue + 'static) -> Self {
        self.queue = Some(Arc::new(queue));
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn build(self) -> Harness {
        let fw = Arc::new(self.fw);
        let gpu = Arc::new(MockGpu::new(0));
        let clock = Harness::clock();
        let queue = Arc::new(BoundedWorkQueue::new(self.queue_capacity));
        let locks = Arc::new(LockRecorder::default());

        let work: Arc<dyn WorkQueue> = match self.queue {
            Some(work) => work,
            None => queue.clone(),
        };
        let env = PfmEnvironment {
            dsm: fw.clone(),
            platform: clock.clone(),
            queue: work,
            locks: locks.clone(),
            config: self.config,
        };
        let bridge = AcpiBridge::new(fw.clone(), gpu.instance(), self.revision);
        let prh = PlatformRequestHandler::new(env, gpu.clone(), bridge);

        Harness {
            prh,
            fw,
            gpu,
            clock,
            queue,
            locks,
        }
    }
}
