//! # Control-Call Surface
//!
//! Client-facing commands keyed by a numeric id. Every command takes a small
//! input array and fills a result array; results are zeroed before the
//! command runs so a failed call never leaks stale data.

use bitflags::bitflags;
use magma_core::{Error, Result, Temperature};
use magma_hal::DsmFunction;

use crate::counter::{CounterId, Sensor};
use crate::handler::{PfmState, PlatformRequestHandler};
use crate::wire::{ext_version, EdppLimitInfoV1, PshareData, PPL_WORDS, TRL_WORDS};

// =============================================================================
// COMMANDS
// =============================================================================

/// Control command ids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum PfmCtrlCmd {
    GetThermLimit              = 0x01,
    SetThermLimit              = 0x02,
    GetTempCtrlStatus          = 0x03,
    SetTempCtrlStatus          = 0x04,
    GetTempCtrlDownNDelta      = 0x05,
    SetTempCtrlDownNDelta      = 0x06,
    GetTempCtrlHoldDelta       = 0x07,
    SetTempCtrlHoldDelta       = 0x08,
    GetTempCtrlUpDelta         = 0x09,
    SetTempCtrlUpDelta         = 0x0A,
    GetTempCtrlEngageDelta     = 0x0B,
    SetTempCtrlEngageDelta     = 0x0C,
    GetTempCtrlDisengageDelta  = 0x0D,
    SetTempCtrlDisengageDelta  = 0x0E,
    GetPerfSensor              = 0x0F,
    CallAcpi                   = 0x10,
    SetIgpuTurbo               = 0x11,
    SetTempPeriod              = 0x12,
    GetTempPeriod              = 0x13,
    SetTempNudgeFactor         = 0x14,
    GetTempNudgeFactor         = 0x15,
    SetTempThresholdSamples    = 0x16,
    GetTempThresholdSamples    = 0x17,
    SetTempPerfLimits          = 0x18,
    GetTempPerfLimits          = 0x19,
    SetPm1Available            = 0x1A,
    GetPm1Available            = 0x1B,
    GetCpuPackageLimits        = 0x1C,
    SetCpuPackageLimits        = 0x1D,
    GetCpuFreqLimit            = 0x1E,
    SetCpuFreqLimit            = 0x1F,
    GetPpm                     = 0x20,
    SetPpm                     = 0x21,
}

impl PfmCtrlCmd {
    const ALL: [PfmCtrlCmd; 33] = [
        Self::GetThermLimit,
        Self::SetThermLimit,
        Self::GetTempCtrlStatus,
        Self::SetTempCtrlStatus,
        Self::GetTempCtrlDownNDelta,
        Self::SetTempCtrlDownNDelta,
        Self::GetTempCtrlHoldDelta,
        Self::SetTempCtrlHoldDelta,
        Self::GetTempCtrlUpDelta,
        Self::SetTempCtrlUpDelta,
        Self::GetTempCtrlEngageDelta,
        Self::SetTempCtrlEngageDelta,
        Self::GetTempCtrlDisengageDelta,
        Self::SetTempCtrlDisengageDelta,
        Self::GetPerfSensor,
        Self::CallAcpi,
        Self::SetIgpuTurbo,
        Self::SetTempPeriod,
        Self::GetTempPeriod,
        Self::SetTempNudgeFactor,
        Self::GetTempNudgeFactor,
        Self::SetTempThresholdSamples,
        Self::GetTempThresholdSamples,
        Self::SetTempPerfLimits,
        Self::GetTempPerfLimits,
        Self::SetPm1Available,
        Self::GetPm1Available,
        Self::GetCpuPackageLimits,
        Self::SetCpuPackageLimits,
        Self::GetCpuFreqLimit,
        Self::SetCpuFreqLimit,
        Self::GetPpm,
        Self::SetPpm,
    ];

    /// Look up a command by id
    pub fn from_raw(raw: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|cmd| *cmd as u32 == raw)
    }
}

/// Input slots
pub mod input {
    /// Counter id for limit and sensor commands
    pub const SENSOR_INDEX: usize = 0;
    /// New limit (Celsius) for SET_THERM_LIMIT; 0 returns control to SBIOS
    pub const THERMAL_LIMIT: usize = 1;
    /// PM1 enable for SET_PM1_AVAILABLE
    pub const PM1_AVAILABLE: usize = 0;
    /// PL1 for SET_CPU_PACKAGE_LIMITS
    pub const PL1: usize = 0;
    /// Frequency (MHz) for SET_CPU_FREQ_LIMIT
    pub const FREQ_MHZ: usize = 0;
    /// Mode index for SET_PPM
    pub const PPM_INDEX: usize = 0;
}

/// Result slots
pub mod result {
    pub const THERMAL_LIMIT: usize = 0;
    pub const LIMIT_SOURCE: usize = 1;
    pub const MIN_LIMIT: usize = 2;
    pub const MAX_LIMIT: usize = 3;

    pub const PERF_SENSOR_VALUE: usize = 0;
    pub const PERF_SENSOR_AVAILABLE: usize = 1;

    pub const PM1_AVAILABLE: usize = 0;

    pub const PL1: usize = 0;
    pub const PL2: usize = 1;

    pub const FREQ_MHZ: usize = 0;

    pub const PPM_INDEX: usize = 0;
    pub const PPM_AVAILABLE_MASK: usize = 1;
}

/// Where a reported thermal limit comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ThermLimitSource {
    UserLimited       = 1,
    SbiosLimited      = 2,
    SbiosUnlimited    = 3,
    SbiosNotSupported = 4,
}

/// Lowest thermal limit a client may request (Celsius)
pub const THERM_LIMIT_MIN: u32 = 1;
/// Highest thermal limit a client may request (Celsius)
pub const THERM_LIMIT_MAX: u32 = 100;

/// Command and argument arrays
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PfmCtrlParams {
    pub cmd: u32,
    pub input: [u32; Self::INPUT_WORDS],
    pub result: [u32; Self::RESULT_WORDS],
}

impl PfmCtrlParams {
    pub const INPUT_WORDS: usize = 4;
    pub const RESULT_WORDS: usize = 4;

    /// Params for `cmd` with `input`
    pub fn new(cmd: PfmCtrlCmd, input: &[u32]) -> Self {
        let mut params = Self {
            cmd: cmd as u32,
            input: [0; Self::INPUT_WORDS],
            result: [0; Self::RESULT_WORDS],
        };
        let n = input.len().min(Self::INPUT_WORDS);
        params.input[..n].copy_from_slice(&input[..n]);
        params
    }
}

// =============================================================================
// PERF SENSOR BLOCKS
// =============================================================================

bitflags! {
    /// Visibility of a perf-sensor block entry
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PerfSensorMapFlags: u16 {
        /// Readable by unprivileged clients
        const PUBLIC = 1 << 0;
    }
}

/// Blocks in the legacy perf-sensor map
pub const PERF_SENSOR_BLOCKS: u32 = 4;
/// Counters per block
pub const PERF_SENSORS_PER_BLOCK: usize = 32;

#[derive(Debug, Clone, Copy)]
struct BlockEntry {
    id: CounterId,
    flags: PerfSensorMapFlags,
}

const fn entry(id: CounterId, flags: PerfSensorMapFlags) -> Option<BlockEntry> {
    Some(BlockEntry { id, flags })
}

// Legacy layout; slots not listed are reserved.
const PERF_SENSOR_BLOCK_MAP: [[Option<BlockEntry>; PERF_SENSORS_PER_BLOCK]; PERF_SENSOR_BLOCKS as usize] = {
    let private = PerfSensorMapFlags::empty();
    let public = PerfSensorMapFlags::PUBLIC;
    let mut map = [[None; PERF_SENSORS_PER_BLOCK]; PERF_SENSOR_BLOCKS as usize];
    map[0][14] = entry(CounterId::TcEnable, private);
    map[0][18] = entry(CounterId::Pm1StateAvail, public);
    map[0][26] = entry(CounterId::TgpuValue, public);
    map[1][19] = entry(CounterId::VpsPs20Support, private);
    map[3][8] = entry(CounterId::TgpuLimit, private);
    map[3][24] = entry(CounterId::AvailSensorMask, private);
    map
};

/// One block of counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerfSensorBlock {
    /// Values, indexed by bit
    pub counters: [u32; PERF_SENSORS_PER_BLOCK],
    /// Bits whose value was read
    pub returned: u32,
}

// =============================================================================
// HANDLERS
// =============================================================================

impl PlatformRequestHandler {
    /// Run one client control command
    pub fn control_call(&self, params: &mut PfmCtrlParams) -> Result<()> {
        params.result = [0; PfmCtrlParams::RESULT_WORDS];
        self.ensure_initialized()?;

        let Some(cmd) = PfmCtrlCmd::from_raw(params.cmd) else {
            log::error!("PFM: unknown request {:#x}", params.cmd);
            return Err(Error::NotSupported);
        };

        match cmd {
            PfmCtrlCmd::GetThermLimit => {
                let id = limit_counter(params.input[input::SENSOR_INDEX])?;
                let mut st = self.lock_state()?;
                self.get_therm_limit(&mut st, id, &mut params.result);
                Ok(())
            }
            PfmCtrlCmd::SetThermLimit => {
                let id = limit_counter(params.input[input::SENSOR_INDEX])?;
                let mut st = self.lock_state()?;
                self.set_therm_limit(&mut st, id, params.input[input::THERMAL_LIMIT])
            }

            // The temperature controller can no longer be switched.
            PfmCtrlCmd::GetTempCtrlStatus | PfmCtrlCmd::SetTempCtrlStatus => Err(Error::NotSupported),

            PfmCtrlCmd::GetTempCtrlDownNDelta
            | PfmCtrlCmd::SetTempCtrlDownNDelta
            | PfmCtrlCmd::GetTempCtrlHoldDelta
            | PfmCtrlCmd::SetTempCtrlHoldDelta
            | PfmCtrlCmd::GetTempCtrlUpDelta
            | PfmCtrlCmd::SetTempCtrlUpDelta
            | PfmCtrlCmd::GetTempCtrlEngageDelta
            | PfmCtrlCmd::SetTempCtrlEngageDelta
            | PfmCtrlCmd::GetTempCtrlDisengageDelta
            | PfmCtrlCmd::SetTempCtrlDisengageDelta => Err(Error::InvalidArgument),

            PfmCtrlCmd::GetPerfSensor => {
                let read = CounterId::from_raw(params.input[input::SENSOR_INDEX])
                    .ok_or(Error::NotSupported)
                    .and_then(|id| self.get_perf_sensor_counter(id));
                let value = read?;
                params.result[result::PERF_SENSOR_VALUE] = value;
                params.result[result::PERF_SENSOR_AVAILABLE] = 1;
                Ok(())
            }

            // CALL_ACPI has its own entry point; the rest are retired.
            PfmCtrlCmd::CallAcpi
            | PfmCtrlCmd::SetIgpuTurbo
            | PfmCtrlCmd::SetTempPeriod
            | PfmCtrlCmd::GetTempPeriod
            | PfmCtrlCmd::SetTempNudgeFactor
            | PfmCtrlCmd::GetTempNudgeFactor
            | PfmCtrlCmd::SetTempThresholdSamples
            | PfmCtrlCmd::GetTempThresholdSamples
            | PfmCtrlCmd::SetTempPerfLimits
            | PfmCtrlCmd::GetTempPerfLimits => Err(Error::NotSupported),

            PfmCtrlCmd::SetPm1Available => {
                if self.config.pm1_forced_off {
                    return Err(Error::NotSupported);
                }
                let mut st = self.lock_state()?;
                self.gpu
                    .physical_rm()
                    .set_pm1_state(params.input[input::PM1_AVAILABLE] != 0)?;
                st.counters.reset(CounterId::Pm1StateAvail, self.now());
                Ok(())
            }
            PfmCtrlCmd::GetPm1Available => {
                if self.config.pm1_forced_off {
                    return Err(Error::NotSupported);
                }
                params.result[result::PM1_AVAILABLE] =
                    self.get_perf_sensor_counter(CounterId::Pm1StateAvail)?;
                Ok(())
            }

            PfmCtrlCmd::GetCpuPackageLimits | PfmCtrlCmd::SetCpuPackageLimits => {
                let mut block = [ext_version::V1, 0, 0];
                let function = if cmd == PfmCtrlCmd::SetCpuPackageLimits {
                    let pl1 = params.input[input::PL1];
                    block[1] = pl1;
                    block[2] = pl1.wrapping_mul(2);
                    DsmFunction::SetPpl
                } else {
                    DsmFunction::GetPpl
                };
                let mut out = [0u32; PPL_WORDS];
                self.acpi.call_extended(function, &block, &mut out)?;
                params.result[result::PL1] = out[1];
                params.result[result::PL2] = out[2];
                Ok(())
            }

            PfmCtrlCmd::GetCpuFreqLimit | PfmCtrlCmd::SetCpuFreqLimit => {
                let (function, mhz) = if cmd == PfmCtrlCmd::SetCpuFreqLimit {
                    (DsmFunction::SetTrl, params.input[input::FREQ_MHZ])
                } else {
                    (DsmFunction::GetTrl, 0)
                };
                let mut out = [0u32; TRL_WORDS];
                self.acpi.call_extended(function, &[ext_version::V1, mhz], &mut out)?;
                params.result[result::FREQ_MHZ] = out[1];
                Ok(())
            }

            PfmCtrlCmd::GetPpm => {
                let word = self.get_ppm()?;
                params.result[result::PPM_INDEX] = word.index() as u32;
                params.result[result::PPM_AVAILABLE_MASK] = word.mask() as u32;
                Ok(())
            }
            PfmCtrlCmd::SetPpm => {
                let index =
                    u8::try_from(params.input[input::PPM_INDEX]).map_err(|_| Error::InvalidArgument)?;
                self.set_ppm(index)
            }
        }
    }

    fn get_therm_limit(&self, st: &mut PfmState, id: CounterId, out: &mut [u32; PfmCtrlParams::RESULT_WORDS]) {
        let source = match self.get_counter(st, id) {
            Ok(limit) => {
                out[result::THERMAL_LIMIT] = limit;
                if st.counters.is_overridden(id) {
                    ThermLimitSource::UserLimited
                } else {
                    ThermLimitSource::SbiosLimited
                }
            }
            Err(_) if st.counters.is_supported(id) => ThermLimitSource::SbiosUnlimited,
            Err(_) => ThermLimitSource::SbiosNotSupported,
        };
        out[result::LIMIT_SOURCE] = source as u32;
        out[result::MIN_LIMIT] = THERM_LIMIT_MIN;
        out[result::MAX_LIMIT] = THERM_LIMIT_MAX;
    }

    fn set_therm_limit(&self, st: &mut PfmState, id: CounterId, celsius: u32) -> Result<()> {
        let now = self.now();
        if celsius == 0 {
            st.counters.cancel_override(id, now);
        } else {
            st.counters.override_value(id, celsius, now);
        }

        if id == Sensor::Tgpu.limit() {
            // Nothing to push while the platform leaves the limit unset.
            if let Ok(limit) = self.get_counter(st, id) {
                self.gpu
                    .physical_rm()
                    .update_tgpu_limit(Temperature::from_celsius(limit as i32))
                    .map_err(|e| {
                        log::warn!("PFM: TGPU limit {} C rejected: {}", limit, e);
                        Error::NotSupported
                    })?;
            }
        }
        Ok(())
    }

    /// Read the counters of `block` selected by `requested`
    ///
    /// Only entries whose flags include `map_flags` are read; unreadable
    /// counters are left at zero and out of `returned`.
    pub fn get_perf_sensor_counters(
        &self,
        block: u32,
        requested: u32,
        map_flags: PerfSensorMapFlags,
    ) -> Result<PerfSensorBlock> {
        let mut st = self.lock_initialized()?;
        let map = PERF_SENSOR_BLOCK_MAP
            .get(block as usize)
            .ok_or(Error::NotSupported)?;
        let mut out = PerfSensorBlock {
            counters: [0; PERF_SENSORS_PER_BLOCK],
            returned: 0,
        };

        for (bit, slot) in map.iter().enumerate() {
            let Some(entry) = slot else { continue };
            if requested & (1 << bit) == 0 || !entry.flags.contains(map_flags) {
                continue;
            }
            if let Ok(value) = self.get_counter(&mut st, entry.id) {
                out.counters[bit] = value;
                out.returned |= 1 << bit;
            }
        }
        Ok(out)
    }

    /// Raw firmware passthrough for diagnostics tools
    ///
    /// Single-word calls write their output words to `buffer`; buffer calls
    /// use it in place (PSHAREPARAMS takes `input` as its query word).
    /// Returns the number of words written.
    pub fn call_acpi(&self, function: DsmFunction, input: u32, buffer: &mut [u32]) -> Result<usize> {
        self.ensure_initialized()?;
        match function {
            DsmFunction::Support => {
                let words = self.acpi.call_simple(function, 0)?;
                copy_words(&words, buffer)
            }
            DsmFunction::Pcontrol | DsmFunction::PshareStatus | DsmFunction::GetEdppLimit => {
                let [word, _] = self.acpi.call_simple(function, input)?;
                copy_words(&[word], buffer)
            }
            DsmFunction::PshareParams => {
                let io = buffer.get_mut(..PshareData::WORDS).ok_or_else(|| {
                    log::error!("PFM: PSHAREPARAMS buffer too small");
                    Error::NotSupported
                })?;
                io[0] = input;
                self.acpi.call_raw(function, io)
            }
            DsmFunction::SetEdppLimitInfo => {
                let io = buffer.get_mut(..EdppLimitInfoV1::WORDS).ok_or(Error::NotSupported)?;
                self.acpi.call_raw(function, io)
            }
            _ => Err(Error::NotSupported),
        }
    }
}

fn limit_counter(raw: u32) -> Result<CounterId> {
    CounterId::from_raw(raw)
        .filter(|id| Sensor::from_limit(*id).is_some())
        .ok_or(Error::InvalidArgument)
}

fn copy_words(words: &[u32], buffer: &mut [u32]) -> Result<usize> {
    let out = buffer.get_mut(..words.len()).ok_or(Error::InvalidArgument)?;
    out.copy_from_slice(words);
    Ok(words.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Firmware, Harness};
    use crate::config::PfmConfig;
    use crate::wire::PpmWord;
    use magma_hal::{DsmRevision, NoWorkQueue};

    fn run(h: &Harness, cmd: PfmCtrlCmd, input: &[u32]) -> (Result<()>, [u32; PfmCtrlParams::RESULT_WORDS]) {
        let mut params = PfmCtrlParams::new(cmd, input);
        params.result = [0xDEAD; PfmCtrlParams::RESULT_WORDS];
        let status = h.prh.control_call(&mut params);
        (status, params.result)
    }

    fn initialized() -> Harness {
        let h = Harness::gps2x();
        h.fw.set_tgpu(80);
        h.prh.state_init().unwrap();
        h
    }

    #[test]
    fn test_therm_limit_from_sbios() {
        let h = initialized();
        let (status, out) = run(&h, PfmCtrlCmd::GetThermLimit, &[CounterId::TgpuLimit as u32]);
        assert_eq!(status, Ok(()));
        assert_eq!(out, [80, ThermLimitSource::SbiosLimited as u32, 1, 100]);
    }

    #[test]
    fn test_user_therm_limit_overrides_and_pushes() {
        let h = initialized();
        let (status, _) = run(&h, PfmCtrlCmd::SetThermLimit, &[CounterId::TgpuLimit as u32, 72]);
        assert_eq!(status, Ok(()));
        assert_eq!(h.gpu.rm.tgpu_limits().last().map(|t| t.to_celsius_rounded()), Some(72));

        let (_, out) = run(&h, PfmCtrlCmd::GetThermLimit, &[CounterId::TgpuLimit as u32]);
        assert_eq!(out[result::THERMAL_LIMIT], 72);
        assert_eq!(out[result::LIMIT_SOURCE], ThermLimitSource::UserLimited as u32);

        run(&h, PfmCtrlCmd::SetThermLimit, &[CounterId::TgpuLimit as u32, 0]).0.unwrap();
        let (_, out) = run(&h, PfmCtrlCmd::GetThermLimit, &[CounterId::TgpuLimit as u32]);
        assert_eq!(out[result::THERMAL_LIMIT], 80);
        assert_eq!(out[result::LIMIT_SOURCE], ThermLimitSource::SbiosLimited as u32);
    }

    #[test]
    fn test_therm_limit_sources_without_sbios_value() {
        let h = initialized();
        h.fw.withhold(crate::wire::PshareFields::TGPU);
        h.clock.advance(1_000);
        let (status, out) = run(&h, PfmCtrlCmd::GetThermLimit, &[CounterId::TgpuLimit as u32]);
        assert_eq!(status, Ok(()));
        assert_eq!(out, [0, ThermLimitSource::SbiosUnlimited as u32, 1, 100]);

        let h = Harness::with_firmware(Firmware::support_only(), DsmRevision::Gps2x);
        h.prh.state_init().unwrap();
        let (_, out) = run(&h, PfmCtrlCmd::GetThermLimit, &[CounterId::TgpuLimit as u32]);
        assert_eq!(out[result::LIMIT_SOURCE], ThermLimitSource::SbiosNotSupported as u32);
    }

    #[test]
    fn test_therm_limit_rejects_non_limit_ids() {
        let h = initialized();
        for raw in [CounterId::TgpuValue as u32, CounterId::TcEnable as u32, 99] {
            let (status, out) = run(&h, PfmCtrlCmd::GetThermLimit, &[raw]);
            assert_eq!(status, Err(Error::InvalidArgument));
            assert_eq!(out, [0; PfmCtrlParams::RESULT_WORDS]);
        }
    }

    #[test]
    fn test_retired_commands() {
        let h = initialized();
        assert_eq!(run(&h, PfmCtrlCmd::SetTempCtrlStatus, &[]).0, Err(Error::NotSupported));
        assert_eq!(run(&h, PfmCtrlCmd::GetTempCtrlUpDelta, &[]).0, Err(Error::InvalidArgument));
        assert_eq!(run(&h, PfmCtrlCmd::GetTempPeriod, &[]).0, Err(Error::NotSupported));

        let mut params = PfmCtrlParams::new(PfmCtrlCmd::GetPpm, &[]);
        params.cmd = 0x7777;
        assert_eq!(h.prh.control_call(&mut params), Err(Error::NotSupported));
    }

    #[test]
    fn test_perf_sensor_result_zeroed_on_failure() {
        let h = initialized();
        let (status, out) = run(&h, PfmCtrlCmd::GetPerfSensor, &[CounterId::TgpuValue as u32]);
        assert_eq!(status, Err(Error::NotSupported));
        assert_eq!(out, [0; PfmCtrlParams::RESULT_WORDS]);

        let (status, out) = run(&h, PfmCtrlCmd::GetPerfSensor, &[CounterId::TcEnable as u32]);
        assert_eq!(status, Ok(()));
        assert_eq!(out[..2], [1, 1]);
    }

    #[test]
    fn test_pm1_commands() {
        let h = initialized();
        run(&h, PfmCtrlCmd::SetPm1Available, &[1]).0.unwrap();
        assert_eq!(h.gpu.rm.pm1_writes(), [true]);
        let (status, out) = run(&h, PfmCtrlCmd::GetPm1Available, &[]);
        assert_eq!(status, Ok(()));
        assert_eq!(out[result::PM1_AVAILABLE], 1);
    }

    #[test]
    fn test_pm1_forced_off() {
        let config = PfmConfig {
            pm1_forced_off: true,
            ..PfmConfig::default()
        };
        let h = Harness::with_config(Firmware::gps2x(), DsmRevision::Gps2x, config);
        h.prh.state_init().unwrap();
        assert_eq!(run(&h, PfmCtrlCmd::SetPm1Available, &[1]).0, Err(Error::NotSupported));
        let (status, out) = run(&h, PfmCtrlCmd::GetPm1Available, &[]);
        assert_eq!(status, Err(Error::NotSupported));
        assert_eq!(out[result::PM1_AVAILABLE], 0);
        assert!(h.gpu.rm.pm1_writes().is_empty());
    }

    #[test]
    fn test_cpu_package_limits() {
        let h = initialized();
        let (status, out) = run(&h, PfmCtrlCmd::SetCpuPackageLimits, &[25_000]);
        assert_eq!(status, Ok(()));
        assert_eq!(out[..2], [25_000, 50_000]);

        let (_, out) = run(&h, PfmCtrlCmd::GetCpuPackageLimits, &[]);
        assert_eq!(out[..2], [25_000, 50_000]);
    }

    #[test]
    fn test_cpu_freq_limit_version_mismatch() {
        let h = initialized();
        let (status, out) = run(&h, PfmCtrlCmd::SetCpuFreqLimit, &[2_400]);
        assert_eq!(status, Ok(()));
        assert_eq!(out[result::FREQ_MHZ], 2_400);

        h.fw.set_ext_version(3 << 16);
        let (status, out) = run(&h, PfmCtrlCmd::GetCpuFreqLimit, &[]);
        assert_eq!(status, Err(Error::InvalidData));
        assert_eq!(out[result::FREQ_MHZ], 0);
    }

    #[test]
    fn test_ppm_commands_without_work_queue() {
        let h = Harness::builder().queue(NoWorkQueue).build();
        h.fw.set_ppm(PpmWord::new(0, 0b101));
        h.prh.state_init().unwrap();

        let (_, out) = run(&h, PfmCtrlCmd::GetPpm, &[]);
        assert_eq!(out[..2], [0, 0b101]);
        assert_eq!(run(&h, PfmCtrlCmd::SetPpm, &[1]).0, Err(Error::InvalidData));
        assert_eq!(run(&h, PfmCtrlCmd::SetPpm, &[2]).0, Ok(()));
        let (_, out) = run(&h, PfmCtrlCmd::GetPpm, &[]);
        assert_eq!(out[result::PPM_INDEX], 2);
    }

    #[test]
    fn test_perf_sensor_blocks() {
        let h = initialized();
        let all = h
            .prh
            .get_perf_sensor_counters(0, u32::MAX, PerfSensorMapFlags::empty())
            .unwrap();
        assert_eq!(all.returned, (1 << 14) | (1 << 18));
        assert_eq!(all.counters[14], 1);

        let public = h
            .prh
            .get_perf_sensor_counters(0, u32::MAX, PerfSensorMapFlags::PUBLIC)
            .unwrap();
        assert_eq!(public.returned, 1 << 18);

        let limits = h
            .prh
            .get_perf_sensor_counters(3, 1 << 8, PerfSensorMapFlags::empty())
            .unwrap();
        assert_eq!(limits.returned, 1 << 8);
        assert_eq!(limits.counters[8], 80);

        assert_eq!(
            h.prh.get_perf_sensor_counters(4, u32::MAX, PerfSensorMapFlags::empty()),
            Err(Error::NotSupported)
        );
    }

    #[test]
    fn test_call_acpi_passthrough() {
        let h = initialized();
        let mut buf = [0u32; 8];
        assert_eq!(h.prh.call_acpi(DsmFunction::Support, 0, &mut buf), Ok(2));
        assert_ne!(buf[0] | buf[1], 0);

        let mut small = [0u32; 2];
        assert_eq!(
            h.prh.call_acpi(DsmFunction::PshareParams, 0, &mut small),
            Err(Error::NotSupported)
        );
        assert_eq!(h.prh.call_acpi(DsmFunction::SetPpm, 0, &mut buf), Err(Error::NotSupported));
    }

    #[test]
    fn test_set_ppm_index_out_of_range() {
        let h = Harness::builder().queue(NoWorkQueue).build();
        h.fw.set_ppm(PpmWord::new(0, 0b111));
        h.prh.state_init().unwrap();
        assert_eq!(run(&h, PfmCtrlCmd::SetPpm, &[0x101]).0, Err(Error::InvalidArgument));
        assert_eq!(h.fw.calls(DsmFunction::SetPpm), 0);
        assert_eq!(h.prh.get_ppm().map(PpmWord::index), Ok(0));
    }

    #[test]
    fn test_commands_refused_after_destroy() {
        let h = initialized();
        h.prh.state_destroy();
        let calls = h.fw.total_calls();

        let (status, out) = run(&h, PfmCtrlCmd::GetThermLimit, &[CounterId::TgpuLimit as u32]);
        assert_eq!(status, Err(Error::InvalidState));
        assert_eq!(out, [0; PfmCtrlParams::RESULT_WORDS]);
        assert_eq!(run(&h, PfmCtrlCmd::SetCpuPackageLimits, &[25_000]).0, Err(Error::InvalidState));
        assert_eq!(
            h.prh.get_perf_sensor_counters(0, u32::MAX, PerfSensorMapFlags::empty()),
            Err(Error::InvalidState)
        );
        let mut buf = [0u32; 8];
        assert_eq!(h.prh.call_acpi(DsmFunction::Support, 0, &mut buf), Err(Error::InvalidState));

        assert_eq!(h.fw.total_calls(), calls);
        assert!(h.gpu.rm.tgpu_limits().is_empty());
    }

    #[test]
    fn test_commands_refused_before_init() {
        let h = Harness::gps2x();
        assert_eq!(run(&h, PfmCtrlCmd::GetPm1Available, &[]).0, Err(Error::InvalidState));
        assert_eq!(h.fw.total_calls(), 0);
    }
}
