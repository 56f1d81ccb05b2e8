//! # GPS `_DSM` Wire Formats
//!
//! Bit layouts of the words and buffers exchanged with platform firmware.
//! Only the ACPI bridge and the state machines that build requests use these;
//! the counter cache sees plain values.

use bitflags::bitflags;
use magma_hal::DsmFunction;
use static_assertions::const_assert_eq;

// =============================================================================
// FIELD HELPERS
// =============================================================================

/// Extract bits `hi:lo`
#[inline]
pub const fn field(word: u32, hi: u32, lo: u32) -> u32 {
    (word >> lo) & field_mask(hi, lo)
}

/// Replace bits `hi:lo` with `value`
#[inline]
pub const fn with_field(word: u32, hi: u32, lo: u32, value: u32) -> u32 {
    let mask = field_mask(hi, lo);
    (word & !(mask << lo)) | ((value & mask) << lo)
}

#[inline]
const fn field_mask(hi: u32, lo: u32) -> u32 {
    if hi - lo >= 31 {
        u32::MAX
    } else {
        (1 << (hi - lo + 1)) - 1
    }
}

// =============================================================================
// SUPPORT
// =============================================================================

/// Subfunction bitmap returned by SUPPORT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SupportMask(u64);

impl SupportMask {
    /// Output words of a SUPPORT call
    pub const WORDS: usize = 2;

    /// Build from the low and high output words
    pub const fn from_words(lo: u32, hi: u32) -> Self {
        Self((hi as u64) << 32 | lo as u64)
    }

    /// Raw bitmap
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Whether `function` is advertised
    pub const fn has(self, function: DsmFunction) -> bool {
        self.0 & (1u64 << function.number()) != 0
    }

    /// Bitmap with exactly `functions` advertised
    pub fn with(functions: &[DsmFunction]) -> Self {
        Self(functions.iter().fold(0, |acc, f| acc | 1u64 << f.number()))
    }

    /// Low output word
    pub const fn lo(self) -> u32 {
        self.0 as u32
    }

    /// High output word
    pub const fn hi(self) -> u32 {
        (self.0 >> 32) as u32
    }
}

// =============================================================================
// PSHARESTATUS
// =============================================================================

bitflags! {
    /// PSHARESTATUS output word
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PshareStatus: u32 {
        /// System parameter limits changed
        const UPDATE_LIMIT = 1 << 0;
        /// Platform wants the GPU to read GETEDPPLIMIT
        const PLATFORM_GETEDPPEAKLIMIT_SET = 1 << 20;
        /// Platform wants EDP-peak info pushed with SETEDPPLIMITINFO
        const PLATFORM_SETEDPPEAKLIMITINFO_SET = 1 << 21;
        /// Platform supports user-configurable TGP customization
        const PLAT_USER_CONFIG_TGP_MODE_SUPPORT = 1 << 22;
        /// EDP-peak limit should be enabled
        const EDPPEAK_LIMIT_UPDATE = 1 << 23;
        /// User-configurable TGP mode should be enabled
        const USER_CONFIG_TGP_MODE = 1 << 24;
    }
}

// =============================================================================
// PSHAREPARAMS
// =============================================================================

/// PSHAREPARAMS query type, bits 3:0 of the input word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum QueryType {
    /// Current limits
    CurrentLimits   = 0,
    /// Which fields the platform supports
    SupportedFields = 1,
    /// Current sensor values
    CurrentValues   = 2,
}

bitflags! {
    /// PSHAREPARAMS field selectors (input) and field-valid bits (status)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PshareFields: u32 {
        /// GPU temperature
        const TGPU = 1 << 8;
        /// Platform power mode
        const PPMD = 1 << 9;
        /// Constant TGP offset
        const CTGP = 1 << 10;
    }
}

impl PshareFields {
    /// Bit of the sensor reported in the `PshareData::tgpu`-style slot
    pub const fn for_sensor(sensor: crate::counter::Sensor) -> Self {
        match sensor {
            crate::counter::Sensor::Tgpu => Self::TGPU,
            crate::counter::Sensor::Ppmd => Self::PPMD,
        }
    }
}

/// PSHAREPARAMS input word
pub const fn pshare_params_input(query: QueryType, fields: PshareFields) -> u32 {
    with_field(fields.bits(), 3, 0, query as u32)
}

/// PSHAREPARAMS in/out buffer
///
/// Word 0 carries the query on input and the field-valid bits on output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PshareData {
    /// Query word on input, field-valid bits on output
    pub status: u32,
    /// Interface version
    pub version: u32,
    /// GPU temperature limit (Celsius)
    pub tgpu: u32,
    /// Platform power mode word
    pub ppmd: u32,
    /// Constant TGP offset (mW)
    pub ctgp: u32,
}

impl PshareData {
    /// Buffer size in words
    pub const WORDS: usize = 5;

    /// Encode
    pub const fn to_words(&self) -> [u32; Self::WORDS] {
        [self.status, self.version, self.tgpu, self.ppmd, self.ctgp]
    }

    /// Decode
    pub const fn from_words(w: &[u32; Self::WORDS]) -> Self {
        Self {
            status: w[0],
            version: w[1],
            tgpu: w[2],
            ppmd: w[3],
            ctgp: w[4],
        }
    }

    /// Field-valid bits
    pub const fn fields(&self) -> PshareFields {
        PshareFields::from_bits_truncate(self.status)
    }

    /// Value slot for `sensor`
    pub const fn sensor_value(&self, sensor: crate::counter::Sensor) -> u32 {
        match sensor {
            crate::counter::Sensor::Tgpu => self.tgpu,
            crate::counter::Sensor::Ppmd => self.ppmd,
        }
    }
}

// =============================================================================
// PCONTROL
// =============================================================================

/// PCONTROL request type, bits 3:0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum PcontrolRequestType {
    /// Reply to a v-Pstate info query
    VpstateInfo = 0,
    /// Acknowledge a v-Pstate set
    VpstateSet  = 1,
}

/// PCONTROL input word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PcontrolRequest(u32);

impl PcontrolRequest {
    /// Build a request of `kind`
    pub const fn new(kind: PcontrolRequestType) -> Self {
        Self(with_field(0, 3, 0, kind as u32))
    }

    /// Wrap a word seen on the wire
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// v-Pstate index or mapping, bits 11:4
    pub const fn with_index(self, index: u8) -> Self {
        Self(with_field(self.0, 11, 4, index as u32))
    }

    /// Slowest v-Pstate, bits 19:12
    pub const fn with_slowest(self, slowest: u8) -> Self {
        Self(with_field(self.0, 19, 12, slowest as u32))
    }

    /// Fastest v-Pstate, bits 27:20
    pub const fn with_fastest(self, fastest: u8) -> Self {
        Self(with_field(self.0, 27, 20, fastest as u32))
    }

    /// Raw word
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Request type bits
    pub const fn kind(self) -> u32 {
        field(self.0, 3, 0)
    }

    /// Index bits
    pub const fn index(self) -> u8 {
        field(self.0, 11, 4) as u8
    }

    /// Slowest bits
    pub const fn slowest(self) -> u8 {
        field(self.0, 19, 12) as u8
    }

    /// Fastest bits
    pub const fn fastest(self) -> u8 {
        field(self.0, 27, 20) as u8
    }
}

/// Decoded PCONTROL response type, bits 1:0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PcontrolResponse {
    /// Negotiation finished
    NoAction,
    /// Firmware asks for the mapping of v-Pstate `index`
    VpstateInfo {
        /// Requested v-Pstate
        index: u8,
    },
    /// Firmware caps performance at v-Pstate `max`
    VpstateSet {
        /// New maximum v-Pstate
        max: u8,
    },
}

impl PcontrolResponse {
    /// Decode; the reserved type value yields `None`
    pub const fn decode(word: u32) -> Option<Self> {
        let index = field(word, 11, 4) as u8;
        match field(word, 1, 0) {
            0 => Some(Self::NoAction),
            1 => Some(Self::VpstateInfo { index }),
            2 => Some(Self::VpstateSet { max: index }),
            _ => None,
        }
    }

    /// Encode, as firmware would
    pub const fn encode(self) -> u32 {
        match self {
            Self::NoAction => 0,
            Self::VpstateInfo { index } => with_field(1, 11, 4, index as u32),
            Self::VpstateSet { max } => with_field(2, 11, 4, max as u32),
        }
    }
}

// =============================================================================
// PLATFORM POWER MODE
// =============================================================================

/// Platform power mode word: index 7:0, mask 15:8
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PpmWord(u32);

impl PpmWord {
    /// Sentinel for both index and mask
    pub const INVALID: u8 = 0xFF;

    /// Wrap a raw word
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Build from fields
    pub const fn new(index: u8, mask: u8) -> Self {
        Self(with_field(with_field(0, 7, 0, index as u32), 15, 8, mask as u32))
    }

    /// Raw word
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Mode index
    pub const fn index(self) -> u8 {
        field(self.0, 7, 0) as u8
    }

    /// Available-modes mask
    pub const fn mask(self) -> u8 {
        field(self.0, 15, 8) as u8
    }
}

// =============================================================================
// EXTENDED CALLS
// =============================================================================

/// Version word of PPL/TRL/PPM argument blocks: major 31:16
pub mod ext_version {
    use super::field;

    /// Version 1.0
    pub const V1: u32 = 1 << 16;

    /// Major version of `word`
    pub const fn major(word: u32) -> u32 {
        field(word, 31, 16)
    }
}

/// Words in a CPU package power limit block: version, PL1, PL2
pub const PPL_WORDS: usize = 3;
/// Words in a CPU turbo ratio limit block: version, frequency (MHz)
pub const TRL_WORDS: usize = 2;
/// Words in a platform power mode block: version, mode word
pub const PPM_WORDS: usize = 2;

// =============================================================================
// EDP-PEAK
// =============================================================================

/// EDP-peak interface version 1.0
pub const EDPP_VERSION_V10: u32 = 0x10;

/// SETEDPPLIMITINFO buffer, version 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EdppLimitInfoV1 {
    /// Interface version
    pub version: u32,
    /// Limit last applied from the platform
    pub limit_last: u32,
    /// Minimum limit
    pub limit_min: u32,
    /// Rated limit
    pub limit_rated: u32,
    /// Maximum limit
    pub limit_max: u32,
    /// Current limit
    pub limit_curr: u32,
    /// Rated limit on battery
    pub limit_batt_rated: u32,
    /// Maximum limit on battery
    pub limit_batt_max: u32,
    /// Reserved
    pub rsvd: u32,
}

impl EdppLimitInfoV1 {
    /// Buffer size in words
    pub const WORDS: usize = 9;

    /// Encode
    pub const fn to_words(&self) -> [u32; Self::WORDS] {
        [
            self.version,
            self.limit_last,
            self.limit_min,
            self.limit_rated,
            self.limit_max,
            self.limit_curr,
            self.limit_batt_rated,
            self.limit_batt_max,
            self.rsvd,
        ]
    }
}

const_assert_eq!(core::mem::size_of::<PshareData>(), PshareData::WORDS * 4);
const_assert_eq!(core::mem::size_of::<EdppLimitInfoV1>(), EdppLimitInfoV1::WORDS * 4);
