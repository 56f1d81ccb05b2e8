//! # MAGMA Error Handling
//!
//! Status taxonomy shared by the platform negotiation crates.
//!
//! `NotSupported` is the common, non-fatal answer: the platform or firmware
//! simply lacks the feature. Everything else is a failure the caller reports.
//! OS-layer and firmware codes are carried as sub-errors so logs keep the
//! detail while callers match on the top-level kind.

use core::fmt;

/// MAGMA Result type alias
pub type Result<T> = core::result::Result<T, Error>;

// =============================================================================
// ERROR ENUM
// =============================================================================

/// Outcome of a failed driver operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Feature absent on this platform or firmware revision
    NotSupported,
    /// Caller-supplied id or argument out of the defined domain
    InvalidArgument,
    /// A response or cached value failed a structural check
    InvalidData,
    /// Handler not initialized, or already torn down
    InvalidState,
    /// Command issued from a context that may not issue it
    InvalidCommand,
    /// Resource is busy
    Busy,
    /// Operation timed out
    Timeout,
    /// GPU is not at full power
    GpuNotFullPower,

    /// Lock or semaphore acquisition failed
    Lock(LockError),
    /// `_DSM` evaluation failed
    Acpi(AcpiError),
    /// Physical RM rejected a control call
    GspError(GspErrorCode),
}

impl Error {
    /// Whether this error only says that a feature is absent
    #[inline]
    pub const fn is_not_supported(&self) -> bool {
        matches!(self, Self::NotSupported)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotSupported => write!(f, "not supported"),
            Self::InvalidArgument => write!(f, "invalid argument"),
            Self::InvalidData => write!(f, "invalid data"),
            Self::InvalidState => write!(f, "invalid state"),
            Self::InvalidCommand => write!(f, "invalid command"),
            Self::Busy => write!(f, "busy"),
            Self::Timeout => write!(f, "timed out"),
            Self::GpuNotFullPower => write!(f, "GPU not at full power"),
            Self::Lock(e) => write!(f, "lock: {}", e),
            Self::Acpi(e) => write!(f, "_DSM: {:?}", e),
            Self::GspError(code) => write!(f, "physical RM: {:?}", code),
        }
    }
}

// =============================================================================
// SUB-ERRORS
// =============================================================================

/// Which step of the deferred-work lock order failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockError {
    /// Process-wide advisory semaphore was not available
    Semaphore,
    /// RM API read/write lock
    ApiLock,
    /// Per-GPU lock set
    GpuLock,
}

impl fmt::Display for LockError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Semaphore => write!(f, "semaphore unavailable"),
            Self::ApiLock => write!(f, "API lock acquisition failed"),
            Self::GpuLock => write!(f, "GPU lock acquisition failed"),
        }
    }
}

/// `_DSM` evaluation failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcpiError {
    /// No `_DSM` method for the requested revision
    MethodNotFound,
    /// Firmware rejected the subfunction or the GPU
    Rejected,
    /// Evaluation failed with a firmware-specific code
    Failed(u32),
}

/// Physical RM control-call failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GspErrorCode {
    /// Control call not handled by this firmware build
    UnhandledControl,
}

impl From<LockError> for Error {
    fn from(e: LockError) -> Self {
        Error::Lock(e)
    }
}

impl From<AcpiError> for Error {
    fn from(e: AcpiError) -> Self {
        Error::Acpi(e)
    }
}

impl From<GspErrorCode> for Error {
    fn from(e: GspErrorCode) -> Self {
        Error::GspError(e)
    }
}
