//! # Lock Primitives
//!
//! RAII guards over the OS lock primitives. Deferred work must take the
//! advisory semaphore, then the RM API lock, then the GPU lock set, and
//! release them in reverse. [`PassiveLocks`] encodes that order so every
//! exit path releases exactly what was acquired.

use bitflags::bitflags;
use magma_core::{GpuMask, Result};

// =============================================================================
// FLAGS
// =============================================================================

bitflags! {
    /// Lock acquisition flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LockFlags: u32 {
        /// Shared (read) acquisition
        const READ_ONLY = 1 << 0;
        /// Fail instead of waiting
        const NON_BLOCKING = 1 << 1;
        /// Acquisition made on behalf of ACPI / platform code
        const MODULE_ACPI = 1 << 8;
    }
}

// =============================================================================
// PROVIDER TRAIT
// =============================================================================

/// OS lock primitives
pub trait LockProvider: Send + Sync {
    /// Non-blocking acquire of the process-wide advisory semaphore
    fn semaphore_try_acquire(&self) -> Result<()>;
    /// Release the advisory semaphore
    fn semaphore_release(&self);
    /// Acquire the RM API read/write lock
    fn api_lock_acquire(&self, flags: LockFlags) -> Result<()>;
    /// Release the RM API lock
    fn api_lock_release(&self);
    /// Acquire the per-GPU locks in `mask`
    fn gpu_locks_acquire(&self, mask: GpuMask, flags: LockFlags) -> Result<()>;
    /// Release the per-GPU locks in `mask`
    fn gpu_locks_release(&self, mask: GpuMask, flags: LockFlags);
}

// =============================================================================
// GUARDS
// =============================================================================

/// Held advisory semaphore
pub struct SemaphoreGuard<'a> {
    provider: &'a dyn LockProvider,
}

impl<'a> SemaphoreGuard<'a> {
    /// Try to take the semaphore
    pub fn try_acquire(provider: &'a dyn LockProvider) -> Result<Self> {
        provider.semaphore_try_acquire()?;
        Ok(Self { provider })
    }
}

impl Drop for SemaphoreGuard<'_> {
    fn drop(&mut self) {
        self.provider.semaphore_release();
    }
}

/// Held RM API lock
pub struct ApiLockGuard<'a> {
    provider: &'a dyn LockProvider,
}

impl<'a> ApiLockGuard<'a> {
    /// Acquire the API lock
    pub fn acquire(provider: &'a dyn LockProvider, flags: LockFlags) -> Result<Self> {
        provider.api_lock_acquire(flags)?;
        Ok(Self { provider })
    }
}

impl Drop for ApiLockGuard<'_> {
    fn drop(&mut self) {
        self.provider.api_lock_release();
    }
}

/// Held GPU lock set
pub struct GpuLockGuard<'a> {
    provider: &'a dyn LockProvider,
    mask: GpuMask,
    flags: LockFlags,
}

impl<'a> GpuLockGuard<'a> {
    /// Acquire the locks for every GPU in `mask`
    pub fn acquire(provider: &'a dyn LockProvider, mask: GpuMask, flags: LockFlags) -> Result<Self> {
        provider.gpu_locks_acquire(mask, flags)?;
        Ok(Self { provider, mask, flags })
    }
}

impl Drop for GpuLockGuard<'_> {
    fn drop(&mut self) {
        self.provider.gpu_locks_release(self.mask, self.flags);
    }
}

// =============================================================================
// ORDERED ACQUISITION
// =============================================================================

/// Semaphore, API lock and GPU locks, held together
///
/// Fields drop in declaration order, so the GPU locks go first and the
/// semaphore last.
pub struct PassiveLocks<'a> {
    _gpu: GpuLockGuard<'a>,
    _api: ApiLockGuard<'a>,
    _sema: SemaphoreGuard<'a>,
}

impl<'a> PassiveLocks<'a> {
    /// Acquire the full set for `gpus`
    ///
    /// On failure, whatever was already taken is released before the error
    /// is returned.
    pub fn acquire(provider: &'a dyn LockProvider, gpus: GpuMask) -> Result<Self> {
        let sema = SemaphoreGuard::try_acquire(provider).map_err(|e| {
            log::debug!("PassiveLocks: semaphore unavailable: {}", e);
            e
        })?;
        let api = ApiLockGuard::acquire(provider, LockFlags::MODULE_ACPI).map_err(|e| {
            log::debug!("PassiveLocks: API lock failed: {}", e);
            e
        })?;
        let gpu = GpuLockGuard::acquire(provider, gpus, LockFlags::MODULE_ACPI).map_err(|e| {
            log::debug!("PassiveLocks: GPU locks {:?} failed: {}", gpus, e);
            e
        })?;
        Ok(Self {
            _gpu: gpu,
            _api: api,
            _sema: sema,
        })
    }
}

impl core::fmt::Debug for PassiveLocks<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PassiveLocks").field("gpus", &self._gpu.mask).finish()
    }
}
