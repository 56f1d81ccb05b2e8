//! # GPU Handle
//!
//! Opaque capability over a bound GPU. Register access, engine tables and
//! object construction stay behind it.

use magma_core::GpuInstance;

use crate::control::PhysicalRm;
use crate::event::SubdeviceEvent;

/// Capability over one attached GPU
pub trait GpuHandle: Send + Sync {
    /// Instance number
    fn instance(&self) -> GpuInstance;

    /// Whether the GPU is at full power (not in GC6 or suspended)
    fn is_full_power(&self) -> bool;

    /// Full power and still reachable on the bus
    fn full_sanity_check(&self) -> bool;

    /// Whether the PMU has loaded, which platform EDP-peak apply depends on
    fn is_pmu_loaded(&self) -> bool;

    /// Internal control calls for this GPU
    fn physical_rm(&self) -> &dyn PhysicalRm;

    /// Deliver `event` to subdevice listeners
    fn notify_event(&self, event: SubdeviceEvent);
}
