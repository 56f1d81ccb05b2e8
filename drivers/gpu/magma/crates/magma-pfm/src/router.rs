//! # System Control Router
//!
//! Entry point for the OS-layer system control interface. Commands arrive as
//! `(command, locale, data)`; the data word carries both input and result.

use magma_core::{Error, Result};
use magma_hal::DsmFunction;

use crate::handler::PlatformRequestHandler;

/// Locale of requests issued on behalf of the whole system
pub const LOCALE_SYSTEM: u16 = 0;

/// Report which system functions the platform offers
pub const CMD_GET_SUPPORTED_FUNCTIONS: u16 = 0x0000;
/// Re-read platform state and acknowledge the notification
pub const CMD_DATA_INIT_USING_SBIOS_AND_ACK: u16 = 0x0001;

/// GET_SUPPORTED_FUNCTIONS: SUPPORT answered
pub const SYS_DEF_FUNC_SUPPORT: u32 = 1 << 0;

type ControlFn = fn(&PlatformRequestHandler, u16, &mut u32) -> Result<()>;

static CONTROL_TABLE: &[(u16, ControlFn)] = &[
    (CMD_GET_SUPPORTED_FUNCTIONS, get_supported_functions),
    (CMD_DATA_INIT_USING_SBIOS_AND_ACK, data_init_and_ack),
];

impl PlatformRequestHandler {
    /// Route a system control request
    pub fn control(&self, command: u16, locale: u16, data: &mut u32) -> Result<()> {
        if !self.is_initialized() {
            return Err(Error::NotSupported);
        }
        let handler = CONTROL_TABLE
            .iter()
            .find(|(cmd, _)| *cmd == command)
            .map(|(_, handler)| *handler)
            .ok_or(Error::NotSupported)?;
        handler(self, locale, data)
    }
}

fn get_supported_functions(prh: &PlatformRequestHandler, locale: u16, data: &mut u32) -> Result<()> {
    *data = 0;
    if locale != LOCALE_SYSTEM {
        return Err(Error::InvalidCommand);
    }
    if prh.acpi.support().is_ok_and(|mask| mask.has(DsmFunction::Support)) {
        *data |= SYS_DEF_FUNC_SUPPORT;
    }
    Ok(())
}

fn data_init_and_ack(prh: &PlatformRequestHandler, locale: u16, _data: &mut u32) -> Result<()> {
    if locale != LOCALE_SYSTEM {
        return Err(Error::InvalidCommand);
    }
    if !prh.gpu.full_sanity_check() {
        return Err(Error::InvalidState);
    }
    let mut st = prh.lock_state()?;
    if !st.acpi.supported {
        return Err(Error::NotSupported);
    }
    prh.status_change_locked(&mut st)
}
