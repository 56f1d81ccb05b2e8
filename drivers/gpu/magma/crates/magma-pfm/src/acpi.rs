//! # ACPI Bridge
//!
//! PRH-specific call shapes over the raw `_DSM` primitive. Every firmware
//! failure leaves this module as [`Error::NotSupported`]: callers read it as
//! "feature absent" and carry on. No call is retried.

use alloc::sync::Arc;

use magma_core::{Error, GpuInstance, Result};
use magma_hal::{AcpiDsm, DsmFunction, DsmRevision};

use crate::wire::{
    ext_version, EdppLimitInfoV1, PcontrolRequest, PshareData, PshareStatus,
    SupportMask, EDPP_VERSION_V10,
};

/// Largest in/out buffer any PRH call uses
const MAX_IO_WORDS: usize = EdppLimitInfoV1::WORDS;

/// Typed `_DSM` calls bound to one GPU and one negotiated revision
#[derive(Clone)]
pub struct AcpiBridge {
    dsm: Arc<dyn AcpiDsm>,
    gpu: GpuInstance,
    revision: DsmRevision,
}

impl AcpiBridge {
    /// Bind to `gpu` at a known revision
    pub fn new(dsm: Arc<dyn AcpiDsm>, gpu: GpuInstance, revision: DsmRevision) -> Self {
        Self { dsm, gpu, revision }
    }

    /// Find the revision the firmware acknowledges, preferring 2.x
    pub fn probe(dsm: Arc<dyn AcpiDsm>, gpu: GpuInstance) -> Result<(Self, SupportMask)> {
        for revision in [DsmRevision::Gps2x, DsmRevision::Gps1x] {
            let bridge = Self::new(dsm.clone(), gpu, revision);
            match bridge.support() {
                Ok(mask) if mask.has(DsmFunction::Support) => {
                    log::info!("PFM: {:?} acknowledges {} (support {:#x})", gpu, revision, mask.bits());
                    return Ok((bridge, mask));
                }
                Ok(_) | Err(_) => {
                    log::debug!("PFM: {:?} does not acknowledge {}", gpu, revision);
                }
            }
        }
        Err(Error::NotSupported)
    }

    /// GPU the bridge talks for
    pub fn gpu(&self) -> GpuInstance {
        self.gpu
    }

    /// Negotiated revision
    pub fn revision(&self) -> DsmRevision {
        self.revision
    }

    // =========================================================================
    // RAW
    // =========================================================================

    /// Invoke `function` with `io` as the in/out buffer
    ///
    /// Returns the number of output words.
    pub fn call_raw(&self, function: DsmFunction, io: &mut [u32]) -> Result<usize> {
        #[cfg(feature = "sbios-trace")]
        let input = {
            let mut snapshot = [0u32; MAX_IO_WORDS];
            let n = io.len().min(MAX_IO_WORDS);
            snapshot[..n].copy_from_slice(&io[..n]);
            (snapshot, n)
        };

        let result = self.dsm.call_dsm(self.gpu, self.revision, function, io);

        #[cfg(feature = "sbios-trace")]
        log::trace!(
            "SBIOS: {:?} {} {:?} in={:x?} -> {:?} out={:x?}",
            self.gpu,
            self.revision,
            function,
            &input.0[..input.1],
            result,
            io
        );

        match result {
            Ok(n) => Ok(n.min(io.len())),
            Err(e) => {
                log::error!("PFM: {:?} {:?} failed: {}", self.gpu, function, e);
                Err(Error::NotSupported)
            }
        }
    }

    // =========================================================================
    // SINGLE-WORD CALLS
    // =========================================================================

    /// SUPPORT, PCONTROL, PSHARESTATUS or GETEDPPLIMIT with one input word
    ///
    /// Returns up to two output words; unused words are zero.
    pub fn call_simple(&self, function: DsmFunction, input: u32) -> Result<[u32; 2]> {
        if !matches!(
            function,
            DsmFunction::Support
                | DsmFunction::Pcontrol
                | DsmFunction::PshareStatus
                | DsmFunction::GetEdppLimit
        ) {
            return Err(Error::InvalidArgument);
        }
        let mut io = [input, 0];
        let n = self.call_raw(function, &mut io)?;
        if n == 0 {
            log::error!("PFM: {:?} returned no data", function);
            return Err(Error::NotSupported);
        }
        if n < io.len() {
            io[n..].fill(0);
        }
        Ok(io)
    }

    /// Subfunction bitmap
    pub fn support(&self) -> Result<SupportMask> {
        let [lo, hi] = self.call_simple(DsmFunction::Support, 0)?;
        Ok(SupportMask::from_words(lo, hi))
    }

    /// One PCONTROL round trip
    pub fn pcontrol(&self, request: PcontrolRequest) -> Result<u32> {
        Ok(self.call_simple(DsmFunction::Pcontrol, request.raw())?[0])
    }

    /// Global power-share status flags
    pub fn pshare_status(&self) -> Result<PshareStatus> {
        let [word, _] = self.call_simple(DsmFunction::PshareStatus, 0)?;
        Ok(PshareStatus::from_bits_retain(word))
    }

    // =========================================================================
    // BUFFER CALLS
    // =========================================================================

    fn call_buffer<const N: usize>(&self, function: DsmFunction, io: &mut [u32; N]) -> Result<()> {
        let n = self.call_raw(function, io)?;
        if n < N {
            log::error!("PFM: {:?} returned {} words, expected {}", function, n, N);
            return Err(Error::NotSupported);
        }
        Ok(())
    }

    /// PSHAREPARAMS, in place
    pub fn pshare_params(&self, data: &mut PshareData) -> Result<()> {
        let mut io = data.to_words();
        self.call_buffer(DsmFunction::PshareParams, &mut io)?;
        *data = PshareData::from_words(&io);
        Ok(())
    }

    /// Platform EDP-peak limit (mW); the input word is the interface version
    pub fn get_edpp_limit(&self) -> Result<u32> {
        Ok(self.call_simple(DsmFunction::GetEdppLimit, EDPP_VERSION_V10)?[0])
    }

    /// Push EDP-peak limit information
    pub fn set_edpp_limit_info(&self, info: &EdppLimitInfoV1) -> Result<()> {
        let mut io = info.to_words();
        self.call_buffer(DsmFunction::SetEdppLimitInfo, &mut io)
    }

    // =========================================================================
    // EXTENDED CALLS
    // =========================================================================

    /// PPL, TRL or PPM call with a version-tagged argument block
    ///
    /// `input` is copied into `output` before the call. The firmware must
    /// fill all of `output`, and the returned block must echo major version 1.
    pub fn call_extended(&self, function: DsmFunction, input: &[u32], output: &mut [u32]) -> Result<()> {
        if !matches!(
            function,
            DsmFunction::GetPpl
                | DsmFunction::SetPpl
                | DsmFunction::GetTrl
                | DsmFunction::SetTrl
                | DsmFunction::GetPpm
                | DsmFunction::SetPpm
        ) {
            return Err(Error::InvalidArgument);
        }
        if output.is_empty() || input.len() > output.len() || output.len() > MAX_IO_WORDS {
            return Err(Error::InvalidArgument);
        }
        output.fill(0);
        output[..input.len()].copy_from_slice(input);
        let n = self.call_raw(function, output)?;
        if n < output.len() {
            log::error!("PFM: {:?} returned {} words, expected {}", function, n, output.len());
            return Err(Error::NotSupported);
        }

        if ext_version::major(output[0]) != ext_version::major(ext_version::V1) {
            log::warn!("PFM: {:?} returned version {:#x}", function, output[0]);
            return Err(Error::InvalidData);
        }
        Ok(())
    }
}

impl core::fmt::Debug for AcpiBridge {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AcpiBridge")
            .field("gpu", &self.gpu)
            .field("revision", &self.revision)
            .finish()
    }
}
