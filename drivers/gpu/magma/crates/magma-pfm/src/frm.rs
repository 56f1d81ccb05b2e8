//! # Frame-Rate Limiter Samples
//!
//! Fixed ring of samples written by the frame-rate limiter and read back by
//! tools. Reads always come out oldest first:
//!
//! ```text
//!   physical:  [ 8 | 9 | 2 | 3 | 4 | 5 | 6 | 7 ]
//!                        ▲ next slot
//!   logical:   [ 2 | 3 | 4 | 5 | 6 | 7 ] ++ [ 8 | 9 ]
//!                    block 0 (tail)          block 1 (head)
//! ```

use magma_core::Result;

use crate::handler::PlatformRequestHandler;

/// Samples kept by the handler
pub const FRM_SAMPLE_COUNT: usize = 50;

/// One limiter sample
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrmSample {
    /// Frame time (us)
    pub frame_time: u16,
    /// Render time (us)
    pub render_time: u16,
    /// Target frame time (us)
    pub target_time: u16,
    /// Time slept by the limiter (us)
    pub sleep_time: u16,
    /// Sequence number stamped on write
    pub sample_number: u8,
}

/// Ring of `N` samples with a wrapping 8-bit sequence counter
///
/// The write position is tracked apart from the sequence number, which
/// wraps at 256 whatever `N` is.
#[derive(Debug, Clone)]
pub struct FrmRing<const N: usize> {
    samples: [FrmSample; N],
    next_slot: usize,
    next_sample_number: u8,
}

impl<const N: usize> FrmRing<N> {
    /// Empty ring
    pub const fn new() -> Self {
        Self {
            samples: [FrmSample {
                frame_time: 0,
                render_time: 0,
                target_time: 0,
                sleep_time: 0,
                sample_number: 0,
            }; N],
            next_slot: 0,
            next_sample_number: 0,
        }
    }

    /// Sequence number the next write will carry
    pub fn next_sample_number(&self) -> u8 {
        self.next_sample_number
    }

    /// Store `sample`, evicting the oldest
    pub fn push(&mut self, sample: FrmSample) {
        self.samples[self.next_slot] = FrmSample {
            sample_number: self.next_sample_number,
            ..sample
        };
        self.next_slot = (self.next_slot + 1) % N;
        self.next_sample_number = self.next_sample_number.wrapping_add(1);
    }

    /// Copy out every slot in chronological order
    pub fn snapshot(&self) -> ([FrmSample; N], u8) {
        let start = self.next_slot;
        let mut out = [FrmSample::default(); N];
        let tail = N - start;
        out[..tail].copy_from_slice(&self.samples[start..]);
        out[tail..].copy_from_slice(&self.samples[..start]);
        (out, self.next_sample_number)
    }
}

impl<const N: usize> Default for FrmRing<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformRequestHandler {
    /// All limiter samples, oldest first, and the next sequence number
    pub fn get_frm_data(&self) -> Result<([FrmSample; FRM_SAMPLE_COUNT], u8)> {
        Ok(self.lock_initialized()?.frm.snapshot())
    }

    /// Record one limiter sample
    pub fn set_frm_data(&self, sample: FrmSample) -> Result<()> {
        self.lock_initialized()?.frm.push(sample);
        Ok(())
    }
}
