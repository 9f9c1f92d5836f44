//! Process-wide tempo
//!
//! Every time-domain synthesis parameter is defined at [`REFERENCE_BPM`] and
//! scaled inversely with the current tempo:
//! `duration(bpm) = base * REFERENCE_BPM / bpm`.

use crate::{CoreError, Result};
use std::sync::atomic::{AtomicU32, Ordering};

/// Tempo at which base durations are specified
pub const REFERENCE_BPM: u32 = 120;

/// Tempo used until a caller sets one
pub const DEFAULT_BPM: u32 = 120;

/// Fastest accepted tempo. The hihat still spans dozens of frames here at
/// any common sample rate.
pub const MAX_BPM: u32 = 1000;

/// Check that `bpm` lies in `1..=MAX_BPM`
pub fn check_bpm(bpm: u32) -> Result<u32> {
    if bpm == 0 || bpm > MAX_BPM {
        return Err(CoreError::InvalidTempo(bpm));
    }
    Ok(bpm)
}

/// Scale a duration given at the reference tempo to `bpm`
pub fn scale_duration(base_secs: f64, bpm: u32) -> f64 {
    base_secs * REFERENCE_BPM as f64 / bpm.max(1) as f64
}

/// Shared beats-per-minute value
///
/// Writes replace the whole value, so readers never see a partial update.
#[derive(Debug)]
pub struct Tempo {
    bpm: AtomicU32,
}

impl Tempo {
    pub fn new(bpm: u32) -> Result<Self> {
        Ok(Tempo {
            bpm: AtomicU32::new(check_bpm(bpm)?),
        })
    }

    pub fn bpm(&self) -> u32 {
        self.bpm.load(Ordering::Relaxed)
    }

    /// Replace the tempo. Out-of-range values are rejected and leave the old
    /// value in place.
    pub fn set_bpm(&self, bpm: u32) -> Result<()> {
        self.bpm.store(check_bpm(bpm)?, Ordering::Relaxed);
        Ok(())
    }

    /// Scale a reference-tempo duration to the current tempo
    pub fn scale(&self, base_secs: f64) -> f64 {
        scale_duration(base_secs, self.bpm())
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Tempo {
            bpm: AtomicU32::new(DEFAULT_BPM),
        }
    }
}
