//! Output device capabilities and the lazily created device they live on
//!
//! Playback needs a small set of things from its output: the sample rate,
//! the suspended/running state, an asynchronous resume, a monotonic device
//! clock, and a way to start a voice at a given clock time. [`OutputDevice`]
//! captures exactly that; [`crate::CpalDevice`] drives real hardware and
//! [`crate::MemoryDevice`] renders into memory for tests and offline export.

use crate::{AudioError, Result, Voice};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Whether the device is currently pulling audio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Suspended,
    Running,
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceState::Suspended => f.write_str("suspended"),
            DeviceState::Running => f.write_str("running"),
        }
    }
}

/// Minimal set of capabilities playback requires from an output device
///
/// Futures are not `Send`: playback runs on a single cooperative context,
/// and the real device's stream handle may not leave its thread.
#[async_trait(?Send)]
pub trait OutputDevice {
    /// Sample rate of the output stream in Hz
    fn sample_rate(&self) -> u32;

    /// Current suspended/running state
    fn state(&self) -> DeviceState;

    /// Ask the device to start pulling audio
    ///
    /// Must be idempotent: concurrent play requests may each call it while an
    /// earlier resume is still in flight.
    async fn resume(&self) -> Result<()>;

    /// Device clock in seconds. Monotonic and independent of wall-clock time.
    fn current_time(&self) -> f64;

    /// Start `voice` at `when` seconds on the device clock
    fn start(&self, voice: Voice, when: f64);

    /// Drop every voice that has not finished playing
    fn clear(&self);
}

/// Creates the output device on first use
pub type DeviceFactory = Box<dyn Fn() -> Result<Arc<dyn OutputDevice>>>;

/// Owns the lazily created output device and keeps it running
pub struct DeviceManager {
    factory: DeviceFactory,
    device: Mutex<Option<Arc<dyn OutputDevice>>>,
}

impl DeviceManager {
    pub fn new(factory: DeviceFactory) -> Self {
        DeviceManager {
            factory,
            device: Mutex::new(None),
        }
    }

    /// Manage an already constructed device
    pub fn with_device(device: Arc<dyn OutputDevice>) -> Self {
        DeviceManager {
            factory: Box::new(|| {
                Err(AudioError::DeviceError(
                    "device factory called for a pre-built device".to_string(),
                ))
            }),
            device: Mutex::new(Some(device)),
        }
    }

    /// The output device, created on first access
    ///
    /// A failed creation is not cached; the next call tries again.
    pub fn device(&self) -> Result<Arc<dyn OutputDevice>> {
        let mut slot = self.device.lock();
        if let Some(device) = slot.as_ref() {
            return Ok(Arc::clone(device));
        }
        let device = (self.factory)()?;
        info!(
            sample_rate = device.sample_rate(),
            state = %device.state(),
            "output device created"
        );
        *slot = Some(Arc::clone(&device));
        Ok(device)
    }

    /// Whether the device has been created yet
    pub fn is_initialized(&self) -> bool {
        self.device.lock().is_some()
    }

    /// Resume the device if it is suspended and return the playback anchor
    ///
    /// The anchor is the device clock read after the resume attempt. Resume
    /// failures are logged and otherwise ignored: some hosts start the
    /// stream on the first sound regardless. Concurrent callers are not
    /// deduplicated, each one issues its own resume.
    pub async fn ensure_running(&self) -> Result<f64> {
        let device = self.device()?;
        if device.state() == DeviceState::Suspended {
            debug!("resuming suspended output device");
            match device.resume().await {
                Ok(()) => debug!(state = %device.state(), "output device resumed"),
                Err(err) => warn!(error = %err, "resume failed, attempting playback anyway"),
            }
        }
        Ok(device.current_time())
    }
}
