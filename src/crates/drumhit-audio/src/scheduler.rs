//! Play request dispatch
//!
//! Turns `play(id, when)` into a started voice: resolves the plugin, makes
//! sure the device is running, picks the dispatch time and hands off to the
//! plugin.

use crate::{DeviceManager, PlayContext, Registry, Result};
use drumhit_core::{SoundId, Tempo};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Lead time added to every dispatch so the device never cuts off the
/// first frames of a hit scheduled at "now"
pub const DEFAULT_START_OFFSET: Duration = Duration::from_millis(5);

/// Entry point for play requests
pub struct Scheduler {
    registry: Arc<Registry>,
    devices: DeviceManager,
    tempo: Arc<Tempo>,
    start_offset: f64,
}

impl Scheduler {
    pub fn new(registry: Arc<Registry>, devices: DeviceManager, tempo: Arc<Tempo>) -> Self {
        Scheduler {
            registry,
            devices,
            tempo,
            start_offset: DEFAULT_START_OFFSET.as_secs_f64(),
        }
    }

    /// Replace the forward offset applied to every dispatch time
    pub fn with_start_offset(mut self, offset: Duration) -> Self {
        self.start_offset = offset.as_secs_f64();
        self
    }

    pub fn start_offset(&self) -> Duration {
        Duration::from_secs_f64(self.start_offset)
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn devices(&self) -> &DeviceManager {
        &self.devices
    }

    pub fn tempo(&self) -> &Arc<Tempo> {
        &self.tempo
    }

    /// Play `id` at `when` seconds on the device clock, or as soon as
    /// possible when `when` is `None`
    ///
    /// An id with no plugin is dropped with a warning and returns `Ok`. The
    /// device is resumed if suspended; a failed resume is logged and playback
    /// goes ahead anyway. Errors from the plugin itself (for instance a
    /// foreign engine that cannot allocate) fail this call only.
    pub async fn play(&self, id: &SoundId, when: Option<f64>) -> Result<()> {
        let Some(callback) = self.registry.resolve(id) else {
            warn!(sound = %id, "no plugin registered, ignoring play request");
            return Ok(());
        };

        let anchor = self.devices.ensure_running().await?;
        let when = when.unwrap_or(anchor) + self.start_offset;
        let device = self.devices.device()?;
        let bpm = self.tempo.bpm();

        debug!(sound = %id, when, bpm, "dispatching play");
        let cx = PlayContext {
            sound: id,
            device: device.as_ref(),
            bpm,
        };
        callback.play(&cx, when).map_err(|err| {
            if err.is_fatal_to_call() {
                error!(sound = %id, error = %err, "play failed");
            } else {
                warn!(sound = %id, error = %err, "play skipped");
            }
            err
        })
    }
}
