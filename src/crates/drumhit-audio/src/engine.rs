//! Audio output device using cpal
//!
//! Opens the default output device and mixes scheduled voices in the cpal
//! stream callback.

use crate::{AudioError, DeviceState, Mixer, OutputDevice, Result, Voice};
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Stream, StreamConfig};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error};

/// Output device backed by the system's default audio output
pub struct CpalDevice {
    /// Output stream, created paused
    stream: Stream,
    /// Stream configuration
    config: StreamConfig,
    /// Voices mixed by the stream callback
    mixer: Arc<Mutex<Mixer>>,
    state: Mutex<DeviceState>,
}

impl CpalDevice {
    /// Open the default output device
    ///
    /// The stream starts suspended; the first play request resumes it.
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| AudioError::DeviceError("No output device available".to_string()))?;

        let config = device
            .default_output_config()
            .map_err(|e| AudioError::DeviceError(format!("Failed to get default config: {}", e)))?;

        let sample_rate = config.sample_rate().0;
        let config: StreamConfig = config.into();
        let channels = config.channels as usize;

        let mixer = Arc::new(Mutex::new(Mixer::new(sample_rate)));
        let callback_mixer = Arc::clone(&mixer);

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    callback_mixer.lock().fill_buffer(data, channels);
                },
                |err| {
                    error!(error = %err, "audio stream error");
                },
                None,
            )
            .map_err(|e| AudioError::DeviceError(format!("Failed to build stream: {}", e)))?;

        // Some hosts start streams immediately and can't pause them
        let state = match stream.pause() {
            Ok(()) => DeviceState::Suspended,
            Err(err) => {
                debug!(error = %err, "stream cannot be paused, treating it as running");
                DeviceState::Running
            }
        };

        Ok(CpalDevice {
            stream,
            config,
            mixer,
            state: Mutex::new(state),
        })
    }

    /// Get the stream configuration
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }
}

#[async_trait(?Send)]
impl OutputDevice for CpalDevice {
    fn sample_rate(&self) -> u32 {
        self.mixer.lock().sample_rate()
    }

    fn state(&self) -> DeviceState {
        *self.state.lock()
    }

    async fn resume(&self) -> Result<()> {
        self.stream
            .play()
            .map_err(|e| AudioError::ResumeFailure(e.to_string()))?;
        *self.state.lock() = DeviceState::Running;
        Ok(())
    }

    fn current_time(&self) -> f64 {
        self.mixer.lock().current_time()
    }

    fn start(&self, voice: Voice, when: f64) {
        self.mixer.lock().schedule(voice, when);
    }

    fn clear(&self) {
        self.mixer.lock().clear();
    }
}
