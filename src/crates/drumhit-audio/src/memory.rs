//! In-memory output device
//!
//! Renders into a buffer on request instead of a sound card. The device clock
//! only advances when [`MemoryDevice::render`] pulls frames, which makes
//! timing fully deterministic for tests and offline export.

use crate::{AudioError, DeviceState, Mixer, OutputDevice, Result, Voice};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

pub struct MemoryDevice {
    mixer: Mutex<Mixer>,
    state: Mutex<DeviceState>,
    resumes: AtomicUsize,
    fail_resume: AtomicBool,
}

impl MemoryDevice {
    /// A device that is already running
    pub fn new(sample_rate: u32) -> Self {
        Self::with_state(sample_rate, DeviceState::Running)
    }

    /// A device that needs a resume before it plays, like a browser context
    /// created without a user gesture
    pub fn suspended(sample_rate: u32) -> Self {
        Self::with_state(sample_rate, DeviceState::Suspended)
    }

    fn with_state(sample_rate: u32, state: DeviceState) -> Self {
        MemoryDevice {
            mixer: Mutex::new(Mixer::new(sample_rate)),
            state: Mutex::new(state),
            resumes: AtomicUsize::new(0),
            fail_resume: AtomicBool::new(false),
        }
    }

    /// Make subsequent resumes fail (or succeed again)
    pub fn fail_resume(&self, fail: bool) {
        self.fail_resume.store(fail, Ordering::SeqCst);
    }

    /// Number of resume calls, including failed ones
    pub fn resume_count(&self) -> usize {
        self.resumes.load(Ordering::SeqCst)
    }

    /// Voices waiting or playing
    pub fn pending(&self) -> usize {
        self.mixer.lock().pending()
    }

    /// Pull `frames` mono frames from the mixer, advancing the device clock
    ///
    /// A suspended device produces silence, but its clock still moves.
    pub fn render(&self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames];
        let mut mixer = self.mixer.lock();
        mixer.fill_buffer(&mut out, 1);
        if *self.state.lock() == DeviceState::Suspended {
            out.fill(0.0);
        }
        out
    }
}

#[async_trait(?Send)]
impl OutputDevice for MemoryDevice {
    fn sample_rate(&self) -> u32 {
        self.mixer.lock().sample_rate()
    }

    fn state(&self) -> DeviceState {
        *self.state.lock()
    }

    async fn resume(&self) -> Result<()> {
        self.resumes.fetch_add(1, Ordering::SeqCst);
        // Resolve on a later poll, the way a host's resume promise would
        tokio::task::yield_now().await;
        if self.fail_resume.load(Ordering::SeqCst) {
            return Err(AudioError::ResumeFailure(
                "resume rejected by host".to_string(),
            ));
        }
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

#[cfg(test)]
mod tests {
    use super::*;
    use drumhit_core::SampleBuffer;
    use std::sync::Arc;

    #[test]
    fn test_render_advances_clock() {
        let device = MemoryDevice::new(1000);
        device.render(250);
        assert!((device.current_time() - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_start_and_render() {
        let device = MemoryDevice::new(1000);
        let buffer = Arc::new(SampleBuffer::new(vec![0.5; 10], 1000));
        device.start(Voice::new(buffer), 0.005);
        let out = device.render(20);
        assert_eq!(out[4], 0.0);
        assert_eq!(out[5], 0.5);
        assert_eq!(out[14], 0.5);
        assert_eq!(out[15], 0.0);
    }

    #[tokio::test]
    async fn test_resume_is_idempotent() {
        let device = MemoryDevice::suspended(1000);
        device.resume().await.unwrap();
        device.resume().await.unwrap();
        assert_eq!(device.state(), DeviceState::Running);
        assert_eq!(device.resume_count(), 2);
    }

    #[test]
    fn test_suspended_device_is_silent() {
        let device = MemoryDevice::suspended(1000);
        let buffer = Arc::new(SampleBuffer::new(vec![0.5; 10], 1000));
        device.start(Voice::new(buffer), 0.0);
        assert!(device.render(10).iter().all(|s| *s == 0.0));
    }
}
