//! Voice represents a single buffer playback instance

use drumhit_core::SampleBuffer;
use std::sync::Arc;

/// A voice for playing back one sample buffer, once
///
/// This is the buffer-source-plus-gain pair handed to an output device.
/// Buffers are played frame-for-frame; the device is expected to run at the
/// buffer's sample rate.
#[derive(Debug, Clone)]
pub struct Voice {
    /// The buffer being played
    buffer: Arc<SampleBuffer>,
    /// Current playback position (in frames)
    position: usize,
    /// Gain/volume (0.0 to 1.0)
    gain: f32,
    /// Whether this voice is still active
    active: bool,
}

impl Voice {
    /// Create a new voice for the given buffer
    pub fn new(buffer: Arc<SampleBuffer>) -> Self {
        Voice {
            active: !buffer.is_empty(),
            buffer,
            position: 0,
            gain: 1.0,
        }
    }

    /// Set the gain
    pub fn with_gain(mut self, gain: f32) -> Self {
        self.gain = gain.clamp(0.0, 1.0);
        self
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn buffer(&self) -> &Arc<SampleBuffer> {
        &self.buffer
    }

    /// Check if this voice is still active
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Frames left to play
    pub fn remaining(&self) -> usize {
        self.buffer.frames().saturating_sub(self.position)
    }

    /// Get the next sample
    ///
    /// Returns None once the buffer has been played to the end
    pub fn next_sample(&mut self) -> Option<f32> {
        if !self.active {
            return None;
        }

        match self.buffer.samples().get(self.position) {
            Some(sample) => {
                self.position += 1;
                if self.position >= self.buffer.frames() {
                    self.active = false;
                }
                Some(sample * self.gain)
            }
            None => {
                self.active = false;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> Arc<SampleBuffer> {
        Arc::new(SampleBuffer::new(vec![0.2, 0.4, 0.6, 0.8], 44100))
    }

    #[test]
    fn test_voice_basic() {
        let mut voice = Voice::new(ramp());
        assert!(voice.is_active());
        assert_eq!(voice.next_sample(), Some(0.2));
        assert_eq!(voice.remaining(), 3);
    }

    #[test]
    fn test_voice_finishes() {
        let mut voice = Voice::new(ramp());
        let played: Vec<f32> = std::iter::from_fn(|| voice.next_sample()).collect();
        assert_eq!(played, vec![0.2, 0.4, 0.6, 0.8]);
        assert!(!voice.is_active());
        assert_eq!(voice.next_sample(), None);
    }

    #[test]
    fn test_gain_is_applied_and_clamped() {
        let mut voice = Voice::new(ramp()).with_gain(0.5);
        let first = voice.next_sample().unwrap();
        assert!((first - 0.1).abs() < 1e-6);
        assert_eq!(Voice::new(ramp()).with_gain(3.0).gain(), 1.0);
    }

    #[test]
    fn test_empty_buffer_is_inactive() {
        let voice = Voice::new(Arc::new(SampleBuffer::new(Vec::new(), 44100)));
        assert!(!voice.is_active());
    }
}
