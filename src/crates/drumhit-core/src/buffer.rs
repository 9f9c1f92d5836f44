//! Immutable mono sample buffers

use std::sync::Arc;

/// Samples below this magnitude are treated as silence
pub const AUDIBLE_THRESHOLD: f32 = 1e-6;

/// A finished block of mono PCM audio
///
/// Produced by the synthesizer, copied out of a foreign render engine, or
/// decoded from an asset. The sample data is shared, so clones are cheap and
/// the contents can never change after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    /// Amplitude values, nominally in [-1.0, 1.0]
    samples: Arc<[f32]>,
    /// Sample rate in Hz
    sample_rate: u32,
}

impl SampleBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        SampleBuffer {
            samples: samples.into(),
            sample_rate,
        }
    }

    /// A buffer of `frames` zeros
    pub fn silence(frames: usize, sample_rate: u32) -> Self {
        Self::new(vec![0.0; frames], sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of frames (one sample per frame, the buffer is mono)
    pub fn frames(&self) -> usize {
        self.samples.len()
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Index of the first sample loud enough to be heard
    pub fn first_audible(&self) -> Option<usize> {
        self.samples.iter().position(|s| s.abs() > AUDIBLE_THRESHOLD)
    }

    /// True when no sample rises above the audible threshold
    pub fn is_silent(&self) -> bool {
        self.first_audible().is_none()
    }

    /// Peak absolute amplitude
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |peak, s| peak.max(s.abs()))
    }

    /// A new buffer with every sample multiplied by `gain`
    pub fn scaled(&self, gain: f32) -> Self {
        if gain == 1.0 {
            return self.clone();
        }
        SampleBuffer {
            samples: self.samples.iter().map(|s| s * gain).collect(),
            sample_rate: self.sample_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_and_frames() {
        let buffer = SampleBuffer::silence(22050, 44100);
        assert_eq!(buffer.frames(), 22050);
        assert!((buffer.duration() - 0.5).abs() < 1e-9);
        assert!(buffer.is_silent());
    }

    #[test]
    fn test_first_audible() {
        let buffer = SampleBuffer::new(vec![0.0, 0.0, 0.25, -0.5], 44100);
        assert_eq!(buffer.first_audible(), Some(2));
        assert_eq!(buffer.peak(), 0.5);
    }

    #[test]
    fn test_scaled_returns_new_buffer() {
        let buffer = SampleBuffer::new(vec![1.0, -1.0], 48000);
        let half = buffer.scaled(0.5);
        assert_eq!(half.samples(), &[0.5, -0.5]);
        assert_eq!(buffer.samples(), &[1.0, -1.0]);
        assert_eq!(half.sample_rate(), 48000);
    }

    #[test]
    fn test_zero_rate_has_no_duration() {
        let buffer = SampleBuffer::new(vec![0.1; 10], 0);
        assert_eq!(buffer.duration(), 0.0);
    }
}
