//! Sums scheduled voices into the device's output stream
//!
//! The mixer owns the device clock: its frame position advances once per
//! rendered frame, and a voice starts at the frame its dispatch time maps
//! to. Both the cpal adapter and the in-memory device drive one of these.

use crate::Voice;

struct ScheduledVoice {
    start_frame: u64,
    voice: Voice,
}

/// Mixes scheduled voices into interleaved output buffers
pub struct Mixer {
    voices: Vec<ScheduledVoice>,
    /// Frames rendered so far
    position: u64,
    sample_rate: u32,
}

impl Mixer {
    pub fn new(sample_rate: u32) -> Self {
        Mixer {
            voices: Vec::new(),
            position: 0,
            sample_rate,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Frames rendered since the mixer was created
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Device clock in seconds
    pub fn current_time(&self) -> f64 {
        self.position as f64 / self.sample_rate as f64
    }

    /// Number of voices waiting or playing
    pub fn pending(&self) -> usize {
        self.voices.len()
    }

    /// Queue a voice to start at `when` seconds on the device clock
    ///
    /// Times already in the past start on the next rendered frame.
    pub fn schedule(&mut self, voice: Voice, when: f64) {
        if !voice.is_active() {
            return;
        }
        let requested = (when.max(0.0) * self.sample_rate as f64).round() as u64;
        self.voices.push(ScheduledVoice {
            start_frame: requested.max(self.position),
            voice,
        });
    }

    /// Render the next `buffer.len() / channels` frames
    ///
    /// Overlapping voices are summed and hard-clipped to [-1, 1]; finished
    /// voices are dropped.
    pub fn fill_buffer(&mut self, buffer: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        buffer.fill(0.0);

        for frame in buffer.chunks_mut(channels) {
            let mut sum = 0.0f32;
            let position = self.position;
            self.voices.retain_mut(|scheduled| {
                if position < scheduled.start_frame {
                    return true;
                }
                if let Some(sample) = scheduled.voice.next_sample() {
                    sum += sample;
                }
                scheduled.voice.is_active()
            });
            let sum = sum.clamp(-1.0, 1.0);
            frame.iter_mut().for_each(|out| *out = sum);
            self.position += 1;
        }
    }

    /// Drop every queued voice. The clock keeps running.
    pub fn clear(&mut self) {
        self.voices.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drumhit_core::SampleBuffer;
    use std::sync::Arc;

    fn voice(samples: Vec<f32>) -> Voice {
        Voice::new(Arc::new(SampleBuffer::new(samples, 100)))
    }

    #[test]
    fn test_voice_starts_at_scheduled_frame() {
        let mut mixer = Mixer::new(100);
        mixer.schedule(voice(vec![0.5, 0.5]), 0.03);
        let mut out = vec![0.0; 6];
        mixer.fill_buffer(&mut out, 1);
        assert_eq!(out, vec![0.0, 0.0, 0.0, 0.5, 0.5, 0.0]);
        assert_eq!(mixer.pending(), 0);
        assert!((mixer.current_time() - 0.06).abs() < 1e-9);
    }

    #[test]
    fn test_past_times_play_immediately() {
        let mut mixer = Mixer::new(100);
        let mut out = vec![0.0; 10];
        mixer.fill_buffer(&mut out, 1);
        mixer.schedule(voice(vec![0.25]), 0.0);
        let mut out = vec![0.0; 2];
        mixer.fill_buffer(&mut out, 1);
        assert_eq!(out, vec![0.25, 0.0]);
    }

    #[test]
    fn test_overlapping_voices_sum_and_clip() {
        let mut mixer = Mixer::new(100);
        mixer.schedule(voice(vec![0.75, 0.25]), 0.0);
        mixer.schedule(voice(vec![0.75, 0.25]), 0.0);
        let mut out = vec![0.0; 4];
        mixer.fill_buffer(&mut out, 2);
        assert_eq!(out, vec![1.0, 1.0, 0.5, 0.5]);
    }

    #[test]
    fn test_clear_drops_queued_voices() {
        let mut mixer = Mixer::new(100);
        mixer.schedule(voice(vec![0.5; 4]), 1.0);
        mixer.clear();
        assert_eq!(mixer.pending(), 0);
    }
}
