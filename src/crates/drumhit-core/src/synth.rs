//! In-process waveform synthesis for the built-in drum voices
//!
//! Each voice has a base duration defined at the reference tempo. The actual
//! length scales inversely with bpm *before* the frame count is computed, so
//! faster tempos produce strictly shorter buffers. Content is randomized
//! (noise) but the shape is fixed per voice.

use crate::tempo::scale_duration;
use crate::{ExpDecay, HighPass, LowPass, SampleBuffer, SoundId};
use rand::Rng;
use std::f64::consts::TAU;

/// Cutoff of the snare's noise high-pass
pub const SNARE_CUTOFF_HZ: f64 = 1000.0;

/// Level the snare envelope decays to by the end of the hit
pub const SNARE_ENVELOPE_FLOOR: f64 = 0.01;

/// Spacing between the initial clap bursts
const CLAP_BURST_SECS: f64 = 0.010;
const CLAP_BURSTS: usize = 3;

/// Duration of a voice at the reference tempo, in seconds
///
/// Snare, kick and tom last half a beat, the clap a quarter beat and the
/// closed hi-hat an eighth.
pub fn base_duration(id: &str) -> Option<f64> {
    match id {
        SoundId::SNARE | SoundId::KICK | SoundId::TOM => Some(0.25),
        SoundId::CLAP => Some(0.125),
        SoundId::HIHAT => Some(0.0625),
        _ => None,
    }
}

/// Duration of a voice at `bpm`, in seconds
pub fn duration(id: &str, bpm: u32) -> Option<f64> {
    base_duration(id).map(|base| scale_duration(base, bpm))
}

/// Number of whole frames that fit in `duration_secs`, never fewer than one
/// for a positive duration
pub fn frames_for(duration_secs: f64, sample_rate: u32) -> usize {
    let frames = (sample_rate as f64 * duration_secs).max(0.0) as usize;
    if frames == 0 && duration_secs > 0.0 && sample_rate > 0 {
        return 1;
    }
    frames
}

/// Frame count of a voice rendered at `bpm` and `sample_rate`
pub fn frame_count(id: &str, bpm: u32, sample_rate: u32) -> Option<usize> {
    duration(id, bpm).map(|secs| frames_for(secs, sample_rate))
}

/// Render a built-in voice. Returns `None` for ids the synthesizer doesn't know.
pub fn synthesize(id: &SoundId, bpm: u32, sample_rate: u32) -> Option<SampleBuffer> {
    synthesize_with(id, bpm, sample_rate, &mut rand::thread_rng())
}

/// Render a built-in voice drawing noise from `rng`
pub fn synthesize_with<R: Rng + ?Sized>(
    id: &SoundId,
    bpm: u32,
    sample_rate: u32,
    rng: &mut R,
) -> Option<SampleBuffer> {
    let frames = frame_count(id.as_str(), bpm, sample_rate)?;
    let samples = match id.as_str() {
        SoundId::SNARE => snare(frames, sample_rate, rng),
        SoundId::KICK => kick(frames, sample_rate, rng),
        SoundId::HIHAT => hihat(frames, sample_rate, rng),
        SoundId::TOM => tom(frames, sample_rate, rng),
        SoundId::CLAP => clap(frames, sample_rate, rng),
        _ => return None,
    };
    Some(SampleBuffer::new(samples, sample_rate))
}

fn noise<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    rng.gen_range(-1.0..=1.0)
}

/// White noise through a 1 kHz high-pass, decaying from 1.0 to 0.01
fn snare<R: Rng + ?Sized>(frames: usize, sample_rate: u32, rng: &mut R) -> Vec<f32> {
    let mut hp = HighPass::new(SNARE_CUTOFF_HZ, sample_rate);
    ExpDecay::new(1.0, SNARE_ENVELOPE_FLOOR, frames)
        .take(frames)
        .map(|env| (hp.process(noise(rng)) * env).clamp(-1.0, 1.0) as f32)
        .collect()
}

/// Sine sweeping from 150 Hz down to 50 Hz with a short noise click
fn kick<R: Rng + ?Sized>(frames: usize, sample_rate: u32, rng: &mut R) -> Vec<f32> {
    let body = ExpDecay::with_rate(5.0, frames);
    let click = ExpDecay::with_rate(40.0, frames);
    sweep(frames, sample_rate, 150.0, 50.0)
        .zip(body.zip(click))
        .map(|(tone, (body, click))| {
            (tone * body + noise(rng) * click * 0.3).clamp(-1.0, 1.0) as f32
        })
        .collect()
}

/// Noise through a steep high-pass with a fast decay
fn hihat<R: Rng + ?Sized>(frames: usize, sample_rate: u32, rng: &mut R) -> Vec<f32> {
    let mut hp1 = HighPass::new(7000.0, sample_rate);
    let mut hp2 = HighPass::new(7000.0, sample_rate);
    ExpDecay::new(1.0, 0.001, frames)
        .take(frames)
        .map(|env| (hp2.process(hp1.process(noise(rng))) * env * 0.8).clamp(-1.0, 1.0) as f32)
        .collect()
}

/// Pitched body sweeping 120 Hz to 80 Hz with a noise attack
fn tom<R: Rng + ?Sized>(frames: usize, sample_rate: u32, rng: &mut R) -> Vec<f32> {
    let body = ExpDecay::with_rate(4.0, frames);
    let attack = ExpDecay::with_rate(30.0, frames);
    sweep(frames, sample_rate, 120.0, 80.0)
        .zip(body.zip(attack))
        .map(|(tone, (body, attack))| {
            (tone * body * 0.9 + noise(rng) * attack * 0.3).clamp(-1.0, 1.0) as f32
        })
        .collect()
}

/// Three band-limited noise bursts followed by a decaying tail
fn clap<R: Rng + ?Sized>(frames: usize, sample_rate: u32, rng: &mut R) -> Vec<f32> {
    let burst = ((CLAP_BURST_SECS * sample_rate as f64) as usize).max(1);
    let bursts_end = (burst * CLAP_BURSTS).min(frames);
    let burst_decay = 0.003 * sample_rate as f64;
    let mut tail = ExpDecay::new(0.7, 0.001, frames - bursts_end);
    let mut hp = HighPass::new(800.0, sample_rate);
    let mut lp = LowPass::new(3000.0, sample_rate);

    (0..frames)
        .map(|i| {
            let env = if i < bursts_end {
                (-((i % burst) as f64) / burst_decay).exp()
            } else {
                tail.next().unwrap_or(0.0)
            };
            (lp.process(hp.process(noise(rng))) * env * 2.0).clamp(-1.0, 1.0) as f32
        })
        .collect()
}

/// Sine oscillator whose frequency moves linearly from `from_hz` to `to_hz`
fn sweep(frames: usize, sample_rate: u32, from_hz: f64, to_hz: f64) -> impl Iterator<Item = f64> {
    let rate = sample_rate.max(1) as f64;
    let mut phase = 0.0;
    (0..frames).map(move |i| {
        let t = i as f64 / frames as f64;
        let freq = from_hz + (to_hz - from_hz) * t;
        phase += TAU * freq / rate;
        phase.sin()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn render(id: &str, bpm: u32) -> SampleBuffer {
        let mut rng = StdRng::seed_from_u64(7);
        synthesize_with(&SoundId::from(id), bpm, 44100, &mut rng).unwrap()
    }

    #[test]
    fn test_snare_length_at_reference_tempo() {
        let snare = render("snare", 120);
        assert_eq!(snare.frames(), 11025);
        assert_eq!(snare.sample_rate(), 44100);
    }

    #[test]
    fn test_snare_halves_at_double_tempo() {
        let slow = render("snare", 120);
        let fast = render("snare", 240);
        assert!(fast.frames() < slow.frames());
        assert_eq!(fast.frames(), slow.frames() / 2);
    }

    #[test]
    fn test_snare_decays() {
        let snare = render("snare", 120);
        let samples = snare.samples();
        let head: f32 = samples[..1000].iter().map(|s| s.abs()).sum();
        let tail: f32 = samples[samples.len() - 1000..].iter().map(|s| s.abs()).sum();
        assert!(head > tail * 10.0, "head {} tail {}", head, tail);
    }

    #[test]
    fn test_every_built_in_is_audible() {
        for id in SoundId::BUILT_IN {
            let buffer = render(id, 120);
            assert!(!buffer.is_empty(), "{} rendered no frames", id);
            assert_eq!(buffer.first_audible().map(|i| i < 64), Some(true), "{} starts late", id);
            assert!(buffer.peak() <= 1.0, "{} clips", id);
        }
    }

    #[test]
    fn test_fastest_tempo_is_audible() {
        for id in SoundId::BUILT_IN {
            let buffer = render(id, crate::MAX_BPM);
            assert!(buffer.frames() > 100, "{} has {} frames", id, buffer.frames());
            assert!(buffer.peak() > 0.01, "{} is silent", id);
        }
    }

    #[test]
    fn test_frames_for_keeps_one_frame() {
        assert_eq!(frames_for(1e-9, 44100), 1);
        assert_eq!(frames_for(0.0, 44100), 0);
        assert_eq!(frames_for(0.25, 44100), 11025);
    }

    #[test]
    fn test_unknown_sound() {
        assert!(synthesize(&SoundId::from("cowbell"), 120, 44100).is_none());
        assert!(frame_count("cowbell", 120, 44100).is_none());
    }

    #[test]
    fn test_relative_lengths() {
        let kick = frame_count("kick", 120, 44100).unwrap();
        let clap = frame_count("clap", 120, 44100).unwrap();
        let hihat = frame_count("hihat", 120, 44100).unwrap();
        assert!(hihat < clap && clap < kick);
    }

    proptest! {
        #[test]
        fn prop_faster_snare_is_shorter(slow in 20u32..500, step in 1u32..500) {
            let fast = slow + step;
            let slow_frames = frame_count("snare", slow, 44100).unwrap();
            let fast_frames = frame_count("snare", fast, 44100).unwrap();
            prop_assert!(fast_frames < slow_frames);
        }
    }
}
