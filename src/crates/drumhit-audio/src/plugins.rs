//! Built-in playback callbacks, one per way of producing a sound

use crate::foreign::{default_gain, render_function};
use crate::{AudioError, ForeignRenderer, PlayContext, PlaybackCallback, Result, SampleBank, Voice};
use drumhit_core::{synth, SampleBuffer, SoundId};
use std::sync::Arc;
use tracing::{debug, warn};

/// Renders a fresh buffer with the in-process synthesizer on every hit
#[derive(Debug, Clone)]
pub struct SynthPlugin {
    gain: f32,
}

impl SynthPlugin {
    pub fn new() -> Self {
        SynthPlugin { gain: 1.0 }
    }

    pub fn with_gain(gain: f32) -> Self {
        SynthPlugin { gain }
    }
}

impl Default for SynthPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackCallback for SynthPlugin {
    fn play(&self, cx: &PlayContext<'_>, when: f64) -> Result<()> {
        let buffer = synth::synthesize(cx.sound, cx.bpm, cx.device.sample_rate())
            .ok_or_else(|| AudioError::UnknownSound(cx.sound.clone()))?;
        cx.device.start(Voice::new(Arc::new(buffer)).with_gain(self.gain), when);
        Ok(())
    }
}

/// Renders each hit through a foreign engine
///
/// The hit length follows the same tempo law as the synthesizer, so the
/// engine is asked for fewer frames at faster tempos.
#[derive(Clone)]
pub struct ForeignPlugin {
    renderer: ForeignRenderer,
    function: String,
    base_duration: f64,
    gain: f32,
}

impl ForeignPlugin {
    /// Plugin for `sound` using the engine's `render_<sound>` export and the
    /// default per-sound gain
    pub fn new(sound: &SoundId, renderer: ForeignRenderer) -> Self {
        ForeignPlugin {
            renderer,
            function: render_function(sound.as_str()),
            base_duration: synth::base_duration(sound.as_str()).unwrap_or(0.25),
            gain: default_gain(sound.as_str()),
        }
    }

    pub fn with_gain(mut self, gain: f32) -> Self {
        self.gain = gain;
        self
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    /// Render one hit without scheduling it
    pub fn render(&self, sound: &SoundId, bpm: u32, sample_rate: u32) -> Result<SampleBuffer> {
        let duration = drumhit_core::tempo::scale_duration(self.base_duration, bpm);
        let frames = synth::frames_for(duration, sample_rate);
        self.renderer
            .render(sound, &self.function, sample_rate, frames, self.gain)
    }
}

impl PlaybackCallback for ForeignPlugin {
    fn play(&self, cx: &PlayContext<'_>, when: f64) -> Result<()> {
        let buffer = self.render(cx.sound, cx.bpm, cx.device.sample_rate())?;
        cx.device.start(Voice::new(Arc::new(buffer)), when);
        Ok(())
    }
}

/// Plays the cached buffer from the sample bank
///
/// A built-in id whose buffer is not cached falls back to the synthesizer,
/// so unloading a recorded snare brings back the synthesized one.
pub struct SamplePlugin {
    bank: Arc<SampleBank>,
    gain: f32,
}

impl SamplePlugin {
    pub fn new(bank: Arc<SampleBank>) -> Self {
        SamplePlugin { bank, gain: 1.0 }
    }

    pub fn with_gain(mut self, gain: f32) -> Self {
        self.gain = gain;
        self
    }
}

impl PlaybackCallback for SamplePlugin {
    fn play(&self, cx: &PlayContext<'_>, when: f64) -> Result<()> {
        let Some(buffer) = self.bank.get(cx.sound) else {
            let buffer = synth::synthesize(cx.sound, cx.bpm, cx.device.sample_rate())
                .ok_or_else(|| AudioError::UnknownSound(cx.sound.clone()))?;
            debug!(sound = %cx.sound, "sample not cached, synthesizing");
            cx.device.start(Voice::new(Arc::new(buffer)).with_gain(self.gain), when);
            return Ok(());
        };

        let device_rate = cx.device.sample_rate();
        if buffer.sample_rate() != device_rate {
            warn!(
                sound = %cx.sound,
                sample_rate = buffer.sample_rate(),
                device_rate,
                "sample rate differs from device, playing without conversion"
            );
        }

        cx.device.start(Voice::new(buffer).with_gain(self.gain), when);
        Ok(())
    }
}
