//! Core types and synthesis for drum hit playback
//!
//! This crate holds everything that does not need an audio device: sound
//! identifiers, immutable sample buffers, the shared tempo value, and the
//! in-process waveform synthesizer that renders the built-in drum voices.
//!
//! # Examples
//!
//! ```
//! use drumhit_core::{synth, SoundId, Tempo};
//!
//! let tempo = Tempo::default();
//! let snare = synth::synthesize(&SoundId::from("snare"), tempo.bpm(), 44100).unwrap();
//! assert_eq!(snare.frames(), 11025);
//! ```
//!
//! # Main Components
//!
//! - **SoundId**: Name of a playable sound
//! - **SampleBuffer**: Mono f32 samples tagged with their sample rate
//! - **Tempo**: Beats per minute, scales every time-domain parameter
//! - **synth**: Noise and pitch-sweep drum voices

pub mod buffer;
pub mod envelope;
pub mod filter;
pub mod sound;
pub mod synth;
pub mod tempo;

pub use buffer::SampleBuffer;
pub use envelope::ExpDecay;
pub use filter::{HighPass, LowPass};
pub use sound::SoundId;
pub use tempo::{Tempo, DEFAULT_BPM, MAX_BPM, REFERENCE_BPM};

/// Errors raised by the core types
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    #[error("Tempo must be between 1 and {max} beats per minute, got {0}", max = tempo::MAX_BPM)]
    InvalidTempo(u32),

    #[error("Sample rate must be positive")]
    InvalidSampleRate,
}

pub type Result<T> = std::result::Result<T, CoreError>;
