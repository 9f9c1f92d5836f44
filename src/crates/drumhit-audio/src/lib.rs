//! Drum hit playback engine
//!
//! This crate turns "play this sound now" into samples at the output device:
//! - Tracks whether the output device is suspended and resumes it on demand
//! - Dispatches play requests through a registry of sound plugins
//! - Renders hits in-process, through a foreign (WASM) render engine, or from
//!   a bank of pre-decoded samples
//! - Mixes scheduled voices on the device's own audio thread

pub mod device;
pub mod engine;
pub mod foreign;
pub mod memory;
pub mod mixer;
pub mod player;
pub mod plugins;
pub mod registry;
pub mod samples;
pub mod scheduler;
pub mod voice;

pub use device::{DeviceFactory, DeviceManager, DeviceState, OutputDevice};
pub use engine::CpalDevice;
pub use foreign::{ForeignRenderer, RenderEngine, ScratchRegion, WasmRenderEngine};
pub use memory::MemoryDevice;
pub use mixer::Mixer;
pub use player::{Drumkit, PlayerConfig};
pub use plugins::{ForeignPlugin, SamplePlugin, SynthPlugin};
pub use registry::{PlayContext, PlaybackCallback, Registry};
pub use samples::SampleBank;
pub use scheduler::Scheduler;
pub use voice::Voice;

/// Re-export common types from drumhit-core
pub use drumhit_core::{synth, SampleBuffer, SoundId, Tempo, MAX_BPM};

/// Audio playback errors
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("No plugin or sample registered for sound: {0}")]
    UnknownSound(SoundId),

    #[error("Render engine could not allocate {bytes} bytes for {sound}")]
    AllocationFailure { sound: SoundId, bytes: usize },

    #[error("Failed to resume audio device: {0}")]
    ResumeFailure(String),

    #[error("Failed to load asset for {sound}: {reason}")]
    AssetLoadFailure { sound: SoundId, reason: String },

    #[error("Audio device error: {0}")]
    DeviceError(String),

    #[error("Failed to decode audio: {0}")]
    DecodeError(String),

    #[error("Render engine error: {0}")]
    Engine(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid tempo: {0}")]
    InvalidTempo(#[from] drumhit_core::CoreError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl AudioError {
    /// Whether the error failed the play call it came from, as opposed to a
    /// condition that is logged and skipped
    pub fn is_fatal_to_call(&self) -> bool {
        !matches!(self, AudioError::UnknownSound(_) | AudioError::ResumeFailure(_))
    }
}

pub type Result<T> = std::result::Result<T, AudioError>;
