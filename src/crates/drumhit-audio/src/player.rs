//! High-level drum kit player

use crate::{
    AudioError, CpalDevice, DeviceFactory, DeviceManager, ForeignPlugin, ForeignRenderer,
    MemoryDevice, OutputDevice, PlayContext, PlaybackCallback, Registry, Result, SampleBank,
    SamplePlugin, Scheduler, SynthPlugin, WasmRenderEngine,
};
use drumhit_core::{SoundId, Tempo, DEFAULT_BPM};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Sample rate of the offline device when none is configured
pub const DEFAULT_OFFLINE_SAMPLE_RATE: u32 = 44100;

/// Configuration for the drum kit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Tempo in BPM (beats per minute)
    pub bpm: u32,
    /// Lead time added to every dispatch
    pub start_offset_ms: u64,
    /// Sample rate for offline rendering. Real devices use their own.
    pub sample_rate: Option<u32>,
    /// Compiled foreign render module (`.wasm` or `.wat`)
    pub engine_path: Option<PathBuf>,
    /// Pre-recorded samples to load, by sound
    pub assets: BTreeMap<SoundId, String>,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        PlayerConfig {
            bpm: DEFAULT_BPM,
            start_offset_ms: 5,
            sample_rate: None,
            engine_path: None,
            assets: BTreeMap::new(),
        }
    }
}

impl PlayerConfig {
    pub fn validate(&self) -> Result<()> {
        drumhit_core::tempo::check_bpm(self.bpm)?;

        if self.start_offset_ms >= 100 {
            return Err(AudioError::InvalidConfig(format!(
                "Start offset must be under 100 ms, got {}",
                self.start_offset_ms
            )));
        }

        if self.sample_rate == Some(0) {
            return Err(AudioError::InvalidConfig(
                "Sample rate must be positive".to_string(),
            ));
        }

        Ok(())
    }

    pub fn start_offset(&self) -> Duration {
        Duration::from_millis(self.start_offset_ms)
    }
}

/// Drum kit: the five built-in voices, any foreign-rendered sounds, and the
/// sample bank, all played through one scheduler
pub struct Drumkit {
    config: PlayerConfig,
    scheduler: Scheduler,
    bank: Arc<SampleBank>,
}

impl Drumkit {
    /// Drum kit on the default audio output, opened on the first play
    pub fn new(config: PlayerConfig) -> Result<Self> {
        Self::with_factory(
            config,
            Box::new(|| {
                #[allow(clippy::arc_with_non_send_sync)]
                let device = Arc::new(CpalDevice::new()?);
                Ok(device as Arc<dyn OutputDevice>)
            }),
        )
    }

    /// Drum kit on a device created by `factory` when first needed
    pub fn with_factory(config: PlayerConfig, factory: DeviceFactory) -> Result<Self> {
        Self::build(config, DeviceManager::new(factory))
    }

    /// Drum kit on an existing device
    pub fn with_device(config: PlayerConfig, device: Arc<dyn OutputDevice>) -> Result<Self> {
        Self::build(config, DeviceManager::with_device(device))
    }

    /// Drum kit rendering into memory, for export and tests
    pub fn offline(config: PlayerConfig) -> Result<(Self, Arc<MemoryDevice>)> {
        let sample_rate = config.sample_rate.unwrap_or(DEFAULT_OFFLINE_SAMPLE_RATE);
        let device = Arc::new(MemoryDevice::new(sample_rate));
        let kit = Self::with_device(config, device.clone())?;
        Ok((kit, device))
    }

    fn build(config: PlayerConfig, devices: DeviceManager) -> Result<Self> {
        config.validate()?;

        let tempo = Arc::new(Tempo::new(config.bpm)?);
        let registry = Arc::new(Registry::new());
        for sound in SoundId::BUILT_IN {
            registry.register(sound, SynthPlugin::new());
        }

        if let Some(path) = &config.engine_path {
            let engine = WasmRenderEngine::from_file(path)?;
            let sounds = engine.sounds();
            let renderer = ForeignRenderer::new(engine);
            for sound in &sounds {
                registry.register(sound.clone(), ForeignPlugin::new(sound, renderer.clone()));
            }
            info!(path = %path.display(), sounds = sounds.len(), "render engine loaded");
        }

        let scheduler = Scheduler::new(registry, devices, tempo)
            .with_start_offset(config.start_offset());

        Ok(Drumkit {
            config,
            scheduler,
            bank: Arc::new(SampleBank::new()),
        })
    }

    /// Load every asset listed in the configuration
    ///
    /// Failures are logged and returned; sounds that did load stay playable.
    pub async fn load_configured_assets(&self) -> Vec<AudioError> {
        let mut failures = Vec::new();
        for (id, source) in &self.config.assets {
            if let Err(err) = self.load_asset(id.clone(), source).await {
                warn!(sound = %id, error = %err, "asset failed to load");
                failures.push(err);
            }
        }
        failures
    }

    /// Play `id` at `when` seconds on the device clock, or now
    pub async fn play(&self, id: &SoundId, when: Option<f64>) -> Result<()> {
        self.scheduler.play(id, when).await
    }

    /// Bind a playback callback to `id`, replacing any previous one
    pub fn register<C: PlaybackCallback + 'static>(&self, id: impl Into<SoundId>, callback: C) {
        self.scheduler.registry().register(id, callback);
    }

    /// Bind a closure to `id`
    pub fn register_fn<F>(&self, id: impl Into<SoundId>, callback: F)
    where
        F: Fn(&PlayContext<'_>, f64) -> Result<()> + Send + Sync + 'static,
    {
        self.scheduler.registry().register_fn(id, callback);
    }

    /// Fetch and decode a pre-recorded sound, then make `id` play it
    pub async fn load_asset(&self, id: impl Into<SoundId>, source: &str) -> Result<()> {
        let id = id.into();
        self.bank.load_asset(&id, source).await?;
        self.register(id, SamplePlugin::new(Arc::clone(&self.bank)));
        Ok(())
    }

    pub fn set_bpm(&self, bpm: u32) -> Result<()> {
        self.scheduler.tempo().set_bpm(bpm)?;
        info!(bpm, "tempo changed");
        Ok(())
    }

    pub fn bpm(&self) -> u32 {
        self.scheduler.tempo().bpm()
    }

    /// Playable sound ids, sorted
    pub fn sounds(&self) -> Vec<SoundId> {
        self.scheduler.registry().ids()
    }

    /// Drop every queued voice. The device itself stays open.
    pub fn reset(&self) {
        if !self.scheduler.devices().is_initialized() {
            return;
        }
        if let Ok(device) = self.scheduler.devices().device() {
            device.clear();
            info!("queued voices dropped");
        }
    }

    /// The output device, opening it if needed
    pub fn device(&self) -> Result<Arc<dyn OutputDevice>> {
        self.scheduler.devices().device()
    }

    pub fn bank(&self) -> &Arc<SampleBank> {
        &self.bank
    }

    pub fn registry(&self) -> &Arc<Registry> {
        self.scheduler.registry()
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }
}
