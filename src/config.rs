use anyhow::{Context, Result};
use drumhit_audio::PlayerConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Looked up in the working directory when no `--config` is given
pub const CONFIG_FILE: &str = "drumhit.json";

/// Everything the command line front end reads from its config file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(flatten)]
    pub player: PlayerConfig,
    /// Log filter used when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            player: PlayerConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Read `path`, or `drumhit.json` if present, or fall back to defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(CONFIG_FILE).exists() => Self::from_file(Path::new(CONFIG_FILE)),
            None => Ok(Settings::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Apply command line flags on top of file values
    pub fn with_overrides(mut self, bpm: Option<u32>, engine: Option<PathBuf>) -> Self {
        if let Some(bpm) = bpm {
            self.player.bpm = bpm;
        }
        if let Some(engine) = engine {
            self.player.engine_path = Some(engine);
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.player.validate().context("Invalid configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drumhit_audio::SoundId;

    #[test]
    fn test_flat_file_layout() {
        let settings: Settings = serde_json::from_str(
            r#"{
                "bpm": 100,
                "log_level": "debug",
                "assets": { "ride": "samples/ride.wav" }
            }"#,
        )
        .unwrap();
        assert_eq!(settings.player.bpm, 100);
        assert_eq!(settings.player.start_offset_ms, 5);
        assert_eq!(settings.log_level, "debug");
        assert!(settings.player.assets.contains_key(&SoundId::from("ride")));
    }

    #[test]
    fn test_load_from_file_and_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kit.json");
        std::fs::write(&path, r#"{"bpm": 90, "engine_path": "drums.wasm"}"#).unwrap();

        let settings = Settings::load(Some(&path))
            .unwrap()
            .with_overrides(Some(150), None);
        assert_eq!(settings.player.bpm, 150);
        assert_eq!(settings.player.engine_path, Some(PathBuf::from("drums.wasm")));
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn test_invalid_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ bpm: ").unwrap();
        assert!(Settings::load(Some(&path)).is_err());
        assert!(Settings::load(Some(&dir.path().join("missing.json"))).is_err());
    }

    #[test]
    fn test_zero_bpm_override_fails_validation() {
        let settings = Settings::default().with_overrides(Some(0), None);
        assert!(settings.validate().is_err());
    }
}
