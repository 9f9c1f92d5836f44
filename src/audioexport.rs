use drumhit_audio::{AudioError, Drumkit, PlayerConfig, SoundId};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

/// Frames pulled from the offline device per step
const RENDER_BLOCK: usize = 1024;

/// Longest hit we are willing to render, in seconds
const MAX_RENDER_SECS: f64 = 10.0;

#[derive(Error, Debug)]
pub enum AudioExportError {
    #[error("Hound error: {0}")]
    Hound(#[from] hound::Error),

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Rendering error: {0}")]
    RenderError(#[from] AudioError),
}

#[derive(Debug, Clone)]
pub struct ExportParams {
    pub output_path: PathBuf,
    pub sample_rate: u32,
    pub bit_depth: Option<u16>,
}

impl ExportParams {
    pub fn validate(&self) -> Result<(), AudioExportError> {
        // Validate bit depth
        let bit_depth = self.bit_depth.unwrap_or(16);
        if ![16, 24, 32].contains(&bit_depth) {
            return Err(AudioExportError::InvalidParams(format!(
                "Bit depth must be 16, 24, or 32, got {}",
                bit_depth
            )));
        }

        // Validate sample rate
        if ![44100, 48000, 96000].contains(&self.sample_rate) {
            return Err(AudioExportError::InvalidParams(format!(
                "Sample rate must be 44100, 48000, or 96000 Hz, got {}",
                self.sample_rate
            )));
        }

        // Validate output path
        if self.output_path.as_os_str().is_empty() {
            return Err(AudioExportError::InvalidParams(
                "Output path must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Encode a mono buffer to a WAV file
fn encode_wav(samples: &[f32], params: &ExportParams) -> Result<(), AudioExportError> {
    let bit_depth = params.bit_depth.unwrap_or(16);

    let spec = WavSpec {
        channels: 1,
        sample_rate: params.sample_rate,
        bits_per_sample: bit_depth,
        sample_format: if bit_depth == 32 {
            SampleFormat::Float
        } else {
            SampleFormat::Int
        },
    };

    let mut writer = WavWriter::create(&params.output_path, spec)?;

    match bit_depth {
        16 => {
            for sample in samples {
                writer.write_sample((sample.clamp(-1.0, 1.0) * 32767.0) as i16)?;
            }
        }
        24 => {
            for sample in samples {
                writer.write_sample((sample.clamp(-1.0, 1.0) * 8388607.0) as i32)?;
            }
        }
        32 => {
            for sample in samples {
                writer.write_sample(*sample)?;
            }
        }
        other => {
            return Err(AudioExportError::InvalidParams(format!(
                "Unsupported bit depth {}",
                other
            )))
        }
    }

    writer.finalize()?;

    Ok(())
}

/// Render one hit of `sound` offline and write it to `params.output_path`
///
/// Goes through the same plugin path as live playback, including the
/// configured foreign engine and sample assets. Returns the number of frames
/// written.
pub async fn export_hit(
    sound: &SoundId,
    config: PlayerConfig,
    params: &ExportParams,
) -> Result<usize, AudioExportError> {
    params.validate()?;

    let config = PlayerConfig {
        sample_rate: Some(params.sample_rate),
        ..config
    };
    let (kit, device) = Drumkit::offline(config)?;
    for err in kit.load_configured_assets().await {
        warn!(error = %err, "continuing export without asset");
    }

    if !kit.sounds().contains(sound) {
        return Err(AudioError::UnknownSound(sound.clone()).into());
    }
    kit.play(sound, Some(0.0)).await?;

    let max_frames = (MAX_RENDER_SECS * params.sample_rate as f64) as usize;
    let mut samples = Vec::new();
    while device.pending() > 0 && samples.len() < max_frames {
        samples.extend(device.render(RENDER_BLOCK));
    }
    // Drop the block padding after the hit ends
    let end = samples.iter().rposition(|s| *s != 0.0).map_or(0, |i| i + 1);
    samples.truncate(end);

    encode_wav(&samples, params)?;
    info!(
        sound = %sound,
        frames = samples.len(),
        path = %params.output_path.display(),
        "hit exported"
    );

    Ok(samples.len())
}
