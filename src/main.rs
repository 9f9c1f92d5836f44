mod audioexport;
mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use drumhit_audio::{Drumkit, SoundId};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use audioexport::ExportParams;
use config::Settings;

/// How long to keep the process alive after the last hit
const RELEASE_TAIL: Duration = Duration::from_millis(600);

#[derive(Parser, Debug)]
#[command(name = "drumhit")]
#[command(about = "Play, list and render drum hits", long_about = None)]
struct Args {
    /// Config file (default: ./drumhit.json if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Tempo in BPM, overrides the config file
    #[arg(long, global = true)]
    bpm: Option<u32>,

    /// Compiled render engine (.wasm or .wat), overrides the config file
    #[arg(long, global = true)]
    engine: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play one or more sounds on the default output
    Play {
        /// Sounds to play, in order
        #[arg(required = true)]
        sounds: Vec<String>,

        /// Gap between consecutive hits in milliseconds
        #[arg(short, long, default_value = "250")]
        interval_ms: u64,
    },
    /// List playable sounds
    List,
    /// Render one hit to a WAV file
    Render {
        /// Sound to render
        sound: String,

        /// Output file path
        #[arg(short, long)]
        out: PathBuf,

        /// Sample rate (44100, 48000 or 96000)
        #[arg(long, default_value = "44100")]
        sample_rate: u32,

        /// Bit depth (16, 24 or 32)
        #[arg(long, default_value = "16")]
        bit_depth: u16,
    },
    /// Load a pre-recorded sample from a URL or path and play it
    Load {
        /// http(s) URL, file:// URL or path
        source: String,

        /// Sound id to register the sample under
        #[arg(long = "as", default_value = "sample")]
        id: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();

    let settings = Settings::load(args.config.as_deref())?.with_overrides(args.bpm, args.engine);

    // Initialize logging
    let level = if args.verbose { "debug" } else { settings.log_level.as_str() };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .init();

    settings.validate()?;

    match args.command {
        Command::Play { sounds, interval_ms } => play(settings, &sounds, interval_ms).await,
        Command::List => list(settings),
        Command::Render {
            sound,
            out,
            sample_rate,
            bit_depth,
        } => {
            let params = ExportParams {
                output_path: out,
                sample_rate,
                bit_depth: Some(bit_depth),
            };
            let frames = audioexport::export_hit(&SoundId::from(sound), settings.player, &params)
                .await
                .context("Export failed")?;
            println!("Wrote {} frames to {}", frames, params.output_path.display());
            Ok(())
        }
        Command::Load { source, id } => load(settings, &source, id).await,
    }
}

async fn play(settings: Settings, sounds: &[String], interval_ms: u64) -> Result<()> {
    let kit = Drumkit::new(settings.player).context("Failed to set up drum kit")?;
    for err in kit.load_configured_assets().await {
        error!(error = %err, "asset unavailable");
    }

    let mut failures = 0;
    for (i, sound) in sounds.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(Duration::from_millis(interval_ms)).await;
        }
        if let Err(err) = kit.play(&SoundId::from(sound.as_str()), None).await {
            if err.is_fatal_to_call() {
                failures += 1;
            }
        }
    }

    tokio::time::sleep(RELEASE_TAIL).await;

    if failures > 0 {
        anyhow::bail!("{} of {} hits failed", failures, sounds.len());
    }
    Ok(())
}

fn list(settings: Settings) -> Result<()> {
    let assets = settings.player.assets.clone();
    let kit = Drumkit::new(settings.player).context("Failed to set up drum kit")?;
    for sound in kit.sounds() {
        println!("{}", sound);
    }
    for (sound, source) in &assets {
        println!("{:<12} sample ({})", sound, source);
    }
    Ok(())
}

async fn load(settings: Settings, source: &str, id: String) -> Result<()> {
    let kit = Drumkit::new(settings.player).context("Failed to set up drum kit")?;
    let id = SoundId::from(id);
    kit.load_asset(id.clone(), source)
        .await
        .with_context(|| format!("Failed to load {}", source))?;

    if let Some(buffer) = kit.bank().get(&id) {
        info!(
            sound = %id,
            frames = buffer.frames(),
            sample_rate = buffer.sample_rate(),
            "sample ready"
        );
        println!(
            "{}: {} frames at {} Hz ({:.3}s)",
            id,
            buffer.frames(),
            buffer.sample_rate(),
            buffer.duration()
        );
    }

    kit.play(&id, None).await?;
    tokio::time::sleep(RELEASE_TAIL).await;
    Ok(())
}
