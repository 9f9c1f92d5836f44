//! Sample loading and management
//!
//! Fetches pre-recorded sounds from HTTP URLs or the local filesystem,
//! decodes them once, and caches the result by sound id. Loading happens
//! whenever the caller chooses, never during playback.

use crate::{AudioError, Result};
use drumhit_core::{SampleBuffer, SoundId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;
use symphonia::core::audio::SampleBuffer as DecodeBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{info, warn};

/// Cache of decoded sample buffers keyed by sound id
pub struct SampleBank {
    buffers: RwLock<HashMap<SoundId, Arc<SampleBuffer>>>,
    client: reqwest::Client,
}

impl SampleBank {
    /// Create an empty bank
    pub fn new() -> Self {
        SampleBank {
            buffers: RwLock::new(HashMap::new()),
            client: reqwest::Client::new(),
        }
    }

    /// Fetch and decode `source`, then cache it as `id`
    ///
    /// `source` is an `http(s)://` URL, a `file://` URL or a plain path. An
    /// existing entry for `id` is replaced only when loading succeeds, so a
    /// failure leaves previously cached sounds untouched.
    pub async fn load_asset(&self, id: &SoundId, source: &str) -> Result<Arc<SampleBuffer>> {
        let failure = |reason: String| AudioError::AssetLoadFailure {
            sound: id.clone(),
            reason,
        };

        let bytes = self.fetch(source).await.map_err(failure)?;
        let buffer = decode_audio(&bytes, source).map_err(|e| failure(e.to_string()))?;
        let buffer = Arc::new(buffer);

        info!(
            sound = %id,
            source,
            frames = buffer.frames(),
            sample_rate = buffer.sample_rate(),
            "sample loaded"
        );
        self.insert(id.clone(), Arc::clone(&buffer));
        Ok(buffer)
    }

    /// Cache an already decoded buffer
    pub fn insert(&self, id: SoundId, buffer: Arc<SampleBuffer>) {
        self.buffers.write().insert(id, buffer);
    }

    /// Look up a cached buffer
    pub fn get(&self, id: &SoundId) -> Option<Arc<SampleBuffer>> {
        self.buffers.read().get(id).cloned()
    }

    pub fn contains(&self, id: &SoundId) -> bool {
        self.buffers.read().contains_key(id)
    }

    /// Evict one entry. Returns whether it was present.
    pub fn unload(&self, id: &SoundId) -> bool {
        self.buffers.write().remove(id).is_some()
    }

    /// Cached ids, sorted
    pub fn ids(&self) -> Vec<SoundId> {
        let mut ids: Vec<SoundId> = self.buffers.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    async fn fetch(&self, source: &str) -> std::result::Result<Vec<u8>, String> {
        if source.starts_with("http://") || source.starts_with("https://") {
            let response = self
                .client
                .get(source)
                .send()
                .await
                .and_then(|r| r.error_for_status())
                .map_err(|e| format!("Failed to fetch {}: {}", source, e))?;
            let bytes = response
                .bytes()
                .await
                .map_err(|e| format!("Failed to read bytes: {}", e))?;
            return Ok(bytes.to_vec());
        }

        let path = source.strip_prefix("file://").unwrap_or(source);
        tokio::fs::read(path)
            .await
            .map_err(|e| format!("Failed to read {}: {}", path, e))
    }
}

impl Default for SampleBank {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode audio data from bytes using Symphonia, downmixed to mono
///
/// `name` is only used for its extension, as a format hint.
pub fn decode_audio(data: &[u8], name: &str) -> Result<SampleBuffer> {
    // Create a media source from the byte slice (need to own the data)
    let cursor = Cursor::new(data.to_vec());
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

    // Create a hint to help the format registry guess the format
    let mut hint = Hint::new();
    if let Some((_, ext)) = name.rsplit_once('.') {
        hint.with_extension(&ext.to_ascii_lowercase());
    }

    // Probe the media source
    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| AudioError::DecodeError(format!("Failed to probe format: {}", e)))?;

    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or_else(|| AudioError::DecodeError("No valid audio track found".to_string()))?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    // Create decoder
    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| AudioError::DecodeError(format!("Failed to create decoder: {}", e)))?;

    let mut sample_rate = codec_params.sample_rate.unwrap_or(44100);
    let mut mono: Vec<f32> = Vec::new();

    loop {
        match format.next_packet() {
            Ok(packet) if packet.track_id() == track_id => {
                let decoded = decoder
                    .decode(&packet)
                    .map_err(|e| AudioError::DecodeError(format!("Failed to decode packet: {}", e)))?;

                let spec = *decoded.spec();
                sample_rate = spec.rate;
                let channels = spec.channels.count().max(1);

                let mut interleaved = DecodeBuffer::<f32>::new(decoded.capacity() as u64, spec);
                interleaved.copy_interleaved_ref(decoded);
                mono.extend(
                    interleaved
                        .samples()
                        .chunks(channels)
                        .map(|frame| frame.iter().sum::<f32>() / channels as f32),
                );
            }
            Ok(_) => continue,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => {
                return Err(AudioError::DecodeError(format!("Format error: {}", e)));
            }
        }
    }

    if mono.is_empty() {
        warn!(name, "decoded asset contains no frames");
    }

    Ok(SampleBuffer::new(mono, sample_rate))
}
