//! Plugin registry: the single place a sound id turns into playback
//!
//! Callers never care whether a sound is synthesized, rendered by a foreign
//! engine, or read from the sample bank; they look up the callback bound to
//! the id and hand it a dispatch time.

use crate::{OutputDevice, Result};
use drumhit_core::SoundId;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// What a playback callback gets to work with
pub struct PlayContext<'a> {
    /// The sound being played
    pub sound: &'a SoundId,
    /// Output to start voices on
    pub device: &'a dyn OutputDevice,
    /// Tempo at dispatch time
    pub bpm: u32,
}

/// Unit of work bound to a sound id
///
/// Builds or fetches the sound's buffer and starts it on the device at
/// `when` (seconds, device clock).
pub trait PlaybackCallback: Send + Sync {
    fn play(&self, cx: &PlayContext<'_>, when: f64) -> Result<()>;
}

/// Adapter so plain closures can be registered
struct FnCallback<F>(F);

impl<F> PlaybackCallback for FnCallback<F>
where
    F: Fn(&PlayContext<'_>, f64) -> Result<()> + Send + Sync,
{
    fn play(&self, cx: &PlayContext<'_>, when: f64) -> Result<()> {
        (self.0)(cx, when)
    }
}

/// Mapping from sound id to playback callback
///
/// Registering an id again replaces its callback; the last registration wins.
#[derive(Default)]
pub struct Registry {
    callbacks: RwLock<HashMap<SoundId, Arc<dyn PlaybackCallback>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `callback` to `id`, replacing any previous binding
    pub fn register<C: PlaybackCallback + 'static>(&self, id: impl Into<SoundId>, callback: C) {
        self.register_arc(id.into(), Arc::new(callback));
    }

    /// Bind a closure to `id`
    pub fn register_fn<F>(&self, id: impl Into<SoundId>, callback: F)
    where
        F: Fn(&PlayContext<'_>, f64) -> Result<()> + Send + Sync + 'static,
    {
        self.register(id, FnCallback(callback));
    }

    /// Bind a shared callback to `id`
    pub fn register_arc(&self, id: SoundId, callback: Arc<dyn PlaybackCallback>) {
        let replaced = self.callbacks.write().insert(id.clone(), callback).is_some();
        if replaced {
            info!(sound = %id, "plugin replaced");
        } else {
            debug!(sound = %id, "plugin registered");
        }
    }

    /// Look up the callback for `id`
    pub fn resolve(&self, id: &SoundId) -> Option<Arc<dyn PlaybackCallback>> {
        self.callbacks.read().get(id).cloned()
    }

    pub fn contains(&self, id: &SoundId) -> bool {
        self.callbacks.read().contains_key(id)
    }

    /// Remove the binding for `id`. Returns whether one existed.
    pub fn unregister(&self, id: &SoundId) -> bool {
        self.callbacks.write().remove(id).is_some()
    }

    /// Registered ids, sorted
    pub fn ids(&self) -> Vec<SoundId> {
        let mut ids: Vec<SoundId> = self.callbacks.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}
