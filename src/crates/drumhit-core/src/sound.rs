//! Sound identifiers

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Identifier of a playable sound ("kick", "snare", or anything a caller registers)
///
/// Ids are compared by exact string value. The built-in drum voices have
/// associated constants so callers don't have to spell them out.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SoundId(String);

impl SoundId {
    pub const KICK: &'static str = "kick";
    pub const SNARE: &'static str = "snare";
    pub const HIHAT: &'static str = "hihat";
    pub const TOM: &'static str = "tom";
    pub const CLAP: &'static str = "clap";

    /// All sounds the synthesizer can render without external assets
    pub const BUILT_IN: [&'static str; 5] =
        [Self::KICK, Self::SNARE, Self::HIHAT, Self::TOM, Self::CLAP];

    pub fn new(id: impl Into<String>) -> Self {
        SoundId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this id names one of the built-in drum voices
    pub fn is_built_in(&self) -> bool {
        Self::BUILT_IN.contains(&self.0.as_str())
    }
}

impl fmt::Display for SoundId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SoundId {
    fn from(id: &str) -> Self {
        SoundId(id.to_string())
    }
}

impl From<String> for SoundId {
    fn from(id: String) -> Self {
        SoundId(id)
    }
}

impl Borrow<str> for SoundId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for SoundId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_built_in_ids() {
        assert!(SoundId::from("snare").is_built_in());
        assert!(SoundId::from("clap").is_built_in());
        assert!(!SoundId::from("cowbell").is_built_in());
    }

    #[test]
    fn test_lookup_by_str() {
        let mut map = HashMap::new();
        map.insert(SoundId::from("kick"), 1);
        assert_eq!(map.get("kick"), Some(&1));
    }

    #[test]
    fn test_serde_transparent() {
        let id: SoundId = serde_json::from_str("\"tom\"").unwrap();
        assert_eq!(id.as_str(), "tom");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"tom\"");
    }
}
