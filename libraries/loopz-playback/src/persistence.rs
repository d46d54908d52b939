//! Settings persistence
//!
//! Volume, shuffle, loop, and the last played index survive page reloads
//! through a session-scoped key/value store. Values are advisory: anything
//! missing or malformed falls back to its default.

use crate::error::Result;
use std::collections::HashMap;

pub const VOLUME_KEY: &str = "volume";
pub const SHUFFLE_KEY: &str = "shuffle_enabled";
pub const LOOP_KEY: &str = "loop_enabled";
pub const LAST_INDEX_KEY: &str = "last_current_index";

/// Session-scoped string store (browser `sessionStorage` or equivalent)
pub trait SettingsStorage {
    fn get_item(&self, key: &str) -> Option<String>;

    fn set_item(&mut self, key: &str, value: &str) -> Result<()>;
}

/// In-process storage
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    items: HashMap<String, String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-filled with `items`
    pub fn with_items<K, V>(items: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            items: items
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl SettingsStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.get(key).cloned()
    }

    fn set_item(&mut self, key: &str, value: &str) -> Result<()> {
        self.items.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Settings as restored at startup
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PersistedSettings {
    pub volume: f32,
    pub shuffle: bool,
    pub looping: bool,
    pub last_index: Option<usize>,
}

impl PersistedSettings {
    /// Read every key, substituting defaults for missing or malformed values
    pub fn restore(storage: &dyn SettingsStorage, default_volume: f32) -> Self {
        let volume = storage
            .get_item(VOLUME_KEY)
            .and_then(|raw| raw.trim().parse::<f32>().ok())
            .filter(|v| v.is_finite() && (0.0..=1.0).contains(v))
            .unwrap_or_else(|| default_volume.clamp(0.0, 1.0));

        let shuffle = storage
            .get_item(SHUFFLE_KEY)
            .and_then(|raw| parse_flag(&raw))
            .unwrap_or(false);

        let looping = storage
            .get_item(LOOP_KEY)
            .and_then(|raw| parse_flag(&raw))
            .unwrap_or(false);

        let last_index = storage
            .get_item(LAST_INDEX_KEY)
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .and_then(|i| usize::try_from(i).ok());

        Self {
            volume,
            shuffle,
            looping,
            last_index,
        }
    }
}

/// `-1` stands for "nothing loaded"
pub fn encode_index(index: Option<usize>) -> String {
    index.map_or_else(|| "-1".to_string(), |i| i.to_string())
}

pub fn encode_flag(flag: bool) -> &'static str {
    if flag {
        "true"
    } else {
        "false"
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}
