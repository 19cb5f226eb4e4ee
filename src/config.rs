use std::collections::HashMap;

/// Read-only configuration collaborator.
///
/// Decoders look up per-protocol options by dotted key, e.g. `"tk103.speed"`.
/// A missing key always falls back to the decoder's default.
pub trait Config {
    fn string(&self, key: &str) -> Option<&str>;
}

/// Empty configuration; every lookup uses the decoder default.
impl Config for () {
    fn string(&self, _key: &str) -> Option<&str> {
        None
    }
}

/// A map-backed configuration.
#[derive(Debug, Default)]
pub struct MapConfig {
    entries: HashMap<String, String>,
}

impl MapConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }
}

impl Config for MapConfig {
    fn string(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }
}
