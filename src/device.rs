use std::collections::HashMap;

use chrono::{DateTime, Utc};

/// Opaque internal handle for a registered device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub u64);

/// The last known fix of a device, used when a message carries no fresh
/// position of its own (battery and cell-network reports).
#[derive(Debug, Clone, PartialEq)]
pub struct LastFix {
    pub time: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    /// Knots.
    pub speed: f64,
    pub course: f64,
    pub valid: bool,
}

/// Device-identity collaborator.
///
/// Lookups are fast and side-effect free; the decoder never mutates the
/// directory. A transmitted unique identifier that does not resolve aborts
/// the decode of that message.
pub trait IdentityResolver {
    /// Map a device's transmitted unique identifier to its internal handle.
    fn resolve(&self, unique_id: &str) -> Option<DeviceId>;

    /// The device's most recent decoded fix, if any.
    fn last_known(&self, device_id: DeviceId) -> Option<LastFix>;
}

/// An in-memory identity directory.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    devices: HashMap<String, DeviceId>,
    fixes: HashMap<DeviceId, LastFix>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, unique_id: impl Into<String>, device_id: DeviceId) {
        self.devices.insert(unique_id.into(), device_id);
    }

    pub fn set_last_known(&mut self, device_id: DeviceId, fix: LastFix) {
        self.fixes.insert(device_id, fix);
    }
}

impl IdentityResolver for MemoryRegistry {
    fn resolve(&self, unique_id: &str) -> Option<DeviceId> {
        self.devices.get(unique_id).copied()
    }

    fn last_known(&self, device_id: DeviceId) -> Option<LastFix> {
        self.fixes.get(&device_id).cloned()
    }
}
