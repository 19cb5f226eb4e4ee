use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::device::{DeviceId, LastFix};

/// Attribute keys shared across protocols.
pub mod keys {
    pub const ALARM: &str = "alarm";
    pub const BATTERY: &str = "battery";
    pub const CHARGE: &str = "charge";
    pub const CID: &str = "cid";
    pub const EVENT: &str = "event";
    pub const FUEL: &str = "fuel";
    pub const GSM: &str = "gsm";
    pub const HDOP: &str = "hdop";
    pub const IGNITION: &str = "ignition";
    pub const LAC: &str = "lac";
    pub const MCC: &str = "mcc";
    pub const MNC: &str = "mnc";
    pub const ODOMETER: &str = "odometer";
    pub const POWER: &str = "power";
    pub const RFID: &str = "rfid";
    pub const RUNTIME: &str = "runtime";
    pub const SATELLITES: &str = "sat";
    pub const STATUS: &str = "status";
    /// Prefix for analog-to-digital channel readings (`adc1` .. `adc3`).
    pub const PREFIX_ADC: &str = "adc";
    /// Prefix for per-index temperature sensor readings.
    pub const PREFIX_TEMP: &str = "temp";
}

/// A secondary-telemetry attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

/// A decoded, normalized location record.
///
/// Constructed fresh per decode call via [`PositionBuilder`] and fully
/// populated before it is handed out; never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub device_id: DeviceId,
    pub protocol: &'static str,
    pub time: DateTime<Utc>,
    /// Signed decimal degrees.
    pub latitude: f64,
    /// Signed decimal degrees.
    pub longitude: f64,
    /// Meters.
    pub altitude: f64,
    /// Knots, regardless of wire unit.
    pub speed: f64,
    /// Degrees, 0-359.
    pub course: f64,
    pub valid: bool,
    pub attributes: BTreeMap<String, Value>,
}

impl Position {
    /// Convenience accessor for tests and collaborators.
    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}

/// Per-decode-call accumulator for a [`Position`].
///
/// The device handle is required up front, so no field can be populated
/// before identity resolution succeeds. [`PositionBuilder::build`] returns
/// `None` unless a timestamp and both coordinates are present; a record is
/// either complete or not produced at all.
#[derive(Debug)]
pub struct PositionBuilder {
    protocol: &'static str,
    device_id: DeviceId,
    time: Option<DateTime<Utc>>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    altitude: f64,
    speed: f64,
    course: f64,
    valid: bool,
    attributes: BTreeMap<String, Value>,
}

impl PositionBuilder {
    pub fn new(protocol: &'static str, device_id: DeviceId) -> Self {
        Self {
            protocol,
            device_id,
            time: None,
            latitude: None,
            longitude: None,
            altitude: 0.0,
            speed: 0.0,
            course: 0.0,
            valid: false,
            attributes: BTreeMap::new(),
        }
    }

    pub fn set_time(&mut self, time: DateTime<Utc>) {
        self.time = Some(time);
    }

    /// Latitude and longitude are always populated together.
    pub fn set_coordinates(&mut self, latitude: f64, longitude: f64) {
        self.latitude = Some(latitude);
        self.longitude = Some(longitude);
    }

    pub fn set_altitude(&mut self, altitude: f64) {
        self.altitude = altitude;
    }

    pub fn set_speed(&mut self, knots: f64) {
        self.speed = knots;
    }

    pub fn set_course(&mut self, course: f64) {
        self.course = course;
    }

    pub fn set_valid(&mut self, valid: bool) {
        self.valid = valid;
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Fall back to the device's last known fix for a message that carries
    /// no position of its own. The record keeps the message's own timestamp
    /// when it has one, otherwise the fix's; with no fix on file the record
    /// is anchored at the Unix epoch with an invalid zero position.
    pub fn use_last_fix(&mut self, device_time: Option<DateTime<Utc>>, last: Option<&LastFix>) {
        match last {
            Some(last) => {
                self.latitude = Some(last.latitude);
                self.longitude = Some(last.longitude);
                self.altitude = last.altitude;
                self.speed = last.speed;
                self.course = last.course;
                self.valid = last.valid;
                self.time = device_time.or(Some(last.time));
            }
            None => {
                self.latitude = Some(0.0);
                self.longitude = Some(0.0);
                self.valid = false;
                self.time = device_time.or(Some(DateTime::<Utc>::UNIX_EPOCH));
            }
        }
    }

    pub fn build(self) -> Option<Position> {
        Some(Position {
            protocol: self.protocol,
            device_id: self.device_id,
            time: self.time?,
            latitude: self.latitude?,
            longitude: self.longitude?,
            altitude: self.altitude,
            speed: self.speed,
            course: self.course,
            valid: self.valid,
            attributes: self.attributes,
        })
    }
}
