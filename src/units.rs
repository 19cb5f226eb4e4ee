/// Conversion factor between knots and km/h.
const KNOTS_TO_KPH: f64 = 1.852;
/// Conversion factor between knots and mph.
const KNOTS_TO_MPH: f64 = 1.15078;

/// The unit a device reports speed in on the wire.
///
/// Canonical records always carry speed in knots; the wire unit is a
/// per-protocol configuration option defaulting to km/h.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpeedUnit {
    #[default]
    Kmh,
    Knots,
    Mph,
}

impl SpeedUnit {
    /// Parse a configuration value. Anything other than `"kn"` or `"mph"`
    /// (including absence) selects km/h.
    pub fn from_config(value: Option<&str>) -> Self {
        match value {
            Some("kn") => Self::Knots,
            Some("mph") => Self::Mph,
            _ => Self::Kmh,
        }
    }

    /// Convert a wire speed in this unit to knots.
    pub fn to_knots(self, value: f64) -> f64 {
        match self {
            Self::Knots => value,
            Self::Kmh => value / KNOTS_TO_KPH,
            Self::Mph => value / KNOTS_TO_MPH,
        }
    }
}

/// Convert a km/h speed to knots.
pub fn knots_from_kph(value: f64) -> f64 {
    SpeedUnit::Kmh.to_knots(value)
}
