use chrono::{DateTime, TimeZone, Utc};

/// Seconds from the Unix epoch to 2000-01-01T00:00:00Z, the era used by
/// binary frame timestamps.
pub const EPOCH_2000: i64 = 946_684_800;

/// Assembles a UTC timestamp from separately captured date and time fields.
///
/// Two-digit years are windowed into the 2000s. An assembled value that does
/// not name a real instant (month 13, hour 25, ...) builds to `None`, which
/// decoders treat as a failure of the whole message.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateBuilder {
    year: i32,
    month: i32,
    day: i32,
    hour: i32,
    minute: i32,
    second: i32,
}

impl DateBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the date from fields transmitted year-first.
    pub fn date(mut self, year: i32, month: i32, day: i32) -> Self {
        self.year = if year < 100 { 2000 + year } else { year };
        self.month = month;
        self.day = day;
        self
    }

    /// Set the date from fields transmitted day-first.
    pub fn date_reverse(self, day: i32, month: i32, year: i32) -> Self {
        self.date(year, month, day)
    }

    pub fn time(mut self, hour: i32, minute: i32, second: i32) -> Self {
        self.hour = hour;
        self.minute = minute;
        self.second = second;
        self
    }

    pub fn build(&self) -> Option<DateTime<Utc>> {
        Utc.with_ymd_and_hms(
            self.year,
            u32::try_from(self.month).ok()?,
            u32::try_from(self.day).ok()?,
            u32::try_from(self.hour).ok()?,
            u32::try_from(self.minute).ok()?,
            u32::try_from(self.second).ok()?,
        )
        .single()
    }
}

/// Convert a seconds-since-2000 wire timestamp to a UTC instant.
pub fn from_epoch_2000(seconds: u32) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(EPOCH_2000 + i64::from(seconds), 0).single()
}
