use log::debug;

use crate::bits;
use crate::cursor::Fields;
use crate::datetime::DateBuilder;
use crate::error::Result;
use crate::pattern::{Grammar, Token};
use crate::position::{keys, Position, PositionBuilder};
use crate::protocol::{resolve, DecodeContext};
use crate::units::SpeedUnit;

pub const NAME: &str = "tk103";

/// Battery/power values of 65535 mean "not reported".
const UNREPORTED: i32 = 65535;

/// Regular position report.
///
/// Delimited and undelimited firmware variants share this grammar: the
/// optional comma after the device id also selects the date field order.
const POSITION: &[Token] = &[
    Token::Num("(d+)(,)?"),       // device id
    Token::Expr(".{4},?"),        // command
    Token::Num("d*"),             // imei
    Token::Num("(dd)(dd)(dd),?"), // date
    Token::Expr("([AV]),?"),      // validity
    Token::Num("(dd)(dd.d+)"),    // latitude
    Token::Expr("([NS]),?"),
    Token::Num("(ddd)(dd.d+)"),   // longitude
    Token::Expr("([EW]),?"),
    Token::Num("(d+.d)(?:d*,)?"), // speed
    Token::Num("(dd)(dd)(dd),?"), // time
    Token::Num("(d+.?d{1,2}),?"), // course
    Token::Opt(&[Token::Alt(&[
        &[Token::Num("([01]{8})")], // status, ASCII-binary form
        &[Token::Num("(x{8})")],    // status, hex form
    ])]),
    Token::Num(",?"),
    Token::Opt(&[Token::Text("L"), Token::Num("(x+)")]), // odometer
    Token::Any,
    Token::Opt(&[Token::Text(")")]),
];

/// Battery/power report (`ZC20`). Carries no position of its own.
const BATTERY: &[Token] = &[
    Token::Num("(d+),"),          // device id
    Token::Text("ZC20,"),
    Token::Num("(dd)(dd)(dd),"),  // date (ddmmyy)
    Token::Num("(dd)(dd)(dd),"),  // time
    Token::Num("d+,"),            // battery level
    Token::Num("(d+),"),          // battery voltage
    Token::Num("(d+),"),          // power voltage
    Token::Num("d+"),             // installed
    Token::Any,
];

/// Cell-network report (`BZ00`). Carries no position of its own.
const NETWORK: &[Token] = &[
    Token::Num("(d{12})"),        // device id
    Token::Text("BZ00,"),
    Token::Num("(d+),"),          // mcc
    Token::Num("(d+),"),          // mnc
    Token::Num("(x+),"),          // lac
    Token::Num("(x+),"),          // cid
    Token::Any,
];

/// Decoder for the TK103 family of text protocols.
pub struct Tk103 {
    position: Grammar,
    battery: Grammar,
    network: Grammar,
}

impl Tk103 {
    pub fn new() -> Result<Self> {
        Ok(Self {
            position: Grammar::compile(POSITION)?,
            battery: Grammar::compile(BATTERY)?,
            network: Grammar::compile(NETWORK)?,
        })
    }

    /// Decode one sentence, yielding at most one record.
    pub fn decode(&self, buf: &[u8], ctx: &mut DecodeContext<'_>) -> Result<Vec<Position>> {
        let text = String::from_utf8_lossy(buf);

        // Leading garbage up to and including the opening parenthesis is
        // ignored.
        let sentence = match text.find('(') {
            Some(index) => &text[index + 1..],
            None => text.as_ref(),
        };

        // Command acknowledgments go out before any grammar work.
        if ctx.has_reply()
            && let (Some(id), Some(kind)) = (sentence.get(..12), sentence.get(12..16))
        {
            match kind {
                "BP00" => {
                    if let Some(content) = sentence.get(sentence.len() - 3..) {
                        ctx.send(format!("({id}AP01{content})").as_bytes())?;
                    }
                }
                "BP05" => ctx.send(format!("({id}AP05)").as_bytes())?,
                _ => {}
            }
        }

        // Most specific grammar first; the first match wins and a field
        // failure inside it drops the whole message without backtracking.
        let decoded = if let Some(fields) = self.battery.parse(sentence) {
            self.decode_battery(fields, ctx)
        } else if let Some(fields) = self.network.parse(sentence) {
            self.decode_network(fields, ctx)
        } else if let Some(fields) = self.position.parse(sentence) {
            self.decode_position(sentence, fields, ctx)
        } else {
            debug!("tk103: no grammar matched, dropping sentence");
            None
        };

        Ok(decoded.into_iter().collect())
    }

    fn decode_battery(&self, mut fields: Fields, ctx: &DecodeContext<'_>) -> Option<Position> {
        let unique_id = fields.next()?;
        let device_id = resolve(ctx.identity, &unique_id)?;

        let time = DateBuilder::new()
            .date_reverse(fields.next_int()?, fields.next_int()?, fields.next_int()?)
            .time(fields.next_int()?, fields.next_int()?, fields.next_int()?)
            .build()?;

        let mut position = PositionBuilder::new(NAME, device_id);
        position.use_last_fix(Some(time), ctx.identity.last_known(device_id).as_ref());

        let battery = fields.next_int()?;
        if battery != UNREPORTED {
            position.set(keys::BATTERY, i64::from(battery));
        }
        let power = fields.next_int()?;
        if power != UNREPORTED {
            position.set(keys::POWER, i64::from(power));
        }

        position.build()
    }

    fn decode_network(&self, mut fields: Fields, ctx: &DecodeContext<'_>) -> Option<Position> {
        let unique_id = fields.next()?;
        let device_id = resolve(ctx.identity, &unique_id)?;

        let mut position = PositionBuilder::new(NAME, device_id);
        position.use_last_fix(None, ctx.identity.last_known(device_id).as_ref());

        position.set(keys::MCC, i64::from(fields.next_int()?));
        position.set(keys::MNC, i64::from(fields.next_int()?));
        position.set(keys::LAC, i64::from(fields.next_int_radix(16)?));
        position.set(keys::CID, i64::from(fields.next_int_radix(16)?));

        position.build()
    }

    fn decode_position(
        &self,
        sentence: &str,
        mut fields: Fields,
        ctx: &DecodeContext<'_>,
    ) -> Option<Position> {
        let unique_id = fields.next()?;
        let device_id = resolve(ctx.identity, &unique_id)?;

        let mut position = PositionBuilder::new(NAME, device_id);

        // The alarm marker can sit anywhere in the sentence; one digit
        // follows it.
        if let Some(index) = sentence.find("BO01") {
            let digit = sentence.get(index + 4..index + 5)?;
            position.set(keys::ALARM, digit.parse::<i64>().ok()?);
        }

        // A comma after the device id marks the firmware variant that also
        // transmits the date day-first.
        let delimited = fields.next().is_some();
        let date = if delimited {
            DateBuilder::new().date_reverse(
                fields.next_int()?,
                fields.next_int()?,
                fields.next_int()?,
            )
        } else {
            DateBuilder::new().date(fields.next_int()?, fields.next_int()?, fields.next_int()?)
        };

        position.set_valid(fields.next()? == "A");
        position.set_coordinates(fields.next_coordinate()?, fields.next_coordinate()?);

        let unit = SpeedUnit::from_config(ctx.config.string("tk103.speed"));
        position.set_speed(unit.to_knots(fields.next_double()?));

        let time = date
            .time(fields.next_int()?, fields.next_int()?, fields.next_int()?)
            .build()?;
        position.set_time(time);

        position.set_course(fields.next_double()?);

        if let Some(status) = fields.next() {
            // ASCII-binary status: charge is active-low, ignition active-high.
            let value = bits::from_lsb_binary(&status)?;
            position.set(keys::CHARGE, !bits::check(value, 0));
            position.set(keys::IGNITION, bits::check(value, 1));
            position.set(keys::STATUS, status);
        }
        if let Some(status) = fields.next() {
            position.set(keys::STATUS, status); // hex status, kept raw
        }

        if fields.has_next() {
            position.set(keys::ODOMETER, fields.next_long_radix(16)?);
        }

        position.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MapConfig;
    use crate::device::{DeviceId, LastFix, MemoryRegistry};
    use crate::position::Value;
    use crate::transport::BufferChannel;
    use chrono::{TimeZone, Utc};

    fn registry() -> MemoryRegistry {
        let mut registry = MemoryRegistry::new();
        registry.register("035988863964", DeviceId(1));
        registry.register("013632651491", DeviceId(2));
        registry.register("864768011069660", DeviceId(3));
        registry.register("013500001111", DeviceId(4));
        registry
    }

    fn decode(sentence: &[u8]) -> (Vec<crate::position::Position>, Vec<u8>) {
        let registry = registry();
        let mut channel = BufferChannel::new();
        let mut ctx = DecodeContext::with_reply(&registry, &(), &mut channel);
        let decoded = Tk103::new().unwrap().decode(sentence, &mut ctx).unwrap();
        (decoded, channel.written().to_vec())
    }

    #[test]
    fn test_position_report() {
        let (decoded, written) = decode(
            b"(035988863964BP05000035988863964110524A4241.7977N02318.7561E000.0123536356.5100000000L000946)",
        );

        assert_eq!(written, b"(035988863964AP05)");
        assert_eq!(decoded.len(), 1);
        let position = &decoded[0];
        assert_eq!(position.device_id, DeviceId(1));
        assert_eq!(position.protocol, "tk103");
        assert_eq!(position.time, Utc.with_ymd_and_hms(2011, 5, 24, 12, 35, 36).unwrap());
        assert!(position.valid);
        assert!((position.latitude - (42.0 + 41.7977 / 60.0)).abs() < 1e-9);
        assert!((position.longitude - (23.0 + 18.7561 / 60.0)).abs() < 1e-9);
        assert_eq!(position.speed, 0.0);
        assert_eq!(position.course, 356.51);
        assert_eq!(position.attr(keys::STATUS), Some(&Value::Str("00000000".into())));
        assert_eq!(position.attr(keys::CHARGE), Some(&Value::Bool(true)));
        assert_eq!(position.attr(keys::IGNITION), Some(&Value::Bool(false)));
        assert_eq!(position.attr(keys::ODOMETER), Some(&Value::Int(0x946)));
    }

    #[test]
    fn test_position_without_odometer() {
        let (decoded, _) = decode(
            b"(035988863964BP05000035988863964110524A4241.7977N02318.7561E000.0123536356.5100000000)",
        );
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].attr(keys::ODOMETER), None);
        // Everything before the missing tail still populates.
        assert_eq!(decoded[0].course, 356.51);
        assert_eq!(decoded[0].attr(keys::CHARGE), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_position_hex_status() {
        let (decoded, _) = decode(
            b"(035988863964BP05000035988863964110524A4241.7977N02318.7561E000.0123536356.510F00ABCDL000946)",
        );
        assert_eq!(decoded.len(), 1);
        let position = &decoded[0];
        // Hex status is stored raw; no flags are derived from it.
        assert_eq!(position.attr(keys::STATUS), Some(&Value::Str("0F00ABCD".into())));
        assert_eq!(position.attr(keys::CHARGE), None);
        assert_eq!(position.attr(keys::IGNITION), None);
    }

    #[test]
    fn test_status_bit_order() {
        // The first transmitted character is bit 0 (charge, active-low),
        // the second is bit 1 (ignition, active-high).
        let (decoded, _) = decode(
            b"(035988863964BP05000035988863964110524A4241.7977N02318.7561E000.0123536356.5101000000)",
        );
        assert_eq!(decoded[0].attr(keys::CHARGE), Some(&Value::Bool(true)));
        assert_eq!(decoded[0].attr(keys::IGNITION), Some(&Value::Bool(true)));

        let (decoded, _) = decode(
            b"(035988863964BP05000035988863964110524A4241.7977N02318.7561E000.0123536356.5110000000)",
        );
        assert_eq!(decoded[0].attr(keys::CHARGE), Some(&Value::Bool(false)));
        assert_eq!(decoded[0].attr(keys::IGNITION), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_delimited_variant_reversed_date() {
        let (decoded, _) = decode(
            b"864768011069660,DW3B,190317,V,0000.0000N,00000.0000E,000.0,021659,000.0",
        );
        assert_eq!(decoded.len(), 1);
        let position = &decoded[0];
        assert_eq!(position.device_id, DeviceId(3));
        // Comma after the device id selects day-first date order.
        assert_eq!(position.time, Utc.with_ymd_and_hms(2017, 3, 19, 2, 16, 59).unwrap());
        assert!(!position.valid);
        assert_eq!(position.latitude, 0.0);
        assert_eq!(position.longitude, 0.0);
    }

    #[test]
    fn test_alarm_digit() {
        let (decoded, _) = decode(
            b"(013632651491BO011061030A2934.0133N10627.2544E040.0080445309.8700000000L000770)",
        );
        assert_eq!(decoded.len(), 1);
        let position = &decoded[0];
        assert_eq!(position.attr(keys::ALARM), Some(&Value::Int(1)));
        assert_eq!(position.time, Utc.with_ymd_and_hms(2006, 10, 30, 8, 4, 45).unwrap());
        assert!((position.speed - 40.0 / 1.852).abs() < 1e-9);
        assert_eq!(position.attr(keys::ODOMETER), Some(&Value::Int(0x770)));
    }

    #[test]
    fn test_battery_report_uses_last_fix() {
        let mut registry = registry();
        registry.set_last_known(
            DeviceId(2),
            LastFix {
                time: Utc.with_ymd_and_hms(2013, 6, 4, 3, 0, 0).unwrap(),
                latitude: 60.0,
                longitude: 24.5,
                altitude: 12.0,
                speed: 0.0,
                course: 90.0,
                valid: true,
            },
        );
        let mut ctx = DecodeContext::new(&registry, &());
        let decoded = Tk103::new()
            .unwrap()
            .decode(b"(013632651491,ZC20,040613,040137,6,42,112,0)", &mut ctx)
            .unwrap();

        assert_eq!(decoded.len(), 1);
        let position = &decoded[0];
        // The report's own timestamp wins over the fix's.
        assert_eq!(position.time, Utc.with_ymd_and_hms(2013, 6, 4, 4, 1, 37).unwrap());
        assert_eq!(position.latitude, 60.0);
        assert_eq!(position.longitude, 24.5);
        assert!(position.valid);
        assert_eq!(position.attr(keys::BATTERY), Some(&Value::Int(42)));
        assert_eq!(position.attr(keys::POWER), Some(&Value::Int(112)));
    }

    #[test]
    fn test_battery_sentinel_suppressed() {
        let (decoded, _) = decode(b"(013632651491,ZC20,291017,005741,3,65535,65535,0)");
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].attr(keys::BATTERY), None);
        assert_eq!(decoded[0].attr(keys::POWER), None);
        assert_eq!(decoded[0].time, Utc.with_ymd_and_hms(2017, 10, 29, 0, 57, 41).unwrap());
    }

    #[test]
    fn test_network_report() {
        let (decoded, _) = decode(b"(013632651491BZ00,460,0,ea43,3b0d,0)");
        assert_eq!(decoded.len(), 1);
        let position = &decoded[0];
        assert_eq!(position.attr(keys::MCC), Some(&Value::Int(460)));
        assert_eq!(position.attr(keys::MNC), Some(&Value::Int(0)));
        assert_eq!(position.attr(keys::LAC), Some(&Value::Int(0xea43)));
        assert_eq!(position.attr(keys::CID), Some(&Value::Int(0x3b0d)));
        // No last fix on file: anchored invalid at the epoch.
        assert!(!position.valid);
        assert_eq!(position.latitude, 0.0);
    }

    #[test]
    fn test_speed_unit_from_config() {
        let registry = registry();
        let mut config = MapConfig::new();
        config.set("tk103.speed", "kn");
        let mut ctx = DecodeContext::new(&registry, &config);
        let decoded = Tk103::new()
            .unwrap()
            .decode(
                b"(035988863964BP05000035988863964110524A4241.7977N02318.7561E010.0123536356.5100000000)",
                &mut ctx,
            )
            .unwrap();
        // Native knots pass through unconverted.
        assert_eq!(decoded[0].speed, 10.0);
    }

    #[test]
    fn test_handshake_echo() {
        let (decoded, written) = decode(b"(013500001111BP00HSO)");
        assert!(decoded.is_empty());
        assert_eq!(written, b"(013500001111AP01SO))");
    }

    #[test]
    fn test_unknown_device_drops_message() {
        let registry = MemoryRegistry::new();
        let mut ctx = DecodeContext::new(&registry, &());
        let decoded = Tk103::new()
            .unwrap()
            .decode(
                b"(035988863964BP05000035988863964110524A4241.7977N02318.7561E000.0123536356.5100000000L000946)",
                &mut ctx,
            )
            .unwrap();
        assert!(decoded.is_empty());
    }

    #[test]
    fn test_unmatched_sentence_drops_silently() {
        let (decoded, written) = decode(b"(035988863964XY99nonsense)");
        assert!(decoded.is_empty());
        assert!(written.is_empty());
    }
}
