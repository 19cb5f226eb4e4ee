use log::debug;

use crate::cursor::{ByteCursor, Fields};
use crate::datetime::{from_epoch_2000, DateBuilder};
use crate::device::DeviceId;
use crate::error::Result;
use crate::pattern::{Grammar, Token};
use crate::position::{keys, Position, PositionBuilder};
use crate::protocol::{resolve, DecodeContext};
use crate::units::knots_from_kph;

pub const NAME: &str = "meitrack";

/// Fixed size of one record in a binary batch frame.
const RECORD_LENGTH: usize = 0x34;

/// Regular text report (`AAA` and friends).
const REGULAR: &[Token] = &[
    Token::Text("$$"),
    Token::Expr("."),             // flag
    Token::Num("d+,"),            // length
    Token::Num("(d+),"),          // imei
    Token::Num("xxx,"),           // command
    Token::Opt(&[Token::Num("d+,")]),
    Token::Num("(d+),"),          // event
    Token::Num("(-?d+.d+),"),     // latitude
    Token::Num("(-?d+.d+),"),     // longitude
    Token::Num("(dd)(dd)(dd)"),   // date
    Token::Num("(dd)(dd)(dd),"),  // time
    Token::Expr("([AV]),"),       // validity
    Token::Num("(d+),"),          // satellites
    Token::Num("(d+),"),          // gsm signal
    Token::Num("(d+.?d*),"),      // speed
    Token::Num("(d+),"),          // course
    Token::Num("(d+.?d*),"),      // hdop
    Token::Num("(-?d+),"),        // altitude
    Token::Num("(d+),"),          // odometer
    Token::Num("(d+),"),          // runtime
    Token::Num("(d+)|"),          // mcc
    Token::Num("(d+)|"),          // mnc
    Token::Num("(x+)|"),          // lac
    Token::Num("(x+),"),          // cell id
    Token::Num("(x+),"),          // status
    Token::Num("(x+)?|"),         // adc1
    Token::Num("(x+)?|"),         // adc2
    Token::Num("(x+)?|"),         // adc3
    Token::Num("(x+)|"),          // battery
    Token::Num("(x+),"),          // power
    Token::Alt(&[
        &[
            Token::Expr("([^,]+)?,"),                   // event payload
            Token::Expr("[^,]*,"),                      // reserved
            Token::Num("d*,"),                          // protocol
            Token::Num("(x{4})?"),                      // fuel
            Token::Opt(&[Token::Num(",(x{6}(?:|x{6})*)")]), // temperatures
        ],
        &[Token::Any],
    ]),
    Token::Text("*"),
    Token::Num("xx"),             // checksum
    Token::Opt(&[Token::Text("\r\n")]),
];

/// What the three ASCII bytes after the second comma say a frame is.
enum FrameKind {
    /// Text report, decoded by grammar.
    Sentence,
    /// Binary batch of fixed-size records (`CCC`).
    Batch,
    /// Picture transfer chunk (`D03`); acknowledged, never decoded.
    PictureTransfer,
}

fn frame_kind(buf: &[u8]) -> FrameKind {
    let Some(second) = second_comma(buf) else {
        return FrameKind::Sentence;
    };
    match buf.get(second + 1..second + 4) {
        Some(b"CCC") => FrameKind::Batch,
        Some(b"D03") => FrameKind::PictureTransfer,
        _ => FrameKind::Sentence,
    }
}

fn second_comma(buf: &[u8]) -> Option<usize> {
    let first = buf.iter().position(|&b| b == b',')?;
    let offset = buf[first + 1..].iter().position(|&b| b == b',')?;
    Some(first + 1 + offset)
}

/// The device identifier sits between the first and second commas of every
/// frame shape, text and binary alike.
fn frame_imei(buf: &[u8]) -> Option<&str> {
    let first = buf.iter().position(|&b| b == b',')?;
    let second = second_comma(buf)?;
    std::str::from_utf8(&buf[first + 1..second]).ok()
}

/// The batch acknowledgment: `@@<flag><length>,<imei>,CCC,<count>*` plus the
/// low byte of the ASCII sum as two uppercase hex digits.
fn build_acknowledgment(flag: char, imei: &str, count: usize) -> Vec<u8> {
    let mut command = format!("@@{flag}{},{imei},CCC,{count}*", 27 + count / 10);
    let checksum: u32 = command.bytes().map(u32::from).sum();
    command.push_str(&format!("{:02X}", checksum & 0xff));
    command.push_str("\r\n");
    command.into_bytes()
}

/// Decoder for the Meitrack text and binary protocols.
pub struct Meitrack {
    regular: Grammar,
}

impl Meitrack {
    pub fn new() -> Result<Self> {
        Ok(Self {
            regular: Grammar::compile(REGULAR)?,
        })
    }

    /// Decode one inbound frame, yielding zero or more records.
    pub fn decode(&self, buf: &[u8], ctx: &mut DecodeContext<'_>) -> Result<Vec<Position>> {
        match frame_kind(buf) {
            FrameKind::PictureTransfer => {
                self.acknowledge_picture(buf, ctx)?;
                Ok(Vec::new())
            }
            FrameKind::Batch => self.decode_binary(buf, ctx),
            FrameKind::Sentence => {
                let text = String::from_utf8_lossy(buf);
                let decoded = match self.regular.parse(&text) {
                    Some(fields) => self.decode_regular(fields, ctx),
                    None => {
                        debug!("meitrack: no grammar matched, dropping frame");
                        None
                    }
                };
                Ok(decoded.into_iter().collect())
            }
        }
    }

    /// Reply to a picture chunk so the device keeps sending; the image data
    /// itself is not kept.
    fn acknowledge_picture(&self, buf: &[u8], ctx: &mut DecodeContext<'_>) -> Result<()> {
        if !ctx.has_reply() {
            return Ok(());
        }
        let Some(imei) = frame_imei(buf) else {
            return Ok(());
        };
        if resolve(ctx.identity, imei).is_none() {
            return Ok(());
        }
        ctx.send(format!("@@O46,{imei},D00,camera_picture.jpg,0*00\r\n").as_bytes())
    }

    fn decode_binary(&self, buf: &[u8], ctx: &mut DecodeContext<'_>) -> Result<Vec<Position>> {
        let Some(first) = buf.iter().position(|&b| b == b',') else {
            return Ok(Vec::new());
        };
        // Header: imei, ",CCC,", a length word, a count word and a u32.
        let (Some(&flag), Some(imei), Some(records)) = (
            buf.get(2),
            frame_imei(buf),
            buf.get(first + 1 + 15 + 1 + 3 + 1 + 2 + 2 + 4..),
        ) else {
            debug!("meitrack: malformed batch header, dropping frame");
            return Ok(Vec::new());
        };
        let Some(device_id) = resolve(ctx.identity, imei) else {
            return Ok(Vec::new());
        };

        let mut cursor = ByteCursor::new(records);
        let mut positions = Vec::new();
        while cursor.remaining() >= RECORD_LENGTH {
            let Some(position) = read_record(&mut cursor, device_id) else {
                break;
            };
            positions.push(position);
        }

        if ctx.has_reply() {
            ctx.send(&build_acknowledgment(flag as char, imei, positions.len()))?;
        }
        Ok(positions)
    }

    fn decode_regular(&self, mut fields: Fields, ctx: &DecodeContext<'_>) -> Option<Position> {
        let unique_id = fields.next()?;
        let device_id = resolve(ctx.identity, &unique_id)?;

        let mut position = PositionBuilder::new(NAME, device_id);

        let event = fields.next_int()?;
        position.set(keys::EVENT, i64::from(event));

        position.set_coordinates(fields.next_double()?, fields.next_double()?);

        let time = DateBuilder::new()
            .date(fields.next_int()?, fields.next_int()?, fields.next_int()?)
            .time(fields.next_int()?, fields.next_int()?, fields.next_int()?)
            .build()?;
        position.set_time(time);

        position.set_valid(fields.next()? == "A");

        position.set(keys::SATELLITES, i64::from(fields.next_int()?));
        position.set(keys::GSM, i64::from(fields.next_int()?));

        position.set_speed(knots_from_kph(fields.next_double()?));
        position.set_course(fields.next_double()?);

        position.set(keys::HDOP, fields.next_double()?);
        position.set_altitude(fields.next_double()?);

        position.set(keys::ODOMETER, fields.next_long()?);
        position.set(keys::RUNTIME, fields.next_long()?);
        position.set(keys::MCC, i64::from(fields.next_int()?));
        position.set(keys::MNC, i64::from(fields.next_int()?));
        position.set(keys::LAC, i64::from(fields.next_int_radix(16)?));
        position.set(keys::CID, i64::from(fields.next_int_radix(16)?));
        position.set(keys::STATUS, fields.next()?);

        for channel in 1..=3 {
            if fields.has_next() {
                position.set(
                    format!("{}{channel}", keys::PREFIX_ADC),
                    i64::from(fields.next_int_radix(16)?),
                );
            }
        }

        position.set(keys::BATTERY, i64::from(fields.next_int_radix(16)?));
        position.set(keys::POWER, i64::from(fields.next_int_radix(16)?));

        if let Some(payload) = fields.next()
            && !payload.is_empty()
        {
            match event {
                37 => position.set(keys::RFID, payload),
                _ => position.set("event-data", payload),
            }
        }

        // Fuel: two hex bytes, whole liters and hundredths.
        if fields.has_next() {
            let fuel = fields.next()?;
            let whole = i64::from_str_radix(fuel.get(..2)?, 16).ok()?;
            let hundredths = i64::from_str_radix(fuel.get(2..)?, 16).ok()?;
            position.set(keys::FUEL, whole as f64 + hundredths as f64 * 0.01);
        }

        // Temperatures: pipe-separated sensor-index/value pairs.
        if fields.has_next() {
            for reading in fields.next()?.split('|') {
                let index = i64::from_str_radix(reading.get(..2)?, 16).ok()?;
                let value = i64::from_str_radix(reading.get(2..)?, 16).ok()?;
                position.set(format!("{}{index}", keys::PREFIX_TEMP), value);
            }
        }

        position.build()
    }
}

/// Read one fixed-size binary record. All fields are big-endian;
/// coordinates are microdegrees and the timestamp counts seconds from
/// 2000-01-01.
fn read_record(cursor: &mut ByteCursor<'_>, device_id: DeviceId) -> Option<Position> {
    let mut position = PositionBuilder::new(NAME, device_id);

    position.set(keys::EVENT, i64::from(cursor.read_u8()?));

    let latitude = f64::from(cursor.read_i32()?) * 0.000001;
    let longitude = f64::from(cursor.read_i32()?) * 0.000001;
    position.set_coordinates(latitude, longitude);

    position.set_time(from_epoch_2000(cursor.read_u32()?)?);
    position.set_valid(cursor.read_u8()? == 1);

    position.set(keys::SATELLITES, i64::from(cursor.read_u8()?));
    position.set(keys::GSM, i64::from(cursor.read_u8()?));

    position.set_speed(knots_from_kph(f64::from(cursor.read_u16()?)));
    position.set_course(f64::from(cursor.read_u16()?));

    position.set(keys::HDOP, f64::from(cursor.read_u16()?) * 0.1);
    position.set_altitude(f64::from(cursor.read_u16()?));

    position.set(keys::ODOMETER, i64::from(cursor.read_u32()?));
    position.set(keys::RUNTIME, i64::from(cursor.read_u32()?));
    position.set(keys::MCC, i64::from(cursor.read_u16()?));
    position.set(keys::MNC, i64::from(cursor.read_u16()?));
    position.set(keys::LAC, i64::from(cursor.read_u16()?));
    position.set(keys::CID, i64::from(cursor.read_u16()?));
    position.set(keys::STATUS, i64::from(cursor.read_u16()?));

    position.set(format!("{}1", keys::PREFIX_ADC), i64::from(cursor.read_u16()?));
    position.set(keys::BATTERY, f64::from(cursor.read_u16()?) * 0.01);
    position.set(keys::POWER, i64::from(cursor.read_u16()?));

    cursor.skip(4)?; // geo-fence id

    position.build()
}
