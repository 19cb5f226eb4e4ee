//! Field cursors: a typed reader over captured sentence fields and a
//! bounds-checked big-endian reader over raw frame bytes.

/// A read cursor over the fields captured by a grammar match.
///
/// Every accessor advances the cursor by the fields it consumes. Reading past
/// the last field, or reading a field that fails its numeric conversion,
/// returns `None`; decoders treat that as a failure of the whole message.
#[derive(Debug)]
pub struct Fields {
    values: Vec<Option<String>>,
    pos: usize,
}

impl Fields {
    pub(crate) fn new(values: Vec<Option<String>>) -> Self {
        Self { values, pos: 0 }
    }

    /// Read the next field. `None` if the capture did not participate in the
    /// match (optional group) or the cursor is past the end.
    pub fn next(&mut self) -> Option<String> {
        let value = self.values.get(self.pos).cloned().flatten();
        self.pos += 1;
        value
    }

    pub fn next_int(&mut self) -> Option<i32> {
        self.next()?.parse().ok()
    }

    pub fn next_int_radix(&mut self, radix: u32) -> Option<i32> {
        i32::from_str_radix(&self.next()?, radix).ok()
    }

    pub fn next_long(&mut self) -> Option<i64> {
        self.next()?.parse().ok()
    }

    pub fn next_long_radix(&mut self, radix: u32) -> Option<i64> {
        i64::from_str_radix(&self.next()?, radix).ok()
    }

    pub fn next_double(&mut self) -> Option<f64> {
        self.next()?.parse().ok()
    }

    /// Read a coordinate captured as three fields: degrees, decimal minutes
    /// and a hemisphere letter. `S` and `W` negate the result.
    pub fn next_coordinate(&mut self) -> Option<f64> {
        let degrees = self.next_int()? as f64;
        let minutes = self.next_double()?;
        let hemisphere = self.next()?;
        let value = degrees + minutes / 60.0;
        match hemisphere.as_str() {
            "S" | "W" => Some(-value),
            _ => Some(value),
        }
    }

    /// True iff an unread, non-empty field exists at the cursor.
    ///
    /// When the field at the cursor is absent or empty it is consumed, so a
    /// run of optional fields keeps its alignment (each probe settles one
    /// capture position).
    pub fn has_next(&mut self) -> bool {
        match self.values.get(self.pos) {
            Some(Some(value)) if !value.is_empty() => true,
            Some(_) => {
                self.pos += 1;
                false
            }
            None => false,
        }
    }
}

/// A bounds-checked reader over a binary frame.
///
/// All multi-byte reads are big-endian. Every operation returns `None`
/// instead of reading past the end of the buffer.
#[derive(Debug)]
pub struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Unread bytes remaining in the buffer.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn skip(&mut self, count: usize) -> Option<()> {
        self.slice(count).map(|_| ())
    }

    pub fn slice(&mut self, count: usize) -> Option<&'a [u8]> {
        let bytes = self.buf.get(self.pos..self.pos + count)?;
        self.pos += count;
        Some(bytes)
    }

    pub fn read_u8(&mut self) -> Option<u8> {
        let byte = *self.buf.get(self.pos)?;
        self.pos += 1;
        Some(byte)
    }

    pub fn read_u16(&mut self) -> Option<u16> {
        Some(u16::from_be_bytes(self.slice(2)?.try_into().ok()?))
    }

    pub fn read_u32(&mut self) -> Option<u32> {
        Some(u32::from_be_bytes(self.slice(4)?.try_into().ok()?))
    }

    pub fn read_i32(&mut self) -> Option<i32> {
        Some(i32::from_be_bytes(self.slice(4)?.try_into().ok()?))
    }
}
