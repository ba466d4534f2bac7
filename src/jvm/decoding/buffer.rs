//! A cursored big-endian reader over an immutable byte range.

use super::errors::{Error, Result};

/// A cursor over an immutable byte range.
///
/// All integer reads are big-endian and advance the cursor;
/// [`Buffer::reset`] may move it backward. `position <= limit <=
/// bytes.len()` holds at all times. Reads never allocate beyond what they
/// return.
#[derive(Debug)]
pub struct Buffer {
    bytes: Vec<u8>,
    position: usize,
    limit: usize,
}

impl Buffer {
    /// Creates a buffer over the whole byte vector.
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        let limit = bytes.len();
        Self {
            bytes,
            position: 0,
            limit,
        }
    }

    /// The current cursor position.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// The position past which no read may go.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// The number of bytes left before the limit.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.limit - self.position
    }

    /// Moves the cursor to an absolute position, forward or backward.
    /// Resetting to 0 after a full pass restores the ability to re-read
    /// the same stream.
    ///
    /// # Errors
    /// [`Error::InvalidState`] when the position lies past the limit.
    pub fn reset(&mut self, position: usize) -> Result<()> {
        if position > self.limit {
            return Err(Error::InvalidState("cannot seek past the buffer limit"));
        }
        self.position = position;
        Ok(())
    }

    /// Reads a single big-endian value and advances the cursor.
    ///
    /// # Errors
    /// [`Error::MalformedInput`] when the read would cross the limit.
    pub fn read_value<T: FromBuffer>(&mut self) -> Result<T> {
        T::from_buffer(self)
    }

    /// Reads `len` raw bytes into a fresh vector.
    ///
    /// # Errors
    /// [`Error::MalformedInput`] when the read would cross the limit.
    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        self.take(len).map(<[u8]>::to_vec)
    }

    fn take(&mut self, len: usize) -> Result<&[u8]> {
        let end = self
            .position
            .checked_add(len)
            .filter(|&end| end <= self.limit)
            .ok_or(Error::MalformedInput {
                offset: self.position,
            })?;
        let chunk = &self.bytes[self.position..end];
        self.position = end;
        Ok(chunk)
    }
}

/// A value decodable from a [`Buffer`].
pub trait FromBuffer: Sized {
    /// Reads the value at the buffer's cursor.
    ///
    /// # Errors
    /// [`Error::MalformedInput`] when the read would cross the limit.
    fn from_buffer(buffer: &mut Buffer) -> Result<Self>;
}

impl<const N: usize> FromBuffer for [u8; N] {
    fn from_buffer(buffer: &mut Buffer) -> Result<Self> {
        let offset = buffer.position();
        let chunk = buffer.take(N)?;
        chunk
            .try_into()
            .map_err(|_| Error::MalformedInput { offset })
    }
}

#[trait_gen::trait_gen(T ->
    u8, u16, u32, i32, i64, f32, f64
)]
impl FromBuffer for T {
    fn from_buffer(buffer: &mut Buffer) -> Result<Self> {
        let bytes = buffer.read_value()?;
        Ok(Self::from_be_bytes(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_u8_advances() {
        let mut buffer = Buffer::new(vec![0x01, 0x02]);
        let value: u8 = buffer.read_value().unwrap();
        assert_eq!(value, 0x01);
        assert_eq!(buffer.position(), 1);
    }

    #[test]
    fn read_u16_is_big_endian() {
        let mut buffer = Buffer::new(vec![0x01, 0x02]);
        let value: u16 = buffer.read_value().unwrap();
        assert_eq!(value, 0x0102);
        assert_eq!(buffer.remaining(), 0);
    }

    #[test]
    fn read_u32_is_big_endian() {
        let mut buffer = Buffer::new(vec![0x01, 0x02, 0x03, 0x04]);
        let value: u32 = buffer.read_value().unwrap();
        assert_eq!(value, 0x0102_0304);
    }

    #[test]
    fn read_u16_past_limit_fails() {
        let mut buffer = Buffer::new(vec![0x01]);
        let err = buffer.read_value::<u16>().unwrap_err();
        assert!(matches!(err, Error::MalformedInput { offset: 0 }));
    }

    #[test]
    fn read_i64_round_trips() {
        let mut buffer = Buffer::new((-2i64).to_be_bytes().to_vec());
        let value: i64 = buffer.read_value().unwrap();
        assert_eq!(value, -2);
    }

    #[test]
    fn read_f64_round_trips() {
        let mut buffer = Buffer::new(2.5f64.to_be_bytes().to_vec());
        let value: f64 = buffer.read_value().unwrap();
        assert!((value - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn read_bytes_takes_exactly_len() {
        let mut buffer = Buffer::new(vec![0x01, 0x02, 0x03, 0x04]);
        assert_eq!(buffer.read_bytes(3).unwrap(), vec![0x01, 0x02, 0x03]);
        assert_eq!(buffer.remaining(), 1);
        assert!(buffer.read_bytes(2).is_err());
    }

    #[test]
    fn reset_allows_reparsing() {
        let mut buffer = Buffer::new(vec![0x0a, 0x0b]);
        let first: u16 = buffer.read_value().unwrap();
        buffer.reset(0).unwrap();
        let second: u16 = buffer.read_value().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn reset_past_limit_fails() {
        let mut buffer = Buffer::new(vec![0x00]);
        assert!(buffer.reset(2).is_err());
    }

    #[test]
    fn failed_read_reports_failing_offset() {
        let mut buffer = Buffer::new(vec![0x00, 0x01, 0x02]);
        let _: u16 = buffer.read_value().unwrap();
        let err = buffer.read_value::<u32>().unwrap_err();
        assert!(matches!(err, Error::MalformedInput { offset: 2 }));
    }
}
