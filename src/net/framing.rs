//! Little-endian wire fields for snapshot items
//!
//! [`FieldWriter`] appends to a caller-owned buffer so records can be laid
//! down straight into a snapshot body; [`FieldReader`] walks received bytes
//! and reports where it ran out.

/// Appends little-endian fields to a borrowed buffer
pub struct FieldWriter<'a> {
    buf: &'a mut Vec<u8>,
    start: usize,
}

impl<'a> FieldWriter<'a> {
    pub fn new(buf: &'a mut Vec<u8>) -> Self {
        let start = buf.len();
        Self { buf, start }
    }

    pub fn u16(&mut self, value: u16) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn u32(&mut self, value: u32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn i32(&mut self, value: i32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// Payload fields are always i32; write them in order
    pub fn i32s(&mut self, values: &[i32]) -> &mut Self {
        for value in values {
            self.i32(*value);
        }
        self
    }

    pub fn bytes(&mut self, data: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(data);
        self
    }

    /// Bytes appended through this writer
    pub fn written(&self) -> usize {
        self.buf.len() - self.start
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Needed {needed} bytes at offset {offset}, {available} available")]
pub struct ShortRead {
    pub offset: usize,
    pub needed: usize,
    pub available: usize,
}

/// Cursor over received bytes
pub struct FieldReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> FieldReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], ShortRead> {
        let available = self.remaining();
        let bytes = self
            .data
            .get(self.offset..self.offset + N)
            .and_then(|slice| <[u8; N]>::try_from(slice).ok())
            .ok_or(ShortRead {
                offset: self.offset,
                needed: N,
                available,
            })?;
        self.offset += N;
        Ok(bytes)
    }

    pub fn u16(&mut self) -> Result<u16, ShortRead> {
        self.take().map(u16::from_le_bytes)
    }

    pub fn u32(&mut self) -> Result<u32, ShortRead> {
        self.take().map(u32::from_le_bytes)
    }

    pub fn i32(&mut self) -> Result<i32, ShortRead> {
        self.take().map(i32::from_le_bytes)
    }

    /// Read `N` consecutive i32 fields
    pub fn i32s<const N: usize>(&mut self) -> Result<[i32; N], ShortRead> {
        let mut out = [0; N];
        for slot in &mut out {
            *slot = self.i32()?;
        }
        Ok(out)
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Unread byte count
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_appends_after_existing_bytes() {
        let mut buf = vec![0xAA];
        let mut writer = FieldWriter::new(&mut buf);
        writer.u16(0x0102).u32(7).i32s(&[-1, 2]);
        assert_eq!(writer.written(), 2 + 4 + 8);

        assert_eq!(buf[0], 0xAA);
        assert_eq!(&buf[1..3], &[0x02, 0x01]);
        assert_eq!(&buf[7..11], &(-1i32).to_le_bytes());
    }

    #[test]
    fn test_reader_walks_fields() {
        let mut buf = Vec::new();
        FieldWriter::new(&mut buf).u16(1000).u32(999_999).i32(-42).i32s(&[5, 6, 7]);

        let mut reader = FieldReader::new(&buf);
        assert_eq!(reader.u16(), Ok(1000));
        assert_eq!(reader.u32(), Ok(999_999));
        assert_eq!(reader.i32(), Ok(-42));
        assert_eq!(reader.i32s::<3>(), Ok([5, 6, 7]));
        assert!(reader.is_exhausted());
    }

    #[test]
    fn test_short_read_reports_offset_and_keeps_position() {
        let data = [1, 2, 3];
        let mut reader = FieldReader::new(&data);

        assert!(reader.u16().is_ok());
        assert_eq!(
            reader.u16(),
            Err(ShortRead {
                offset: 2,
                needed: 2,
                available: 1
            })
        );
        assert_eq!(reader.offset(), 2);
        assert_eq!(reader.remaining(), 1);
    }
}
