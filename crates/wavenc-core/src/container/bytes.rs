//! Bounds-checked cursor over a byte slice.
//!
//! Every read returns `None` instead of indexing past the end, so the container
//! parsers can turn truncation into a validation error.

/// Cursor reading integers and tags from an in-memory buffer.
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Create a reader positioned at `pos`.
    pub fn at(buf: &'a [u8], pos: usize) -> Self {
        Self { buf, pos }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left between the cursor and the end of the buffer.
    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    /// Take the next `n` bytes, advancing the cursor.
    pub fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(n)?;
        let slice = self.buf.get(self.pos..end)?;
        self.pos = end;
        Some(slice)
    }

    /// Look at the next `n` bytes without advancing.
    pub fn peek(&self, n: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(n)?;
        self.buf.get(self.pos..end)
    }

    /// Advance by `n` bytes. Fails without moving if that would pass the end.
    pub fn skip(&mut self, n: usize) -> Option<()> {
        self.take(n).map(|_| ())
    }

    pub fn tag(&mut self) -> Option<[u8; 4]> {
        self.array()
    }

    pub fn u8(&mut self) -> Option<u8> {
        self.take(1).map(|b| b[0])
    }

    pub fn u16_le(&mut self) -> Option<u16> {
        self.array().map(u16::from_le_bytes)
    }

    pub fn u32_le(&mut self) -> Option<u32> {
        self.array().map(u32::from_le_bytes)
    }

    /// Ordinary big-endian u32: 8 bits per byte.
    pub fn u32_be(&mut self) -> Option<u32> {
        self.array().map(u32::from_be_bytes)
    }

    /// ID3 syncsafe integer: 7 bits per byte, high bit of every byte clear.
    ///
    /// Returns `None` if any byte has its high bit set.
    pub fn syncsafe_u32(&mut self) -> Option<u32> {
        let bytes = self.peek(4)?;
        let value = decode_syncsafe(bytes.try_into().ok()?)?;
        self.pos += 4;
        Some(value)
    }

    fn array<const N: usize>(&mut self) -> Option<[u8; N]> {
        self.take(N)?.try_into().ok()
    }
}

/// Decode a 4-byte syncsafe integer, rejecting bytes with the high bit set.
pub fn decode_syncsafe(bytes: [u8; 4]) -> Option<u32> {
    if bytes.iter().any(|b| b & 0x80 != 0) {
        return None;
    }
    Some(bytes.iter().fold(0u32, |acc, &b| (acc << 7) | u32::from(b)))
}
