use crate::error::{Error, Result};

/// Sector size of the PS1 CD layout. Archive entries and several regions
/// inside sections start on a multiple of it.
pub const SECTOR_SIZE: usize = 2048;

/// Round `n` up to the next multiple of `align` (a power of two).
pub fn round_up(n: usize, align: usize) -> usize {
    (n + align - 1) & !(align - 1)
}

/// Read cursor over a byte slice. All reads are little-endian unless the
/// method name says otherwise.
///
/// Positions are absolute within the backing slice. [`Cursor::bounded`]
/// narrows the readable range without rebasing offsets, so error messages
/// always point into the original buffer.
#[derive(Clone)]
pub struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Current byte position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Length of the readable range.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether we've reached the end.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// Remaining bytes from current position.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Seek to an absolute position.
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// Skip `n` bytes forward.
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.ensure(n)?;
        self.pos += n;
        Ok(())
    }

    /// Step back over `n` bytes that were read speculatively.
    pub fn rewind(&mut self, n: usize) {
        self.pos = self.pos.saturating_sub(n);
    }

    /// Skip forward to the next multiple of `align`.
    pub fn align(&mut self, align: usize) -> Result<()> {
        let target = round_up(self.pos, align);
        self.skip(target - self.pos)
    }

    /// Read a slice of `n` bytes without copying.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.ensure(n)?;
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Read a fixed-size byte array.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    /// Peek at the next `n` bytes without advancing.
    pub fn peek_bytes(&self, n: usize) -> Option<&'a [u8]> {
        self.data.get(self.pos..self.pos.checked_add(n)?)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        let v = self.data[self.pos];
        self.pos += 1;
        Ok(v)
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(i16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    /// Big-endian u32, used by sub-chunk rotation codes.
    pub fn read_u32_be(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    /// Read a u32 element count and widen it.
    pub fn read_count(&mut self) -> Result<usize> {
        Ok(self.read_u32()? as usize)
    }

    /// Capacity to reserve for `n` records of at least `record_size` bytes:
    /// never more than the remaining bytes could hold.
    pub fn capacity_for(&self, n: usize, record_size: usize) -> usize {
        n.min(self.remaining() / record_size.max(1))
    }

    /// Access the readable range (for absolute offset reads).
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Create a cursor positioned at an absolute offset into the same data.
    pub fn at_offset(&self, offset: usize) -> Self {
        Self {
            data: self.data,
            pos: offset,
        }
    }

    /// Copy of this cursor that cannot read at or past `end`.
    pub fn bounded(&self, end: usize) -> Self {
        Self {
            data: &self.data[..end.min(self.data.len())],
            pos: self.pos,
        }
    }

    fn ensure(&self, n: usize) -> Result<()> {
        if self.pos.checked_add(n).is_none_or(|end| end > self.data.len()) {
            return Err(Error::UnexpectedEof {
                offset: self.pos,
                need: n,
                have: self.remaining(),
            });
        }
        Ok(())
    }
}

/// Writer that builds a byte buffer. All writes are little-endian.
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            buf: Vec::with_capacity(cap),
        }
    }

    pub fn position(&self) -> usize {
        self.buf.len()
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn write_u16(&mut self, v: u16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_i16(&mut self, v: i16) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn write_u32_be(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_be_bytes());
    }

    /// Write a length as a u32 count field.
    pub fn write_count(&mut self, n: usize) {
        self.write_u32(n as u32);
    }

    pub fn write_zeros(&mut self, n: usize) {
        self.buf.resize(self.buf.len() + n, 0);
    }

    /// Reserve a u32 to be filled in by [`Writer::patch_u32`].
    pub fn placeholder_u32(&mut self) -> usize {
        let pos = self.position();
        self.write_u32(0);
        pos
    }

    /// Patch a u32 at a specific position (for backpatching sizes).
    pub fn patch_u32(&mut self, pos: usize, v: u32) {
        let bytes = v.to_le_bytes();
        self.buf[pos..pos + 4].copy_from_slice(&bytes);
    }

    /// Zero-pad to the next multiple of `align`.
    pub fn align(&mut self, align: usize) {
        let target = round_up(self.buf.len(), align);
        self.buf.resize(target, 0);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

impl Default for Writer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounded_cursor_keeps_absolute_offsets() {
        let data = [1u8, 0, 0, 0, 2, 0, 0, 0, 3, 0, 0, 0];
        let mut c = Cursor::new(&data);
        c.seek(4);
        let mut body = c.bounded(8);
        assert_eq!(body.read_u32().unwrap(), 2);
        match body.read_u32() {
            Err(Error::UnexpectedEof { offset, need, have }) => {
                assert_eq!((offset, need, have), (8, 4, 0));
            }
            other => panic!("expected eof, got {other:?}"),
        }
    }

    #[test]
    fn capacity_is_clamped_to_remaining_bytes() {
        let data = [0u8; 64];
        let mut c = Cursor::new(&data);
        c.seek(32);
        assert_eq!(c.capacity_for(u32::MAX as usize, 4), 8);
        assert_eq!(c.capacity_for(3, 4), 3);
        assert_eq!(c.capacity_for(100, 0), 32);
        assert!(matches!(
            c.skip(usize::MAX),
            Err(Error::UnexpectedEof { offset: 32, .. })
        ));
    }

    #[test]
    fn align_to_sector() {
        let data = vec![0u8; 4096];
        let mut c = Cursor::new(&data);
        c.seek(1);
        c.align(SECTOR_SIZE).unwrap();
        assert_eq!(c.position(), 2048);
        c.align(SECTOR_SIZE).unwrap();
        assert_eq!(c.position(), 2048);

        let mut w = Writer::new();
        w.write_u8(7);
        w.align(SECTOR_SIZE);
        assert_eq!(w.position(), 2048);
    }

    #[test]
    fn backpatch_size() {
        let mut w = Writer::new();
        let at = w.placeholder_u32();
        w.write_bytes(b"abcdef");
        w.patch_u32(at, (w.position() - at) as u32);
        assert_eq!(w.into_bytes()[..4], 10u32.to_le_bytes());
    }
}
