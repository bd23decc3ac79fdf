//! A small, slice-based byte cursor shared by every format decoder.
//!
//! The source material windows a raw `(base, end)` pointer pair and checks
//! `++At >= End` before every read. Here that collapses into bounds checks
//! against a single borrowed slice plus a cursor index.

/// Borrowed window over an in-memory buffer with a movable read cursor.
///
/// No read ever panics: running past the end returns a zeroed value (for the
/// infallible `get_*` family) or `Err` (for the `_err` family), matching the
/// "truncated reads are a recoverable format error, not a crash" rule that
/// every decoder in this workspace must honor.
pub struct ZByteReader<'a> {
    stream: &'a [u8],
    position: usize,
}

impl<'a> ZByteReader<'a> {
    pub const fn new(buf: &'a [u8]) -> ZByteReader<'a> {
        ZByteReader {
            stream: buf,
            position: 0,
        }
    }

    #[inline]
    pub const fn position(&self) -> usize {
        self.position
    }

    #[inline]
    pub fn set_position(&mut self, position: usize) {
        self.position = position;
    }

    #[inline]
    pub fn skip(&mut self, bytes: usize) {
        self.position = self.position.saturating_add(bytes);
    }

    #[inline]
    pub fn rewind(&mut self, bytes: usize) {
        self.position = self.position.saturating_sub(bytes);
    }

    #[inline]
    pub const fn len(&self) -> usize {
        self.stream.len()
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.stream.is_empty()
    }

    /// Number of unread bytes, saturating at zero.
    #[inline]
    pub const fn remaining_bytes(&self) -> usize {
        self.stream.len().saturating_sub(self.position)
    }

    #[inline]
    pub fn has(&self, bytes: usize) -> bool {
        self.remaining_bytes() >= bytes
    }

    #[inline]
    pub const fn eof(&self) -> bool {
        self.position >= self.stream.len()
    }

    /// Peek at the byte `offset` positions ahead of the cursor without
    /// advancing it. Returns 0 past the end.
    #[inline]
    pub fn peek_at(&self, offset: usize) -> u8 {
        *self.stream.get(self.position + offset).unwrap_or(&0)
    }

    #[inline]
    pub fn peek_u8_eof(&self, offset: usize) -> Option<u8> {
        self.stream.get(self.position + offset).copied()
    }

    /// A borrowed slice of `n` bytes at the cursor, advancing past it.
    /// Returns `Err` if that would run past the end.
    pub fn get_as_ref(&mut self, n: usize) -> Result<&'a [u8], &'static str> {
        let slice = self
            .stream
            .get(self.position..self.position + n)
            .ok_or("Not enough bytes in buffer")?;
        self.position += n;
        Ok(slice)
    }

    /// Remaining unread bytes as a slice, cursor left untouched.
    pub fn remaining_slice(&self) -> &'a [u8] {
        &self.stream[self.position.min(self.stream.len())..]
    }

    #[inline]
    pub fn get_u8(&mut self) -> u8 {
        let byte = self.peek_at(0);
        self.position += 1;
        byte
    }

    pub fn get_u8_err(&mut self) -> Result<u8, &'static str> {
        let byte = *self.stream.get(self.position).ok_or("No more bytes")?;
        self.position += 1;
        Ok(byte)
    }
}

macro_rules! get_multi_byte {
    ($name_be:ident, $name_le:ident, $name_be_err:ident, $name_le_err:ident, $int_type:ty) => {
        impl<'a> ZByteReader<'a> {
            #[inline]
            pub fn $name_be(&mut self) -> $int_type {
                self.$name_be_err().unwrap_or(0)
            }

            #[inline]
            pub fn $name_le(&mut self) -> $int_type {
                self.$name_le_err().unwrap_or(0)
            }

            pub fn $name_be_err(&mut self) -> Result<$int_type, &'static str> {
                const SIZE: usize = core::mem::size_of::<$int_type>();
                let slice = self.get_as_ref(SIZE)?;
                let mut space = [0u8; SIZE];
                space.copy_from_slice(slice);
                Ok(<$int_type>::from_be_bytes(space))
            }

            pub fn $name_le_err(&mut self) -> Result<$int_type, &'static str> {
                const SIZE: usize = core::mem::size_of::<$int_type>();
                let slice = self.get_as_ref(SIZE)?;
                let mut space = [0u8; SIZE];
                space.copy_from_slice(slice);
                Ok(<$int_type>::from_le_bytes(space))
            }
        }
    };
}

get_multi_byte!(get_u16_be, get_u16_le, get_u16_be_err, get_u16_le_err, u16);
get_multi_byte!(get_u32_be, get_u32_le, get_u32_be_err, get_u32_le_err, u32);
get_multi_byte!(get_u64_be, get_u64_le, get_u64_be_err, get_u64_le_err, u64);
