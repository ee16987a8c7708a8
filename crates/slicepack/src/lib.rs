//! # Slicepack
//!
//! The byte stream underneath slicerpc requests and replies.
//!
//! ## Philosophy
//!
//! - **Tagged**: every value carries a one-byte tag, so a reader expecting an
//!   `int` never silently consumes a `string`.
//! - **Sliced**: members of one level of a class or exception hierarchy are
//!   written into a length-prefixed slice, so a reader that does not know a
//!   type id can skip straight past it.
//! - **Sealed**: a stream only becomes bytes through `finished()`, which
//!   refuses open slices and stamps the encapsulation header. Readers check
//!   the header on the way in and leftover bytes on the way out.
//!
//! ## Format
//!
//! - **Encapsulation**: `[Tag: 1b][Len: 4b][Major: 1b][Minor: 1b][Body: Len]`
//! - **Scalars**: `[Tag: 1b][Data: N]`
//! - **Strings**: `[Tag: 1b][Len: 4b][UTF-8: Len]`
//! - **Slices**: `[Tag: 1b][Len: 4b][Body: Len]`
//!
//! All integers are Little-Endian.

#[cfg(test)]
mod tests;

/// The encoding version stamped into every encapsulation header.
pub const ENCODING_VERSION: (u8, u8) = (1, 0);

/// Size of the encapsulation header in bytes.
const HEADER_LEN: usize = 7;

/// Slicepack stream errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Byte does not correspond to a valid `Tag`.
    InvalidTag(u8),
    /// A valid tag was found where a different one was expected.
    UnexpectedTag { expected: Tag, found: Tag },
    /// String data is not valid UTF-8.
    InvalidUtf8,
    /// Buffer exhausted while reading.
    UnexpectedEnd,
    /// Attempted to close a slice when none is open.
    SliceUnderflow,
    /// Attempted to seal the stream with open slices.
    SliceStillOpen,
    /// Blob, slice, or size exceeds `u32::MAX`.
    TooLarge(usize),
    /// The encapsulation header names a version this reader does not speak.
    UnsupportedEncoding { major: u8, minor: u8 },
    /// The encapsulation length disagrees with the bytes actually present.
    BadEncapsulation { declared: usize, actual: usize },
    /// A sealed stream was not fully consumed.
    TrailingBytes(usize),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidTag(b) => write!(f, "invalid tag byte: {:#04x}", b),
            Error::UnexpectedTag { expected, found } => {
                write!(f, "unexpected tag: expected {:?}, found {:?}", expected, found)
            }
            Error::UnsupportedEncoding { major, minor } => {
                write!(f, "unsupported encoding version {}.{}", major, minor)
            }
            Error::BadEncapsulation { declared, actual } => {
                write!(f, "encapsulation declares {} bytes but {} are present", declared, actual)
            }
            Error::TrailingBytes(n) => write!(f, "{} unread bytes left in sealed stream", n),
            _ => write!(f, "{:?}", self),
        }
    }
}

impl std::error::Error for Error {}

/// Specialized `Result` for slicepack operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Identifies the type of the encoded value.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    BoolTrue = 0x01,
    BoolFalse = 0x02,
    Byte = 0x03,
    Short = 0x04,
    Int = 0x05,
    Long = 0x06,
    Float = 0x07,
    Double = 0x08,
    /// Element counts and instance indices.
    Size = 0x09,

    /// `Tag + u32 Len + UTF-8`
    String = 0x10,

    /// `Tag + u32 Len + Body`
    Slice = 0x20,

    /// `Tag + u32 Len + Version + Body`, only ever at offset 0.
    Encaps = 0x30,
}

impl Tag {
    /// Returns the Tag variant for a given byte, or `None` if invalid.
    pub fn from_u8(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Tag::BoolTrue),
            0x02 => Some(Tag::BoolFalse),
            0x03 => Some(Tag::Byte),
            0x04 => Some(Tag::Short),
            0x05 => Some(Tag::Int),
            0x06 => Some(Tag::Long),
            0x07 => Some(Tag::Float),
            0x08 => Some(Tag::Double),
            0x09 => Some(Tag::Size),
            0x10 => Some(Tag::String),
            0x20 => Some(Tag::Slice),
            0x30 => Some(Tag::Encaps),
            _ => None,
        }
    }
}

// ============================================================================
//  OUTPUT
// ============================================================================

/// A growing, not-yet-sealed byte stream.
///
/// The stream keeps a stack of open slice offsets and back-patches each
/// slice length when it closes. The encapsulation header is reserved up
/// front and patched by `finished()`.
pub struct OutputStream {
    buf: Vec<u8>,
    /// Body start offsets of the currently open slices.
    slices: Vec<usize>,
}

impl OutputStream {
    /// Creates an empty stream with the encapsulation header reserved.
    pub fn new() -> Self {
        let mut buf = Vec::with_capacity(256);
        buf.push(Tag::Encaps as u8);
        buf.extend_from_slice(&[0, 0, 0, 0]);
        buf.push(ENCODING_VERSION.0);
        buf.push(ENCODING_VERSION.1);
        Self { buf, slices: Vec::with_capacity(4) }
    }

    /// Number of body bytes written so far.
    pub fn len(&self) -> usize {
        self.buf.len() - HEADER_LEN
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Depth of currently open slices.
    pub fn open_slices(&self) -> usize {
        self.slices.len()
    }

    /// Seals the stream and returns its bytes.
    ///
    /// # Errors
    /// Returns `Error::SliceStillOpen` if a slice was begun but never ended.
    pub fn finished(mut self) -> Result<Vec<u8>> {
        if !self.slices.is_empty() {
            return Err(Error::SliceStillOpen);
        }
        let body_len = self.len();
        let len = u32::try_from(body_len).map_err(|_| Error::TooLarge(body_len))?;
        self.buf[1..5].copy_from_slice(&len.to_le_bytes());
        Ok(self.buf)
    }

    fn tag(&mut self, tag: Tag) {
        self.buf.push(tag as u8);
    }

    fn raw_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Encodes a boolean value.
    pub fn write_bool(&mut self, v: bool) {
        self.tag(if v { Tag::BoolTrue } else { Tag::BoolFalse });
    }

    /// Encodes an unsigned 8-bit integer.
    pub fn write_byte(&mut self, v: u8) { self.tag(Tag::Byte); self.buf.push(v); }
    /// Encodes a signed 16-bit integer (LE).
    pub fn write_short(&mut self, v: i16) { self.tag(Tag::Short); self.buf.extend_from_slice(&v.to_le_bytes()); }
    /// Encodes a signed 32-bit integer (LE).
    pub fn write_int(&mut self, v: i32) { self.tag(Tag::Int); self.buf.extend_from_slice(&v.to_le_bytes()); }
    /// Encodes a signed 64-bit integer (LE).
    pub fn write_long(&mut self, v: i64) { self.tag(Tag::Long); self.buf.extend_from_slice(&v.to_le_bytes()); }
    /// Encodes a 32-bit float (LE).
    pub fn write_float(&mut self, v: f32) { self.tag(Tag::Float); self.buf.extend_from_slice(&v.to_le_bytes()); }
    /// Encodes a 64-bit float (LE).
    pub fn write_double(&mut self, v: f64) { self.tag(Tag::Double); self.buf.extend_from_slice(&v.to_le_bytes()); }

    /// Encodes an element count or instance index.
    pub fn write_size(&mut self, n: usize) -> Result<()> {
        let n = u32::try_from(n).map_err(|_| Error::TooLarge(n))?;
        self.tag(Tag::Size);
        self.raw_u32(n);
        Ok(())
    }

    /// Encodes a UTF-8 string.
    pub fn write_string(&mut self, v: &str) -> Result<()> {
        let len = u32::try_from(v.len()).map_err(|_| Error::TooLarge(v.len()))?;
        self.tag(Tag::String);
        self.raw_u32(len);
        self.buf.extend_from_slice(v.as_bytes());
        Ok(())
    }

    /// Begins a slice.
    ///
    /// # Invariants
    /// - Must be closed via `end_slice()` before `finished()`.
    /// - Slices nest; each `end_slice()` closes the innermost one.
    pub fn start_slice(&mut self) {
        self.tag(Tag::Slice);
        self.buf.extend_from_slice(&[0, 0, 0, 0]); // Length placeholder
        self.slices.push(self.buf.len());
    }

    /// Ends the innermost open slice and patches its length.
    pub fn end_slice(&mut self) -> Result<()> {
        let start = self.slices.pop().ok_or(Error::SliceUnderflow)?;
        let body_len = self.buf.len() - start;
        let len = u32::try_from(body_len).map_err(|_| Error::TooLarge(body_len))?;
        self.buf[start - 4..start].copy_from_slice(&len.to_le_bytes());
        Ok(())
    }
}

impl Default for OutputStream {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
//  INPUT
// ============================================================================

/// A zero-copy, bounds-checked reader over a sealed stream.
///
/// Reading advances the internal cursor. `slice()` returns a new stream
/// restricted to the slice body.
///
/// # Errors
/// All read operations return `Error::UnexpectedEnd` if the buffer is exhausted.
#[derive(Debug, Clone)]
pub struct InputStream<'a> {
    buf: &'a [u8],
}

impl<'a> InputStream<'a> {
    /// Opens a sealed stream, checking the encapsulation header.
    pub fn new(bytes: &'a [u8]) -> Result<Self> {
        let mut outer = Self { buf: bytes };
        outer.expect_tag(Tag::Encaps)?;
        let declared = outer.read_len()?;
        let major = outer.read_u8()?;
        let minor = outer.read_u8()?;
        if (major, minor) != ENCODING_VERSION {
            return Err(Error::UnsupportedEncoding { major, minor });
        }
        if declared != outer.buf.len() {
            return Err(Error::BadEncapsulation { declared, actual: outer.buf.len() });
        }
        Ok(outer)
    }

    /// Returns the remaining bytes in the view.
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    /// Checks that every byte of the view has been consumed.
    pub fn finished(&self) -> Result<()> {
        if self.buf.is_empty() {
            Ok(())
        } else {
            Err(Error::TrailingBytes(self.buf.len()))
        }
    }

    /// Peeks the next Tag without advancing.
    pub fn peek_tag(&self) -> Result<Tag> {
        let b = *self.buf.first().ok_or(Error::UnexpectedEnd)?;
        Tag::from_u8(b).ok_or(Error::InvalidTag(b))
    }

    fn read_u8(&mut self) -> Result<u8> {
        let (b, rest) = self.buf.split_first().ok_or(Error::UnexpectedEnd)?;
        self.buf = rest;
        Ok(*b)
    }

    fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if n > self.buf.len() {
            return Err(Error::UnexpectedEnd);
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn read_len(&mut self) -> Result<usize> {
        Ok(u32::from_le_bytes(self.read_array()?) as usize)
    }

    fn expect_tag(&mut self, expected: Tag) -> Result<()> {
        let found = self.peek_tag()?;
        if found != expected {
            return Err(Error::UnexpectedTag { expected, found });
        }
        self.buf = &self.buf[1..];
        Ok(())
    }

    /// Decodes a bool.
    pub fn read_bool(&mut self) -> Result<bool> {
        match self.peek_tag()? {
            Tag::BoolTrue => { self.read_u8()?; Ok(true) },
            Tag::BoolFalse => { self.read_u8()?; Ok(false) },
            found => Err(Error::UnexpectedTag { expected: Tag::BoolTrue, found }),
        }
    }

    /// Decodes an unsigned 8-bit integer.
    pub fn read_byte(&mut self) -> Result<u8> { self.expect_tag(Tag::Byte)?; self.read_u8() }
    /// Decodes a signed 16-bit integer (LE).
    pub fn read_short(&mut self) -> Result<i16> { self.expect_tag(Tag::Short)?; Ok(i16::from_le_bytes(self.read_array()?)) }
    /// Decodes a signed 32-bit integer (LE).
    pub fn read_int(&mut self) -> Result<i32> { self.expect_tag(Tag::Int)?; Ok(i32::from_le_bytes(self.read_array()?)) }
    /// Decodes a signed 64-bit integer (LE).
    pub fn read_long(&mut self) -> Result<i64> { self.expect_tag(Tag::Long)?; Ok(i64::from_le_bytes(self.read_array()?)) }
    /// Decodes a 32-bit float (LE).
    pub fn read_float(&mut self) -> Result<f32> { self.expect_tag(Tag::Float)?; Ok(f32::from_le_bytes(self.read_array()?)) }
    /// Decodes a 64-bit float (LE).
    pub fn read_double(&mut self) -> Result<f64> { self.expect_tag(Tag::Double)?; Ok(f64::from_le_bytes(self.read_array()?)) }

    /// Decodes an element count.
    ///
    /// Every element occupies at least one byte, so a count larger than the
    /// remaining view is rejected before anyone allocates for it.
    pub fn read_size(&mut self) -> Result<usize> {
        self.expect_tag(Tag::Size)?;
        let n = self.read_len()?;
        if n > self.buf.len() {
            return Err(Error::UnexpectedEnd);
        }
        Ok(n)
    }

    /// Decodes an instance index. Unlike `read_size`, not bounded by the view.
    pub fn read_index(&mut self) -> Result<usize> {
        self.expect_tag(Tag::Size)?;
        self.read_len()
    }

    /// Decodes a string slice (UTF-8).
    pub fn read_string(&mut self) -> Result<&'a str> {
        self.expect_tag(Tag::String)?;
        let len = self.read_len()?;
        let bytes = self.read_bytes(len)?;
        std::str::from_utf8(bytes).map_err(|_| Error::InvalidUtf8)
    }

    /// Enters the next slice, returning a view restricted to its body.
    pub fn slice(&mut self) -> Result<InputStream<'a>> {
        self.expect_tag(Tag::Slice)?;
        let len = self.read_len()?;
        Ok(InputStream { buf: self.read_bytes(len)? })
    }

    /// Skips the next slice without interpreting it.
    pub fn skip_slice(&mut self) -> Result<()> {
        self.slice().map(|_| ())
    }
}
