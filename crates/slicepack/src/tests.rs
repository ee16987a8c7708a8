use crate::*;
use std::f64::consts::PI;

// ============================================================================
//  SCALAR TESTS (Happy Path)
// ============================================================================

#[test]
fn test_bool_roundtrip() -> Result<()> {
    let mut out = OutputStream::new();
    out.write_bool(true);
    out.write_bool(false);

    let bytes = out.finished()?;
    let mut is = InputStream::new(&bytes)?;

    assert!(is.read_bool()?);
    assert!(!is.read_bool()?);
    is.finished()
}

#[test]
fn test_integers_roundtrip() -> Result<()> {
    let mut out = OutputStream::new();
    out.write_byte(u8::MAX);
    out.write_short(i16::MIN);
    out.write_int(i32::MAX);
    out.write_long(i64::MIN);

    let bytes = out.finished()?;
    let mut is = InputStream::new(&bytes)?;

    assert_eq!(is.read_byte()?, u8::MAX);
    assert_eq!(is.read_short()?, i16::MIN);
    assert_eq!(is.read_int()?, i32::MAX);
    assert_eq!(is.read_long()?, i64::MIN);
    is.finished()
}

#[test]
fn test_floats_roundtrip() -> Result<()> {
    let mut out = OutputStream::new();
    out.write_float(3.14159);
    out.write_double(PI);
    out.write_double(f64::MIN_POSITIVE);

    let bytes = out.finished()?;
    let mut is = InputStream::new(&bytes)?;

    assert_eq!(is.read_float()?, 3.14159);
    assert_eq!(is.read_double()?, PI);
    assert_eq!(is.read_double()?, f64::MIN_POSITIVE);
    is.finished()
}

#[test]
fn test_string_and_size() -> Result<()> {
    let mut out = OutputStream::new();
    out.write_size(2)?;
    out.write_string("hello")?;
    out.write_string("🦀")?;

    let bytes = out.finished()?;
    let mut is = InputStream::new(&bytes)?;

    assert_eq!(is.read_size()?, 2);
    assert_eq!(is.read_string()?, "hello");
    assert_eq!(is.read_string()?, "🦀");
    is.finished()
}

#[test]
fn test_empty_stream_is_sealed() -> Result<()> {
    let bytes = OutputStream::new().finished()?;
    assert_eq!(bytes.len(), 7);
    let is = InputStream::new(&bytes)?;
    assert_eq!(is.remaining(), 0);
    is.finished()
}

// ============================================================================
//  SLICES
// ============================================================================

#[test]
fn test_nested_slices() -> Result<()> {
    let mut out = OutputStream::new();
    out.write_string("::Outer")?;
    out.start_slice();
        out.write_int(1);
        out.start_slice();
            out.write_int(2);
        out.end_slice()?;
    out.end_slice()?;
    out.write_int(3);

    let bytes = out.finished()?;
    let mut is = InputStream::new(&bytes)?;

    assert_eq!(is.read_string()?, "::Outer");
    let mut outer = is.slice()?;
    assert_eq!(outer.read_int()?, 1);
    let mut inner = outer.slice()?;
    assert_eq!(inner.read_int()?, 2);
    inner.finished()?;
    outer.finished()?;
    assert_eq!(is.read_int()?, 3);
    is.finished()
}

#[test]
fn test_skip_slice() -> Result<()> {
    let mut out = OutputStream::new();
    out.start_slice();
    out.write_string("unknown payload")?;
    out.write_long(99);
    out.end_slice()?;
    out.write_string("")?;

    let bytes = out.finished()?;
    let mut is = InputStream::new(&bytes)?;

    is.skip_slice()?;
    assert_eq!(is.read_string()?, "");
    is.finished()
}

// ============================================================================
//  FAILURE MODES
// ============================================================================

#[test]
fn test_cannot_seal_open_slice() {
    let mut out = OutputStream::new();
    out.start_slice();
    out.write_int(1);
    assert_eq!(out.open_slices(), 1);
    assert!(matches!(out.finished(), Err(Error::SliceStillOpen)));
}

#[test]
fn test_slice_underflow() {
    let mut out = OutputStream::new();
    assert_eq!(out.end_slice(), Err(Error::SliceUnderflow));
}

#[test]
fn test_tag_mismatch() -> Result<()> {
    let mut out = OutputStream::new();
    out.write_string("not an int")?;
    let bytes = out.finished()?;
    let mut is = InputStream::new(&bytes)?;

    match is.read_int() {
        Err(Error::UnexpectedTag { expected: Tag::Int, found: Tag::String }) => Ok(()),
        other => panic!("Expected tag mismatch, got {:?}", other),
    }
}

#[test]
fn test_trailing_bytes() -> Result<()> {
    let mut out = OutputStream::new();
    out.write_int(1);
    out.write_int(2);
    let bytes = out.finished()?;
    let mut is = InputStream::new(&bytes)?;

    is.read_int()?;
    assert!(matches!(is.finished(), Err(Error::TrailingBytes(_))));
    Ok(())
}

#[test]
fn test_truncated_encapsulation() -> Result<()> {
    let mut out = OutputStream::new();
    out.write_long(7);
    let mut bytes = out.finished()?;
    bytes.pop();

    assert!(matches!(
        InputStream::new(&bytes),
        Err(Error::BadEncapsulation { declared: 9, actual: 8 })
    ));
    Ok(())
}

#[test]
fn test_unknown_version() -> Result<()> {
    let mut bytes = OutputStream::new().finished()?;
    bytes[5] = 9;
    assert!(matches!(
        InputStream::new(&bytes),
        Err(Error::UnsupportedEncoding { major: 9, minor: 0 })
    ));
    Ok(())
}

#[test]
fn test_garbage_is_rejected() {
    assert!(InputStream::new(&[]).is_err());
    assert!(InputStream::new(&[0xFF, 0, 0, 0, 0, 1, 0]).is_err());
}

#[test]
fn test_oversized_count_is_rejected() -> Result<()> {
    let mut out = OutputStream::new();
    out.write_size(1)?;
    let mut bytes = out.finished()?;
    // Rewrite the count to something the buffer cannot possibly hold.
    let at = bytes.len() - 4;
    bytes[at..].copy_from_slice(&u32::MAX.to_le_bytes());

    let mut is = InputStream::new(&bytes)?;
    assert_eq!(is.read_size(), Err(Error::UnexpectedEnd));
    Ok(())
}
