//! Binary codec primitives
//!
//! Every multi-byte value on the wire is little-endian: 32-bit signed
//! integers and IEEE-754 single-precision floats occupy four bytes each.
//! Text travels as a one-byte length (0-255) followed by that many Latin-1
//! bytes.
//!
//! The VR client applies the same fixed byte order on its side, so every
//! value must round-trip exactly through these helpers.

use crate::error::{Error, Result};
use std::io::{Read, Write};

/// Write a 32-bit signed integer, little-endian.
pub fn write_i32<W: Write>(w: &mut W, value: i32) -> Result<()> {
    w.write_all(&value.to_le_bytes())?;
    Ok(())
}

/// Write a 32-bit float, little-endian byte order of the IEEE-754 encoding.
pub fn write_f32<W: Write>(w: &mut W, value: f32) -> Result<()> {
    w.write_all(&value.to_le_bytes())?;
    Ok(())
}

/// Read a 32-bit signed integer, little-endian.
pub fn read_i32<R: Read>(r: &mut R) -> Result<i32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(i32::from_le_bytes(buf))
}

/// Read a 32-bit float, little-endian.
pub fn read_f32<R: Read>(r: &mut R) -> Result<f32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(f32::from_le_bytes(buf))
}

/// Read a single byte belonging to the named wire field.
///
/// End of stream is reported as [`Error::StreamClosed`] carrying `field`, so
/// the fault log says which part of a command body was cut short.
pub fn read_u8<R: Read>(r: &mut R, field: &'static str) -> Result<u8> {
    let mut buf = [0u8; 1];
    r.read_exact(&mut buf)
        .map_err(|e| stream_closed(e, field))?;
    Ok(buf[0])
}

/// Read exactly `buf.len()` bytes belonging to the named wire field.
pub fn read_exact<R: Read>(r: &mut R, buf: &mut [u8], field: &'static str) -> Result<()> {
    r.read_exact(buf).map_err(|e| stream_closed(e, field))?;
    Ok(())
}

fn stream_closed(e: std::io::Error, field: &'static str) -> Error {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        Error::StreamClosed { field }
    } else {
        Error::Io(e)
    }
}

/// Write a length-prefixed Latin-1 string.
///
/// Characters outside Latin-1 are transported as `?`. Strings longer than
/// 255 encoded bytes do not fit the one-byte prefix and are rejected.
pub fn write_len_string<W: Write>(w: &mut W, text: &str) -> Result<()> {
    let bytes = encode_latin1(text);
    if bytes.len() > 255 {
        return Err(Error::StringTooLong(bytes.len()));
    }
    w.write_all(&[bytes.len() as u8])?;
    w.write_all(&bytes)?;
    w.flush()?;
    Ok(())
}

/// Read a length-prefixed Latin-1 string belonging to the named wire field.
pub fn read_len_string<R: Read>(r: &mut R, field: &'static str) -> Result<String> {
    let len = read_u8(r, field)? as usize;
    let mut bytes = vec![0u8; len];
    read_exact(r, &mut bytes, field)?;
    Ok(decode_latin1(&bytes))
}

/// Encode text as Latin-1, mapping unrepresentable characters to `?`.
pub fn encode_latin1(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| if (c as u32) <= 0xFF { c as u8 } else { b'?' })
        .collect()
}

/// Decode Latin-1 bytes into a string.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn int_round_trip_is_exact() {
        for value in [0, 1, -1, 100, -100, 0x7FFF_FFFF, i32::MIN, i32::MAX] {
            let mut buf = Vec::new();
            write_i32(&mut buf, value).unwrap();
            assert_eq!(buf.len(), 4);
            assert_eq!(read_i32(&mut Cursor::new(&buf)).unwrap(), value);
        }
    }

    #[test]
    fn int_wire_order_is_little_endian() {
        let mut buf = Vec::new();
        write_i32(&mut buf, 0x0102_0304).unwrap();
        assert_eq!(buf, [0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn float_round_trip_is_bit_exact() {
        let values = [
            0.0f32,
            -0.0,
            1.5,
            -123.456,
            f32::MIN_POSITIVE,
            f32::MAX,
            f32::INFINITY,
            f32::NEG_INFINITY,
            f32::NAN,
            f32::from_bits(0x7FC0_1234), // NaN with payload bits
        ];
        for value in values {
            let mut buf = Vec::new();
            write_f32(&mut buf, value).unwrap();
            let back = read_f32(&mut Cursor::new(&buf)).unwrap();
            assert_eq!(back.to_bits(), value.to_bits());
        }
    }

    #[test]
    fn len_string_round_trip() {
        let mut buf = Vec::new();
        write_len_string(&mut buf, "Test App").unwrap();
        assert_eq!(buf[0], 8);
        let back = read_len_string(&mut Cursor::new(&buf), "title").unwrap();
        assert_eq!(back, "Test App");
    }

    #[test]
    fn empty_string_is_a_single_zero_byte() {
        let mut buf = Vec::new();
        write_len_string(&mut buf, "").unwrap();
        assert_eq!(buf, [0]);
        let back = read_len_string(&mut Cursor::new(&buf), "title").unwrap();
        assert_eq!(back, "");
    }

    #[test]
    fn non_latin1_characters_become_question_marks() {
        assert_eq!(encode_latin1("a\u{00E9}\u{4E16}"), vec![b'a', 0xE9, b'?']);
        assert_eq!(decode_latin1(&[b'a', 0xE9]), "a\u{00E9}");
    }

    #[test]
    fn oversized_string_is_rejected() {
        let text = "x".repeat(256);
        let mut buf = Vec::new();
        match write_len_string(&mut buf, &text) {
            Err(Error::StringTooLong(256)) => {}
            other => panic!("expected StringTooLong, got {other:?}"),
        }
    }

    #[test]
    fn truncated_string_reports_the_field() {
        // Length byte promises 10 bytes, only 3 arrive.
        let bytes = [10u8, b'a', b'b', b'c'];
        match read_len_string(&mut Cursor::new(&bytes), "session id") {
            Err(Error::StreamClosed { field: "session id" }) => {}
            other => panic!("expected StreamClosed, got {other:?}"),
        }
    }
}
