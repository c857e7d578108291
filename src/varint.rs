//! Variable-length integer coding over a byte stream: unsigned LEB128-style
//! varints and zigzag-encoded signed varints, following the same 7-bit,
//! MSB-continuation shape used by `V2Serializer::varint_write` in
//! `other_examples/.../HdrHistogram_rust__src-serialization-v2_serializer.rs`,
//! adapted here to read/write through `std::io::{Read, Write}` rather than
//! directly into a pre-sized slice.

use std::io::{Read, Write};

use crate::error::{Error, Result};

/// Writes `value` as an unsigned varint: 7 bits per byte, least-significant
/// group first, continuation signalled by the top bit. Up to 5 bytes for
/// any `u32`-range value, up to 10 bytes for a full `u64`.
pub fn write_unsigned_varint<W: Write>(writer: &mut W, mut value: u64) -> Result<()> {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            writer.write_all(&[byte])?;
            return Ok(());
        }
        writer.write_all(&[byte | 0x80])?;
    }
}

/// Reads an unsigned varint previously written by
/// [`write_unsigned_varint`]. Fails with [`Error::MalformedData`] if the
/// stream is truncated or the encoded value needs more than 10 bytes (i.e.
/// would overflow `u64`).
pub fn read_unsigned_varint<R: Read>(reader: &mut R) -> Result<u64> {
    let mut result: u64 = 0;
    let mut shift: u32 = 0;
    let mut byte = [0u8; 1];
    loop {
        if shift >= 64 {
            return Err(Error::MalformedData(
                "varint is longer than 10 bytes".to_string(),
            ));
        }
        reader.read_exact(&mut byte).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                Error::MalformedData("unexpected end of stream while reading varint".to_string())
            } else {
                Error::Io(e)
            }
        })?;
        let b = byte[0];
        result |= u64::from(b & 0x7f) << shift;
        if b & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
    }
}

/// Zigzag-encodes a signed value so that small-magnitude values (positive
/// or negative) stay small after mapping to an unsigned varint:
/// `0, -1, 1, -2, 2, ...` maps to `0, 1, 2, 3, 4, ...`.
#[inline]
pub fn zigzag_encode(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

/// Inverse of [`zigzag_encode`].
#[inline]
pub fn zigzag_decode(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

/// Writes a signed varint using zigzag encoding.
pub fn write_signed_varint<W: Write>(writer: &mut W, value: i64) -> Result<()> {
    write_unsigned_varint(writer, zigzag_encode(value))
}

/// Reads a signed varint written by [`write_signed_varint`].
pub fn read_signed_varint<R: Read>(reader: &mut R) -> Result<i64> {
    Ok(zigzag_decode(read_unsigned_varint(reader)?))
}
