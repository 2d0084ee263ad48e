//! Wire primitives shared by every package structure.
//!
//! All integers in a package file are `u32` little-endian. Strings are
//! length-prefixed: a `u32` byte count followed by that many UTF-8 bytes.

use crate::error::{FormatError, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Read, Write};

/// Upper bound on the byte length of any wire string.
///
/// Names and type tags are short. A length prefix above this limit means
/// the reader has lost sync with the record stream, so it is rejected
/// before the allocation rather than after.
pub const MAX_STRING_LEN: u32 = 64 * 1024;

/// Write a `u32` in little-endian order.
pub fn write_u32<W: Write + ?Sized>(writer: &mut W, value: u32) -> Result<()> {
    writer.write_u32::<LittleEndian>(value)?;
    Ok(())
}

/// Read a `u32` in little-endian order.
pub fn read_u32<R: Read>(reader: &mut R) -> Result<u32> {
    Ok(reader.read_u32::<LittleEndian>()?)
}

/// Write a length-prefixed UTF-8 string.
pub fn write_string<W: Write + ?Sized>(writer: &mut W, value: &str) -> Result<()> {
    let len = u32::try_from(value.len())
        .ok()
        .filter(|len| *len <= MAX_STRING_LEN)
        .ok_or_else(|| {
            FormatError::InvalidString(format!(
                "string of {} bytes exceeds the {MAX_STRING_LEN} byte limit",
                value.len()
            ))
        })?;

    writer.write_u32::<LittleEndian>(len)?;
    writer.write_all(value.as_bytes())?;
    Ok(())
}

/// Read a length-prefixed UTF-8 string.
pub fn read_string<R: Read>(reader: &mut R) -> Result<String> {
    let len = reader.read_u32::<LittleEndian>()?;
    if len > MAX_STRING_LEN {
        return Err(FormatError::InvalidString(format!(
            "length prefix {len} exceeds the {MAX_STRING_LEN} byte limit"
        )));
    }

    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|e| FormatError::InvalidString(format!("invalid UTF-8: {e}")))
}
