//! Package file header.
//!
//! Layout (strings length-prefixed, integers u32 LE):
//!
//! | Offset | Field          | Type   | Notes |
//! |--------|----------------|--------|-------|
//! | 0      | magic          | string | `"SPAK"` |
//! | 8      | version        | u32    | container format revision |
//! | 12     | `asset_count`  | u32    | records in the file |
//! | 16     | `table_offset` | u32    | file position of the offset table |
//!
//! `table_offset` is written as a zero placeholder when a save begins and
//! patched in once every record is on disk and the table position is known.

use crate::error::{FormatError, Result};
use crate::wire;
use std::io::{Read, Write};

/// Magic string opening every package file.
pub const PACKAGE_MAGIC: &str = "SPAK";

/// Current container format revision.
pub const FORMAT_VERSION: u32 = 1;

/// Encoded header length: magic string (4 + 4) + three u32 fields.
pub const HEADER_LEN: u64 = 20;

/// Byte position of the `table_offset` field, the back-patch target.
pub const TABLE_OFFSET_FIELD_POS: u64 = 16;

/// Parsed package file header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageHeader {
    /// Format revision the file was written with.
    pub version: u32,
    /// Number of asset records in the file.
    pub asset_count: u32,
    /// File position of the offset table.
    pub table_offset: u32,
}

impl PackageHeader {
    /// Create a header stamped with the current format revision.
    pub const fn new(asset_count: u32, table_offset: u32) -> Self {
        Self {
            version: FORMAT_VERSION,
            asset_count,
            table_offset,
        }
    }

    /// Read and validate a header from the start of a package stream.
    ///
    /// Rejects files written by a newer format revision; older revisions
    /// are accepted and handled by the record parsers.
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let magic = wire::read_string(reader)?;
        if magic != PACKAGE_MAGIC {
            return Err(FormatError::BadMagic {
                expected: PACKAGE_MAGIC,
                found: magic,
            });
        }

        let version = wire::read_u32(reader)?;
        if version > FORMAT_VERSION {
            return Err(FormatError::UnsupportedVersion {
                found: version,
                max: FORMAT_VERSION,
            });
        }

        let asset_count = wire::read_u32(reader)?;
        let table_offset = wire::read_u32(reader)?;

        Ok(Self {
            version,
            asset_count,
            table_offset,
        })
    }

    /// Write the header.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        wire::write_string(writer, PACKAGE_MAGIC)?;
        wire::write_u32(writer, self.version)?;
        wire::write_u32(writer, self.asset_count)?;
        wire::write_u32(writer, self.table_offset)?;
        Ok(())
    }
}
