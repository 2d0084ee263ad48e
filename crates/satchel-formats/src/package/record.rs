//! Asset record framing.
//!
//! Each record is an outer head naming the asset and its type, followed by
//! the payload. Every payload opens with the same sub-header before any
//! variant data:
//!
//! | Field       | Type   | Notes |
//! |-------------|--------|-------|
//! | magic       | string | `"SAST"` |
//! | version     | u32    | asset schema version |
//! | name        | string | repeats the record name |
//! | source path | string | originally imported file, may be empty |
//!
//! The sub-header lets a payload be understood on its own when a record is
//! reached through the offset table rather than a sequential scan.

use crate::error::{FormatError, Result};
use crate::wire;
use std::io::{Read, Write};

/// Magic string opening every asset payload.
pub const ASSET_MAGIC: &str = "SAST";

/// Outer framing of an asset record: what the container needs to route
/// the payload to a deserializer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHead {
    /// Asset name, unique within the package.
    pub name: String,
    /// Type tag selecting the deserializer.
    pub type_tag: String,
}

impl RecordHead {
    /// Create a record head.
    pub fn new(name: impl Into<String>, type_tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_tag: type_tag.into(),
        }
    }

    /// Read a record head at the current stream position.
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let name = wire::read_string(reader)?;
        let type_tag = wire::read_string(reader)?;
        Ok(Self { name, type_tag })
    }

    /// Write the record head.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        wire::write_string(writer, &self.name)?;
        wire::write_string(writer, &self.type_tag)?;
        Ok(())
    }
}

/// Common sub-header at the start of every asset payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadHeader {
    /// Schema version the payload was serialized with.
    pub version: u32,
    /// Asset name, repeated from the record head.
    pub name: String,
    /// Path of the originally imported file, if one was recorded.
    pub source_path: Option<String>,
}

impl PayloadHeader {
    /// Create a payload sub-header.
    pub fn new(version: u32, name: impl Into<String>, source_path: Option<String>) -> Self {
        Self {
            version,
            name: name.into(),
            source_path,
        }
    }

    /// Read and validate a payload sub-header.
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let magic = wire::read_string(reader)?;
        if magic != ASSET_MAGIC {
            return Err(FormatError::BadMagic {
                expected: ASSET_MAGIC,
                found: magic,
            });
        }

        let version = wire::read_u32(reader)?;
        let name = wire::read_string(reader)?;
        let source_path = wire::read_string(reader)?;

        Ok(Self {
            version,
            name,
            source_path: (!source_path.is_empty()).then_some(source_path),
        })
    }

    /// Write the payload sub-header. An absent source path goes out as
    /// the empty string.
    pub fn write<W: Write + ?Sized>(&self, writer: &mut W) -> Result<()> {
        wire::write_string(writer, ASSET_MAGIC)?;
        wire::write_u32(writer, self.version)?;
        wire::write_string(writer, &self.name)?;
        wire::write_string(writer, self.source_path.as_deref().unwrap_or(""))?;
        Ok(())
    }
}
