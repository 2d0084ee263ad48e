//! Offset table: the seek index at the end of every package file.
//!
//! The table maps asset names to the file position of their record head,
//! one `(name, offset: u32)` pair per asset, preserved in file order.
//! Record recovery leans on that ordering: when a record fails to parse,
//! the scan resynchronizes at the next entry's offset.

use crate::error::{FormatError, Result};
use crate::wire;
use std::io::{Read, Write};

/// Preallocation cap for table reads. A corrupt asset count past this
/// still parses entry by entry; it just cannot force a giant allocation
/// up front.
const MAX_PREALLOC_ENTRIES: u32 = 4096;

/// A single offset table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OffsetEntry {
    /// Asset name.
    pub name: String,
    /// File position of the asset's record head.
    pub offset: u64,
}

impl OffsetEntry {
    /// Create an entry.
    pub fn new(name: impl Into<String>, offset: u64) -> Self {
        Self {
            name: name.into(),
            offset,
        }
    }
}

/// Read `count` entries in file order.
pub fn read_offset_table<R: Read>(reader: &mut R, count: u32) -> Result<Vec<OffsetEntry>> {
    let mut entries = Vec::with_capacity(count.min(MAX_PREALLOC_ENTRIES) as usize);
    for _ in 0..count {
        let name = wire::read_string(reader)?;
        let offset = u64::from(wire::read_u32(reader)?);
        entries.push(OffsetEntry { name, offset });
    }
    Ok(entries)
}

/// Write entries in the order given.
///
/// Offsets are stored as `u32` on the wire; an entry past 4 GiB fails
/// with [`FormatError::OffsetOverflow`].
pub fn write_offset_table<W: Write>(writer: &mut W, entries: &[OffsetEntry]) -> Result<()> {
    for entry in entries {
        wire::write_string(writer, &entry.name)?;
        let offset =
            u32::try_from(entry.offset).map_err(|_| FormatError::OffsetOverflow(entry.offset))?;
        wire::write_u32(writer, offset)?;
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_offset_table_round_trip_preserves_order() {
        let entries = vec![
            OffsetEntry::new("C.mesh", 300),
            OffsetEntry::new("A.mesh", 20),
            OffsetEntry::new("B.mesh", 150),
        ];

        let mut buf = Vec::new();
        write_offset_table(&mut buf, &entries).expect("write");

        let parsed = read_offset_table(&mut Cursor::new(buf), 3).expect("read");
        assert_eq!(parsed, entries);
    }

    #[test]
    fn test_empty_table_round_trip() {
        let mut buf = Vec::new();
        write_offset_table(&mut buf, &[]).expect("write");
        assert!(buf.is_empty());

        let parsed = read_offset_table(&mut Cursor::new(buf), 0).expect("read");
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_offset_past_u32_rejected() {
        let entries = vec![OffsetEntry::new("huge", u64::from(u32::MAX) + 1)];

        let mut buf = Vec::new();
        let err = write_offset_table(&mut buf, &entries).expect_err("should reject");
        assert!(matches!(err, FormatError::OffsetOverflow(_)));
    }
}
