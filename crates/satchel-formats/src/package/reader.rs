//! Package stream opening and navigation.

use crate::error::{FormatError, Result};
use crate::package::header::PackageHeader;
use crate::package::table::{OffsetEntry, read_offset_table};
use crate::source::{ByteSource, SourceReader};
use std::io::{Seek, SeekFrom};
use tracing::debug;

/// An opened package stream with header and offset table parsed.
///
/// Opening reads the header, remembers where the records begin, jumps to
/// the offset table and reads it. The stream is then left wherever the
/// table ended; callers position it with [`seek_to`](Self::seek_to)
/// before parsing records.
#[derive(Debug)]
pub struct PackageReader {
    reader: SourceReader,
    header: PackageHeader,
    records_start: u64,
    entries: Vec<OffsetEntry>,
}

impl PackageReader {
    /// Open a source and parse its header and offset table.
    pub fn open(source: &ByteSource) -> Result<Self> {
        let mut reader = source.open()?;

        let header = PackageHeader::read(&mut reader)?;
        let records_start = reader.stream_position()?;

        if u64::from(header.table_offset) < records_start {
            return Err(FormatError::InvalidFormat(format!(
                "offset table position {} lies inside the header",
                header.table_offset
            )));
        }

        reader.seek(SeekFrom::Start(u64::from(header.table_offset)))?;
        let entries = read_offset_table(&mut reader, header.asset_count)?;

        debug!(
            "opened package {}: version {}, {} assets, table at {}",
            source.describe(),
            header.version,
            header.asset_count,
            header.table_offset
        );

        Ok(Self {
            reader,
            header,
            records_start,
            entries,
        })
    }

    /// Parsed file header.
    pub const fn header(&self) -> &PackageHeader {
        &self.header
    }

    /// File position of the first asset record.
    pub const fn records_start(&self) -> u64 {
        self.records_start
    }

    /// Offset table entries in file order.
    pub fn entries(&self) -> &[OffsetEntry] {
        &self.entries
    }

    /// Take ownership of the offset table, leaving the reader usable
    /// for record scanning.
    pub fn take_entries(&mut self) -> Vec<OffsetEntry> {
        std::mem::take(&mut self.entries)
    }

    /// Seek the stream to an absolute file position.
    pub fn seek_to(&mut self, offset: u64) -> Result<u64> {
        Ok(self.reader.seek(SeekFrom::Start(offset))?)
    }

    /// The underlying stream, for record parsing.
    pub fn stream(&mut self) -> &mut SourceReader {
        &mut self.reader
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::package::record::{PayloadHeader, RecordHead};
    use crate::package::writer::PackageWriter;
    use crate::source::BundledBlob;
    use tempfile::tempdir;

    fn build_package(dir: &std::path::Path) -> std::path::PathBuf {
        let target = dir.join("Meshes.spk");
        let mut writer = PackageWriter::create(&target, 2).expect("create");

        writer.begin_record("A.mesh", "mesh").expect("record A");
        PayloadHeader::new(1, "A.mesh", None)
            .write(writer.writer())
            .expect("payload A");
        writer.writer().write_all(b"aaaa").expect("body A");

        writer.begin_record("B.mesh", "mesh").expect("record B");
        PayloadHeader::new(1, "B.mesh", None)
            .write(writer.writer())
            .expect("payload B");
        writer.writer().write_all(b"bbbb").expect("body B");

        writer.finish().expect("finish");
        target
    }

    #[test]
    fn test_open_then_scan_records_from_start() {
        let dir = tempdir().expect("tempdir");
        let target = build_package(dir.path());

        let mut reader = PackageReader::open(&ByteSource::File(target)).expect("open");
        let start = reader.records_start();

        reader.seek_to(start).expect("seek");
        let head = RecordHead::read(reader.stream()).expect("head");
        assert_eq!(head.name, "A.mesh");
        assert_eq!(head.type_tag, "mesh");

        let payload = PayloadHeader::read(reader.stream()).expect("payload");
        assert_eq!(payload.name, "A.mesh");
    }

    #[test]
    fn test_seek_to_table_entry_reads_that_record() {
        let dir = tempdir().expect("tempdir");
        let target = build_package(dir.path());

        let mut reader = PackageReader::open(&ByteSource::File(target)).expect("open");
        let offset = reader
            .entries()
            .iter()
            .find(|e| e.name == "B.mesh")
            .expect("entry")
            .offset;

        reader.seek_to(offset).expect("seek");
        let head = RecordHead::read(reader.stream()).expect("head");
        assert_eq!(head.name, "B.mesh");
    }

    #[test]
    fn test_bundled_package_opens_from_memory() {
        let dir = tempdir().expect("tempdir");
        let target = build_package(dir.path());
        let bytes = std::fs::read(&target).expect("read file");

        let source = ByteSource::Bundled(BundledBlob::new("builtin/Meshes.spk", bytes));
        let reader = PackageReader::open(&source).expect("open");
        assert_eq!(reader.header().asset_count, 2);
        assert_eq!(reader.entries().len(), 2);
    }

    #[test]
    fn test_table_offset_inside_header_rejected() {
        let dir = tempdir().expect("tempdir");
        let target = build_package(dir.path());

        // Corrupt the table offset to point into the header.
        let mut bytes = std::fs::read(&target).expect("read");
        bytes[16..20].copy_from_slice(&4u32.to_le_bytes());

        let source = ByteSource::Bundled(BundledBlob::new("corrupt.spk", bytes));
        let err = PackageReader::open(&source).expect_err("should reject");
        assert!(matches!(err, FormatError::InvalidFormat(_)));
    }

    #[test]
    fn test_garbage_file_rejected() {
        let source = ByteSource::Bundled(BundledBlob::new(
            "garbage.spk",
            &b"this is not a package at all"[..],
        ));
        assert!(PackageReader::open(&source).is_err());
    }
}
