//! Package file writing with atomic replacement.
//!
//! A save never touches the target in place. Records stream into a temp
//! sibling of the target, the header's table offset is patched once the
//! table position is known, and a single rename publishes the result.
//! A save that fails at any point removes the temp file and leaves the
//! previous package exactly as it was.

use crate::error::{FormatError, Result};
use crate::package::header::{PackageHeader, TABLE_OFFSET_FIELD_POS};
use crate::package::record::RecordHead;
use crate::package::table::{OffsetEntry, write_offset_table};
use crate::wire;
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Extension of the in-progress temp file next to the target.
const TEMP_EXTENSION: &str = "tmp";

/// Streaming writer for a package file.
///
/// Usage: [`create`](Self::create) with the record count, then for each
/// asset [`begin_record`](Self::begin_record) followed by payload writes
/// through [`writer`](Self::writer), then [`finish`](Self::finish).
pub struct PackageWriter {
    writer: BufWriter<File>,
    target: PathBuf,
    temp: PathBuf,
    asset_count: u32,
    entries: Vec<OffsetEntry>,
    committed: bool,
}

impl PackageWriter {
    /// Start writing a package destined for `target`.
    ///
    /// Opens a temp file in the same directory and writes the header with
    /// a zero placeholder table offset.
    pub fn create(target: impl Into<PathBuf>, asset_count: u32) -> Result<Self> {
        let target = target.into();
        let temp = target.with_extension(TEMP_EXTENSION);

        let file = File::create(&temp)?;
        let mut writer = BufWriter::new(file);
        PackageHeader::new(asset_count, 0).write(&mut writer)?;

        debug!(
            "writing package to temp file {} ({} records)",
            temp.display(),
            asset_count
        );

        Ok(Self {
            writer,
            target,
            temp,
            asset_count,
            entries: Vec::new(),
            committed: false,
        })
    }

    /// Start the next asset record, returning its file offset.
    ///
    /// Writes the record head and registers the offset table entry. The
    /// caller streams the payload through [`writer`](Self::writer) before
    /// the next `begin_record` or [`finish`](Self::finish).
    pub fn begin_record(&mut self, name: &str, type_tag: &str) -> Result<u64> {
        let offset = self.writer.stream_position()?;
        RecordHead::new(name, type_tag).write(&mut self.writer)?;
        self.entries.push(OffsetEntry::new(name, offset));
        Ok(offset)
    }

    /// Stream access for the current record's payload.
    pub fn writer(&mut self) -> &mut dyn Write {
        &mut self.writer
    }

    /// Number of records begun so far.
    pub fn records_written(&self) -> usize {
        self.entries.len()
    }

    /// Path the finished package will be published at.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Write the offset table, patch the header, and atomically publish
    /// the temp file over the target.
    pub fn finish(mut self) -> Result<()> {
        if self.entries.len() as u64 != u64::from(self.asset_count) {
            return Err(FormatError::InvalidFormat(format!(
                "wrote {} records, header promised {}",
                self.entries.len(),
                self.asset_count
            )));
        }

        let table_offset = self.writer.stream_position()?;
        let table_offset =
            u32::try_from(table_offset).map_err(|_| FormatError::OffsetOverflow(table_offset))?;

        write_offset_table(&mut self.writer, &self.entries)?;

        // Back-patch the placeholder now that the table position is known.
        self.writer.seek(SeekFrom::Start(TABLE_OFFSET_FIELD_POS))?;
        wire::write_u32(&mut self.writer, table_offset)?;

        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;

        std::fs::rename(&self.temp, &self.target)?;
        self.committed = true;

        debug!(
            "published package {} ({} records, table at {})",
            self.target.display(),
            self.entries.len(),
            table_offset
        );

        Ok(())
    }
}

impl Drop for PackageWriter {
    fn drop(&mut self) {
        if !self.committed
            && let Err(e) = std::fs::remove_file(&self.temp)
        {
            warn!(
                "failed to remove package temp file {}: {e}",
                self.temp.display()
            );
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use crate::package::reader::PackageReader;
    use crate::package::record::PayloadHeader;
    use crate::source::ByteSource;
    use tempfile::tempdir;

    fn write_payload(writer: &mut dyn Write, name: &str, body: &[u8]) {
        PayloadHeader::new(1, name, None)
            .write(writer)
            .expect("payload header");
        writer.write_all(body).expect("payload body");
    }

    #[test]
    fn test_empty_package_round_trip() {
        let dir = tempdir().expect("tempdir");
        let target = dir.path().join("Empty.spk");

        let writer = PackageWriter::create(&target, 0).expect("create");
        writer.finish().expect("finish");

        assert!(target.exists());
        assert!(!target.with_extension("tmp").exists());

        let reader = PackageReader::open(&ByteSource::File(target)).expect("open");
        assert_eq!(reader.header().asset_count, 0);
        assert!(reader.entries().is_empty());
    }

    #[test]
    fn test_records_and_table_agree() {
        let dir = tempdir().expect("tempdir");
        let target = dir.path().join("Materials.spk");

        let mut writer = PackageWriter::create(&target, 2).expect("create");
        let first = writer
            .begin_record("Red.material", "material")
            .expect("record");
        write_payload(writer.writer(), "Red.material", &[1, 0, 0, 1]);
        let second = writer
            .begin_record("Blue.material", "material")
            .expect("record");
        write_payload(writer.writer(), "Blue.material", &[0, 0, 1, 1]);
        writer.finish().expect("finish");

        let reader = PackageReader::open(&ByteSource::File(target)).expect("open");
        assert_eq!(reader.header().asset_count, 2);
        assert_eq!(reader.entries().len(), 2);
        assert_eq!(reader.entries()[0].name, "Red.material");
        assert_eq!(reader.entries()[0].offset, first);
        assert_eq!(reader.entries()[1].name, "Blue.material");
        assert_eq!(reader.entries()[1].offset, second);
        assert_eq!(reader.records_start(), first);
    }

    #[test]
    fn test_record_count_mismatch_fails_and_keeps_target_absent() {
        let dir = tempdir().expect("tempdir");
        let target = dir.path().join("Short.spk");

        let mut writer = PackageWriter::create(&target, 2).expect("create");
        writer.begin_record("Only.one", "raw").expect("record");
        let err = writer.finish().expect_err("should fail");
        assert!(matches!(err, FormatError::InvalidFormat(_)));

        assert!(!target.exists());
        assert!(!target.with_extension("tmp").exists());
    }

    #[test]
    fn test_dropped_writer_removes_temp_and_preserves_target() {
        let dir = tempdir().expect("tempdir");
        let target = dir.path().join("Keep.spk");
        std::fs::write(&target, b"previous contents").expect("seed target");

        {
            let mut writer = PackageWriter::create(&target, 1).expect("create");
            writer.begin_record("New.asset", "raw").expect("record");
            // Dropped without finish: an aborted save.
        }

        assert!(!target.with_extension("tmp").exists());
        let kept = std::fs::read(&target).expect("read target");
        assert_eq!(kept, b"previous contents");
    }

    #[test]
    fn test_rewrite_replaces_previous_file() {
        let dir = tempdir().expect("tempdir");
        let target = dir.path().join("Level.spk");

        let mut writer = PackageWriter::create(&target, 1).expect("create v1");
        writer.begin_record("A.raw", "raw").expect("record");
        write_payload(writer.writer(), "A.raw", b"v1");
        writer.finish().expect("finish v1");

        let mut writer = PackageWriter::create(&target, 2).expect("create v2");
        writer.begin_record("A.raw", "raw").expect("record");
        write_payload(writer.writer(), "A.raw", b"v2");
        writer.begin_record("B.raw", "raw").expect("record");
        write_payload(writer.writer(), "B.raw", b"v2");
        writer.finish().expect("finish v2");

        let reader = PackageReader::open(&ByteSource::File(target)).expect("open");
        assert_eq!(reader.header().asset_count, 2);
    }
}
