//! Byte sources backing a package.
//!
//! A package loads from either a file on disk or a read-only blob bundled
//! into the host binary. [`ByteSource`] is the single handle the rest of
//! the system sees; [`SourceReader`] unifies the reader side.

use crate::error::Result;
use bytes::Bytes;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Combined `Read + Seek` bound for record parsing through trait objects.
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek> ReadSeek for T {}

/// A read-only blob bundled with the host binary.
#[derive(Debug, Clone)]
pub struct BundledBlob {
    /// Path-like identifier, e.g. `builtin/Shaders.spk`.
    pub id: String,
    /// The blob contents.
    pub data: Bytes,
}

impl BundledBlob {
    /// Create a bundled blob from an identifier and its bytes.
    pub fn new(id: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            id: id.into(),
            data: data.into(),
        }
    }
}

/// Backing storage for a package.
#[derive(Debug, Clone)]
pub enum ByteSource {
    /// A package file on disk.
    File(PathBuf),
    /// A read-only blob bundled with the host binary.
    Bundled(BundledBlob),
}

impl ByteSource {
    /// Open the source for reading from the start.
    pub fn open(&self) -> Result<SourceReader> {
        match self {
            Self::File(path) => {
                let file = File::open(path)?;
                Ok(SourceReader::File(BufReader::new(file)))
            }
            Self::Bundled(blob) => Ok(SourceReader::Bundled(Cursor::new(blob.data.clone()))),
        }
    }

    /// Whether the source can be re-opened later for targeted
    /// single-record reads.
    ///
    /// Bundled blobs are handed out as one-shot streams: everything a
    /// consumer wants must be taken in a single pass at open time. Only
    /// file sources serve the lazy, offset-indexed load path.
    pub const fn supports_random_access(&self) -> bool {
        matches!(self, Self::File(_))
    }

    /// Whether the backing bytes currently exist.
    pub fn exists(&self) -> bool {
        match self {
            Self::File(path) => path.exists(),
            Self::Bundled(_) => true,
        }
    }

    /// Backing file path, for file sources.
    pub fn file_path(&self) -> Option<&Path> {
        match self {
            Self::File(path) => Some(path),
            Self::Bundled(_) => None,
        }
    }

    /// Human-readable description for log lines.
    pub fn describe(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Bundled(blob) => format!("bundled:{}", blob.id),
        }
    }
}

/// Reader over an opened [`ByteSource`].
#[derive(Debug)]
pub enum SourceReader {
    /// Buffered reader over a package file.
    File(BufReader<File>),
    /// Cursor over a bundled blob.
    Bundled(Cursor<Bytes>),
}

impl Read for SourceReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::File(reader) => reader.read(buf),
            Self::Bundled(reader) => reader.read(buf),
        }
    }
}

impl Seek for SourceReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        match self {
            Self::File(reader) => reader.seek(pos),
            Self::Bundled(reader) => reader.seek(pos),
        }
    }
}
