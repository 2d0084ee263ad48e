//! Binary package container format for the satchel asset system.
//!
//! A package is a single file holding named, typed, versioned asset
//! payloads. This crate owns the wire layer only: headers, record
//! framing, the trailing offset table, streaming reads, and the
//! temp-file-and-rename write path. What the payload bytes mean is the
//! business of `satchel-storage`, which layers asset dispatch on top.
//!
//! # File layout
//!
//! All integers are `u32` little-endian; strings are length-prefixed
//! UTF-8. See [`package`] for the layout of each piece.
//!
//! # Durability
//!
//! Package writes go through [`package::PackageWriter`], which streams
//! into a temp sibling and atomically renames over the target once the
//! offset table is on disk and the header is patched. An interrupted
//! save leaves the previous file untouched.

#![warn(missing_docs)]

pub mod error;
pub mod package;
pub mod source;
pub mod wire;

pub use error::{FormatError, Result};
pub use package::{
    ASSET_MAGIC, FORMAT_VERSION, OffsetEntry, PACKAGE_MAGIC, PackageHeader, PackageReader,
    PackageWriter, PayloadHeader, RecordHead, ValidationReport, validate,
};
pub use source::{BundledBlob, ByteSource, ReadSeek, SourceReader};
