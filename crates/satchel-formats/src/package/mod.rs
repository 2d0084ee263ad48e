//! The package container format.
//!
//! A package file is a header, a run of asset records, and a trailing
//! offset table the header points at:
//!
//! ```text
//! +----------+----------+----------+-----+--------------+
//! | header   | record 0 | record 1 | ... | offset table |
//! +----------+----------+----------+-----+--------------+
//! ```
//!
//! The table makes two things possible: loading a single asset without
//! scanning the whole file, and resynchronizing a scan at the next record
//! when one record turns out to be damaged.

pub mod header;
pub mod reader;
pub mod record;
pub mod table;
pub mod validate;
pub mod writer;

pub use header::{FORMAT_VERSION, HEADER_LEN, PACKAGE_MAGIC, PackageHeader};
pub use reader::PackageReader;
pub use record::{ASSET_MAGIC, PayloadHeader, RecordHead};
pub use table::{OffsetEntry, read_offset_table, write_offset_table};
pub use validate::{ValidationReport, validate};
pub use writer::PackageWriter;
