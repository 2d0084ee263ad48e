//! Structural package validation.
//!
//! Walks a package file through its offset table and checks that every
//! record parses as far as the common framing goes, without dispatching
//! any payload to a deserializer. Used by tooling to tell a damaged file
//! from a file whose assets merely have unknown type tags.

use crate::error::Result;
use crate::package::reader::PackageReader;
use crate::package::record::{PayloadHeader, RecordHead};
use crate::source::ByteSource;
use tracing::{info, warn};

/// Outcome of a structural validation pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    /// Number of records the header promised.
    pub asset_count: u32,
    /// Records whose framing parsed cleanly.
    pub valid_records: u32,
    /// One entry per problem found, in table order.
    pub issues: Vec<String>,
}

impl ValidationReport {
    /// Whether the file parsed without a single issue.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Validate the structure of a package file.
///
/// Fails only when the header or offset table cannot be read at all;
/// per-record damage is collected into the report instead.
pub fn validate(source: &ByteSource) -> Result<ValidationReport> {
    let mut reader = PackageReader::open(source)?;
    let entries = reader.take_entries();

    let mut report = ValidationReport {
        asset_count: reader.header().asset_count,
        ..ValidationReport::default()
    };

    for entry in &entries {
        if let Err(issue) = check_record(&mut reader, &entry.name, entry.offset) {
            warn!(
                "validation: record {:?} at offset {}: {issue}",
                entry.name, entry.offset
            );
            report.issues.push(issue);
        } else {
            report.valid_records += 1;
        }
    }

    if report.is_clean() {
        info!(
            "validated package {}: {} records OK",
            source.describe(),
            report.valid_records
        );
    } else {
        warn!(
            "validated package {}: {} of {} records damaged",
            source.describe(),
            report.issues.len(),
            entries.len()
        );
    }

    Ok(report)
}

fn check_record(
    reader: &mut PackageReader,
    expected_name: &str,
    offset: u64,
) -> std::result::Result<(), String> {
    reader
        .seek_to(offset)
        .map_err(|e| format!("seek to {offset} failed: {e}"))?;

    let head =
        RecordHead::read(reader.stream()).map_err(|e| format!("record head unreadable: {e}"))?;
    if head.name != expected_name {
        return Err(format!(
            "table names {expected_name:?} but record head says {:?}",
            head.name
        ));
    }

    let payload = PayloadHeader::read(reader.stream())
        .map_err(|e| format!("payload header unreadable: {e}"))?;
    if payload.name != head.name {
        return Err(format!(
            "record head names {:?} but payload says {:?}",
            head.name, payload.name
        ));
    }

    Ok(())
}
