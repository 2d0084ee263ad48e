//! Recovery behaviour when package bytes are damaged.
//!
//! A damaged record costs exactly that record: the load continues at
//! the next offset table entry and the package still reports loaded.
//! Only header or table damage takes the whole package down, and even
//! then the host keeps a usable (empty) handle.

#![allow(clippy::expect_used)]

mod common;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use common::{corrupt_record, open_store};
use satchel_storage::{RawAsset, StorageError};
use tempfile::tempdir;

/// Build `Meshes.spk` holding raw assets A, B and C.
fn build_meshes(root: &Path) -> PathBuf {
    let path = root.join("Meshes.spk");
    let store = open_store(root);
    let package = store.create_package("Meshes", &path);
    for name in ["A", "B", "C"] {
        let body = name.to_lowercase().repeat(16).into_bytes();
        package.store_asset(name, Arc::new(RawAsset::new(name, body)));
    }
    package.save().expect("save Meshes");
    store.cleanup();
    path
}

#[test]
fn test_damaged_middle_record_is_skipped() {
    let dir = tempdir().expect("tempdir");
    let path = build_meshes(dir.path());
    corrupt_record(&path, "B");

    let store = open_store(dir.path());
    let package = store.load_package("Meshes", true).expect("load Meshes");

    // Partial success is success: the package is loaded with the two
    // healthy records.
    assert!(package.is_loaded());
    assert_eq!(package.loaded_asset_count(), 2);
    assert!(package.fetch("A").is_some());
    assert!(package.fetch("C").is_some());
    assert!(package.fetch("B").is_none());
}

#[test]
fn test_damaged_final_record_ends_the_scan() {
    let dir = tempdir().expect("tempdir");
    let path = build_meshes(dir.path());
    corrupt_record(&path, "C");

    let store = open_store(dir.path());
    let package = store.load_package("Meshes", true).expect("load Meshes");

    assert!(package.is_loaded());
    assert_eq!(package.loaded_asset_count(), 2);
    assert!(package.fetch("C").is_none());
}

#[test]
fn test_damaged_record_fails_on_demand_fetch_only() {
    let dir = tempdir().expect("tempdir");
    let path = build_meshes(dir.path());
    corrupt_record(&path, "B");

    let store = open_store(dir.path());
    let package = store.load_package("Meshes", false).expect("lazy load");

    // The offset table still lists B, so the package knows the name;
    // materializing it is what fails.
    assert!(package.contains("B"));
    assert!(package.fetch("B").is_none());
    assert!(package.fetch("A").is_some());
}

#[test]
fn test_damaged_header_still_returns_a_live_handle() {
    let dir = tempdir().expect("tempdir");
    let path = build_meshes(dir.path());

    // The magic string sits after its u32 length prefix.
    let mut bytes = std::fs::read(&path).expect("read package");
    bytes[4..8].copy_from_slice(b"JUNK");
    std::fs::write(&path, bytes).expect("write package");

    let store = open_store(dir.path());
    let package = store
        .load_package("Meshes", true)
        .expect("handle comes back even though the load failed");

    assert!(!package.is_loaded());
    assert_eq!(package.loaded_asset_count(), 0);
    assert!(package.fetch("A").is_none());

    // The same handle is handed out on retry; the name stays claimed.
    let again = store.load_package("Meshes", true).expect("same handle");
    assert!(Arc::ptr_eq(&package, &again));
}

#[test]
fn test_save_skips_records_that_cannot_be_materialized() {
    let dir = tempdir().expect("tempdir");
    let path = build_meshes(dir.path());
    corrupt_record(&path, "B");

    {
        let store = open_store(dir.path());
        let package = store.load_package("Meshes", false).expect("lazy load");
        package.store_asset("D", Arc::new(RawAsset::new("D", b"dddd".to_vec())));
        // B cannot be brought into memory, so the rewrite carries
        // everything else.
        package.save().expect("save survives the damaged record");
    }

    let store = open_store(dir.path());
    let package = store.load_package("Meshes", true).expect("reload");
    assert!(package.is_loaded());
    assert_eq!(package.asset_names(), vec!["A", "C", "D"]);
}

#[test]
fn test_validation_reports_damage_without_loading() {
    let dir = tempdir().expect("tempdir");
    let path = build_meshes(dir.path());

    let store = open_store(dir.path());
    let clean = store.validate_package("Meshes").expect("validate");
    assert!(clean.is_clean());
    assert_eq!(clean.valid_records, 3);

    corrupt_record(&path, "B");
    let damaged = store.validate_package("Meshes").expect("validate damaged");
    assert!(!damaged.is_clean());
    assert_eq!(damaged.valid_records, 2);
    assert_eq!(damaged.issues.len(), 1);

    assert!(matches!(
        store.validate_package("Ghost"),
        Err(StorageError::PackageNotFound(_))
    ));
}
