//! Package and asset storage runtime for the satchel asset system.
//!
//! This crate turns the container format from `satchel-formats` into a
//! live asset system:
//!
//! - **Assets**: named, typed, versioned payloads behind the [`Asset`]
//!   trait, shared as `Arc<dyn Asset>` and produced by deserializers
//!   registered in an [`AssetRegistry`].
//! - **Packages**: one [`Package`] per container, loading eagerly or
//!   on demand through the offset table, recovering from damaged
//!   records, and rewriting its file atomically on save.
//! - **The store**: a [`PackageStore`] resolving package names to byte
//!   sources and guaranteeing a single live instance per name. The
//!   store is an explicit object handed around by the host; nothing in
//!   this crate lives in a process-wide global.
//!
//! Corrupt data never panics the host. A damaged record is logged and
//! skipped; a damaged container loads as far as its header allows; an
//! unresolved name is an `Option::None`, not an error.
//!
//! The whole layer is synchronous blocking I/O. The loading guard
//! inside [`Package`] exists for same-thread reentrancy (an asset
//! fetching a sibling mid-load), not for cross-thread coordination:
//! hosts that mutate packages from several threads serialize those
//! operations themselves.

#![warn(missing_docs)]

use thiserror::Error;

pub mod asset;
pub mod config;
pub mod events;
pub mod package;
pub mod store;

pub use asset::{
    Asset, AssetCommon, AssetRef, AssetRegistry, AssetType, LoadContext, RawAsset, SaveContext,
};
pub use config::StoreConfig;
pub use events::StoreEvent;
pub use package::Package;
pub use store::{PackageStore, StoreStats};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during package and asset operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Container-level format error.
    #[error("format error: {0}")]
    Format(#[from] satchel_formats::FormatError),

    /// A single asset record could not be deserialized.
    #[error("corrupt asset {name:?}: {reason}")]
    CorruptAsset {
        /// Name the offset table lists for the record.
        name: String,
        /// What went wrong while parsing it.
        reason: String,
    },

    /// No package registered under the given name.
    #[error("package not found: {0}")]
    PackageNotFound(String),

    /// No asset with the given name in the package.
    #[error("asset {asset:?} not found in package {package:?}")]
    AssetNotFound {
        /// Package that was searched.
        package: String,
        /// Asset name that did not resolve.
        asset: String,
    },

    /// Operation not valid for the package's current state.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// Write refused because the store is read-only.
    #[error("store is read-only: {0}")]
    ReadOnly(String),

    /// A save could not be completed; the previous file is untouched.
    #[error("save failed: {0}")]
    SaveFailed(String),
}

/// Name of the always-resident in-memory package.
///
/// Assets stored here live for the session and are never written to
/// disk; the name cannot be claimed by a package file.
pub const TRANSIENT_PACKAGE: &str = "transient";

/// Default file extension for package files (without the dot).
pub const DEFAULT_PACKAGE_EXTENSION: &str = "spk";

/// Version information for the storage system.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
