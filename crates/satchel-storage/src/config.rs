//! Store configuration

use std::path::{Path, PathBuf};

use satchel_formats::BundledBlob;
use serde::{Deserialize, Serialize};

use crate::DEFAULT_PACKAGE_EXTENSION;

/// Configuration for a [`PackageStore`](crate::PackageStore).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Root directory scanned recursively for package files.
    pub content_root: PathBuf,

    /// File extension (without the dot) identifying package files
    /// during the content scan.
    pub package_extension: String,

    /// Refuse every save. Loading is unaffected.
    pub read_only: bool,

    /// Blobs compiled into or shipped with the host binary, registered
    /// ahead of the content scan so they cannot be shadowed by files.
    #[serde(skip)]
    pub bundled: Vec<BundledBlob>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            content_root: PathBuf::from("content"),
            package_extension: DEFAULT_PACKAGE_EXTENSION.to_string(),
            read_only: false,
            bundled: Vec::new(),
        }
    }
}

impl StoreConfig {
    /// Create a configuration rooted at the given content directory.
    pub fn new<P: AsRef<Path>>(content_root: P) -> Self {
        Self {
            content_root: content_root.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Set the package file extension (without the dot).
    #[must_use]
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.package_extension = extension.into();
        self
    }

    /// Open the store read-only; every save is refused.
    #[must_use]
    pub const fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    /// Register a blob bundled with the host binary.
    ///
    /// The blob id must carry the package extension, like a file name:
    /// `"builtin.spk"` registers the package `builtin`.
    #[must_use]
    pub fn with_bundled(mut self, blob: BundledBlob) -> Self {
        self.bundled.push(blob);
        self
    }
}
