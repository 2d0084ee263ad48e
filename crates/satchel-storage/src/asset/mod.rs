//! The asset contract.
//!
//! Every payload type a package can hold implements [`Asset`] (the
//! object-safe runtime surface) and [`AssetType`] (the compile-time
//! side: type tag, current schema version, deserializer). Assets embed
//! an [`AssetCommon`] carrying the payload sub-header fields so every
//! record starts with the same self-describing prefix regardless of
//! variant.
//!
//! Assets refer to each other with [`AssetRef`]: a name, not a pointer.
//! References are resolved through the owning package or the store at
//! use time and holding one never keeps the target alive.

pub mod raw;
pub mod registry;

pub use raw::RawAsset;
pub use registry::{AssetRegistry, DeserializeFn};

use std::any::Any;
use std::io::Write;
use std::sync::Arc;

use parking_lot::RwLock;
use satchel_formats::{PayloadHeader, ReadSeek, wire};

use crate::package::Package;
use crate::store::PackageStore;
use crate::{Result, StorageError};

/// State every asset variant embeds: the payload sub-header fields plus
/// the runtime back-reference to the owning package.
#[derive(Debug)]
pub struct AssetCommon {
    name: String,
    version: u32,
    source_path: Option<String>,
    /// Name of the package currently holding the asset. Runtime-only,
    /// maintained by the package mutation paths.
    package: RwLock<Option<String>>,
}

impl AssetCommon {
    /// Create common state for a freshly built asset.
    pub fn new(name: impl Into<String>, version: u32) -> Self {
        Self {
            name: name.into(),
            version,
            source_path: None,
            package: RwLock::new(None),
        }
    }

    /// Record the path of the originally imported file.
    #[must_use]
    pub fn with_source_path(mut self, path: impl Into<String>) -> Self {
        self.source_path = Some(path.into());
        self
    }

    /// Read the payload sub-header at the current stream position.
    pub fn read(mut reader: &mut dyn ReadSeek) -> Result<Self> {
        let header = PayloadHeader::read(&mut reader)?;
        Ok(Self {
            name: header.name,
            version: header.version,
            source_path: header.source_path,
            package: RwLock::new(None),
        })
    }

    /// Write the payload sub-header at the current stream position.
    pub fn write_header(&self, mut writer: &mut dyn Write) -> Result<()> {
        PayloadHeader::new(self.version, &self.name, self.source_path.clone())
            .write(&mut writer)?;
        Ok(())
    }

    /// Asset name, unique within its package.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Schema version the payload was read with or will be written with.
    pub const fn version(&self) -> u32 {
        self.version
    }

    /// Stamp the schema version that will be written on the next save.
    ///
    /// Deserializers call this after migrating an older payload so the
    /// rewrite carries the current schema.
    pub const fn set_version(&mut self, version: u32) {
        self.version = version;
    }

    /// Path of the originally imported file, if recorded.
    pub fn source_path(&self) -> Option<&str> {
        self.source_path.as_deref()
    }

    /// Name of the package currently holding the asset, if any.
    pub fn package(&self) -> Option<String> {
        self.package.read().clone()
    }

    pub(crate) fn attach_to(&self, package: &str) {
        *self.package.write() = Some(package.to_string());
    }

    pub(crate) fn detach(&self) {
        *self.package.write() = None;
    }
}

/// Contract every asset variant implements.
///
/// Assets are shared as `Arc<dyn Asset>`. A variant that needs mutable
/// state manages its own interior mutability, the way [`AssetCommon`]
/// does for the package back-reference.
pub trait Asset: Send + Sync {
    /// Common state embedded in every variant.
    fn common(&self) -> &AssetCommon;

    /// Type tag the asset serializes under.
    fn type_tag(&self) -> &str;

    /// Write the payload: sub-header first, then variant fields.
    ///
    /// Implementations call [`SaveContext::ensure_writable`] before
    /// touching the writer so read-only stores fail before any bytes
    /// move.
    fn serialize(&self, writer: &mut dyn Write, ctx: &SaveContext) -> Result<()>;

    /// Release external resources held by the asset.
    ///
    /// Called when the asset is replaced, deleted, or its package is
    /// disposed. The default does nothing; variants wrapping GPU
    /// handles or similar override it.
    fn dispose(&self) {}

    /// Downcasting hook for hosts that know the concrete type.
    fn as_any(&self) -> &dyn Any;

    /// Asset name, unique within its package.
    fn name(&self) -> &str {
        self.common().name()
    }

    /// Schema version of the payload.
    fn version(&self) -> u32 {
        self.common().version()
    }

    /// Path of the originally imported file, if recorded.
    fn source_path(&self) -> Option<&str> {
        self.common().source_path()
    }

    /// Name of the package currently holding the asset, if any.
    fn owning_package(&self) -> Option<String> {
        self.common().package()
    }
}

/// Compile-time side of an asset variant: the constants and the
/// deserializer the registry binds to a type tag.
pub trait AssetType: Asset + Sized + 'static {
    /// Type tag written into record heads.
    const TAG: &'static str;

    /// Newest schema version this build writes.
    const VERSION: u32;

    /// Read one payload at the current stream position: sub-header
    /// first, then variant fields.
    fn deserialize(reader: &mut dyn ReadSeek, ctx: &LoadContext<'_>) -> Result<Self>;
}

/// A weak, name-based reference from one asset to another.
///
/// `package: None` means the referencing asset's own package. The
/// reference resolves at use time and never keeps its target alive or
/// loaded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetRef {
    /// Target package, or the referencing asset's own package when `None`.
    pub package: Option<String>,
    /// Target asset name.
    pub name: String,
}

impl AssetRef {
    /// Reference an asset in the same package.
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            package: None,
            name: name.into(),
        }
    }

    /// Reference an asset in another package.
    pub fn in_package(package: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            package: Some(package.into()),
            name: name.into(),
        }
    }

    /// Read a reference: package string (empty means same package),
    /// then asset name.
    pub fn read(mut reader: &mut dyn ReadSeek) -> Result<Self> {
        let package = wire::read_string(&mut reader)?;
        let name = wire::read_string(&mut reader)?;
        Ok(Self {
            package: (!package.is_empty()).then_some(package),
            name,
        })
    }

    /// Write the reference in the form [`read`](Self::read) accepts.
    pub fn write(&self, mut writer: &mut dyn Write) -> Result<()> {
        wire::write_string(&mut writer, self.package.as_deref().unwrap_or(""))?;
        wire::write_string(&mut writer, &self.name)?;
        Ok(())
    }
}

/// Context handed to deserializers during a load.
pub struct LoadContext<'a> {
    package_name: &'a str,
    package: Option<&'a Package>,
    store: Option<Arc<PackageStore>>,
}

impl<'a> LoadContext<'a> {
    pub(crate) fn for_package(package: &'a Package, store: Option<Arc<PackageStore>>) -> Self {
        Self {
            package_name: package.name(),
            package: Some(package),
            store,
        }
    }

    /// Context with no surrounding package, for standalone payload
    /// parsing in tools and tests. Dependency fetches resolve nothing.
    pub const fn standalone(package_name: &'a str) -> Self {
        Self {
            package_name,
            package: None,
            store: None,
        }
    }

    /// Name of the package being loaded from.
    pub const fn package_name(&self) -> &str {
        self.package_name
    }

    /// Resolve a dependency by reference.
    ///
    /// Same-package targets go through the owning package and may be
    /// pulled from disk mid-load; cross-package targets need the
    /// package to be attached to a store. An unresolvable reference is
    /// `None`, never an error.
    pub fn fetch_dependency(&self, reference: &AssetRef) -> Option<Arc<dyn Asset>> {
        match reference.package.as_deref() {
            None => self.package?.fetch(&reference.name),
            Some(target) if target == self.package_name => self.package?.fetch(&reference.name),
            Some(_) => self.store.as_ref()?.fetch_asset(reference),
        }
    }
}

/// Context handed to serializers during a save.
pub struct SaveContext {
    package_name: String,
    read_only: bool,
}

impl SaveContext {
    /// Create a save context for the named package.
    pub fn new(package_name: impl Into<String>, read_only: bool) -> Self {
        Self {
            package_name: package_name.into(),
            read_only,
        }
    }

    /// Name of the package being saved.
    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    /// Fail when the surrounding store was opened read-only.
    ///
    /// Serializers call this before writing anything.
    pub fn ensure_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(StorageError::ReadOnly(format!(
                "cannot serialize into package {:?}",
                self.package_name
            )));
        }
        Ok(())
    }
}
