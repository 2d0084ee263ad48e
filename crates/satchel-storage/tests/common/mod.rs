//! Shared fixtures: asset variants and store builders used across the
//! integration suites.

#![allow(dead_code)]
#![allow(clippy::expect_used)]

use std::any::Any;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use satchel_formats::{ByteSource, PackageReader, ReadSeek};
use satchel_storage::{
    Asset, AssetCommon, AssetRef, AssetRegistry, AssetType, LoadContext, PackageStore, Result,
    SaveContext, StoreConfig,
};

/// A material colour: four `f32` channels, little-endian.
pub struct ColorAsset {
    common: AssetCommon,
    rgba: [f32; 4],
}

impl ColorAsset {
    pub fn new(name: &str, rgba: [f32; 4]) -> Self {
        Self {
            common: AssetCommon::new(name, Self::VERSION),
            rgba,
        }
    }

    pub fn rgba(&self) -> [f32; 4] {
        self.rgba
    }
}

impl Asset for ColorAsset {
    fn common(&self) -> &AssetCommon {
        &self.common
    }

    fn type_tag(&self) -> &str {
        Self::TAG
    }

    fn serialize(&self, writer: &mut dyn Write, ctx: &SaveContext) -> Result<()> {
        ctx.ensure_writable()?;
        self.common.write_header(writer)?;
        for channel in self.rgba {
            writer.write_all(&channel.to_le_bytes())?;
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl AssetType for ColorAsset {
    const TAG: &'static str = "material";
    const VERSION: u32 = 1;

    fn deserialize(reader: &mut dyn ReadSeek, _ctx: &LoadContext<'_>) -> Result<Self> {
        let common = AssetCommon::read(reader)?;
        let mut rgba = [0.0f32; 4];
        for channel in &mut rgba {
            let mut bytes = [0u8; 4];
            reader.read_exact(&mut bytes)?;
            *channel = f32::from_le_bytes(bytes);
        }
        Ok(Self { common, rgba })
    }
}

/// An asset holding a reference to another asset, resolved while its
/// own record is still being read. Exists to exercise reentrant
/// fetches and cycle breaking.
pub struct LinkAsset {
    common: AssetCommon,
    target: AssetRef,
    resolved: Mutex<Option<Arc<dyn Asset>>>,
}

impl LinkAsset {
    pub fn new(name: &str, target: AssetRef) -> Self {
        Self {
            common: AssetCommon::new(name, Self::VERSION),
            target,
            resolved: Mutex::new(None),
        }
    }

    pub fn target(&self) -> &AssetRef {
        &self.target
    }

    /// The asset the deserializer resolved, if the reference held up.
    pub fn resolved(&self) -> Option<Arc<dyn Asset>> {
        self.resolved.lock().clone()
    }
}

impl Asset for LinkAsset {
    fn common(&self) -> &AssetCommon {
        &self.common
    }

    fn type_tag(&self) -> &str {
        Self::TAG
    }

    fn serialize(&self, writer: &mut dyn Write, ctx: &SaveContext) -> Result<()> {
        ctx.ensure_writable()?;
        self.common.write_header(writer)?;
        self.target.write(writer)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl AssetType for LinkAsset {
    const TAG: &'static str = "link";
    const VERSION: u32 = 1;

    fn deserialize(reader: &mut dyn ReadSeek, ctx: &LoadContext<'_>) -> Result<Self> {
        let common = AssetCommon::read(reader)?;
        let target = AssetRef::read(reader)?;
        let resolved = ctx.fetch_dependency(&target);
        Ok(Self {
            common,
            target,
            resolved: Mutex::new(resolved),
        })
    }
}

/// Registry with every variant the suites use.
pub fn test_registry() -> AssetRegistry {
    let mut registry = AssetRegistry::with_builtins();
    registry.register::<ColorAsset>();
    registry.register::<LinkAsset>();
    registry
}

/// Open a store over `root` with the test registry.
pub fn open_store(root: &Path) -> Arc<PackageStore> {
    PackageStore::open(StoreConfig::new(root), test_registry()).expect("open store")
}

/// Open a read-only store over `root` with the test registry.
pub fn open_read_only_store(root: &Path) -> Arc<PackageStore> {
    PackageStore::open(StoreConfig::new(root).with_read_only(true), test_registry())
        .expect("open read-only store")
}

pub fn as_color(asset: &Arc<dyn Asset>) -> &ColorAsset {
    asset
        .as_any()
        .downcast_ref::<ColorAsset>()
        .expect("asset should be a ColorAsset")
}

pub fn as_link(asset: &Arc<dyn Asset>) -> &LinkAsset {
    asset
        .as_any()
        .downcast_ref::<LinkAsset>()
        .expect("asset should be a LinkAsset")
}

/// File offset of a named record, straight from the offset table.
pub fn record_offset(path: &Path, name: &str) -> u64 {
    let reader = PackageReader::open(&ByteSource::File(path.to_path_buf()))
        .expect("open package for inspection");
    reader
        .entries()
        .iter()
        .find(|entry| entry.name == name)
        .expect("package should contain the record")
        .offset
}

/// Damage a single record in place by stomping its head with an
/// impossible string length. Header and offset table stay intact, so
/// loads hit the damage only when they reach this record.
pub fn corrupt_record(path: &Path, name: &str) {
    let offset = record_offset(path, name) as usize;
    let mut bytes = std::fs::read(path).expect("read package file");
    bytes[offset..offset + 4].copy_from_slice(&u32::MAX.to_le_bytes());
    std::fs::write(path, bytes).expect("write damaged package file");
}
