//! Package saving.
//!
//! A save is a full rewrite: every asset the package holds, serialized
//! in name order into a temp file that replaces the target in one
//! rename. The package that was on disk is either fully replaced or
//! untouched; there is no in-between to crash into.

use std::sync::Arc;

use satchel_formats::{FORMAT_VERSION, OffsetEntry, PackageWriter};
use tracing::info;

use super::Package;
use crate::asset::{Asset, SaveContext};
use crate::{Result, StorageError};

impl Package {
    /// Rewrite the backing file from the in-memory assets.
    ///
    /// Refused up front for transient packages, read-only stores, and
    /// packages without a file path. Lazily loaded records still on
    /// disk are materialized first so the rewrite cannot drop them.
    /// On success the offset map is rebuilt from the new file layout
    /// and the dirty flag clears.
    pub fn save(&self) -> Result<()> {
        if self.is_transient() {
            return Err(StorageError::InvalidOperation(
                "the transient package lives in memory only and cannot be saved".to_string(),
            ));
        }
        if self.store_read_only() {
            return Err(StorageError::ReadOnly(format!(
                "not saving package {:?}",
                self.name()
            )));
        }
        let Some(path) = self.source().and_then(satchel_formats::ByteSource::file_path) else {
            return Err(StorageError::InvalidOperation(format!(
                "package {:?} has no file path to save to",
                self.name()
            )));
        };
        let path = path.to_path_buf();

        self.ensure_fully_loaded().map_err(|e| {
            StorageError::SaveFailed(format!(
                "package {:?} could not be brought into memory: {e}",
                self.name()
            ))
        })?;

        // Name order keeps repeated saves of the same content
        // byte-identical.
        let assets: Vec<(String, Arc<dyn Asset>)> = {
            let state = self.state.read();
            let mut assets: Vec<_> = state
                .assets
                .iter()
                .map(|(name, asset)| (name.clone(), asset.clone()))
                .collect();
            assets.sort_by(|a, b| a.0.cmp(&b.0));
            assets
        };

        let count = u32::try_from(assets.len()).map_err(|_| {
            StorageError::SaveFailed(format!(
                "package {:?} holds {} assets, more than the container can index",
                self.name(),
                assets.len()
            ))
        })?;

        let ctx = SaveContext::new(self.name(), false);
        let mut writer = PackageWriter::create(&path, count)?;
        let mut entries = Vec::with_capacity(assets.len());

        for (name, asset) in &assets {
            let offset = writer.begin_record(name, asset.type_tag())?;
            asset.serialize(writer.writer(), &ctx).map_err(|e| {
                StorageError::SaveFailed(format!("asset {name:?} failed to serialize: {e}"))
            })?;
            entries.push(OffsetEntry::new(name.clone(), offset));
        }

        writer.finish()?;

        {
            let mut state = self.state.write();
            state.offset_index = entries
                .iter()
                .map(|entry| (entry.name.clone(), entry.offset))
                .collect();
            state.offsets = entries;
            state.version = FORMAT_VERSION;
            state.needs_save = false;
            state.loaded = true;
        }

        info!(
            "package {:?}: saved {} assets to {}",
            self.name(),
            assets.len(),
            path.display()
        );
        Ok(())
    }
}
