//! Package loading.
//!
//! Two ways into memory: a full load installs the offset table and,
//! when eager, materializes every record; an on-demand fetch pulls one
//! record through the table. Both share the same record parser and the
//! same rule: damage to a single record costs that record, nothing
//! else.

use std::io::{Seek, SeekFrom};
use std::sync::Arc;

use satchel_formats::{ByteSource, PackageReader, RecordHead, SourceReader};
use tracing::{debug, info, warn};

use super::Package;
use crate::asset::{Asset, LoadContext};
use crate::store::PackageStore;
use crate::{Result, StorageError};

impl Package {
    /// Load the package from its byte source.
    ///
    /// `eager` materializes every record now; a lazy load stops after
    /// the offset table and leaves records to on-demand fetches. A
    /// record that fails to parse is logged and skipped by resuming at
    /// the next table offset, and a partial result still counts as
    /// loaded. Only header or table damage fails the load as a whole.
    ///
    /// Loading an already loaded or currently loading package is a
    /// no-op, which is what lets an asset fetch siblings from the
    /// package while its own record is still being read.
    pub fn load(&self, eager: bool) -> Result<()> {
        let Some(source) = self.source() else {
            // Nothing backs the transient package; its in-memory
            // content is all there is.
            self.state.write().loaded = true;
            return Ok(());
        };

        {
            let mut state = self.state.write();
            if state.loaded || state.loading {
                debug!("package {:?}: load skipped, already underway or done", self.name);
                return Ok(());
            }
            state.loading = true;
        }

        let result = self.load_inner(source, eager);

        let mut state = self.state.write();
        state.loading = false;
        if result.is_ok() {
            state.loaded = true;
        }
        result
    }

    fn load_inner(&self, source: &ByteSource, eager: bool) -> Result<()> {
        let mut reader = PackageReader::open(source)?;
        let entries = reader.take_entries();

        {
            let mut state = self.state.write();
            state.version = reader.header().version;
            state.offset_index = entries
                .iter()
                .map(|entry| (entry.name.clone(), entry.offset))
                .collect();
            state.offsets = entries.clone();
        }

        if !eager {
            debug!(
                "package {:?}: lazy load indexed {} records",
                self.name,
                entries.len()
            );
            return Ok(());
        }

        let store = self.store.upgrade();
        let mut skipped = 0usize;
        for entry in &entries {
            // A reentrant fetch may have materialized this name already;
            // the instance other assets hold wins.
            if self.state.read().assets.contains_key(&entry.name) {
                continue;
            }

            let parsed = reader
                .seek_to(entry.offset)
                .map_err(StorageError::from)
                .and_then(|_| self.read_record(reader.stream(), &entry.name, store.clone()));
            match parsed {
                Ok(asset) => {
                    self.install_loaded(&entry.name, asset);
                }
                Err(e) => {
                    // The next iteration seeks to the next table entry,
                    // so one bad record never derails the scan; a bad
                    // final record simply ends it.
                    skipped += 1;
                    warn!(
                        "package {:?}: skipping corrupt asset {:?}: {e}",
                        self.name, entry.name
                    );
                }
            }
        }

        info!(
            "package {:?}: loaded {} of {} assets",
            self.name,
            entries.len() - skipped,
            entries.len()
        );
        Ok(())
    }

    /// Materialize a single record through the offset table, using a
    /// fresh reader so an in-progress scan is undisturbed.
    ///
    /// `Ok(None)` means the name is not in the offset map, or is
    /// already mid-parse further up the call stack (a dependency
    /// cycle, which is logged and broken here).
    pub(crate) fn fetch_from_offset(&self, name: &str) -> Result<Option<Arc<dyn Asset>>> {
        let Some(source) = self.source() else {
            return Ok(None);
        };

        let offset = {
            let state = self.state.read();
            let Some(offset) = state.offset_index.get(name).copied() else {
                return Ok(None);
            };
            if state.pending.contains(name) {
                warn!(
                    "package {:?}: asset {:?} depends on itself through a cycle; \
                     reference left unresolved",
                    self.name, name
                );
                return Ok(None);
            }
            offset
        };

        let mut reader = source.open()?;
        reader.seek(SeekFrom::Start(offset))?;

        let store = self.store.upgrade();
        let asset = self.read_record(&mut reader, name, store)?;
        Ok(Some(self.install_loaded(name, asset)))
    }

    /// Materialize every record the offset map knows that the asset map
    /// does not. Damaged stragglers are skipped with a warning, the
    /// same recovery a full load applies.
    pub(crate) fn ensure_fully_loaded(&self) -> Result<()> {
        let cold = {
            let state = self.state.read();
            !state.loaded && !state.loading
        };
        if cold {
            self.load(false)?;
        }

        let missing: Vec<String> = {
            let state = self.state.read();
            state
                .offset_index
                .keys()
                .filter(|name| !state.assets.contains_key(*name))
                .cloned()
                .collect()
        };

        for name in missing {
            match self.fetch_from_offset(&name) {
                Ok(Some(_)) => {}
                Ok(None) => {
                    warn!(
                        "package {:?}: asset {:?} fell out of the offset map while materializing",
                        self.name, name
                    );
                }
                Err(e) => {
                    warn!(
                        "package {:?}: cannot materialize {:?}: {e}",
                        self.name, name
                    );
                }
            }
        }
        Ok(())
    }

    /// Parse one record at the current stream position and hand back
    /// the asset. All failure modes come out as
    /// [`StorageError::CorruptAsset`] carrying the table name.
    fn read_record(
        &self,
        stream: &mut SourceReader,
        name: &str,
        store: Option<Arc<PackageStore>>,
    ) -> Result<Arc<dyn Asset>> {
        let corrupt = |reason: String| StorageError::CorruptAsset {
            name: name.to_string(),
            reason,
        };

        let head =
            RecordHead::read(stream).map_err(|e| corrupt(format!("record head unreadable: {e}")))?;
        if head.name != name {
            return Err(corrupt(format!(
                "offset table says {:?} but the record head says {:?}",
                name, head.name
            )));
        }

        let Some(deserialize) = self.registry.deserializer(&head.type_tag) else {
            return Err(corrupt(format!(
                "no deserializer registered for type tag {:?}",
                head.type_tag
            )));
        };

        self.state.write().pending.insert(name.to_string());
        let ctx = LoadContext::for_package(self, store);
        let result = deserialize(stream, &ctx);
        self.state.write().pending.remove(name);

        result.map_err(|e| match e {
            e @ StorageError::CorruptAsset { .. } => e,
            other => corrupt(other.to_string()),
        })
    }

    /// Install a freshly parsed asset unless a reentrant fetch got
    /// there first; the earlier instance wins because other assets may
    /// already hold it. The losing duplicate is disposed.
    fn install_loaded(&self, name: &str, asset: Arc<dyn Asset>) -> Arc<dyn Asset> {
        asset.common().attach_to(self.name());

        let existing = {
            let mut state = self.state.write();
            if let Some(existing) = state.assets.get(name) {
                Some(existing.clone())
            } else {
                state.assets.insert(name.to_string(), asset.clone());
                None
            }
        };

        match existing {
            Some(winner) => {
                asset.common().detach();
                asset.dispose();
                winner
            }
            None => asset,
        }
    }
}
