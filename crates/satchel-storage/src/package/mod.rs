//! A loaded package: the runtime object over one container.
//!
//! Each package name maps to at most one live [`Package`], shared as
//! `Arc<Package>` by everything that touches it. The package holds two
//! views of its content: the offset map read from the container's
//! table (what is on disk) and the asset map (what is materialized in
//! memory). [`Package::fetch`] consults them in that order of
//! preference, pulling single records from disk on demand when the
//! offset map knows a name the asset map does not.

mod load;
mod save;

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use satchel_formats::{ByteSource, FORMAT_VERSION, OffsetEntry};
use tracing::{debug, warn};

use crate::asset::{Asset, AssetRegistry};
use crate::events::StoreEvent;
use crate::store::PackageStore;
use crate::{Result, StorageError, TRANSIENT_PACKAGE};

/// Mutable package state.
///
/// The lock around this is held for map and flag access only, never
/// across I/O, deserialization, dispose, or observer calls. That
/// discipline is what lets a deserializer fetch a sibling asset on the
/// same thread while its own record is still being read.
#[derive(Default)]
struct PackageState {
    /// Container format version of the backing bytes.
    version: u32,
    /// The offset table has been installed; partial record failures do
    /// not clear this.
    loaded: bool,
    /// A load is in progress. Guards against reentrant full loads.
    loading: bool,
    /// In-memory content diverges from the backing bytes.
    needs_save: bool,
    /// Offset table in file order.
    offsets: Vec<OffsetEntry>,
    /// Name to file offset, for on-demand fetches.
    offset_index: HashMap<String, u64>,
    /// Materialized assets.
    assets: HashMap<String, Arc<dyn Asset>>,
    /// Names currently being deserialized; breaks dependency cycles.
    pending: HashSet<String>,
}

/// A named collection of assets bound to at most one byte source.
pub struct Package {
    name: String,
    transient: bool,
    eager_default: bool,
    source: Option<ByteSource>,
    registry: Arc<AssetRegistry>,
    store: Weak<PackageStore>,
    state: RwLock<PackageState>,
}

impl Package {
    /// Package over an existing byte source, not yet loaded.
    pub(crate) fn new_file(
        name: impl Into<String>,
        source: ByteSource,
        eager_default: bool,
        registry: Arc<AssetRegistry>,
        store: Weak<PackageStore>,
    ) -> Self {
        Self {
            name: name.into(),
            transient: false,
            eager_default,
            source: Some(source),
            registry,
            store,
            state: RwLock::new(PackageState::default()),
        }
    }

    /// Fresh empty package that will save to `source`. Starts loaded;
    /// nothing exists on disk until the first save.
    pub(crate) fn new_created(
        name: impl Into<String>,
        source: ByteSource,
        registry: Arc<AssetRegistry>,
        store: Weak<PackageStore>,
    ) -> Self {
        let package = Self {
            name: name.into(),
            transient: false,
            eager_default: true,
            source: Some(source),
            registry,
            store,
            state: RwLock::new(PackageState::default()),
        };
        {
            let mut state = package.state.write();
            state.loaded = true;
            state.version = FORMAT_VERSION;
        }
        package
    }

    /// The in-memory session package. No source, never saved.
    pub(crate) fn new_transient(registry: Arc<AssetRegistry>, store: Weak<PackageStore>) -> Self {
        let package = Self {
            name: TRANSIENT_PACKAGE.to_string(),
            transient: true,
            eager_default: true,
            source: None,
            registry,
            store,
            state: RwLock::new(PackageState::default()),
        };
        {
            let mut state = package.state.write();
            state.loaded = true;
            state.version = FORMAT_VERSION;
        }
        package
    }

    /// Package name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this is the in-memory session package.
    pub const fn is_transient(&self) -> bool {
        self.transient
    }

    /// Whether the offset table has been installed.
    ///
    /// True after any successful load, including one that skipped
    /// damaged records along the way.
    pub fn is_loaded(&self) -> bool {
        self.state.read().loaded
    }

    /// Whether in-memory content diverges from the backing bytes.
    pub fn needs_save(&self) -> bool {
        self.state.read().needs_save
    }

    /// Container format version of the backing bytes, once loaded.
    pub fn version(&self) -> u32 {
        self.state.read().version
    }

    /// Number of currently materialized assets.
    pub fn loaded_asset_count(&self) -> usize {
        self.state.read().assets.len()
    }

    /// Number of distinct asset names the package knows, materialized
    /// or still on disk.
    pub fn asset_count(&self) -> usize {
        let state = self.state.read();
        let mut names: HashSet<&str> = state.offset_index.keys().map(String::as_str).collect();
        names.extend(state.assets.keys().map(String::as_str));
        names.len()
    }

    /// Every asset name the package knows, sorted.
    pub fn asset_names(&self) -> Vec<String> {
        let state = self.state.read();
        let mut names: BTreeSet<String> = state.offset_index.keys().cloned().collect();
        names.extend(state.assets.keys().cloned());
        names.into_iter().collect()
    }

    /// Whether the package currently knows `name`, without loading
    /// anything.
    pub fn contains(&self, name: &str) -> bool {
        let state = self.state.read();
        state.assets.contains_key(name) || state.offset_index.contains_key(name)
    }

    /// Description of the backing source, for diagnostics.
    pub fn source_description(&self) -> Option<String> {
        self.source.as_ref().map(ByteSource::describe)
    }

    pub(crate) const fn source(&self) -> Option<&ByteSource> {
        self.source.as_ref()
    }

    /// Fetch an asset by name.
    ///
    /// Checks materialized assets first. A cold package is loaded with
    /// its default eagerness on first touch. Names the asset map does
    /// not hold are pulled from disk through the offset map. `None`
    /// means the name cannot be resolved at all; failures along the way
    /// are logged, never raised.
    pub fn fetch(&self, name: &str) -> Option<Arc<dyn Asset>> {
        if let Some(asset) = self.state.read().assets.get(name) {
            return Some(asset.clone());
        }

        let cold = {
            let state = self.state.read();
            !state.loaded && !state.loading
        };
        if cold && let Err(e) = self.load(self.eager_default) {
            warn!("package {:?}: load during fetch failed: {e}", self.name);
        }

        if let Some(asset) = self.state.read().assets.get(name) {
            return Some(asset.clone());
        }

        match self.fetch_from_offset(name) {
            Ok(found) => {
                if found.is_none() {
                    debug!("package {:?}: no asset named {:?}", self.name, name);
                }
                found
            }
            Err(e) => {
                warn!(
                    "package {:?}: on-demand fetch of {:?} failed: {e}",
                    self.name, name
                );
                None
            }
        }
    }

    /// Like [`fetch`](Self::fetch), failing with
    /// [`StorageError::AssetNotFound`] when the name cannot be resolved.
    pub fn fetch_required(&self, name: &str) -> Result<Arc<dyn Asset>> {
        self.fetch(name).ok_or_else(|| StorageError::AssetNotFound {
            package: self.name.clone(),
            asset: name.to_string(),
        })
    }

    /// Insert or replace an asset under `name`.
    ///
    /// Replacing a different object disposes the replaced one; storing
    /// the same object again is an idempotent touch. Marks the package
    /// dirty (the transient package never is) and notifies observers.
    pub fn store_asset(&self, name: impl Into<String>, asset: Arc<dyn Asset>) {
        let name = name.into();
        asset.common().attach_to(&self.name);

        let previous = {
            let mut state = self.state.write();
            let previous = state.assets.insert(name.clone(), asset.clone());
            if !self.transient {
                state.needs_save = true;
            }
            previous
        };

        if let Some(previous) = previous
            && !Arc::ptr_eq(&previous, &asset)
        {
            previous.common().detach();
            previous.dispose();
        }

        debug!("package {:?}: stored asset {:?}", self.name, name);
        self.notify(&StoreEvent::AssetStored {
            package: self.name.clone(),
            asset: name,
        });
    }

    /// Delete an asset by name. Returns whether anything was removed.
    ///
    /// The package is fully materialized first so the on-disk record
    /// cannot resurface on the next save. The removed asset is
    /// disposed.
    pub fn delete_asset(&self, name: &str) -> bool {
        if let Err(e) = self.ensure_fully_loaded() {
            warn!("package {:?}: load before delete failed: {e}", self.name);
        }

        let removed = {
            let mut state = self.state.write();
            let removed = state.assets.remove(name);
            if removed.is_some() {
                state.offset_index.remove(name);
                state.offsets.retain(|entry| entry.name != name);
                if !self.transient {
                    state.needs_save = true;
                }
            }
            removed
        };

        let Some(asset) = removed else {
            debug!("package {:?}: delete of unknown asset {:?}", self.name, name);
            return false;
        };

        asset.common().detach();
        asset.dispose();

        debug!("package {:?}: deleted asset {:?}", self.name, name);
        self.notify(&StoreEvent::AssetRemoved {
            package: self.name.clone(),
            asset: name.to_string(),
        });
        true
    }

    /// Dispose every materialized asset and drop all runtime state.
    ///
    /// The package object stays valid and registered; a later fetch
    /// loads from the backing bytes again. Unsaved changes are lost.
    pub fn dispose(&self) {
        let assets = {
            let mut state = self.state.write();
            let assets: Vec<Arc<dyn Asset>> = state.assets.drain().map(|(_, a)| a).collect();
            state.offsets.clear();
            state.offset_index.clear();
            state.pending.clear();
            state.loaded = false;
            state.loading = false;
            state.needs_save = false;
            assets
        };

        for asset in &assets {
            asset.common().detach();
            asset.dispose();
        }

        debug!(
            "package {:?}: disposed {} materialized assets",
            self.name,
            assets.len()
        );
    }

    fn notify(&self, event: &StoreEvent) {
        if let Some(store) = self.store.upgrade() {
            store.emit(event);
        }
    }

    fn store_read_only(&self) -> bool {
        self.store
            .upgrade()
            .is_some_and(|store| store.config().read_only)
    }
}
