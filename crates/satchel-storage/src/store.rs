//! The package store: name resolution, live instances, lifecycle.

use std::path::Path;
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::RwLock;
use satchel_formats::{ByteSource, ValidationReport, validate};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::asset::{Asset, AssetRef, AssetRegistry};
use crate::config::StoreConfig;
use crate::events::{ObserverFn, StoreEvent};
use crate::package::Package;
use crate::{Result, StorageError, TRANSIENT_PACKAGE};

/// Counters over the store's current contents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Names the location map can resolve.
    pub registered_packages: usize,
    /// Packages currently instantiated.
    pub live_packages: usize,
    /// Assets materialized across all live packages.
    pub loaded_assets: usize,
}

/// The explicit root object of the asset system.
///
/// Owns the location map (package name to byte source, built once at
/// open), the live map (package name to its single shared [`Package`]),
/// the deserializer registry, and the observer list. Hosts construct
/// one store per content world and pass the `Arc` around; nothing in
/// this crate reaches for a global.
pub struct PackageStore {
    config: StoreConfig,
    registry: Arc<AssetRegistry>,
    locations: DashMap<String, ByteSource>,
    live: DashMap<String, Arc<Package>>,
    observers: RwLock<Vec<ObserverFn>>,
    weak_self: Weak<Self>,
}

impl PackageStore {
    /// Open a store: register bundled blobs, scan the content root for
    /// package files, seat the transient package.
    ///
    /// Scanning only records locations; no package is loaded here. A
    /// writable store creates a missing content root; a read-only store
    /// treats one as simply having nothing on disk.
    pub fn open(config: StoreConfig, registry: AssetRegistry) -> Result<Arc<Self>> {
        let store = Arc::new_cyclic(|weak_self| Self {
            config,
            registry: Arc::new(registry),
            locations: DashMap::new(),
            live: DashMap::new(),
            observers: RwLock::new(Vec::new()),
            weak_self: weak_self.clone(),
        });

        if !store.config.read_only && !store.config.content_root.exists() {
            std::fs::create_dir_all(&store.config.content_root)?;
        }

        store.build_location_map();
        store.live.insert(
            TRANSIENT_PACKAGE.to_string(),
            Arc::new(Package::new_transient(
                store.registry.clone(),
                store.weak_self.clone(),
            )),
        );

        info!(
            "package store opened: {} packages under {}",
            store.locations.len(),
            store.config.content_root.display()
        );
        Ok(store)
    }

    fn build_location_map(&self) {
        let extension = self.config.package_extension.as_str();

        // Bundled blobs first so built-in content cannot be shadowed by
        // a stray file of the same name.
        for blob in &self.config.bundled {
            let Some(name) = package_name_from_id(&blob.id, extension) else {
                warn!(
                    "bundled blob {:?} does not name a .{extension} package, ignoring",
                    blob.id
                );
                continue;
            };
            self.register_location(name, ByteSource::Bundled(blob.clone()));
        }

        let root = &self.config.content_root;
        if !root.exists() {
            debug!("content root {} does not exist, nothing to scan", root.display());
            return;
        }

        for entry in WalkDir::new(root).follow_links(true) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("content scan error under {}: {e}", root.display());
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(extension) {
                continue;
            }
            let Some(name) = path.file_stem().and_then(|stem| stem.to_str()) else {
                warn!("package file {} has an unusable name, ignoring", path.display());
                continue;
            };
            self.register_location(name.to_string(), ByteSource::File(path.to_path_buf()));
        }
    }

    /// First registration of a name wins; later ones are logged and
    /// dropped. The transient name is reserved.
    fn register_location(&self, name: String, source: ByteSource) {
        if name == TRANSIENT_PACKAGE {
            warn!(
                "package name {:?} is reserved for the in-memory package, ignoring {}",
                name,
                source.describe()
            );
            return;
        }
        if let Some(existing) = self.locations.get(&name) {
            warn!(
                "duplicate package name {:?}: keeping {}, ignoring {}",
                name,
                existing.describe(),
                source.describe()
            );
            return;
        }

        debug!("registered package {:?} from {}", name, source.describe());
        self.locations.insert(name, source);
    }

    /// Get the live instance for `name`, constructing and loading it on
    /// first access.
    ///
    /// Every call for the same name returns the same instance until
    /// [`cleanup`](Self::cleanup). `None` means the name is not
    /// registered. A package whose backing bytes are damaged still
    /// comes back live so the host holds the handle it asked for; the
    /// load failure is logged and the instance reports unloaded.
    pub fn load_package(&self, name: &str, eager: bool) -> Option<Arc<Package>> {
        if let Some(package) = self.live.get(name) {
            return Some(package.clone());
        }

        let Some(source) = self.locations.get(name).map(|entry| entry.clone()) else {
            warn!("no package registered under {:?}", name);
            return None;
        };

        // Bundled blobs are one-shot streams: take everything now
        // rather than betting on a later re-open.
        let eager = eager || !source.supports_random_access();

        let package = self
            .live
            .entry(name.to_string())
            .or_insert_with(|| {
                Arc::new(Package::new_file(
                    name,
                    source,
                    eager,
                    self.registry.clone(),
                    self.weak_self.clone(),
                ))
            })
            .clone();

        if let Err(e) = package.load(eager) {
            warn!("package {:?}: load failed: {e}", name);
        }

        Some(package)
    }

    /// Get or create a package named `name` that will save to `target`.
    ///
    /// An already-live instance is returned as-is, and a name the
    /// location map resolves loads from its existing source instead of
    /// creating anew. A genuinely new package starts empty and loaded;
    /// nothing exists at `target` until the first save.
    pub fn create_package(&self, name: &str, target: impl AsRef<Path>) -> Arc<Package> {
        if let Some(package) = self.live.get(name) {
            return package.clone();
        }
        if self.locations.contains_key(name)
            && let Some(package) = self.load_package(name, false)
        {
            return package;
        }

        let source = ByteSource::File(target.as_ref().to_path_buf());
        let package = Arc::new(Package::new_created(
            name,
            source.clone(),
            self.registry.clone(),
            self.weak_self.clone(),
        ));
        self.locations.insert(name.to_string(), source);
        self.live.insert(name.to_string(), package.clone());

        debug!("created package {:?} targeting {}", name, target.as_ref().display());
        package
    }

    /// Whether `name` resolves to a registered backing source.
    ///
    /// A pure location map lookup: nothing is constructed or loaded.
    pub fn package_exists(&self, name: &str) -> bool {
        self.locations.contains_key(name)
    }

    /// The always-resident in-memory package.
    pub fn transient(&self) -> Arc<Package> {
        if let Some(package) = self.live.get(TRANSIENT_PACKAGE) {
            return package.clone();
        }

        let package = Arc::new(Package::new_transient(
            self.registry.clone(),
            self.weak_self.clone(),
        ));
        self.live
            .insert(TRANSIENT_PACKAGE.to_string(), package.clone());
        package
    }

    /// Resolve a cross-package asset reference.
    ///
    /// References without a package name cannot be resolved at store
    /// level and come back `None`.
    pub fn fetch_asset(&self, reference: &AssetRef) -> Option<Arc<dyn Asset>> {
        let target = reference.package.as_deref()?;
        let package = self.load_package(target, false)?;
        package.fetch(&reference.name)
    }

    /// Structurally validate a registered package's backing bytes.
    pub fn validate_package(&self, name: &str) -> Result<ValidationReport> {
        let source = self
            .locations
            .get(name)
            .map(|entry| entry.clone())
            .ok_or_else(|| StorageError::PackageNotFound(name.to_string()))?;
        Ok(validate(&source)?)
    }

    /// Dispose every live package and drop the instances. Locations are
    /// kept, so anything can be loaded again; a fresh transient package
    /// is seated.
    pub fn cleanup(&self) {
        let live: Vec<Arc<Package>> = self
            .live
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        self.live.clear();

        for package in &live {
            package.dispose();
        }

        self.live.insert(
            TRANSIENT_PACKAGE.to_string(),
            Arc::new(Package::new_transient(
                self.registry.clone(),
                self.weak_self.clone(),
            )),
        );

        info!(
            "package store cleaned up: {} instances dropped, {} locations kept",
            live.len(),
            self.locations.len()
        );
    }

    /// Register an observer invoked synchronously after every mutating
    /// asset operation, on the thread that performed it.
    pub fn subscribe(&self, observer: impl Fn(&StoreEvent) + Send + Sync + 'static) {
        self.observers.write().push(Box::new(observer));
    }

    pub(crate) fn emit(&self, event: &StoreEvent) {
        for observer in self.observers.read().iter() {
            observer(event);
        }
    }

    /// Store configuration.
    pub const fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// The deserializer registry shared by every package.
    pub const fn registry(&self) -> &Arc<AssetRegistry> {
        &self.registry
    }

    /// Names of every registered package, sorted.
    pub fn package_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.locations.iter().map(|e| e.key().clone()).collect();
        names.sort_unstable();
        names
    }

    /// Counters over the store's current contents.
    pub fn stats(&self) -> StoreStats {
        let loaded_assets = self
            .live
            .iter()
            .map(|entry| entry.value().loaded_asset_count())
            .sum();
        StoreStats {
            registered_packages: self.locations.len(),
            live_packages: self.live.len(),
            loaded_assets,
        }
    }
}

/// Package name for a bundled blob id: the final path segment with the
/// package extension stripped.
fn package_name_from_id(id: &str, extension: &str) -> Option<String> {
    let file_name = id.rsplit(['/', '\\']).next()?;
    let stem = file_name.strip_suffix(&format!(".{extension}"))?;
    if stem.is_empty() {
        None
    } else {
        Some(stem.to_string())
    }
}
