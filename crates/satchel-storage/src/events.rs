//! Store change notifications.
//!
//! Observers registered with [`PackageStore::subscribe`] are called
//! synchronously, on the mutating thread, after the change has been
//! applied. Editors use this to refresh views; headless hosts simply
//! register none.
//!
//! [`PackageStore::subscribe`]: crate::PackageStore::subscribe

/// A change made through a package's mutating operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// An asset was stored into a package, as an insert or a replace.
    AssetStored {
        /// Package that received the asset.
        package: String,
        /// Name the asset was stored under.
        asset: String,
    },
    /// An asset was deleted from a package.
    AssetRemoved {
        /// Package the asset was deleted from.
        package: String,
        /// Name of the deleted asset.
        asset: String,
    },
}

impl StoreEvent {
    /// Package the event concerns.
    pub fn package(&self) -> &str {
        match self {
            Self::AssetStored { package, .. } | Self::AssetRemoved { package, .. } => package,
        }
    }

    /// Asset the event concerns.
    pub fn asset(&self) -> &str {
        match self {
            Self::AssetStored { asset, .. } | Self::AssetRemoved { asset, .. } => asset,
        }
    }
}

/// Observer callback invoked after each change.
pub type ObserverFn = Box<dyn Fn(&StoreEvent) + Send + Sync>;
