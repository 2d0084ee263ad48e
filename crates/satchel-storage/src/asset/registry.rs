//! Deserializer registration: type tag to typed factory.

use std::collections::HashMap;
use std::sync::Arc;

use satchel_formats::ReadSeek;
use tracing::{debug, warn};

use crate::Result;
use crate::asset::raw::RawAsset;
use crate::asset::{Asset, AssetType, LoadContext};

/// Boxed deserializer producing a shared asset from a record payload.
pub type DeserializeFn =
    Box<dyn Fn(&mut dyn ReadSeek, &LoadContext<'_>) -> Result<Arc<dyn Asset>> + Send + Sync>;

/// Registry mapping record type tags to deserializers.
///
/// Hosts register every variant at startup, then hand the registry to
/// [`PackageStore::open`](crate::PackageStore::open), which freezes it
/// behind an `Arc` shared by every package. Records whose tag has no
/// entry are treated as corrupt at load time.
#[derive(Default)]
pub struct AssetRegistry {
    factories: HashMap<String, DeserializeFn>,
}

impl AssetRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in variants registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register::<RawAsset>();
        registry
    }

    /// Register a variant under its [`AssetType::TAG`].
    ///
    /// A tag registered twice keeps the first deserializer; the
    /// collision is logged.
    pub fn register<T: AssetType>(&mut self) {
        if self.factories.contains_key(T::TAG) {
            warn!(
                "asset type tag {:?} already registered, keeping the first",
                T::TAG
            );
            return;
        }

        debug!("registered asset type {:?} (version {})", T::TAG, T::VERSION);
        self.factories.insert(
            T::TAG.to_string(),
            Box::new(|reader, ctx| Ok(Arc::new(T::deserialize(reader, ctx)?) as Arc<dyn Asset>)),
        );
    }

    /// Look up the deserializer for a type tag.
    pub fn deserializer(&self, tag: &str) -> Option<&DeserializeFn> {
        self.factories.get(tag)
    }

    /// Whether a type tag has a registered deserializer.
    pub fn contains(&self, tag: &str) -> bool {
        self.factories.contains_key(tag)
    }

    /// Number of registered type tags.
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Whether no variants are registered.
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Registered type tags, sorted.
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }
}
