//! Opaque-bytes asset variant.
//!
//! The simplest payload: a length-prefixed blob stored as-is. Hosts use
//! it for content the engine treats as opaque (lookup tables, text,
//! icon bitmaps) and new variants use it as the reference
//! implementation of the asset contract.

use std::any::Any;
use std::io::{Read, Write};

use bytes::Bytes;
use satchel_formats::{ReadSeek, wire};

use crate::asset::{Asset, AssetCommon, AssetType, LoadContext, SaveContext};
use crate::{Result, StorageError};

/// An asset whose payload is an opaque byte blob.
#[derive(Debug)]
pub struct RawAsset {
    common: AssetCommon,
    data: Bytes,
}

impl RawAsset {
    /// Create a raw asset from bytes.
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            common: AssetCommon::new(name, Self::VERSION),
            data: data.into(),
        }
    }

    /// Record the path of the originally imported file.
    #[must_use]
    pub fn with_source_path(mut self, path: impl Into<String>) -> Self {
        self.common = self.common.with_source_path(path);
        self
    }

    /// The payload bytes.
    pub const fn data(&self) -> &Bytes {
        &self.data
    }
}

impl Asset for RawAsset {
    fn common(&self) -> &AssetCommon {
        &self.common
    }

    fn type_tag(&self) -> &str {
        Self::TAG
    }

    fn serialize(&self, mut writer: &mut dyn Write, ctx: &SaveContext) -> Result<()> {
        ctx.ensure_writable()?;
        self.common.write_header(writer)?;

        let len = u32::try_from(self.data.len()).map_err(|_| {
            StorageError::InvalidOperation(format!(
                "raw asset {:?} holds {} bytes, more than the length field can carry",
                self.common.name(),
                self.data.len()
            ))
        })?;
        wire::write_u32(&mut writer, len)?;
        writer.write_all(&self.data)?;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl AssetType for RawAsset {
    const TAG: &'static str = "raw";
    const VERSION: u32 = 1;

    fn deserialize(mut reader: &mut dyn ReadSeek, _ctx: &LoadContext<'_>) -> Result<Self> {
        let mut common = AssetCommon::read(reader)?;

        let len = wire::read_u32(&mut reader)?;
        let mut data = Vec::new();
        Read::take(&mut reader, u64::from(len)).read_to_end(&mut data)?;
        if data.len() != len as usize {
            return Err(StorageError::CorruptAsset {
                name: common.name().to_string(),
                reason: format!("payload promises {len} bytes but only {} remain", data.len()),
            });
        }

        common.set_version(Self::VERSION);
        Ok(Self {
            common,
            data: Bytes::from(data),
        })
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use std::io::Cursor;

    use pretty_assertions::assert_eq;

    use super::*;

    fn write_payload(asset: &RawAsset) -> Vec<u8> {
        let mut buf = Vec::new();
        asset
            .serialize(&mut buf, &SaveContext::new("pkg", false))
            .expect("serialize");
        buf
    }

    #[test]
    fn test_round_trip() {
        let asset = RawAsset::new("Blob.bin", vec![7u8; 300]).with_source_path("import/blob.bin");
        let buf = write_payload(&asset);

        let mut cursor = Cursor::new(buf);
        let ctx = LoadContext::standalone("pkg");
        let parsed = RawAsset::deserialize(&mut cursor, &ctx).expect("deserialize");

        assert_eq!(parsed.name(), "Blob.bin");
        assert_eq!(parsed.version(), RawAsset::VERSION);
        assert_eq!(parsed.common().source_path(), Some("import/blob.bin"));
        assert_eq!(parsed.data(), asset.data());
    }

    #[test]
    fn test_read_only_context_refuses_serialize() {
        let asset = RawAsset::new("Blob.bin", vec![1, 2, 3]);
        let mut buf = Vec::new();
        let err = asset
            .serialize(&mut buf, &SaveContext::new("pkg", true))
            .expect_err("read-only context must refuse");
        assert!(matches!(err, StorageError::ReadOnly(_)));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_truncated_payload_is_corrupt() {
        let asset = RawAsset::new("Blob.bin", vec![9u8; 64]);
        let mut buf = write_payload(&asset);
        buf.truncate(buf.len() - 10);

        let mut cursor = Cursor::new(buf);
        let ctx = LoadContext::standalone("pkg");
        let err = RawAsset::deserialize(&mut cursor, &ctx).expect_err("must detect truncation");
        assert!(matches!(err, StorageError::CorruptAsset { .. }));
    }

    #[test]
    fn test_empty_payload_round_trips() {
        let asset = RawAsset::new("Empty.bin", Vec::new());
        let buf = write_payload(&asset);

        let mut cursor = Cursor::new(buf);
        let ctx = LoadContext::standalone("pkg");
        let parsed = RawAsset::deserialize(&mut cursor, &ctx).expect("deserialize");
        assert!(parsed.data().is_empty());
    }
}
