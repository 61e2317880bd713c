use bytes::{Buf, Bytes};
use zarrs::{
    metadata::v3::NodeMetadataV3,
    storage::{
        ListableStorageTraits, MaybeBytes, MaybeBytesIterator, ReadableStorageTraits, StorageError,
        StoreKey, StoreKeys, StoreKeysPrefixes, StorePrefix,
        byte_range::{ByteRange, ByteRangeIterator},
    },
};

use super::metadata::N5Metadata;

const N5_METADATA_KEY: &str = "attributes.json";

/// Read-only adapter presenting an N5 hierarchy as Zarr V3.
///
/// Requests for `zarr.json` are answered from the sibling `attributes.json`,
/// converted on the fly. Everything else is passed through.
pub struct N5Store<R> {
    inner: R,
}

impl<R> N5Store<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Map requests for zarr.json to attributes.json.
    ///
    /// Returns None if the request was _not_ for a zarr.json object.
    fn intercept_zarr_json(&self, key: &StoreKey) -> Result<Option<StoreKey>, StorageError> {
        let s = key.as_str();
        let (prefix, suffix) = match s.rsplit_once('/') {
            Some(tup) => tup,
            None => ("", s),
        };
        if suffix != "zarr.json" {
            return Ok(None);
        }
        let k = if prefix.is_empty() {
            StoreKey::new(N5_METADATA_KEY)?
        } else {
            StoreKey::new(format!("{prefix}/{N5_METADATA_KEY}"))?
        };
        Ok(Some(k))
    }

    /// Convert N5 metadata to Zarr metadata.
    fn convert_metadata(
        &self,
        key: &StoreKey,
        bytes: Option<Bytes>,
    ) -> Result<Option<Bytes>, StorageError> {
        let Some(b) = bytes else {
            return Ok(None);
        };
        let invalid = |msg: String| StorageError::InvalidMetadata(key.clone(), msg);
        let n5: N5Metadata = serde_json::from_reader(b.reader())
            .map_err(|e| invalid(format!("could not parse N5 metadata: {e}")))?;
        let zarr: NodeMetadataV3 = n5
            .try_into()
            .map_err(|e| invalid(format!("could not convert N5 metadata to Zarr metadata: {e}")))?;
        let v = serde_json::to_vec(&zarr)
            .map_err(|e| invalid(format!("could not serialize Zarr metadata: {e}")))?;
        Ok(Some(Bytes::from(v)))
    }
}

impl<R: ReadableStorageTraits> ReadableStorageTraits for N5Store<R> {
    fn size_key(&self, key: &StoreKey) -> Result<Option<u64>, StorageError> {
        if let Some(k) = self.intercept_zarr_json(key)? {
            self.inner.size_key(&k)
        } else {
            self.inner.size_key(key)
        }
    }

    fn supports_get_partial(&self) -> bool {
        false
    }

    fn get(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError> {
        if let Some(k) = self.intercept_zarr_json(key)? {
            self.convert_metadata(&k, self.inner.get(&k)?)
        } else {
            self.inner.get(key)
        }
    }

    fn get_partial_many<'a>(
        &'a self,
        _key: &StoreKey,
        _byte_ranges: ByteRangeIterator<'a>,
    ) -> Result<MaybeBytesIterator<'a>, StorageError> {
        Err(StorageError::Unsupported(
            "get_partial_many not supported".into(),
        ))
    }

    fn get_partial(
        &self,
        _key: &StoreKey,
        _byte_range: ByteRange,
    ) -> Result<MaybeBytes, StorageError> {
        Err(StorageError::Unsupported(
            "get_partial not supported".into(),
        ))
    }
}

impl<R: ListableStorageTraits> ListableStorageTraits for N5Store<R> {
    fn list(&self) -> Result<StoreKeys, StorageError> {
        self.inner.list()
    }

    fn list_prefix(&self, prefix: &StorePrefix) -> Result<StoreKeys, StorageError> {
        self.inner.list_prefix(prefix)
    }

    fn list_dir(&self, prefix: &StorePrefix) -> Result<StoreKeysPrefixes, StorageError> {
        self.inner.list_dir(prefix)
    }

    fn size_prefix(&self, prefix: &StorePrefix) -> Result<u64, StorageError> {
        self.inner.size_prefix(prefix)
    }

    fn size(&self) -> Result<u64, StorageError> {
        self.inner.size()
    }
}
