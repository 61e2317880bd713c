//! A filesystem key/value store, one file per key.
//!
//! [`FsStore`] exposes a small string-keyed API used when writing fixture
//! metadata by hand, and implements the `zarrs` storage traits so the same
//! directory can back a [`zarrs::array::Array`].

use std::path::{Path, PathBuf};

use bytes::Bytes;
use walkdir::WalkDir;
use zarrs::storage::{
    ListableStorageTraits, MaybeBytes, MaybeBytesIterator, OffsetBytesIterator,
    ReadableStorageTraits, StorageError, StoreKey, StoreKeys, StoreKeysPrefixes, StorePrefix,
    StorePrefixes, WritableStorageTraits,
    byte_range::{ByteRangeIterator, InvalidByteRangeError},
    store_set_partial_many,
};

use crate::Error;

/// Key/value store backed by a directory.
///
/// Keys are slash-delimited and map to paths under the root;
/// a leading `/` is ignored.
/// There is no locking: concurrent writes to one key are last-write-wins.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Open a store at `root`, creating the directory and its ancestors if needed.
    pub fn new(root: impl Into<PathBuf>) -> crate::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key to its path under the root.
    pub fn key_to_path(&self, key: &str) -> PathBuf {
        let key = key.strip_prefix('/').unwrap_or(key);
        if key.is_empty() {
            self.root.clone()
        } else {
            self.root.join(key)
        }
    }

    fn path_to_key(&self, path: &Path) -> Option<StoreKey> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let s = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        StoreKey::new(s).ok()
    }

    /// Read the full value of `key`.
    ///
    /// Fails with [`Error::MissingKey`] if nothing has been written there;
    /// any other I/O failure is passed through.
    pub fn read(&self, key: &str) -> crate::Result<Bytes> {
        match std::fs::read(self.key_to_path(key)) {
            Ok(v) => Ok(Bytes::from(v)),
            Err(e)
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::NotFound | std::io::ErrorKind::NotADirectory
                ) =>
            {
                Err(Error::MissingKey(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write `value` to `key`, creating parent directories and replacing any previous value.
    pub fn write(&self, key: &str, value: &[u8]) -> crate::Result<()> {
        let path = self.key_to_path(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        log::debug!("writing {} bytes to {}", value.len(), path.display());
        std::fs::write(path, value)?;
        Ok(())
    }

    /// Serialize `value` as JSON and write it to `key`.
    pub fn write_json<T: serde::Serialize>(&self, key: &str, value: &T) -> crate::Result<()> {
        let v = serde_json::to_vec(value)?;
        self.write(key, &v)
    }

    /// Whether anything currently exists at the path for `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.key_to_path(key).exists()
    }

    fn prefix_to_path(&self, prefix: &StorePrefix) -> PathBuf {
        self.key_to_path(prefix.as_str())
    }

    fn walk_keys(&self, dir: &Path) -> StoreKeys {
        WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(std::result::Result::ok)
            .filter(|v| v.file_type().is_file())
            .filter_map(|v| self.path_to_key(v.path()))
            .collect()
    }
}

impl ReadableStorageTraits for FsStore {
    fn get(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError> {
        match self.read(key.as_str()) {
            Ok(b) => Ok(Some(b)),
            Err(Error::MissingKey(_)) => Ok(None),
            Err(Error::Io(e)) => Err(e.into()),
            Err(e) => Err(StorageError::Other(e.to_string())),
        }
    }

    fn get_partial_many<'a>(
        &'a self,
        key: &StoreKey,
        byte_ranges: ByteRangeIterator<'a>,
    ) -> Result<MaybeBytesIterator<'a>, StorageError> {
        let Some(data) = self.get(key)? else {
            return Ok(None);
        };
        let len = data.len() as u64;
        let out = Box::new(byte_ranges.map(move |byte_range| {
            let start = byte_range.start(len);
            let end = byte_range.end(len);
            if end > len || start > end {
                Err(InvalidByteRangeError::new(byte_range, len).into())
            } else {
                // both bounds are within an in-memory buffer
                Ok(data.slice(start as usize..end as usize))
            }
        }));
        Ok(Some(out))
    }

    fn size_key(&self, key: &StoreKey) -> Result<Option<u64>, StorageError> {
        match std::fs::metadata(self.key_to_path(key.as_str())) {
            Ok(m) if m.is_file() => Ok(Some(m.len())),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn supports_get_partial(&self) -> bool {
        true
    }
}

impl WritableStorageTraits for FsStore {
    fn set(&self, key: &StoreKey, value: Bytes) -> Result<(), StorageError> {
        self.write(key.as_str(), &value).map_err(|e| match e {
            Error::Io(e) => e.into(),
            e => StorageError::Other(e.to_string()),
        })
    }

    fn set_partial_many(
        &self,
        key: &StoreKey,
        offset_values: OffsetBytesIterator,
    ) -> Result<(), StorageError> {
        store_set_partial_many(self, key, offset_values)
    }

    fn erase(&self, key: &StoreKey) -> Result<(), StorageError> {
        match std::fs::remove_file(self.key_to_path(key.as_str())) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    fn erase_prefix(&self, prefix: &StorePrefix) -> Result<(), StorageError> {
        let path = self.prefix_to_path(prefix);
        let result = if path == self.root {
            // keep the root itself so the store stays usable
            std::fs::read_dir(&path).and_then(|entries| {
                for entry in entries {
                    let p = entry?.path();
                    if p.is_dir() {
                        std::fs::remove_dir_all(p)?;
                    } else {
                        std::fs::remove_file(p)?;
                    }
                }
                Ok(())
            })
        } else {
            std::fs::remove_dir_all(path)
        };
        match result {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    fn supports_set_partial(&self) -> bool {
        true
    }
}

impl ListableStorageTraits for FsStore {
    fn list(&self) -> Result<StoreKeys, StorageError> {
        Ok(self.walk_keys(&self.root))
    }

    fn list_prefix(&self, prefix: &StorePrefix) -> Result<StoreKeys, StorageError> {
        Ok(self.walk_keys(&self.prefix_to_path(prefix)))
    }

    fn list_dir(&self, prefix: &StorePrefix) -> Result<StoreKeysPrefixes, StorageError> {
        let mut keys: StoreKeys = vec![];
        let mut prefixes: StorePrefixes = vec![];
        let entries = match std::fs::read_dir(self.prefix_to_path(prefix)) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StoreKeysPrefixes::new(keys, prefixes));
            }
            Err(e) => return Err(e.into()),
        };
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type()?.is_dir() {
                prefixes.push(StorePrefix::new(format!("{}{name}/", prefix.as_str()))?);
            } else {
                keys.push(StoreKey::new(format!("{}{name}", prefix.as_str()))?);
            }
        }
        keys.sort();
        prefixes.sort();
        Ok(StoreKeysPrefixes::new(keys, prefixes))
    }

    fn size_prefix(&self, prefix: &StorePrefix) -> Result<u64, StorageError> {
        let mut size = 0;
        for key in self.list_prefix(prefix)? {
            if let Some(size_key) = self.size_key(&key)? {
                size += size_key;
            }
        }
        Ok(size)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    fn store() -> (tempfile::TempDir, FsStore) {
        let dir = tempfile::TempDir::new().unwrap();
        let store = FsStore::new(dir.path().join("root")).unwrap();
        (dir, store)
    }

    #[test]
    fn creates_root() {
        let (dir, store) = store();
        assert!(dir.path().join("root").is_dir());
        assert_eq!(store.root(), dir.path().join("root"));
    }

    #[test]
    fn read_missing_key() {
        let (_dir, store) = store();
        let err = store.read("0.0.0").unwrap_err();
        assert!(err.is_missing_key(), "unexpected error {err:?}");
    }

    #[test]
    fn read_error_kinds() -> Result<(), Box<dyn Error>> {
        let (_dir, store) = store();
        store.write("gzip/x", b"1")?;

        // a directory is not a value, and is not missing either
        let err = store.read("gzip").unwrap_err();
        let is_dir = std::io::ErrorKind::IsADirectory;
        assert!(
            matches!(&err, crate::Error::Io(e) if e.kind() == is_dir),
            "unexpected error {err:?}"
        );
        assert!(!err.is_missing_key());
        assert!(store.get(&StoreKey::new("gzip")?).is_err());

        let err = store.read("gzip/x/y").unwrap_err();
        assert!(
            matches!(&err, crate::Error::MissingKey(k) if k == "gzip/x/y"),
            "unexpected error {err:?}"
        );
        assert!(store.get(&StoreKey::new("gzip/x/y")?)?.is_none());
        Ok(())
    }

    #[test]
    fn write_then_read() -> Result<(), Box<dyn Error>> {
        let (_dir, store) = store();
        store.write(".zgroup", b"{\"zarr_format\":2}")?;
        assert_eq!(store.read(".zgroup")?.as_ref(), b"{\"zarr_format\":2}");
        Ok(())
    }

    #[test]
    fn write_overwrites() -> Result<(), Box<dyn Error>> {
        let (_dir, store) = store();
        store.write("k", b"a longer first value")?;
        store.write("k", b"short")?;
        assert_eq!(store.read("k")?.as_ref(), b"short");
        Ok(())
    }

    #[test]
    fn contains_tracks_writes() -> Result<(), Box<dyn Error>> {
        let (_dir, store) = store();
        assert!(!store.contains("gzip/.zarray"));
        store.write("gzip/.zarray", b"{}")?;
        assert!(store.contains("gzip/.zarray"));
        assert!(store.contains("gzip"));
        Ok(())
    }

    #[test]
    fn write_creates_parents() -> Result<(), Box<dyn Error>> {
        let (_dir, store) = store();
        store.write("a/b/c", &[1, 2, 3])?;
        assert!(store.key_to_path("a/b").is_dir());
        assert_eq!(store.read("/a/b/c")?.as_ref(), &[1, 2, 3]);
        Ok(())
    }

    #[test]
    fn storage_traits() -> Result<(), Box<dyn Error>> {
        let (_dir, store) = store();
        let missing = StoreKey::new("nothing")?;
        assert!(store.get(&missing)?.is_none());
        assert!(store.size_key(&missing)?.is_none());
        store.erase(&missing)?;

        store.set(&StoreKey::new("a/b")?, Bytes::from_static(&[0, 1, 2, 3]))?;
        store.set(&StoreKey::new("a/c/d")?, Bytes::from_static(&[4]))?;
        store.set(&StoreKey::new("e")?, Bytes::from_static(&[5, 6]))?;

        assert_eq!(store.size_key(&StoreKey::new("a/b")?)?, Some(4));
        assert_eq!(
            store.list()?,
            vec![
                StoreKey::new("a/b")?,
                StoreKey::new("a/c/d")?,
                StoreKey::new("e")?
            ]
        );
        assert_eq!(
            store.list_prefix(&StorePrefix::new("a/")?)?,
            vec![StoreKey::new("a/b")?, StoreKey::new("a/c/d")?]
        );
        let dir = store.list_dir(&StorePrefix::new("a/")?)?;
        assert_eq!(dir.keys(), &vec![StoreKey::new("a/b")?]);
        assert_eq!(dir.prefixes(), &vec![StorePrefix::new("a/c/")?]);
        assert_eq!(store.size_prefix(&StorePrefix::new("a/")?)?, 5);

        store.erase_prefix(&StorePrefix::new("a/")?)?;
        assert_eq!(store.list()?, vec![StoreKey::new("e")?]);
        Ok(())
    }
}
