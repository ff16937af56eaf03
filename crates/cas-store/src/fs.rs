//! Filesystem blob store.
//!
//! Layout: `<root>/<type>/<first two hex chars>/<full hex hash>`, one file
//! per object. Writes go to a temporary file in the shard directory and are
//! renamed into place, so a reader never observes a partial object.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use cas_types::Link;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::traits::BlobStore;

/// Blob store over a local directory tree.
#[derive(Clone, Debug)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where the bytes for `link` live.
    pub fn object_path(&self, link: &Link) -> PathBuf {
        let hex = link.primary_hash.to_hex();
        self.root
            .join(link.object_type.as_str())
            .join(&hex[..2])
            .join(hex)
    }

    fn write_io(link: &Link, source: std::io::Error) -> StoreError {
        StoreError::WriteIo {
            object_type: link.object_type,
            hash: link.primary_hash,
            source,
        }
    }
}

impl BlobStore for FsBlobStore {
    /// Only a missing file counts as absent; any other failure to stat the
    /// path is reported as [`StoreError::ReadIo`].
    fn exists(&self, link: &Link) -> StoreResult<bool> {
        match fs::metadata(self.object_path(link)) {
            Ok(meta) => Ok(meta.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(StoreError::ReadIo {
                object_type: link.object_type,
                hash: link.primary_hash,
                source,
            }),
        }
    }

    fn write(&self, link: &Link, bytes: &[u8]) -> StoreResult<()> {
        // A stat failure falls through so the write reports it as WriteIo.
        if let Ok(true) = self.exists(link) {
            return Ok(());
        }
        let path = self.object_path(link);
        let dir = path
            .parent()
            .ok_or_else(|| Self::write_io(link, ErrorKind::InvalidInput.into()))?;
        fs::create_dir_all(dir).map_err(|e| Self::write_io(link, e))?;

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| Self::write_io(link, e))?;
        tmp.write_all(bytes).map_err(|e| Self::write_io(link, e))?;
        tmp.as_file().sync_all().map_err(|e| Self::write_io(link, e))?;
        tmp.persist(&path).map_err(|e| Self::write_io(link, e.error))?;

        debug!(hash = %link.primary_hash.short_hex(), object_type = %link.object_type, len = bytes.len(), "wrote object file");
        Ok(())
    }

    fn read(&self, link: &Link) -> StoreResult<Option<Vec<u8>>> {
        match fs::read(self.object_path(link)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::ReadIo {
                object_type: link.object_type,
                hash: link.primary_hash,
                source,
            }),
        }
    }

    fn delete(&self, link: &Link) -> StoreResult<bool> {
        match fs::remove_file(self.object_path(link)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cas_types::{ObjectHash, ObjectType};

    fn link(t: ObjectType, byte: u8) -> Link {
        Link::new(t, ObjectHash::from_hash([byte; 32]), "ignored")
    }

    #[test]
    fn layout_is_sharded_by_type_and_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::open(dir.path()).unwrap();
        let path = store.object_path(&link(ObjectType::List, 0xab));
        let rel = path.strip_prefix(dir.path()).unwrap();
        let parts: Vec<_> = rel.iter().map(|p| p.to_string_lossy().into_owned()).collect();
        assert_eq!(parts[0], "list");
        assert_eq!(parts[1], "ab");
        assert_eq!(parts[2], "ab".repeat(32));
    }

    #[test]
    fn write_read_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::open(dir.path().join("objects")).unwrap();
        let l = link(ObjectType::Blob, 1);

        assert!(!store.exists(&l).unwrap());
        assert!(store.read(&l).unwrap().is_none());

        store.write(&l, b"payload").unwrap();
        assert!(store.exists(&l).unwrap());
        assert_eq!(store.read(&l).unwrap().unwrap(), b"payload");

        assert!(store.delete(&l).unwrap());
        assert!(!store.delete(&l).unwrap());
        assert!(!store.exists(&l).unwrap());
    }

    #[test]
    fn rewrite_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::open(dir.path()).unwrap();
        let l = link(ObjectType::Tree, 2);
        store.write(&l, b"same").unwrap();
        store.write(&l, b"same").unwrap();
        assert_eq!(store.read(&l).unwrap().unwrap(), b"same");
    }

    #[test]
    fn no_temp_files_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::open(dir.path()).unwrap();
        let l = link(ObjectType::Blob, 3);
        store.write(&l, b"x").unwrap();
        let shard = store.object_path(&l).parent().unwrap().to_path_buf();
        assert_eq!(fs::read_dir(shard).unwrap().count(), 1);
    }

    #[test]
    fn unwritable_root_reports_tagged_write_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::open(dir.path()).unwrap();
        // A plain file where the type directory should be.
        fs::write(dir.path().join("commit"), b"not a directory").unwrap();
        let l = link(ObjectType::Commit, 4);
        let err = store.write(&l, b"x").unwrap_err();
        assert!(matches!(
            err,
            StoreError::WriteIo { object_type: ObjectType::Commit, hash, .. } if hash == l.primary_hash
        ));
    }

    #[test]
    fn stat_failure_is_not_reported_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::open(dir.path()).unwrap();
        let l = link(ObjectType::Blob, 5);
        // A plain file where the shard directory should be: stat fails with
        // something other than "not found".
        let shard = store.object_path(&l).parent().unwrap().to_path_buf();
        fs::create_dir_all(shard.parent().unwrap()).unwrap();
        fs::write(&shard, b"not a directory").unwrap();

        let err = store.exists(&l).unwrap_err();
        assert!(matches!(
            err,
            StoreError::ReadIo { object_type: ObjectType::Blob, hash, .. } if hash == l.primary_hash
        ));
        assert!(matches!(store.write(&l, b"x").unwrap_err(), StoreError::WriteIo { .. }));
    }
}
