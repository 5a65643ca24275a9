//! Content-addressed blob store.
//!
//! Objects are immutable byte strings named by the hex SHA-256 of their bytes
//! and laid out git-style: `<root>/ab/cd/<remaining 60 hex chars>`. A put
//! writes to a temporary sibling, fsyncs, then renames into place, so a reader
//! sees either the whole object or nothing.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::StorageError;

/// Hex SHA-256 of `bytes`; the id a put of those bytes returns.
pub fn content_id(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// `true` when `id` has the shape of a content id (64 lowercase hex chars).
pub fn is_valid_id(id: &str) -> bool {
    id.len() == 64 && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

fn io_err(op: &'static str, path: &Path) -> impl FnOnce(std::io::Error) -> StorageError {
    let path = path.to_path_buf();
    move |source| StorageError::Io { op, path, source }
}

/// Flush a directory entry so a rename into it survives a crash.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<(), StorageError> {
    File::open(dir)
        .and_then(|d| d.sync_all())
        .map_err(io_err("sync", dir))
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<(), StorageError> {
    Ok(())
}

#[derive(Debug, Clone)]
pub struct ContentStore {
    root: PathBuf,
}

impl ContentStore {
    /// Open the store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| StorageError::Io {
            op: "create",
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    fn object_path(&self, id: &str) -> PathBuf {
        self.root.join(&id[0..2]).join(&id[2..4]).join(&id[4..])
    }

    /// Store `bytes` and return their id. Writing the same bytes twice is a
    /// no-op the second time.
    pub fn put(&self, bytes: &[u8]) -> Result<String, StorageError> {
        let id = content_id(bytes);
        let path = self.object_path(&id);
        if path.exists() {
            return Ok(id);
        }

        let dir = path.parent().unwrap_or(self.root.as_path());
        fs::create_dir_all(dir).map_err(io_err("create", dir))?;

        let tmp_path = dir.join(format!(".{}.tmp-{}", &id[4..], std::process::id()));
        {
            let mut file = File::create(&tmp_path).map_err(io_err("write", &tmp_path))?;
            file.write_all(bytes).map_err(io_err("write", &tmp_path))?;
            file.sync_all().map_err(io_err("sync", &tmp_path))?;
        }
        if let Err(source) = fs::rename(&tmp_path, &path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(StorageError::Io {
                op: "rename",
                path,
                source,
            });
        }
        sync_dir(dir)?;

        tracing::debug!(content_id = %id, size = bytes.len(), "content object written");
        Ok(id)
    }

    /// Fetch the bytes for `id`. `Ok(None)` when the object was never written
    /// or has been removed from disk.
    pub fn get(&self, id: &str) -> Result<Option<Vec<u8>>, StorageError> {
        if !is_valid_id(id) {
            return Ok(None);
        }
        let path = self.object_path(id);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StorageError::Io {
                op: "read",
                path,
                source,
            }),
        }
    }

    /// Number of objects on disk and their total size in bytes.
    pub fn usage(&self) -> Result<(usize, u64), StorageError> {
        fn walk(dir: &Path, count: &mut usize, bytes: &mut u64) -> std::io::Result<()> {
            for entry in fs::read_dir(dir)? {
                let entry = entry?;
                let meta = entry.metadata()?;
                if meta.is_dir() {
                    walk(&entry.path(), count, bytes)?;
                } else if !entry.file_name().to_string_lossy().starts_with('.') {
                    *count += 1;
                    *bytes += meta.len();
                }
            }
            Ok(())
        }

        let (mut count, mut bytes) = (0, 0);
        walk(&self.root, &mut count, &mut bytes).map_err(|source| StorageError::Io {
            op: "scan",
            path: self.root.clone(),
            source,
        })?;
        Ok((count, bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn put_then_get_returns_bytes() {
        let tmp = TempDir::new().unwrap();
        let store = ContentStore::open(tmp.path().join("objects")).unwrap();

        let id = store.put(b"#!/bin/sh\necho hi\n").unwrap();
        assert!(is_valid_id(&id));
        assert_eq!(store.get(&id).unwrap().unwrap(), b"#!/bin/sh\necho hi\n");
    }

    #[test]
    fn put_is_idempotent() {
        let tmp = TempDir::new().unwrap();
        let store = ContentStore::open(tmp.path()).unwrap();

        let a = store.put(b"same").unwrap();
        let b = store.put(b"same").unwrap();
        assert_eq!(a, b);
        assert_eq!(store.usage().unwrap(), (1, 4));
    }

    #[test]
    fn put_leaves_only_the_renamed_object() {
        let tmp = TempDir::new().unwrap();
        let store = ContentStore::open(tmp.path()).unwrap();

        let id = store.put(b"durable").unwrap();
        let dir = store.object_path(&id).parent().unwrap().to_path_buf();
        let names: Vec<String> = std::fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![id[4..].to_string()]);
        assert_eq!(store.get(&id).unwrap().unwrap(), b"durable");
    }

    #[test]
    fn objects_fan_out_by_prefix() {
        let tmp = TempDir::new().unwrap();
        let store = ContentStore::open(tmp.path()).unwrap();

        let id = store.put(b"fan-out").unwrap();
        let expected = tmp.path().join(&id[0..2]).join(&id[2..4]).join(&id[4..]);
        assert!(expected.is_file());
    }

    #[test]
    fn unknown_and_malformed_ids_are_absent() {
        let tmp = TempDir::new().unwrap();
        let store = ContentStore::open(tmp.path()).unwrap();

        assert!(store.get(&"0".repeat(64)).unwrap().is_none());
        assert!(store.get("../../etc/passwd").unwrap().is_none());
        assert!(store.get("abc").unwrap().is_none());
    }

    #[test]
    fn externally_removed_object_reads_as_absent() {
        let tmp = TempDir::new().unwrap();
        let store = ContentStore::open(tmp.path()).unwrap();

        let id = store.put(b"transient").unwrap();
        std::fs::remove_file(store.object_path(&id)).unwrap();
        assert!(store.get(&id).unwrap().is_none());
    }

    #[test]
    fn empty_content_has_the_well_known_digest() {
        assert_eq!(
            content_id(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
