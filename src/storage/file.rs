//! Persistent-scoped storage backed by a JSON file.
//!
//! The file holds a single JSON object of string values. Writers serialize on
//! an exclusive `fs2` lock taken on a sibling `.lock` file and replace the data
//! file atomically (temp file + rename), so readers never observe a partial write.

use super::Storage;
use crate::errors::{AppResult, StorageError};
use fs2::FileExt;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

#[cfg(unix)]
use crate::constants::{DEFAULT_DIR_PERMISSIONS, DEFAULT_FILE_PERMISSIONS};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Storage that survives process restarts.
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    /// Uses `path` as the backing file. Nothing is created until the first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(suffix);
        PathBuf::from(name)
    }

    fn io_error(&self, source: io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn ensure_parent(&self) -> AppResult<()> {
        let Some(parent) = self.path.parent() else {
            return Ok(());
        };
        if parent.as_os_str().is_empty() || parent.exists() {
            return Ok(());
        }
        fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        #[cfg(unix)]
        fs::set_permissions(parent, fs::Permissions::from_mode(DEFAULT_DIR_PERMISSIONS))
            .map_err(|e| self.io_error(e))?;
        Ok(())
    }

    fn read_map(&self) -> AppResult<BTreeMap<String, String>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(self.io_error(e).into()),
        };
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content).map_err(|e| {
            StorageError::Corrupted {
                path: self.path.clone(),
                message: e.to_string(),
            }
            .into()
        })
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> AppResult<()> {
        let content = serde_json::to_string_pretty(map).map_err(StorageError::from)?;
        let tmp_path = self.sibling(".tmp");
        let replaced = fs::write(&tmp_path, content)
            .and_then(|()| {
                #[cfg(unix)]
                fs::set_permissions(
                    &tmp_path,
                    fs::Permissions::from_mode(DEFAULT_FILE_PERMISSIONS),
                )?;
                fs::rename(&tmp_path, &self.path)
            });

        if let Err(e) = replaced {
            // The temp file holds a copy of every stored value.
            if let Err(cleanup) = fs::remove_file(&tmp_path) {
                if cleanup.kind() != io::ErrorKind::NotFound {
                    debug!("Failed to remove storage temp file: {}", cleanup);
                }
            }
            return Err(self.io_error(e).into());
        }
        Ok(())
    }

    /// Runs a read-modify-write of the whole map under the exclusive lock.
    fn update<F>(&self, mutate: F) -> AppResult<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        self.ensure_parent()?;
        let lock_path = self.sibling(".lock");
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| self.io_error(e))?;
        FileExt::lock_exclusive(&lock_file).map_err(|source| StorageError::Lock {
            path: lock_path.clone(),
            source,
        })?;

        let result = self.read_map().and_then(|mut map| {
            mutate(&mut map);
            self.write_map(&map)
        });

        if let Err(e) = FileExt::unlock(&lock_file) {
            debug!("Failed to release storage lock: {}", e);
        }
        result
    }
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> AppResult<Option<String>> {
        Ok(self.read_map()?.remove(key))
    }

    fn set_item(&self, key: &str, value: &str) -> AppResult<()> {
        self.update(|map| {
            map.insert(key.to_string(), value.to_string());
        })
    }

    fn remove_item(&self, key: &str) -> AppResult<()> {
        if !self.path.exists() {
            return Ok(());
        }
        self.update(|map| {
            map.remove(key);
        })
    }
}
