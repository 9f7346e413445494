// Copyright 2025 Beanwatch Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Durable key/blob tables guarded by a lock.
//!
//! A [`TransactionalStore`] hands out the whole table for the duration of one
//! critical section. Writes made inside the section become visible only when
//! the closure returns `Ok`; an error leaves the table untouched. The lock is
//! released on every exit path, including unwinding.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use beanwatch_common::{BeanwatchError, Result};
use fs2::FileExt;

/// In-memory view of the store handed to a critical section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    entries: BTreeMap<String, Vec<u8>>,
    dirty: bool,
}

impl Table {
    fn from_entries(entries: BTreeMap<String, Vec<u8>>) -> Self {
        Self {
            entries,
            dirty: false,
        }
    }

    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Vec<u8>) {
        self.entries.insert(key.into(), value);
        self.dirty = true;
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when the section wrote something that needs committing.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

/// A key/blob table plus the one lock that serializes all access to it.
pub trait TransactionalStore: Send + Sync {
    /// Runs `f` with exclusive access to the table.
    ///
    /// `op` and `key` only label errors and logs.
    fn with_lock<T, F>(&self, op: &'static str, key: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut Table) -> Result<T>;

    /// Re-establishes process-local handles after a worker fork.
    fn reopen(&self) -> Result<()> {
        Ok(())
    }
}

// ============================================================================
// File-backed store
// ============================================================================

/// Table persisted to a single file, locked with an advisory lock file.
///
/// Every cooperating process opens the same pair of paths. Within a process
/// the lock handle sits behind a mutex, since advisory locks are owned by the
/// open file description rather than by the thread.
pub struct FileStore {
    path: PathBuf,
    lock_path: PathBuf,
    lock_file: Mutex<File>,
}

/// Holds the advisory lock; releases it when dropped.
struct LockGuard<'a> {
    file: MutexGuard<'a, File>,
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&*self.file) {
            tracing::error!(error = %e, "failed to release store lock");
        }
    }
}

impl FileStore {
    /// Opens (creating if needed) the store at `path` with its lock file at
    /// `lock_path`. Parent directories are created.
    pub fn open(path: impl Into<PathBuf>, lock_path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let lock_path = lock_path.into();

        for dir in [path.parent(), lock_path.parent()].into_iter().flatten() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)
                    .map_err(|e| BeanwatchError::store(dir.display().to_string(), "open", e))?;
            }
        }

        let lock_file = open_lock_file(&lock_path)?;
        tracing::debug!(path = %path.display(), lock = %lock_path.display(), "opened metrics store");

        Ok(Self {
            path,
            lock_path,
            lock_file: Mutex::new(lock_file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Deletes the store file, forcing every counter back to zero on the
    /// next startup. Missing files are not an error.
    ///
    /// The lock file is kept and held while deleting: running processes
    /// still lock the same inode, so the lock keeps ordering all access.
    pub fn destroy(path: &Path, lock_path: &Path) -> Result<()> {
        let store = Self::open(path, lock_path)?;
        let _guard = store.acquire("destroy", &path.display().to_string())?;
        for file in [path.to_path_buf(), temp_path(path)] {
            match fs::remove_file(&file) {
                Ok(()) => tracing::info!(path = %file.display(), "removed store file"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn acquire(&self, op: &'static str, key: &str) -> Result<LockGuard<'_>> {
        let file = self.lock_file.lock().unwrap_or_else(PoisonError::into_inner);
        file.lock_exclusive()
            .map_err(|e| BeanwatchError::store(key, op, format!("lock: {}", e)))?;
        Ok(LockGuard { file })
    }

    fn load(&self, op: &'static str, key: &str) -> Result<Table> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Table::default()),
            Err(e) => return Err(BeanwatchError::store(key, op, format!("read: {}", e))),
        };

        if bytes.is_empty() {
            return Ok(Table::default());
        }

        match postcard::from_bytes::<BTreeMap<String, Vec<u8>>>(&bytes) {
            Ok(entries) => Ok(Table::from_entries(entries)),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "store file is unreadable, starting from an empty table"
                );
                Ok(Table::default())
            }
        }
    }

    fn commit(&self, table: &Table, op: &'static str, key: &str) -> Result<()> {
        let bytes = postcard::to_stdvec(&table.entries)?;
        let tmp = temp_path(&self.path);

        let write = || -> std::io::Result<()> {
            let mut file = File::create(&tmp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
            fs::rename(&tmp, &self.path)
        };

        write().map_err(|e| BeanwatchError::store(key, op, format!("write: {}", e)))
    }
}

impl TransactionalStore for FileStore {
    fn with_lock<T, F>(&self, op: &'static str, key: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut Table) -> Result<T>,
    {
        let _guard = self.acquire(op, key)?;
        let mut table = self.load(op, key)?;
        let value = f(&mut table)?;
        if table.is_dirty() {
            self.commit(&table, op, key)?;
        }
        Ok(value)
    }

    fn reopen(&self) -> Result<()> {
        let fresh = open_lock_file(&self.lock_path)?;
        let mut file = self.lock_file.lock().unwrap_or_else(PoisonError::into_inner);
        *file = fresh;
        Ok(())
    }
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore")
            .field("path", &self.path)
            .field("lock_path", &self.lock_path)
            .finish()
    }
}

fn open_lock_file(lock_path: &Path) -> Result<File> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(lock_path)
        .map_err(|e| BeanwatchError::store(lock_path.display().to_string(), "open", e))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

// ============================================================================
// In-memory store
// ============================================================================

/// Process-local table with the same commit semantics as [`FileStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    table: Mutex<Table>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every entry, as if the backing file had been deleted.
    pub fn clear(&self) {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        *table = Table::default();
    }
}

impl TransactionalStore for MemoryStore {
    fn with_lock<T, F>(&self, _op: &'static str, _key: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut Table) -> Result<T>,
    {
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        let mut working = Table::from_entries(table.entries.clone());
        let value = f(&mut working)?;
        if working.is_dirty() {
            *table = Table::from_entries(working.entries);
        }
        Ok(value)
    }
}
