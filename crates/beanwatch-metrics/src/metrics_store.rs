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

use beanwatch_common::{BeanwatchError, Result};

use crate::record::EntityRecord;
use crate::store::{FileStore, Table, TransactionalStore};
use crate::timespan::{now_micros, WorkUnit};

/// Per-entity counter records on top of a [`TransactionalStore`].
///
/// Every operation is one critical section: acquire, load, modify, store,
/// release. Formatting and rendering happen after the lock is dropped.
#[derive(Debug)]
pub struct MetricsStore<S = FileStore> {
    store: S,
}

impl<S: TransactionalStore> MetricsStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn inner(&self) -> &S {
        &self.store
    }

    /// Prepares the record for `key` at startup or reload.
    ///
    /// An absent or malformed record is created all-zero with every window
    /// starting now. An existing record gets its since-restart window zeroed,
    /// and its since-start window too when `is_process_start` is set.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the lock or the backing store fails.
    pub fn reset(&self, key: &str, is_process_start: bool) -> Result<EntityRecord> {
        self.store.with_lock("reset", key, |table| {
            let now = now_micros();
            let record = match load(table, key) {
                Some(mut record) => {
                    record.reset(is_process_start, now);
                    record
                }
                None => {
                    tracing::info!(key, "initializing metrics record");
                    EntityRecord::fresh(now)
                }
            };
            table.insert(key, record.encode());
            Ok(record)
        })
    }

    /// Applies `delta` to the existing record for `key`.
    ///
    /// # Errors
    ///
    /// Returns `MissingRecord` when `key` was never initialized with
    /// [`MetricsStore::reset`]; nothing is written in that case.
    pub fn update_with<F>(&self, key: &str, delta: F) -> Result<()>
    where
        F: FnOnce(&mut EntityRecord),
    {
        self.store.with_lock("update", key, |table| {
            let mut record = require(table, key)?;
            delta(&mut record);
            table.insert(key, record.encode());
            Ok(())
        })
    }

    /// Adds one unit of work to every window of `key`.
    pub fn update(&self, key: &str, unit: &WorkUnit) -> Result<()> {
        self.update_with(key, |record| record.apply(unit))
    }

    /// Adds one unit of work to an entity and to the global aggregate in a
    /// single critical section. Either both records change or neither does.
    pub fn update_pair(&self, entity_key: &str, global_key: &str, unit: &WorkUnit) -> Result<()> {
        self.store.with_lock("update", entity_key, |table| {
            let mut entity = require(table, entity_key)?;
            let mut global = require(table, global_key)?;
            entity.apply(unit);
            global.apply(unit);
            table.insert(entity_key, entity.encode());
            table.insert(global_key, global.encode());
            Ok(())
        })
    }

    /// Fetches the record for `key` without modifying anything.
    ///
    /// `Ok(None)` means the record is absent (or had an unexpected size), which
    /// is what a deleted store looks like.
    pub fn read(&self, key: &str) -> Result<Option<EntityRecord>> {
        self.store.with_lock("read", key, |table| Ok(load(table, key)))
    }

    /// Re-establishes process-local handles after a worker fork.
    pub fn reopen(&self) -> Result<()> {
        self.store.reopen()
    }
}

fn load(table: &Table, key: &str) -> Option<EntityRecord> {
    let blob = table.get(key)?;
    let record = EntityRecord::decode(blob);
    if record.is_none() {
        tracing::warn!(key, len = blob.len(), "discarding metrics record of unexpected size");
    }
    record
}

fn require(table: &Table, key: &str) -> Result<EntityRecord> {
    load(table, key).ok_or_else(|| BeanwatchError::MissingRecord {
        key: key.to_string(),
    })
}
