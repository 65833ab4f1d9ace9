mod applications;
mod companies;
mod jobs;
mod saved_jobs;
mod users;

pub use applications::{ApplicationRepo, ApplyOutcome};
pub use companies::CompanyRepo;
pub use jobs::{normalize_status, JobRepo};
pub use saved_jobs::SavedJobRepo;
pub use users::UserRepo;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use tracing::{debug, warn};

use crate::codec;
use crate::error::StoreError;
use crate::store::SharedStore;

pub trait Record: Serialize + DeserializeOwned + Clone {
    type Id: Eq + Hash + Clone + fmt::Debug;

    fn id(&self) -> Self::Id;

    /// Repairs a stored entry in place before it is decoded. Returns true
    /// when the entry was changed.
    fn normalize(_raw: &mut Value) -> bool {
        false
    }
}

#[derive(Debug, Clone)]
pub struct Index<T: Record> {
    records: Vec<T>,
    positions: HashMap<T::Id, usize>,
    // Entries that did not decode, or repeated an id. They are written back
    // untouched but never handed out.
    leftovers: Vec<Value>,
}

impl<T: Record> Default for Index<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            positions: HashMap::new(),
            leftovers: Vec::new(),
        }
    }
}

impl<T: Record> Index<T> {
    /// Returns the index and whether normalization changed any entry.
    fn decode(key: &str, raw: Option<&str>) -> (Self, bool) {
        let mut index = Self::default();
        let mut healed = false;

        for mut item in codec::decode_array(key, raw) {
            healed |= T::normalize(&mut item);
            match serde_json::from_value::<T>(item.clone()) {
                Ok(record) => {
                    let id = record.id();
                    if index.positions.contains_key(&id) {
                        warn!(key, id = ?id, "duplicate id in stored collection, keeping first");
                        index.leftovers.push(item);
                    } else {
                        index.positions.insert(id, index.records.len());
                        index.records.push(record);
                    }
                }
                Err(e) => {
                    warn!(key, error = %e, "skipping unreadable record");
                    index.leftovers.push(item);
                }
            }
        }

        (index, healed)
    }

    fn encode(&self, key: &str) -> Result<String, StoreError> {
        let mut items = Vec::with_capacity(self.records.len() + self.leftovers.len());
        for record in &self.records {
            items.push(serde_json::to_value(record).map_err(|source| StoreError::Encode {
                key: key.to_string(),
                source,
            })?);
        }
        items.extend(self.leftovers.iter().cloned());
        codec::encode(key, &items)
    }

    fn reindex(&mut self) {
        let mut seen = HashMap::with_capacity(self.records.len());
        let mut kept = Vec::with_capacity(self.records.len());
        for record in self.records.drain(..) {
            let id = record.id();
            if seen.contains_key(&id) {
                continue;
            }
            seen.insert(id, kept.len());
            kept.push(record);
        }
        self.records = kept;
        self.positions = seen;
    }

    pub fn get(&self, id: &T::Id) -> Option<&T> {
        self.positions.get(id).map(|&pos| &self.records[pos])
    }

    pub fn get_mut(&mut self, id: &T::Id) -> Option<&mut T> {
        match self.positions.get(id) {
            Some(&pos) => self.records.get_mut(pos),
            None => None,
        }
    }

    pub fn contains(&self, id: &T::Id) -> bool {
        self.positions.contains_key(id)
    }

    /// Replaces the record with the same id in place, or appends. Returns
    /// true when the record is new.
    pub fn upsert(&mut self, record: T) -> bool {
        let id = record.id();
        match self.positions.get(&id) {
            Some(&pos) => {
                self.records[pos] = record;
                false
            }
            None => {
                self.positions.insert(id, self.records.len());
                self.records.push(record);
                true
            }
        }
    }

    /// Moves the record to the front, replacing any record with its id.
    pub fn insert_first(&mut self, record: T) {
        let id = record.id();
        self.records.retain(|r| r.id() != id);
        self.records.insert(0, record);
        self.reindex();
    }

    pub fn remove(&mut self, id: &T::Id) -> Option<T> {
        let pos = self.positions.get(id).copied()?;
        let removed = self.records.remove(pos);
        self.reindex();
        Some(removed)
    }

    pub fn replace_all(&mut self, records: Vec<T>) {
        self.records = records;
        self.leftovers.clear();
        self.reindex();
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<T> {
        self.records
    }
}

pub struct Collection<T: Record> {
    store: SharedStore,
    key: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Record> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            key: self.key,
            _marker: PhantomData,
        }
    }
}

impl<T: Record> Collection<T> {
    pub fn new(store: SharedStore, key: &'static str) -> Self {
        Self {
            store,
            key,
            _marker: PhantomData,
        }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn is_absent(&self) -> bool {
        matches!(self.store.get(self.key), Ok(None))
    }

    /// Reads the collection. Entries that needed normalizing are written
    /// back before returning.
    pub fn load(&self) -> Index<T> {
        let raw = match self.store.get(self.key) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(key = self.key, error = %e, "store read failed, treating collection as empty");
                None
            }
        };
        let (index, healed) = Index::decode(self.key, raw.as_deref());
        if healed {
            debug!(key = self.key, "writing back normalized collection");
            if let Err(e) = self.modify(|_| ()) {
                warn!(key = self.key, error = %e, "failed to write back normalized collection");
            }
        }
        index
    }

    pub fn list(&self) -> Vec<T> {
        self.load().into_records()
    }

    pub fn get(&self, id: &T::Id) -> Option<T> {
        self.load().get(id).cloned()
    }

    pub fn find(&self, pred: impl Fn(&T) -> bool) -> Option<T> {
        self.load().into_records().into_iter().find(|r| pred(r))
    }

    pub fn filter(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        self.load()
            .into_records()
            .into_iter()
            .filter(|r| pred(r))
            .collect()
    }

    /// Runs `f` against the freshly stored collection and writes the result
    /// back, all under one store update.
    pub fn modify<R>(&self, f: impl FnOnce(&mut Index<T>) -> R) -> Result<R, StoreError> {
        let key = self.key;
        let mut f = Some(f);
        let mut out = None;
        self.store.update(key, &mut |raw| {
            let (mut index, _) = Index::<T>::decode(key, raw.as_deref());
            if let Some(f) = f.take() {
                out = Some(f(&mut index));
            }
            index.reindex();
            index.encode(key).map(Some)
        })?;
        out.ok_or_else(|| StoreError::UpdateSkipped {
            key: key.to_string(),
        })
    }

    pub fn save(&self, records: &[T]) -> Result<(), StoreError> {
        let records = records.to_vec();
        self.modify(move |index| index.replace_all(records))
    }

    pub fn upsert(&self, record: T) -> Result<bool, StoreError> {
        self.modify(move |index| index.upsert(record))
    }

    pub fn delete(&self, id: &T::Id) -> Result<Option<T>, StoreError> {
        self.modify(|index| index.remove(id))
    }
}

/// Millisecond timestamp ids, bumped past the largest existing id so two
/// records created in the same millisecond stay distinct.
pub fn next_timestamp_id(existing: impl Iterator<Item = i64>) -> i64 {
    let now = chrono::Utc::now().timestamp_millis();
    match existing.max() {
        Some(max) if max >= now => max + 1,
        _ => now,
    }
}
