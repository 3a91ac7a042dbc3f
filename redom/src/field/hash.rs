//! Hash-table fields: a string map stored under one key.

use std::collections::BTreeMap;

use super::{Slot, value::{Stored, Value}};
use crate::{
    errors::RepoError,
    store::{Command, reply},
};

/// Handle over a hash-table field of one entity.
///
/// Unlike lists and sets, writes are applied per key: `insert` and `remove`
/// patch the cached map in place (when one is cached) instead of reloading it.
#[derive(Debug)]
pub struct HashHandle<'e> {
    slot: Slot<'e>,
}

impl<'e> HashHandle<'e> {
    pub(crate) fn new(slot: Slot<'e>) -> Self {
        Self { slot }
    }

    fn cached_map(&mut self) -> Option<&mut BTreeMap<String, String>> {
        let name = self.slot.field().name().to_string();
        match self.slot.entity().cached_mut(&name) {
            Some(Stored::Hash(map)) => Some(map),
            _ => None,
        }
    }

    pub fn value(&mut self) -> Result<BTreeMap<String, String>, RepoError> {
        Ok(self.slot.value()?.as_hash().cloned().unwrap_or_default())
    }

    /// Reads `key` from the cached map, or with `HGET` when nothing is cached.
    pub fn get(&mut self, key: &str) -> Result<Option<String>, RepoError> {
        if let Some(map) = self.cached_map() {
            return Ok(map.get(key).cloned());
        }
        let hash_key = self.slot.key()?;
        let path = self.slot.field().path();
        let reply = self.slot.execute(&Command::new("HGET").arg(hash_key).arg(key))?;
        reply::text(reply, &path)
    }

    /// Writes one entry with `HSET`. Returns `true` when the key is new.
    pub fn insert(&mut self, key: &str, value: impl Into<Value>) -> Result<bool, RepoError> {
        let path = self.slot.field().path();
        let value = super::scalar::encode_text(&path, &value.into())?;
        let hash_key = self.slot.key()?;
        let reply = self
            .slot
            .execute(&Command::new("HSET").arg(hash_key).arg(key).arg(&value))?;
        if let Some(map) = self.cached_map() {
            map.insert(key.to_string(), value);
        }
        reply::flag(&reply)
    }

    /// Deletes one entry with `HDEL`. Returns `true` when it existed.
    pub fn remove(&mut self, key: &str) -> Result<bool, RepoError> {
        let hash_key = self.slot.key()?;
        let reply = self.slot.execute(&Command::new("HDEL").arg(hash_key).arg(key))?;
        if let Some(map) = self.cached_map() {
            map.remove(key);
        }
        reply::flag(&reply)
    }

    pub fn contains(&mut self, key: &str) -> Result<bool, RepoError> {
        let hash_key = self.slot.key()?;
        let reply = self.slot.execute(&Command::new("HEXISTS").arg(hash_key).arg(key))?;
        reply::flag(&reply)
    }

    pub fn len(&mut self) -> Result<usize, RepoError> {
        let hash_key = self.slot.key()?;
        let reply = self.slot.execute(&Command::new("HLEN").arg(hash_key))?;
        Ok(reply::integer(&reply)?.max(0) as usize)
    }

    pub fn is_empty(&mut self) -> Result<bool, RepoError> {
        Ok(self.len()? == 0)
    }

    pub fn keys(&mut self) -> Result<Vec<String>, RepoError> {
        let hash_key = self.slot.key()?;
        let path = self.slot.field().path();
        let reply = self.slot.execute(&Command::new("HKEYS").arg(hash_key))?;
        reply::texts(reply, &path)
    }

    pub fn values(&mut self) -> Result<Vec<String>, RepoError> {
        let hash_key = self.slot.key()?;
        let path = self.slot.field().path();
        let reply = self.slot.execute(&Command::new("HVALS").arg(hash_key))?;
        reply::texts(reply, &path)
    }

    /// Fetches the whole map with `HGETALL` and replaces the cached copy.
    pub fn get_all(&mut self) -> Result<BTreeMap<String, String>, RepoError> {
        self.slot.reload()?;
        self.value()
    }

    pub fn key(&mut self) -> Result<String, RepoError> {
        self.slot.key()
    }
}
