//! Ordered list fields.

use std::ops::Range;

use super::{Slot, value::Value};
use crate::{
    errors::RepoError,
    id::list_sentinel,
    store::{Command, reply},
};

/// Handle over a list field of one entity.
///
/// Every mutation is sent to the store immediately and followed by a full
/// `LRANGE` reload, so the cached value always mirrors the remote list.
#[derive(Debug)]
pub struct ListHandle<'e> {
    slot: Slot<'e>,
}

fn local_index(len: usize, index: isize) -> Option<usize> {
    let resolved = if index < 0 { len as isize + index } else { index };
    (0..len as isize).contains(&resolved).then_some(resolved as usize)
}

impl<'e> ListHandle<'e> {
    pub(crate) fn new(slot: Slot<'e>) -> Self {
        Self { slot }
    }

    pub fn value(&mut self) -> Result<Vec<Value>, RepoError> {
        Ok(self.slot.value()?.as_list().map(<[Value]>::to_vec).unwrap_or_default())
    }

    /// Remote length via `LLEN`.
    pub fn len(&mut self) -> Result<usize, RepoError> {
        let key = self.slot.key()?;
        let reply = self.slot.execute(&Command::new("LLEN").arg(key))?;
        Ok(reply::integer(&reply)?.max(0) as usize)
    }

    pub fn is_empty(&mut self) -> Result<bool, RepoError> {
        Ok(self.len()? == 0)
    }

    /// Element at `index` of the cached list; negative indices count from the end.
    pub fn get(&mut self, index: isize) -> Result<Option<Value>, RepoError> {
        let items = self.value()?;
        Ok(local_index(items.len(), index).map(|at| items[at].clone()))
    }

    /// Cached elements in `range`, clamped to the list bounds.
    pub fn slice(&mut self, range: Range<usize>) -> Result<Vec<Value>, RepoError> {
        let items = self.value()?;
        let end = range.end.min(items.len());
        let start = range.start.min(end);
        Ok(items[start..end].to_vec())
    }

    /// Inclusive remote range via `LRANGE`; leaves the cache untouched.
    pub fn range(&mut self, start: isize, stop: isize) -> Result<Vec<Value>, RepoError> {
        let key = self.slot.key()?;
        let path = self.slot.field().path();
        let reply = self.slot.execute(&Command::new("LRANGE").arg(key).arg(start).arg(stop))?;
        self.slot.decode_all(reply::texts(reply, &path)?)
    }

    /// Remote element via `LINDEX`.
    pub fn index(&mut self, index: isize) -> Result<Option<Value>, RepoError> {
        let key = self.slot.key()?;
        let path = self.slot.field().path();
        let reply = self.slot.execute(&Command::new("LINDEX").arg(key).arg(index))?;
        reply::text(reply, &path)?
            .map(|raw| self.slot.decode(&raw))
            .transpose()
    }

    pub fn set(&mut self, index: isize, value: impl Into<Value>) -> Result<(), RepoError> {
        let encoded = self.slot.encode(&value.into())?;
        let key = self.slot.key()?;
        self.slot
            .execute_and_reload(&Command::new("LSET").arg(key).arg(index).arg(encoded))?;
        Ok(())
    }

    /// Removes the single slot at `index`, leaving equal values elsewhere intact.
    ///
    /// The slot is overwritten with a unique sentinel which is then removed by
    /// value. The two commands are not atomic.
    pub fn remove_at(&mut self, index: isize) -> Result<(), RepoError> {
        let key = self.slot.key()?;
        let sentinel = list_sentinel();
        self.slot
            .execute(&Command::new("LSET").arg(&key).arg(index).arg(&sentinel))?;
        self.slot
            .execute_and_reload(&Command::new("LREM").arg(key).arg(0).arg(sentinel))?;
        Ok(())
    }

    /// Appends via `RPUSH`; returns the new length.
    pub fn append(&mut self, value: impl Into<Value>) -> Result<usize, RepoError> {
        self.push("RPUSH", value.into())
    }

    /// Prepends via `LPUSH`; returns the new length.
    pub fn prepend(&mut self, value: impl Into<Value>) -> Result<usize, RepoError> {
        self.push("LPUSH", value.into())
    }

    pub fn extend<I, V>(&mut self, values: I) -> Result<usize, RepoError>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let encoded = values
            .into_iter()
            .map(|value| self.slot.encode(&value.into()))
            .collect::<Result<Vec<_>, _>>()?;
        if encoded.is_empty() {
            return self.len();
        }
        let mut command = Command::new("RPUSH").arg(self.slot.key()?);
        for member in encoded {
            command = command.arg(member);
        }
        let reply = self.slot.execute_and_reload(&command)?;
        Ok(reply::integer(&reply)?.max(0) as usize)
    }

    fn push(&mut self, name: &'static str, value: Value) -> Result<usize, RepoError> {
        let encoded = self.slot.encode(&value)?;
        let key = self.slot.key()?;
        let reply = self.slot.execute_and_reload(&Command::new(name).arg(key).arg(encoded))?;
        Ok(reply::integer(&reply)?.max(0) as usize)
    }

    pub fn pop_back(&mut self) -> Result<Option<Value>, RepoError> {
        self.pop("RPOP")
    }

    pub fn pop_front(&mut self) -> Result<Option<Value>, RepoError> {
        self.pop("LPOP")
    }

    fn pop(&mut self, name: &'static str) -> Result<Option<Value>, RepoError> {
        let key = self.slot.key()?;
        let path = self.slot.field().path();
        let reply = self.slot.execute_and_reload(&Command::new(name).arg(key))?;
        reply::text(reply, &path)?
            .map(|raw| self.slot.decode(&raw))
            .transpose()
    }

    /// Removes up to `count` elements equal to `value` (`LREM` semantics: a
    /// negative count scans from the tail, zero removes all). Returns the
    /// number removed.
    pub fn remove(&mut self, value: impl Into<Value>, count: isize) -> Result<usize, RepoError> {
        let encoded = self.slot.encode(&value.into())?;
        let key = self.slot.key()?;
        let reply = self
            .slot
            .execute_and_reload(&Command::new("LREM").arg(key).arg(count).arg(encoded))?;
        Ok(reply::integer(&reply)?.max(0) as usize)
    }

    /// Keeps only the inclusive range `start..=stop` via `LTRIM`.
    pub fn trim(&mut self, start: isize, stop: isize) -> Result<(), RepoError> {
        let key = self.slot.key()?;
        self.slot
            .execute_and_reload(&Command::new("LTRIM").arg(key).arg(start).arg(stop))?;
        Ok(())
    }

    pub fn key(&mut self) -> Result<String, RepoError> {
        self.slot.key()
    }
}
