//! Unordered set fields and store-side set algebra.

use std::collections::BTreeSet;

use super::{Slot, value::Value};
use crate::{
    errors::RepoError,
    store::{Command, reply},
};

/// Store-evaluated combination of two set keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOp {
    Inter,
    Union,
    Diff,
}

impl SetOp {
    fn command(self) -> &'static str {
        match self {
            Self::Inter => "SINTER",
            Self::Union => "SUNION",
            Self::Diff => "SDIFF",
        }
    }
}

/// Handle over a set field of one entity. Mutations reload the full membership.
#[derive(Debug)]
pub struct SetHandle<'e> {
    slot: Slot<'e>,
}

impl<'e> SetHandle<'e> {
    pub(crate) fn new(slot: Slot<'e>) -> Self {
        Self { slot }
    }

    pub fn value(&mut self) -> Result<BTreeSet<Value>, RepoError> {
        Ok(self.slot.value()?.as_set().cloned().unwrap_or_default())
    }

    /// Remote cardinality via `SCARD`.
    pub fn len(&mut self) -> Result<usize, RepoError> {
        let key = self.slot.key()?;
        let reply = self.slot.execute(&Command::new("SCARD").arg(key))?;
        Ok(reply::integer(&reply)?.max(0) as usize)
    }

    pub fn is_empty(&mut self) -> Result<bool, RepoError> {
        Ok(self.len()? == 0)
    }

    pub fn contains(&mut self, value: impl Into<Value>) -> Result<bool, RepoError> {
        let member = self.slot.encode(&value.into())?;
        let key = self.slot.key()?;
        let reply = self.slot.execute(&Command::new("SISMEMBER").arg(key).arg(member))?;
        reply::flag(&reply)
    }

    /// Returns `true` when the member was not present before.
    pub fn add(&mut self, value: impl Into<Value>) -> Result<bool, RepoError> {
        let member = self.slot.encode(&value.into())?;
        let key = self.slot.key()?;
        let reply = self.slot.execute_and_reload(&Command::new("SADD").arg(key).arg(member))?;
        reply::flag(&reply)
    }

    /// Returns `true` when the member was present.
    pub fn remove(&mut self, value: impl Into<Value>) -> Result<bool, RepoError> {
        let member = self.slot.encode(&value.into())?;
        let key = self.slot.key()?;
        let reply = self.slot.execute_and_reload(&Command::new("SREM").arg(key).arg(member))?;
        reply::flag(&reply)
    }

    /// Removes and returns a random member via `SPOP`.
    pub fn pop(&mut self) -> Result<Option<Value>, RepoError> {
        let key = self.slot.key()?;
        let path = self.slot.field().path();
        let reply = self.slot.execute_and_reload(&Command::new("SPOP").arg(key))?;
        reply::text(reply, &path)?
            .map(|raw| self.slot.decode(&raw))
            .transpose()
    }

    /// Combines this set with the set stored under `other_key`. Members are
    /// decoded with this field's element handler. The cache is not touched.
    pub fn combine(&mut self, op: SetOp, other_key: &str) -> Result<BTreeSet<Value>, RepoError> {
        let key = self.slot.key()?;
        let path = self.slot.field().path();
        let reply = self
            .slot
            .execute(&Command::new(op.command()).arg(key).arg(other_key))?;
        Ok(self
            .slot
            .decode_all(reply::texts(reply, &path)?)?
            .into_iter()
            .collect())
    }

    pub fn inter(&mut self, other: &mut SetHandle<'_>) -> Result<BTreeSet<Value>, RepoError> {
        let other_key = other.key()?;
        self.combine(SetOp::Inter, &other_key)
    }

    pub fn union(&mut self, other: &mut SetHandle<'_>) -> Result<BTreeSet<Value>, RepoError> {
        let other_key = other.key()?;
        self.combine(SetOp::Union, &other_key)
    }

    pub fn diff(&mut self, other: &mut SetHandle<'_>) -> Result<BTreeSet<Value>, RepoError> {
        let other_key = other.key()?;
        self.combine(SetOp::Diff, &other_key)
    }

    pub fn key(&mut self) -> Result<String, RepoError> {
        self.slot.key()
    }
}
