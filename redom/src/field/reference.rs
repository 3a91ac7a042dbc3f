//! Cross-entity references: single-valued foreign keys and multi-valued links.

use std::{
    collections::BTreeSet,
    fmt,
    sync::Arc,
};

use super::{
    Slot,
    value::{EntityRef, Value},
};
use crate::{
    entity::Entity,
    entity_type::EntityType,
    errors::{RepoError, ValidationIssue},
    store::{Command, reply},
};

/// Maps a raw identifier to an instance of the related type.
pub type Resolver = Arc<dyn Fn(&Arc<EntityType>, &str) -> Result<Entity, RepoError> + Send + Sync>;

/// Related type named at declaration time, resolved once the registry finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    SelfType,
    Named(String),
}

#[derive(Clone)]
pub struct Relation {
    target: Target,
    related_name: Option<String>,
    resolver: Option<Resolver>,
    resolved: Option<String>,
}

impl Relation {
    pub fn to(entity: impl Into<String>) -> Self {
        Self::new(Target::Named(entity.into()))
    }

    pub fn to_self() -> Self {
        Self::new(Target::SelfType)
    }

    fn new(target: Target) -> Self {
        Self {
            target,
            related_name: None,
            resolver: None,
            resolved: None,
        }
    }

    /// Name of the reverse accessor wired onto the related type.
    pub fn related_name(mut self, name: impl Into<String>) -> Self {
        self.related_name = Some(name.into());
        self
    }

    pub fn resolver<F>(mut self, resolve: F) -> Self
    where
        F: Fn(&Arc<EntityType>, &str) -> Result<Entity, RepoError> + Send + Sync + 'static,
    {
        self.resolver = Some(Arc::new(resolve));
        self
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Related type name; `None` until the registry has resolved the target.
    pub fn target_name(&self) -> Option<&str> {
        self.resolved.as_deref()
    }

    /// Reverse accessor name, defaulting to the lower-cased owner type name.
    pub fn accessor_name(&self, owner: &str) -> String {
        self.related_name.clone().unwrap_or_else(|| owner.to_lowercase())
    }

    pub(crate) fn resolve_target(&mut self, owner: &str) -> &str {
        let name = match &self.target {
            Target::SelfType => owner.to_string(),
            Target::Named(name) => name.clone(),
        };
        self.resolved.insert(name)
    }

    /// Looks `id` up on `related`, through the custom resolver when one is set.
    pub(crate) fn resolve(&self, related: &Arc<EntityType>, id: &str) -> Result<Entity, RepoError> {
        match &self.resolver {
            Some(resolve) => resolve(related, id),
            None => related.get(id),
        }
    }

    pub(crate) fn encode_member(&self, path: &str, value: &Value) -> Result<String, ValidationIssue> {
        let target = self.resolved.as_deref().unwrap_or_default();
        match value {
            Value::Ref(reference) if reference.entity == target => Ok(reference.id.clone()),
            other => Err(ValidationIssue::new(
                path,
                "validation.relation",
                format!("field item {path} requires {target} instance value, got {other}"),
            )),
        }
    }

    pub(crate) fn decode_member(&self, raw: &str) -> Value {
        let target = self.resolved.as_deref().unwrap_or_default();
        Value::Ref(EntityRef::new(target, raw))
    }
}

impl fmt::Debug for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relation")
            .field("target", &self.target)
            .field("related_name", &self.related_name)
            .field("resolver", &self.resolver.as_ref().map(|_| ".."))
            .field("resolved", &self.resolved)
            .finish()
    }
}

/// Handle over a link field: a set of identifiers of one related type.
#[derive(Debug)]
pub struct LinkHandle<'e> {
    slot: Slot<'e>,
}

impl<'e> LinkHandle<'e> {
    pub(crate) fn new(slot: Slot<'e>) -> Self {
        Self { slot }
    }

    fn relation(&self) -> Result<&Relation, RepoError> {
        self.slot
            .field()
            .relation()
            .ok_or_else(|| RepoError::misuse(format!("{} is not a link", self.slot.field().path())))
    }

    fn related(&self) -> Result<Arc<EntityType>, RepoError> {
        let target = self.relation()?.target_name().unwrap_or_default().to_string();
        self.slot.entity_type().related(&target)
    }

    /// Unresolved references currently cached for the link.
    pub fn value(&mut self) -> Result<BTreeSet<Value>, RepoError> {
        Ok(self.slot.value()?.as_set().cloned().unwrap_or_default())
    }

    pub fn ids(&mut self) -> Result<Vec<String>, RepoError> {
        Ok(self
            .value()?
            .into_iter()
            .filter_map(|member| member.as_reference().map(|reference| reference.id.clone()))
            .collect())
    }

    /// Resolves every member through the relation's resolver.
    pub fn members(&mut self) -> Result<Vec<Entity>, RepoError> {
        let related = self.related()?;
        let relation = self.relation()?.clone();
        self.ids()?
            .iter()
            .map(|id| relation.resolve(&related, id))
            .collect()
    }

    pub fn len(&mut self) -> Result<usize, RepoError> {
        let key = self.slot.key()?;
        let reply = self.slot.execute(&Command::new("SCARD").arg(key))?;
        Ok(reply::integer(&reply)?.max(0) as usize)
    }

    pub fn is_empty(&mut self) -> Result<bool, RepoError> {
        Ok(self.len()? == 0)
    }

    /// Links `other`, assigning it an identifier first if it has none.
    pub fn add(&mut self, other: &mut Entity) -> Result<bool, RepoError> {
        let reference = other.reference()?;
        self.add_value(&Value::Ref(reference))
    }

    /// Fails with a validation error unless `value` references the related type.
    pub fn add_value(&mut self, value: &Value) -> Result<bool, RepoError> {
        let member = self.slot.encode(value)?;
        let key = self.slot.key()?;
        let reply = self.slot.execute_and_reload(&Command::new("SADD").arg(key).arg(member))?;
        reply::flag(&reply)
    }

    pub fn remove(&mut self, reference: &EntityRef) -> Result<bool, RepoError> {
        let member = self.slot.encode(&Value::Ref(reference.clone()))?;
        let key = self.slot.key()?;
        let reply = self.slot.execute_and_reload(&Command::new("SREM").arg(key).arg(member))?;
        reply::flag(&reply)
    }

    pub fn contains(&mut self, reference: &EntityRef) -> Result<bool, RepoError> {
        let member = self.slot.encode(&Value::Ref(reference.clone()))?;
        let key = self.slot.key()?;
        let reply = self.slot.execute(&Command::new("SISMEMBER").arg(key).arg(member))?;
        reply::flag(&reply)
    }

    /// Removes a random member and resolves it.
    pub fn pop(&mut self) -> Result<Option<Entity>, RepoError> {
        let key = self.slot.key()?;
        let path = self.slot.field().path();
        let reply = self.slot.execute_and_reload(&Command::new("SPOP").arg(key))?;
        match reply::text(reply, &path)? {
            Some(id) => {
                let related = self.related()?;
                self.relation()?.resolve(&related, &id).map(Some)
            }
            None => Ok(None),
        }
    }

    pub fn key(&mut self) -> Result<String, RepoError> {
        self.slot.key()
    }
}
