use std::sync::Arc;

use super::{Field, FieldKind, value::Value};
use crate::{
    entity::Entity,
    entity_type::EntityType,
    errors::RepoError,
    store::{Command, Reply},
};

/// Binding of one composite field to one entity instance.
///
/// Created per handle borrow and dropped with it. All state lives in the
/// entity's cache and the store.
#[derive(Debug)]
pub(crate) struct Slot<'e> {
    entity: &'e mut Entity,
    ty: Arc<EntityType>,
    index: usize,
}

impl<'e> Slot<'e> {
    pub(crate) fn new(
        entity: &'e mut Entity,
        name: &str,
        expected: &str,
        accepts: fn(&FieldKind) -> bool,
    ) -> Result<Self, RepoError> {
        let ty = Arc::clone(entity.entity_type());
        let index = ty.field_index(name)?;
        let field = &ty.fields()[index];
        if !accepts(field.kind()) {
            return Err(RepoError::misuse(format!(
                "{} is a {} field, not a {expected}",
                field.path(),
                field.internal_type()
            )));
        }
        Ok(Self { entity, ty, index })
    }

    pub(crate) fn field(&self) -> &Field {
        &self.ty.fields()[self.index]
    }

    pub(crate) fn entity_type(&self) -> &Arc<EntityType> {
        &self.ty
    }

    pub(crate) fn key(&mut self) -> Result<String, RepoError> {
        let field = &self.ty.fields()[self.index];
        field.key(self.entity)
    }

    /// Cached value, loading it from the store first when needed.
    pub(crate) fn value(&mut self) -> Result<Value, RepoError> {
        let field = &self.ty.fields()[self.index];
        field.get(self.entity)
    }

    pub(crate) fn encode(&self, value: &Value) -> Result<String, RepoError> {
        Ok(self.field().encode_element(value)?)
    }

    pub(crate) fn decode(&self, raw: &str) -> Result<Value, RepoError> {
        self.field().decode_element(raw)
    }

    pub(crate) fn decode_all(&self, raw: Vec<String>) -> Result<Vec<Value>, RepoError> {
        raw.iter().map(|member| self.decode(member)).collect()
    }

    pub(crate) fn execute(&mut self, command: &Command) -> Result<Reply, RepoError> {
        self.entity.execute(command)
    }

    /// Re-reads the whole collection into the entity's cache.
    pub(crate) fn reload(&mut self) -> Result<(), RepoError> {
        let field = &self.ty.fields()[self.index];
        field.load(self.entity)
    }

    /// Runs a mutating command, then refreshes the cache from the store.
    pub(crate) fn execute_and_reload(&mut self, command: &Command) -> Result<Reply, RepoError> {
        let reply = self.execute(command)?;
        self.reload()?;
        Ok(reply)
    }

    pub(crate) fn entity(&mut self) -> &mut Entity {
        self.entity
    }
}
