use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, Weak},
};

use crate::{
    entity::Entity,
    errors::RepoError,
    field::{Field, Value},
    keys::KeyContext,
    manager::Manager,
    registry::SchemaInner,
    store::{Command, reply},
};

/// Kind of relation a reverse accessor points back through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    Reference,
    Link,
}

/// Information about a relation pointing TO an entity type from another one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReverseRelation {
    /// Owner type of the relation field
    pub source: String,
    /// Name of the relation field on the owner
    pub field: String,
    pub kind: RelationKind,
}

/// A registered entity type: an ordered set of bound fields with exactly one
/// primary key, sharing the connection of its [`Manager`].
pub struct EntityType {
    name: String,
    key_name: String,
    fields: Vec<Field>,
    index: HashMap<String, usize>,
    primary_key: usize,
    manager: Manager,
    reverse: HashMap<String, ReverseRelation>,
    schema: Weak<SchemaInner>,
}

impl EntityType {
    pub(crate) fn new(
        name: String,
        fields: Vec<Field>,
        manager: Manager,
        reverse: HashMap<String, ReverseRelation>,
        schema: Weak<SchemaInner>,
    ) -> Result<Self, RepoError> {
        let index: HashMap<String, usize> = fields
            .iter()
            .enumerate()
            .map(|(at, field)| (field.name().to_string(), at))
            .collect();
        let primary_key = fields
            .iter()
            .position(Field::is_primary_key)
            .ok_or_else(|| RepoError::misuse(format!("{name} has no primary key field")))?;
        Ok(Self {
            key_name: name.to_lowercase(),
            name,
            fields,
            index,
            primary_key,
            manager,
            reverse,
            schema,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lower-cased name used as the key namespace.
    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub(crate) fn field_index(&self, name: &str) -> Result<usize, RepoError> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| RepoError::misuse(format!("{} has no field named {name}", self.name)))
    }

    pub fn field(&self, name: &str) -> Result<&Field, RepoError> {
        Ok(&self.fields[self.field_index(name)?])
    }

    pub fn primary_key(&self) -> &Field {
        &self.fields[self.primary_key]
    }

    pub fn manager(&self) -> &Manager {
        &self.manager
    }

    pub fn key_context(&self) -> KeyContext<'_> {
        self.manager.key_context(&self.key_name)
    }

    /// Joins `parts` under this type's key namespace, e.g. `note:12:text`.
    pub fn key(&self, parts: &[&str]) -> String {
        self.key_context().join(parts)
    }

    /// Reverse accessor wired onto this type by a relation declared elsewhere.
    pub fn reverse_accessor(&self, name: &str) -> Option<&ReverseRelation> {
        self.reverse.get(name)
    }

    pub fn reverse_accessors(&self) -> impl Iterator<Item = (&str, &ReverseRelation)> {
        self.reverse.iter().map(|(name, relation)| (name.as_str(), relation))
    }

    /// Owner type reached through the reverse accessor `name`.
    pub fn reverse_type(&self, name: &str) -> Result<Arc<EntityType>, RepoError> {
        let relation = self.reverse_accessor(name).ok_or_else(|| {
            RepoError::misuse(format!("{} has no reverse accessor named {name}", self.name))
        })?;
        self.related(&relation.source)
    }

    /// Looks up another type registered in the same schema.
    pub fn related(&self, name: &str) -> Result<Arc<EntityType>, RepoError> {
        let schema = self.schema.upgrade().ok_or_else(|| RepoError::Other {
            message: format!("schema owning {} has been dropped", self.name).into(),
        })?;
        schema.lookup(name)
    }

    pub fn not_found(&self, id: &str) -> RepoError {
        RepoError::NotFound {
            entity: self.name.clone(),
            entity_id: id.to_string(),
        }
    }

    /// Builds a new, unsaved instance with every declared default applied.
    pub fn new_entity(self: &Arc<Self>) -> Result<Entity, RepoError> {
        self.create(std::iter::empty::<(&str, Value)>())
    }

    /// Builds a new, unsaved instance from supplied values.
    ///
    /// Fields without a supplied value get their default. Generator defaults run
    /// immediately, except on the primary key where they run on first id access.
    pub fn create<I, K, V>(self: &Arc<Self>, values: I) -> Result<Entity, RepoError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        let mut supplied: HashMap<usize, Value> = HashMap::new();
        for (name, value) in values {
            let at = self.field_index(name.as_ref())?;
            let field = &self.fields[at];
            if field.is_composite() {
                return Err(RepoError::misuse(format!(
                    "{} cannot be assigned directly; use the {} handle to change it",
                    field.path(),
                    field.internal_type()
                )));
            }
            supplied.insert(at, value.into());
        }

        let mut entity = Entity::new(Arc::clone(self), false);
        for (at, field) in self.fields.iter().enumerate() {
            if let Some(value) = supplied.remove(&at) {
                field.assign(&mut entity, value)?;
            } else if let Some(default) = field.default_value() {
                if !field.is_primary_key() && !field.is_composite() {
                    field.assign(&mut entity, default.resolve())?;
                }
            }
        }
        Ok(entity)
    }

    /// Fetches the instance with identifier `id`.
    ///
    /// Only membership is checked here; field values load lazily on access.
    pub fn get(self: &Arc<Self>, id: impl fmt::Display) -> Result<Entity, RepoError> {
        let id = id.to_string();
        let mut entity = Entity::new(Arc::clone(self), true);
        let membership = self.key_context().membership();
        let reply = entity.execute(&Command::new("SISMEMBER").arg(membership).arg(&id))?;
        if !reply::flag(&reply)? {
            return Err(self.not_found(&id));
        }
        entity.assign_id(id);
        Ok(entity)
    }

    /// Membership check without building an instance.
    pub fn exists(&self, id: impl fmt::Display) -> Result<bool, RepoError> {
        let membership = self.key_context().membership();
        let reply = self
            .manager
            .execute(&Command::new("SISMEMBER").arg(membership).arg(id))?;
        reply::flag(&reply)
    }
}

impl fmt::Debug for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityType")
            .field("name", &self.name)
            .field("fields", &self.fields)
            .field("reverse", &self.reverse)
            .finish_non_exhaustive()
    }
}
