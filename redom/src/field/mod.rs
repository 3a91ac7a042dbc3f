//! Field descriptors: bind a named, typed attribute to the store commands that
//! load, save and delete it.
//!
//! A [`Field`] is declared on an [`EntityTypeBuilder`](crate::EntityTypeBuilder),
//! bound exactly once when the registry finishes, and immutable afterwards.
//! Composite kinds (list, set, hash table, link) are mutated through short-lived
//! handles borrowed from the entity; see [`ListHandle`], [`SetHandle`],
//! [`HashHandle`] and [`LinkHandle`].

mod composite;
mod hash;
pub(crate) mod key;
mod list;
mod reference;
pub(crate) mod scalar;
mod set;
pub(crate) mod value;

use std::{collections::BTreeSet, fmt, sync::Arc};

pub use hash::HashHandle;
pub use list::ListHandle;
pub use reference::{LinkHandle, Relation, Resolver, Target};
pub use set::{SetHandle, SetOp};
pub use value::{EntityRef, Value};

pub(crate) use composite::Slot;
use value::Stored;

use crate::{
    entity::Entity,
    errors::{RepoError, ValidationIssue},
    store::{Command, Reply, reply},
};

/// Element coercion applied to list and set members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Element {
    #[default]
    Text,
    Integer,
}

impl Element {
    pub(crate) fn encode(self, path: &str, value: &Value) -> Result<String, ValidationIssue> {
        match self {
            Self::Text => scalar::encode_text(path, value),
            Self::Integer => scalar::encode_integer(path, value),
        }
    }

    pub(crate) fn decode(self, path: &str, raw: &str) -> Result<Value, ValidationIssue> {
        match self {
            Self::Text => Ok(Value::Text(raw.to_string())),
            Self::Integer => scalar::parse_integer(path, raw).map(Value::Integer),
        }
    }
}

/// Default assigned when an entity is constructed without a value for the field.
#[derive(Clone)]
pub enum DefaultValue {
    Literal(Value),
    Generator(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl DefaultValue {
    pub fn resolve(&self) -> Value {
        match self {
            Self::Literal(value) => value.clone(),
            Self::Generator(generate) => generate(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Self::Generator(_) => f.write_str("Generator(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum FieldKind {
    Text,
    Integer,
    Timestamp,
    /// Primary key drawn from an atomic per-type counter.
    CounterKey,
    /// Primary key generated locally as a random token.
    TokenKey,
    List(Element),
    Set(Element),
    Hash,
    Reference(Relation),
    Link(Relation),
}

#[derive(Debug, Clone)]
struct Binding {
    entity: String,
    name: String,
}

#[derive(Debug, Clone)]
pub struct Field {
    binding: Option<Binding>,
    required: bool,
    default: Option<DefaultValue>,
    kind: FieldKind,
}

impl Field {
    pub fn new(kind: FieldKind) -> Self {
        Self {
            binding: None,
            required: false,
            default: None,
            kind,
        }
    }

    pub fn text() -> Self {
        Self::new(FieldKind::Text)
    }

    pub fn integer() -> Self {
        Self::new(FieldKind::Integer)
    }

    pub fn timestamp() -> Self {
        Self::new(FieldKind::Timestamp)
    }

    pub fn counter_key() -> Self {
        Self::new(FieldKind::CounterKey)
    }

    pub fn token_key() -> Self {
        Self::new(FieldKind::TokenKey)
    }

    pub fn list() -> Self {
        Self::new(FieldKind::List(Element::Text))
    }

    pub fn list_of(element: Element) -> Self {
        Self::new(FieldKind::List(element))
    }

    pub fn set() -> Self {
        Self::new(FieldKind::Set(Element::Text))
    }

    pub fn set_of(element: Element) -> Self {
        Self::new(FieldKind::Set(element))
    }

    pub fn hash() -> Self {
        Self::new(FieldKind::Hash)
    }

    pub fn reference(relation: Relation) -> Self {
        Self::new(FieldKind::Reference(relation))
    }

    pub fn link(relation: Relation) -> Self {
        Self::new(FieldKind::Link(relation))
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Literal(value.into()));
        self
    }

    pub fn default_with<F>(mut self, generate: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default = Some(DefaultValue::Generator(Arc::new(generate)));
        self
    }

    /// Binds the field to `entity` under `name`. A field can be bound once.
    pub fn bind(&mut self, entity: &str, name: &str) -> Result<(), RepoError> {
        if let Some(binding) = &self.binding {
            return Err(RepoError::misuse(format!(
                "field {}.{} is already bound",
                binding.entity, binding.name
            )));
        }
        self.binding = Some(Binding {
            entity: entity.to_string(),
            name: name.to_string(),
        });
        Ok(())
    }

    pub fn is_bound(&self) -> bool {
        self.binding.is_some()
    }

    pub fn name(&self) -> &str {
        self.binding.as_ref().map_or("*unbound*", |binding| binding.name.as_str())
    }

    /// `<Entity>.<name>`, used in error messages and validation issues.
    pub fn path(&self) -> String {
        match &self.binding {
            Some(binding) => format!("{}.{}", binding.entity, binding.name),
            None => "*unbound*".to_string(),
        }
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub fn internal_type(&self) -> &'static str {
        match self.kind {
            FieldKind::Text => "String",
            FieldKind::Integer => "Integer",
            FieldKind::Timestamp => "DateTime",
            FieldKind::CounterKey => "PrimaryKey",
            FieldKind::TokenKey => "StringPK",
            FieldKind::List(_) => "List",
            FieldKind::Set(_) => "Set",
            FieldKind::Hash => "HashTable",
            FieldKind::Reference(_) => "FK",
            FieldKind::Link(_) => "Link",
        }
    }

    pub fn default_value(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }

    pub fn is_primary_key(&self) -> bool {
        matches!(self.kind, FieldKind::CounterKey | FieldKind::TokenKey)
    }

    pub fn is_composite(&self) -> bool {
        matches!(
            self.kind,
            FieldKind::List(_) | FieldKind::Set(_) | FieldKind::Hash | FieldKind::Link(_)
        )
    }

    /// Primary keys are always required.
    pub fn is_required(&self) -> bool {
        self.required || self.is_primary_key()
    }

    pub fn relation(&self) -> Option<&Relation> {
        match &self.kind {
            FieldKind::Reference(relation) | FieldKind::Link(relation) => Some(relation),
            _ => None,
        }
    }

    pub(crate) fn relation_mut(&mut self) -> Option<&mut Relation> {
        match &mut self.kind {
            FieldKind::Reference(relation) | FieldKind::Link(relation) => Some(relation),
            _ => None,
        }
    }

    /// Checks `value` against the required flag and the field's type.
    pub fn validate(&self, value: &Value) -> Result<(), ValidationIssue> {
        if self.is_required() && value.is_blank() {
            return Err(ValidationIssue::required(&self.path()));
        }
        if self.is_composite() || value.is_null() {
            return Ok(());
        }
        self.encode_scalar(value).map(|_| ())
    }

    /// Checks an already cached stored form before it is written.
    ///
    /// A foreign key is cached as the bare related id, which was checked
    /// against the relation on assignment, so only its presence is checked.
    pub(crate) fn validate_stored(&self, stored: Option<&Stored>) -> Result<(), ValidationIssue> {
        if let FieldKind::Reference(_) = self.kind {
            let blank = !matches!(stored, Some(Stored::Scalar(id)) if !id.is_empty());
            if self.is_required() && blank {
                return Err(ValidationIssue::required(&self.path()));
            }
            return Ok(());
        }
        match self.decode(stored) {
            Ok(value) => self.validate(&value),
            Err(err) => Err(ValidationIssue::undecodable(&self.path(), &err)),
        }
    }

    /// Coerces a scalar value to its stored string form.
    pub(crate) fn encode_scalar(&self, value: &Value) -> Result<String, ValidationIssue> {
        let path = self.path();
        match &self.kind {
            FieldKind::Text | FieldKind::TokenKey => scalar::encode_text(&path, value),
            FieldKind::Integer | FieldKind::CounterKey => scalar::encode_integer(&path, value),
            FieldKind::Timestamp => scalar::encode_timestamp(&path, value),
            FieldKind::Reference(_) => match value {
                Value::Ref(reference) => Ok(reference.id.clone()),
                other => Err(ValidationIssue::new(
                    &path,
                    "validation.relation",
                    format!("field {path} only accepts entities as values, got {}", other.type_name()),
                )),
            },
            _ => Err(scalar::type_issue(&path, "scalar", value)),
        }
    }

    /// Coerces one member of a list, set or link to its stored form.
    pub(crate) fn encode_element(&self, value: &Value) -> Result<String, ValidationIssue> {
        let path = self.path();
        match &self.kind {
            FieldKind::List(element) | FieldKind::Set(element) => element.encode(&path, value),
            FieldKind::Link(relation) => relation.encode_member(&path, value),
            _ => Err(scalar::type_issue(&path, "collection member", value)),
        }
    }

    pub(crate) fn decode_element(&self, raw: &str) -> Result<Value, RepoError> {
        let path = self.path();
        match &self.kind {
            FieldKind::List(element) | FieldKind::Set(element) => Ok(element.decode(&path, raw)?),
            FieldKind::Link(relation) => Ok(relation.decode_member(raw)),
            _ => Ok(Value::Text(raw.to_string())),
        }
    }

    /// Turns a cached stored form into the caller-facing value.
    pub(crate) fn decode(&self, stored: Option<&Stored>) -> Result<Value, RepoError> {
        let path = self.path();
        let Some(stored) = stored else {
            return Ok(match self.kind {
                FieldKind::List(_) => Value::List(Vec::new()),
                FieldKind::Set(_) | FieldKind::Link(_) => Value::Set(Default::default()),
                FieldKind::Hash => Value::Hash(Default::default()),
                _ => Value::Null,
            });
        };
        match (&self.kind, stored) {
            (FieldKind::Text | FieldKind::TokenKey | FieldKind::Reference(_), Stored::Scalar(raw)) => {
                Ok(Value::Text(raw.clone()))
            }
            (FieldKind::Integer | FieldKind::CounterKey, Stored::Scalar(raw)) => {
                Ok(Value::Integer(scalar::parse_integer(&path, raw)?))
            }
            (FieldKind::Timestamp, Stored::Scalar(raw)) => Ok(Value::Timestamp(scalar::decode_timestamp(&path, raw)?)),
            (FieldKind::List(_), Stored::List(items)) => items
                .iter()
                .map(|raw| self.decode_element(raw))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List),
            (FieldKind::Set(_) | FieldKind::Link(_), Stored::Set(members)) => members
                .iter()
                .map(|raw| self.decode_element(raw))
                .collect::<Result<BTreeSet<_>, _>>()
                .map(Value::Set),
            (FieldKind::Hash, Stored::Hash(map)) => Ok(Value::Hash(map.clone())),
            (_, other) => Err(RepoError::Other {
                message: format!("cached value {other:?} does not fit field {path}").into(),
            }),
        }
    }

    fn stored_from_reply(&self, reply: Reply) -> Result<Option<Stored>, RepoError> {
        let path = self.path();
        Ok(match self.kind {
            FieldKind::List(_) => Some(Stored::List(reply::texts(reply, &path)?)),
            FieldKind::Set(_) | FieldKind::Link(_) => {
                Some(Stored::Set(reply::texts(reply, &path)?.into_iter().collect()))
            }
            FieldKind::Hash => Some(Stored::Hash(reply::pairs(reply, &path)?)),
            _ => reply::text(reply, &path)?.map(Stored::Scalar),
        })
    }

    /// Store key of this field for `entity`; assigns the entity an id if needed.
    pub(crate) fn key(&self, entity: &mut Entity) -> Result<String, RepoError> {
        let id = entity.id_text()?;
        Ok(entity.entity_type().key_context().field(&id, self.name()))
    }

    pub(crate) fn load_cmd(&self, entity: &mut Entity) -> Result<Option<Command>, RepoError> {
        let command = match self.kind {
            FieldKind::CounterKey | FieldKind::TokenKey => return Ok(None),
            FieldKind::List(_) => Command::new("LRANGE").arg(self.key(entity)?).arg(0).arg(-1),
            FieldKind::Set(_) | FieldKind::Link(_) => Command::new("SMEMBERS").arg(self.key(entity)?),
            FieldKind::Hash => Command::new("HGETALL").arg(self.key(entity)?),
            _ => Command::new("GET").arg(self.key(entity)?),
        };
        Ok(Some(command))
    }

    pub(crate) fn save_cmd(&self, entity: &mut Entity) -> Result<Option<Command>, RepoError> {
        if self.is_primary_key() {
            return key::save_cmd(entity).map(Some);
        }
        if self.is_composite() {
            return Ok(None);
        }
        let value = match entity.cached(self.name()) {
            Some(Stored::Scalar(raw)) if !raw.is_empty() => raw.clone(),
            _ => return Ok(None),
        };
        Ok(Some(Command::new("SET").arg(self.key(entity)?).arg(value)))
    }

    pub(crate) fn delete_cmd(&self, entity: &mut Entity) -> Result<Option<Command>, RepoError> {
        if self.is_primary_key() {
            return key::delete_cmd(entity).map(Some);
        }
        Ok(Some(Command::new("DEL").arg(self.key(entity)?)))
    }

    /// Fetches the field from the store into the entity's cache.
    pub(crate) fn load(&self, entity: &mut Entity) -> Result<(), RepoError> {
        let Some(command) = self.load_cmd(entity)? else {
            return Ok(());
        };
        let reply = entity.execute(&command)?;
        match self.stored_from_reply(reply)? {
            Some(stored) => entity.cache(self.name(), stored),
            None => entity.uncache(self.name()),
        }
        Ok(())
    }

    pub(crate) fn save(&self, entity: &mut Entity) -> Result<(), RepoError> {
        if let Some(command) = self.save_cmd(entity)? {
            entity.execute(&command)?;
        }
        Ok(())
    }

    pub(crate) fn delete(&self, entity: &mut Entity) -> Result<(), RepoError> {
        if let Some(command) = self.delete_cmd(entity)? {
            entity.execute(&command)?;
        }
        Ok(())
    }

    /// Composites also materialize from the store once the entity has an id,
    /// since their remote contents may exist before the first save.
    fn needs_load(&self, entity: &Entity) -> bool {
        entity.is_loaded() || (self.is_composite() && entity.cached_id().is_some())
    }

    pub(crate) fn get(&self, entity: &mut Entity) -> Result<Value, RepoError> {
        if self.is_primary_key() {
            let id = entity.id_text()?;
            return self.decode(Some(&Stored::Scalar(id)));
        }
        if entity.cached(self.name()).is_none() && self.needs_load(entity) {
            self.load(entity)?;
        }
        self.decode(entity.cached(self.name()))
    }

    /// Validates and caches a new value. Nothing reaches the store until save.
    pub(crate) fn assign(&self, entity: &mut Entity, value: Value) -> Result<(), RepoError> {
        if self.is_composite() {
            return Err(RepoError::misuse(format!(
                "{} cannot be assigned directly; use the {} handle to change it",
                self.path(),
                self.internal_type()
            )));
        }
        self.validate(&value)?;
        if value.is_null() {
            entity.uncache(self.name());
        } else {
            let stored = self.encode_scalar(&value)?;
            entity.cache(self.name(), Stored::Scalar(stored));
        }
        Ok(())
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}: {}>", self.internal_type(), self.name())
    }
}
