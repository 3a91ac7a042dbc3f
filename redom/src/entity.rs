//! Entity instances: a local cache of stored field values plus a query log.

use std::{
    collections::HashMap,
    fmt,
    hash::{Hash, Hasher},
    sync::Arc,
};

use crate::{
    entity_type::EntityType,
    errors::{RepoError, ValidationError, ValidationResult},
    field::{
        EntityRef, FieldKind, HashHandle, LinkHandle, ListHandle, SetHandle, Slot, Value, key,
        value::Stored,
    },
    query_log::{QueryLog, QueryStats},
    store::{Command, Reply},
};

/// One instance of an [`EntityType`].
///
/// Instances built with [`EntityType::create`] start unloaded: unset fields
/// read as their empty value. Instances returned by [`EntityType::get`] are
/// loaded: unset fields are fetched from the store on first access.
pub struct Entity {
    ty: Arc<EntityType>,
    data: HashMap<String, Stored>,
    loaded: bool,
    log: QueryLog,
}

impl Entity {
    pub(crate) fn new(ty: Arc<EntityType>, loaded: bool) -> Self {
        Self {
            ty,
            data: HashMap::new(),
            loaded,
            log: QueryLog::new(),
        }
    }

    pub fn entity_type(&self) -> &Arc<EntityType> {
        &self.ty
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn get(&mut self, name: &str) -> Result<Value, RepoError> {
        let ty = Arc::clone(&self.ty);
        ty.field(name)?.get(self)
    }

    /// Validates and caches `value`; nothing is written until [`Entity::save`].
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<(), RepoError> {
        let ty = Arc::clone(&self.ty);
        ty.field(name)?.assign(self, value.into())
    }

    /// Primary-key value, generating one if the instance has none yet.
    pub fn id(&mut self) -> Result<Value, RepoError> {
        let ty = Arc::clone(&self.ty);
        ty.primary_key().get(self)
    }

    /// Stored form of the primary key, generating it on first use.
    ///
    /// Counter keys issue an `INCR` against the type's counter key; a declared
    /// default on the primary key takes precedence over the strategy.
    pub fn id_text(&mut self) -> Result<String, RepoError> {
        if let Some(id) = self.cached_id() {
            return Ok(id.to_string());
        }
        let ty = Arc::clone(&self.ty);
        let field = ty.primary_key();
        let id = match field.default_value() {
            Some(default) => field.encode_scalar(&default.resolve())?,
            None => key::next_id(self, field)?,
        };
        self.assign_id(id.clone());
        Ok(id)
    }

    pub fn cached_id(&self) -> Option<&str> {
        match self.data.get(self.ty.primary_key().name()) {
            Some(Stored::Scalar(id)) => Some(id),
            _ => None,
        }
    }

    pub(crate) fn assign_id(&mut self, id: String) {
        let name = self.ty.primary_key().name().to_string();
        self.data.insert(name, Stored::Scalar(id));
    }

    /// Reference to this instance, generating its id if needed.
    pub fn reference(&mut self) -> Result<EntityRef, RepoError> {
        let id = self.id_text()?;
        Ok(EntityRef::new(self.ty.name(), id))
    }

    /// Reference to this instance if it already has an id.
    pub fn identity(&self) -> Option<EntityRef> {
        self.cached_id().map(|id| EntityRef::new(self.ty.name(), id))
    }

    /// Checks every locally held value, collecting all failures.
    ///
    /// Values not yet fetched for a loaded instance are not checked. A primary
    /// key without a value passes since it is generated on save.
    pub fn validate(&self) -> ValidationResult<()> {
        let mut issues = Vec::new();
        for field in self.ty.fields() {
            if field.is_composite() {
                continue;
            }
            let stored = self.data.get(field.name());
            if stored.is_none() && (self.loaded || field.is_primary_key()) {
                continue;
            }
            if let Err(issue) = field.validate_stored(stored) {
                issues.push(issue);
            }
        }
        ValidationError::check(issues)
    }

    /// Validates, then writes each field in declaration order.
    ///
    /// Nothing is sent if validation fails. There is no transaction: a store
    /// failure partway through leaves the earlier fields written.
    pub fn save(&mut self) -> Result<(), RepoError> {
        self.validate()?;
        let ty = Arc::clone(&self.ty);
        for field in ty.fields() {
            field.save(self)?;
        }
        Ok(())
    }

    /// Removes every field key and the membership entry, in declaration order.
    ///
    /// Not atomic, and entities referencing this one are left untouched.
    pub fn delete(&mut self) -> Result<(), RepoError> {
        if self.cached_id().is_none() {
            return Err(RepoError::misuse(format!(
                "{} instance has no id and cannot be deleted",
                self.ty.name()
            )));
        }
        let ty = Arc::clone(&self.ty);
        for field in ty.fields() {
            field.delete(self)?;
        }
        Ok(())
    }

    pub fn list(&mut self, name: &str) -> Result<ListHandle<'_>, RepoError> {
        Slot::new(self, name, "list", |kind| matches!(kind, FieldKind::List(_))).map(ListHandle::new)
    }

    pub fn set_of(&mut self, name: &str) -> Result<SetHandle<'_>, RepoError> {
        Slot::new(self, name, "set", |kind| matches!(kind, FieldKind::Set(_))).map(SetHandle::new)
    }

    pub fn hash(&mut self, name: &str) -> Result<HashHandle<'_>, RepoError> {
        Slot::new(self, name, "hash table", |kind| matches!(kind, FieldKind::Hash)).map(HashHandle::new)
    }

    pub fn link(&mut self, name: &str) -> Result<LinkHandle<'_>, RepoError> {
        Slot::new(self, name, "link", |kind| matches!(kind, FieldKind::Link(_))).map(LinkHandle::new)
    }

    /// Resolves a foreign-key field to the referenced instance.
    ///
    /// Reading the field with [`Entity::get`] yields the bare identifier.
    pub fn resolve(&mut self, name: &str) -> Result<Option<Entity>, RepoError> {
        let ty = Arc::clone(&self.ty);
        let field = ty.field(name)?;
        let relation = match field.kind() {
            FieldKind::Reference(relation) => relation,
            _ => {
                return Err(RepoError::misuse(format!(
                    "{} is not a foreign key field",
                    field.path()
                )));
            }
        };
        let Some(id) = field.get(self)?.as_text().map(str::to_string) else {
            return Ok(None);
        };
        let related = ty.related(relation.target_name().unwrap_or_default())?;
        relation.resolve(&related, &id).map(Some)
    }

    pub fn queries(&self) -> &QueryLog {
        &self.log
    }

    pub fn stats(&self) -> QueryStats {
        QueryStats::from_log(self.ty.key_name(), &self.log)
    }

    pub(crate) fn execute(&mut self, command: &Command) -> Result<Reply, RepoError> {
        self.log.run(self.ty.manager(), command)
    }

    pub(crate) fn cached(&self, name: &str) -> Option<&Stored> {
        self.data.get(name)
    }

    pub(crate) fn cached_mut(&mut self, name: &str) -> Option<&mut Stored> {
        self.data.get_mut(name)
    }

    pub(crate) fn cache(&mut self, name: &str, stored: Stored) {
        self.data.insert(name.to_string(), stored);
    }

    pub(crate) fn uncache(&mut self, name: &str) {
        self.data.remove(name);
    }
}

/// Instances are equal when they share a type and a primary-key value. An
/// instance without an id equals only itself.
impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        match (self.identity(), other.identity()) {
            (Some(left), Some(right)) => left == right,
            _ => std::ptr::eq(self, other),
        }
    }
}

impl Eq for Entity {}

/// Hashes the identity only, so it agrees with equality. Assigning an id
/// changes the hash of an instance already placed in a hashed collection.
impl Hash for Entity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} object", self.ty.name())
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}: {}>", self.ty.name(), self.cached_id().unwrap_or("None"))
    }
}
