//! Two-phase registration of entity types.
//!
//! Types are declared on a [`Registry`] with relation targets named by string.
//! [`Registry::finish`] checks the declarations, injects missing primary keys,
//! binds every field, resolves relation targets and wires reverse accessors.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Weak},
};

use crate::{
    entity::Entity,
    entity_type::{EntityType, RelationKind, ReverseRelation},
    errors::RepoError,
    field::{Field, FieldKind},
    manager::Manager,
};

/// Declaration of one entity type, consumed by [`Registry::define`].
#[derive(Debug, Clone)]
pub struct EntityTypeBuilder {
    name: String,
    fields: Vec<(String, Field)>,
    manager: Option<Manager>,
}

impl EntityTypeBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            manager: None,
        }
    }

    pub fn field(mut self, name: impl Into<String>, field: Field) -> Self {
        self.fields.push((name.into(), field));
        self
    }

    /// Connection holder for this type; defaults to the registry's.
    pub fn manager(mut self, manager: Manager) -> Self {
        self.manager = Some(manager);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl EntityType {
    pub fn builder(name: impl Into<String>) -> EntityTypeBuilder {
        EntityTypeBuilder::new(name)
    }
}

#[derive(Debug)]
pub struct Registry {
    manager: Manager,
    builders: Vec<EntityTypeBuilder>,
}

impl Registry {
    pub fn new(manager: Manager) -> Self {
        Self {
            manager,
            builders: Vec::new(),
        }
    }

    pub fn define(&mut self, builder: EntityTypeBuilder) -> &mut Self {
        self.builders.push(builder);
        self
    }

    pub fn finish(self) -> Result<Schema, RepoError> {
        let mut names = HashSet::new();
        for builder in &self.builders {
            if !names.insert(builder.name.clone()) {
                return Err(RepoError::misuse(format!(
                    "entity type {} is defined twice",
                    builder.name
                )));
            }
        }

        let mut declared = Vec::with_capacity(self.builders.len());
        for builder in self.builders {
            declared.push(prepare(builder, &names, &self.manager)?);
        }

        let mut reverse: HashMap<String, HashMap<String, ReverseRelation>> = HashMap::new();
        for ty in &declared {
            for field in &ty.fields {
                let (relation, kind) = match field.kind() {
                    FieldKind::Reference(relation) => (relation, RelationKind::Reference),
                    FieldKind::Link(relation) => (relation, RelationKind::Link),
                    _ => continue,
                };
                let target = relation.target_name().unwrap_or_default();
                let accessor = relation.accessor_name(&ty.name);
                let target_fields = declared
                    .iter()
                    .find(|candidate| candidate.name == target)
                    .map(|candidate| &candidate.fields);
                if target_fields.is_some_and(|fields| fields.iter().any(|f| f.name() == accessor)) {
                    return Err(RepoError::misuse(format!(
                        "reverse accessor {target}.{accessor} for {} clashes with a field",
                        field.path()
                    )));
                }
                let previous = reverse.entry(target.to_string()).or_default().insert(
                    accessor.clone(),
                    ReverseRelation {
                        source: ty.name.clone(),
                        field: field.name().to_string(),
                        kind,
                    },
                );
                if let Some(previous) = previous {
                    log::debug!(
                        "reverse accessor {target}.{accessor} now points at {} instead of {}.{}",
                        field.path(),
                        previous.source,
                        previous.field
                    );
                }
            }
        }

        let mut failure = None;
        let inner = Arc::new_cyclic(|schema: &Weak<SchemaInner>| {
            let mut types = Vec::with_capacity(declared.len());
            let mut index = HashMap::new();
            for ty in declared {
                let accessors = reverse.remove(&ty.name).unwrap_or_default();
                match EntityType::new(ty.name, ty.fields, ty.manager, accessors, Weak::clone(schema)) {
                    Ok(built) => {
                        index.insert(built.name().to_string(), types.len());
                        types.push(Arc::new(built));
                    }
                    Err(err) => {
                        failure.get_or_insert(err);
                    }
                }
            }
            SchemaInner { types, index }
        });
        if let Some(err) = failure {
            return Err(err);
        }
        for ty in &inner.types {
            log::debug!("registered entity type {} with {} fields", ty.name(), ty.fields().len());
        }
        Ok(Schema { inner })
    }
}

struct Declared {
    name: String,
    fields: Vec<Field>,
    manager: Manager,
}

/// Checks one declaration and binds its fields.
fn prepare(builder: EntityTypeBuilder, types: &HashSet<String>, default: &Manager) -> Result<Declared, RepoError> {
    let EntityTypeBuilder { name, mut fields, manager } = builder;

    let mut seen = HashSet::new();
    for (field_name, _) in &fields {
        if !seen.insert(field_name.as_str()) {
            return Err(RepoError::misuse(format!("field {name}.{field_name} is declared twice")));
        }
    }

    let keys = fields.iter().filter(|(_, field)| field.is_primary_key()).count();
    match keys {
        0 => {
            if seen.contains("id") {
                return Err(RepoError::misuse(format!(
                    "{name}.id must be a primary key field when no other primary key is declared"
                )));
            }
            fields.push(("id".to_string(), Field::counter_key()));
        }
        1 => {}
        _ => {
            return Err(RepoError::misuse(format!("{name} declares {keys} primary key fields")));
        }
    }

    let mut bound = Vec::with_capacity(fields.len());
    for (field_name, mut field) in fields {
        field.bind(&name, &field_name)?;
        if let Some(relation) = field.relation_mut() {
            let target = relation.resolve_target(&name);
            if !types.contains(target) {
                return Err(RepoError::misuse(format!(
                    "{name}.{field_name} refers to unknown entity type {target}"
                )));
            }
        }
        bound.push(field);
    }

    Ok(Declared {
        name,
        fields: bound,
        manager: manager.unwrap_or_else(|| default.clone()),
    })
}

#[derive(Debug)]
pub(crate) struct SchemaInner {
    types: Vec<Arc<EntityType>>,
    index: HashMap<String, usize>,
}

impl SchemaInner {
    pub(crate) fn lookup(&self, name: &str) -> Result<Arc<EntityType>, RepoError> {
        self.index
            .get(name)
            .map(|&at| Arc::clone(&self.types[at]))
            .ok_or_else(|| RepoError::misuse(format!("unknown entity type {name}")))
    }
}

/// The finished set of entity types. Relations between types stay resolvable
/// while the schema is alive.
#[derive(Debug, Clone)]
pub struct Schema {
    inner: Arc<SchemaInner>,
}

impl Schema {
    pub fn entity_type(&self, name: &str) -> Result<Arc<EntityType>, RepoError> {
        self.inner.lookup(name)
    }

    /// Types in definition order.
    pub fn types(&self) -> impl Iterator<Item = &Arc<EntityType>> {
        self.inner.types.iter()
    }

    pub fn get(&self, entity: &str, id: &str) -> Result<Entity, RepoError> {
        self.entity_type(entity)?.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{field::Relation, store::MemoryStore};

    fn registry() -> Registry {
        Registry::new(Manager::new(MemoryStore::new()))
    }

    #[test]
    fn injects_counter_primary_key() {
        let mut registry = registry();
        registry.define(EntityType::builder("Note").field("text", Field::text()));
        let schema = registry.finish().unwrap();
        let note = schema.entity_type("Note").unwrap();
        assert_eq!(note.primary_key().name(), "id");
        assert_eq!(note.primary_key().internal_type(), "PrimaryKey");
        assert_eq!(note.fields().last().unwrap().path(), "Note.id");
    }

    #[test]
    fn keeps_declared_primary_key() {
        let mut registry = registry();
        registry.define(EntityType::builder("User").field("slug", Field::token_key()));
        let schema = registry.finish().unwrap();
        let user = schema.entity_type("User").unwrap();
        assert_eq!(user.primary_key().name(), "slug");
        assert!(user.field("id").is_err());
    }

    #[test]
    fn rejects_plain_id_field() {
        let mut registry = registry();
        registry.define(EntityType::builder("Note").field("id", Field::text()));
        assert!(registry.finish().unwrap_err().is_misuse());
    }

    #[test]
    fn rejects_duplicates() {
        let mut registry = registry();
        registry
            .define(EntityType::builder("Note").field("text", Field::text()).field("text", Field::integer()));
        assert!(registry.finish().unwrap_err().is_misuse());

        let mut registry = self::registry();
        registry
            .define(EntityType::builder("Note"))
            .define(EntityType::builder("Note"));
        assert!(registry.finish().unwrap_err().is_misuse());

        let mut registry = self::registry();
        registry.define(
            EntityType::builder("Note")
                .field("a", Field::counter_key())
                .field("b", Field::token_key()),
        );
        assert!(registry.finish().unwrap_err().is_misuse());
    }

    #[test]
    fn rejects_unknown_targets() {
        let mut registry = registry();
        registry.define(EntityType::builder("Note").field("author", Field::reference(Relation::to("User"))));
        let err = registry.finish().unwrap_err();
        assert!(err.to_string().contains("unknown entity type User"));
    }

    #[test]
    fn wires_reverse_accessors() {
        let mut registry = registry();
        registry
            .define(EntityType::builder("User").field("name", Field::text()))
            .define(
                EntityType::builder("Note")
                    .field("author", Field::reference(Relation::to("User")))
                    .field("readers", Field::link(Relation::to("User").related_name("reading"))),
            )
            .define(EntityType::builder("Person").field("friends", Field::link(Relation::to_self())));
        let schema = registry.finish().unwrap();

        let user = schema.entity_type("User").unwrap();
        let note = user.reverse_accessor("note").unwrap();
        assert_eq!(note.source, "Note");
        assert_eq!(note.field, "author");
        assert_eq!(note.kind, RelationKind::Reference);
        assert_eq!(user.reverse_accessor("reading").unwrap().kind, RelationKind::Link);
        assert_eq!(user.reverse_type("reading").unwrap().name(), "Note");

        let person = schema.entity_type("Person").unwrap();
        assert_eq!(person.reverse_accessor("person").unwrap().field, "friends");
        let friends = person.field("friends").unwrap();
        assert_eq!(friends.relation().unwrap().target_name(), Some("Person"));
    }

    #[test]
    fn last_relation_wins_accessor() {
        let mut registry = registry();
        registry
            .define(EntityType::builder("User"))
            .define(
                EntityType::builder("Note")
                    .field("author", Field::reference(Relation::to("User")))
                    .field("editor", Field::reference(Relation::to("User"))),
            );
        let schema = registry.finish().unwrap();
        let user = schema.entity_type("User").unwrap();
        assert_eq!(user.reverse_accessor("note").unwrap().field, "editor");
        assert_eq!(user.reverse_accessors().count(), 1);
    }

    #[test]
    fn accessor_clashing_with_field_is_rejected() {
        let mut registry = registry();
        registry
            .define(EntityType::builder("User").field("note", Field::text()))
            .define(EntityType::builder("Note").field("author", Field::reference(Relation::to("User"))));
        assert!(registry.finish().unwrap_err().is_misuse());
    }
}
