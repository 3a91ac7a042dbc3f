//! Shared schema and helpers for the integration tests.
#![allow(dead_code)]

use chrono::Utc;
use redom::{
    Command, EntityType, Field, Manager, MemoryStore, Registry, Relation, Schema, Value, field::Element,
    store::Reply,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn memory_manager() -> Manager {
    init_logging();
    Manager::new(MemoryStore::new())
}

/// Blog-style schema used across the tests:
///
/// - `User { name }` with an injected counter id
/// - `Note { text, comments, created, author -> User, likes, scores, tags, meta, readers => User }`
/// - `Session { token, user -> User }` keyed by random tokens
/// - `Person { name, friends => Person }`
pub fn blog_schema(manager: Manager) -> Schema {
    let mut registry = Registry::new(manager);
    registry
        .define(EntityType::builder("User").field("name", Field::text()))
        .define(
            EntityType::builder("Note")
                .field("text", Field::text().required())
                .field("comments", Field::integer().default(0))
                .field("created", Field::timestamp().default_with(|| Value::from(Utc::now())))
                .field("author", Field::reference(Relation::to("User")))
                .field("likes", Field::list())
                .field("scores", Field::list_of(Element::Integer))
                .field("tags", Field::set())
                .field("labels", Field::set())
                .field("meta", Field::hash())
                .field("readers", Field::link(Relation::to("User").related_name("reading"))),
        )
        .define(
            EntityType::builder("Session")
                .field("token", Field::token_key())
                .field("user", Field::reference(Relation::to("User").related_name("sessions"))),
        )
        .define(
            EntityType::builder("Person")
                .field("name", Field::text())
                .field("friends", Field::link(Relation::to_self())),
        );
    registry.finish().expect("blog schema registers")
}

pub fn memory_schema() -> (Manager, Schema) {
    let manager = memory_manager();
    let schema = blog_schema(manager.clone());
    (manager, schema)
}

pub fn key_exists(manager: &Manager, key: &str) -> bool {
    let reply = manager.execute(&Command::new("EXISTS").arg(key)).expect("EXISTS");
    matches!(reply, Reply::Int(1))
}

pub fn texts(values: &[&str]) -> Vec<Value> {
    values.iter().map(|value| Value::from(*value)).collect()
}
