//! redom: typed entities mapped onto Redis keys.
//!
//! Entity types are declared on a [`Registry`] as ordered lists of [`Field`]s.
//! Scalar fields are cached locally and written on [`Entity::save`]; lists,
//! sets, hash tables and links are mutated through handles that talk to the
//! store immediately. Every command an instance issues is timed in its
//! [`QueryLog`].
//!
//! ```no_run
//! use redom::{EntityType, Field, Manager, Registry};
//!
//! # fn main() -> Result<(), redom::RepoError> {
//! let manager = Manager::connect("redis://127.0.0.1/")?;
//! let mut registry = Registry::new(manager);
//! registry.define(EntityType::builder("Note").field("text", Field::text().required()));
//! let schema = registry.finish()?;
//!
//! let notes = schema.entity_type("Note")?;
//! let mut note = notes.create([("text", "hi")])?;
//! note.save()?;
//! let id = note.id_text()?;
//! let mut loaded = notes.get(&id)?;
//! assert_eq!(loaded.get("text")?.as_text(), Some("hi"));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod entity;
pub mod entity_type;
pub mod errors;
pub mod field;
pub mod id;
pub mod keys;
pub mod manager;
pub mod query_log;
pub mod registry;
pub mod store;

pub use config::RedomConfig;
pub use entity::Entity;
pub use entity_type::{EntityType, RelationKind, ReverseRelation};
pub use errors::{RepoError, ValidationError, ValidationIssue, ValidationResult};
pub use field::{
    DefaultValue, Element, EntityRef, Field, FieldKind, HashHandle, LinkHandle, ListHandle, Relation, Resolver,
    SetHandle, SetOp, Target, Value,
};
pub use keys::KeyContext;
pub use manager::Manager;
pub use query_log::{QueryLog, QueryRecord, QueryStats};
pub use registry::{EntityTypeBuilder, Registry, Schema};
pub use store::{Command, MemoryStore, RedisStore, Reply, Store};

use store::reply;

/// Deletes every key matching `pattern` (SCAN + DEL). Returns the number removed.
pub fn cleanup_pattern(manager: &Manager, pattern: &str) -> Result<u64, RepoError> {
    const SCAN_COUNT: usize = 1000;
    let mut cursor: u64 = 0;
    let mut total_deleted: u64 = 0;

    loop {
        let reply = manager.execute(
            &Command::new("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT),
        )?;
        let (next_cursor, keys): (u64, Vec<String>) = redis::from_redis_value(&reply)?;

        if !keys.is_empty() {
            let mut delete = Command::new("DEL");
            for key in keys {
                delete = delete.arg(key);
            }
            total_deleted += reply::integer(&manager.execute(&delete)?)?.max(0) as u64;
        }

        cursor = next_cursor;
        if cursor == 0 {
            break;
        }
    }

    Ok(total_deleted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleanup_removes_only_matching_keys() {
        let manager = Manager::new(MemoryStore::new());
        for key in ["note", "note:all", "note:1:text", "user:1:name"] {
            manager.execute(&Command::new("SET").arg(key).arg("x")).unwrap();
        }
        assert_eq!(cleanup_pattern(&manager, "note*").unwrap(), 3);
        let left = manager.execute(&Command::new("EXISTS").arg("user:1:name")).unwrap();
        assert_eq!(reply::integer(&left).unwrap(), 1);
        assert_eq!(cleanup_pattern(&manager, "note*").unwrap(), 0);
    }
}
