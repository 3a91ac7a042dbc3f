//! Entity construction, validation, save/get/delete and query logging.

mod support;

use std::{
    collections::HashSet,
    sync::{
        Arc,
        atomic::{AtomicI64, Ordering},
    },
};

use chrono::{TimeZone, Utc};
use redom::{EntityType, Field, Registry, RepoError, Value};
use support::{blog_schema, key_exists, memory_manager, memory_schema};

// ============ Save / get / delete ============

#[test]
fn note_round_trip_then_delete() {
    let (_, schema) = memory_schema();
    let notes = schema.entity_type("Note").unwrap();

    let mut note = notes.create([("text", "hi")]).unwrap();
    note.save().unwrap();
    let id = note.id_text().unwrap();
    assert_eq!(id, "1");

    let mut loaded = notes.get(&id).unwrap();
    assert!(loaded.is_loaded());
    assert_eq!(loaded.get("text").unwrap(), Value::from("hi"));

    loaded.delete().unwrap();
    let err = notes.get(&id).unwrap_err();
    assert!(err.is_not_found_for("Note"));
    assert_eq!(err.to_string(), "Note with id 1 is not found");
}

#[test]
fn saved_scalars_read_back_equal() {
    let (_, schema) = memory_schema();
    let notes = schema.entity_type("Note").unwrap();
    let created = Utc.with_ymd_and_hms(2011, 5, 17, 10, 30, 15).unwrap();

    let mut note = notes
        .create([
            ("text", Value::from("körper")),
            ("comments", Value::from("12")),
            ("created", Value::from(created)),
        ])
        .unwrap();
    note.save().unwrap();

    let mut loaded = notes.get(note.id_text().unwrap()).unwrap();
    assert_eq!(loaded.get("text").unwrap(), Value::from("körper"));
    assert_eq!(loaded.get("comments").unwrap(), Value::Integer(12));
    assert_eq!(loaded.get("created").unwrap(), Value::Timestamp(created));
    assert_eq!(loaded.get("author").unwrap(), Value::Null);
    assert_eq!(loaded.id().unwrap(), Value::Integer(1));
}

#[test]
fn delete_removes_every_key() {
    let (manager, schema) = memory_schema();
    let notes = schema.entity_type("Note").unwrap();
    let mut note = notes.create([("text", "bye")]).unwrap();
    note.save().unwrap();
    note.list("likes").unwrap().append("ann").unwrap();
    assert!(key_exists(&manager, "note:1:text"));
    assert!(key_exists(&manager, "note:1:likes"));

    note.delete().unwrap();
    for key in ["note:1:text", "note:1:comments", "note:1:created", "note:1:likes"] {
        assert!(!key_exists(&manager, key), "{key} should be gone");
    }
    assert!(!notes.exists(1).unwrap());
    // The counter survives deletion.
    assert!(key_exists(&manager, "note"));
}

#[test]
fn delete_requires_an_id() {
    let (_, schema) = memory_schema();
    let notes = schema.entity_type("Note").unwrap();
    let mut note = notes.create([("text", "x")]).unwrap();
    assert!(note.delete().unwrap_err().is_misuse());
    assert_eq!(note.stats().count, 0);
}

#[test]
fn get_of_unknown_id_is_not_found() {
    let (_, schema) = memory_schema();
    let err = schema.get("User", "42").unwrap_err();
    assert!(matches!(err, RepoError::NotFound { ref entity, ref entity_id } if entity == "User" && entity_id == "42"));
}

// ============ Validation ============

#[test]
fn failed_validation_issues_no_commands() {
    let (manager, schema) = memory_schema();
    let notes = schema.entity_type("Note").unwrap();
    let mut note = notes.new_entity().unwrap();

    let validation = match note.save().unwrap_err() {
        RepoError::Validation(validation) => validation,
        other => panic!("expected validation error, got {other:?}"),
    };
    assert_eq!(validation.issues.len(), 1);
    assert_eq!(validation.issue_for("Note.text").unwrap().code, "validation.required");
    assert_eq!(note.stats().count, 0);
    assert!(!key_exists(&manager, "note"));
    assert!(!key_exists(&manager, "note:all"));
}

#[test]
fn set_rejects_bad_values_and_keeps_cache() {
    let (_, schema) = memory_schema();
    let notes = schema.entity_type("Note").unwrap();
    let mut note = notes.create([("text", "x"), ("comments", "3")]).unwrap();

    let err = note.set("comments", "three").unwrap_err();
    assert!(err.is_validation());
    assert_eq!(note.get("comments").unwrap(), Value::Integer(3));

    assert!(note.set("text", "").unwrap_err().is_validation());
    assert!(note.set("created", 5).unwrap_err().is_validation());
    note.set("comments", 4).unwrap();
    assert_eq!(note.get("comments").unwrap(), Value::Integer(4));
}

#[test]
fn composites_and_unknown_fields_cannot_be_assigned() {
    let (_, schema) = memory_schema();
    let notes = schema.entity_type("Note").unwrap();

    assert!(notes.create([("likes", "a")]).unwrap_err().is_misuse());
    assert!(notes.create([("nope", "a")]).unwrap_err().is_misuse());

    let mut note = notes.create([("text", "x")]).unwrap();
    assert!(note.set("tags", "a").unwrap_err().is_misuse());
    assert!(note.get("nope").unwrap_err().is_misuse());
    assert!(note.list("tags").is_err());
}

// ============ Defaults and identifiers ============

#[test]
fn defaults_apply_on_construction() {
    let (_, schema) = memory_schema();
    let notes = schema.entity_type("Note").unwrap();
    let mut note = notes.create([("text", "x")]).unwrap();
    assert_eq!(note.get("comments").unwrap(), Value::Integer(0));
    assert!(note.get("created").unwrap().as_timestamp().is_some());
    assert_eq!(note.cached_id(), None);
}

#[test]
fn generator_defaults_run_per_instance() {
    let manager = memory_manager();
    let calls = Arc::new(AtomicI64::new(0));
    let counter = Arc::clone(&calls);
    let mut registry = Registry::new(manager);
    registry.define(
        EntityType::builder("Ticket")
            .field("seq", Field::integer().default_with(move || Value::from(counter.fetch_add(1, Ordering::SeqCst)))),
    );
    let schema = registry.finish().unwrap();
    let tickets = schema.entity_type("Ticket").unwrap();

    let mut first = tickets.new_entity().unwrap();
    let mut second = tickets.new_entity().unwrap();
    assert_eq!(first.get("seq").unwrap(), Value::Integer(0));
    assert_eq!(second.get("seq").unwrap(), Value::Integer(1));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn counter_ids_strictly_increase() {
    let (_, schema) = memory_schema();
    let users = schema.entity_type("User").unwrap();
    let mut ids = Vec::new();
    for n in 0..5 {
        let mut user = users.create([("name", format!("user {n}"))]).unwrap();
        user.save().unwrap();
        ids.push(user.id().unwrap().as_integer().unwrap());
    }
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    assert!(users.exists(5).unwrap());
}

#[test]
fn token_ids_are_distinct() {
    let (_, schema) = memory_schema();
    let sessions = schema.entity_type("Session").unwrap();
    let mut tokens = HashSet::new();
    for _ in 0..25 {
        let mut session = sessions.new_entity().unwrap();
        session.save().unwrap();
        let token = session.id_text().unwrap();
        assert_eq!(token.len(), 20);
        assert!(sessions.exists(&token).unwrap());
        tokens.insert(token);
    }
    assert_eq!(tokens.len(), 25);
    // Token generation never touches the store.
    let mut session = sessions.new_entity().unwrap();
    session.id_text().unwrap();
    assert_eq!(session.stats().count, 0);
}

#[test]
fn primary_key_default_is_deferred() {
    let manager = memory_manager();
    let mut registry = Registry::new(manager);
    registry.define(
        EntityType::builder("Slugged")
            .field("slug", Field::token_key().default_with(|| Value::from("fixed-slug")))
            .field("title", Field::text()),
    );
    let schema = registry.finish().unwrap();
    let slugged = schema.entity_type("Slugged").unwrap();

    let mut item = slugged.create([("title", "t")]).unwrap();
    assert_eq!(item.cached_id(), None);
    item.save().unwrap();
    assert_eq!(item.id_text().unwrap(), "fixed-slug");
    assert_eq!(slugged.get("fixed-slug").unwrap().get("title").unwrap(), Value::from("t"));
}

#[test]
fn explicit_id_is_kept() {
    let (_, schema) = memory_schema();
    let users = schema.entity_type("User").unwrap();
    let mut user = users.create([("id", Value::from(77)), ("name", Value::from("x"))]).unwrap();
    user.save().unwrap();
    assert_eq!(user.id_text().unwrap(), "77");
    assert!(users.exists(77).unwrap());
}

// ============ Identity ============

#[test]
fn equality_uses_type_and_id() {
    let (_, schema) = memory_schema();
    let users = schema.entity_type("User").unwrap();
    let mut user = users.create([("name", "a")]).unwrap();
    let unsaved = users.create([("name", "a")]).unwrap();
    assert_ne!(user, unsaved);

    user.save().unwrap();
    let first = users.get(1).unwrap();
    let second = users.get(1).unwrap();
    assert_eq!(first, second);
    assert_eq!(first, user);

    let notes = schema.entity_type("Note").unwrap();
    let mut note = notes.create([("text", "x")]).unwrap();
    note.save().unwrap();
    assert_eq!(note.identity().unwrap().id, "1");
    assert_ne!(note, user);
}

#[test]
fn instances_hash_by_type_and_id() {
    let (_, schema) = memory_schema();
    let users = schema.entity_type("User").unwrap();
    let notes = schema.entity_type("Note").unwrap();
    users.create([("name", "a")]).unwrap().save().unwrap();
    notes.create([("text", "x")]).unwrap().save().unwrap();

    let mut seen = HashSet::new();
    assert!(seen.insert(users.get(1).unwrap()));
    assert!(!seen.insert(users.get(1).unwrap()));
    assert!(seen.insert(notes.get(1).unwrap()));
    assert_eq!(seen.len(), 2);
    assert!(seen.contains(&users.get("1").unwrap()));

    let unsaved = users.create([("name", "b")]).unwrap();
    assert_eq!(unsaved.identity(), None);
    assert!(seen.insert(unsaved));
    assert!(seen.insert(users.create([("name", "b")]).unwrap()));
    assert_eq!(seen.len(), 4);
}

#[test]
fn display_and_debug() {
    let (_, schema) = memory_schema();
    let users = schema.entity_type("User").unwrap();
    let mut user = users.create([("name", "a")]).unwrap();
    assert_eq!(user.to_string(), "User object");
    assert_eq!(format!("{user:?}"), "<User: None>");
    user.save().unwrap();
    assert_eq!(format!("{user:?}"), "<User: 1>");
}

// ============ Lazy loading and query log ============

#[test]
fn loaded_entities_fetch_once_per_field() {
    let (_, schema) = memory_schema();
    let notes = schema.entity_type("Note").unwrap();
    notes.create([("text", "lazy")]).unwrap().save().unwrap();

    let mut loaded = notes.get(1).unwrap();
    assert_eq!(loaded.stats().count, 1);
    assert_eq!(loaded.get("text").unwrap(), Value::from("lazy"));
    assert_eq!(loaded.stats().count, 2);
    loaded.get("text").unwrap();
    assert_eq!(loaded.stats().count, 2);
    let commands: Vec<_> = loaded.queries().commands().collect();
    assert_eq!(commands, vec!["SISMEMBER note:all 1", "GET note:1:text"]);
}

#[test]
fn save_logs_each_command_in_declaration_order() {
    let (_, schema) = memory_schema();
    let notes = schema.entity_type("Note").unwrap();
    let created = Utc.with_ymd_and_hms(2011, 5, 17, 10, 30, 15).unwrap();
    let mut note = notes
        .create([("text", Value::from("hi")), ("created", Value::from(created))])
        .unwrap();
    note.save().unwrap();

    let commands: Vec<_> = note.queries().commands().collect();
    assert_eq!(
        commands,
        vec![
            "INCR note",
            "SET note:1:text hi",
            "SET note:1:comments 0",
            "SET note:1:created 1305628215",
            "SADD note:all 1",
        ]
    );

    let stats = note.stats();
    assert_eq!(stats.entity, "note");
    assert_eq!(stats.count, 5);
    assert_eq!(stats.total_time, note.queries().total_time());
    let json = serde_json::to_value(&stats).unwrap();
    assert_eq!(json["count"], 5);
    assert_eq!(json["queries"][0]["command"], "INCR note");
}

#[test]
fn loaded_save_skips_unfetched_fields() {
    let (_, schema) = memory_schema();
    let notes = schema.entity_type("Note").unwrap();
    notes.create([("text", "keep")]).unwrap().save().unwrap();

    let mut loaded = notes.get(1).unwrap();
    loaded.set("comments", 9).unwrap();
    loaded.save().unwrap();
    let commands: Vec<_> = loaded.queries().commands().skip(1).collect();
    assert_eq!(commands, vec!["SET note:1:comments 9", "SADD note:all 1"]);

    let mut fresh = notes.get(1).unwrap();
    assert_eq!(fresh.get("text").unwrap(), Value::from("keep"));
    assert_eq!(fresh.get("comments").unwrap(), Value::Integer(9));
}

#[test]
fn key_prefix_namespaces_every_key() {
    let manager = memory_manager();
    let scoped = manager.with_prefix("ns");
    let schema = blog_schema(scoped);
    let notes = schema.entity_type("Note").unwrap();
    let mut note = notes.create([("text", "x")]).unwrap();
    note.save().unwrap();

    assert!(key_exists(&manager, "ns:note:1:text"));
    assert!(key_exists(&manager, "ns:note:all"));
    assert!(!key_exists(&manager, "note:1:text"));
    assert_eq!(notes.key(&["1", "text"]), "ns:note:1:text");
    assert_eq!(redom::cleanup_pattern(&manager, "ns:*").unwrap(), 5);
}
