//! Primary-key strategies and membership-index maintenance.

use super::{Field, FieldKind};
use crate::{
    entity::Entity,
    errors::RepoError,
    id::generate_token,
    store::{Command, reply},
};

/// Draws the next identifier for `field`.
///
/// Counter keys use the store's atomic `INCR` on the per-type counter key.
/// Token keys are generated locally and never checked against the store.
pub(crate) fn next_id(entity: &mut Entity, field: &Field) -> Result<String, RepoError> {
    let id = match field.kind() {
        FieldKind::CounterKey => {
            let counter = entity.entity_type().key_context().counter();
            let reply = entity.execute(&Command::new("INCR").arg(counter))?;
            reply::integer(&reply)?.to_string()
        }
        FieldKind::TokenKey => generate_token(),
        _ => {
            return Err(RepoError::misuse(format!(
                "{} is not a primary key field",
                field.path()
            )));
        }
    };
    log::trace!("assigned id {id} to {}", field.path());
    Ok(id)
}

pub(crate) fn save_cmd(entity: &mut Entity) -> Result<Command, RepoError> {
    let id = entity.id_text()?;
    let membership = entity.entity_type().key_context().membership();
    Ok(Command::new("SADD").arg(membership).arg(id))
}

pub(crate) fn delete_cmd(entity: &mut Entity) -> Result<Command, RepoError> {
    let id = entity.id_text()?;
    let membership = entity.entity_type().key_context().membership();
    Ok(Command::new("SREM").arg(membership).arg(id))
}
