//! Decoding of raw store replies into the shapes fields work with.

use std::collections::BTreeMap;

use super::Reply;
use crate::errors::RepoError;

fn decode_error(field: &str, message: impl Into<String>) -> RepoError {
    RepoError::Decode {
        field: field.to_string(),
        message: message.into(),
    }
}

fn utf8(bytes: Vec<u8>, field: &str) -> Result<String, RepoError> {
    String::from_utf8(bytes).map_err(|err| decode_error(field, format!("stored bytes are not UTF-8: {err}")))
}

/// Decodes a bulk/simple reply into text. `Nil` maps to `None`.
pub(crate) fn text(reply: Reply, field: &str) -> Result<Option<String>, RepoError> {
    match reply {
        Reply::Nil => Ok(None),
        Reply::BulkString(bytes) => utf8(bytes, field).map(Some),
        Reply::SimpleString(text) => Ok(Some(text)),
        Reply::Okay => Ok(Some("OK".to_string())),
        Reply::Int(number) => Ok(Some(number.to_string())),
        other => Err(decode_error(field, format!("expected a text reply, got {other:?}"))),
    }
}

/// Decodes a multi-bulk reply (list or set members) into texts.
pub(crate) fn texts(reply: Reply, field: &str) -> Result<Vec<String>, RepoError> {
    match reply {
        Reply::Nil => Ok(Vec::new()),
        Reply::Array(items) | Reply::Set(items) => items
            .into_iter()
            .map(|item| text(item, field).map(Option::unwrap_or_default))
            .collect(),
        other => Err(decode_error(field, format!("expected a multi-bulk reply, got {other:?}"))),
    }
}

/// Decodes a flat `key value key value ...` reply (or a RESP3 map) into pairs.
pub(crate) fn pairs(reply: Reply, field: &str) -> Result<BTreeMap<String, String>, RepoError> {
    match reply {
        Reply::Map(entries) => entries
            .into_iter()
            .map(|(key, value)| {
                let key = text(key, field)?.unwrap_or_default();
                let value = text(value, field)?.unwrap_or_default();
                Ok((key, value))
            })
            .collect(),
        other => {
            let flat = texts(other, field)?;
            if flat.len() % 2 != 0 {
                return Err(decode_error(field, "hash reply has an odd number of elements"));
            }
            let mut map = BTreeMap::new();
            let mut iter = flat.into_iter();
            while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
                map.insert(key, value);
            }
            Ok(map)
        }
    }
}

pub(crate) fn integer(reply: &Reply) -> Result<i64, RepoError> {
    Ok(redis::from_redis_value::<i64>(reply)?)
}

pub(crate) fn flag(reply: &Reply) -> Result<bool, RepoError> {
    Ok(redis::from_redis_value::<bool>(reply)?)
}
