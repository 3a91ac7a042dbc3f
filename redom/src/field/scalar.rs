//! Coercion between caller values and the string form scalars are stored as.

use chrono::{DateTime, Utc};

use super::value::Value;
use crate::errors::{RepoError, ValidationIssue};

pub(crate) fn type_issue(path: &str, expected: &str, value: &Value) -> ValidationIssue {
    ValidationIssue::new(
        path,
        "validation.type",
        format!("field {path} requires {expected} value, got {}", value.type_name()),
    )
}

pub(crate) fn encode_text(path: &str, value: &Value) -> Result<String, ValidationIssue> {
    match value {
        Value::Text(text) => Ok(text.clone()),
        Value::Integer(number) => Ok(number.to_string()),
        other => Err(type_issue(path, "text", other)),
    }
}

pub(crate) fn parse_integer(path: &str, raw: &str) -> Result<i64, ValidationIssue> {
    raw.parse::<i64>().map_err(|_| {
        ValidationIssue::new(
            path,
            "validation.integer",
            format!("field {path} requires integer value, got {raw:?}"),
        )
    })
}

pub(crate) fn encode_integer(path: &str, value: &Value) -> Result<String, ValidationIssue> {
    match value {
        Value::Integer(number) => Ok(number.to_string()),
        Value::Text(raw) => parse_integer(path, raw).map(|number| number.to_string()),
        other => Err(type_issue(path, "integer", other)),
    }
}

/// Timestamps are stored as whole epoch seconds.
pub(crate) fn encode_timestamp(path: &str, value: &Value) -> Result<String, ValidationIssue> {
    match value {
        Value::Timestamp(at) => Ok(at.timestamp().to_string()),
        other => Err(type_issue(path, "datetime", other)),
    }
}

pub(crate) fn decode_timestamp(path: &str, raw: &str) -> Result<DateTime<Utc>, RepoError> {
    let seconds = parse_integer(path, raw)?;
    DateTime::from_timestamp(seconds, 0).ok_or_else(|| RepoError::Decode {
        field: path.to_string(),
        message: format!("epoch value {seconds} is out of range"),
    })
}
