use std::{borrow::Cow, fmt};

use thiserror::Error;

/// Top-level error type returned by redom entity and field operations.
#[derive(Debug, Error)]
pub enum RepoError {
    /// Validation failed for one or more fields.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Underlying store command failed. Passed through untouched.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// `get` was called with an identifier missing from the membership index.
    #[error("{entity} with id {entity_id} is not found")]
    NotFound { entity: String, entity_id: String },

    /// The caller used the API in a way the field does not allow.
    #[error("misuse: {message}")]
    Misuse { message: Cow<'static, str> },

    /// Stored bytes could not be decoded for a text-valued field.
    #[error("failed to decode {field}: {message}")]
    Decode { field: String, message: String },

    #[error("{message}")]
    Other { message: Cow<'static, str> },
}

impl RepoError {
    pub(crate) fn misuse(message: impl Into<Cow<'static, str>>) -> Self {
        Self::Misuse {
            message: message.into(),
        }
    }

    /// Returns `true` when this is the not-found error of the named entity type.
    pub fn is_not_found_for(&self, entity: &str) -> bool {
        matches!(self, Self::NotFound { entity: name, .. } if name == entity)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_misuse(&self) -> bool {
        matches!(self, Self::Misuse { .. })
    }
}

/// Every field that failed [`Entity::validate`](crate::Entity::validate), in
/// declaration order.
#[derive(Debug, Error)]
#[error("{}", summarize(.issues))]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

fn summarize(issues: &[ValidationIssue]) -> String {
    issues.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

impl ValidationError {
    /// `Ok` when nothing was collected.
    pub(crate) fn check(issues: Vec<ValidationIssue>) -> ValidationResult<()> {
        if issues.is_empty() { Ok(()) } else { Err(Self { issues }) }
    }

    /// The issue reported for an `<Entity>.<field>` path.
    pub fn issue_for(&self, path: &str) -> Option<&ValidationIssue> {
        self.issues.iter().find(|issue| issue.field == path)
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.issues.iter().map(|issue| issue.code.as_str())
    }
}

/// One failed field: its path, a stable `validation.*` code and a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub field: String,
    pub code: String,
    pub message: String,
}

impl ValidationIssue {
    pub(crate) fn new(path: &str, code: &str, message: String) -> Self {
        Self {
            field: path.to_string(),
            code: code.to_string(),
            message,
        }
    }

    pub(crate) fn required(path: &str) -> Self {
        Self::new(path, "validation.required", format!("field {path} is required"))
    }

    /// Stored bytes that no longer parse as the field's type.
    pub(crate) fn undecodable(path: &str, err: &RepoError) -> Self {
        Self::new(path, "validation.decode", err.to_string())
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.message, self.code)
    }
}

impl From<ValidationIssue> for ValidationError {
    fn from(issue: ValidationIssue) -> Self {
        Self { issues: vec![issue] }
    }
}

impl From<ValidationIssue> for RepoError {
    fn from(issue: ValidationIssue) -> Self {
        Self::Validation(issue.into())
    }
}

pub type ValidationResult<T> = Result<T, ValidationError>;
