use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::models::UserType;

/// Failures of the underlying key-value store. These are the only errors
/// that are not expected to be recoverable by the user.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to create data directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode '{key}': {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Update of '{key}' did not run")]
    UpdateSkipped { key: String },
}

/// Errors surfaced to the person using the board. Everything except
/// `Store` is something the front end reports inline and carries on.
#[derive(Error, Debug)]
pub enum BoardError {
    #[error("{0}")]
    Validation(FieldErrors),

    #[error("A record with this {field} already exists: {value}")]
    Duplicate { field: &'static str, value: String },

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Not logged in")]
    NotLoggedIn,

    #[error("This action requires one of: {}", format_roles(.required))]
    Unauthorized { required: Vec<UserType> },

    #[error("{entity} #{id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Job #{0} is not accepting applications")]
    JobClosed(i64),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl BoardError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

fn format_roles(roles: &[UserType]) -> String {
    roles
        .iter()
        .map(|r| r.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

pub type BoardResult<T> = std::result::Result<T, BoardError>;

/// Field-level validation messages, in the order they were found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors {
    errors: Vec<(&'static str, String)>,
}

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.errors.push((field, message.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.errors
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, m)| m.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.errors.iter().map(|(f, m)| (*f, m.as_str()))
    }

    /// Turns the accumulated messages into a validation error, if any.
    pub fn into_result(self) -> BoardResult<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(BoardError::Validation(self))
        }
    }
}

impl fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|(field, message)| format!("{}: {}", field, message))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_errors_into_result() {
        assert!(FieldErrors::new().into_result().is_ok());

        let mut errors = FieldErrors::new();
        errors.add("email", "Enter a valid email address");
        errors.add("contact", "Contact number must be 10 digits");
        assert_eq!(errors.get("contact"), Some("Contact number must be 10 digits"));

        let err = errors.into_result().unwrap_err();
        assert_eq!(
            err.to_string(),
            "email: Enter a valid email address; contact: Contact number must be 10 digits"
        );
    }

    #[test]
    fn test_unauthorized_lists_roles() {
        let err = BoardError::Unauthorized {
            required: vec![UserType::Admin, UserType::HrManager],
        };
        assert_eq!(err.to_string(), "This action requires one of: admin, hr_manager");
    }
}
