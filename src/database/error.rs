use std::fmt::{self, Display};

use thiserror::Error;
use warp::http::StatusCode;

#[derive(Debug)]
pub struct QueryError {
    info: String,
    constraint: Option<String>,
    kind: QueryErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    UniqueViolation,
    ForeignKeyViolation,
    Other,
}

impl QueryError {
    pub fn new(info: String) -> Self {
        Self {
            info,
            constraint: None,
            kind: QueryErrorKind::Other,
        }
    }

    pub fn kind(&self) -> QueryErrorKind {
        self.kind
    }

    /// Name of the violated constraint, if the database reported one.
    pub fn constraint(&self) -> Option<&str> {
        self.constraint.as_deref()
    }
}

impl From<sqlx::Error> for QueryError {
    fn from(value: sqlx::Error) -> Self {
        match value {
            sqlx::Error::Database(e) => {
                let kind = if e.is_unique_violation() {
                    QueryErrorKind::UniqueViolation
                } else if e.is_foreign_key_violation() {
                    QueryErrorKind::ForeignKeyViolation
                } else {
                    QueryErrorKind::Other
                };

                Self {
                    info: format!("{e}"),
                    constraint: e.constraint().map(str::to_owned),
                    kind,
                }
            }
            sqlx::Error::RowNotFound => Self::new(String::from("RowNotFound")),
            sqlx::Error::PoolTimedOut => Self::new(String::from("Pool timed out")),
            sqlx::Error::PoolClosed => Self::new(String::from("Pool closed")),
            sqlx::Error::WorkerCrashed => Self::new(String::from("Worker crashed")),
            sqlx::Error::ColumnNotFound(e) => Self::new(format!("Column not found: {e}")),
            sqlx::Error::ColumnDecode { index, source } => {
                Self::new(format!("Column decode {index} ({source})"))
            }
            e => Self::new(format!("{e}")),
        }
    }
}

impl Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.info)
    }
}

impl std::error::Error for QueryError {}

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("You cannot subscribe to yourself")]
    InvalidSelfReference,

    #[error("Shopping cart is empty")]
    EmptyCart,

    #[error("{field}: {message}")]
    Validation { field: String, message: String },

    #[error("Unable to log in with provided credentials")]
    InvalidCredentials,

    #[error("Authentication credentials were not provided or are invalid")]
    Unauthorized,

    #[error("You don't have permission to perform this action")]
    Forbidden,

    #[error("Query failed: {0}")]
    Query(#[from] QueryError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ActionError {
    pub fn validation(field: &str, message: &str) -> Self {
        Self::Validation {
            field: field.to_string(),
            message: message.to_string(),
        }
    }

    pub fn not_found(info: &str) -> Self {
        Self::NotFound(info.to_string())
    }

    pub fn conflict(info: &str) -> Self {
        Self::Conflict(info.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ActionError::Conflict(_)
            | ActionError::InvalidSelfReference
            | ActionError::EmptyCart
            | ActionError::Validation { .. }
            | ActionError::InvalidCredentials => StatusCode::BAD_REQUEST,
            ActionError::Unauthorized => StatusCode::UNAUTHORIZED,
            ActionError::Forbidden => StatusCode::FORBIDDEN,
            ActionError::NotFound(_) => StatusCode::NOT_FOUND,
            ActionError::Query(_) | ActionError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Rewrites a unique violation on one of `fields` into a validation error on that field.
    /// `fields` pairs a constraint name with the payload field it guards.
    pub fn from_unique(error: QueryError, fields: &[(&str, &str)], message: &str) -> Self {
        if error.kind() != QueryErrorKind::UniqueViolation {
            return error.into();
        }

        let field = error
            .constraint()
            .and_then(|constraint| {
                fields
                    .iter()
                    .find(|(name, _)| *name == constraint)
                    .map(|(_, field)| *field)
            })
            .unwrap_or("non_field_errors");

        Self::validation(field, message)
    }
}

impl warp::reject::Reject for ActionError {}
