use std::borrow::Cow;

use thiserror::Error;

/// An aggregated error type for the migration engine.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Database(sqlx::Error),
    #[error("type {type_name} has no mapping for dialect {dialect}")]
    UnsupportedType {
        type_name: String,
        dialect: &'static str,
    },
    #[error("invalid operation: {0}")]
    Operation(Cow<'static, str>),
    #[error("invalid migration format for `{file_name}`: {reason}")]
    InvalidMigrationFormat {
        file_name: String,
        reason: Cow<'static, str>,
    },
    #[error("no dialect registered for scheme `{scheme}`")]
    UnknownDialect { scheme: String },
    #[error("error executing statement of migration {revision} ({name}): {source}\n{statement}")]
    Execution {
        revision: String,
        name: Cow<'static, str>,
        statement: String,
        source: sqlx::Error,
    },
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Self::Database(err)
    }
}
