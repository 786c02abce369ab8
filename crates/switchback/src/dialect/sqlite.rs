use std::borrow::Cow;

use crate::{error::Error, types::SqlType};

/// The SQLite dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sqlite;

impl super::Dialect for Sqlite {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn placeholder(&self, _n: usize) -> String {
        "?".to_string()
    }

    fn type_sql(&self, ty: &SqlType) -> Result<Cow<'static, str>, Error> {
        Ok(match ty {
            SqlType::SmallInteger => "INTEGER".into(),
            // SQLite has no serial types; an INTEGER primary key aliases
            // the rowid, which is the closest equivalent.
            SqlType::Integer { .. } | SqlType::BigInteger { .. } => "INTEGER".into(),
            SqlType::VarChar { length: None } => "VARCHAR".into(),
            SqlType::VarChar {
                length: Some(length),
            } => format!("VARCHAR({length})").into(),
            SqlType::Text => "TEXT".into(),
            SqlType::Boolean => "BOOLEAN".into(),
            SqlType::Date => "DATE".into(),
            SqlType::Time { .. } => "TIME".into(),
            SqlType::DateTime { .. } => "TIMESTAMP".into(),
            SqlType::Numeric { .. } => "NUMERIC".into(),
            SqlType::Real | SqlType::DoublePrecision => "REAL".into(),
            SqlType::Json => "TEXT".into(),
            SqlType::Uuid => {
                return Err(Error::UnsupportedType {
                    type_name: ty.name(),
                    dialect: self.name(),
                })
            }
        })
    }

    fn change_type_action(
        &self,
        column: &str,
        _type_sql: &str,
        _collate: Option<&str>,
        _using: Option<&str>,
    ) -> Result<String, Error> {
        Err(Error::Operation(
            format!("sqlite cannot change the type of column {column}, recreate the table instead")
                .into(),
        ))
    }
}
