use std::borrow::Cow;

use crate::{error::Error, types::SqlType};

/// The PostgreSQL dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct Postgres;

impl super::Dialect for Postgres {
    fn name(&self) -> &'static str {
        "postgresql"
    }

    fn placeholder(&self, n: usize) -> String {
        format!("${n}")
    }

    fn type_sql(&self, ty: &SqlType) -> Result<Cow<'static, str>, Error> {
        Ok(match ty {
            SqlType::SmallInteger => "SMALLINT".into(),
            SqlType::Integer {
                auto_increment: false,
            } => "INTEGER".into(),
            SqlType::Integer {
                auto_increment: true,
            } => "SERIAL".into(),
            SqlType::BigInteger {
                auto_increment: false,
            } => "BIGINT".into(),
            SqlType::BigInteger {
                auto_increment: true,
            } => "BIGSERIAL".into(),
            SqlType::VarChar { length: None } => "VARCHAR".into(),
            SqlType::VarChar {
                length: Some(length),
            } => format!("VARCHAR({length})").into(),
            SqlType::Text => "TEXT".into(),
            SqlType::Boolean => "BOOLEAN".into(),
            SqlType::Date => "DATE".into(),
            SqlType::Time { tz: false } => "TIME".into(),
            SqlType::Time { tz: true } => "TIME WITH TIME ZONE".into(),
            SqlType::DateTime { tz: false } => "TIMESTAMP".into(),
            SqlType::DateTime { tz: true } => "TIMESTAMPTZ".into(),
            SqlType::Numeric {
                precision: None, ..
            } => "NUMERIC".into(),
            SqlType::Numeric {
                precision: Some(precision),
                scale: None,
            } => format!("NUMERIC({precision})").into(),
            SqlType::Numeric {
                precision: Some(precision),
                scale: Some(scale),
            } => format!("NUMERIC({precision}, {scale})").into(),
            SqlType::Real => "REAL".into(),
            SqlType::DoublePrecision => "DOUBLE PRECISION".into(),
            SqlType::Uuid => "UUID".into(),
            SqlType::Json => "JSONB".into(),
        })
    }
}
