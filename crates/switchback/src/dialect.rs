//! Dialect contract: statement templates and type resolution per backend.
//!
//! A new database backend implements [`Dialect`] (and, for execution, the
//! history-store trait in [`crate::db`]); engine internals are never
//! touched.

mod postgres;
mod sqlite;

pub use postgres::Postgres;
pub use sqlite::Sqlite;

use std::borrow::Cow;

use crate::{
    error::Error,
    schema::{DropMode, Index},
    types::SqlType,
};

/// SQL templates and type mappings for one database engine.
///
/// The default method bodies emit ANSI-flavored SQL; dialects override the
/// statements where their grammar differs. [`Dialect::type_sql`] has no
/// default: every dialect must decide its own type mapping and reject types
/// it cannot express.
pub trait Dialect: Send + Sync {
    fn name(&self) -> &'static str;

    /// The statement-placeholder convention, e.g. `$1` or `?`.
    fn placeholder(&self, n: usize) -> String;

    /// Resolve a logical type to a dialect SQL token.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedType`] when the dialect has no mapping.
    fn type_sql(&self, ty: &SqlType) -> Result<Cow<'static, str>, Error>;

    /// DDL for the migration history table.
    fn history_table_ddl(&self, table: &str) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS {table} (\
             revision TEXT PRIMARY KEY NOT NULL, \
             name TEXT NOT NULL, \
             applied TEXT NOT NULL)"
        )
    }

    fn create_table_stmt(&self, name: &str, body: &str, if_not_exists: bool) -> String {
        let if_not_exists = if if_not_exists { " IF NOT EXISTS" } else { "" };
        format!("CREATE TABLE{if_not_exists} {name} (\n{body}\n)")
    }

    fn drop_table_stmt(&self, name: &str, mode: Option<DropMode>) -> String {
        match mode {
            Some(mode) => format!("DROP TABLE {name} {}", mode.as_sql()),
            None => format!("DROP TABLE {name}"),
        }
    }

    /// The shared `ALTER TABLE` prefix; `action` is the statement tail.
    fn alter_table_stmt(&self, table: &str, if_table_exists: bool, only: bool, action: &str) -> String {
        let if_table_exists = if if_table_exists { " IF EXISTS" } else { "" };
        let only = if only { " ONLY" } else { "" };
        format!("ALTER TABLE{if_table_exists}{only} {table} {action}")
    }

    fn create_index_stmt(
        &self,
        index: &Index,
        concurrently: bool,
        if_not_exists: bool,
        only: bool,
    ) -> String {
        let mut sql = String::from("CREATE");
        if index.unique {
            sql.push_str(" UNIQUE");
        }
        sql.push_str(" INDEX");
        if concurrently {
            sql.push_str(" CONCURRENTLY");
        }
        if if_not_exists {
            sql.push_str(" IF NOT EXISTS");
        }
        sql.push_str(&format!(" {} ON", index.name));
        if only {
            sql.push_str(" ONLY");
        }
        sql.push_str(&format!(" {}", index.table_name));
        if let Some(using) = &index.using {
            sql.push_str(&format!(" USING {using}"));
        }
        let columns: Vec<String> = index.columns.iter().map(crate::schema::IndexExpr::compile).collect();
        sql.push_str(&format!(" ({})", columns.join(", ")));
        if let Some(include) = &index.include {
            sql.push_str(&format!(" INCLUDE ({})", include.join(", ")));
        }
        if let Some(with) = &index.with {
            sql.push_str(&format!(" WITH ({with})"));
        }
        if let Some(tablespace) = &index.tablespace {
            sql.push_str(&format!(" TABLESPACE {tablespace}"));
        }
        if let Some(where_clause) = &index.where_clause {
            sql.push_str(&format!(" WHERE {where_clause}"));
        }
        sql
    }

    fn drop_index_stmt(&self, name: &str, mode: Option<DropMode>) -> String {
        match mode {
            Some(mode) => format!("DROP INDEX {name} {}", mode.as_sql()),
            None => format!("DROP INDEX {name}"),
        }
    }

    /// `ALTER ... TYPE` action tail for a column type change.
    ///
    /// # Errors
    ///
    /// [`Error::Operation`] on dialects that cannot alter column types.
    fn change_type_action(
        &self,
        column: &str,
        type_sql: &str,
        collate: Option<&str>,
        using: Option<&str>,
    ) -> Result<String, Error> {
        let mut action = format!("ALTER {column} TYPE {type_sql}");
        if let Some(collate) = collate {
            action.push_str(&format!(" COLLATE {collate}"));
        }
        if let Some(using) = using {
            action.push_str(&format!(" USING {using}"));
        }
        Ok(action)
    }
}

/// Look up the dialect registered for a connection-URL scheme.
///
/// # Errors
///
/// [`Error::UnknownDialect`] when no dialect handles the scheme.
pub fn from_scheme(scheme: &str) -> Result<&'static dyn Dialect, Error> {
    match scheme {
        "postgres" | "postgresql" => Ok(&Postgres),
        "sqlite" => Ok(&Sqlite),
        _ => Err(Error::UnknownDialect {
            scheme: scheme.to_string(),
        }),
    }
}
