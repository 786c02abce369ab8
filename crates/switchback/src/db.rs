//! Database-specific items: the history-store contract per backend.

#[cfg(feature = "postgres")]
mod postgres;

#[cfg(feature = "sqlite")]
mod sqlite;

use async_trait::async_trait;
use sqlx::Connection;

use crate::{
    dialect::Dialect,
    migration::{AppliedMigration, Revision},
};

/// The execute/fetch primitives the engine needs from a backend, plus the
/// bookkeeping over the history table.
///
/// The table name is used as-is in queries, **DO NOT USE UNTRUSTED
/// STRINGS**.
#[async_trait(?Send)]
pub trait Migrations: Connection {
    /// The SQL dialect matching this connection.
    fn dialect(&self) -> &'static dyn Dialect;

    /// Execute one statement verbatim.
    async fn run(&mut self, sql: &str) -> Result<(), sqlx::Error>;

    async fn ensure_history_table(&mut self, table: &str) -> Result<(), sqlx::Error>;

    async fn add_applied(
        &mut self,
        table: &str,
        migration: &AppliedMigration,
    ) -> Result<(), sqlx::Error>;

    async fn remove_applied(&mut self, table: &str, revision: &Revision)
        -> Result<(), sqlx::Error>;

    /// Applied migrations, most recently applied first.
    async fn list_applied(
        &mut self,
        table: &str,
        limit: Option<usize>,
    ) -> Result<Vec<AppliedMigration>, sqlx::Error>;
}
