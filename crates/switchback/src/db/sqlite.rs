use async_trait::async_trait;
use sqlx::{query, query_as, Executor};

use super::{AppliedMigration, Migrations};
use crate::dialect::{Dialect, Sqlite};

#[async_trait(?Send)]
impl Migrations for sqlx::SqliteConnection {
    fn dialect(&self) -> &'static dyn Dialect {
        &Sqlite
    }

    async fn run(&mut self, sql: &str) -> Result<(), sqlx::Error> {
        self.execute(sql).await?;
        Ok(())
    }

    async fn ensure_history_table(&mut self, table: &str) -> Result<(), sqlx::Error> {
        let ddl = self.dialect().history_table_ddl(table);
        self.execute(ddl.as_str()).await?;
        Ok(())
    }

    async fn add_applied(
        &mut self,
        table: &str,
        migration: &AppliedMigration,
    ) -> Result<(), sqlx::Error> {
        query(&format!(
            r#"INSERT INTO {} (revision, name, applied) VALUES (?, ?, ?)"#,
            table
        ))
        .bind(migration.revision.as_str())
        .bind(&migration.name)
        .bind(&migration.applied)
        .execute(self)
        .await?;

        Ok(())
    }

    async fn remove_applied(
        &mut self,
        table: &str,
        revision: &super::Revision,
    ) -> Result<(), sqlx::Error> {
        query(&format!(r#"DELETE FROM {} WHERE revision = ?"#, table))
            .bind(revision.as_str())
            .execute(self)
            .await?;

        Ok(())
    }

    async fn list_applied(
        &mut self,
        table: &str,
        limit: Option<usize>,
    ) -> Result<Vec<AppliedMigration>, sqlx::Error> {
        let stmt = match limit {
            Some(limit) => format!(
                r#"SELECT revision, name, applied FROM {} ORDER BY applied DESC, revision DESC LIMIT {}"#,
                table, limit
            ),
            None => format!(
                r#"SELECT revision, name, applied FROM {} ORDER BY applied DESC, revision DESC"#,
                table
            ),
        };

        let rows: Vec<(String, String, String)> = query_as(&stmt).fetch_all(self).await?;

        rows.into_iter()
            .map(|(revision, name, applied)| {
                Ok(AppliedMigration {
                    revision: revision
                        .parse()
                        .map_err(|err| sqlx::Error::Decode(Box::new(err)))?,
                    name,
                    applied,
                })
            })
            .collect()
    }
}
