//! Engine tests over an in-memory SQLite database.
//!
//! Run with `cargo test --features sqlite`.
#![cfg(feature = "sqlite")]

use std::time::Duration;

use sqlx::{Connection, Executor, Sqlite, SqliteConnection};
use switchback::{
    migration::Migration,
    migrator::{ApplyOptions, MigrateHooks, Migrator, NoHooks},
    schema::Column,
    types::SqlType,
    Error,
};

#[derive(Default)]
struct Recorder {
    before: Vec<String>,
    statements: Vec<String>,
    errors: Vec<String>,
}

impl MigrateHooks for Recorder {
    fn before(&mut self, migration: &Migration) {
        self.before.push(migration.revision().to_string());
    }

    fn on_error(&mut self, migration: &Migration, _error: &Error, _elapsed: Duration) {
        self.errors.push(migration.revision().to_string());
    }

    fn sql(&mut self, _migration: &Migration, statement: &str) {
        self.statements.push(statement.to_string());
    }
}

async fn migrator() -> Migrator<Sqlite> {
    let conn = SqliteConnection::connect("sqlite::memory:")
        .await
        .unwrap();
    Migrator::new(conn)
}

fn create_table_migration(revision: &str, table: &'static str) -> Migration {
    Migration::new(revision, table, move |bp| {
        bp.create_table(table, |t| {
            t.add_column(Column::new("id", SqlType::integer()).primary_key());
            t.add_column(Column::new("label", SqlType::Text).null(true));
        });
    })
    .unwrap()
}

fn sample_migrations() -> Vec<Migration> {
    vec![
        create_table_migration("20220101_000000", "alpha"),
        create_table_migration("20220102_000000", "beta"),
        create_table_migration("20220103_000000", "gamma"),
    ]
}

#[tokio::test]
async fn upgrade_applies_pending_in_revision_order() {
    let mut migrator = migrator().await;
    migrator.add_migrations(sample_migrations());

    let mut recorder = Recorder::default();
    let applied = migrator
        .upgrade(&ApplyOptions::default(), &mut recorder)
        .await
        .unwrap();
    assert_eq!(applied, 3);
    assert_eq!(
        recorder.before,
        vec!["20220101_000000", "20220102_000000", "20220103_000000"]
    );

    // All tables exist.
    for table in ["alpha", "beta", "gamma"] {
        migrator
            .connection()
            .execute(format!("INSERT INTO {table} (id) VALUES (1)").as_str())
            .await
            .unwrap();
    }

    // A second run finds nothing pending.
    let applied = migrator
        .upgrade(&ApplyOptions::default(), &mut NoHooks)
        .await
        .unwrap();
    assert_eq!(applied, 0);
}

#[tokio::test]
async fn status_pairs_local_migrations_with_history() {
    let mut migrator = migrator().await;
    migrator.add_migrations(sample_migrations());

    let statuses = migrator.status().await.unwrap();
    assert_eq!(statuses.len(), 3);
    assert!(statuses.iter().all(|s| s.applied.is_none()));

    migrator
        .upgrade(&ApplyOptions::default(), &mut NoHooks)
        .await
        .unwrap();

    let statuses = migrator.status().await.unwrap();
    assert!(statuses.iter().all(|s| s.applied.is_some()));
    assert!(statuses.iter().all(|s| !s.missing_local));
}

#[tokio::test]
async fn fake_records_history_without_executing() {
    let mut migrator = migrator().await;
    migrator.add_migrations(vec![create_table_migration("20220101_000000", "alpha")]);

    let options = ApplyOptions {
        fake: true,
        ..ApplyOptions::default()
    };
    let applied = migrator.upgrade(&options, &mut NoHooks).await.unwrap();
    assert_eq!(applied, 1);

    // Recorded as applied...
    let statuses = migrator.status().await.unwrap();
    assert!(statuses[0].applied.is_some());

    // ...but the table was never created.
    assert!(migrator
        .connection()
        .execute("SELECT * FROM alpha")
        .await
        .is_err());
}

#[tokio::test]
async fn dry_run_executes_and_records_nothing() {
    let mut migrator = migrator().await;
    migrator.add_migrations(sample_migrations());

    let options = ApplyOptions {
        dry_run: true,
        print_sql: true,
        ..ApplyOptions::default()
    };
    let mut recorder = Recorder::default();
    let would_apply = migrator.upgrade(&options, &mut recorder).await.unwrap();
    assert_eq!(would_apply, 3);

    // The compiled SQL was surfaced.
    assert!(recorder
        .statements
        .iter()
        .any(|s| s.starts_with("CREATE TABLE alpha")));

    // Nothing was recorded or executed.
    let statuses = migrator.status().await.unwrap();
    assert!(statuses.iter().all(|s| s.applied.is_none()));
    assert!(migrator
        .connection()
        .execute("SELECT * FROM alpha")
        .await
        .is_err());
}

#[tokio::test]
async fn downgrade_reverts_most_recent_first() {
    let mut migrator = migrator().await;
    migrator.add_migrations(sample_migrations());
    migrator
        .upgrade(&ApplyOptions::default(), &mut NoHooks)
        .await
        .unwrap();

    let mut recorder = Recorder::default();
    let reverted = migrator
        .downgrade(2, &ApplyOptions::default(), &mut recorder)
        .await
        .unwrap();
    assert_eq!(reverted, 2);
    assert_eq!(recorder.before, vec!["20220103_000000", "20220102_000000"]);

    let statuses = migrator.status().await.unwrap();
    assert!(statuses[0].applied.is_some());
    assert!(statuses[1].applied.is_none());
    assert!(statuses[2].applied.is_none());

    // The reverted tables are gone, the oldest survives.
    assert!(migrator.connection().execute("SELECT * FROM alpha").await.is_ok());
    assert!(migrator.connection().execute("SELECT * FROM gamma").await.is_err());
}

#[tokio::test]
async fn failing_migration_rolls_back_and_aborts_the_batch() {
    let mut migrator = migrator().await;

    let broken = Migration::new("20220102_000000", "broken", |bp| {
        bp.run_sql(
            "CREATE TABLE beta (id INTEGER); THIS IS NOT SQL;",
            "DROP TABLE beta;",
        );
    })
    .unwrap();

    migrator.add_migrations(vec![
        create_table_migration("20220101_000000", "alpha"),
        broken,
        create_table_migration("20220103_000000", "gamma"),
    ]);

    let mut recorder = Recorder::default();
    let result = migrator
        .upgrade(&ApplyOptions::default(), &mut recorder)
        .await;

    match result {
        Err(Error::Execution {
            revision,
            statement,
            ..
        }) => {
            assert_eq!(revision, "20220102_000000");
            assert_eq!(statement, "THIS IS NOT SQL");
        }
        other => panic!("expected an execution error, got {other:?}"),
    }
    assert_eq!(recorder.errors, vec!["20220102_000000"]);

    // The first migration stuck, the failed one rolled back fully, the
    // rest never ran.
    let statuses = migrator.status().await.unwrap();
    assert!(statuses[0].applied.is_some());
    assert!(statuses[1].applied.is_none());
    assert!(statuses[2].applied.is_none());
    assert!(migrator.connection().execute("SELECT * FROM beta").await.is_err());
    assert!(migrator.connection().execute("SELECT * FROM gamma").await.is_err());
}

#[tokio::test]
async fn dollar_quoted_body_surfaces_as_one_statement() {
    let mut migrator = migrator().await;

    let body = "\
-- trigger function

CREATE FUNCTION touch() RETURNS trigger AS $$
BEGIN
    NEW.updated_at = now();
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;
----
DROP FUNCTION touch();
";
    let migration =
        Migration::from_sql_source("20220101_000000_touch_fn.sql", body).unwrap();
    migrator.add_migrations(vec![migration]);

    let options = ApplyOptions {
        dry_run: true,
        print_sql: true,
        ..ApplyOptions::default()
    };
    let mut recorder = Recorder::default();
    migrator.upgrade(&options, &mut recorder).await.unwrap();

    assert_eq!(recorder.statements.len(), 1);
    assert!(recorder.statements[0].starts_with("CREATE FUNCTION"));
    assert!(recorder.statements[0].contains("RETURN NEW;"));
    assert!(recorder.statements[0].ends_with("$$ LANGUAGE plpgsql"));
}

#[tokio::test]
async fn failing_commit_rolls_back_and_reaches_hooks() {
    let mut migrator = migrator().await;
    migrator
        .connection()
        .execute("PRAGMA foreign_keys = ON")
        .await
        .unwrap();

    let schema = Migration::new("20220101_000000", "schema", |bp| {
        bp.run_sql(
            "CREATE TABLE parent (id INTEGER PRIMARY KEY);\n\
             CREATE TABLE child (pid INTEGER REFERENCES parent (id));",
            "DROP TABLE child;\nDROP TABLE parent;",
        );
    })
    .unwrap();
    // The violation is deferred, so every statement succeeds and the
    // failure only shows up at COMMIT.
    let orphan = Migration::new("20220102_000000", "orphan", |bp| {
        bp.run_sql(
            "PRAGMA defer_foreign_keys = ON;\nINSERT INTO child (pid) VALUES (99);",
            "DELETE FROM child WHERE pid = 99;",
        );
    })
    .unwrap();
    migrator.add_migrations(vec![schema, orphan]);

    let mut recorder = Recorder::default();
    let result = migrator
        .upgrade(&ApplyOptions::default(), &mut recorder)
        .await;

    assert!(result.is_err());
    assert_eq!(recorder.errors, vec!["20220102_000000"]);

    // The commit failure rolled the whole migration back, history row
    // included.
    let statuses = migrator.status().await.unwrap();
    assert!(statuses[0].applied.is_some());
    assert!(statuses[1].applied.is_none());
    let rows: Vec<(i64,)> = sqlx::query_as("SELECT count(*) FROM child")
        .fetch_all(migrator.connection())
        .await
        .unwrap();
    assert_eq!(rows, vec![(0,)]);
}

#[tokio::test]
async fn sql_file_migration_round_trips() {
    let mut migrator = migrator().await;

    let body = "\
-- seeded lookup table

CREATE TABLE colors (name TEXT NOT NULL);
INSERT INTO colors (name) VALUES ('red; or so');
----
DROP TABLE colors;
";
    let migration =
        Migration::from_sql_source("20220101_000000_colors.sql", body).unwrap();
    migrator.add_migrations(vec![migration]);

    migrator
        .upgrade(&ApplyOptions::default(), &mut NoHooks)
        .await
        .unwrap();

    let rows: Vec<(String,)> = sqlx::query_as("SELECT name FROM colors")
        .fetch_all(migrator.connection())
        .await
        .unwrap();
    assert_eq!(rows, vec![("red; or so".to_string(),)]);

    let reverted = migrator
        .downgrade(1, &ApplyOptions::default(), &mut NoHooks)
        .await
        .unwrap();
    assert_eq!(reverted, 1);
    assert!(migrator
        .connection()
        .execute("SELECT * FROM colors")
        .await
        .is_err());
}

#[tokio::test]
async fn custom_history_table_is_honored() {
    let mut migrator = migrator().await;
    migrator.set_history_table("schema_log");
    migrator.add_migrations(vec![create_table_migration("20220101_000000", "alpha")]);
    migrator
        .upgrade(&ApplyOptions::default(), &mut NoHooks)
        .await
        .unwrap();

    let rows: Vec<(String,)> = sqlx::query_as("SELECT revision FROM schema_log")
        .fetch_all(migrator.connection())
        .await
        .unwrap();
    assert_eq!(rows, vec![("20220101_000000".to_string(),)]);
}
