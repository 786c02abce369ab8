//! Parsing tests for structured SQL migration files.

use switchback::{
    dialect::Postgres,
    migration::Migration,
    ops::Operation,
    Error,
};

const FILE: &str = "migrations/20220812_081500_create_users.sql";

#[test]
fn parses_header_up_and_down_sections() {
    let body = "\
-- create the users table

CREATE TABLE users (
    id BIGSERIAL PRIMARY KEY
);
----
DROP TABLE users;
";
    let migration = Migration::from_sql_source(FILE, body).unwrap();

    assert_eq!(migration.revision().as_str(), "20220812_081500");
    assert_eq!(migration.name(), "create_users");
    assert_eq!(migration.file(), Some(FILE));
    assert!(migration.is_transactional());

    assert_eq!(migration.operations().len(), 1);
    match &migration.operations()[0] {
        Operation::RunSql { up_sql, down_sql } => {
            assert_eq!(up_sql, "CREATE TABLE users (\n    id BIGSERIAL PRIMARY KEY\n);");
            assert_eq!(down_sql, "DROP TABLE users;");
        }
        other => panic!("expected RunSql, got {other:?}"),
    }
}

#[test]
fn transactional_marker_disables_wrapping() {
    let body = "\
-- build the index without locking writes
-- transactional: false

CREATE INDEX CONCURRENTLY users_email_idx ON users (email);
----
DROP INDEX users_email_idx;
";
    let migration = Migration::from_sql_source(FILE, body).unwrap();
    assert!(!migration.is_transactional());
}

#[test]
fn comment_lines_in_sections_are_stripped() {
    let body = "\
-- header

-- first the table
CREATE TABLE a (x INTEGER);
-- then seed it
INSERT INTO a VALUES (1);
----
DROP TABLE a;
";
    let migration = Migration::from_sql_source(FILE, body).unwrap();
    match &migration.operations()[0] {
        Operation::RunSql { up_sql, .. } => {
            assert_eq!(up_sql, "CREATE TABLE a (x INTEGER);\nINSERT INTO a VALUES (1);");
        }
        other => panic!("expected RunSql, got {other:?}"),
    }
}

#[test]
fn rejects_malformed_sources() {
    // No separator between up and down SQL.
    let missing_separator = "-- header\n\nCREATE TABLE a (x INTEGER);\n";
    assert!(matches!(
        Migration::from_sql_source(FILE, missing_separator),
        Err(Error::InvalidMigrationFormat { .. })
    ));

    // Header lines must be comments.
    let bad_header = "CREATE TABLE a (x INTEGER);\n----\nDROP TABLE a;\n";
    assert!(matches!(
        Migration::from_sql_source(FILE, bad_header),
        Err(Error::InvalidMigrationFormat { .. })
    ));

    // Two separators are ambiguous.
    let double_separator = "-- header\n\nSELECT 1;\n----\nSELECT 2;\n----\nSELECT 3;\n";
    assert!(matches!(
        Migration::from_sql_source(FILE, double_separator),
        Err(Error::InvalidMigrationFormat { .. })
    ));

    // Revision must follow the naming convention.
    assert!(matches!(
        Migration::from_sql_source("migrations/initial.sql", "-- h\n\nSELECT 1;\n----\n"),
        Err(Error::InvalidMigrationFormat { .. })
    ));
}

#[test]
fn code_migrations_validate_their_revision() {
    let migration = Migration::new("20220812_081500", "noop", |_| {}).unwrap();
    assert_eq!(migration.revision().as_str(), "20220812_081500");
    assert!(migration.file().is_none());

    assert!(Migration::new("not-a-revision", "noop", |_| {}).is_err());
}

#[test]
fn parsed_sql_renders_verbatim() {
    let body = "\
-- header

SELECT 1;
----
SELECT 2;
";
    let migration = Migration::from_sql_source(FILE, body).unwrap();
    let op = &migration.operations()[0];
    assert_eq!(op.render_up(&Postgres).unwrap(), "SELECT 1;");
    assert_eq!(op.render_down(&Postgres).unwrap(), "SELECT 2;");
}
