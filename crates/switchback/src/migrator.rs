//! The migration engine: discovery diffing, ordered application and
//! reverts.

use std::{
    borrow::Cow,
    collections::HashSet,
    time::{Duration, Instant},
};

use itertools::{EitherOrBoth, Itertools};
use sqlx::{Connection, Database};

use crate::{
    db::Migrations,
    error::Error,
    migration::{applied_timestamp, split_statements, AppliedMigration, Migration, Revision},
};

/// The default history table used by all migrators.
pub const DEFAULT_HISTORY_TABLE: &str = "_switchback_migrations";

/// Direction of one migration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// Per-run behavior flags. The three flags are orthogonal.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyOptions {
    /// Compile (and optionally surface) SQL, but neither execute nor
    /// record anything.
    pub dry_run: bool,
    /// Record the history row without executing any statement, to mark a
    /// migration as applied on a pre-existing database.
    pub fake: bool,
    /// Surface every compiled statement through
    /// [`MigrateHooks::sql`].
    pub print_sql: bool,
}

/// Lifecycle callbacks invoked synchronously around each migration.
///
/// Return values never influence engine behavior.
pub trait MigrateHooks {
    fn before(&mut self, _migration: &Migration) {}

    fn after(&mut self, _migration: &Migration, _elapsed: Duration) {}

    fn on_error(&mut self, _migration: &Migration, _error: &Error, _elapsed: Duration) {}

    /// The channel compiled SQL is surfaced through when
    /// [`ApplyOptions::print_sql`] is set.
    fn sql(&mut self, _migration: &Migration, _statement: &str) {}
}

/// Hooks that do nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl MigrateHooks for NoHooks {}

/// Status of one migration: local identity and its history row, if any.
#[derive(Debug, Clone)]
pub struct MigrationStatus {
    pub revision: Revision,
    pub name: String,
    /// The history row, when the migration has been applied.
    pub applied: Option<AppliedMigration>,
    /// Present in the database but not registered locally.
    pub missing_local: bool,
}

/// A migrator that manages the schema migrations of one database.
///
/// Migrations are registered explicitly and processed strictly one at a
/// time in revision order. The history table is the single source of truth
/// for what has run; it is never reconciled against actual schema state.
///
/// There is no cross-process locking: running two migrators against the
/// same history table concurrently can race on the pending set.
#[must_use]
pub struct Migrator<Db>
where
    Db: Database,
    Db::Connection: Migrations,
{
    conn: Db::Connection,
    table: Cow<'static, str>,
    migrations: Vec<Migration>,
}

impl<Db> Migrator<Db>
where
    Db: Database,
    Db::Connection: Migrations,
{
    /// Create a migrator over an existing connection.
    pub fn new(conn: Db::Connection) -> Self {
        Self {
            conn,
            table: Cow::Borrowed(DEFAULT_HISTORY_TABLE),
            migrations: Vec::new(),
        }
    }

    /// Connect to the database given in the URL.
    ///
    /// # Errors
    ///
    /// An error is returned on connection failure.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let conn = Db::Connection::connect(url).await?;
        Ok(Self::new(conn))
    }

    /// Connect with the given connection options.
    ///
    /// # Errors
    ///
    /// An error is returned on connection failure.
    pub async fn connect_with(
        options: &<Db::Connection as Connection>::Options,
    ) -> Result<Self, sqlx::Error> {
        let conn = Db::Connection::connect_with(options).await?;
        Ok(Self::new(conn))
    }

    /// Set the history table name, overriding [`DEFAULT_HISTORY_TABLE`].
    ///
    /// The name is used as-is in queries, **DO NOT USE UNTRUSTED
    /// STRINGS**.
    pub fn set_history_table(&mut self, name: impl AsRef<str>) {
        self.table = Cow::Owned(name.as_ref().to_string());
    }

    /// Register migrations. The full set is kept sorted by revision, so
    /// registration order does not matter.
    pub fn add_migrations(&mut self, migrations: impl IntoIterator<Item = Migration>) {
        self.migrations.extend(migrations);
        self.migrations
            .sort_by(|a, b| a.revision().cmp(b.revision()));
    }

    /// All registered migrations, in revision order.
    pub fn local_migrations(&self) -> &[Migration] {
        &self.migrations
    }

    /// The underlying connection.
    pub fn connection(&mut self) -> &mut Db::Connection {
        &mut self.conn
    }

    /// Consume the migrator, returning the connection.
    #[must_use]
    pub fn into_connection(self) -> Db::Connection {
        self.conn
    }

    /// Apply every pending migration in ascending revision order.
    ///
    /// Returns the number of migrations applied. The first failure rolls
    /// back that migration's transaction and aborts the remaining batch.
    ///
    /// # Errors
    ///
    /// Compile-time errors ([`Error::UnsupportedType`],
    /// [`Error::Operation`]) surface before any statement reaches the
    /// database; execution failures are wrapped in [`Error::Execution`].
    pub async fn upgrade(
        &mut self,
        options: &ApplyOptions,
        hooks: &mut dyn MigrateHooks,
    ) -> Result<usize, Error> {
        self.conn.ensure_history_table(&self.table).await?;

        let applied: HashSet<Revision> = self
            .conn
            .list_applied(&self.table, None)
            .await?
            .into_iter()
            .map(|m| m.revision)
            .collect();

        let pending: Vec<Migration> = self
            .migrations
            .iter()
            .filter(|m| !applied.contains(m.revision()))
            .cloned()
            .collect();

        for migration in &pending {
            self.apply_migration(migration, Direction::Up, options, hooks)
                .await?;
        }

        Ok(pending.len())
    }

    /// Revert the `steps` most recently applied migrations, most recent
    /// first.
    ///
    /// Applied revisions with no registered counterpart are skipped with a
    /// warning. Returns the number of migrations reverted.
    ///
    /// # Errors
    ///
    /// Same error behavior as [`Migrator::upgrade`].
    pub async fn downgrade(
        &mut self,
        steps: usize,
        options: &ApplyOptions,
        hooks: &mut dyn MigrateHooks,
    ) -> Result<usize, Error> {
        self.conn.ensure_history_table(&self.table).await?;

        let recent = self.conn.list_applied(&self.table, Some(steps)).await?;

        let mut reverted = 0;
        for applied in recent {
            let migration = self
                .migrations
                .iter()
                .find(|m| m.revision() == &applied.revision)
                .cloned();

            match migration {
                Some(migration) => {
                    self.apply_migration(&migration, Direction::Down, options, hooks)
                        .await?;
                    reverted += 1;
                }
                None => {
                    tracing::warn!(
                        revision = %applied.revision,
                        name = %applied.name,
                        "applied migration not registered locally, skipping"
                    );
                }
            }
        }

        Ok(reverted)
    }

    /// Apply or revert a single migration.
    ///
    /// The migration's SQL is compiled up front, then executed inside a
    /// transaction scope (a no-op scope when the migration is not
    /// transactional), the history row is inserted or deleted, and the
    /// hooks are driven around the whole unit. On any error the
    /// transaction is rolled back and the error re-raised.
    ///
    /// # Errors
    ///
    /// See [`Migrator::upgrade`].
    pub async fn apply_migration(
        &mut self,
        migration: &Migration,
        direction: Direction,
        options: &ApplyOptions,
        hooks: &mut dyn MigrateHooks,
    ) -> Result<(), Error> {
        let start = Instant::now();

        // Compile both the statements and any structural errors before
        // anything reaches the database.
        let statements = self.compile(migration, direction)?;

        let verb = match direction {
            Direction::Up => "applying",
            Direction::Down => "reverting",
        };
        tracing::info!(
            revision = %migration.revision(),
            name = %migration.name(),
            transactional = migration.is_transactional(),
            "{} migration",
            verb
        );

        // A dry run never touches the database, so no transaction scope
        // is opened for it.
        let transactional = migration.is_transactional() && !options.dry_run;
        if transactional {
            self.conn.run("BEGIN").await?;
        }

        hooks.before(migration);

        let result = Self::execute(
            &mut self.conn,
            &self.table,
            migration,
            direction,
            &statements,
            options,
            hooks,
        )
        .await;

        // A failing COMMIT is a failure of the migration like any other
        // and reaches the hooks the same way.
        let result = match result {
            Ok(()) if transactional => self.conn.run("COMMIT").await.map_err(Error::from),
            other => other,
        };

        let elapsed = start.elapsed();

        match result {
            Ok(()) => {
                hooks.after(migration, elapsed);
                tracing::info!(
                    revision = %migration.revision(),
                    name = %migration.name(),
                    execution_time = %humantime::Duration::from(elapsed),
                    "migration {}",
                    match direction {
                        Direction::Up => "applied",
                        Direction::Down => "reverted",
                    }
                );
                Ok(())
            }
            Err(error) => {
                if transactional {
                    if let Err(rollback_error) = self.conn.run("ROLLBACK").await {
                        tracing::warn!(
                            revision = %migration.revision(),
                            error = %rollback_error,
                            "rollback failed"
                        );
                    }
                }
                hooks.on_error(migration, &error, elapsed);
                Err(error)
            }
        }
    }

    /// List every registered migration together with its history row, plus
    /// history rows that have no registered counterpart.
    ///
    /// # Errors
    ///
    /// Errors are returned on connection and database errors.
    pub async fn status(&mut self) -> Result<Vec<MigrationStatus>, Error> {
        self.conn.ensure_history_table(&self.table).await?;

        let mut applied = self.conn.list_applied(&self.table, None).await?;
        applied.sort_by(|a, b| a.revision.cmp(&b.revision));

        let statuses = self
            .migrations
            .iter()
            .merge_join_by(applied, |local, db| local.revision().cmp(&db.revision))
            .map(|pair| match pair {
                EitherOrBoth::Both(local, db) => MigrationStatus {
                    revision: local.revision().clone(),
                    name: local.name().to_string(),
                    applied: Some(db),
                    missing_local: false,
                },
                EitherOrBoth::Left(local) => MigrationStatus {
                    revision: local.revision().clone(),
                    name: local.name().to_string(),
                    applied: None,
                    missing_local: false,
                },
                EitherOrBoth::Right(db) => MigrationStatus {
                    revision: db.revision.clone(),
                    name: db.name.clone(),
                    applied: Some(db),
                    missing_local: true,
                },
            })
            .collect();

        Ok(statuses)
    }

    fn compile(&self, migration: &Migration, direction: Direction) -> Result<Vec<String>, Error> {
        let dialect = self.conn.dialect();
        let ops = migration.operations();

        let rendered: Vec<String> = match direction {
            Direction::Up => ops
                .iter()
                .map(|op| op.render_up(dialect))
                .collect::<Result<_, _>>()?,
            // Reverting undoes the operations in reverse declaration
            // order.
            Direction::Down => ops
                .iter()
                .rev()
                .map(|op| op.render_down(dialect))
                .collect::<Result<_, _>>()?,
        };

        Ok(rendered
            .iter()
            .flat_map(|sql| split_statements(sql))
            .collect())
    }

    async fn execute(
        conn: &mut Db::Connection,
        table: &str,
        migration: &Migration,
        direction: Direction,
        statements: &[String],
        options: &ApplyOptions,
        hooks: &mut dyn MigrateHooks,
    ) -> Result<(), Error> {
        for statement in statements {
            if options.print_sql {
                hooks.sql(migration, statement);
            }
            if options.dry_run || options.fake || is_noop(statement) {
                continue;
            }
            conn.run(statement)
                .await
                .map_err(|source| Error::Execution {
                    revision: migration.revision().to_string(),
                    name: migration.name_cow(),
                    statement: statement.clone(),
                    source,
                })?;
        }

        if !options.dry_run {
            match direction {
                Direction::Up => {
                    conn.add_applied(
                        table,
                        &AppliedMigration {
                            revision: migration.revision().clone(),
                            name: migration.name().to_string(),
                            applied: applied_timestamp(),
                        },
                    )
                    .await?;
                }
                Direction::Down => {
                    conn.remove_applied(table, migration.revision()).await?;
                }
            }
        }

        Ok(())
    }
}

/// A statement consisting solely of comments, e.g. the marker rendered for
/// an inverse with nothing to do.
fn is_noop(statement: &str) -> bool {
    statement.lines().all(|line| {
        let line = line.trim();
        line.is_empty() || line.starts_with("--")
    })
}
