//! The reversible unit of schema change.
//!
//! Every [`Operation`] captures, at construction time, whatever prior state
//! its inverse needs; rendering never introspects a live schema. Both
//! directions are pure string composition over the dialect's templates.

use crate::{
    dialect::Dialect,
    error::Error,
    schema::{
        quote_literal, Column, Constraint, DropMode, Index, PrimaryKeyConstraint, Table,
    },
    types::SqlType,
};

/// One reversible, atomic schema-change unit.
///
/// Compilation is an exhaustive match: adding a variant without handling it
/// in [`Operation::render_up`] and [`Operation::render_down`] is a build
/// error.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    CreateTable {
        table: Table,
        if_not_exists: bool,
    },
    DropTable {
        /// The full prior definition, captured to recreate the table.
        table: Table,
        mode: Option<DropMode>,
    },
    AddColumn {
        table_name: String,
        column: Column,
        only: bool,
        if_table_exists: bool,
        if_column_not_exists: bool,
    },
    DropColumn {
        table_name: String,
        /// The full prior definition, captured to recreate the column.
        column: Column,
        only: bool,
        if_table_exists: bool,
        if_column_exists: bool,
        mode: Option<DropMode>,
    },
    SetDefault {
        table_name: String,
        column_name: String,
        new_default: String,
        /// `None` means the column had no default before this operation.
        current_default: Option<String>,
        only: bool,
        if_table_exists: bool,
    },
    DropDefault {
        table_name: String,
        column_name: String,
        /// `None` means the column had no default before this operation.
        current_default: Option<String>,
        only: bool,
        if_table_exists: bool,
    },
    SetNotNull {
        table_name: String,
        column_name: String,
        only: bool,
        if_table_exists: bool,
    },
    DropNotNull {
        table_name: String,
        column_name: String,
        only: bool,
        if_table_exists: bool,
    },
    ChangeType {
        table_name: String,
        column_name: String,
        new_type: SqlType,
        current_type: SqlType,
        collation: Option<String>,
        using: Option<String>,
        current_collation: Option<String>,
        current_using: Option<String>,
        only: bool,
        if_table_exists: bool,
    },
    CreateIndex {
        index: Index,
        concurrently: bool,
        if_not_exists: bool,
        only: bool,
    },
    DropIndex {
        /// The full prior definition, captured to recreate the index.
        index: Index,
        mode: Option<DropMode>,
    },
    AddTableConstraint {
        table_name: String,
        constraint: Constraint,
        only: bool,
        if_table_exists: bool,
    },
    DropTableConstraint {
        table_name: String,
        constraint_name: String,
        /// The full prior definition, captured to restore the constraint.
        constraint: Option<Constraint>,
        only: bool,
        if_exists: bool,
        if_table_exists: bool,
        mode: Option<DropMode>,
    },
    RunSql {
        up_sql: String,
        down_sql: String,
    },
}

/// The marker emitted where an inverse has nothing to do, e.g. reverting a
/// `DROP DEFAULT` on a column that never had one.
pub const NOOP_MARKER: &str = "-- noop, column had no default previously";

impl Operation {
    /// Render the forward SQL for this operation.
    ///
    /// # Errors
    ///
    /// [`Error::UnsupportedType`] or [`Error::Operation`] for structurally
    /// invalid state; no I/O happens here.
    pub fn render_up(&self, dialect: &dyn Dialect) -> Result<String, Error> {
        match self {
            Operation::CreateTable {
                table,
                if_not_exists,
            } => render_create_table(table, *if_not_exists, dialect),
            Operation::DropTable { table, mode } => Ok(dialect.drop_table_stmt(&table.name, *mode)),
            Operation::AddColumn {
                table_name,
                column,
                only,
                if_table_exists,
                if_column_not_exists,
            } => {
                let mut action = String::from("ADD");
                if *if_column_not_exists {
                    action.push_str(" IF NOT EXISTS");
                }
                action.push(' ');
                action.push_str(&column_clause(column, dialect, column.primary_key)?);
                Ok(dialect.alter_table_stmt(table_name, *if_table_exists, *only, &action))
            }
            Operation::DropColumn {
                table_name,
                column,
                only,
                if_table_exists,
                if_column_exists,
                mode,
            } => {
                let mut action = String::from("DROP");
                if *if_column_exists {
                    action.push_str(" IF EXISTS");
                }
                action.push(' ');
                action.push_str(&column.name);
                if let Some(mode) = mode {
                    action.push(' ');
                    action.push_str(mode.as_sql());
                }
                Ok(dialect.alter_table_stmt(table_name, *if_table_exists, *only, &action))
            }
            Operation::SetDefault {
                table_name,
                column_name,
                new_default,
                only,
                if_table_exists,
                ..
            } => {
                let action = format!(
                    "ALTER {column_name} SET DEFAULT {}",
                    quote_literal(new_default)
                );
                Ok(dialect.alter_table_stmt(table_name, *if_table_exists, *only, &action))
            }
            Operation::DropDefault {
                table_name,
                column_name,
                only,
                if_table_exists,
                ..
            } => {
                let action = format!("ALTER {column_name} DROP DEFAULT");
                Ok(dialect.alter_table_stmt(table_name, *if_table_exists, *only, &action))
            }
            Operation::SetNotNull {
                table_name,
                column_name,
                only,
                if_table_exists,
            } => {
                let action = format!("ALTER {column_name} SET NOT NULL");
                Ok(dialect.alter_table_stmt(table_name, *if_table_exists, *only, &action))
            }
            Operation::DropNotNull {
                table_name,
                column_name,
                only,
                if_table_exists,
            } => {
                let action = format!("ALTER {column_name} DROP NOT NULL");
                Ok(dialect.alter_table_stmt(table_name, *if_table_exists, *only, &action))
            }
            Operation::ChangeType {
                table_name,
                column_name,
                new_type,
                collation,
                using,
                only,
                if_table_exists,
                ..
            } => {
                let type_sql = dialect.type_sql(new_type)?;
                let action = dialect.change_type_action(
                    column_name,
                    &type_sql,
                    collation.as_deref(),
                    using.as_deref(),
                )?;
                Ok(dialect.alter_table_stmt(table_name, *if_table_exists, *only, &action))
            }
            Operation::CreateIndex {
                index,
                concurrently,
                if_not_exists,
                only,
            } => Ok(dialect.create_index_stmt(index, *concurrently, *if_not_exists, *only)),
            Operation::DropIndex { index, mode } => Ok(dialect.drop_index_stmt(&index.name, *mode)),
            Operation::AddTableConstraint {
                table_name,
                constraint,
                only,
                if_table_exists,
            } => {
                let action = format!("ADD {}", constraint.compile());
                Ok(dialect.alter_table_stmt(table_name, *if_table_exists, *only, &action))
            }
            Operation::DropTableConstraint {
                table_name,
                constraint_name,
                only,
                if_exists,
                if_table_exists,
                mode,
                ..
            } => {
                let mut action = String::from("DROP CONSTRAINT");
                if *if_exists {
                    action.push_str(" IF EXISTS");
                }
                action.push(' ');
                action.push_str(constraint_name);
                if let Some(mode) = mode {
                    action.push(' ');
                    action.push_str(mode.as_sql());
                }
                Ok(dialect.alter_table_stmt(table_name, *if_table_exists, *only, &action))
            }
            Operation::RunSql { up_sql, .. } => Ok(up_sql.clone()),
        }
    }

    /// Render the inverse SQL for this operation, from state captured at
    /// construction time.
    ///
    /// # Errors
    ///
    /// [`Error::Operation`] when the operation cannot be inverted, e.g. a
    /// constraint drop without a captured constraint or name.
    pub fn render_down(&self, dialect: &dyn Dialect) -> Result<String, Error> {
        match self {
            Operation::CreateTable { table, .. } => {
                Operation::DropTable {
                    table: table.clone(),
                    mode: None,
                }
                .render_up(dialect)
            }
            Operation::DropTable { table, .. } => {
                let mut sql = Operation::CreateTable {
                    table: table.clone(),
                    if_not_exists: false,
                }
                .render_up(dialect)?;
                // Dropping the table dropped its indices with it; the
                // captured definitions restore them.
                for index in &table.indices {
                    sql.push_str(";\n");
                    sql.push_str(&dialect.create_index_stmt(index, false, false, false));
                }
                Ok(sql)
            }
            Operation::AddColumn {
                table_name,
                column,
                only,
                ..
            } => Operation::DropColumn {
                table_name: table_name.clone(),
                column: column.clone(),
                only: *only,
                if_table_exists: true,
                if_column_exists: true,
                mode: None,
            }
            .render_up(dialect),
            Operation::DropColumn {
                table_name,
                column,
                only,
                ..
            } => Operation::AddColumn {
                table_name: table_name.clone(),
                column: column.clone(),
                only: *only,
                if_table_exists: false,
                if_column_not_exists: false,
            }
            .render_up(dialect),
            Operation::SetDefault {
                table_name,
                column_name,
                new_default,
                current_default,
                only,
                if_table_exists,
            } => match current_default {
                // Reverting the first default means removing it, not
                // setting it to NULL.
                None => Operation::DropDefault {
                    table_name: table_name.clone(),
                    column_name: column_name.clone(),
                    current_default: None,
                    only: *only,
                    if_table_exists: *if_table_exists,
                }
                .render_up(dialect),
                Some(current) => Operation::SetDefault {
                    table_name: table_name.clone(),
                    column_name: column_name.clone(),
                    new_default: current.clone(),
                    current_default: Some(new_default.clone()),
                    only: *only,
                    if_table_exists: *if_table_exists,
                }
                .render_up(dialect),
            },
            Operation::DropDefault {
                table_name,
                column_name,
                current_default,
                only,
                if_table_exists,
            } => match current_default {
                None => Ok(NOOP_MARKER.to_string()),
                Some(current) => Operation::SetDefault {
                    table_name: table_name.clone(),
                    column_name: column_name.clone(),
                    new_default: current.clone(),
                    current_default: None,
                    only: *only,
                    if_table_exists: *if_table_exists,
                }
                .render_up(dialect),
            },
            Operation::SetNotNull {
                table_name,
                column_name,
                only,
                if_table_exists,
            } => Operation::DropNotNull {
                table_name: table_name.clone(),
                column_name: column_name.clone(),
                only: *only,
                if_table_exists: *if_table_exists,
            }
            .render_up(dialect),
            Operation::DropNotNull {
                table_name,
                column_name,
                only,
                if_table_exists,
            } => Operation::SetNotNull {
                table_name: table_name.clone(),
                column_name: column_name.clone(),
                only: *only,
                if_table_exists: *if_table_exists,
            }
            .render_up(dialect),
            Operation::ChangeType {
                table_name,
                column_name,
                current_type,
                current_collation,
                current_using,
                only,
                if_table_exists,
                ..
            } => {
                let type_sql = dialect.type_sql(current_type)?;
                let action = dialect.change_type_action(
                    column_name,
                    &type_sql,
                    current_collation.as_deref(),
                    current_using.as_deref(),
                )?;
                Ok(dialect.alter_table_stmt(table_name, *if_table_exists, *only, &action))
            }
            Operation::CreateIndex { index, .. } => Ok(dialect.drop_index_stmt(&index.name, None)),
            Operation::DropIndex { index, .. } => {
                Ok(dialect.create_index_stmt(index, false, false, false))
            }
            Operation::AddTableConstraint {
                table_name,
                constraint,
                only,
                if_table_exists,
            } => {
                let name = constraint.name().ok_or_else(|| {
                    Error::Operation(
                        format!(
                            "cannot invert adding an unnamed constraint on table {table_name}"
                        )
                        .into(),
                    )
                })?;
                Operation::DropTableConstraint {
                    table_name: table_name.clone(),
                    constraint_name: name.to_string(),
                    constraint: Some(constraint.clone()),
                    only: *only,
                    if_exists: false,
                    if_table_exists: *if_table_exists,
                    mode: None,
                }
                .render_up(dialect)
            }
            Operation::DropTableConstraint {
                table_name,
                constraint_name,
                constraint,
                only,
                if_table_exists,
                ..
            } => {
                let constraint = constraint.as_ref().ok_or_else(|| {
                    Error::Operation(
                        format!(
                            "cannot invert dropping constraint {constraint_name} on table \
                             {table_name} without its prior definition"
                        )
                        .into(),
                    )
                })?;
                Operation::AddTableConstraint {
                    table_name: table_name.clone(),
                    constraint: constraint.clone(),
                    only: *only,
                    if_table_exists: *if_table_exists,
                }
                .render_up(dialect)
            }
            Operation::RunSql { down_sql, .. } => Ok(down_sql.clone()),
        }
    }
}

/// Render one column clause, shared by `CREATE TABLE` bodies and
/// `ADD COLUMN` actions. `inline_pk` is false when the table collapses
/// multiple flagged columns into a composite key.
fn column_clause(
    column: &Column,
    dialect: &dyn Dialect,
    inline_pk: bool,
) -> Result<String, Error> {
    let mut sql = format!("{} {}", column.name, dialect.type_sql(&column.ty)?);
    if inline_pk && column.primary_key {
        sql.push_str(" PRIMARY KEY");
    }
    if let Some(default) = &column.default {
        sql.push_str(&format!(" DEFAULT {}", quote_literal(default)));
    }
    if let Some(collate) = &column.collate {
        sql.push_str(&format!(" COLLATE \"{collate}\""));
    }
    if let Some(check) = &column.check_constraint {
        sql.push(' ');
        sql.push_str(&Constraint::Check(check.clone()).compile());
    }
    if let Some(unique) = &column.unique_constraint {
        sql.push(' ');
        sql.push_str(&Constraint::Unique(unique.clone()).compile());
    }
    if let Some(foreign_key) = &column.foreign_key {
        sql.push(' ');
        sql.push_str(&foreign_key.compile());
    }
    if let Some(generated) = &column.generated {
        sql.push_str(&format!(" GENERATED ALWAYS AS ({})", generated.expr));
        if generated.stored {
            sql.push_str(" STORED");
        }
    }
    if !column.null {
        sql.push_str(" NOT NULL");
    }
    Ok(sql)
}

fn render_create_table(
    table: &Table,
    if_not_exists: bool,
    dialect: &dyn Dialect,
) -> Result<String, Error> {
    let pk_columns: Vec<&Column> = table.columns.iter().filter(|col| col.primary_key).collect();
    // More than one flagged column collapses into a composite key clause;
    // multiple inline PRIMARY KEY tokens would be illegal SQL.
    let inline_pk = pk_columns.len() == 1;

    let mut lines = Vec::with_capacity(table.columns.len() + table.constraints.len() + 1);
    for column in &table.columns {
        lines.push(format!("    {}", column_clause(column, dialect, inline_pk)?));
    }
    for constraint in &table.constraints {
        lines.push(format!("    {}", constraint.compile()));
    }
    if pk_columns.len() > 1 {
        let composite = Constraint::PrimaryKey(PrimaryKeyConstraint {
            name: None,
            columns: pk_columns.iter().map(|col| col.name.clone()).collect(),
            include: None,
        });
        lines.push(format!("    {}", composite.compile()));
    }

    Ok(dialect.create_table_stmt(&table.name, &lines.join(",\n"), if_not_exists))
}
