//! Fluent construction of ordered operation lists.
//!
//! A migration author receives a [`Blueprint`] and describes schema changes
//! through it; each builder call appends one (or a well-defined few)
//! [`Operation`]s to the accumulator. No structural validation happens
//! here, that is deferred to render time in [`crate::ops`].

use crate::{
    ops::Operation,
    schema::{
        CheckConstraint, Column, Constraint, DropMode, ForeignKey, Index, IndexExpr,
        PrimaryKeyConstraint, Table, UniqueConstraint,
    },
    types::SqlType,
};

/// Accumulates the ordered operation list of one migration.
#[derive(Debug, Default)]
pub struct Blueprint {
    ops: Vec<Operation>,
}

impl Blueprint {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Describe a new table. Indices declared on the builder become
    /// separate `CREATE INDEX` operations following the `CREATE TABLE`.
    pub fn create_table(&mut self, table_name: impl Into<String>, build: impl FnOnce(&mut CreateTableBuilder)) {
        let mut builder = CreateTableBuilder {
            table: Table::new(table_name),
            if_not_exists: false,
        };
        build(&mut builder);

        let indices = builder.table.indices.clone();
        self.ops.push(Operation::CreateTable {
            table: builder.table,
            if_not_exists: builder.if_not_exists,
        });
        for index in indices {
            self.ops.push(Operation::CreateIndex {
                index,
                concurrently: false,
                if_not_exists: false,
                only: false,
            });
        }
    }

    /// Describe changes to an existing table.
    pub fn alter_table(&mut self, table_name: impl Into<String>, build: impl FnOnce(&mut AlterTableBuilder)) {
        let mut builder = AlterTableBuilder {
            table_name: table_name.into(),
            if_exists: false,
            only: false,
            ops: Vec::new(),
        };
        build(&mut builder);
        self.ops.extend(builder.ops);
    }

    /// Drop a table. The full prior definition, indices included, is
    /// captured so the drop can be reverted.
    pub fn drop_table(&mut self, current_table: Table, mode: Option<DropMode>) {
        self.ops.push(Operation::DropTable {
            table: current_table,
            mode,
        });
    }

    pub fn create_index(&mut self, index: Index) {
        self.ops.push(Operation::CreateIndex {
            index,
            concurrently: false,
            if_not_exists: false,
            only: false,
        });
    }

    /// Create an index without a wrapping transaction-safe statement, for
    /// dialects that build it concurrently. Pair with a non-transactional
    /// migration.
    pub fn create_index_concurrently(&mut self, index: Index) {
        self.ops.push(Operation::CreateIndex {
            index,
            concurrently: true,
            if_not_exists: false,
            only: false,
        });
    }

    /// Drop an index. The full prior definition is captured for the
    /// inverse.
    pub fn drop_index(&mut self, current_index: Index, mode: Option<DropMode>) {
        self.ops.push(Operation::DropIndex {
            index: current_index,
            mode,
        });
    }

    /// Verbatim forward/backward SQL supplied by the author.
    pub fn run_sql(&mut self, up_sql: impl Into<String>, down_sql: impl Into<String>) {
        self.ops.push(Operation::RunSql {
            up_sql: up_sql.into(),
            down_sql: down_sql.into(),
        });
    }

    pub fn add_op(&mut self, operation: Operation) {
        self.ops.push(operation);
    }

    #[must_use]
    pub fn ops(&self) -> &[Operation] {
        &self.ops
    }

    #[must_use]
    pub fn into_ops(self) -> Vec<Operation> {
        self.ops
    }
}

/// Builder for one `CREATE TABLE` operation.
#[derive(Debug)]
pub struct CreateTableBuilder {
    table: Table,
    if_not_exists: bool,
}

impl CreateTableBuilder {
    pub fn if_not_exists(&mut self) -> &mut Self {
        self.if_not_exists = true;
        self
    }

    pub fn add_column(&mut self, column: Column) -> &mut Self {
        self.table.columns.push(column);
        self
    }

    /// A `BIGSERIAL`-style surrogate primary key.
    pub fn auto_increments(&mut self, name: &str) -> &mut Self {
        self.add_column(Column::new(name, SqlType::auto_increment()).primary_key())
    }

    /// `created_at` (defaulting to `now()`) and nullable `updated_at`
    /// columns.
    pub fn timestamps(&mut self) -> &mut Self {
        self.add_column(
            Column::new("created_at", SqlType::timestamp(true)).default("now()"),
        );
        self.add_column(Column::new("updated_at", SqlType::timestamp(true)).null(true))
    }

    pub fn created_timestamp(&mut self) -> &mut Self {
        self.add_column(Column::new("created_at", SqlType::timestamp(true)).default("now()"))
    }

    /// Declare an index over this table; rendered as a separate
    /// `CREATE INDEX` operation after the table exists.
    pub fn add_index(&mut self, index: Index) -> &mut Self {
        self.table.indices.push(index);
        self
    }

    /// Shorthand for a plain single-expression index with a derived name.
    pub fn index_on(&mut self, columns: Vec<IndexExpr>) -> &mut Self {
        let index = Index::new(self.table.name.clone(), columns, None);
        self.add_index(index)
    }

    pub fn add_check_constraint(&mut self, expr: impl Into<String>, name: Option<String>) -> &mut Self {
        self.table
            .constraints
            .push(Constraint::Check(CheckConstraint::new(expr, name)));
        self
    }

    pub fn add_unique_constraint(
        &mut self,
        columns: Vec<String>,
        name: Option<String>,
        include: Option<Vec<String>>,
    ) -> &mut Self {
        self.table.constraints.push(Constraint::Unique(UniqueConstraint {
            name,
            columns: Some(columns),
            include,
        }));
        self
    }

    pub fn add_primary_key(
        &mut self,
        columns: Vec<String>,
        name: Option<String>,
        include: Option<Vec<String>>,
    ) -> &mut Self {
        self.table
            .constraints
            .push(Constraint::PrimaryKey(PrimaryKeyConstraint {
                name,
                columns,
                include,
            }));
        self
    }

    pub fn add_foreign_key(&mut self, foreign_key: ForeignKey) -> &mut Self {
        self.table.constraints.push(Constraint::ForeignKey(foreign_key));
        self
    }
}

/// Builder for the operations of one `ALTER TABLE` scope.
#[derive(Debug)]
pub struct AlterTableBuilder {
    table_name: String,
    if_exists: bool,
    only: bool,
    ops: Vec<Operation>,
}

impl AlterTableBuilder {
    /// Apply `IF EXISTS` to every operation of this scope.
    pub fn if_exists(&mut self) -> &mut Self {
        self.if_exists = true;
        self
    }

    /// Apply `ONLY` (no inheritance recursion) to every operation of this
    /// scope.
    pub fn only(&mut self) -> &mut Self {
        self.only = true;
        self
    }

    pub fn add_column(&mut self, column: Column) -> &mut Self {
        self.ops.push(Operation::AddColumn {
            table_name: self.table_name.clone(),
            column,
            only: self.only,
            if_table_exists: self.if_exists,
            if_column_not_exists: false,
        });
        self
    }

    pub fn add_column_if_not_exists(&mut self, column: Column) -> &mut Self {
        self.ops.push(Operation::AddColumn {
            table_name: self.table_name.clone(),
            column,
            only: self.only,
            if_table_exists: self.if_exists,
            if_column_not_exists: true,
        });
        self
    }

    /// Drop a column; `current_column` is the full prior definition,
    /// captured for the inverse.
    pub fn drop_column(
        &mut self,
        current_column: Column,
        if_column_exists: bool,
        mode: Option<DropMode>,
    ) -> &mut Self {
        self.ops.push(Operation::DropColumn {
            table_name: self.table_name.clone(),
            column: current_column,
            only: self.only,
            if_table_exists: self.if_exists,
            if_column_exists,
            mode,
        });
        self
    }

    /// Column-level changes: defaults, nullability, type.
    pub fn alter_column(&mut self, column_name: impl Into<String>) -> ChangeColumn<'_> {
        ChangeColumn {
            table_name: self.table_name.clone(),
            column_name: column_name.into(),
            only: self.only,
            if_table_exists: self.if_exists,
            ops: &mut self.ops,
        }
    }

    pub fn add_check_constraint(&mut self, expr: impl Into<String>, name: Option<String>) -> &mut Self {
        self.add_constraint(Constraint::Check(CheckConstraint::new(expr, name)))
    }

    pub fn add_unique_constraint(
        &mut self,
        columns: Vec<String>,
        name: Option<String>,
        include: Option<Vec<String>>,
    ) -> &mut Self {
        self.add_constraint(Constraint::Unique(UniqueConstraint {
            name,
            columns: Some(columns),
            include,
        }))
    }

    pub fn add_primary_key(
        &mut self,
        columns: Vec<String>,
        name: Option<String>,
        include: Option<Vec<String>>,
    ) -> &mut Self {
        self.add_constraint(Constraint::PrimaryKey(PrimaryKeyConstraint {
            name,
            columns,
            include,
        }))
    }

    pub fn add_foreign_key(&mut self, foreign_key: ForeignKey) -> &mut Self {
        self.add_constraint(Constraint::ForeignKey(foreign_key))
    }

    pub fn add_constraint(&mut self, constraint: Constraint) -> &mut Self {
        self.ops.push(Operation::AddTableConstraint {
            table_name: self.table_name.clone(),
            constraint,
            only: self.only,
            if_table_exists: self.if_exists,
        });
        self
    }

    /// Drop a constraint by name; `current_constraint` is captured so the
    /// drop can be reverted.
    pub fn drop_constraint(
        &mut self,
        constraint_name: impl Into<String>,
        current_constraint: Option<Constraint>,
        if_exists: bool,
        mode: Option<DropMode>,
    ) -> &mut Self {
        self.ops.push(Operation::DropTableConstraint {
            table_name: self.table_name.clone(),
            constraint_name: constraint_name.into(),
            constraint: current_constraint,
            only: self.only,
            if_exists,
            if_table_exists: self.if_exists,
            mode,
        });
        self
    }
}

/// Describes a column type change, with the prior state needed for the
/// inverse. Prior collation and `USING` expression are captured
/// independently of the forward values.
#[derive(Debug, Clone)]
pub struct TypeChange {
    pub new_type: SqlType,
    pub current_type: SqlType,
    pub collation: Option<String>,
    pub current_collation: Option<String>,
    pub using: Option<String>,
    pub current_using: Option<String>,
}

impl TypeChange {
    #[must_use]
    pub fn new(new_type: SqlType, current_type: SqlType) -> Self {
        Self {
            new_type,
            current_type,
            collation: None,
            current_collation: None,
            using: None,
            current_using: None,
        }
    }

    #[must_use]
    pub fn collation(mut self, new: impl Into<String>, current: Option<String>) -> Self {
        self.collation = Some(new.into());
        self.current_collation = current;
        self
    }

    #[must_use]
    pub fn using(mut self, new: impl Into<String>, current: Option<String>) -> Self {
        self.using = Some(new.into());
        self.current_using = current;
        self
    }
}

/// Chaining handle returned by [`AlterTableBuilder::alter_column`].
#[derive(Debug)]
pub struct ChangeColumn<'a> {
    table_name: String,
    column_name: String,
    only: bool,
    if_table_exists: bool,
    ops: &'a mut Vec<Operation>,
}

impl ChangeColumn<'_> {
    /// Set a default; `current_default` of `None` records that the column
    /// had no default before, making the inverse a `DROP DEFAULT`.
    pub fn set_default(&mut self, new_default: impl Into<String>, current_default: Option<String>) -> &mut Self {
        self.ops.push(Operation::SetDefault {
            table_name: self.table_name.clone(),
            column_name: self.column_name.clone(),
            new_default: new_default.into(),
            current_default,
            only: self.only,
            if_table_exists: self.if_table_exists,
        });
        self
    }

    pub fn drop_default(&mut self, current_default: Option<String>) -> &mut Self {
        self.ops.push(Operation::DropDefault {
            table_name: self.table_name.clone(),
            column_name: self.column_name.clone(),
            current_default,
            only: self.only,
            if_table_exists: self.if_table_exists,
        });
        self
    }

    /// `true` drops the `NOT NULL` marker, `false` sets it. The inverses
    /// are symmetric.
    pub fn set_nullable(&mut self, nullable: bool) -> &mut Self {
        let (table_name, column_name) = (self.table_name.clone(), self.column_name.clone());
        if nullable {
            self.ops.push(Operation::DropNotNull {
                table_name,
                column_name,
                only: self.only,
                if_table_exists: self.if_table_exists,
            });
        } else {
            self.ops.push(Operation::SetNotNull {
                table_name,
                column_name,
                only: self.only,
                if_table_exists: self.if_table_exists,
            });
        }
        self
    }

    pub fn change_type(&mut self, change: TypeChange) -> &mut Self {
        self.ops.push(Operation::ChangeType {
            table_name: self.table_name.clone(),
            column_name: self.column_name.clone(),
            new_type: change.new_type,
            current_type: change.current_type,
            collation: change.collation,
            using: change.using,
            current_collation: change.current_collation,
            current_using: change.current_using,
            only: self.only,
            if_table_exists: self.if_table_exists,
        });
        self
    }
}
