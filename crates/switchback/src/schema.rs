//! Schema value objects: tables, columns, constraints and indices.
//!
//! These types are pure data. They are assembled by the builders in
//! [`crate::builder`] and compiled to SQL by the operations in
//! [`crate::ops`].

use crate::types::SqlType;

/// Referential action for `ON DELETE` / `ON UPDATE` clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Restrict,
    Cascade,
    NoAction,
    SetNull,
    SetDefault,
}

impl Action {
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            Action::Restrict => "RESTRICT",
            Action::Cascade => "CASCADE",
            Action::NoAction => "NO ACTION",
            Action::SetNull => "SET NULL",
            Action::SetDefault => "SET DEFAULT",
        }
    }
}

/// Foreign key `MATCH` clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    Full,
    Partial,
    Simple,
}

impl MatchType {
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            MatchType::Full => "FULL",
            MatchType::Partial => "PARTIAL",
            MatchType::Simple => "SIMPLE",
        }
    }
}

/// Trailing mode for `DROP` statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropMode {
    Cascade,
    Restrict,
}

impl DropMode {
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            DropMode::Cascade => "CASCADE",
            DropMode::Restrict => "RESTRICT",
        }
    }
}

/// Sort direction of an index column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sorting {
    Asc,
    Desc,
}

/// Null ordering of an index column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullsOrder {
    First,
    Last,
}

/// One column expression of an index, with its optional modifiers.
///
/// Modifiers render left to right, each independently omittable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexExpr {
    pub column: String,
    pub collation: Option<String>,
    pub opclass: Option<String>,
    pub opclass_params: Option<String>,
    pub sorting: Option<Sorting>,
    pub nulls: Option<NullsOrder>,
}

impl IndexExpr {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            collation: None,
            opclass: None,
            opclass_params: None,
            sorting: None,
            nulls: None,
        }
    }

    #[must_use]
    pub fn collation(mut self, collation: impl Into<String>) -> Self {
        self.collation = Some(collation.into());
        self
    }

    #[must_use]
    pub fn opclass(mut self, opclass: impl Into<String>, params: Option<String>) -> Self {
        self.opclass = Some(opclass.into());
        self.opclass_params = params;
        self
    }

    #[must_use]
    pub fn sorting(mut self, sorting: Sorting) -> Self {
        self.sorting = Some(sorting);
        self
    }

    #[must_use]
    pub fn nulls(mut self, nulls: NullsOrder) -> Self {
        self.nulls = Some(nulls);
        self
    }

    pub(crate) fn compile(&self) -> String {
        let mut sql = self.column.clone();
        if let Some(collation) = &self.collation {
            sql.push_str(&format!(" COLLATE \"{collation}\""));
        }
        if let Some(opclass) = &self.opclass {
            sql.push_str(&format!(" {opclass}"));
            if let Some(params) = &self.opclass_params {
                sql.push_str(&format!("({params})"));
            }
        }
        match self.sorting {
            Some(Sorting::Asc) => sql.push_str(" ASC"),
            Some(Sorting::Desc) => sql.push_str(" DESC"),
            None => {}
        }
        match self.nulls {
            Some(NullsOrder::First) => sql.push_str(" NULLS FIRST"),
            Some(NullsOrder::Last) => sql.push_str(" NULLS LAST"),
            None => {}
        }
        sql
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckConstraint {
    pub expr: String,
    pub name: Option<String>,
}

impl CheckConstraint {
    pub fn new(expr: impl Into<String>, name: Option<String>) -> Self {
        Self {
            expr: expr.into(),
            name,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UniqueConstraint {
    pub name: Option<String>,
    pub columns: Option<Vec<String>>,
    pub include: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimaryKeyConstraint {
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub include: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub target_table: String,
    pub target_columns: Option<Vec<String>>,
    pub self_columns: Option<Vec<String>>,
    pub on_delete: Option<Action>,
    pub on_update: Option<Action>,
    pub name: Option<String>,
    pub match_type: Option<MatchType>,
}

impl ForeignKey {
    pub fn new(target_table: impl Into<String>) -> Self {
        Self {
            target_table: target_table.into(),
            target_columns: None,
            self_columns: None,
            on_delete: None,
            on_update: None,
            name: None,
            match_type: None,
        }
    }

    pub(crate) fn compile(&self) -> String {
        let mut sql = String::new();
        if let Some(name) = &self.name {
            sql.push_str(&format!("CONSTRAINT {name} "));
        }
        if let Some(self_columns) = &self.self_columns {
            sql.push_str(&format!("FOREIGN KEY ({}) ", self_columns.join(", ")));
        }
        sql.push_str(&format!("REFERENCES {}", self.target_table));
        if let Some(target_columns) = &self.target_columns {
            sql.push_str(&format!(" ({})", target_columns.join(", ")));
        }
        if let Some(match_type) = self.match_type {
            sql.push_str(&format!(" MATCH {}", match_type.as_sql()));
        }
        if let Some(on_delete) = self.on_delete {
            sql.push_str(&format!(" ON DELETE {}", on_delete.as_sql()));
        }
        if let Some(on_update) = self.on_update {
            sql.push_str(&format!(" ON UPDATE {}", on_update.as_sql()));
        }
        sql
    }
}

/// A table-level constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    Check(CheckConstraint),
    Unique(UniqueConstraint),
    PrimaryKey(PrimaryKeyConstraint),
    ForeignKey(ForeignKey),
}

impl Constraint {
    /// The constraint name, if one was given. Inverting a constraint drop
    /// requires a name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Constraint::Check(c) => c.name.as_deref(),
            Constraint::Unique(c) => c.name.as_deref(),
            Constraint::PrimaryKey(c) => c.name.as_deref(),
            Constraint::ForeignKey(c) => c.name.as_deref(),
        }
    }

    pub(crate) fn compile(&self) -> String {
        match self {
            Constraint::Check(check) => {
                // Literal percent signs must not collide with drivers that
                // use `%` as a format placeholder.
                let expr = check.expr.replace('%', "%%");
                match &check.name {
                    Some(name) => format!("CONSTRAINT {name} CHECK ({expr})"),
                    None => format!("CHECK ({expr})"),
                }
            }
            Constraint::Unique(unique) => {
                let mut sql = String::new();
                if let Some(name) = &unique.name {
                    sql.push_str(&format!("CONSTRAINT {name} "));
                }
                sql.push_str("UNIQUE");
                if let Some(columns) = &unique.columns {
                    sql.push_str(&format!(" ({})", columns.join(", ")));
                }
                if let Some(include) = &unique.include {
                    sql.push_str(&format!(" INCLUDE ({})", include.join(", ")));
                }
                sql
            }
            Constraint::PrimaryKey(pk) => {
                let mut sql = String::new();
                if let Some(name) = &pk.name {
                    sql.push_str(&format!("CONSTRAINT {name} "));
                }
                sql.push_str(&format!("PRIMARY KEY ({})", pk.columns.join(", ")));
                if let Some(include) = &pk.include {
                    sql.push_str(&format!(" INCLUDE ({})", include.join(", ")));
                }
                sql
            }
            Constraint::ForeignKey(fk) => fk.compile(),
        }
    }
}

/// A generated (computed) column clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generated {
    pub expr: String,
    pub stored: bool,
}

/// A column definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub ty: SqlType,
    pub null: bool,
    pub default: Option<String>,
    pub primary_key: bool,
    pub collate: Option<String>,
    pub generated: Option<Generated>,
    pub unique_constraint: Option<UniqueConstraint>,
    pub check_constraint: Option<CheckConstraint>,
    pub foreign_key: Option<ForeignKey>,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: SqlType) -> Self {
        Self {
            name: name.into(),
            ty,
            null: false,
            default: None,
            primary_key: false,
            collate: None,
            generated: None,
            unique_constraint: None,
            check_constraint: None,
            foreign_key: None,
        }
    }

    #[must_use]
    pub fn null(mut self, null: bool) -> Self {
        self.null = null;
        self
    }

    #[must_use]
    pub fn default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    #[must_use]
    pub fn collate(mut self, collation: impl Into<String>) -> Self {
        self.collate = Some(collation.into());
        self
    }

    #[must_use]
    pub fn check(mut self, expr: impl Into<String>, name: Option<String>) -> Self {
        self.check_constraint = Some(CheckConstraint::new(expr, name));
        self
    }

    #[must_use]
    pub fn unique(mut self, name: Option<String>) -> Self {
        self.unique_constraint = Some(UniqueConstraint {
            name,
            ..UniqueConstraint::default()
        });
        self
    }

    #[must_use]
    pub fn references(mut self, foreign_key: ForeignKey) -> Self {
        self.foreign_key = Some(foreign_key);
        self
    }

    #[must_use]
    pub fn generated(mut self, expr: impl Into<String>, stored: bool) -> Self {
        self.generated = Some(Generated {
            expr: expr.into(),
            stored,
        });
        self
    }
}

/// An index definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    pub name: String,
    pub table_name: String,
    pub unique: bool,
    pub using: Option<String>,
    pub columns: Vec<IndexExpr>,
    pub include: Option<Vec<String>>,
    pub with: Option<String>,
    pub tablespace: Option<String>,
    pub where_clause: Option<String>,
}

impl Index {
    /// Create an index over the given column expressions. When `name` is
    /// `None` one is derived from the table and column names.
    pub fn new(table_name: impl Into<String>, columns: Vec<IndexExpr>, name: Option<String>) -> Self {
        let table_name = table_name.into();
        let name = name.unwrap_or_else(|| derive_index_name(&table_name, &columns));
        Self {
            name,
            table_name,
            unique: false,
            using: None,
            columns,
            include: None,
            with: None,
            tablespace: None,
            where_clause: None,
        }
    }

    #[must_use]
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    #[must_use]
    pub fn using(mut self, method: impl Into<String>) -> Self {
        self.using = Some(method.into());
        self
    }

    #[must_use]
    pub fn include(mut self, columns: Vec<String>) -> Self {
        self.include = Some(columns);
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: impl Into<String>) -> Self {
        self.with = Some(options.into());
        self
    }

    #[must_use]
    pub fn tablespace(mut self, tablespace: impl Into<String>) -> Self {
        self.tablespace = Some(tablespace.into());
        self
    }

    #[must_use]
    pub fn where_clause(mut self, predicate: impl Into<String>) -> Self {
        self.where_clause = Some(predicate.into());
        self
    }
}

fn derive_index_name(table_name: &str, columns: &[IndexExpr]) -> String {
    let mut name = String::from(table_name);
    for expr in columns {
        name.push('_');
        name.extend(expr.column.chars().filter(char::is_ascii_alphanumeric));
    }
    name.push_str("_idx");
    name
}

/// A table definition: the full prior shape captured for reversible drops.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub constraints: Vec<Constraint>,
    pub indices: Vec<Index>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Table::default()
        }
    }
}

/// Quote a literal value for a `DEFAULT` clause.
///
/// Single quotes are doubled and percent signs escaped, so an empty string
/// round-trips as `''` rather than disappearing.
pub(crate) fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''").replace('%', "%%"))
}
