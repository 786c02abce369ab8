//! The closed set of logical column types.
//!
//! A [`SqlType`] carries no SQL of its own; the dialect resolves it to a
//! concrete token via [`Dialect::type_sql`](crate::dialect::Dialect::type_sql).

/// A logical column type, resolved to dialect SQL at render time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlType {
    SmallInteger,
    Integer {
        auto_increment: bool,
    },
    BigInteger {
        auto_increment: bool,
    },
    /// Bounded or unbounded character varying.
    VarChar {
        length: Option<u32>,
    },
    Text,
    Boolean,
    Date,
    Time {
        tz: bool,
    },
    DateTime {
        tz: bool,
    },
    Numeric {
        precision: Option<u32>,
        scale: Option<u32>,
    },
    Real,
    DoublePrecision,
    Uuid,
    Json,
}

impl SqlType {
    #[must_use]
    pub fn integer() -> Self {
        SqlType::Integer {
            auto_increment: false,
        }
    }

    #[must_use]
    pub fn big_integer() -> Self {
        SqlType::BigInteger {
            auto_increment: false,
        }
    }

    /// A big integer backed by a sequence, for surrogate keys.
    #[must_use]
    pub fn auto_increment() -> Self {
        SqlType::BigInteger {
            auto_increment: true,
        }
    }

    #[must_use]
    pub fn var_char(length: Option<u32>) -> Self {
        SqlType::VarChar { length }
    }

    #[must_use]
    pub fn timestamp(tz: bool) -> Self {
        SqlType::DateTime { tz }
    }

    /// A short name for error messages, not valid SQL.
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            SqlType::SmallInteger => "small integer".into(),
            SqlType::Integer { .. } => "integer".into(),
            SqlType::BigInteger { .. } => "big integer".into(),
            SqlType::VarChar { length: None } => "varchar".into(),
            SqlType::VarChar {
                length: Some(length),
            } => format!("varchar({length})"),
            SqlType::Text => "text".into(),
            SqlType::Boolean => "boolean".into(),
            SqlType::Date => "date".into(),
            SqlType::Time { .. } => "time".into(),
            SqlType::DateTime { .. } => "datetime".into(),
            SqlType::Numeric { .. } => "numeric".into(),
            SqlType::Real => "real".into(),
            SqlType::DoublePrecision => "double precision".into(),
            SqlType::Uuid => "uuid".into(),
            SqlType::Json => "json".into(),
        }
    }
}
