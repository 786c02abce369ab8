//! # Switchback
//!
//! A reversible schema-migration toolkit built on [SQLx](https://github.com/launchbadge/sqlx).
//!
//! Schema changes are described as typed, invertible [`Operation`]s (or as
//! structured SQL files), compiled to dialect-specific DDL, and applied in
//! revision order by a [`Migrator`] that records history in a dedicated
//! table.
//!
#![warn(clippy::pedantic)]
#![allow(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_lossless,
    clippy::unreadable_literal,
    clippy::doc_markdown,
    clippy::module_name_repetitions
)]

pub mod builder;
pub mod db;
pub mod dialect;
pub mod error;
pub mod migration;
pub mod migrator;
pub mod ops;
pub mod schema;
pub mod types;

pub use builder::Blueprint;
pub use error::Error;
pub use migration::{Migration, Revision};
pub use migrator::{ApplyOptions, Migrator, DEFAULT_HISTORY_TABLE};
pub use ops::Operation;
pub use types::SqlType;

/// Commonly used types and functions.
pub mod prelude {
    pub use super::builder::Blueprint;
    pub use super::dialect::Dialect;
    pub use super::migration::{Migration, Revision};
    pub use super::migrator::{
        ApplyOptions, Direction, MigrateHooks, MigrationStatus, Migrator, NoHooks,
    };
    pub use super::ops::Operation;
    pub use super::schema::{Column, Index, IndexExpr};
    pub use super::types::SqlType;
    pub use super::Error;
}
