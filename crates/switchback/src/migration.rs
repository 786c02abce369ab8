//! Migration identity and sources.
//!
//! A migration is parsed from its source exactly once, at discovery time,
//! and is immutable afterwards. Identity comes from the file name
//! convention: the first 15 characters are the revision
//! (`YYYYMMDD_HHMMSS`), the remainder after the separator and up to the
//! extension is the name.

use std::{borrow::Cow, fmt, str::FromStr};

use time::{macros::format_description, OffsetDateTime};

use crate::{builder::Blueprint, error::Error, ops::Operation};

/// Chronologically ordered unique identifier of one migration.
///
/// Lexical order equals intended application order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Revision(String);

impl Revision {
    pub const LEN: usize = 15;

    /// A revision derived from the current UTC time.
    #[must_use]
    pub fn now() -> Self {
        let format = format_description!("[year][month][day]_[hour][minute][second]");
        // The format above cannot fail for a valid timestamp.
        match OffsetDateTime::now_utc().format(&format) {
            Ok(s) => Self(s),
            Err(_) => Self(String::from("19700101_000000")),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Revision {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let valid = s.len() == Self::LEN
            && s.bytes().enumerate().all(|(i, b)| {
                if i == 8 {
                    b == b'_'
                } else {
                    b.is_ascii_digit()
                }
            });

        if valid {
            Ok(Self(s.to_string()))
        } else {
            Err(Error::InvalidMigrationFormat {
                file_name: s.to_string(),
                reason: "revision must match YYYYMMDD_HHMMSS".into(),
            })
        }
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One row of the history table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMigration {
    pub revision: Revision,
    pub name: String,
    /// ISO-8601 timestamp, stored as text for portability across dialects.
    /// Subseconds are fixed-width so lexical order equals chronological
    /// order.
    pub applied: String,
}

/// The current time as the ISO-8601 string stored in the history table.
///
/// The subsecond field is always six digits: history queries order rows by
/// this column as text.
#[must_use]
pub fn applied_timestamp() -> String {
    let format = format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z"
    );
    OffsetDateTime::now_utc()
        .format(&format)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00.000000Z"))
}

/// A single migration: identity plus an ordered, immutable operation list.
#[derive(Clone)]
pub struct Migration {
    revision: Revision,
    name: Cow<'static, str>,
    file: Option<String>,
    transactional: bool,
    operations: Vec<Operation>,
}

impl Migration {
    /// Create a migration from code: the closure describes the schema
    /// changes on a [`Blueprint`], which is drained into the operation
    /// list immediately.
    ///
    /// # Errors
    ///
    /// Fails when `revision` does not match the `YYYYMMDD_HHMMSS`
    /// convention.
    pub fn new(
        revision: &str,
        name: impl Into<Cow<'static, str>>,
        build: impl FnOnce(&mut Blueprint),
    ) -> Result<Self, Error> {
        let mut blueprint = Blueprint::new();
        build(&mut blueprint);

        Ok(Self {
            revision: revision.parse()?,
            name: name.into(),
            file: None,
            transactional: true,
            operations: blueprint.into_ops(),
        })
    }

    /// Parse a structured SQL migration file.
    ///
    /// Format: comment header lines, a blank line, the upgrade SQL, a line
    /// beginning with `----`, then the downgrade SQL. A header line
    /// `-- transactional: false` disables the wrapping transaction.
    /// Comment lines inside the up/down sections are stripped.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidMigrationFormat`] when the file name or body
    /// violates the convention.
    pub fn from_sql_source(file_name: &str, body: &str) -> Result<Self, Error> {
        let (revision, name) = parse_file_name(file_name)?;

        let format_err = |reason: &'static str| Error::InvalidMigrationFormat {
            file_name: file_name.to_string(),
            reason: reason.into(),
        };

        let mut lines = body.lines();

        let mut transactional = true;
        let mut header_lines = 0usize;
        for line in lines.by_ref() {
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            if !line.starts_with("--") {
                return Err(format_err("header lines must start with `--`"));
            }
            header_lines += 1;
            if let Some(value) = line.strip_prefix("-- transactional:") {
                match value.trim() {
                    "true" => transactional = true,
                    "false" => transactional = false,
                    _ => return Err(format_err("transactional marker must be true or false")),
                }
            }
        }
        if header_lines == 0 {
            return Err(format_err("missing header"));
        }

        let mut up_sql = Vec::new();
        let mut down_sql = Vec::new();
        let mut seen_separator = false;
        for line in lines {
            let trimmed = line.trim_end();
            if trimmed.starts_with("----") {
                if seen_separator {
                    return Err(format_err("multiple up/down separators"));
                }
                seen_separator = true;
                continue;
            }
            if trimmed.trim_start().starts_with("--") {
                continue;
            }
            if seen_separator {
                down_sql.push(line);
            } else {
                up_sql.push(line);
            }
        }
        if !seen_separator {
            return Err(format_err("missing `----` separator between up and down SQL"));
        }

        Ok(Self {
            revision,
            name: Cow::Owned(name),
            file: Some(file_name.to_string()),
            transactional,
            operations: vec![Operation::RunSql {
                up_sql: up_sql.join("\n").trim().to_string(),
                down_sql: down_sql.join("\n").trim().to_string(),
            }],
        })
    }

    /// Mark this migration as running outside a wrapping transaction, for
    /// statements some dialects forbid inside one (e.g. concurrent index
    /// builds). Partial application on failure becomes the author's risk.
    #[must_use]
    pub fn non_transactional(mut self) -> Self {
        self.transactional = false;
        self
    }

    #[must_use]
    pub fn revision(&self) -> &Revision {
        &self.revision
    }

    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_ref()
    }

    pub(crate) fn name_cow(&self) -> Cow<'static, str> {
        self.name.clone()
    }

    /// The source file this migration was parsed from, if any.
    #[must_use]
    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    #[must_use]
    pub fn is_transactional(&self) -> bool {
        self.transactional
    }

    #[must_use]
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }
}

impl fmt::Debug for Migration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Migration")
            .field("revision", &self.revision)
            .field("name", &self.name)
            .field("file", &self.file)
            .field("transactional", &self.transactional)
            .field("operations", &self.operations.len())
            .finish()
    }
}

fn parse_file_name(file_name: &str) -> Result<(Revision, String), Error> {
    let base = file_name
        .rsplit(&['/', '\\'][..])
        .next()
        .unwrap_or(file_name);

    let err = |reason: &'static str| Error::InvalidMigrationFormat {
        file_name: file_name.to_string(),
        reason: reason.into(),
    };

    // The boundary check keeps the slices below from landing inside a
    // multibyte character.
    if base.len() < Revision::LEN + 2 || !base.is_char_boundary(Revision::LEN) {
        return Err(err("file name must be <revision>_<name>.<ext>"));
    }
    let revision: Revision = base[..Revision::LEN].parse()?;
    if base.as_bytes()[Revision::LEN] != b'_' {
        return Err(err("expected `_` between revision and name"));
    }
    let rest = &base[Revision::LEN + 1..];
    let name = match rest.rfind('.') {
        Some(dot) if dot > 0 => &rest[..dot],
        _ => return Err(err("file name must be <revision>_<name>.<ext>")),
    };

    Ok((revision, name.to_string()))
}

/// Generate the file name and body for a fresh SQL migration stub.
#[must_use]
pub fn new_migration_source(name: &str) -> (String, String) {
    let slug: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    let slug = if slug.is_empty() {
        String::from("unnamed")
    } else {
        slug
    };

    let revision = Revision::now();
    let file_name = format!("{revision}_{slug}.sql");
    let body = format!(
        "-- name: {name}\n-- transactional: true\n\n-- upgrade SQL\n----\n-- downgrade SQL\n"
    );
    (file_name, body)
}

/// Split a rendered SQL block into single statements. Semicolons inside
/// single-quoted literals, dollar-quoted bodies (`$$ ... $$`,
/// `$tag$ ... $tag$`) and `--` line comments do not split. Used for
/// SQL-file migrations whose up/down blocks can hold several statements.
pub(crate) fn split_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut in_string = false;
    let mut dollar_tag: Option<String> = None;
    let mut i = 0;

    while let Some(c) = sql[i..].chars().next() {
        let rest = &sql[i..];

        if in_string {
            current.push(c);
            if c == '\'' {
                in_string = false;
            }
            i += c.len_utf8();
            continue;
        }

        if let Some(tag) = &dollar_tag {
            if rest.starts_with(tag.as_str()) {
                current.push_str(tag);
                i += tag.len();
                dollar_tag = None;
            } else {
                current.push(c);
                i += c.len_utf8();
            }
            continue;
        }

        match c {
            '\'' => {
                in_string = true;
                current.push(c);
                i += c.len_utf8();
            }
            '$' => {
                if let Some(tag) = dollar_quote_tag(rest) {
                    current.push_str(&tag);
                    i += tag.len();
                    dollar_tag = Some(tag);
                } else {
                    current.push(c);
                    i += c.len_utf8();
                }
            }
            '-' if rest.starts_with("--") => {
                let end = rest.find('\n').map_or(rest.len(), |n| n + 1);
                current.push_str(&rest[..end]);
                i += end;
            }
            ';' => {
                let stmt = current.trim();
                if !stmt.is_empty() {
                    statements.push(stmt.to_string());
                }
                current.clear();
                i += 1;
            }
            _ => {
                current.push(c);
                i += c.len_utf8();
            }
        }
    }
    let stmt = current.trim();
    if !stmt.is_empty() {
        statements.push(stmt.to_string());
    }
    statements
}

/// A dollar-quote opener at the start of `s`: `$`, an optional identifier
/// tag, `$`. Returns the full tag including both dollar signs.
fn dollar_quote_tag(s: &str) -> Option<String> {
    let rest = s.strip_prefix('$')?;
    let end = rest.find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))?;
    if rest[end..].starts_with('$') {
        Some(format!("${}$", &rest[..end]))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revision_roundtrip() {
        let rev: Revision = "20220812_081500".parse().unwrap();
        assert_eq!(rev.as_str(), "20220812_081500");
        assert!("2022-08-12_0815".parse::<Revision>().is_err());
        assert!("20220812-081500".parse::<Revision>().is_err());
    }

    #[test]
    fn revision_order_is_lexical() {
        let older: Revision = "20220812_081500".parse().unwrap();
        let newer: Revision = "20221101_000000".parse().unwrap();
        assert!(older < newer);
    }

    #[test]
    fn file_name_convention() {
        let (revision, name) = parse_file_name("20220812_081500_create_users.sql").unwrap();
        assert_eq!(revision.as_str(), "20220812_081500");
        assert_eq!(name, "create_users");

        assert!(parse_file_name("create_users.sql").is_err());
        assert!(parse_file_name("20220812_081500.sql").is_err());

        // A multibyte character straddling the revision boundary is a
        // format error, not a panic.
        assert!(parse_file_name("12345678901234ü_init.sql").is_err());
        assert!(Migration::from_sql_source("12345678901234ü_init.sql", "-- h\n\nSELECT 1;\n----\n").is_err());
    }

    #[test]
    fn generated_stub_parses() {
        let (file_name, body) = new_migration_source("create users");
        assert!(file_name.ends_with("_create_users.sql"));
        let migration = Migration::from_sql_source(&file_name, &body).unwrap();
        assert!(migration.is_transactional());
    }

    #[test]
    fn statement_splitting_respects_literals() {
        let stmts = split_statements("INSERT INTO t VALUES ('a;b'); DELETE FROM t;");
        assert_eq!(
            stmts,
            vec!["INSERT INTO t VALUES ('a;b')".to_string(), "DELETE FROM t".to_string()]
        );
    }

    #[test]
    fn statement_splitting_respects_dollar_quoted_bodies() {
        let sql = "CREATE FUNCTION touch() RETURNS trigger AS $$\n\
                   BEGIN\n\
                   \x20   NEW.updated_at = now();\n\
                   \x20   RETURN NEW;\n\
                   END;\n\
                   $$ LANGUAGE plpgsql;\n\
                   SELECT 1;";
        let stmts = split_statements(sql);
        assert_eq!(stmts.len(), 2);
        assert!(stmts[0].starts_with("CREATE FUNCTION"));
        assert!(stmts[0].contains("RETURN NEW;"));
        assert!(stmts[0].ends_with("$$ LANGUAGE plpgsql"));
        assert_eq!(stmts[1], "SELECT 1");
    }

    #[test]
    fn statement_splitting_respects_tagged_dollar_quotes_and_comments() {
        let stmts = split_statements("SELECT $body$ a; b $body$; -- note; not a split\nSELECT 2;");
        assert_eq!(
            stmts,
            vec![
                "SELECT $body$ a; b $body$".to_string(),
                "-- note; not a split\nSELECT 2".to_string(),
            ]
        );

        // A lone dollar sign is not a quote opener.
        let stmts = split_statements("SELECT '$'; SELECT 1 + $1;");
        assert_eq!(
            stmts,
            vec!["SELECT '$'".to_string(), "SELECT 1 + $1".to_string()]
        );
    }

    #[test]
    fn applied_timestamps_are_fixed_width() {
        let ts = applied_timestamp();
        assert_eq!(ts.len(), "1970-01-01T00:00:00.000000Z".len());
        assert!(ts.ends_with('Z'));
    }
}
