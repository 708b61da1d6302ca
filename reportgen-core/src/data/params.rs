//! Named query parameters.
//!
//! Queries are written with `:name` placeholders and rewritten into the
//! positional form each driver understands before execution. The query is
//! tokenized with the driver's SQL dialect, so string literals (including
//! backslash escapes and dollar quoting), quoted identifiers, comments and
//! PostgreSQL `::` casts are never rewritten.

use crate::config::{DriverKind, Parameters};
use serde_json::Value as JsonValue;
use sqlparser::dialect::{Dialect, MySqlDialect, PostgreSqlDialect, SQLiteDialect};
use sqlparser::tokenizer::{Location, Token, Tokenizer, TokenizerError};
use thiserror::Error;

/// Native placeholder syntax of a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderStyle {
    /// `$1, $2, ...`; repeated names reuse their index
    Numbered,
    /// `?`; one bound value per occurrence
    Positional,
}

impl From<DriverKind> for PlaceholderStyle {
    fn from(kind: DriverKind) -> Self {
        match kind {
            DriverKind::Postgresql => PlaceholderStyle::Numbered,
            DriverKind::Sqlite | DriverKind::Mysql => PlaceholderStyle::Positional,
        }
    }
}

/// A query rewritten for a specific driver, with its values in bind order.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundQuery {
    /// SQL text with native placeholders
    pub sql: String,
    /// Values to bind, in placeholder order
    pub params: Vec<JsonValue>,
}

impl BoundQuery {
    /// A query with no parameters.
    pub fn plain(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }
}

/// Failures while binding named parameters.
#[derive(Debug, Error)]
pub enum BindError {
    /// A placeholder had no value in the parameter map.
    #[error("query references parameter ':{name}' but no value was supplied")]
    MissingParameter {
        /// Placeholder name without the leading colon
        name: String,
    },

    /// The query text could not be split into SQL tokens.
    #[error("query could not be tokenized: {source}")]
    Tokenize {
        #[from]
        source: TokenizerError,
    },
}

/// SQL dialect used to tokenize queries for a driver.
pub fn dialect_for(kind: DriverKind) -> Box<dyn Dialect> {
    match kind {
        DriverKind::Postgresql => Box::new(PostgreSqlDialect {}),
        DriverKind::Mysql => Box::new(MySqlDialect {}),
        DriverKind::Sqlite => Box::new(SQLiteDialect {}),
    }
}

/// Rewrites `:name` placeholders into the native style of `driver` and
/// collects their values.
///
/// A placeholder is a `:` token immediately followed by an unquoted word.
/// Everything else is copied from `query` byte for byte.
///
/// # Errors
/// Returns [`BindError::MissingParameter`] for the first placeholder that has
/// no entry in `params`, and [`BindError::Tokenize`] when the query cannot be
/// tokenized (for example an unterminated string literal).
///
/// # Example
/// ```rust
/// use reportgen_core::config::{DriverKind, Parameters};
/// use reportgen_core::data::params::bind_named;
/// use serde_json::json;
///
/// let mut params = Parameters::new();
/// params.insert("region".to_string(), json!("EMEA"));
///
/// let bound = bind_named(
///     "SELECT * FROM sales WHERE region = :region AND note <> ':region'",
///     DriverKind::Postgresql,
///     &params,
/// ).unwrap();
/// assert_eq!(bound.sql, "SELECT * FROM sales WHERE region = $1 AND note <> ':region'");
/// assert_eq!(bound.params, vec![json!("EMEA")]);
/// ```
pub fn bind_named(
    query: &str,
    driver: DriverKind,
    params: &Parameters,
) -> Result<BoundQuery, BindError> {
    let dialect = dialect_for(driver);
    let tokens = Tokenizer::new(dialect.as_ref(), query)
        .with_unescape(false)
        .tokenize_with_location()?;

    let style = PlaceholderStyle::from(driver);
    let line_starts = line_starts(query);
    let mut sql = String::with_capacity(query.len());
    let mut values = Vec::new();
    let mut numbered: Vec<&str> = Vec::new();
    let mut copied = 0;

    for pair in tokens.windows(2) {
        let name = match (&pair[0].token, &pair[1].token) {
            (Token::Colon, Token::Word(word)) if word.quote_style.is_none() => word.value.as_str(),
            _ => continue,
        };
        let start = byte_offset(query, &line_starts, pair[0].span.start);
        let end = start + 1 + name.len();
        if start < copied || query.get(start + 1..end) != Some(name) {
            continue;
        }

        let value = params
            .get(name)
            .ok_or_else(|| BindError::MissingParameter {
                name: name.to_string(),
            })?;

        sql.push_str(&query[copied..start]);
        match style {
            PlaceholderStyle::Positional => {
                sql.push('?');
                values.push(value.clone());
            }
            PlaceholderStyle::Numbered => {
                let index = match numbered.iter().position(|known| *known == name) {
                    Some(index) => index,
                    None => {
                        numbered.push(name);
                        values.push(value.clone());
                        numbered.len() - 1
                    }
                };
                sql.push('$');
                sql.push_str(&(index + 1).to_string());
            }
        }
        copied = end;
    }
    sql.push_str(&query[copied..]);

    Ok(BoundQuery {
        sql,
        params: values,
    })
}

/// Byte offset of the first character of each line.
fn line_starts(query: &str) -> Vec<usize> {
    std::iter::once(0)
        .chain(query.match_indices('\n').map(|(offset, _)| offset + 1))
        .collect()
}

/// Converts a 1-based line/column token location into a byte offset.
fn byte_offset(query: &str, line_starts: &[usize], location: Location) -> usize {
    let line_start = usize::try_from(location.line)
        .ok()
        .and_then(|line| line.checked_sub(1))
        .and_then(|line| line_starts.get(line).copied())
        .unwrap_or(query.len());
    let column = usize::try_from(location.column)
        .unwrap_or(1)
        .saturating_sub(1);
    query[line_start..]
        .char_indices()
        .nth(column)
        .map_or(query.len(), |(offset, _)| line_start + offset)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params() -> Parameters {
        let mut params = Parameters::new();
        params.insert("region".to_string(), json!("EMEA"));
        params.insert("min_units".to_string(), json!(10));
        params.insert("since".to_string(), json!("2024-01-01"));
        params
    }

    #[test]
    fn test_positional_rewrite() {
        let bound = bind_named(
            "SELECT * FROM sales WHERE region = :region AND units >= :min_units",
            DriverKind::Sqlite,
            &params(),
        )
        .unwrap();
        assert_eq!(
            bound.sql,
            "SELECT * FROM sales WHERE region = ? AND units >= ?"
        );
        assert_eq!(bound.params, vec![json!("EMEA"), json!(10)]);
    }

    #[test]
    fn test_numbered_rewrite_reuses_index() {
        let bound = bind_named(
            "SELECT :region AS r, units FROM sales WHERE region = :region AND units > :min_units",
            DriverKind::Postgresql,
            &params(),
        )
        .unwrap();
        assert_eq!(
            bound.sql,
            "SELECT $1 AS r, units FROM sales WHERE region = $1 AND units > $2"
        );
        assert_eq!(bound.params, vec![json!("EMEA"), json!(10)]);
    }

    #[test]
    fn test_positional_repeats_values() {
        let bound = bind_named("SELECT :region, :region", DriverKind::Mysql, &params()).unwrap();
        assert_eq!(bound.sql, "SELECT ?, ?");
        assert_eq!(bound.params.len(), 2);
    }

    #[test]
    fn test_casts_are_preserved() {
        let bound = bind_named(
            "SELECT * FROM sales WHERE sold_at >= :since::date AND id::text <> ''",
            DriverKind::Postgresql,
            &params(),
        )
        .unwrap();
        assert_eq!(
            bound.sql,
            "SELECT * FROM sales WHERE sold_at >= $1::date AND id::text <> ''"
        );
    }

    #[test]
    fn test_literals_and_comments_are_skipped() {
        let query = "SELECT ':region', \":region\" -- :missing\n/* :missing */ FROM t WHERE a = :region";
        let bound = bind_named(query, DriverKind::Sqlite, &params()).unwrap();
        assert_eq!(
            bound.sql,
            "SELECT ':region', \":region\" -- :missing\n/* :missing */ FROM t WHERE a = ?"
        );
        assert_eq!(bound.params, vec![json!("EMEA")]);
    }

    #[test]
    fn test_doubled_quotes_inside_literal() {
        let bound = bind_named(
            "SELECT 'it''s :region' WHERE x = :region",
            DriverKind::Sqlite,
            &params(),
        )
        .unwrap();
        assert_eq!(bound.sql, "SELECT 'it''s :region' WHERE x = ?");
        assert_eq!(bound.params, vec![json!("EMEA")]);
    }

    #[test]
    fn test_mysql_backslash_escaped_quote_stays_in_literal() {
        let bound = bind_named(
            r"SELECT 'it\'s :region' AS t WHERE x = :min_units",
            DriverKind::Mysql,
            &params(),
        )
        .unwrap();
        assert_eq!(bound.sql, r"SELECT 'it\'s :region' AS t WHERE x = ?");
        assert_eq!(bound.params, vec![json!(10)]);
    }

    #[test]
    fn test_postgres_dollar_quoted_strings_are_literal() {
        let bound = bind_named(
            "SELECT $$ literal :region $$, $tag$ :missing $tag$ WHERE r = :region",
            DriverKind::Postgresql,
            &params(),
        )
        .unwrap();
        assert_eq!(
            bound.sql,
            "SELECT $$ literal :region $$, $tag$ :missing $tag$ WHERE r = $1"
        );
        assert_eq!(bound.params, vec![json!("EMEA")]);

        let bound = bind_named("SELECT $$ :missing $$", DriverKind::Postgresql, &params()).unwrap();
        assert_eq!(bound.sql, "SELECT $$ :missing $$");
        assert!(bound.params.is_empty());
    }

    #[test]
    fn test_multiline_and_non_ascii_offsets() {
        let query = "SELECT 'é' AS accent,\n       name\n  FROM t\n WHERE région = :region\n   AND n > :min_units";
        let bound = bind_named(query, DriverKind::Postgresql, &params()).unwrap();
        assert_eq!(
            bound.sql,
            "SELECT 'é' AS accent,\n       name\n  FROM t\n WHERE région = $1\n   AND n > $2"
        );
    }

    #[test]
    fn test_missing_parameter() {
        let err = bind_named(
            "SELECT * FROM t WHERE a = :unknown",
            DriverKind::Sqlite,
            &params(),
        )
        .unwrap_err();
        match &err {
            BindError::MissingParameter { name } => assert_eq!(name, "unknown"),
            other => panic!("expected missing parameter, got {:?}", other),
        }
        assert!(err.to_string().contains(":unknown"));
    }

    #[test]
    fn test_unterminated_literal_is_tokenize_error() {
        let err = bind_named("SELECT 'open :region", DriverKind::Sqlite, &params()).unwrap_err();
        assert!(matches!(err, BindError::Tokenize { .. }));
    }

    #[test]
    fn test_query_without_placeholders_is_untouched() {
        let query = "SELECT '12:30' AS t, a[1:2] FROM x";
        let bound = bind_named(query, DriverKind::Postgresql, &Parameters::new()).unwrap();
        assert_eq!(bound.sql, query);
        assert!(bound.params.is_empty());
    }

    #[test]
    fn test_driver_styles() {
        assert_eq!(
            PlaceholderStyle::from(DriverKind::Postgresql),
            PlaceholderStyle::Numbered
        );
        assert_eq!(
            PlaceholderStyle::from(DriverKind::Mysql),
            PlaceholderStyle::Positional
        );
        assert_eq!(
            PlaceholderStyle::from(DriverKind::Sqlite),
            PlaceholderStyle::Positional
        );
    }
}
