//! Defines the `Dialect` trait for database-specific SQL syntax.

use chrono::SecondsFormat;
use model::{core::value::Value, pagination::window::Window};

pub trait Dialect: Send + Sync {
    /// Returns the name of the dialect (e.g., "PostgreSQL", "Oracle").
    fn name(&self) -> &'static str;

    /// Wraps an identifier in the dialect's quotation marks.
    fn quote_identifier(&self, ident: &str) -> String {
        format!(r#""{}""#, ident.replace('"', "\"\""))
    }

    /// Renders a column reference. Plain identifiers are left unquoted so the
    /// database applies its usual case folding; anything else is quoted.
    fn column_ref(&self, name: &str) -> String {
        let mut chars = name.chars();
        let simple = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
        if simple {
            name.to_string()
        } else {
            self.quote_identifier(name)
        }
    }

    /// Wraps a query so it can be used as a derived table named `alias`.
    fn derived_table(&self, query: &str, alias: &str) -> String;

    /// A form of `query` that returns its result shape and no rows.
    fn schema_only(&self, query: &str) -> String;

    /// The pagination clause appended after any `ORDER BY`.
    fn page_clause(&self, window: &Window) -> String;

    fn boolean_literal(&self, value: bool) -> String;

    fn timestamp_literal(&self, ts: &chrono::DateTime<chrono::Utc>) -> String;

    /// Renders a value as an inline SQL literal. Returns `None` for values
    /// that have no sensible literal form (binary, JSON, NaN).
    fn render_literal(&self, value: &Value) -> Option<String> {
        match value {
            Value::Int(v) => Some(v.to_string()),
            Value::Float(v) if v.is_finite() => Some(format!("{v:?}")),
            Value::Float(_) => None,
            Value::String(s) => Some(format!("'{}'", s.replace('\'', "''"))),
            Value::Boolean(b) => Some(self.boolean_literal(*b)),
            Value::Date(d) => Some(format!("DATE '{}'", d.format("%Y-%m-%d"))),
            Value::Timestamp(ts) => Some(self.timestamp_literal(ts)),
            Value::Bytes(_) | Value::Json(_) | Value::Null => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Postgres;

impl Dialect for Postgres {
    fn name(&self) -> &'static str {
        "PostgreSQL"
    }

    fn derived_table(&self, query: &str, alias: &str) -> String {
        format!("({query}) AS {alias}")
    }

    fn schema_only(&self, query: &str) -> String {
        format!("SELECT * FROM {} LIMIT 0", self.derived_table(query, "src"))
    }

    fn page_clause(&self, window: &Window) -> String {
        match window.limit {
            Some(limit) => format!("LIMIT {limit} OFFSET {}", window.offset),
            None => format!("OFFSET {}", window.offset),
        }
    }

    fn boolean_literal(&self, value: bool) -> String {
        if value { "TRUE".into() } else { "FALSE".into() }
    }

    fn timestamp_literal(&self, ts: &chrono::DateTime<chrono::Utc>) -> String {
        format!(
            "TIMESTAMPTZ '{}'",
            ts.to_rfc3339_opts(SecondsFormat::Micros, false)
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct Oracle;

impl Dialect for Oracle {
    fn name(&self) -> &'static str {
        "Oracle"
    }

    fn derived_table(&self, query: &str, alias: &str) -> String {
        // Oracle rejects `AS` before a table alias.
        format!("({query}) {alias}")
    }

    fn schema_only(&self, query: &str) -> String {
        format!(
            "SELECT * FROM {} WHERE ROWNUM = 0",
            self.derived_table(query, "src")
        )
    }

    fn page_clause(&self, window: &Window) -> String {
        match window.limit {
            Some(limit) => format!(
                "OFFSET {} ROWS FETCH NEXT {limit} ROWS ONLY",
                window.offset
            ),
            None => format!("OFFSET {} ROWS", window.offset),
        }
    }

    fn boolean_literal(&self, value: bool) -> String {
        if value { "1".into() } else { "0".into() }
    }

    fn timestamp_literal(&self, ts: &chrono::DateTime<chrono::Utc>) -> String {
        format!("TIMESTAMP '{}'", ts.format("%Y-%m-%d %H:%M:%S%.6f"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};

    #[test]
    fn renders_schema_only_queries() {
        assert_eq!(
            Postgres.schema_only("SELECT id FROM t"),
            "SELECT * FROM (SELECT id FROM t) AS src LIMIT 0"
        );
        assert_eq!(
            Oracle.schema_only("SELECT id FROM t"),
            "SELECT * FROM (SELECT id FROM t) src WHERE ROWNUM = 0"
        );
    }

    #[test]
    fn renders_page_clauses() {
        assert_eq!(
            Postgres.page_clause(&Window::bounded(20, 10)),
            "LIMIT 10 OFFSET 20"
        );
        assert_eq!(Postgres.page_clause(&Window::open(0)), "OFFSET 0");
        assert_eq!(
            Oracle.page_clause(&Window::bounded(20, 10)),
            "OFFSET 20 ROWS FETCH NEXT 10 ROWS ONLY"
        );
    }

    #[test]
    fn renders_literals() {
        assert_eq!(
            Postgres.render_literal(&Value::String("O'Brien".into())),
            Some("'O''Brien'".into())
        );
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        assert_eq!(
            Postgres.render_literal(&Value::Timestamp(ts)),
            Some("TIMESTAMPTZ '2024-03-01T10:00:00.000000+00:00'".into())
        );
        assert_eq!(
            Oracle.render_literal(&Value::Timestamp(ts)),
            Some("TIMESTAMP '2024-03-01 10:00:00.000000'".into())
        );
        let d = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert_eq!(
            Oracle.render_literal(&Value::Date(d)),
            Some("DATE '2024-01-02'".into())
        );
        assert_eq!(Oracle.render_literal(&Value::Boolean(true)), Some("1".into()));
        assert_eq!(Postgres.render_literal(&Value::Bytes(vec![1])), None);
        assert_eq!(Postgres.render_literal(&Value::Float(f64::NAN)), None);
    }

    #[test]
    fn quotes_only_unusual_identifiers() {
        assert_eq!(Postgres.column_ref("updated_at"), "updated_at");
        assert_eq!(Postgres.column_ref("Last Modified"), "\"Last Modified\"");
    }
}
