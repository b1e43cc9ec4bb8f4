use crate::{error::PlanningError, query::dialect::Dialect};
use model::pagination::{
    watermark::{Watermark, WatermarkBound},
    window::Window,
};

const SOURCE_ALIAS: &str = "src";

/// The effective extraction query of a job: the configured base query,
/// optionally narrowed by a watermark predicate and ordered for paging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractQuery {
    pub base: String,
    pub filter: Option<String>,
    pub order_by: Vec<String>,
}

impl ExtractQuery {
    pub fn new(base: &str) -> Result<Self, PlanningError> {
        let base = base.trim().trim_end_matches(';').trim_end();
        if base.is_empty() {
            return Err(PlanningError::EmptyQuery);
        }
        Ok(ExtractQuery {
            base: base.to_string(),
            filter: None,
            order_by: Vec::new(),
        })
    }

    /// Builds the incremental form of `base`.
    ///
    /// Without a tiebreaker the predicate is the strict `col > last`. With a
    /// tiebreaker key and a stored key the predicate becomes
    /// `(col > v) OR (col = v AND key > k)` so rows sharing the boundary
    /// value are neither skipped nor reloaded. On the first run there is no
    /// predicate but rows are still ordered by the watermark.
    pub fn incremental(
        base: &str,
        bound: &WatermarkBound,
        dialect: &dyn Dialect,
    ) -> Result<Self, PlanningError> {
        let mut query = Self::new(base)?;

        let col = dialect.column_ref(&bound.column);
        let key = bound.tiebreaker.as_deref().map(|k| dialect.column_ref(k));

        query.order_by.push(col.clone());
        if let Some(key) = &key {
            query.order_by.push(key.clone());
        }

        if let Some(last) = &bound.last {
            query.filter = Some(Self::watermark_predicate(
                dialect,
                bound,
                &col,
                key.as_deref(),
                last,
            )?);
        }

        Ok(query)
    }

    /// Appends `key` to the ordering unless it is already there.
    pub fn ordered_by_key(mut self, key: &str, dialect: &dyn Dialect) -> Self {
        let key = dialect.column_ref(key);
        if !self.order_by.contains(&key) {
            self.order_by.push(key);
        }
        self
    }

    /// Orders by every projected column, by position. Used when no unique
    /// key is known, so OFFSET paging still sees a stable row order.
    pub fn ordered_by_position(mut self, columns: usize) -> Self {
        self.order_by.extend((1..=columns).map(|pos| pos.to_string()));
        self
    }

    fn watermark_predicate(
        dialect: &dyn Dialect,
        bound: &WatermarkBound,
        col: &str,
        key: Option<&str>,
        last: &Watermark,
    ) -> Result<String, PlanningError> {
        let value = dialect.render_literal(&last.value).ok_or_else(|| {
            PlanningError::UnsupportedWatermarkValue {
                column: bound.column.clone(),
                kind: last.value.kind(),
            }
        })?;

        match (key, &last.key) {
            (Some(key), Some(last_key)) => {
                let key_value = dialect.render_literal(last_key).ok_or_else(|| {
                    PlanningError::UnsupportedWatermarkValue {
                        column: bound.tiebreaker.clone().unwrap_or_default(),
                        kind: last_key.kind(),
                    }
                })?;
                Ok(format!(
                    "({col} > {value}) OR ({col} = {value} AND {key} > {key_value})"
                ))
            }
            _ => Ok(format!("{col} > {value}")),
        }
    }

    fn render_body(&self, dialect: &dyn Dialect, ordered: bool) -> String {
        let mut sql = format!(
            "SELECT * FROM {}",
            dialect.derived_table(&self.base, SOURCE_ALIAS)
        );
        if let Some(filter) = &self.filter {
            sql.push_str(" WHERE ");
            sql.push_str(filter);
        }
        if ordered && !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_by.join(", "));
        }
        sql
    }

    /// The query for one extraction window.
    pub fn render_window(&self, dialect: &dyn Dialect, window: &Window) -> String {
        format!(
            "{} {}",
            self.render_body(dialect, true),
            dialect.page_clause(window)
        )
    }

    /// The whole effective query, unpaged.
    pub fn render(&self, dialect: &dyn Dialect) -> String {
        if self.filter.is_none() && self.order_by.is_empty() {
            return self.base.clone();
        }
        self.render_body(dialect, true)
    }

    pub fn render_count(&self, dialect: &dyn Dialect) -> String {
        format!(
            "SELECT COUNT(*) FROM {}",
            dialect.derived_table(&self.render_body(dialect, false), "cnt")
        )
    }

    pub fn render_schema_only(&self, dialect: &dyn Dialect) -> String {
        dialect.schema_only(&self.base)
    }
}
