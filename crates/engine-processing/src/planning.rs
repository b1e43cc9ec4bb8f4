use crate::error::PlanError;
use connectors::{ConnectorError, SourceQuery};
use model::pagination::{watermark::WatermarkBound, window::Window};
use planner::{BatchPlanner, ExtractQuery, PlanningError};
use tracing::{debug, info};

/// Effective query and extraction windows of one job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobPlan {
    pub query: ExtractQuery,
    /// `None` when the source cannot count the query.
    pub total: Option<u64>,
    pub windows: Vec<Window>,
}

/// Builds the job's effective query. Every page is ordered uniquely: by the
/// watermark and its tiebreaker, by `order_key`, or failing both by every
/// column the query projects.
pub async fn extract_query(
    source: &dyn SourceQuery,
    planner: &BatchPlanner,
    base_query: &str,
    watermark: Option<&WatermarkBound>,
    order_key: Option<&str>,
) -> Result<ExtractQuery, PlanError> {
    let dialect = source.dialect();
    let query = planner.extract_query(dialect, base_query, watermark, order_key)?;

    let keyed = order_key.is_some() || watermark.is_some_and(|b| b.tiebreaker.is_some());
    if keyed {
        return Ok(query);
    }

    let columns = source
        .describe(&query.render_schema_only(dialect))
        .await
        .map_err(|e| {
            if e.is_connection() {
                PlanError::Connection(e)
            } else {
                PlanError::Planning(PlanningError::Describe(e.to_string()))
            }
        })?;
    if columns.is_empty() {
        return Err(PlanningError::NoOrderColumns.into());
    }

    debug!(columns = columns.len(), "No unique key, ordering pages by every column");
    Ok(query.ordered_by_position(columns.len()))
}

/// Counts the effective query and splits it into windows.
pub async fn plan_job(
    source: &dyn SourceQuery,
    planner: &BatchPlanner,
    base_query: &str,
    watermark: Option<&WatermarkBound>,
    order_key: Option<&str>,
) -> Result<JobPlan, PlanError> {
    let query = extract_query(source, planner, base_query, watermark, order_key).await?;
    let total = source.count(&query).await.map_err(count_error)?;
    let windows = planner.windows(total);

    info!(
        total = ?total,
        windows = windows.len(),
        incremental = watermark.is_some(),
        "Planned job"
    );
    Ok(JobPlan {
        query,
        total,
        windows,
    })
}

fn count_error(err: ConnectorError) -> PlanError {
    if err.is_connection() {
        PlanError::Connection(err)
    } else {
        PlanError::Planning(PlanningError::Count(err.to_string()))
    }
}
