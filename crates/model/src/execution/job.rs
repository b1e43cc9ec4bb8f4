use crate::{
    core::identifiers::{ConfigId, JobId},
    execution::configuration::MappingConfiguration,
    pagination::watermark::WatermarkBound,
    transform::{mapping::FieldMapping, rule::TransformationRule},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Stopped,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Stopped => "stopped",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Stopped
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the configuration a job executes, taken when the job is
/// created. Later configuration edits do not reach existing jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub source_connection: String,
    pub destination_connection: String,
    pub source_query: String,
    pub destination_index: String,
    pub field_mappings: Vec<FieldMapping>,
    pub transformation_rules: Vec<TransformationRule>,
    pub document_id_field: Option<String>,
    /// Source column that makes the page order unique.
    #[serde(default)]
    pub order_key: Option<String>,
    /// Present only for incremental jobs.
    pub watermark: Option<WatermarkBound>,
}

impl JobSpec {
    pub fn from_config(config: &MappingConfiguration, incremental: bool) -> Self {
        JobSpec {
            source_connection: config.source_connection.clone(),
            destination_connection: config.destination_connection.clone(),
            source_query: config.source_query.clone(),
            destination_index: config.destination_index.clone(),
            field_mappings: config.field_mappings.clone(),
            transformation_rules: config.transformation_rules.clone(),
            document_id_field: config.document_id_field.clone(),
            order_key: config.paging_key(),
            watermark: if incremental {
                config.watermark_bound()
            } else {
                None
            },
        }
    }
}

/// One attempt to execute a mapping configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationJob {
    pub id: JobId,
    pub config_id: ConfigId,
    pub status: JobStatus,
    pub incremental: bool,
    pub spec: JobSpec,

    /// Known once batches are planned; `None` when the source cannot count.
    pub total_records: Option<u64>,
    pub processed_records: u64,
    pub failed_records: u64,

    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl MigrationJob {
    pub fn new(config: &MappingConfiguration, incremental: bool) -> Self {
        MigrationJob {
            id: JobId::new(),
            config_id: config.id.clone(),
            status: JobStatus::Pending,
            incremental,
            spec: JobSpec::from_config(config, incremental),
            total_records: None,
            processed_records: 0,
            failed_records: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error_message: None,
        }
    }

    /// Processed share of the total in percent, saturating at 100.
    /// Reports 0 while the total is unknown or zero.
    pub fn progress_percentage(&self) -> f64 {
        match self.total_records {
            Some(total) if total > 0 => {
                (self.processed_records as f64 / total as f64 * 100.0).min(100.0)
            }
            _ => 0.0,
        }
    }

    /// A pending job that has never been started. Such a job may be handed
    /// out again instead of creating a duplicate.
    pub fn is_unstarted(&self) -> bool {
        self.status == JobStatus::Pending && self.started_at.is_none()
    }

    pub fn duration(&self) -> Option<chrono::Duration> {
        let start = self.started_at?;
        Some(self.completed_at.unwrap_or_else(Utc::now) - start)
    }
}
