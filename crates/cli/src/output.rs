use crate::error::CliError;
use connectors::metadata::TableInfo;
use engine_config::{
    mapping::{auto::AutoMapping, issue::ValidationReport},
    schema::{ColumnDescriptor, QueryAnalysis},
};
use engine_core::progress::JobProgress;
use model::{
    execution::{batch::MigrationBatch, configuration::MappingConfiguration, job::MigrationJob},
    pagination::watermark::Watermark,
    records::document::Document,
};
use serde::Serialize;
use std::fmt::Display;

/// Renders command results either as pretty JSON or as plain tables.
#[derive(Debug, Clone, Copy)]
pub struct Printer {
    pub json: bool,
}

impl Printer {
    pub fn emit<T, F>(&self, value: &T, table: F) -> Result<(), CliError>
    where
        T: Serialize + ?Sized,
        F: FnOnce(&T),
    {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            table(value);
        }
        Ok(())
    }
}

fn opt<T: Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

fn watermark(mark: Option<&Watermark>) -> String {
    match mark {
        Some(Watermark {
            value,
            key: Some(key),
        }) => format!("{value} / {key}"),
        Some(Watermark { value, key: None }) => value.to_string(),
        None => "-".to_string(),
    }
}

pub fn tables(tables: &[TableInfo]) {
    println!("{:<40} {:>14}  {}", "TABLE", "EST. ROWS", "LAST ANALYZED");
    for t in tables {
        let name = match &t.schema {
            Some(schema) => format!("{schema}.{}", t.name),
            None => t.name.clone(),
        };
        println!(
            "{:<40} {:>14}  {}",
            name,
            opt(t.estimated_row_count),
            opt(t.last_analyzed.map(|ts| ts.to_rfc3339()))
        );
    }
}

pub fn columns(columns: &[ColumnDescriptor]) {
    println!(
        "{:<30} {:<28} {:<10} {:<8} {}",
        "COLUMN", "SOURCE TYPE", "FIELD", "NULL", "DEFAULT"
    );
    for c in columns {
        println!(
            "{:<30} {:<28} {:<10} {:<8} {}",
            c.name,
            c.source_type,
            c.destination_type,
            if c.nullable { "yes" } else { "no" },
            c.default.as_deref().unwrap_or("-")
        );
    }
}

pub fn analysis(analysis: &QueryAnalysis) {
    println!("Query type: {:?}", analysis.query_type);
    println!();
    println!("{:<30} {:<24} {:<10} {}", "FIELD", "SOURCE TYPE", "TYPE", "FROM");
    for c in &analysis.columns {
        println!(
            "{:<30} {:<24} {:<10} {}",
            c.field, c.source_type, c.destination_type, c.provenance
        );
    }
    if !analysis.joins.is_empty() {
        println!();
        for j in &analysis.joins {
            println!(
                "{} {}{} ON {}",
                j.kind,
                j.table,
                j.alias.as_deref().map(|a| format!(" {a}")).unwrap_or_default(),
                j.condition.as_deref().unwrap_or("-")
            );
        }
    }
}

pub fn auto_mapping(mapping: &AutoMapping) {
    println!("Index: {}", mapping.destination_index);
    println!();
    println!("{:<30} {:<30} {:<10} {}", "SOURCE", "DESTINATION", "TYPE", "SOURCE TYPE");
    for m in &mapping.suggested_mappings {
        println!(
            "{:<30} {:<30} {:<10} {}",
            m.source_field,
            m.destination_field,
            m.destination_type,
            opt(m.source_type.as_ref())
        );
    }
}

pub fn report(report: &ValidationReport) {
    println!("{}", if report.valid { "Valid" } else { "Invalid" });
    for (label, issues) in [("error", &report.errors), ("warning", &report.warnings)] {
        for issue in issues {
            print!("  {label} [{}] {}: {}", issue.code, issue.field, issue.reason);
            match &issue.suggestion {
                Some(hint) => println!(" ({hint})"),
                None => println!(),
            }
        }
    }
}

pub fn configs(configs: &[MappingConfiguration]) {
    println!(
        "{:<38} {:<24} {:<20} {:<7} {}",
        "ID", "NAME", "INDEX", "ACTIVE", "WATERMARK"
    );
    for c in configs {
        println!(
            "{:<38} {:<24} {:<20} {:<7} {}",
            c.id,
            c.name,
            c.destination_index,
            c.is_active,
            watermark(c.last_watermark.as_ref())
        );
    }
}

pub fn jobs(jobs: &[MigrationJob]) {
    println!(
        "{:<38} {:<24} {:<10} {:>10} {:>8} {:>7}  {}",
        "JOB", "CONFIG", "STATUS", "PROCESSED", "FAILED", "%", "CREATED"
    );
    for j in jobs {
        println!(
            "{:<38} {:<24} {:<10} {:>10} {:>8} {:>6.1}%  {}",
            j.id,
            j.config_id,
            j.status,
            j.processed_records,
            j.failed_records,
            j.progress_percentage(),
            j.created_at.to_rfc3339()
        );
    }
}

pub fn progress(p: &JobProgress) {
    println!("{:<16} {}", "Job", p.job_id);
    println!("{:<16} {}", "Status", p.status);
    println!("{:<16} {}", "Stage", p.stage);
    println!(
        "{:<16} {} / {} ({:.1}%)",
        "Records",
        p.processed_records,
        opt(p.total_records),
        p.percentage
    );
    println!("{:<16} {}", "Failed records", p.failed_records);
    println!(
        "{:<16} {} total, {} completed, {} failed, {} pending",
        "Batches", p.batches_total, p.batches_completed, p.batches_failed, p.batches_pending
    );
    println!("{:<16} {}", "Current batch", opt(p.current_batch));
    println!("{:<16} {}", "Started", opt(p.started_at.map(|ts| ts.to_rfc3339())));
    println!("{:<16} {}", "Elapsed (s)", opt(p.elapsed_secs));
    if let Some(msg) = &p.error_message {
        println!("{:<16} {}", "Error", msg);
    }
}

pub fn batches(batches: &[MigrationBatch]) {
    println!(
        "{:>5} {:<16} {:<10} {:>10}  {:<24} {}",
        "SEQ", "WINDOW", "STATUS", "ROWS", "WATERMARK", "ERROR"
    );
    for b in batches {
        println!(
            "{:>5} {:<16} {:<10} {:>10}  {:<24} {}",
            b.seq,
            b.window().to_string(),
            b.status,
            b.processed_records,
            watermark(b.max_watermark.as_ref()),
            b.error_message.as_deref().unwrap_or("")
        );
    }
}

pub fn documents(docs: &[Document]) {
    for (i, doc) in docs.iter().enumerate() {
        println!("#{} id={}", i + 1, opt(doc.id.as_ref()));
        for field in &doc.fields {
            println!("  {:<30} {}", field.name, field.value);
        }
    }
}
