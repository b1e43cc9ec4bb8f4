#[cfg(test)]
mod tests {
    use crate::{
        ORDERS_QUERY, harness,
        mocks::{MockIndex, MockSource},
        order_rows, ts,
    };
    use connectors::ConnectorError;
    use engine_core::state::{ConfigRepository, JobRepository};
    use engine_runtime::MigrationError;
    use model::{
        core::{field_type::FieldType, value::Value},
        execution::{
            batch::{BatchStatus, MigrationBatch},
            configuration::MappingConfiguration,
            job::JobStatus,
        },
        pagination::{watermark::Watermark, window::Window},
        records::row::RowData,
        transform::{
            mapping::FieldMapping,
            rule::{RuleOp, TransformationRule},
        },
    };
    use std::sync::Arc;
    use tracing_test::traced_test;

    fn orders_config() -> MappingConfiguration {
        MappingConfiguration::new("orders", "pg", "search", ORDERS_QUERY, "orders")
            .with_id("orders")
            .with_mappings(vec![
                FieldMapping::new("id", "order_id", FieldType::Long).with_source_type("INTEGER"),
                FieldMapping::new("customer", "customer", FieldType::Keyword)
                    .with_source_type("VARCHAR(80)")
                    .with_transform("tidy"),
                FieldMapping::new("total", "total", FieldType::Double).with_source_type("NUMERIC(10,2)"),
                FieldMapping::new("updated_at", "updated_at", FieldType::Date)
                    .with_source_type("TIMESTAMP"),
            ])
            .with_rules(vec![TransformationRule::new("tidy", RuleOp::Trim)])
            .with_document_id("order_id")
    }

    fn statuses(batches: &[MigrationBatch]) -> Vec<BatchStatus> {
        batches.iter().map(|b| b.status).collect()
    }

    #[tokio::test]
    async fn full_run_loads_every_batch_in_order() {
        let source = Arc::new(MockSource::new(order_rows(1, 25)));
        let index = Arc::new(MockIndex::new());
        let (orch, store) = harness(source.clone(), index.clone(), 10);
        store.save_config(&orders_config()).await.unwrap();

        let job = orch
            .submit(&"orders".into(), None)
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.total_records, Some(25));
        assert_eq!(job.processed_records, 25);
        assert_eq!(job.failed_records, 0);
        assert_eq!(job.progress_percentage(), 100.0);
        assert!(job.started_at.is_some() && job.completed_at.is_some());

        let batches = orch.get_job_batches(&job.id).await.unwrap();
        assert_eq!(statuses(&batches), vec![BatchStatus::Completed; 3]);
        assert_eq!(
            batches.iter().map(|b| b.processed_records).collect::<Vec<_>>(),
            vec![10, 10, 5]
        );
        assert_eq!(
            source.windows(),
            vec![
                Window::bounded(0, 10),
                Window::bounded(10, 10),
                Window::bounded(20, 5)
            ]
        );

        assert_eq!(index.len(), 25);
        let doc = index
            .documents()
            .into_iter()
            .find(|d| d.id.as_deref() == Some("7"))
            .unwrap();
        assert_eq!(doc.get("customer"), Some(&Value::String("Customer 7".into())));
        assert_eq!(doc.get("total"), Some(&Value::Float(70.5)));
        assert_eq!(doc.get("updated_at"), Some(&Value::Timestamp(ts(7))));
    }

    #[tokio::test]
    async fn one_failing_batch_does_not_stall_the_run() {
        let source = Arc::new(MockSource::new(order_rows(1, 25)));
        source.fail_at(10, ConnectorError::Query("relation \"orders\" is locked".into()));
        let index = Arc::new(MockIndex::new());
        let (orch, store) = harness(source, index.clone(), 10);
        store.save_config(&orders_config()).await.unwrap();

        let job = orch
            .submit(&"orders".into(), None)
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.processed_records, 15);
        assert_eq!(job.failed_records, 10);
        assert!(job.processed_records + job.failed_records <= job.total_records.unwrap());
        assert!(job.error_message.as_deref().unwrap().starts_with("batch 1:"));

        let batches = orch.get_job_batches(&job.id).await.unwrap();
        assert_eq!(
            statuses(&batches),
            vec![BatchStatus::Completed, BatchStatus::Failed, BatchStatus::Completed]
        );
        assert!(batches[1].error_message.as_deref().unwrap().contains("locked"));
        assert_eq!(index.len(), 15);
    }

    #[tokio::test]
    async fn retry_reruns_only_unfinished_batches() {
        let source = Arc::new(MockSource::new(order_rows(1, 25)));
        source.fail_at(10, ConnectorError::Query("deadlock detected".into()));
        let index = Arc::new(MockIndex::new());
        let (orch, store) = harness(source.clone(), index.clone(), 10);
        store.save_config(&orders_config()).await.unwrap();

        let failed = orch
            .submit(&"orders".into(), None)
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();
        assert_eq!(failed.status, JobStatus::Failed);

        let retried = orch.retry_migration(&failed.id).await.unwrap();
        assert_eq!(retried.status, JobStatus::Pending);
        assert_eq!(retried.processed_records, 15);
        assert_eq!(retried.failed_records, 0);
        assert!(retried.error_message.is_none());

        let batches = orch.get_job_batches(&failed.id).await.unwrap();
        assert_eq!(
            statuses(&batches),
            vec![BatchStatus::Completed, BatchStatus::Pending, BatchStatus::Completed]
        );

        let done = orch
            .start_migration(&failed.id)
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.processed_records, 25);
        assert_eq!(index.len(), 25);

        let offsets: Vec<u64> = source.windows().iter().map(|w| w.offset).collect();
        assert_eq!(offsets, vec![0, 10, 20, 10]);
    }

    #[tokio::test]
    #[traced_test]
    async fn stop_halts_before_the_next_batch() {
        let source = Arc::new(MockSource::new(order_rows(1, 25)));
        let gate = source.gate_at(10);
        let index = Arc::new(MockIndex::new());
        let (orch, store) = harness(source, index, 10);
        store.save_config(&orders_config()).await.unwrap();

        let running = orch.submit(&"orders".into(), None).await.unwrap();
        gate.entered.notified().await;

        let snapshot = orch.stop_migration(&running.job_id()).await.unwrap();
        assert_eq!(snapshot.status, JobStatus::Running);
        assert!(logs_contain("Stop requested"));
        gate.release.notify_one();

        let job = running.wait().await.unwrap();
        assert_eq!(job.status, JobStatus::Stopped);
        assert_eq!(job.processed_records, 20);

        let batches = orch.get_job_batches(&job.id).await.unwrap();
        assert_eq!(
            statuses(&batches),
            vec![BatchStatus::Completed, BatchStatus::Completed, BatchStatus::Pending]
        );

        orch.retry_migration(&job.id).await.unwrap();
        let resumed = orch
            .start_migration(&job.id)
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();
        assert_eq!(resumed.status, JobStatus::Completed);
        assert_eq!(resumed.processed_records, 25);
    }

    #[tokio::test]
    async fn second_run_of_a_configuration_conflicts() {
        let source = Arc::new(MockSource::new(order_rows(1, 25)));
        let gate = source.gate_at(0);
        let (orch, store) = harness(source, Arc::new(MockIndex::new()), 10);
        store.save_config(&orders_config()).await.unwrap();

        let first = orch.submit(&"orders".into(), None).await.unwrap();
        gate.entered.notified().await;

        let second = orch.create_job(&"orders".into(), None).await.unwrap();
        assert_ne!(second.id, first.job_id());

        let err = orch.start_migration(&second.id).await.unwrap_err();
        assert!(matches!(err, MigrationError::Conflict { job_id, .. } if job_id == first.job_id()));
        assert_eq!(
            orch.get_job(&second.id).await.unwrap().status,
            JobStatus::Pending
        );

        gate.release.notify_one();
        assert_eq!(first.wait().await.unwrap().status, JobStatus::Completed);

        let job = orch
            .start_migration(&second.id)
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[tokio::test]
    #[traced_test]
    async fn create_job_is_idempotent_until_started() {
        let (orch, store) = harness(
            Arc::new(MockSource::new(order_rows(1, 5))),
            Arc::new(MockIndex::new()),
            10,
        );
        store.save_config(&orders_config()).await.unwrap();

        let a = orch.create_job(&"orders".into(), None).await.unwrap();
        let b = orch.create_job(&"orders".into(), None).await.unwrap();
        assert_eq!(a.id, b.id);
        assert!(logs_contain("Reusing pending job"));

        let mut changed = orders_config();
        changed.destination_index = "orders_v2".into();
        store.save_config(&changed).await.unwrap();
        let c = orch.create_job(&"orders".into(), None).await.unwrap();
        assert_ne!(a.id, c.id);
        assert_eq!(c.spec.destination_index, "orders_v2");
        assert_eq!(
            orch.get_job(&a.id).await.unwrap().spec.destination_index,
            "orders"
        );
        assert_eq!(orch.list_jobs().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn incremental_watermark_advances_only_on_success() {
        let source = Arc::new(MockSource::new(order_rows(1, 25)));
        let index = Arc::new(MockIndex::new());
        let (orch, store) = harness(source.clone(), index, 10);
        store
            .save_config(&orders_config().with_watermark("updated_at", Some("id".into())))
            .await
            .unwrap();

        let first = orch
            .submit(&"orders".into(), None)
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();
        assert!(first.incremental);
        assert_eq!(first.status, JobStatus::Completed);
        assert!(source.queries()[0].filter.is_none());

        let reached = Watermark::with_key(Value::Timestamp(ts(25)), Value::Int(25));
        let config = orch.get_configuration(&"orders".into()).await.unwrap();
        assert_eq!(config.last_watermark, Some(reached.clone()));
        assert!(config.last_sync_time.is_some());

        // The next run starts from the stored watermark and one of its
        // batches fails, so the watermark must stay put.
        source.replace_rows(order_rows(26, 15));
        source.fail_at(10, ConnectorError::Query("canceling statement".into()));
        let second = orch
            .submit(&"orders".into(), None)
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();
        assert_eq!(second.status, JobStatus::Failed);
        assert_eq!(second.spec.watermark.as_ref().unwrap().last, Some(reached.clone()));
        let filter = source.queries().last().unwrap().filter.clone().unwrap();
        assert!(filter.contains("updated_at") && filter.contains("id"));

        let config = orch.get_configuration(&"orders".into()).await.unwrap();
        assert_eq!(config.last_watermark, Some(reached));

        orch.retry_migration(&second.id).await.unwrap();
        let third = orch
            .start_migration(&second.id)
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();
        assert_eq!(third.status, JobStatus::Completed);
        let config = orch.get_configuration(&"orders".into()).await.unwrap();
        assert_eq!(
            config.last_watermark,
            Some(Watermark::with_key(Value::Timestamp(ts(40)), Value::Int(40)))
        );
    }

    #[tokio::test]
    async fn retried_stale_job_keeps_newer_watermark() {
        let source = Arc::new(MockSource::new(order_rows(1, 25)));
        let (orch, store) = harness(source.clone(), Arc::new(MockIndex::new()), 10);
        store
            .save_config(&orders_config().with_watermark("updated_at", Some("id".into())))
            .await
            .unwrap();
        orch.submit(&"orders".into(), None)
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();

        // A stops halfway through rows 26..=40.
        source.replace_rows(order_rows(26, 15));
        source.fail_at(10, ConnectorError::Query("canceling statement".into()));
        let stale = orch
            .submit(&"orders".into(), None)
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();
        assert_eq!(stale.status, JobStatus::Failed);

        // B starts from the same watermark and gets through all of them.
        let newer = orch
            .submit(&"orders".into(), None)
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();
        assert_ne!(newer.id, stale.id);
        assert_eq!(newer.status, JobStatus::Completed);
        let reached = Watermark::with_key(Value::Timestamp(ts(40)), Value::Int(40));
        let config = orch.get_configuration(&"orders".into()).await.unwrap();
        assert_eq!(config.last_watermark, Some(reached.clone()));

        // Retrying A now only reaches row 37.
        source.replace_rows(order_rows(26, 12));
        orch.retry_migration(&stale.id).await.unwrap();
        let retried = orch
            .start_migration(&stale.id)
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();
        assert_eq!(retried.status, JobStatus::Completed);

        let config = orch.get_configuration(&"orders".into()).await.unwrap();
        assert_eq!(config.last_watermark, Some(reached));
    }

    #[tokio::test]
    async fn full_run_of_incremental_config_keeps_watermark() {
        let source = Arc::new(MockSource::new(order_rows(1, 5)));
        let (orch, store) = harness(source.clone(), Arc::new(MockIndex::new()), 10);
        store
            .save_config(&orders_config().with_watermark("updated_at", None))
            .await
            .unwrap();

        let job = orch
            .submit(&"orders".into(), Some(false))
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();
        assert!(!job.incremental);
        assert_eq!(source.queries()[0].order_by, vec!["id".to_string()]);
        let config = orch.get_configuration(&"orders".into()).await.unwrap();
        assert!(config.last_watermark.is_none());
    }

    #[tokio::test]
    async fn every_page_has_a_unique_order() {
        let source = Arc::new(MockSource::new(order_rows(1, 25)));
        let (orch, store) = harness(source.clone(), Arc::new(MockIndex::new()), 10);
        store
            .save_config(&orders_config().with_watermark("updated_at", None))
            .await
            .unwrap();
        let mut keyless = orders_config().with_id("keyless");
        keyless.document_id_field = None;
        store.save_config(&keyless).await.unwrap();

        orch.submit(&"orders".into(), Some(true))
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();
        let incremental = source.queries();
        assert_eq!(incremental.len(), 3);
        for q in &incremental {
            assert_eq!(q.order_by, vec!["updated_at".to_string(), "id".to_string()]);
        }

        let job = orch
            .submit(&"keyless".into(), None)
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        let full = &source.queries()[incremental.len()..];
        assert_eq!(full.len(), 3);
        for q in full {
            assert_eq!(q.order_by, vec!["1", "2", "3", "4"]);
        }
    }

    #[tokio::test]
    async fn unknown_total_is_paged_until_a_short_page() {
        let source = Arc::new(MockSource::new(order_rows(1, 25)).uncountable());
        let index = Arc::new(MockIndex::new());
        let (orch, store) = harness(source.clone(), index.clone(), 10);
        store.save_config(&orders_config()).await.unwrap();

        let job = orch
            .submit(&"orders".into(), None)
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.total_records, Some(25));
        let batches = orch.get_job_batches(&job.id).await.unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].window(), Window::open(0));
        assert_eq!(batches[0].processed_records, 25);
        assert_eq!(
            source.windows(),
            vec![
                Window::bounded(0, 10),
                Window::bounded(10, 10),
                Window::bounded(20, 10)
            ]
        );
        assert_eq!(index.len(), 25);
    }

    #[tokio::test]
    async fn unknown_total_with_exact_multiple_ends_on_empty_page() {
        let source = Arc::new(MockSource::new(order_rows(1, 20)).uncountable());
        let (orch, store) = harness(source.clone(), Arc::new(MockIndex::new()), 10);
        store.save_config(&orders_config()).await.unwrap();

        let job = orch
            .submit(&"orders".into(), None)
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();
        assert_eq!(job.processed_records, 20);
        assert_eq!(source.windows().len(), 3);
    }

    #[tokio::test]
    async fn preview_writes_nothing() {
        let source = Arc::new(MockSource::new(order_rows(1, 25)));
        let index = Arc::new(MockIndex::new());
        let (orch, store) = harness(source.clone(), index.clone(), 10);
        let config = orders_config();

        let docs = orch.preview_migration(&config, 3).await.unwrap();
        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0].id.as_deref(), Some("1"));
        assert_eq!(docs[2].get("customer"), Some(&Value::String("Customer 3".into())));
        assert_eq!(source.windows(), vec![Window::bounded(0, 3)]);

        assert!(orch.preview_migration(&config, 0).await.unwrap().is_empty());
        assert!(store.list_jobs().await.unwrap().is_empty());
        assert!(store.list_configs().await.unwrap().is_empty());
        assert_eq!(index.bulk_calls(), 0);
    }

    #[tokio::test]
    async fn lost_destination_aborts_the_job() {
        let source = Arc::new(MockSource::new(order_rows(1, 25)));
        let index = Arc::new(MockIndex::new());
        index.fail_call(1, ConnectorError::Connection("connection reset by peer".into()));
        let (orch, store) = harness(source, index, 10);
        store.save_config(&orders_config()).await.unwrap();

        let job = orch
            .submit(&"orders".into(), None)
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();

        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.processed_records, 10);
        assert!(job.error_message.unwrap().contains("connection reset"));
        let batches = orch.get_job_batches(&job.id).await.unwrap();
        assert_eq!(
            statuses(&batches),
            vec![BatchStatus::Completed, BatchStatus::Failed, BatchStatus::Pending]
        );
    }

    #[tokio::test]
    async fn unreachable_destination_fails_before_planning() {
        let (orch, store) = harness(
            Arc::new(MockSource::new(order_rows(1, 5))),
            Arc::new(MockIndex::unreachable()),
            10,
        );
        store.save_config(&orders_config()).await.unwrap();

        let job = orch
            .submit(&"orders".into(), None)
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.total_records.is_none());
        assert!(orch.get_job_batches(&job.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn bad_value_fails_only_its_batch() {
        let mut rows = order_rows(1, 25);
        rows[12] = RowData::from_iter([
            ("id", Value::Int(13)),
            ("customer", Value::String("Customer 13".into())),
            ("total", Value::String("n/a".into())),
            ("updated_at", Value::Timestamp(ts(13))),
        ]);
        let (orch, store) = harness(
            Arc::new(MockSource::new(rows)),
            Arc::new(MockIndex::new()),
            10,
        );
        store.save_config(&orders_config()).await.unwrap();

        let job = orch
            .submit(&"orders".into(), None)
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.processed_records, 15);
        assert_eq!(job.failed_records, 10);
        let batches = orch.get_job_batches(&job.id).await.unwrap();
        assert!(batches[1].error_message.as_deref().unwrap().contains("total"));
    }

    #[tokio::test]
    async fn unknown_rule_aborts_before_planning() {
        let source = Arc::new(MockSource::new(order_rows(1, 5)));
        let (orch, store) = harness(source.clone(), Arc::new(MockIndex::new()), 10);
        let mut config = orders_config();
        config.field_mappings[0].transform_id = Some("missing-rule".into());
        store.save_config(&config).await.unwrap();

        let job = orch
            .submit(&"orders".into(), None)
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.error_message.unwrap().contains("missing-rule"));
        assert!(source.windows().is_empty());
    }

    #[tokio::test]
    async fn empty_source_completes_without_batches() {
        let (orch, store) = harness(
            Arc::new(MockSource::new(Vec::new())),
            Arc::new(MockIndex::new()),
            10,
        );
        store.save_config(&orders_config()).await.unwrap();

        let job = orch
            .submit(&"orders".into(), None)
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.total_records, Some(0));
        assert_eq!(job.progress_percentage(), 0.0);
    }

    #[tokio::test]
    async fn clearing_removes_only_completed_jobs() {
        let source = Arc::new(MockSource::new(order_rows(1, 5)));
        let (orch, store) = harness(source.clone(), Arc::new(MockIndex::new()), 10);
        store.save_config(&orders_config()).await.unwrap();

        let done = orch
            .submit(&"orders".into(), None)
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();
        source.fail_at(0, ConnectorError::Query("boom".into()));
        let failed = orch
            .submit(&"orders".into(), None)
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();
        assert_eq!(failed.status, JobStatus::Failed);

        assert_eq!(orch.clear_completed_jobs().await.unwrap(), 1);
        assert!(matches!(
            orch.get_job(&done.id).await,
            Err(MigrationError::JobNotFound(_))
        ));
        assert_eq!(orch.list_jobs().await.unwrap().len(), 1);
        assert_eq!(orch.failed_batches(&failed.id).await.unwrap().len(), 1);

        let progress = orch.job_progress(&failed.id).await.unwrap();
        assert_eq!(progress.batches_failed, 1);
        assert_eq!(progress.status, JobStatus::Failed);
    }
}
