use crate::TEST_PG_URL;
use tokio_postgres::NoTls;

/// Recreates the `ferry_orders` fixture table.
async fn reset_orders_table() {
    let (client, connection) = tokio_postgres::connect(TEST_PG_URL, NoTls)
        .await
        .expect("connect postgres");
    tokio::spawn(connection);

    client
        .batch_execute(
            r#"
            DROP TABLE IF EXISTS ferry_orders;
            CREATE TABLE ferry_orders (
                id BIGINT PRIMARY KEY,
                customer VARCHAR(80) NOT NULL,
                total NUMERIC(10,2),
                paid BOOLEAN NOT NULL DEFAULT false,
                updated_at TIMESTAMPTZ NOT NULL
            );
            INSERT INTO ferry_orders (id, customer, total, paid, updated_at)
            SELECT g, 'customer ' || g, g * 1.25, g % 2 = 0, now() - (g || ' minutes')::interval
            FROM generate_series(1, 120) AS g;
            ANALYZE ferry_orders;
            "#,
        )
        .await
        .expect("create ferry_orders");
}

#[cfg(test)]
mod tests {
    use super::reset_orders_table;
    use crate::{TEST_ES_URL, TEST_PG_URL};
    use connectors::sql::postgres::PgSource;
    use engine_config::{EngineSettings, SchemaIntrospector, schema::QueryType};
    use engine_core::state::{ConfigRepository, StateStore, sled_store::SledStateStore};
    use engine_runtime::{Orchestrator, RunOptions, SettingsConnectorFactory};
    use model::{
        core::field_type::FieldType, execution::configuration::MappingConfiguration,
        execution::job::JobStatus,
    };
    use std::sync::Arc;
    use tempfile::tempdir;
    use tracing_test::traced_test;

    #[tokio::test]
    #[traced_test]
    #[ignore = "requires a local postgres"]
    async fn introspects_a_live_table() {
        reset_orders_table().await;
        let source = PgSource::connect(TEST_PG_URL).await.unwrap();
        let introspector = SchemaIntrospector::new(Arc::new(source));
        introspector.test_connection().await.unwrap();

        let tables = introspector.list_tables().await.unwrap();
        assert!(tables.iter().any(|t| t.name == "ferry_orders"));

        let columns = introspector.list_columns("public.ferry_orders").await.unwrap();
        let types: Vec<(&str, &FieldType)> = columns
            .iter()
            .map(|c| (c.name.as_str(), &c.destination_type))
            .collect();
        assert_eq!(
            types,
            vec![
                ("id", &FieldType::Long),
                ("customer", &FieldType::Text),
                ("total", &FieldType::Double),
                ("paid", &FieldType::Boolean),
                ("updated_at", &FieldType::Date),
            ]
        );
        assert_eq!(columns[1].length, Some(80));
        assert!(!columns[0].nullable);

        let analysis = introspector
            .analyze_query("SELECT o.id, o.total * 2 AS doubled FROM ferry_orders o")
            .await
            .unwrap();
        assert_eq!(analysis.query_type, QueryType::Select);
        assert_eq!(analysis.columns.len(), 2);
        assert!(analysis.columns[0].provenance.is_resolved());
        assert!(!analysis.columns[1].provenance.is_resolved());
    }

    #[tokio::test]
    #[traced_test]
    #[ignore = "requires a local postgres and elasticsearch"]
    async fn migrates_a_live_table_into_an_index() {
        reset_orders_table().await;
        let settings = EngineSettings::from_toml(&format!(
            r#"
            batch_size = 50

            [connections.pg]
            kind = "postgres"
            url = "{TEST_PG_URL}"

            [connections.search]
            kind = "elasticsearch"
            url = "{TEST_ES_URL}"
            timeout_secs = 10
            "#
        ))
        .unwrap();

        let dir = tempdir().unwrap();
        let sled = Arc::new(SledStateStore::open(dir.path()).unwrap());
        let store: Arc<dyn StateStore> = sled.clone();
        let orch = Orchestrator::new(
            store,
            Arc::new(SettingsConnectorFactory::new(Arc::new(settings.clone()))),
            RunOptions::from_settings(&settings),
        );

        let config = MappingConfiguration::new(
            "live orders",
            "pg",
            "search",
            "SELECT id, customer, total, paid, updated_at FROM ferry_orders",
            "ferry_orders",
        )
        .with_watermark("updated_at", Some("id".into()));
        sled.save_config(&config).await.unwrap();

        let job = orch
            .submit(&config.id, None)
            .await
            .unwrap()
            .wait()
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Completed, "{:?}", job.error_message);
        assert_eq!(job.processed_records, 120);
        assert_eq!(orch.get_job_batches(&job.id).await.unwrap().len(), 3);

        let config = sled.get_config(&config.id).await.unwrap().unwrap();
        assert!(config.last_watermark.is_some());
    }
}
