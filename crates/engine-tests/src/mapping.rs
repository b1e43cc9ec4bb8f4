#[cfg(test)]
mod tests {
    use crate::{
        harness,
        mocks::{MockIndex, MockSource},
        order_rows,
    };
    use connectors::metadata::QueryColumn;
    use engine_config::{
        SchemaError, SchemaIntrospector, generate_auto_mapping,
        mapping::validator::validate_against_columns, schema::Provenance, validate_mappings,
    };
    use model::{
        core::{field_type::FieldType, value::Value},
        execution::configuration::MappingConfiguration,
    };
    use std::sync::Arc;
    use tracing_test::traced_test;

    const JOINED_QUERY: &str = "SELECT o.id, o.customer, o.total, o.updated_at, c.photo \
         FROM orders o LEFT JOIN customers c ON c.id = o.customer_id";

    fn source() -> MockSource {
        MockSource::new(order_rows(1, 5)).with_columns(vec![
            QueryColumn::new("ID", "INTEGER"),
            QueryColumn::new("CUSTOMER", "VARCHAR(80)"),
            QueryColumn::new("TOTAL", "NUMERIC(10,2)"),
            QueryColumn::new("UPDATED_AT", "TIMESTAMP"),
            QueryColumn::new("PHOTO", "BYTEA"),
        ])
    }

    #[tokio::test]
    #[traced_test]
    async fn suggested_mapping_validates_cleanly() {
        let introspector = SchemaIntrospector::new(Arc::new(source()));
        let auto = generate_auto_mapping(&introspector, JOINED_QUERY, "orders")
            .await
            .unwrap();

        assert_eq!(auto.destination_index, "orders");
        assert!(auto.transformation_rules.is_empty());
        assert_eq!(auto.joins.len(), 1);
        assert_eq!(auto.joins[0].kind, "LEFT JOIN");
        assert_eq!(auto.joins[0].table, "customers");

        let fields: Vec<(&str, &FieldType)> = auto
            .suggested_mappings
            .iter()
            .map(|m| (m.destination_field.as_str(), &m.destination_type))
            .collect();
        assert_eq!(
            fields,
            vec![
                ("id", &FieldType::Long),
                ("customer", &FieldType::Text),
                ("total", &FieldType::Double),
                ("updated_at", &FieldType::Date),
                ("photo", &FieldType::Binary),
            ]
        );

        let report = validate_mappings(&auto.suggested_mappings);
        assert!(report.valid);
        assert!(report.errors.is_empty() && report.warnings.is_empty());
        assert!(logs_contain("Generated auto mapping"));
    }

    #[tokio::test]
    async fn provenance_follows_aliases() {
        let introspector = SchemaIntrospector::new(Arc::new(source()));
        let analysis = introspector.analyze_query(JOINED_QUERY).await.unwrap();

        let photo = analysis
            .columns
            .iter()
            .find(|c| c.field == "PHOTO")
            .unwrap();
        assert_eq!(photo.provenance, Provenance::column("customers", "photo"));
        assert!(analysis.columns.iter().all(|c| c.provenance.is_resolved()));
    }

    #[tokio::test]
    async fn edited_mapping_is_checked_against_the_query() {
        let introspector = SchemaIntrospector::new(Arc::new(source()));
        let analysis = introspector.analyze_query(JOINED_QUERY).await.unwrap();
        let mut mappings = generate_auto_mapping(&introspector, JOINED_QUERY, "orders")
            .await
            .unwrap()
            .suggested_mappings;

        mappings[0].destination_type = FieldType::Double;
        mappings[4].destination_type = FieldType::Long;
        mappings.push(model::transform::mapping::FieldMapping::new(
            "ghost",
            "ghost",
            FieldType::Keyword,
        ));

        let report = validate_against_columns(&mappings, &analysis.columns);
        assert!(!report.valid);
        let codes: Vec<(&str, &str)> = report
            .errors
            .iter()
            .map(|e| (e.field.as_str(), e.code.as_str()))
            .collect();
        assert_eq!(
            codes,
            vec![("PHOTO", "INCOMPATIBLE_TYPE"), ("ghost", "UNKNOWN_SOURCE_FIELD")]
        );
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].code, "LOSSY_CONVERSION");

        assert_eq!(report, validate_against_columns(&mappings, &analysis.columns));
    }

    #[tokio::test]
    async fn rejected_query_is_an_analysis_error() {
        let introspector = SchemaIntrospector::new(Arc::new(source()));
        let err = introspector
            .analyze_query("DELETE FROM orders")
            .await
            .unwrap_err();
        match err {
            SchemaError::QueryAnalysis { query, .. } => assert_eq!(query, "DELETE FROM orders"),
            other => panic!("unexpected error: {other}"),
        }
        assert!(!SchemaError::QueryAnalysis {
            query: String::new(),
            source: connectors::ConnectorError::Query("x".into()),
        }
        .is_connection());
    }

    #[tokio::test]
    async fn suggested_mapping_previews_through_the_pipeline() {
        let source = Arc::new(source());
        let introspector = SchemaIntrospector::new(source.clone());
        let auto = generate_auto_mapping(
            &introspector,
            "SELECT id, customer, total, updated_at FROM orders",
            "orders",
        )
        .await
        .unwrap();

        let (orch, _) = harness(source, Arc::new(MockIndex::new()), 10);
        let config = MappingConfiguration::new(
            "orders",
            "pg",
            "search",
            "SELECT id, customer, total, updated_at FROM orders",
            &auto.destination_index,
        )
        .with_mappings(
            auto.suggested_mappings
                .into_iter()
                .filter(|m| m.destination_field != "photo")
                .collect(),
        );

        let docs = orch.preview_migration(&config, 2).await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].get("id"), Some(&Value::Int(2)));
        assert_eq!(docs[1].get("total"), Some(&Value::Float(20.5)));
        assert!(docs[1].id.is_none());
    }
}
