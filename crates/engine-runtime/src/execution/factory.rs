use crate::error::MigrationError;
use async_trait::async_trait;
use connectors::{
    DestinationIndex, SourceQuery,
    search::elastic::{ElasticIndex, ElasticSettings},
    sql::postgres::PgSource,
};
use engine_config::settings::{ConnectionSettings, EngineSettings};
use std::sync::Arc;
use tracing::debug;

/// Opens connectors by connection name. Every job gets its own.
#[async_trait]
pub trait ConnectorFactory: Send + Sync {
    async fn source(&self, connection: &str) -> Result<Arc<dyn SourceQuery>, MigrationError>;

    async fn destination(
        &self,
        connection: &str,
    ) -> Result<Arc<dyn DestinationIndex>, MigrationError>;
}

/// Resolves connection names through the `[connections]` table of the
/// engine settings.
pub struct SettingsConnectorFactory {
    settings: Arc<EngineSettings>,
}

impl SettingsConnectorFactory {
    pub fn new(settings: Arc<EngineSettings>) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl ConnectorFactory for SettingsConnectorFactory {
    async fn source(&self, connection: &str) -> Result<Arc<dyn SourceQuery>, MigrationError> {
        match self.settings.source_connection(connection)? {
            ConnectionSettings::Postgres { url } => {
                debug!(connection, "Opening postgres source");
                let source = PgSource::connect(url)
                    .await
                    .map_err(MigrationError::Connection)?
                    .with_query_timeout(self.settings.query_timeout());
                Ok(Arc::new(source))
            }
            other => Err(MigrationError::InvalidConfiguration(format!(
                "connection `{connection}` of kind {} cannot be a source",
                other.kind()
            ))),
        }
    }

    async fn destination(
        &self,
        connection: &str,
    ) -> Result<Arc<dyn DestinationIndex>, MigrationError> {
        let conn = self.settings.destination_connection(connection)?;
        match conn {
            ConnectionSettings::Elasticsearch {
                url,
                username,
                password,
                ..
            } => {
                debug!(connection, "Opening search destination");
                let index = ElasticIndex::new(ElasticSettings {
                    url: url.clone(),
                    username: username.clone(),
                    password: password.clone(),
                    timeout: conn.timeout(),
                })
                .map_err(MigrationError::Connection)?;
                Ok(Arc::new(index))
            }
            other => Err(MigrationError::InvalidConfiguration(format!(
                "connection `{connection}` of kind {} cannot be a destination",
                other.kind()
            ))),
        }
    }
}
