use crate::error::CliError;
use async_trait::async_trait;
use connectors::{DestinationIndex, SourceQuery};
use engine_config::{
    SchemaIntrospector,
    settings::{ConnectionSettings, EngineSettings, connection::redact_url},
};
use engine_runtime::ConnectorFactory;
use std::sync::Arc;
use tracing::{error, info};

/// Trait for "pinging" a configured connection
#[async_trait]
pub trait ConnectionPinger: Send + Sync {
    /// Attempts to ping; returns Err if unreachable
    async fn ping(&self) -> Result<(), CliError>;
}

/// Relational source, checked with a trivial query.
pub struct SourcePinger {
    pub name: String,
    pub source: Arc<dyn SourceQuery>,
}

/// Search cluster, checked with its health endpoint.
pub struct IndexPinger {
    pub name: String,
    pub index: Arc<dyn DestinationIndex>,
}

#[async_trait]
impl ConnectionPinger for SourcePinger {
    async fn ping(&self) -> Result<(), CliError> {
        let introspector = SchemaIntrospector::new(self.source.clone());
        introspector.test_connection().await.map_err(|e| {
            error!(connection = %self.name, "Source ping failed: {e}");
            CliError::Schema(e)
        })?;
        info!(connection = %self.name, "Source ping succeeded");
        Ok(())
    }
}

#[async_trait]
impl ConnectionPinger for IndexPinger {
    async fn ping(&self) -> Result<(), CliError> {
        self.index.ping().await.map_err(|e| {
            error!(connection = %self.name, "Destination ping failed: {e}");
            CliError::Migration(engine_runtime::MigrationError::Connection(e))
        })?;
        info!(connection = %self.name, "Destination ping succeeded");
        Ok(())
    }
}

/// Builds the pinger matching the kind of the named connection.
pub async fn pinger_for(
    settings: &EngineSettings,
    factory: &dyn ConnectorFactory,
    name: &str,
) -> Result<Box<dyn ConnectionPinger>, CliError> {
    let conn = settings.connection(name)?;
    info!(
        connection = name,
        kind = conn.kind(),
        url = %redact_url(conn.url()),
        "Pinging connection"
    );

    let pinger: Box<dyn ConnectionPinger> = match conn {
        ConnectionSettings::Postgres { .. } => Box::new(SourcePinger {
            name: name.to_string(),
            source: factory.source(name).await?,
        }),
        ConnectionSettings::Elasticsearch { .. } => Box::new(IndexPinger {
            name: name.to_string(),
            index: factory.destination(name).await?,
        }),
    };
    Ok(pinger)
}
