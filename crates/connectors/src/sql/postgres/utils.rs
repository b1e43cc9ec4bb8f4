use crate::error::ConnectorError;
use native_tls::TlsConnector;
use postgres_native_tls::MakeTlsConnector;
use std::{error::Error as _, future::Future, time::Duration};
use tokio_postgres::{Client, Config, NoTls, config::SslMode};
use tracing::{error, warn};

pub(crate) async fn connect_client(url: &str) -> Result<Client, ConnectorError> {
    let config = url
        .parse::<Config>()
        .map_err(|e| ConnectorError::InvalidUrl(e.to_string()))?;

    match config.get_ssl_mode() {
        SslMode::Disable => connect_without_tls(config).await,
        SslMode::Prefer => match connect_with_tls(config.clone()).await {
            Ok(client) => Ok(client),
            Err(error) => {
                warn!(%error, "Postgres TLS handshake failed, retrying without TLS");
                connect_without_tls(config).await
            }
        },
        _ => connect_with_tls(config).await,
    }
}

async fn connect_with_tls(config: Config) -> Result<Client, ConnectorError> {
    let connector = TlsConnector::builder().build()?;
    let tls = MakeTlsConnector::new(connector);
    let (client, connection) = config.connect(tls).await.map_err(connection_error)?;
    tokio::spawn(async move {
        if let Err(err) = connection.await {
            error!(%err, "Postgres connection error");
        }
    });
    Ok(client)
}

async fn connect_without_tls(config: Config) -> Result<Client, ConnectorError> {
    let (client, connection) = config.connect(NoTls).await.map_err(connection_error)?;
    tokio::spawn(async move {
        if let Err(err) = connection.await {
            error!(%err, "Postgres connection error");
        }
    });
    Ok(client)
}

fn connection_error(err: tokio_postgres::Error) -> ConnectorError {
    ConnectorError::Connection(err.to_string())
}

impl From<tokio_postgres::Error> for ConnectorError {
    fn from(err: tokio_postgres::Error) -> Self {
        if err.is_closed() {
            return ConnectorError::Connection(err.to_string());
        }
        if let Some(db) = err.as_db_error() {
            return ConnectorError::Query(format!("{}: {}", db.code().code(), db.message()));
        }
        if err
            .source()
            .is_some_and(|s| s.downcast_ref::<std::io::Error>().is_some())
        {
            return ConnectorError::Connection(err.to_string());
        }
        ConnectorError::Query(err.to_string())
    }
}

/// Runs `fut` under an optional deadline.
pub(crate) async fn with_timeout<T, F>(
    timeout: Option<Duration>,
    fut: F,
) -> Result<T, ConnectorError>
where
    F: Future<Output = Result<T, tokio_postgres::Error>>,
{
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(result) => result.map_err(ConnectorError::from),
            Err(_) => Err(ConnectorError::Timeout(limit)),
        },
        None => fut.await.map_err(ConnectorError::from),
    }
}

/// Splits `schema.table` into its parts. Unqualified names have no schema.
pub(crate) fn split_table_name(table: &str) -> (Option<&str>, &str) {
    match table.split_once('.') {
        Some((schema, name)) => (Some(schema.trim_matches('"')), name.trim_matches('"')),
        None => (None, table.trim_matches('"')),
    }
}
