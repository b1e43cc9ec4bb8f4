use crate::{destination::DestinationIndex, error::ConnectorError, search::elastic::bulk};
use async_trait::async_trait;
use model::records::document::Document;
use reqwest::{Client, RequestBuilder, header::CONTENT_TYPE};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default)]
pub struct ElasticSettings {
    pub url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout: Option<Duration>,
}

/// Elasticsearch / OpenSearch compatible bulk destination.
#[derive(Debug, Clone)]
pub struct ElasticIndex {
    client: Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
    timeout: Option<Duration>,
}

impl ElasticIndex {
    pub fn new(settings: ElasticSettings) -> Result<Self, ConnectorError> {
        if !(settings.url.starts_with("http://") || settings.url.starts_with("https://")) {
            return Err(ConnectorError::InvalidUrl(settings.url));
        }

        let mut builder = Client::builder();
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| ConnectorError::Connection(e.to_string()))?;

        Ok(ElasticIndex {
            client,
            base_url: settings.url.trim_end_matches('/').to_string(),
            username: settings.username,
            password: settings.password,
            timeout: settings.timeout,
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.username {
            Some(user) => request.basic_auth(user, self.password.as_ref()),
            None => request,
        }
    }

    fn request_error(&self, err: reqwest::Error) -> ConnectorError {
        if err.is_timeout() {
            ConnectorError::Timeout(self.timeout.unwrap_or_default())
        } else if err.is_connect() {
            ConnectorError::Connection(err.to_string())
        } else {
            ConnectorError::Query(err.to_string())
        }
    }
}

#[async_trait]
impl DestinationIndex for ElasticIndex {
    async fn ping(&self) -> Result<(), ConnectorError> {
        let response = self
            .authorize(self.client.get(&self.base_url))
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ConnectorError::Connection(format!(
                "cluster answered ping with HTTP {status}"
            )))
        }
    }

    async fn bulk_index(
        &self,
        index: &str,
        documents: &[Document],
    ) -> Result<usize, ConnectorError> {
        if documents.is_empty() {
            return Ok(0);
        }

        let body = bulk::encode_body(index, documents)?;
        let url = format!("{}/_bulk", self.base_url);
        debug!(index, documents = documents.len(), bytes = body.len(), "Sending bulk request");

        let response = self
            .authorize(self.client.post(&url))
            .header(CONTENT_TYPE, "application/x-ndjson")
            .body(body)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.request_error(e))?;

        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ConnectorError::Connection(format!(
                "bulk request unauthorized (HTTP {status})"
            )));
        }
        if !status.is_success() {
            warn!(index, %status, "Bulk request rejected");
            return Err(ConnectorError::Bulk {
                failed: documents.len(),
                reason: format!("HTTP {status}: {text}"),
            });
        }

        bulk::decode_response(&text, documents.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_http_urls() {
        let err = ElasticIndex::new(ElasticSettings {
            url: "localhost:9200".into(),
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, ConnectorError::InvalidUrl(_)));
    }
}
