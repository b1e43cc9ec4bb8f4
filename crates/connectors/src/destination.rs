use crate::error::ConnectorError;
use async_trait::async_trait;
use model::records::document::Document;

/// Write access to a search index.
#[async_trait]
pub trait DestinationIndex: Send + Sync {
    async fn ping(&self) -> Result<(), ConnectorError>;

    /// Indexes all documents in one request and returns how many were
    /// accepted. A partial rejection is a `ConnectorError::Bulk`.
    async fn bulk_index(&self, index: &str, documents: &[Document])
    -> Result<usize, ConnectorError>;
}
