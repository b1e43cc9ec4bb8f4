//! `_bulk` request encoding and response decoding.

use crate::error::ConnectorError;
use model::records::document::Document;
use serde::Deserialize;
use serde_json::json;

/// Encodes documents as the newline-delimited body of a `_bulk` request.
pub fn encode_body(index: &str, documents: &[Document]) -> Result<String, ConnectorError> {
    let mut body = String::new();
    for doc in documents {
        let action = match &doc.id {
            Some(id) => json!({ "index": { "_index": index, "_id": id } }),
            None => json!({ "index": { "_index": index } }),
        };
        body.push_str(&encode_line(&action)?);
        body.push('\n');
        body.push_str(&encode_line(&doc.to_json())?);
        body.push('\n');
    }
    Ok(body)
}

fn encode_line(value: &serde_json::Value) -> Result<String, ConnectorError> {
    serde_json::to_string(value).map_err(|e| ConnectorError::Bulk {
        failed: 1,
        reason: format!("failed to encode document: {e}"),
    })
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    errors: bool,
    #[serde(default)]
    items: Vec<serde_json::Map<String, serde_json::Value>>,
}

/// Returns the number of accepted documents, or a `Bulk` error naming the
/// first rejection when any item failed.
pub fn decode_response(body: &str, sent: usize) -> Result<usize, ConnectorError> {
    let response: BulkResponse = serde_json::from_str(body).map_err(|e| ConnectorError::Bulk {
        failed: sent,
        reason: format!("unreadable bulk response: {e}"),
    })?;

    if !response.errors {
        return Ok(sent);
    }

    let mut failed = 0;
    let mut first_reason = None;
    for item in &response.items {
        let Some(result) = item.values().next() else {
            continue;
        };
        if let Some(error) = result.get("error") {
            failed += 1;
            if first_reason.is_none() {
                let kind = error.get("type").and_then(|v| v.as_str()).unwrap_or("error");
                let reason = error
                    .get("reason")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown reason");
                first_reason = Some(format!("{kind}: {reason}"));
            }
        }
    }

    Err(ConnectorError::Bulk {
        failed: failed.max(1),
        reason: first_reason.unwrap_or_else(|| "bulk request reported errors".into()),
    })
}
