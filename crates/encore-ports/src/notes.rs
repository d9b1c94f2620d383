use crate::types::PieceId;
use async_trait::async_trait;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request failed ({0}): {1}")]
    Status(u16, String),
    #[error("invalid response body: {0}")]
    InvalidBody(String),
}

/// Note-extraction collaborator.
///
/// The payload is passed through untyped: it is either a bare event array or an
/// object carrying `notes` (array or JSON-encoded string) and `instruments`.
/// Shape handling belongs to the normalizer, not to adapters.
#[async_trait]
pub trait NoteSourcePort: Send + Sync {
    async fn fetch_notes(&self, piece_id: &PieceId) -> Result<serde_json::Value, FetchError>;
}
