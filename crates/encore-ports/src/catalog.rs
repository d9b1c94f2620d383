use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request failed ({0}): {1}")]
    Status(u16, String),
    #[error("invalid response body: {0}")]
    InvalidBody(String),
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PieceSummary {
    #[serde(alias = "_id", alias = "db_id")]
    pub id: Option<String>,
    pub title: String,
    pub composer: Option<String>,
    pub instruments: Option<String>,
    pub style: Option<String>,
    pub opus: Option<String>,
    pub date_of_composition: Option<String>,
    pub source: Option<String>,
    pub copyright: Option<String>,
    pub last_updated: Option<String>,
    pub music_id_number: Option<String>,
    pub pdf_url: Option<String>,
    pub format: Option<String>,
}

/// Composer biography text and a portrait url.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposerInfo {
    pub info: String,
    pub image_url: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CatalogQuery {
    Text(String),
    Style(String),
    Instrument(String),
    Composer(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CatalogFacet {
    Styles,
    Instruments,
    Composers,
}

/// Piece metadata collaborator: search, facet listings and composer lookups.
#[async_trait]
pub trait CatalogPort: Send + Sync {
    async fn search(&self, query: &CatalogQuery) -> Result<Vec<PieceSummary>, CatalogError>;
    async fn list(&self, facet: CatalogFacet) -> Result<Vec<String>, CatalogError>;
    async fn composer_info(&self, name: &str) -> Result<ComposerInfo, CatalogError>;
}
