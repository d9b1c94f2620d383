use async_trait::async_trait;
use encore_ports::catalog::{
    CatalogError, CatalogFacet, CatalogPort, CatalogQuery, ComposerInfo, PieceSummary,
};
use encore_ports::notes::{FetchError, NoteSourcePort};
use encore_ports::types::PieceId;
use reqwest::{StatusCode, Url};
use serde_json::Value;

const BODY_EXCERPT_CHARS: usize = 120;

#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("invalid backend url {0}: {1}")]
    InvalidBaseUrl(String, String),
    #[error("could not build http client: {0}")]
    Build(String),
}

/// Shared plumbing for the music backend: base url and one connection pool.
///
/// Requests carry no timeout; a slow note extraction is waited for.
#[derive(Clone, Debug)]
pub struct BackendClient {
    base_url: Url,
    http: reqwest::Client,
}

impl BackendClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ClientError::Build(e.to_string()))?;
        Self::with_http(base_url, http)
    }

    pub fn with_http(base_url: &str, http: reqwest::Client) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url.trim())
            .map_err(|e| ClientError::InvalidBaseUrl(base_url.to_string(), e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidBaseUrl(
                base_url.to_string(),
                "not a base url".to_string(),
            ));
        }
        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Base url with `segments` appended, each percent-encoded as one segment.
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn get(&self, url: Url) -> Result<Reply, reqwest::Error> {
        tracing::debug!(url = %url, "backend request");
        let response = self.http.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok(Reply { status, body })
    }
}

struct Reply {
    status: StatusCode,
    body: String,
}

/// Note-extraction endpoint: `GET {base}/pieces/get_notes_with_ai/{id}`.
#[derive(Clone, Debug)]
pub struct HttpNoteSource {
    client: BackendClient,
}

impl HttpNoteSource {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NoteSourcePort for HttpNoteSource {
    async fn fetch_notes(&self, piece_id: &PieceId) -> Result<Value, FetchError> {
        let url = self
            .client
            .endpoint(&["pieces", "get_notes_with_ai", piece_id.as_str()]);
        let reply = self
            .client
            .get(url)
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        if !reply.status.is_success() {
            tracing::warn!(piece_id = %piece_id, status = reply.status.as_u16(), "note request rejected");
            return Err(FetchError::Status(reply.status.as_u16(), reply.body));
        }

        serde_json::from_str(&reply.body).map_err(|e| {
            FetchError::InvalidBody(format!("{e}: {}", excerpt(&reply.body)))
        })
    }
}

/// Piece search and the style / instrument / composer listings.
#[derive(Clone, Debug)]
pub struct HttpCatalog {
    client: BackendClient,
}

impl HttpCatalog {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }

    async fn get_json(&self, url: Url) -> Result<Value, CatalogError> {
        let reply = self
            .client
            .get(url)
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))?;
        if !reply.status.is_success() {
            return Err(CatalogError::Status(reply.status.as_u16(), reply.body));
        }
        serde_json::from_str(&reply.body)
            .map_err(|e| CatalogError::InvalidBody(format!("{e}: {}", excerpt(&reply.body))))
    }
}

#[async_trait]
impl CatalogPort for HttpCatalog {
    async fn search(&self, query: &CatalogQuery) -> Result<Vec<PieceSummary>, CatalogError> {
        let (collection, text) = match query {
            CatalogQuery::Text(text) => ("search", text),
            CatalogQuery::Style(text) => ("styles", text),
            CatalogQuery::Instrument(text) => ("instruments", text),
            CatalogQuery::Composer(text) => ("composers", text),
        };
        let url = self.client.endpoint(&["pieces", collection, text.trim()]);
        let body = self.get_json(url).await?;
        parse_pieces(&body)
    }

    async fn list(&self, facet: CatalogFacet) -> Result<Vec<String>, CatalogError> {
        let url = self.client.endpoint(&[facet_collection(facet)]);
        let body = self.get_json(url).await?;
        Ok(normalize_list(&body, facet_keys(facet)))
    }

    async fn composer_info(&self, name: &str) -> Result<ComposerInfo, CatalogError> {
        let url = self.client.endpoint(&["composer", "info", name.trim()]);
        let body = self.get_json(url).await?;
        serde_json::from_value::<ComposerInfo>(body.clone())
            .ok()
            .filter(|info| !info.info.trim().is_empty())
            .ok_or_else(|| CatalogError::InvalidBody(excerpt(&body.to_string())))
    }
}

fn facet_collection(facet: CatalogFacet) -> &'static str {
    match facet {
        CatalogFacet::Styles => "styles",
        CatalogFacet::Instruments => "instruments",
        CatalogFacet::Composers => "composers",
    }
}

fn facet_keys(facet: CatalogFacet) -> &'static [&'static str] {
    match facet {
        CatalogFacet::Styles => &["styles", "style", "name"],
        CatalogFacet::Instruments => &["instruments", "instrument", "name"],
        CatalogFacet::Composers => &["composers", "composer", "name"],
    }
}

/// Flatten a listing into display strings.
///
/// The body is either an array or an object holding the array under one of
/// `keys`. Entries are strings, or objects whose first string field among
/// `keys` is used. Slashes are spaced out (`"Piano/Violin"` reads
/// `"Piano / Violin"`).
pub fn normalize_list(body: &Value, keys: &[&str]) -> Vec<String> {
    let items = match body {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => keys
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array))
            .map(Vec::as_slice)
            .unwrap_or(&[]),
        _ => &[],
    };

    items
        .iter()
        .filter_map(|item| match item {
            Value::String(text) => Some(text.as_str()),
            Value::Object(map) => keys
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str)),
            _ => None,
        })
        .filter(|text| !text.is_empty())
        .map(|text| text.replace('/', " / "))
        .collect()
}

/// Search results: an array of pieces, or an object wrapping one under
/// `pieces` or `results`. Entries that are not piece objects are skipped.
pub fn parse_pieces(body: &Value) -> Result<Vec<PieceSummary>, CatalogError> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(map) => ["pieces", "results"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array))
            .ok_or_else(|| CatalogError::InvalidBody(excerpt(&body.to_string())))?,
        other => return Err(CatalogError::InvalidBody(excerpt(&other.to_string()))),
    };

    Ok(items
        .iter()
        .filter_map(|item| match serde_json::from_value::<PieceSummary>(item.clone()) {
            Ok(piece) => Some(piece),
            Err(error) => {
                tracing::debug!(%error, "catalog entry skipped");
                None
            }
        })
        .collect())
}

fn excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT_CHARS).collect()
}
