//! DummyJSON API client.
//!
//! # API Reference
//!
//! - Base URL: `https://dummyjson.com`
//! - Endpoints: `/products`, `/users`, `/carts`
//! - `?limit=0` returns the whole collection in one response, wrapped in
//!   an envelope keyed by the collection name (`{"products": [...], ...}`)
//! - No authentication

mod types;

pub use types::*;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{info, instrument};
use url::Url;

use super::CatalogSource;
use crate::config::CatalogConfig;

/// Errors that can occur when fetching from the catalog API.
#[derive(Debug, Error)]
pub enum SourceError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limited by the API.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// DummyJSON API client.
#[derive(Clone)]
pub struct DummyJsonClient {
    inner: Arc<DummyJsonClientInner>,
}

struct DummyJsonClientInner {
    client: reqwest::Client,
    base_url: Url,
}

impl DummyJsonClient {
    /// Create a new DummyJSON client.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &CatalogConfig, timeout: Duration) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            inner: Arc::new(DummyJsonClientInner {
                client,
                base_url: config.base_url.clone(),
            }),
        })
    }

    /// URL of the full listing of `collection`.
    fn collection_url(&self, collection: &str) -> Result<Url, SourceError> {
        let base = self.inner.base_url.as_str().trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}/{collection}"))
            .map_err(|e| SourceError::Parse(format!("Invalid URL: {e}")))?;
        url.query_pairs_mut().append_pair("limit", "0");
        Ok(url)
    }

    /// Fetch every record of `collection`.
    #[instrument(skip(self))]
    async fn fetch_collection<T: DeserializeOwned>(
        &self,
        collection: &'static str,
    ) -> Result<Vec<T>, SourceError> {
        let url = self.collection_url(collection)?;
        let response = self.inner.client.get(url).send().await?;
        let body: serde_json::Value = Self::handle_response(response).await?;

        let records: Vec<T> = unwrap_envelope(body, collection)?;
        info!(collection, count = records.len(), "Fetched collection");
        Ok(records)
    }

    /// Handle API response and parse JSON.
    async fn handle_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, SourceError> {
        let status = response.status();

        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| SourceError::Parse(format!("Failed to parse response: {e}")));
        }

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(60);
            return Err(SourceError::RateLimited(retry_after));
        }

        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        Err(SourceError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

/// Extract `collection` from its response envelope.
///
/// A missing key is an empty collection.
///
/// # Errors
///
/// Returns `SourceError::Parse` if the body is not an object or a record
/// does not match its schema.
pub fn unwrap_envelope<T: DeserializeOwned>(
    body: serde_json::Value,
    collection: &str,
) -> Result<Vec<T>, SourceError> {
    let serde_json::Value::Object(mut envelope) = body else {
        return Err(SourceError::Parse(format!(
            "expected an object wrapping '{collection}'"
        )));
    };

    match envelope.remove(collection) {
        None | Some(serde_json::Value::Null) => Ok(Vec::new()),
        Some(records) => serde_json::from_value(records)
            .map_err(|e| SourceError::Parse(format!("invalid {collection}: {e}"))),
    }
}

#[async_trait]
impl CatalogSource for DummyJsonClient {
    async fn products(&self) -> Result<Vec<ProductRecord>, SourceError> {
        self.fetch_collection("products").await
    }

    async fn users(&self) -> Result<Vec<UserRecord>, SourceError> {
        self.fetch_collection("users").await
    }

    async fn carts(&self) -> Result<Vec<CartRecord>, SourceError> {
        self.fetch_collection("carts").await
    }
}

impl std::fmt::Debug for DummyJsonClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DummyJsonClient")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}
