//! Stripe API client for billing extraction.
//!
//! # API Reference
//!
//! - Base URL: `https://api.stripe.com/v1`
//! - Authentication: secret key via `Authorization: Bearer <key>`
//! - Lists are cursor-paginated: `limit` (1-100) and `starting_after=<last id>`
//!   while the page reports `has_more`

mod types;

pub use types::*;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use super::BillingSource;
use crate::config::StripeConfig;

/// Largest page Stripe serves.
pub const MAX_PAGE_SIZE: usize = 100;

/// Errors that can occur when interacting with the Stripe API.
#[derive(Debug, Error)]
pub enum BillingError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limited by Stripe.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Unauthorized (invalid API key).
    #[error("Unauthorized: invalid API key")]
    Unauthorized,

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Stripe error envelope: `{"error": {"message": ...}}`.
#[derive(Debug, serde::Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, serde::Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

/// Stripe API client.
#[derive(Clone)]
pub struct StripeClient {
    inner: Arc<StripeClientInner>,
}

struct StripeClientInner {
    client: reqwest::Client,
    base_url: Url,
}

impl StripeClient {
    /// Create a new Stripe client.
    ///
    /// # Errors
    ///
    /// Returns error if the key is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &StripeConfig, timeout: Duration) -> Result<Self, BillingError> {
        let mut headers = HeaderMap::new();

        let mut auth_value =
            HeaderValue::from_str(&format!("Bearer {}", config.api_key.expose_secret()))
                .map_err(|e| BillingError::Parse(format!("Invalid API key format: {e}")))?;
        auth_value.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth_value);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            inner: Arc::new(StripeClientInner {
                client,
                base_url: config.base_url.clone(),
            }),
        })
    }

    fn list_url(
        &self,
        resource: &str,
        limit: usize,
        starting_after: Option<&str>,
    ) -> Result<Url, BillingError> {
        let base = self.inner.base_url.as_str().trim_end_matches('/');
        let mut url = Url::parse(&format!("{base}/{resource}"))
            .map_err(|e| BillingError::Parse(format!("Invalid URL: {e}")))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &limit.to_string());
            if let Some(cursor) = starting_after {
                query.append_pair("starting_after", cursor);
            }
        }
        Ok(url)
    }

    /// Fetch one page of `resource`.
    async fn page<T: DeserializeOwned>(
        &self,
        resource: &'static str,
        limit: usize,
        starting_after: Option<String>,
    ) -> Result<ListPage<T>, BillingError> {
        let url = self.list_url(resource, limit, starting_after.as_deref())?;
        debug!(resource, limit, cursor = ?starting_after, "Fetching page");
        let response = self.inner.client.get(url).send().await?;
        Self::handle_response(response).await
    }

    /// Fetch up to `cap` records of `resource`.
    #[instrument(skip(self))]
    async fn list<T>(&self, resource: &'static str, cap: usize) -> Result<Vec<T>, BillingError>
    where
        T: DeserializeOwned + StripeObject + Send,
    {
        collect_pages(cap, |cursor, limit| self.page(resource, limit, cursor)).await
    }

    /// Handle API response and parse JSON.
    async fn handle_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, BillingError> {
        let status = response.status();

        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| BillingError::Parse(format!("Failed to parse response: {e}")));
        }

        Err(Self::parse_error(response).await)
    }

    /// Parse error response from the Stripe API.
    async fn parse_error(response: reqwest::Response) -> BillingError {
        let status = response.status().as_u16();

        if status == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(1);
            return BillingError::RateLimited(retry_after);
        }

        if status == 401 {
            return BillingError::Unauthorized;
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorEnvelope>(&body)
            .ok()
            .and_then(|e| e.error.message)
            .unwrap_or_else(|| {
                if body.is_empty() {
                    "Unknown error".to_string()
                } else {
                    body
                }
            });

        BillingError::Api { status, message }
    }
}

/// Walk a cursor-paginated list until `cap` records are collected or the
/// list is exhausted.
///
/// `fetch` receives the cursor (the id of the last record seen) and the page
/// size to request.
///
/// # Errors
///
/// Returns the first error `fetch` produces.
pub async fn collect_pages<T, E, F, Fut>(cap: usize, mut fetch: F) -> Result<Vec<T>, E>
where
    T: StripeObject,
    F: FnMut(Option<String>, usize) -> Fut,
    Fut: Future<Output = Result<ListPage<T>, E>>,
{
    let mut records: Vec<T> = Vec::new();
    let mut cursor: Option<String> = None;

    while records.len() < cap {
        let limit = (cap - records.len()).min(MAX_PAGE_SIZE);
        let page = fetch(cursor.take(), limit).await?;
        let exhausted = !page.has_more || page.data.is_empty();

        records.extend(page.data.into_iter().take(cap - records.len()));

        if exhausted {
            break;
        }
        cursor = records.last().map(|r| r.id().to_string());
    }

    Ok(records)
}

#[async_trait]
impl BillingSource for StripeClient {
    async fn charges(&self, cap: usize) -> Result<Vec<Charge>, BillingError> {
        self.list("charges", cap).await
    }

    async fn refunds(&self, cap: usize) -> Result<Vec<Refund>, BillingError> {
        self.list("refunds", cap).await
    }

    async fn invoices(&self, cap: usize) -> Result<Vec<Invoice>, BillingError> {
        self.list("invoices", cap).await
    }
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("base_url", &self.inner.base_url.as_str())
            .finish_non_exhaustive()
    }
}
