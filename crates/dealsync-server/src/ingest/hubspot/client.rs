//! Authenticated, rate-limited HubSpot CRM client

use futures::stream::{self, Stream};
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use super::error::{HubSpotError, Result, DEFAULT_RETRY_AFTER};
use super::models::{DealListResponse, Page, DEFAULT_DEAL_PROPERTIES};
use super::rate_limiter::SlidingWindowLimiter;
use crate::ingest::config::{clamp_page_size, HubSpotConfig, MAX_PAGE_SIZE};

const DEALS_PATH: &str = "/crm/v3/objects/deals";

/// HubSpot deals API client bound to one access token.
///
/// Cloning is cheap; clones share the connection pool and the limiter.
#[derive(Clone)]
pub struct HubSpotClient {
    http: Client,
    base_url: String,
    access_token: String,
    limiter: Arc<SlidingWindowLimiter>,
}

impl std::fmt::Debug for HubSpotClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HubSpotClient")
            .field("base_url", &self.base_url)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

impl HubSpotClient {
    pub fn new(
        config: &HubSpotConfig,
        access_token: impl Into<String>,
        limiter: Arc<SlidingWindowLimiter>,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("dealsync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url().to_string(),
            access_token: access_token.into(),
            limiter,
        })
    }

    /// Fetch one page of deals.
    ///
    /// Waits for the limiter before issuing the request. Failures are
    /// classified but never retried here.
    #[instrument(skip_all, fields(cursor = cursor.unwrap_or("<start>"), limit = limit))]
    pub async fn fetch_page(
        &self,
        cursor: Option<&str>,
        properties: &[String],
        archived: bool,
        limit: u32,
    ) -> Result<Page> {
        let limit = clamp_page_size(Some(limit));
        let properties = if properties.is_empty() {
            DEFAULT_DEAL_PROPERTIES.join(",")
        } else {
            properties.join(",")
        };

        let mut query = vec![
            ("limit", limit.to_string()),
            ("archived", archived.to_string()),
            ("properties", properties),
        ];
        if let Some(after) = cursor {
            query.push(("after", after.to_string()));
        }

        self.limiter.admit().await;

        let url = format!("{}{}", self.base_url, DEALS_PATH);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&query)
            .send()
            .await?;

        let body = check_status(response).await?;
        let parsed: DealListResponse =
            serde_json::from_str(&body).map_err(|e| HubSpotError::Decode(e.to_string()))?;
        let page = parsed.into_page();

        debug!(
            records = page.records.len(),
            has_more = !page.is_last(),
            "Fetched deals page"
        );
        Ok(page)
    }

    /// Lazy sequence over every deal page, starting from the first
    pub fn pages(&self, properties: Vec<String>, archived: bool) -> PageSequence {
        PageSequence {
            client: self.clone(),
            properties,
            archived,
            page_size: MAX_PAGE_SIZE,
            cursor: None,
            finished: false,
        }
    }

    /// Probe the token with a single-record request
    #[instrument(skip(self))]
    pub async fn validate_credentials(&self) -> Result<bool> {
        self.fetch_page(None, &[], false, 1).await?;
        Ok(true)
    }
}

/// Map a non-success response onto the error taxonomy, returning the body otherwise
async fn check_status(response: Response) -> Result<String> {
    let status = response.status();

    if status.is_success() {
        return Ok(response.text().await?);
    }

    match status {
        StatusCode::UNAUTHORIZED => Err(HubSpotError::AuthenticationFailed),
        StatusCode::FORBIDDEN => Err(HubSpotError::AuthorizationFailed),
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_RETRY_AFTER);
            warn!(retry_after_secs = retry_after.as_secs(), "HubSpot throttled request");
            Err(HubSpotError::RateLimited { retry_after })
        }
        _ => {
            let body = response.text().await.unwrap_or_default();
            Err(HubSpotError::remote(status.as_u16(), body))
        }
    }
}

/// Forward-only cursor over deal pages.
///
/// Ends after the first page that carries no next cursor. A failed fetch
/// leaves the cursor where it was, so calling [`next_page`](Self::next_page)
/// again retries the same request.
#[derive(Debug)]
pub struct PageSequence {
    client: HubSpotClient,
    properties: Vec<String>,
    archived: bool,
    page_size: u32,
    cursor: Option<String>,
    finished: bool,
}

impl PageSequence {
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = clamp_page_size(Some(page_size));
        self
    }

    /// Cursor of the next request, `None` before the first page
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub async fn next_page(&mut self) -> Result<Option<Page>> {
        if self.finished {
            return Ok(None);
        }

        let page = self
            .client
            .fetch_page(
                self.cursor.as_deref(),
                &self.properties,
                self.archived,
                self.page_size,
            )
            .await?;

        match &page.next_cursor {
            Some(next) => self.cursor = Some(next.clone()),
            None => self.finished = true,
        }

        Ok(Some(page))
    }

    /// Adapt into a stream that ends after the first error
    pub fn into_stream(self) -> impl Stream<Item = Result<Page>> {
        stream::unfold((self, false), |(mut pages, failed)| async move {
            if failed {
                return None;
            }
            match pages.next_page().await {
                Ok(Some(page)) => Some((Ok(page), (pages, false))),
                Ok(None) => None,
                Err(e) => Some((Err(e), (pages, true))),
            }
        })
    }
}
