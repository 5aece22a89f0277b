use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Jitter, Quota, RateLimiter};
use moka::future::Cache;
use reqwest::{RequestBuilder, Url};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::errors::ApiError;
use super::types::{BidQuery, Page, StatusUpdate};
use crate::config::ApiConfig;
use crate::model::{Bid, Customer, EntityId};
use crate::workflow::BidStatus;

/// Remote operations the dashboard core needs. Injected so views and the
/// sync loop can run against a fake.
#[async_trait]
pub trait BidApi: Send + Sync {
    async fn get_bid(&self, id: &EntityId) -> Result<Bid, ApiError>;

    async fn list_bids(&self, query: &BidQuery) -> Result<Page<Bid>, ApiError>;

    /// Persist a new status. Returns the bid as the server stored it.
    async fn update_bid_status(&self, id: &EntityId, status: BidStatus) -> Result<Bid, ApiError>;

    async fn list_customers(&self, query: &BidQuery) -> Result<Page<Customer>, ApiError>;

    /// Forget any locally cached copy of `id`. Called when the event feed
    /// reports a change the client did not make itself.
    async fn invalidate(&self, _id: &EntityId) {}
}

#[async_trait]
impl<T: BidApi + ?Sized> BidApi for Arc<T> {
    async fn get_bid(&self, id: &EntityId) -> Result<Bid, ApiError> {
        (**self).get_bid(id).await
    }

    async fn list_bids(&self, query: &BidQuery) -> Result<Page<Bid>, ApiError> {
        (**self).list_bids(query).await
    }

    async fn update_bid_status(&self, id: &EntityId, status: BidStatus) -> Result<Bid, ApiError> {
        (**self).update_bid_status(id, status).await
    }

    async fn list_customers(&self, query: &BidQuery) -> Result<Page<Customer>, ApiError> {
        (**self).list_customers(query).await
    }

    async fn invalidate(&self, id: &EntityId) {
        (**self).invalidate(id).await
    }
}

/// Every bid matching `query`, walking pages from `query.page`.
pub async fn fetch_all_bids<A: BidApi + ?Sized>(
    api: &A,
    query: BidQuery,
) -> Result<Vec<Bid>, ApiError> {
    collect_pages(query, move |page: BidQuery| async move { api.list_bids(&page).await }).await
}

pub async fn fetch_all_customers<A: BidApi + ?Sized>(
    api: &A,
    query: BidQuery,
) -> Result<Vec<Customer>, ApiError> {
    collect_pages(query, move |page: BidQuery| async move { api.list_customers(&page).await })
        .await
}

/// Upper bound on pages walked in one listing, for servers whose `next`
/// link never runs out.
pub const MAX_PAGES: u32 = 1000;

async fn collect_pages<T, F, Fut>(mut query: BidQuery, mut fetch: F) -> Result<Vec<T>, ApiError>
where
    F: FnMut(BidQuery) -> Fut,
    Fut: Future<Output = Result<Page<T>, ApiError>>,
{
    let mut records = Vec::new();
    let mut previous_next: Option<String> = None;
    for walked in 1..=MAX_PAGES {
        let page = fetch(query.clone()).await?;
        let fetched = page.results.len();
        let has_next = page.has_next();
        let expected = page.count;
        records.extend(page.results);

        debug!(page = query.page, fetched, collected = records.len(), "Fetched page");

        let complete = expected.is_some_and(|count| records.len() as u64 >= count);
        if fetched == 0 || !has_next || complete {
            return Ok(records);
        }
        if page.next.is_some() && page.next == previous_next {
            warn!(page = query.page, next = ?page.next, "Next link repeated; stopping");
            return Ok(records);
        }
        if walked == MAX_PAGES {
            warn!(
                pages = MAX_PAGES,
                collected = records.len(),
                "Page limit reached; listing truncated"
            );
            return Ok(records);
        }
        previous_next = page.next;
        query = query.next_page();
    }
    Ok(records)
}

/// Rate-limited REST client for the bids API
#[derive(Debug)]
pub struct BidApiClient {
    http: reqwest::Client,
    base_url: Url,
    token: String,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
    cache: Cache<EntityId, Bid>,
}

impl BidApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let token = config
            .token
            .clone()
            .filter(|token| !token.is_empty())
            .ok_or(ApiError::MissingToken)?;

        // Url::join drops the last segment unless the base ends with a slash
        let mut base = config.base_url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url =
            Url::parse(&base).map_err(|e| ApiError::InvalidUrl(format!("{base}: {e}")))?;

        let per_second =
            NonZeroU32::new(config.rate_limit.requests_per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(config.rate_limit.burst_capacity).unwrap_or(per_second);
        let quota = Quota::per_second(per_second).allow_burst(burst);
        let rate_limiter = Arc::new(RateLimiter::direct(quota));

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        let cache = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(config.cache_ttl_seconds))
            .build();

        info!(base_url = %base_url, "Bid API client ready");

        Ok(Self {
            http,
            base_url,
            token,
            rate_limiter,
            cache,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::InvalidUrl(format!("{path}: {e}")))
    }

    fn bid_url(&self, id: &EntityId) -> Result<Url, ApiError> {
        self.endpoint(&format!("{}/", id.as_str()))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        self.rate_limiter
            .until_ready_with_jitter(Jitter::up_to(Duration::from_millis(100)))
            .await;

        let response = request.bearer_auth(&self.token).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

#[async_trait]
impl BidApi for BidApiClient {
    async fn get_bid(&self, id: &EntityId) -> Result<Bid, ApiError> {
        if let Some(bid) = self.cache.get(id).await {
            debug!(bid_id = %id, "Cache hit");
            return Ok(bid);
        }

        let bid: Bid = self.send(self.http.get(self.bid_url(id)?)).await?;
        self.cache.insert(id.clone(), bid.clone()).await;
        Ok(bid)
    }

    async fn list_bids(&self, query: &BidQuery) -> Result<Page<Bid>, ApiError> {
        let request = self
            .http
            .get(self.base_url.clone())
            .query(&query.to_query_pairs());
        self.send(request).await
    }

    async fn update_bid_status(&self, id: &EntityId, status: BidStatus) -> Result<Bid, ApiError> {
        let body = StatusUpdate {
            status,
            updated_at: chrono::Utc::now(),
        };
        let request = self.http.patch(self.bid_url(id)?).json(&body);

        // stale either way once a write was attempted
        let result = self.send::<Bid>(request).await;
        self.cache.invalidate(id).await;

        let bid = result?;
        info!(bid_id = %id, status = %bid.status, "Bid status updated");
        Ok(bid)
    }

    async fn list_customers(&self, query: &BidQuery) -> Result<Page<Customer>, ApiError> {
        let request = self
            .http
            .get(self.endpoint("customers/")?)
            .query(&query.to_query_pairs());
        self.send(request).await
    }

    async fn invalidate(&self, id: &EntityId) {
        self.cache.invalidate(id).await;
        debug!(bid_id = %id, "Cached bid invalidated");
    }
}
