use serde::{Deserialize, Serialize};

use crate::workflow::BidStatus;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// One page of a list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub results: Vec<T>,
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub next: Option<String>,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.next.as_deref().is_some_and(|next| !next.is_empty())
    }
}

/// Filters and paging for `GET /bids/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BidQuery {
    pub page: u32,
    page_size: u32,
    pub status: Option<BidStatus>,
    pub business_unit: Option<String>,
    pub priority: Option<String>,
    pub region: Option<String>,
    pub search: Option<String>,
    pub ordering: Option<String>,
}

impl Default for BidQuery {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            status: None,
            business_unit: None,
            priority: None,
            region: None,
            search: None,
            ordering: None,
        }
    }
}

impl BidQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clamped to 1..=100 like the server's paginator.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self
    }

    pub fn with_status(mut self, status: BidStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn next_page(&self) -> Self {
        let mut next = self.clone();
        next.page += 1;
        next
    }

    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.page.to_string()),
            ("page_size", self.page_size.to_string()),
        ];
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_string()));
        }
        let optional = [
            ("business_unit", &self.business_unit),
            ("priority", &self.priority),
            ("region", &self.region),
            ("search", &self.search),
            ("ordering", &self.ordering),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                pairs.push((key, value.clone()));
            }
        }
        pairs
    }
}

/// Body of `PATCH /bids/{id}/`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusUpdate {
    pub status: BidStatus,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}
