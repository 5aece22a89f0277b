// Shared fakes for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use bidflow::api::{ApiError, BidApi, BidQuery, Page};
use bidflow::model::{Bid, Customer, EntityId};
use bidflow::realtime::{EventTransport, TransportFrame};
use bidflow::workflow::BidStatus;
use once_cell::sync::Lazy;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

static TRACING: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("bidflow=debug")
        .with_test_writer()
        .try_init();
});

pub fn init_tracing() {
    Lazy::force(&TRACING);
}

/// In-memory bids service. Status updates are recorded and either stored or
/// refused with the configured HTTP status.
#[derive(Default)]
pub struct InMemoryBidApi {
    bids: Mutex<HashMap<EntityId, Bid>>,
    customers: Vec<Customer>,
    pub updates: Mutex<Vec<(EntityId, BidStatus)>>,
    pub refuse_with: Option<u16>,
}

impl InMemoryBidApi {
    pub fn with_bids(bids: Vec<Bid>) -> Self {
        Self {
            bids: Mutex::new(bids.into_iter().map(|bid| (bid.id.clone(), bid)).collect()),
            ..Self::default()
        }
    }

    pub fn refusing(mut self, status: u16) -> Self {
        self.refuse_with = Some(status);
        self
    }

    pub fn with_customers(mut self, customers: Vec<Customer>) -> Self {
        self.customers = customers;
        self
    }

    pub fn update_count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }

    pub fn stored_status(&self, id: &EntityId) -> Option<BidStatus> {
        self.bids.lock().unwrap().get(id).map(|bid| bid.status)
    }
}

fn not_found(id: &EntityId) -> ApiError {
    ApiError::Status {
        status: 404,
        body: format!("bid {id} not found"),
    }
}

#[async_trait]
impl BidApi for InMemoryBidApi {
    async fn get_bid(&self, id: &EntityId) -> Result<Bid, ApiError> {
        self.bids
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| not_found(id))
    }

    async fn list_bids(&self, query: &BidQuery) -> Result<Page<Bid>, ApiError> {
        let mut all: Vec<Bid> = self.bids.lock().unwrap().values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        if let Some(status) = query.status {
            all.retain(|bid| bid.status == status);
        }

        let size = query.page_size() as usize;
        let start = (query.page.max(1) as usize - 1) * size;
        let results: Vec<Bid> = all.iter().skip(start).take(size).cloned().collect();
        let next = (start + results.len() < all.len()).then(|| format!("?page={}", query.page + 1));
        Ok(Page {
            results,
            count: Some(all.len() as u64),
            next,
        })
    }

    async fn update_bid_status(&self, id: &EntityId, status: BidStatus) -> Result<Bid, ApiError> {
        self.updates.lock().unwrap().push((id.clone(), status));
        if let Some(code) = self.refuse_with {
            return Err(ApiError::Status {
                status: code,
                body: "update refused".to_string(),
            });
        }

        let mut bids = self.bids.lock().unwrap();
        let bid = bids.get_mut(id).ok_or_else(|| not_found(id))?;
        bid.status = status;
        bid.updated_at = Some(chrono::Utc::now());
        Ok(bid.clone())
    }

    async fn list_customers(&self, _query: &BidQuery) -> Result<Page<Customer>, ApiError> {
        Ok(Page {
            results: self.customers.clone(),
            count: Some(self.customers.len() as u64),
            next: None,
        })
    }
}

/// Plays back a fixed list of frames, then ends the feed or stays silent.
pub struct ScriptedTransport {
    frames: VecDeque<TransportFrame>,
    hold_open: bool,
}

impl ScriptedTransport {
    pub fn new(frames: Vec<TransportFrame>) -> Self {
        Self {
            frames: frames.into(),
            hold_open: false,
        }
    }

    pub fn held_open(frames: Vec<TransportFrame>) -> Self {
        Self {
            frames: frames.into(),
            hold_open: true,
        }
    }
}

#[async_trait]
impl EventTransport for ScriptedTransport {
    async fn next_frame(&mut self) -> Option<TransportFrame> {
        match self.frames.pop_front() {
            Some(frame) => Some(frame),
            None if self.hold_open => std::future::pending().await,
            None => None,
        }
    }
}

pub fn text(json: &str) -> TransportFrame {
    TransportFrame::Text(json.to_string())
}
