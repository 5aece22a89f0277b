// REST access to the bids service

pub mod client;
pub mod errors;
pub mod types;

pub use client::{fetch_all_bids, fetch_all_customers, BidApi, BidApiClient};
pub use errors::ApiError;
pub use types::{BidQuery, Page, StatusUpdate, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
