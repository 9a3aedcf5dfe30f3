//! Gateway to the ad platform's Graph-style REST API: bearer-token
//! injection, cursor pagination, batched multi-resource requests, status
//! mutation, and uniform error classification.

pub mod api;
pub mod batch;
pub mod classify;
pub mod client;
pub mod pagination;
pub mod retry;

pub use api::{AccountBundle, GraphApi};
pub use client::GraphClient;
pub use retry::RetryPolicy;
