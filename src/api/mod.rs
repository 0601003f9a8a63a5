// API module - HTTP endpoints for the route service

pub mod ndjson;
pub mod rest;

use serde::{Deserialize, Serialize};

use crate::routes::store::BucketStats;

/// A destination network as sent by GetRoute callers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Destination {
    pub network: String,
    pub mask: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LookupQuery {
    pub address: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub removed: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub instance_id: String,
    pub hostname: String,
    pub started_at: String,
    pub route_count: usize,
    pub prefix_lengths: Vec<BucketStats>,
}
