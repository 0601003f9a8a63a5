// Service facade: the two remote operations plus table maintenance, on top
// of a shared route store

use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::sync::Arc;
use thiserror::Error;

use crate::error::RouteError;
use crate::routes::lookup::RouteEngine;
use crate::routes::prefix::{PrefixKey, parse_addr};
use crate::routes::store::RouteStore;
use crate::routes::{RouteRecord, RoutingTable, WireRoute};

/// Routes buffered from a stream before they are handed to the store together
const MAX_BATCH: usize = 64;

/// Something a route stream yielded other than a route
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    /// One item could not be decoded. Rejected on its own; the stream goes on.
    #[error("malformed route: {0}")]
    Malformed(String),

    /// The stream itself failed. Nothing after this point is read.
    #[error("stream interrupted: {0}")]
    Interrupted(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedRoute {
    /// Position in the submitted stream, starting at 0
    pub index: usize,
    /// Absent when the item could not be decoded at all
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub route: Option<WireRoute>,
    pub reason: String,
}

/// Outcome of an AddRoutes call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddRoutesResult {
    pub accepted_count: usize,
    pub rejected: Vec<RejectedRoute>,
    /// Set when the stream broke off. Routes accepted before that stay applied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interrupted: Option<String>,
}

#[derive(Clone)]
pub struct RouteService {
    store: Arc<RouteStore>,
}

impl RouteService {
    pub fn new(store: Arc<RouteStore>) -> Self {
        RouteService { store }
    }

    pub fn store(&self) -> &RouteStore {
        &self.store
    }

    fn engine(&self) -> RouteEngine<'_> {
        RouteEngine::new(&self.store)
    }

    /// Apply a stream of candidate routes.
    ///
    /// Items are committed in batches of whatever is already available, so
    /// dropping the future mid-stream leaves every earlier batch applied.
    pub async fn add_routes<S>(&self, routes: S) -> AddRoutesResult
    where
        S: Stream<Item = Result<WireRoute, FeedError>>,
    {
        let mut result = AddRoutesResult::default();
        let mut batches = std::pin::pin!(routes.ready_chunks(MAX_BATCH));
        let mut next_index = 0;

        while let Some(batch) = batches.next().await {
            let len = batch.len();
            if !self.apply_batch(next_index, batch, &mut result) {
                break;
            }
            next_index += len;
        }

        if let Some(reason) = &result.interrupted {
            tracing::warn!(
                "Route stream interrupted after {} accepted route(s): {}",
                result.accepted_count,
                reason
            );
        } else {
            tracing::info!(
                "Applied {} route(s), rejected {}",
                result.accepted_count,
                result.rejected.len()
            );
        }
        result
    }

    /// Apply an in-memory batch, e.g. routes read from a file at startup
    pub fn load<I>(&self, routes: I) -> AddRoutesResult
    where
        I: IntoIterator<Item = WireRoute>,
    {
        let mut result = AddRoutesResult::default();
        self.apply_batch(0, routes.into_iter().map(Ok).collect(), &mut result);
        result
    }

    /// Returns false once an interruption has been recorded.
    fn apply_batch(
        &self,
        first_index: usize,
        batch: Vec<Result<WireRoute, FeedError>>,
        result: &mut AddRoutesResult,
    ) -> bool {
        let mut records = Vec::with_capacity(batch.len());
        let mut positions = Vec::with_capacity(batch.len());
        let mut rejected = Vec::new();
        let mut completed = true;

        for (offset, item) in batch.into_iter().enumerate() {
            let index = first_index + offset;
            match item {
                Ok(wire) => match RouteRecord::try_from(wire.clone()) {
                    Ok(record) => {
                        records.push(record);
                        positions.push(index);
                    }
                    Err(e) => {
                        tracing::warn!("Rejected route #{}: {}", index, e);
                        rejected.push(RejectedRoute {
                            index,
                            route: Some(wire),
                            reason: e.to_string(),
                        });
                    }
                },
                Err(FeedError::Malformed(reason)) => {
                    tracing::warn!("Rejected route #{}: {}", index, reason);
                    rejected.push(RejectedRoute {
                        index,
                        route: None,
                        reason: FeedError::Malformed(reason).to_string(),
                    });
                }
                Err(FeedError::Interrupted(reason)) => {
                    result.interrupted = Some(reason);
                    completed = false;
                    break;
                }
            }
        }

        let outcome = self.store.bulk_insert(records);
        result.accepted_count += outcome.accepted;
        rejected.extend(outcome.rejected.into_iter().map(|r| RejectedRoute {
            index: positions[r.index],
            route: Some(r.route.into()),
            reason: r.reason.to_string(),
        }));
        rejected.sort_by_key(|r| r.index);
        result.rejected.extend(rejected);

        completed
    }

    /// Longest-prefix match for the masked network. NotFound is `Ok(None)`.
    pub fn get_route(&self, network: &str, mask: &str) -> Result<Option<RouteRecord>, RouteError> {
        let key = PrefixKey::from_mask(parse_addr(network)?, parse_addr(mask)?)?;
        Ok(self.engine().lookup(key.network()))
    }

    pub fn lookup_address(&self, address: Ipv4Addr) -> Option<RouteRecord> {
        self.engine().lookup(address)
    }

    pub fn get_exact(&self, network: &str, mask: &str) -> Result<Option<RouteRecord>, RouteError> {
        let key = PrefixKey::from_mask(parse_addr(network)?, parse_addr(mask)?)?;
        Ok(self.engine().lookup_exact(&key))
    }

    pub fn remove_route(&self, network: &str, mask: &str) -> Result<bool, RouteError> {
        let key = PrefixKey::from_mask(parse_addr(network)?, parse_addr(mask)?)?;
        Ok(self.store.delete(&key))
    }

    pub fn table(&self) -> RoutingTable {
        RoutingTable::new(self.store.snapshot().into_iter().map(WireRoute::from).collect())
    }
}
