// Concurrent route store, partitioned by prefix length
//
// Each of the 33 prefix lengths owns its own bucket behind its own lock, so
// lookups probing different lengths never contend and readers only wait on
// writers touching the same length.

use parking_lot::{RwLock, RwLockReadGuard};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use super::RouteRecord;
use super::prefix::{MAX_PREFIX_LEN, PrefixKey};
use crate::error::RouteError;

const BUCKET_COUNT: usize = MAX_PREFIX_LEN as usize + 1;

/// Routes of one prefix length, keyed by masked destination
pub(crate) type Bucket = HashMap<u32, RouteRecord>;

/// A record that `bulk_insert` refused to store
#[derive(Debug, Clone)]
pub struct Rejection {
    /// Position of the route in the input sequence
    pub index: usize,
    pub route: RouteRecord,
    pub reason: RouteError,
}

#[derive(Debug, Clone, Default)]
pub struct BulkInsertOutcome {
    pub accepted: usize,
    pub rejected: Vec<Rejection>,
}

/// Number of routes held at one prefix length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BucketStats {
    pub prefix_len: u8,
    pub routes: usize,
}

pub struct RouteStore {
    buckets: [RwLock<Bucket>; BUCKET_COUNT],
    /// Bit `n` is set while bucket `n` holds at least one route. Only changed
    /// with that bucket's write lock held.
    occupied: AtomicU64,
}

impl RouteStore {
    pub fn new() -> Self {
        RouteStore {
            buckets: std::array::from_fn(|_| RwLock::new(HashMap::new())),
            occupied: AtomicU64::new(0),
        }
    }

    /// Store a route, replacing any route with the same prefix key.
    ///
    /// The destination is normalized against its mask before storing. A mask
    /// with gaps, or a metric the wire format cannot carry, is rejected and
    /// nothing is written.
    pub fn insert(&self, route: RouteRecord) -> Result<PrefixKey, RouteError> {
        if i32::try_from(route.metric).is_err() {
            return Err(RouteError::MetricOutOfRange(route.metric));
        }
        let (key, route) = route.normalize()?;
        let len = key.prefix_len();

        let replaced = {
            let mut bucket = self.buckets[usize::from(len)].write();
            let previous = bucket.insert(key.network_bits(), route);
            self.occupied.fetch_or(1 << len, Ordering::AcqRel);
            previous
        };

        if replaced.is_some() {
            tracing::debug!("Replaced route {}", key);
        } else {
            tracing::debug!("Added route {}", key);
        }
        Ok(key)
    }

    /// Insert every route independently. A rejected route never prevents the
    /// rest from being stored.
    pub fn bulk_insert<I>(&self, routes: I) -> BulkInsertOutcome
    where
        I: IntoIterator<Item = RouteRecord>,
    {
        let mut outcome = BulkInsertOutcome::default();

        for (index, route) in routes.into_iter().enumerate() {
            match self.insert(route.clone()) {
                Ok(_) => outcome.accepted += 1,
                Err(reason) => {
                    tracing::warn!("Rejected route to {}: {}", route.destination, reason);
                    outcome.rejected.push(Rejection { index, route, reason });
                }
            }
        }

        outcome
    }

    /// Remove the route with exactly this key. Returns whether one existed.
    pub fn delete(&self, key: &PrefixKey) -> bool {
        let len = key.prefix_len();
        let mut bucket = self.buckets[usize::from(len)].write();
        let removed = bucket.remove(&key.network_bits()).is_some();
        if bucket.is_empty() {
            self.occupied.fetch_and(!(1 << len), Ordering::AcqRel);
        }
        drop(bucket);

        if removed {
            tracing::debug!("Deleted route {}", key);
        }
        removed
    }

    /// Copy of every route, longest prefix first, then by destination.
    ///
    /// Each bucket is copied under its own read lock; the result is not a
    /// single atomic view across buckets.
    pub fn snapshot(&self) -> Vec<RouteRecord> {
        let mut routes = Vec::new();

        for bucket in self.buckets.iter().rev() {
            let mut entries: Vec<(u32, RouteRecord)> = bucket
                .read()
                .iter()
                .map(|(network, route)| (*network, route.clone()))
                .collect();
            entries.sort_unstable_by_key(|(network, _)| *network);
            routes.extend(entries.into_iter().map(|(_, route)| route));
        }

        routes
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(|bucket| bucket.read().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.occupied.load(Ordering::Acquire) == 0
    }

    /// Route counts for every non-empty prefix length, longest first
    pub fn stats(&self) -> Vec<BucketStats> {
        (0..=MAX_PREFIX_LEN)
            .rev()
            .filter_map(|len| {
                let routes = self.buckets[usize::from(len)].read().len();
                (routes > 0).then_some(BucketStats { prefix_len: len, routes })
            })
            .collect()
    }

    /// Whether bucket `len` held a route the last time anyone wrote to it
    pub(crate) fn is_occupied(&self, len: u8) -> bool {
        self.occupied.load(Ordering::Acquire) & (1 << len) != 0
    }

    pub(crate) fn bucket(&self, len: u8) -> RwLockReadGuard<'_, Bucket> {
        self.buckets[usize::from(len)].read()
    }
}

impl Default for RouteStore {
    fn default() -> Self {
        Self::new()
    }
}
