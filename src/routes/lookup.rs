// Route lookup engine with longest prefix matching

use std::net::Ipv4Addr;

use super::RouteRecord;
use super::prefix::{MAX_PREFIX_LEN, PrefixKey, mask_bits};
use super::store::RouteStore;

/// Read-side view over a [`RouteStore`].
///
/// Lookups probe at most one bucket per prefix length, from /32 down to /0,
/// with a single hashed lookup in each. Each bucket is read under its own
/// lock, so a route written concurrently may or may not be seen, but a
/// partially written one never is.
pub struct RouteEngine<'a> {
    store: &'a RouteStore,
}

/// A lookup hit along with the prefix it matched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub prefix: PrefixKey,
    pub route: RouteRecord,
}

impl<'a> RouteEngine<'a> {
    pub fn new(store: &'a RouteStore) -> Self {
        RouteEngine { store }
    }

    /// Find the best matching route for a destination using longest prefix matching
    pub fn lookup(&self, dest: Ipv4Addr) -> Option<RouteRecord> {
        self.lookup_match(dest).map(|m| m.route)
    }

    pub fn lookup_match(&self, dest: Ipv4Addr) -> Option<RouteMatch> {
        let addr = u32::from(dest);

        for len in (0..=MAX_PREFIX_LEN).rev() {
            if !self.store.is_occupied(len) {
                continue;
            }

            let network = addr & mask_bits(len);
            if let Some(route) = self.store.bucket(len).get(&network) {
                return Some(RouteMatch {
                    prefix: PrefixKey::new(Ipv4Addr::from(network), len).ok()?,
                    route: route.clone(),
                });
            }
        }

        None
    }

    /// Route stored under exactly this prefix. Never falls back to a shorter one.
    pub fn lookup_exact(&self, key: &PrefixKey) -> Option<RouteRecord> {
        self.store
            .bucket(key.prefix_len())
            .get(&key.network_bits())
            .cloned()
    }
}
