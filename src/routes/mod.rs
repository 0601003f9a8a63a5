// Routes module - route records, the prefix-bucketed store and lookups

pub mod lookup;
pub mod parser;
pub mod prefix;
pub mod store;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

use crate::error::RouteError;
use prefix::{PrefixKey, parse_addr};

/// A single route. On the wire it is a [`WireRoute`] with dotted-quad strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "WireRoute", try_from = "WireRoute")]
pub struct RouteRecord {
    pub destination: Ipv4Addr,
    pub mask: Ipv4Addr,
    pub next_hop: Ipv4Addr,
    /// Lower is preferred
    pub metric: u32,
    pub interface: String,
}

impl RouteRecord {
    pub fn new(
        destination: Ipv4Addr,
        mask: Ipv4Addr,
        next_hop: Ipv4Addr,
        metric: u32,
        interface: impl Into<String>,
    ) -> Self {
        RouteRecord {
            destination,
            mask,
            next_hop,
            metric,
            interface: interface.into(),
        }
    }

    /// Fails with `InvalidMask` when the mask has gaps.
    pub fn prefix_key(&self) -> Result<PrefixKey, RouteError> {
        PrefixKey::from_mask(self.destination, self.mask)
    }

    /// Clear host bits in the destination, returning the record and its key.
    pub fn normalize(mut self) -> Result<(PrefixKey, Self), RouteError> {
        let key = self.prefix_key()?;
        self.destination = key.network();
        Ok((key, self))
    }
}

/// `ip route` style: `192.168.100.0/24 via 168.192.100.1 dev eth0 metric 1`
impl fmt::Display for RouteRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.prefix_key() {
            Ok(key) => write!(f, "{}", key)?,
            Err(_) => write!(f, "{} mask {}", self.destination, self.mask)?,
        }
        write!(f, " via {}", self.next_hop)?;
        if !self.interface.is_empty() {
            write!(f, " dev {}", self.interface)?;
        }
        write!(f, " metric {}", self.metric)
    }
}

/// Route as exchanged with remote callers and stored in route files.
///
/// Every field defaults when absent, so a missing address surfaces as an
/// unparseable empty string rather than a decode failure for the whole message.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WireRoute {
    pub dest: String,
    pub mask: String,
    pub nh: String,
    pub metric: i32,
    pub interface: String,
}

impl TryFrom<WireRoute> for RouteRecord {
    type Error = RouteError;

    fn try_from(wire: WireRoute) -> Result<Self, Self::Error> {
        let metric = u32::try_from(wire.metric).map_err(|_| RouteError::NegativeMetric(wire.metric))?;
        Ok(RouteRecord {
            destination: parse_addr(&wire.dest)?,
            mask: parse_addr(&wire.mask)?,
            next_hop: parse_addr(&wire.nh)?,
            metric,
            interface: wire.interface,
        })
    }
}

impl From<RouteRecord> for WireRoute {
    fn from(route: RouteRecord) -> Self {
        WireRoute {
            dest: route.destination.to_string(),
            mask: route.mask.to_string(),
            nh: route.next_hop.to_string(),
            metric: i32::try_from(route.metric).unwrap_or(i32::MAX),
            interface: route.interface,
        }
    }
}

/// A whole table: the snapshot document served to callers and the bootstrap
/// file format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingTable {
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub timestamp: String,
    pub routes: Vec<WireRoute>,
}

impl RoutingTable {
    pub fn new(routes: Vec<WireRoute>) -> Self {
        RoutingTable {
            hostname: get_hostname(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            routes,
        }
    }
}

pub(crate) fn get_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(dest: &str, mask: &str) -> WireRoute {
        WireRoute {
            dest: dest.to_string(),
            mask: mask.to_string(),
            nh: "10.1.1.1".to_string(),
            metric: 1,
            interface: "eth0".to_string(),
        }
    }

    #[test]
    fn test_wire_to_record() {
        let route = RouteRecord::try_from(wire("192.168.100.0", "255.255.255.0")).unwrap();
        assert_eq!(route.destination, Ipv4Addr::new(192, 168, 100, 0));
        assert_eq!(route.next_hop, Ipv4Addr::new(10, 1, 1, 1));
        assert_eq!(route.metric, 1);
    }

    #[test]
    fn test_wire_rejects_bad_fields() {
        assert!(matches!(
            RouteRecord::try_from(wire("192.168.300.0", "255.255.255.0")),
            Err(RouteError::InvalidAddress(_))
        ));
        assert!(matches!(
            RouteRecord::try_from(WireRoute::default()),
            Err(RouteError::InvalidAddress(_))
        ));

        let mut negative = wire("10.0.0.0", "255.0.0.0");
        negative.metric = -5;
        assert_eq!(RouteRecord::try_from(negative), Err(RouteError::NegativeMetric(-5)));
    }

    #[test]
    fn test_record_json_uses_wire_names() {
        let route = RouteRecord::try_from(wire("0.0.0.0", "0.0.0.0")).unwrap();
        let json = serde_json::to_value(&route).unwrap();
        assert_eq!(json["dest"], "0.0.0.0");
        assert_eq!(json["nh"], "10.1.1.1");
        assert_eq!(json["interface"], "eth0");
    }

    #[test]
    fn test_missing_fields_default() {
        let parsed: WireRoute = serde_json::from_str(r#"{"dest":"10.0.0.0"}"#).unwrap();
        assert_eq!(parsed.metric, 0);
        assert!(parsed.mask.is_empty());
    }

    #[test]
    fn test_display() {
        let route = RouteRecord::try_from(wire("192.168.100.0", "255.255.255.0")).unwrap();
        assert_eq!(route.to_string(), "192.168.100.0/24 via 10.1.1.1 dev eth0 metric 1");
    }

    #[test]
    fn test_normalize_masks_destination() {
        let route = RouteRecord::new(
            Ipv4Addr::new(10, 20, 30, 40),
            Ipv4Addr::new(255, 255, 0, 0),
            Ipv4Addr::new(10, 0, 0, 1),
            5,
            "eth1",
        );
        let (key, route) = route.normalize().unwrap();
        assert_eq!(route.destination, Ipv4Addr::new(10, 20, 0, 0));
        assert_eq!(key.to_string(), "10.20.0.0/16");
    }
}
