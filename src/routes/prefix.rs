// Prefix keys: a masked IPv4 network plus its prefix length

use std::cmp::Ordering;
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use crate::error::RouteError;

pub const MAX_PREFIX_LEN: u8 = 32;

/// Canonical identity of a route: the destination with its host bits cleared,
/// and the number of significant leading bits.
///
/// Keys order by prefix length descending, then network ascending, which is
/// the order routes are reported in a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrefixKey {
    network: u32,
    len: u8,
}

impl PrefixKey {
    /// Build a key, clearing any host bits in `network`.
    pub fn new(network: Ipv4Addr, len: u8) -> Result<Self, RouteError> {
        if len > MAX_PREFIX_LEN {
            return Err(RouteError::InvalidPrefixLength(len));
        }
        Ok(PrefixKey {
            network: u32::from(network) & mask_bits(len),
            len,
        })
    }

    /// Build a key from a dotted-quad subnet mask.
    pub fn from_mask(network: Ipv4Addr, mask: Ipv4Addr) -> Result<Self, RouteError> {
        Self::new(network, prefix_len(mask)?)
    }

    pub fn network(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.network)
    }

    pub(crate) fn network_bits(&self) -> u32 {
        self.network
    }

    pub fn prefix_len(&self) -> u8 {
        self.len
    }

    pub fn mask(&self) -> Ipv4Addr {
        Ipv4Addr::from(mask_bits(self.len))
    }

    /// Whether `addr` falls inside this prefix
    pub fn covers(&self, addr: Ipv4Addr) -> bool {
        u32::from(addr) & mask_bits(self.len) == self.network
    }
}

impl Ord for PrefixKey {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .len
            .cmp(&self.len)
            .then_with(|| self.network.cmp(&other.network))
    }
}

impl PartialOrd for PrefixKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PrefixKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network(), self.len)
    }
}

impl FromStr for PrefixKey {
    type Err = RouteError;

    /// Parses `a.b.c.d/len`, `default`, or a bare address (treated as /32).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "default" {
            return PrefixKey::new(Ipv4Addr::UNSPECIFIED, 0);
        }

        let (addr, len) = match s.split_once('/') {
            Some((addr, len)) => {
                let len = len
                    .parse::<u8>()
                    .map_err(|_| RouteError::InvalidCidr(s.to_string()))?;
                (addr, len)
            }
            None => (s, MAX_PREFIX_LEN),
        };

        let addr = addr
            .parse::<Ipv4Addr>()
            .map_err(|_| RouteError::InvalidCidr(s.to_string()))?;
        PrefixKey::new(addr, len)
    }
}

/// Bit pattern of a `len`-bit prefix mask
pub fn mask_bits(len: u8) -> u32 {
    match len {
        0 => 0,
        l if l >= MAX_PREFIX_LEN => u32::MAX,
        l => u32::MAX << (MAX_PREFIX_LEN - l),
    }
}

/// Prefix length of a subnet mask. The mask must be a run of ones followed by
/// a run of zeros.
pub fn prefix_len(mask: Ipv4Addr) -> Result<u8, RouteError> {
    let bits = u32::from(mask);
    let ones = bits.leading_ones();
    if ones + bits.trailing_zeros() != u32::from(MAX_PREFIX_LEN) {
        return Err(RouteError::InvalidMask(mask));
    }
    Ok(ones as u8)
}

/// Parse a dotted-quad address field
pub fn parse_addr(s: &str) -> Result<Ipv4Addr, RouteError> {
    s.trim()
        .parse()
        .map_err(|_| RouteError::InvalidAddress(s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_len_contiguous() {
        assert_eq!(prefix_len(Ipv4Addr::new(0, 0, 0, 0)), Ok(0));
        assert_eq!(prefix_len(Ipv4Addr::new(255, 0, 0, 0)), Ok(8));
        assert_eq!(prefix_len(Ipv4Addr::new(255, 255, 255, 0)), Ok(24));
        assert_eq!(prefix_len(Ipv4Addr::new(255, 255, 255, 252)), Ok(30));
        assert_eq!(prefix_len(Ipv4Addr::new(255, 255, 255, 255)), Ok(32));
    }

    #[test]
    fn test_prefix_len_rejects_gaps() {
        let mask = Ipv4Addr::new(255, 0, 255, 0);
        assert_eq!(prefix_len(mask), Err(RouteError::InvalidMask(mask)));
        assert!(prefix_len(Ipv4Addr::new(0, 0, 0, 255)).is_err());
        assert!(prefix_len(Ipv4Addr::new(255, 255, 255, 253)).is_err());
    }

    #[test]
    fn test_key_clears_host_bits() {
        let key = PrefixKey::from_mask(
            Ipv4Addr::new(192, 168, 100, 77),
            Ipv4Addr::new(255, 255, 255, 0),
        )
        .unwrap();
        assert_eq!(key.network(), Ipv4Addr::new(192, 168, 100, 0));
        assert_eq!(key.prefix_len(), 24);
        assert_eq!(key.mask(), Ipv4Addr::new(255, 255, 255, 0));
    }

    #[test]
    fn test_covers() {
        let key: PrefixKey = "10.1.0.0/16".parse().unwrap();
        assert!(key.covers(Ipv4Addr::new(10, 1, 200, 3)));
        assert!(!key.covers(Ipv4Addr::new(10, 2, 0, 1)));

        let default: PrefixKey = "default".parse().unwrap();
        assert!(default.covers(Ipv4Addr::new(8, 8, 8, 8)));
    }

    #[test]
    fn test_parse_cidr() {
        let key: PrefixKey = "192.168.1.0/24".parse().unwrap();
        assert_eq!(key.to_string(), "192.168.1.0/24");

        let host: PrefixKey = "10.0.0.1".parse().unwrap();
        assert_eq!(host.prefix_len(), 32);

        assert!("10.0.0.0/33".parse::<PrefixKey>().is_err());
        assert!("10.0.0/8".parse::<PrefixKey>().is_err());
        assert!("10.0.0.0/x".parse::<PrefixKey>().is_err());
    }

    #[test]
    fn test_ordering_longest_first() {
        let mut keys: Vec<PrefixKey> = ["0.0.0.0/0", "10.0.0.0/8", "192.168.0.0/24", "10.0.0.0/24"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        keys.sort();

        let rendered: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
        assert_eq!(
            rendered,
            vec!["10.0.0.0/24", "192.168.0.0/24", "10.0.0.0/8", "0.0.0.0/0"]
        );
    }
}
