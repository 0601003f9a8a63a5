// Route file loading: JSON routing-table documents and `ip route` text

use std::net::Ipv4Addr;
use std::path::Path;

use super::prefix::PrefixKey;
use super::{RoutingTable, WireRoute};
use crate::error::{AppError, AppResult};

/// Read a route file from disk. See [`parse_routing_table`] for the formats.
pub fn load_routing_table(path: &Path) -> AppResult<RoutingTable> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| AppError::Bootstrap(format!("{}: {}", path.display(), e)))?;
    parse_routing_table(&content)
}

/// Write a routing table as pretty JSON
pub fn save_routing_table(path: &Path, table: &RoutingTable) -> AppResult<()> {
    let json = serde_json::to_string_pretty(table)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Parse a route file. Content starting with `{` is a JSON [`RoutingTable`];
/// anything else is read as `ip route show` output.
pub fn parse_routing_table(content: &str) -> AppResult<RoutingTable> {
    if content.trim_start().starts_with('{') {
        return Ok(serde_json::from_str(content)?);
    }

    let routes = parse_ip_route(content)?;
    Ok(RoutingTable {
        hostname: String::new(),
        timestamp: String::new(),
        routes,
    })
}

/// Parse `ip route show` style lines, e.g.
/// `default via 10.1.1.1 dev eth0` or `192.168.1.0/24 dev eth1 metric 100`.
///
/// Lines without `via` are directly connected and get next hop 0.0.0.0.
/// Blank lines and `#` comments are skipped.
fn parse_ip_route(output: &str) -> AppResult<Vec<WireRoute>> {
    let mut routes = Vec::new();

    for (line_no, line) in output.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        // `ip route` may prefix the destination with a route type
        let dest_idx = match parts.first() {
            Some(&"unicast") => 1,
            _ => 0,
        };
        let destination: PrefixKey = parts
            .get(dest_idx)
            .copied()
            .unwrap_or_default()
            .parse()
            .map_err(|e| AppError::Bootstrap(format!("line {}: {}", line_no + 1, e)))?;

        let mut gateway = Ipv4Addr::UNSPECIFIED.to_string();
        let mut interface = String::new();
        let mut metric = 0;

        let mut i = dest_idx + 1;
        while i < parts.len() {
            match (parts[i], parts.get(i + 1)) {
                ("via", Some(gw)) => {
                    gateway = gw.to_string();
                    i += 2;
                }
                ("dev", Some(iface)) => {
                    interface = iface.to_string();
                    i += 2;
                }
                ("metric", Some(m)) => {
                    metric = m.parse().map_err(|_| {
                        AppError::Bootstrap(format!("line {}: invalid metric {:?}", line_no + 1, m))
                    })?;
                    i += 2;
                }
                _ => {
                    i += 1;
                }
            }
        }

        routes.push(WireRoute {
            dest: destination.network().to_string(),
            mask: destination.mask().to_string(),
            nh: gateway,
            metric,
            interface,
        });
    }

    Ok(routes)
}
