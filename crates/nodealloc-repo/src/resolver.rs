//! Name resolution used while allocating addresses to new nodes.
//!
//! [`StaticNameResolver`] answers forward and reverse lookups from
//! `/etc/hosts`-format content, so allocation is reproducible without
//! touching system DNS.

use std::collections::HashMap;
use std::net::IpAddr;

use crate::error::IpAllocationError;

/// Forward and reverse hostname resolution.
pub trait NameResolver: Send + Sync {
    /// Returns the hostname `ip` resolves to, if any.
    fn resolve_hostname(&self, ip: IpAddr) -> Result<Option<String>, IpAllocationError>;

    /// Returns every address `hostname` resolves to.
    fn resolve_all(&self, hostname: &str) -> Result<Vec<IpAddr>, IpAllocationError>;
}

/// Resolver backed by parsed `/etc/hosts` entries.
#[derive(Clone, Debug, Default)]
pub struct StaticNameResolver {
    forward: HashMap<String, Vec<IpAddr>>,
    reverse: HashMap<IpAddr, String>,
}

impl StaticNameResolver {
    /// Parse `/etc/hosts`-format content.
    ///
    /// Each non-comment, non-empty line is `<IP> <hostname1> [hostname2 ...]`.
    /// The first hostname on a line is the canonical name for reverse
    /// lookups of that IP; later lines do not override it.
    pub fn parse(content: &str) -> Self {
        let mut resolver = Self::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let mut parts = line.split_whitespace();
            let Some(ip_str) = parts.next() else {
                continue;
            };
            let Ok(ip) = ip_str.parse::<IpAddr>() else {
                tracing::debug!(line = %line, "skipping hosts line with invalid IP");
                continue;
            };

            for hostname in parts {
                if hostname.starts_with('#') {
                    break;
                }
                let hostname = hostname.to_lowercase();
                resolver.reverse.entry(ip).or_insert_with(|| hostname.clone());
                resolver.forward.entry(hostname).or_default().push(ip);
            }
        }

        resolver
    }

    /// Adds a single mapping in both directions.
    pub fn with_entry(mut self, hostname: &str, ip: IpAddr) -> Self {
        let hostname = hostname.to_lowercase();
        self.reverse.entry(ip).or_insert_with(|| hostname.clone());
        self.forward.entry(hostname).or_default().push(ip);
        self
    }
}

impl NameResolver for StaticNameResolver {
    fn resolve_hostname(&self, ip: IpAddr) -> Result<Option<String>, IpAllocationError> {
        Ok(self.reverse.get(&ip).cloned())
    }

    fn resolve_all(&self, hostname: &str) -> Result<Vec<IpAddr>, IpAllocationError> {
        Ok(self
            .forward
            .get(&hostname.to_lowercase())
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    #[test]
    fn parse_empty_content() {
        let resolver = StaticNameResolver::parse("");
        assert!(resolver.resolve_all("anything").unwrap().is_empty());
    }

    #[test]
    fn parse_skips_comments_and_invalid_lines() {
        let resolver = StaticNameResolver::parse("# comment\nnot-an-ip host\n10.0.0.1 a # trailing\n");
        assert_eq!(
            resolver.resolve_all("a").unwrap(),
            vec![IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))]
        );
        assert!(resolver.resolve_all("host").unwrap().is_empty());
        assert!(resolver.resolve_all("trailing").unwrap().is_empty());
    }

    #[test]
    fn reverse_lookup_uses_first_name() {
        let resolver = StaticNameResolver::parse("10.0.0.1 node1.example.com node1\n");
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(
            resolver.resolve_hostname(ip).unwrap().as_deref(),
            Some("node1.example.com")
        );
        assert_eq!(resolver.resolve_all("node1").unwrap(), vec![ip]);
    }

    #[test]
    fn dual_stack_hostname_collects_both_addresses() {
        let resolver = StaticNameResolver::parse("::1:1 child1\n10.0.0.11 child1\n");
        let all = resolver.resolve_all("CHILD1").unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.contains(&IpAddr::V6(Ipv6Addr::new(0, 0, 0, 0, 0, 0, 1, 1))));
    }

    #[test]
    fn unknown_address_resolves_to_none() {
        let resolver = StaticNameResolver::default().with_entry("a", IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert!(
            resolver
                .resolve_hostname(IpAddr::V4(Ipv4Addr::new(10, 9, 9, 9)))
                .unwrap()
                .is_none()
        );
    }
}
