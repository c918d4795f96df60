use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::PLACEHOLDER_ADDRESS;

pub const DEFAULT_BIND: SocketAddr =
    SocketAddr::new(std::net::IpAddr::V4(Ipv4Addr::LOCALHOST), 2053);

pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(2);

pub const DEFAULT_MAX_IN_FLIGHT: usize = 256;

#[derive(Debug, Clone)]
pub struct Config {
    /// Where the server listens.
    pub bind: SocketAddr,
    /// Resolver to forward to. Without one the server answers every standard
    /// query itself with `placeholder`.
    pub upstream: Option<SocketAddr>,
    /// Bound on each single-question exchange with the upstream.
    pub upstream_timeout: Duration,
    pub placeholder: Ipv4Addr,
    /// Datagrams handled at once before the receive loop waits.
    pub max_in_flight: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND,
            upstream: None,
            upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT,
            placeholder: PLACEHOLDER_ADDRESS,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_local_stub() {
        let config = Config::default();
        assert_eq!(config.bind.to_string(), "127.0.0.1:2053");
        assert!(config.upstream.is_none());
        assert_eq!(config.placeholder, Ipv4Addr::new(8, 8, 8, 8));
    }
}
