#![allow(dead_code)]

mod dns_server_mock;

pub use dns_server_mock::{MockBehavior, MockDnsServer};

use dnsres_domain::{Config, Duration as ConfigDuration};

/// A config pointing at the given servers, with a short query timeout and
/// logs under a caller-owned temp directory.
pub fn test_config(servers: Vec<String>, hostnames: Vec<String>, log_dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.hostnames = hostnames;
    config.dns_servers = servers;
    config.query_timeout = ConfigDuration::from_millis(500);
    config.query_interval = ConfigDuration::from_secs(60);
    config.log_dir = log_dir.display().to_string();
    config
}
