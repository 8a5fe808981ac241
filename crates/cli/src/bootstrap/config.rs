use dnsres_domain::config::resolve_config_path;
use dnsres_domain::Config;
use tracing::info;

/// Load configuration following the discovery order: explicit path,
/// `./config.json`, the XDG config file (created with defaults when
/// missing), then built-in defaults.
pub fn load_config(
    explicit: Option<&str>,
    host_override: Option<String>,
) -> anyhow::Result<Config> {
    let mut config = match resolve_config_path(explicit)? {
        Some((path, was_created)) => {
            if was_created {
                info!(path = %path.display(), "created default configuration file");
            }
            info!(path = %path.display(), "loading configuration");
            Config::load(&path)?
        }
        None => {
            info!("no configuration file found; using built-in defaults");
            Config::default()
        }
    };

    if let Some(host) = host_override {
        info!(host = %host, "hostname override enabled");
        config.hostnames = vec![host];
    }
    if config.hostnames.is_empty() {
        anyhow::bail!("hostname required: provide a domain as the first argument or use --host");
    }

    Ok(config)
}
