use clap::Parser;
use dnsres_infrastructure::DnsResolver;
use std::io::BufRead;
use tokio_util::sync::CancellationToken;
use tracing::info;

mod bootstrap;
mod server;

#[derive(Parser)]
#[command(name = "dnsres")]
#[command(version)]
#[command(about = "dnsres - long-running DNS resolution monitor")]
struct Cli {
    /// Configuration file path (default: auto-detect)
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<String>,

    /// Override the configured hostnames with a single entry
    #[arg(long)]
    host: Option<String>,

    /// Print the per-server statistics table and exit
    #[arg(long)]
    report: bool,

    /// Hostname to monitor (same as --host)
    hostname: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    bootstrap::init_logging();

    let host_override = cli.hostname.or(cli.host);
    let config = bootstrap::load_config(cli.config.as_deref(), host_override)?;

    let resolver = DnsResolver::new(config)?;
    if resolver.log_dir_was_fallback() {
        info!(
            dir = %resolver.log_dir().display(),
            "using fallback log directory (XDG state directory unavailable)"
        );
    }

    if cli.report {
        println!("{}", resolver.generate_report());
        return Ok(());
    }

    info!(
        hostnames = resolver.config().hostnames.len(),
        servers = resolver.config().dns_servers.len(),
        interval = %resolver.config().query_interval,
        "monitoring started"
    );
    println!("Press q then Enter to quit");

    let token = CancellationToken::new();
    spawn_signal_handler(token.clone());
    spawn_stdin_quit_handler(token.clone());

    server::spawn_observability_servers(&resolver, token.clone());

    resolver.start(token).await?;
    info!("shutdown complete");
    Ok(())
}

fn spawn_signal_handler(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            token.cancel();
        }
    });
}

/// Treat `q` + Enter on stdin as a graceful shutdown request.
fn spawn_stdin_quit_handler(token: CancellationToken) {
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if line.trim().eq_ignore_ascii_case("q") {
                info!("quit requested; shutting down");
                token.cancel();
                break;
            }
        }
    });
}
