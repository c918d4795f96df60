use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use clap::Parser;
use stubdns::config::{DEFAULT_BIND, DEFAULT_MAX_IN_FLIGHT};
use stubdns::{server, Config, DnsError, PLACEHOLDER_ADDRESS};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "stubdns")]
#[command(about = "Stub DNS server that answers locally or forwards to a resolver")]
struct Cli {
    /// Address to listen on
    #[arg(short, long, default_value_t = DEFAULT_BIND)]
    bind: SocketAddr,

    /// Upstream resolver to forward to (e.g. 8.8.8.8:53)
    #[arg(short, long, value_name = "HOST:PORT")]
    resolver: Option<String>,

    /// Timeout for each upstream exchange, in milliseconds
    #[arg(long, default_value_t = 2000)]
    timeout_ms: u64,

    /// Address returned for locally answered questions
    #[arg(long, default_value_t = PLACEHOLDER_ADDRESS)]
    placeholder: Ipv4Addr,

    /// Maximum number of requests handled at once
    #[arg(long, default_value_t = DEFAULT_MAX_IN_FLIGHT)]
    max_in_flight: usize,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    async fn into_config(self) -> Result<Config, DnsError> {
        let upstream = match self.resolver {
            Some(resolver) => Some(resolve_upstream(&resolver).await?),
            None => None,
        };

        Ok(Config {
            bind: self.bind,
            upstream,
            upstream_timeout: Duration::from_millis(self.timeout_ms),
            placeholder: self.placeholder,
            max_in_flight: self.max_in_flight,
        })
    }
}

async fn resolve_upstream(resolver: &str) -> Result<SocketAddr, DnsError> {
    tokio::net::lookup_host(resolver)
        .await?
        .next()
        .ok_or_else(|| {
            DnsError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("resolver {resolver} has no address"),
            ))
        })
}

#[tokio::main]
async fn main() -> Result<(), DnsError> {
    let cli = Cli::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = cli.into_config().await?;
    match config.upstream {
        Some(upstream) => info!(%upstream, "forwarding to upstream resolver"),
        None => info!(placeholder = %config.placeholder, "answering locally"),
    }

    let shutdown = CancellationToken::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => on_signal.cancel(),
            Err(e) => error!(error = %e, "failed to listen for ctrl-c"),
        }
    });

    server::run(config, shutdown).await
}
