//! hbup-server - Hitbox Update Protocol server
//!
//! Binds a TCP listener and serves one isolated hitbox session per connection.

mod config;

use anyhow::Result;
use clap::Parser;
use config::ServerConfig;
use hbup_server::HbupServer;
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Hitbox Update Protocol server", long_about = None)]
struct Args {
    /// Configuration file (defaults to ./hbup.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen address
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Override the concurrent connection limit
    #[arg(long)]
    max_connections: Option<usize>,

    /// Write a JSONL exchange log per connection into this directory
    #[arg(long)]
    exchange_log_dir: Option<PathBuf>,
}

impl Args {
    fn apply(&self, cfg: &mut ServerConfig) {
        if let Some(bind) = self.bind {
            cfg.bind_addr = bind;
        }
        if let Some(max) = self.max_connections {
            cfg.max_connections = max;
        }
        if let Some(dir) = &self.exchange_log_dir {
            cfg.exchange_log_dir = Some(dir.clone());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with INFO level by default (can be overridden via RUST_LOG env var)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!("Starting hbup-server v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let mut cfg = ServerConfig::load(args.config.as_deref())?;
    args.apply(&mut cfg);

    let server = HbupServer::bind(cfg.bind_addr, cfg.server_options()).await?;
    server
        .run_until(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!(%err, "Failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_file_values() {
        let args = Args::parse_from([
            "hbup-server",
            "--bind",
            "0.0.0.0:4000",
            "--max-connections",
            "3",
            "--exchange-log-dir",
            "/tmp/hbup",
        ]);
        let mut cfg = ServerConfig::default();
        args.apply(&mut cfg);
        assert_eq!(cfg.bind_addr, "0.0.0.0:4000".parse().unwrap());
        assert_eq!(cfg.max_connections, 3);
        assert_eq!(cfg.exchange_log_dir, Some(PathBuf::from("/tmp/hbup")));
    }

    #[test]
    fn no_flags_keep_defaults() {
        let args = Args::parse_from(["hbup-server"]);
        let mut cfg = ServerConfig::default();
        args.apply(&mut cfg);
        assert_eq!(cfg, ServerConfig::default());
    }
}
