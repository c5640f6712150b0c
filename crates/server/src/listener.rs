//! TCP listener that gives every accepted connection its own session task.

use crate::connection::{serve_connection, ConnectionEnd};
use crate::replay::ExchangeLogger;
use anyhow::{Context, Result};
use std::future::Future;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, info_span, warn, Instrument};

/// Listener tuning taken from the server configuration.
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Connections served at once; extra connections are closed on accept.
    pub max_connections: usize,
    /// Directory for per-connection exchange logs.
    pub exchange_log_dir: Option<PathBuf>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            max_connections: 64,
            exchange_log_dir: None,
        }
    }
}

/// HBUP server bound to a TCP address.
pub struct HbupServer {
    listener: TcpListener,
    options: ServerOptions,
    active: Arc<AtomicUsize>,
    next_connection_id: AtomicU64,
}

/// Decrements the active-connection count when a connection task ends.
struct ActiveGuard(Arc<AtomicUsize>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl HbupServer {
    /// Bind the listener.
    pub async fn bind(addr: SocketAddr, options: ServerOptions) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind HBUP listener on {addr}"))?;
        if let Some(dir) = &options.exchange_log_dir {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create exchange log dir {}", dir.display()))?;
        }
        info!(addr = %listener.local_addr()?, "HBUP server listening");
        Ok(Self {
            listener,
            options,
            active: Arc::new(AtomicUsize::new(0)),
            next_connection_id: AtomicU64::new(0),
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Number of connections currently being served.
    pub fn active_connections(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Accept connections forever.
    pub async fn run(self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Accept connections until `shutdown` resolves.
    ///
    /// Connections already being served keep running on their own tasks.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("HBUP server shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => self.spawn_connection(stream, peer),
                    Err(err) => warn!(%err, "HBUP accept failed"),
                },
            }
        }
    }

    fn spawn_connection(&self, stream: TcpStream, peer: SocketAddr) {
        let active = self.active.fetch_add(1, Ordering::SeqCst);
        let guard = ActiveGuard(Arc::clone(&self.active));
        if active >= self.options.max_connections {
            warn!(%peer, limit = self.options.max_connections, "connection limit reached, closing");
            drop(stream);
            drop(guard);
            return;
        }

        let id = self.next_connection_id.fetch_add(1, Ordering::SeqCst);
        if let Err(err) = stream.set_nodelay(true) {
            warn!(%err, %peer, "failed to set TCP_NODELAY");
        }
        let exchange_log_dir = self.options.exchange_log_dir.clone();

        let span = info_span!("connection", id, %peer);
        tokio::spawn(
            async move {
                let _guard = guard;
                info!("connection accepted");
                let exchange_log = match exchange_log_dir {
                    Some(dir) => open_exchange_log(&dir, id).await,
                    None => None,
                };
                match serve_connection(stream, exchange_log).await {
                    Ok(summary) => match summary.end {
                        ConnectionEnd::PeerClosed => info!(
                            frames = summary.frames,
                            responses = summary.responses,
                            "connection closed"
                        ),
                        ConnectionEnd::FramingError(err) => warn!(
                            %err,
                            frames = summary.frames,
                            "connection dropped after framing error"
                        ),
                    },
                    Err(err) => warn!("connection failed: {err:#}"),
                }
            }
            .instrument(span),
        );
    }
}

/// Open the exchange log for connection `id`, keeping logs from earlier runs.
async fn open_exchange_log(dir: &Path, id: u64) -> Option<ExchangeLogger> {
    match ExchangeLogger::create_unique(dir, &format!("connection-{id:06}")).await {
        Ok((log, path)) => {
            debug!(path = %path.display(), "recording exchanges");
            Some(log)
        }
        Err(err) => {
            warn!("Failed to open exchange log: {err:#}");
            None
        }
    }
}
