//! Process supervisor.
//!
//! Starts the dispatch gateway and the static server as sibling tasks,
//! relays missing-resource notifications, and stops everything on
//! cancellation.

use std::net::SocketAddr;
use std::path::Path;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::GateConfig;
use crate::error::GateError;
use crate::gateway::{self, DispatchGateway, LocalStore, MissNotifier, SupervisorMessage, Upstream};
use crate::mode::ModeResolver;
use crate::static_server::StaticServer;

pub struct Supervisor {
    config: GateConfig,
}

/// Handles to a started gate.
pub struct RunningGate {
    gateway_addr: SocketAddr,
    static_addr: SocketAddr,
    servers: Vec<JoinHandle<()>>,
    relay: JoinHandle<usize>,
}

impl RunningGate {
    pub fn gateway_addr(&self) -> SocketAddr {
        self.gateway_addr
    }

    pub fn static_addr(&self) -> SocketAddr {
        self.static_addr
    }

    /// Wait for both servers and the relay to finish. Returns the number of
    /// notifications relayed.
    pub async fn wait(self) -> usize {
        for server in self.servers {
            if let Err(e) = server.await {
                warn!(error = %e, "server task failed");
            }
        }
        match self.relay.await {
            Ok(count) => count,
            Err(e) => {
                warn!(error = %e, "relay task failed");
                0
            }
        }
    }
}

impl Supervisor {
    pub fn new(config: GateConfig) -> Self {
        Self { config }
    }

    /// Prepare roots, load rules, bind both listeners and spawn the servers.
    ///
    /// # Errors
    ///
    /// Fails if a root directory cannot be created, the rule table or
    /// upstream is invalid, or a port cannot be bound.
    pub async fn start(&self, shutdown: CancellationToken) -> Result<RunningGate, GateError> {
        let config = &self.config;
        ensure_dir(&config.asset_root).await?;
        ensure_dir(&config.static_root).await?;

        let rules = config.load_rules()?;
        let mode = ModeResolver::new(config.local_mode).current();
        let upstream = Upstream::new(&rules.endpoints().upstream)?;
        info!(%mode, upstream = upstream.authority(), "starting gate");

        let gateway_listener = bind(config.gateway_addr()).await?;
        let static_listener = bind(config.static_addr()).await?;
        let gateway_addr = local_addr(&gateway_listener, config.gateway_addr())?;
        let static_addr = local_addr(&static_listener, config.static_addr())?;

        let (notifier, misses) = MissNotifier::channel(config.miss_capacity);
        let dispatch = DispatchGateway::new(
            rules,
            LocalStore::new(&config.asset_root),
            upstream,
            notifier,
        );
        let statics = StaticServer::new(LocalStore::new(&config.static_root));

        let servers = vec![
            tokio::spawn(gateway::serve(gateway_listener, dispatch, shutdown.clone())),
            tokio::spawn(gateway::serve(static_listener, statics, shutdown.clone())),
        ];
        let relay = if config.emit_misses {
            tokio::spawn(relay_misses(misses, Some(tokio::io::stdout())))
        } else {
            tokio::spawn(relay_misses(misses, None::<tokio::io::Stdout>))
        };

        info!(%gateway_addr, %static_addr, "gate ready");
        Ok(RunningGate {
            gateway_addr,
            static_addr,
            servers,
            relay,
        })
    }

    /// Run until `shutdown` is cancelled.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<(), GateError> {
        let running = self.start(shutdown).await?;
        let relayed = running.wait().await;
        info!(relayed, "gate stopped");
        Ok(())
    }
}

/// Drain notifications until every sender is gone. Each message is logged
/// and, when `out` is set, written as one JSON line.
pub async fn relay_misses<W>(mut rx: mpsc::Receiver<SupervisorMessage>, mut out: Option<W>) -> usize
where
    W: AsyncWrite + Unpin,
{
    let mut count = 0;
    while let Some(message) = rx.recv().await {
        count += 1;
        let SupervisorMessage::NotFound(path) = &message;
        info!(path, "resource not found");

        if let Some(writer) = out.as_mut() {
            if let Err(e) = write_line(writer, &message).await {
                warn!(error = %e, "cannot write notification, disabling output");
                out = None;
            }
        }
    }
    count
}

async fn write_line<W: AsyncWrite + Unpin>(
    writer: &mut W,
    message: &SupervisorMessage,
) -> std::io::Result<()> {
    let mut line = serde_json::to_vec(message)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await
}

async fn ensure_dir(path: &Path) -> Result<(), GateError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|source| GateError::RootDir {
            path: path.display().to_string(),
            source,
        })
}

async fn bind(addr: SocketAddr) -> Result<TcpListener, GateError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| GateError::Bind { addr, source })
}

fn local_addr(listener: &TcpListener, requested: SocketAddr) -> Result<SocketAddr, GateError> {
    listener
        .local_addr()
        .map_err(|source| GateError::Bind {
            addr: requested,
            source,
        })
}
