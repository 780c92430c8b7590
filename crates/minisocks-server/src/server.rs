//! Acceptor loop and graceful shutdown.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ServerError;
use crate::handler::handle_conn;
use crate::resolve::{Resolver, SystemResolver};
use crate::state::ServerState;
use crate::util::{ConnectionTracker, create_listener};
use minisocks_config::ServerConfig;

/// Pause after a failed accept so a persistent error (e.g. EMFILE) does not spin.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// A listener bound and ready to serve.
pub struct BoundServer {
    listener: TcpListener,
    local_addr: SocketAddr,
    state: Arc<ServerState>,
    max_connections: Option<usize>,
    shutdown_timeout: Duration,
}

impl BoundServer {
    /// Bind the configured listen address. Must run inside a Tokio runtime.
    pub async fn bind(
        config: &ServerConfig,
        resolver: Arc<dyn Resolver>,
    ) -> Result<Self, ServerError> {
        let listen: SocketAddr = config
            .listen
            .parse()
            .map_err(|_| ServerError::Config(format!("invalid listen address: {}", config.listen)))?;

        let listener = create_listener(listen, config.connection_backlog)?;
        let local_addr = listener.local_addr()?;
        info!(
            address = %local_addr,
            backlog = config.connection_backlog,
            relay_buffer = config.relay_buffer_size,
            handshake_read = ?config.handshake_read,
            "listening"
        );

        Ok(Self {
            listener,
            local_addr,
            state: Arc::new(ServerState::from_config(config, resolver)),
            max_connections: config.max_connections,
            shutdown_timeout: config.shutdown_timeout(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept until `shutdown` fires, then drain active sessions.
    ///
    /// Each connection runs on its own task; the loop never waits on a session.
    pub async fn serve(self, shutdown: CancellationToken) -> Result<(), ServerError> {
        let tracker = ConnectionTracker::new();

        // Connection limiter (None = unlimited)
        let conn_limit: Option<Arc<Semaphore>> = self.max_connections.map(|n| {
            info!("max_connections set to {}", n);
            Arc::new(Semaphore::new(n))
        });

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("shutdown signal received, stopping accept loop");
                    break;
                }

                result = self.listener.accept() => {
                    let (tcp, peer) = match result {
                        Ok(v) => v,
                        Err(err) => {
                            warn!(error = %err, "accept failed");
                            tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                            continue;
                        }
                    };

                    let permit: Option<OwnedSemaphorePermit> = match &conn_limit {
                        Some(sem) => match sem.clone().try_acquire_owned() {
                            Ok(p) => Some(p),
                            Err(_) => {
                                debug!(peer = %peer, reason = "max_connections", "connection rejected");
                                drop(tcp);
                                continue;
                            }
                        },
                        None => None,
                    };

                    debug!(peer = %peer, "new connection");

                    let state = self.state.clone();
                    let guard = tracker.track();
                    tokio::spawn(async move {
                        let _guard = guard;
                        let _permit = permit;
                        handle_conn(tcp, peer, state).await;
                    });
                }
            }
        }

        drop(self.listener);

        // Graceful drain: wait for active sessions
        let active = tracker.count();
        if active > 0 {
            info!("waiting for {} active connections to drain", active);
            if tracker.wait_for_zero(self.shutdown_timeout).await {
                info!("all connections drained");
            } else {
                warn!(
                    "shutdown timeout, {} connections still active",
                    tracker.count()
                );
            }
        }

        info!("server stopped");
        Ok(())
    }
}

/// Run the server with a cancellation token for graceful shutdown.
pub async fn run_with_shutdown(
    config: &ServerConfig,
    resolver: Arc<dyn Resolver>,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    BoundServer::bind(config, resolver)
        .await?
        .serve(shutdown)
        .await
}

/// Run with the system resolver until the process is killed.
pub async fn run(config: &ServerConfig) -> Result<(), ServerError> {
    run_with_shutdown(config, Arc::new(SystemResolver), CancellationToken::new()).await
}
