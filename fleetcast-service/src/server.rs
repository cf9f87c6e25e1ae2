//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Connection acceptor implementation
//!
//! The StreamServer binds the listening socket and dispatches every accepted
//! connection to an independently scheduled [`Session`] task. The accept
//! loop never blocks on handler progress; a failed accept is logged and
//! retried after a short backoff. There is no graceful-shutdown protocol:
//! the server runs until the process is killed.

use crate::config::ServerConfig;
use crate::error::{Result, ServerError};
use crate::metrics::ServerMetrics;
use crate::registry::ActiveVehicleRegistry;
use crate::session::{Session, SessionConfig};
use crate::store::TrajectoryStore;
use crate::types::SessionId;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::net::TcpListener;

/// Trajectory streaming server
///
/// # Example
///
/// ```no_run
/// use fleetcast_service::{Result, ServerConfig, StreamServer};
///
/// #[tokio::main]
/// async fn main() -> Result<()> {
///     let config = ServerConfig::from_env()?;
///     let server = StreamServer::bind(config).await?;
///     server.run().await
/// }
/// ```
pub struct StreamServer {
    /// Server configuration
    config: ServerConfig,
    /// Bound TCP listener
    listener: TcpListener,
    /// Actual bind address
    local_addr: SocketAddr,
    /// Trajectory store shared by all sessions
    store: Arc<TrajectoryStore>,
    /// Active-vehicle registry shared by all sessions
    registry: Arc<ActiveVehicleRegistry>,
    /// Server metrics
    metrics: Arc<ServerMetrics>,
    /// Next session ID (monotonically increasing)
    next_session: AtomicU64,
}

impl StreamServer {
    /// Bind the server to its configured address
    ///
    /// Fails fast with [`ServerError::DataDirMissing`] when the trajectory
    /// directory does not exist, and with an I/O error when the address
    /// cannot be bound. Both are fatal: there is nothing to serve without
    /// them.
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        if !config.data_dir.is_dir() {
            return Err(ServerError::DataDirMissing(config.data_dir.clone()));
        }

        let listener = TcpListener::bind(config.bind_address).await?;
        let local_addr = listener.local_addr()?;

        let store = Arc::new(TrajectoryStore::new(
            config.data_dir.clone(),
            config.routes.clone(),
        ));

        tracing::info!(
            address = %local_addr,
            data_dir = %config.data_dir.display(),
            selectors = ?store.selectors(),
            "server bound"
        );

        Ok(Self {
            config,
            listener,
            local_addr,
            store,
            registry: Arc::new(ActiveVehicleRegistry::new()),
            metrics: Arc::new(ServerMetrics::new()),
            next_session: AtomicU64::new(1),
        })
    }

    /// Get the server's bound address
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Get the server metrics
    pub fn metrics(&self) -> Arc<ServerMetrics> {
        self.metrics.clone()
    }

    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            stream_interval: self.config.stream_interval,
            request_timeout: self.config.request_timeout,
            max_request_line: self.config.max_request_line,
        }
    }

    /// Run the accept loop until the process terminates
    ///
    /// Each accepted connection is handed to its own session task
    /// immediately; a failed accept is transient and never stops the loop.
    pub async fn run(self) -> Result<()> {
        tracing::info!(address = %self.local_addr, "accepting connections");

        loop {
            match self.listener.accept().await {
                Ok((socket, peer)) => {
                    if let Some(max) = self.config.max_sessions
                        && self.metrics.active_sessions() as usize >= max
                    {
                        tracing::warn!(%peer, max, "session limit reached, dropping connection");
                        self.metrics.session_dropped();
                        drop(socket);
                        continue;
                    }

                    let id = SessionId::new(self.next_session.fetch_add(1, Ordering::SeqCst));
                    tracing::debug!(session = %id, %peer, "connection accepted");

                    let session = Session::new(
                        id,
                        peer,
                        self.store.clone(),
                        self.registry.clone(),
                        self.metrics.clone(),
                        self.session_config(),
                    );

                    let metrics = self.metrics.clone();
                    metrics.session_opened();
                    tokio::spawn(async move {
                        let started = Instant::now();
                        session.run(socket).await;
                        metrics.session_closed(started.elapsed());
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to accept connection");
                    self.metrics.accept_error();

                    // Back off on errors to avoid a tight loop.
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }
}

impl std::fmt::Debug for StreamServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamServer")
            .field("local_addr", &self.local_addr)
            .field("active_sessions", &self.metrics.active_sessions())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ErrorReply;
    use futures::{SinkExt, StreamExt};
    use tempfile::TempDir;
    use tokio::net::TcpStream;
    use tokio_util::codec::{Framed, LinesCodec};
    use tracing_test::traced_test;

    fn test_config(dir: &TempDir) -> ServerConfig {
        ServerConfig::new("127.0.0.1:0".parse().unwrap())
            .with_data_dir(dir.path())
            .with_stream_interval(Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_bind_fails_without_data_dir() {
        let config =
            ServerConfig::new("127.0.0.1:0".parse().unwrap()).with_data_dir("does/not/exist");

        let err = StreamServer::bind(config).await.unwrap_err();
        assert!(matches!(err, ServerError::DataDirMissing(_)));
    }

    #[tokio::test]
    async fn test_bind_assigns_ephemeral_port() {
        let dir = TempDir::new().unwrap();
        let server = StreamServer::bind(test_config(&dir)).await.unwrap();
        assert_ne!(server.local_addr().port(), 0);
    }

    #[traced_test]
    #[tokio::test]
    async fn test_session_limit_drops_connections() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir).with_max_sessions(Some(1));
        let server = StreamServer::bind(config).await.unwrap();
        let addr = server.local_addr();
        let metrics = server.metrics();

        tokio::spawn(async move {
            let _ = server.run().await;
        });

        // The first client occupies the only slot by never sending its
        // request.
        let first = TcpStream::connect(addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(metrics.active_sessions(), 1);

        // The second connection is dropped at accept time.
        let second = TcpStream::connect(addr).await.unwrap();
        let mut transport = Framed::new(second, LinesCodec::new());
        assert!(transport.next().await.is_none());
        assert!(logs_contain("session limit reached"));

        // Hanging up frees the slot for a new client.
        drop(first);
        tokio::time::sleep(Duration::from_millis(100)).await;

        let third = TcpStream::connect(addr).await.unwrap();
        let mut transport = Framed::new(third, LinesCodec::new());
        transport.send("not json".to_string()).await.unwrap();
        let reply: ErrorReply =
            serde_json::from_str(&transport.next().await.unwrap().unwrap()).unwrap();
        assert_eq!(reply.error, "invalid request");
    }
}
