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

//! Session handler implementation
//!
//! A Session owns one accepted connection for its whole lifetime and drives
//! it through the request/stream state machine:
//!
//! ```text
//! AwaitingRequest → Validating → Reserving → Streaming → Done
//! ```
//!
//! with an aborted path reachable from every non-terminal state. All errors
//! are handled here: the client gets a structured reply where the channel is
//! still usable, the vehicle reservation is released on every exit path
//! after it was granted, and nothing but log records propagates to the
//! acceptor.

use crate::error::{Result, ServerError};
use crate::metrics::ServerMetrics;
use crate::protocol::{ErrorReply, StreamRequest};
use crate::registry::ActiveVehicleRegistry;
use crate::store::{Trajectory, TrajectoryStore};
use crate::types::SessionId;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec};

/// Session configuration, derived from the server configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Delay between consecutive records of a stream
    pub stream_interval: Duration,
    /// Deadline for the client's request line (None = wait forever)
    pub request_timeout: Option<Duration>,
    /// Byte cap on the request line
    pub max_request_line: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            stream_interval: Duration::from_secs(1),
            request_timeout: None,
            max_request_line: 1024,
        }
    }
}

type Transport = Framed<TcpStream, LinesCodec>;

/// Handler for a single accepted connection
pub struct Session {
    /// Session ID for log correlation
    id: SessionId,
    /// Peer address of the connection
    peer: SocketAddr,
    /// Trajectory store (shared, read-only)
    store: Arc<TrajectoryStore>,
    /// Active-vehicle registry (shared)
    registry: Arc<ActiveVehicleRegistry>,
    /// Server metrics (shared)
    metrics: Arc<ServerMetrics>,
    /// Configuration
    config: SessionConfig,
}

impl Session {
    /// Create a new session handler
    pub fn new(
        id: SessionId,
        peer: SocketAddr,
        store: Arc<TrajectoryStore>,
        registry: Arc<ActiveVehicleRegistry>,
        metrics: Arc<ServerMetrics>,
        config: SessionConfig,
    ) -> Self {
        Self {
            id,
            peer,
            store,
            registry,
            metrics,
            config,
        }
    }

    /// Drive the connection through the whole session lifecycle
    ///
    /// Never returns an error: every failure is resolved here, answered on
    /// the wire where possible, and logged. The connection is closed when
    /// this returns.
    pub async fn run(self, socket: TcpStream) {
        tracing::info!(session = %self.id, peer = %self.peer, "connection established");

        let codec = LinesCodec::new_with_max_length(self.config.max_request_line);
        let mut transport = Framed::new(socket, codec);

        match self.serve(&mut transport).await {
            Ok(()) => {
                self.metrics.stream_completed();
            }
            Err(e) => {
                if e.is_conflict() {
                    self.metrics.stream_rejected();
                } else {
                    self.metrics.stream_failed();
                }
                if e.is_client_fault() {
                    tracing::warn!(session = %self.id, peer = %self.peer, error = %e, "session aborted");
                } else {
                    tracing::error!(session = %self.id, peer = %self.peer, error = %e, "session failed");
                }
                if let Some(message) = e.client_message() {
                    let reply = ErrorReply::new(message).to_line();
                    if let Err(send_err) = transport.send(reply).await {
                        tracing::debug!(session = %self.id, error = %send_err, "error reply not delivered");
                    }
                }
            }
        }

        tracing::info!(session = %self.id, peer = %self.peer, "connection closed");
        // Dropping the transport closes the socket.
    }

    async fn serve(&self, transport: &mut Transport) -> Result<()> {
        // AwaitingRequest
        let line = self.read_request(transport).await?;

        // Validating
        let request = StreamRequest::parse(&line)?;
        tracing::info!(session = %self.id, selector = %request.trayecto, "trajectory requested");
        let trajectory = self.store.load(&request.trayecto).await?;

        // Reserving
        let vehicle = trajectory.vehicle_id().clone();
        if !self.registry.try_reserve(&vehicle) {
            return Err(ServerError::AlreadyStreaming(vehicle));
        }

        // Streaming. The reservation is owned from here on and must be
        // released on both exit paths.
        let result = self.stream(transport, &trajectory).await;
        self.registry.release(&vehicle);
        tracing::debug!(session = %self.id, vehicle = %vehicle, "reservation released");
        result
    }

    /// Read the single request line, honoring the configured deadline
    async fn read_request(&self, transport: &mut Transport) -> Result<String> {
        let next = match self.config.request_timeout {
            Some(deadline) => tokio::time::timeout(deadline, transport.next())
                .await
                .map_err(|_| ServerError::RequestTimeout)?,
            None => transport.next().await,
        };
        match next {
            Some(line) => Ok(line?),
            None => Err(ServerError::MalformedRequest(
                "connection closed before a request was received".to_string(),
            )),
        }
    }

    /// Emit the trajectory's records in stored order at the configured pace
    ///
    /// A write failure aborts the remaining sequence immediately; no reply
    /// is attempted on a broken channel.
    async fn stream(&self, transport: &mut Transport, trajectory: &Trajectory) -> Result<()> {
        tracing::info!(
            session = %self.id,
            vehicle = %trajectory.vehicle_id(),
            records = trajectory.len(),
            "streaming started"
        );

        for (index, record) in trajectory.records().iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.config.stream_interval).await;
            }
            transport.send(record.to_line()?).await?;
            self.metrics.record_streamed();
        }

        tracing::info!(
            session = %self.id,
            vehicle = %trajectory.vehicle_id(),
            "streaming completed"
        );
        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("peer", &self.peer)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VehicleId;
    use std::collections::HashMap;
    use tempfile::TempDir;
    use tokio::net::TcpListener;

    async fn create_test_connection() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client_task = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });

        let (server, _) = listener.accept().await.unwrap();
        let client = client_task.await.unwrap();

        (server, client)
    }

    fn test_store(dir: &TempDir) -> Arc<TrajectoryStore> {
        let routes = HashMap::from([("Trayecto 1".to_string(), "trayecto1.json".to_string())]);
        Arc::new(TrajectoryStore::new(dir.path(), routes))
    }

    fn test_session(
        store: Arc<TrajectoryStore>,
        registry: Arc<ActiveVehicleRegistry>,
    ) -> Session {
        Session::new(
            SessionId::new(1),
            "127.0.0.1:1".parse().unwrap(),
            store,
            registry,
            Arc::new(ServerMetrics::new()),
            SessionConfig {
                stream_interval: Duration::from_millis(5),
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_happy_path_streams_and_releases() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("trayecto1.json"),
            r#"[{"car_id": "CAR-1", "seq": 0}, {"car_id": "CAR-1", "seq": 1}]"#,
        )
        .unwrap();
        let registry = Arc::new(ActiveVehicleRegistry::new());
        let session = test_session(test_store(&dir), registry.clone());

        let (server, client) = create_test_connection().await;
        let handle = tokio::spawn(session.run(server));

        let mut transport = Framed::new(client, LinesCodec::new());
        transport
            .send(r#"{"trayecto": "Trayecto 1"}"#.to_string())
            .await
            .unwrap();

        let first: serde_json::Value =
            serde_json::from_str(&transport.next().await.unwrap().unwrap()).unwrap();
        let second: serde_json::Value =
            serde_json::from_str(&transport.next().await.unwrap().unwrap()).unwrap();
        assert_eq!(first["seq"], 0);
        assert_eq!(second["seq"], 1);

        // Server closes after the last record.
        assert!(transport.next().await.is_none());

        handle.await.unwrap();
        assert!(!registry.is_active(&VehicleId::new("CAR-1")));
    }

    #[tokio::test]
    async fn test_malformed_request_gets_reply() {
        let dir = TempDir::new().unwrap();
        let registry = Arc::new(ActiveVehicleRegistry::new());
        let session = test_session(test_store(&dir), registry.clone());

        let (server, client) = create_test_connection().await;
        let handle = tokio::spawn(session.run(server));

        let mut transport = Framed::new(client, LinesCodec::new());
        transport.send("this is not json".to_string()).await.unwrap();

        let reply: ErrorReply =
            serde_json::from_str(&transport.next().await.unwrap().unwrap()).unwrap();
        assert_eq!(reply.error, "invalid request");
        assert!(transport.next().await.is_none());

        handle.await.unwrap();
        assert_eq!(registry.active_count(), 0);
    }

    #[tokio::test]
    async fn test_conflict_leaves_existing_reservation() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("trayecto1.json"),
            r#"[{"car_id": "CAR-1", "seq": 0}]"#,
        )
        .unwrap();
        let registry = Arc::new(ActiveVehicleRegistry::new());
        assert!(registry.try_reserve(&VehicleId::new("CAR-1")));

        let session = test_session(test_store(&dir), registry.clone());
        let (server, client) = create_test_connection().await;
        let handle = tokio::spawn(session.run(server));

        let mut transport = Framed::new(client, LinesCodec::new());
        transport
            .send(r#"{"trayecto": "Trayecto 1"}"#.to_string())
            .await
            .unwrap();

        let reply: ErrorReply =
            serde_json::from_str(&transport.next().await.unwrap().unwrap()).unwrap();
        assert!(reply.error.contains("CAR-1"));
        assert!(transport.next().await.is_none());

        handle.await.unwrap();
        // The original reservation must be untouched by the rejected session.
        assert!(registry.is_active(&VehicleId::new("CAR-1")));
    }

    #[tokio::test]
    async fn test_client_disconnect_releases_reservation() {
        let dir = TempDir::new().unwrap();
        let records: Vec<serde_json::Value> = (0..50)
            .map(|seq| serde_json::json!({"car_id": "CAR-1", "seq": seq}))
            .collect();
        std::fs::write(
            dir.path().join("trayecto1.json"),
            serde_json::to_string(&records).unwrap(),
        )
        .unwrap();
        let registry = Arc::new(ActiveVehicleRegistry::new());
        let session = test_session(test_store(&dir), registry.clone());

        let (server, client) = create_test_connection().await;
        let handle = tokio::spawn(session.run(server));

        let mut transport = Framed::new(client, LinesCodec::new());
        transport
            .send(r#"{"trayecto": "Trayecto 1"}"#.to_string())
            .await
            .unwrap();

        // Take one record, then hang up mid-stream.
        let first = transport.next().await.unwrap().unwrap();
        assert!(first.contains("CAR-1"));
        drop(transport);

        // The handler notices the broken pipe at a subsequent write and
        // releases the vehicle.
        handle.await.unwrap();
        assert!(!registry.is_active(&VehicleId::new("CAR-1")));
    }
}
