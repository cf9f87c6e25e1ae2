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

//! FleetCast Trajectory Streaming Service
//!
//! An async TCP server that streams pre-recorded vehicle trajectories to
//! clients, enforcing a single active stream per vehicle and pacing record
//! delivery over wall-clock time.
//!
//! # Architecture
//!
//! ```text
//! StreamServer (accept loop)
//!     ↓ one task per connection
//! Session (request → validate → reserve → stream → release)
//!     ↓                        ↓
//! TrajectoryStore      ActiveVehicleRegistry
//! (read-only loads)    (per-vehicle exclusion)
//! ```
//!
//! The registry is the only shared mutable state; its lock is held for the
//! set operation alone, never across I/O. Everything else a session touches
//! is either owned (the connection) or read-only (the store).
//!
//! # Protocol
//!
//! Newline-delimited JSON, one request/stream session per connection. The
//! client sends `{"trayecto": "<selector>"}` and receives either a single
//! `{"error": "<message>"}` followed by close, or the trajectory's records
//! as one JSON object per line, in stored order at a fixed interval,
//! followed by close.
//!
//! # Example
//!
//! ```no_run
//! use fleetcast_service::{Result, ServerConfig, StreamServer};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = ServerConfig::from_env()?;
//!     let server = StreamServer::bind(config).await?;
//!     server.run().await
//! }
//! ```

mod config;
mod error;
mod metrics;
mod protocol;
mod registry;
mod server;
mod session;
mod store;
mod types;

pub use config::{DEFAULT_PORT, ServerConfig};
pub use error::{Result, ServerError};
pub use metrics::{MetricsSnapshot, ServerMetrics};
pub use protocol::{ErrorReply, StreamRequest, TrajectoryRecord};
pub use registry::ActiveVehicleRegistry;
pub use server::StreamServer;
pub use session::{Session, SessionConfig};
pub use store::{Trajectory, TrajectoryStore};
pub use types::{SessionId, VehicleId};
