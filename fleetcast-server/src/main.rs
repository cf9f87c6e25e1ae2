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

//! FleetCast Trajectory Streaming Server
//!
//! Environment-driven startup wrapper around [`fleetcast_service`].
//!
//! ## Usage
//!
//! ```bash
//! HOST=0.0.0.0 PORT=65432 TRAYECTO_DIR=data cargo run
//! ```
//!
//! Then request a stream with:
//! ```bash
//! printf '{"trayecto": "Trayecto 1"}\n' | nc localhost 65432
//! ```

use fleetcast_service::{ServerConfig, StreamServer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("fleetcast_service=info".parse()?)
                .add_directive("fleetcast_server=info".parse()?),
        )
        .init();

    tracing::info!("FleetCast v{}", env!("CARGO_PKG_VERSION"));

    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            return Err(e.into());
        }
    };

    let server = match StreamServer::bind(config).await {
        Ok(server) => server,
        Err(e) => {
            tracing::error!(error = %e, "failed to start server");
            return Err(e.into());
        }
    };

    server.run().await?;
    Ok(())
}
