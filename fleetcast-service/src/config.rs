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

//! Server configuration types and builders
//!
//! Configuration is environment-driven in deployment (`HOST`, `PORT`,
//! `TRAYECTO_DIR`, `STREAM_INTERVAL_MS`, `REQUEST_TIMEOUT_MS`,
//! `MAX_SESSIONS`) with builder-style overrides for embedding and tests.
//!
//! # Examples
//!
//! ```no_run
//! use fleetcast_service::ServerConfig;
//! use std::time::Duration;
//!
//! let config = ServerConfig::default()
//!     .with_data_dir("trajectories")
//!     .with_stream_interval(Duration::from_millis(500))
//!     .with_max_sessions(Some(64));
//! ```

use crate::error::{Result, ServerError};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default listen port
pub const DEFAULT_PORT: u16 = 65432;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address and port the acceptor binds to
    pub bind_address: SocketAddr,

    /// Directory holding the trajectory files
    pub data_dir: PathBuf,

    /// Selector → file-name route table
    pub routes: HashMap<String, String>,

    /// Delay between consecutive records of a stream
    pub stream_interval: Duration,

    /// Deadline for the client's request line (None preserves the original
    /// wait-forever behavior)
    pub request_timeout: Option<Duration>,

    /// Byte cap on the request line
    pub max_request_line: usize,

    /// Ceiling on concurrently live sessions (None = unbounded)
    pub max_sessions: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            data_dir: PathBuf::from("data"),
            routes: default_routes(),
            stream_interval: Duration::from_secs(1),
            request_timeout: None,
            max_request_line: 1024,
            max_sessions: None,
        }
    }
}

/// Built-in selector → file route table
fn default_routes() -> HashMap<String, String> {
    HashMap::from([
        ("Trayecto 1".to_string(), "trayecto1.json".to_string()),
        ("Trayecto 2".to_string(), "trayecto2.json".to_string()),
        ("Trayecto 3".to_string(), "trayecto3.json".to_string()),
    ])
}

impl ServerConfig {
    /// Create a configuration with the given bind address
    pub fn new(bind_address: SocketAddr) -> Self {
        Self {
            bind_address,
            ..Default::default()
        }
    }

    /// Load configuration from the process environment
    ///
    /// Unset variables fall back to defaults; set-but-invalid values are a
    /// [`ServerError::Config`].
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(host) = lookup("HOST") {
            let ip: IpAddr = host
                .parse()
                .map_err(|_| ServerError::Config(format!("invalid HOST value: {host}")))?;
            config.bind_address.set_ip(ip);
        }
        if let Some(port) = parse_var(&lookup, "PORT")? {
            config.bind_address.set_port(port);
        }
        if let Some(dir) = lookup("TRAYECTO_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(ms) = parse_var(&lookup, "STREAM_INTERVAL_MS")? {
            config.stream_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var(&lookup, "REQUEST_TIMEOUT_MS")? {
            config.request_timeout = Some(Duration::from_millis(ms));
        }
        if let Some(max) = parse_var(&lookup, "MAX_SESSIONS")? {
            config.max_sessions = Some(max);
        }

        Ok(config)
    }

    /// Set the bind address
    pub fn with_bind_address(mut self, bind_address: SocketAddr) -> Self {
        self.bind_address = bind_address;
        self
    }

    /// Set the trajectory data directory
    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    /// Replace the route table
    pub fn with_routes(mut self, routes: HashMap<String, String>) -> Self {
        self.routes = routes;
        self
    }

    /// Add or replace a single route
    pub fn with_route(mut self, selector: impl Into<String>, file: impl Into<String>) -> Self {
        self.routes.insert(selector.into(), file.into());
        self
    }

    /// Set the inter-record pacing delay
    pub fn with_stream_interval(mut self, interval: Duration) -> Self {
        self.stream_interval = interval;
        self
    }

    /// Set the request read deadline
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the byte cap on the request line
    pub fn with_max_request_line(mut self, max: usize) -> Self {
        self.max_request_line = max;
        self
    }

    /// Set the concurrent-session ceiling
    pub fn with_max_sessions(mut self, max: Option<usize>) -> Self {
        self.max_sessions = max;
        self
    }
}

fn parse_var<T: FromStr>(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<T>> {
    match lookup(name) {
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ServerError::Config(format!("invalid {name} value: {value}"))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        move |name| {
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.to_string())
        }
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_address.port(), DEFAULT_PORT);
        assert_eq!(config.data_dir, PathBuf::from("data"));
        assert_eq!(config.routes.len(), 3);
        assert_eq!(
            config.routes.get("Trayecto 1").map(String::as_str),
            Some("trayecto1.json")
        );
        assert_eq!(config.stream_interval, Duration::from_secs(1));
        assert_eq!(config.request_timeout, None);
        assert_eq!(config.max_sessions, None);
    }

    #[test]
    fn test_builders() {
        let config = ServerConfig::new("127.0.0.1:9000".parse().unwrap())
            .with_data_dir("trajectories")
            .with_route("Trayecto 4", "trayecto4.json")
            .with_stream_interval(Duration::from_millis(250))
            .with_request_timeout(Some(Duration::from_secs(30)))
            .with_max_request_line(4096)
            .with_max_sessions(Some(8));

        assert_eq!(config.bind_address.port(), 9000);
        assert_eq!(config.data_dir, PathBuf::from("trajectories"));
        assert_eq!(config.routes.len(), 4);
        assert_eq!(config.stream_interval, Duration::from_millis(250));
        assert_eq!(config.request_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.max_request_line, 4096);
        assert_eq!(config.max_sessions, Some(8));
    }

    #[test]
    fn test_from_lookup() {
        let vars = [
            ("HOST", "127.0.0.1"),
            ("PORT", "9000"),
            ("TRAYECTO_DIR", "/var/lib/fleetcast"),
            ("STREAM_INTERVAL_MS", "500"),
            ("MAX_SESSIONS", "32"),
        ];
        let config = ServerConfig::from_lookup(lookup_from(&vars)).unwrap();

        assert_eq!(config.bind_address.to_string(), "127.0.0.1:9000");
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/fleetcast"));
        assert_eq!(config.stream_interval, Duration::from_millis(500));
        assert_eq!(config.request_timeout, None);
        assert_eq!(config.max_sessions, Some(32));
    }

    #[test]
    fn test_from_lookup_invalid_port() {
        let vars = [("PORT", "not-a-port")];
        let err = ServerConfig::from_lookup(lookup_from(&vars)).unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }

    #[test]
    fn test_from_lookup_invalid_host() {
        let vars = [("HOST", "localhost")];
        let err = ServerConfig::from_lookup(lookup_from(&vars)).unwrap_err();
        assert!(matches!(err, ServerError::Config(_)));
    }

    #[test]
    fn test_from_lookup_defaults_when_unset() {
        let config = ServerConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config.bind_address.port(), DEFAULT_PORT);
    }
}
