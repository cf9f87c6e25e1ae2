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

//! Error types for the FleetCast server

use crate::types::VehicleId;
use std::path::PathBuf;
use thiserror::Error;
use tokio_util::codec::LinesCodecError;

/// Result type for server operations
pub type Result<T> = std::result::Result<T, ServerError>;

/// FleetCast server error types
#[derive(Debug, Error)]
pub enum ServerError {
    /// I/O error from the underlying TCP stream or filesystem
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The trajectory data directory does not exist
    #[error("trajectory data directory not found: {}", .0.display())]
    DataDirMissing(PathBuf),

    /// The request payload could not be parsed
    #[error("malformed request: {0}")]
    MalformedRequest(String),

    /// No request arrived within the configured deadline
    #[error("request read timed out")]
    RequestTimeout,

    /// The requested selector is not in the route table
    #[error("unknown trajectory selector: {0}")]
    InvalidSelector(String),

    /// The trajectory file backing a known selector is missing
    #[error("trajectory file not found: {}", .0.display())]
    ResourceNotFound(PathBuf),

    /// The trajectory file exists but does not parse as a record sequence
    #[error("malformed trajectory data in {}: {}", .path.display(), .source)]
    MalformedData {
        /// Path of the offending file
        path: PathBuf,
        /// Underlying parse error
        source: serde_json::Error,
    },

    /// The trajectory parsed but is empty or its first record lacks a vehicle id
    #[error("trajectory {0} is empty or missing a vehicle id")]
    InvalidTrajectory(String),

    /// Another session already holds an active stream for this vehicle
    #[error("vehicle {0} already has an active stream")]
    AlreadyStreaming(VehicleId),

    /// Generic error with a message
    #[error("{0}")]
    Other(String),
}

impl ServerError {
    /// Check if the error was caused by the client's request
    ///
    /// Client-fault errors are logged at `warn` level and answered with a
    /// structured reply; everything else is a server-side or transport
    /// failure.
    pub fn is_client_fault(&self) -> bool {
        matches!(
            self,
            ServerError::MalformedRequest(_)
                | ServerError::RequestTimeout
                | ServerError::InvalidSelector(_)
                | ServerError::AlreadyStreaming(_)
        )
    }

    /// Check if the error is a reservation conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, ServerError::AlreadyStreaming(_))
    }

    /// The message to send to the client, if any
    ///
    /// Store-side failures (`ResourceNotFound`, `MalformedData`,
    /// `InvalidTrajectory`) are collapsed to a generic "trajectory
    /// unavailable" so the wire reply never leaks filesystem detail.
    /// Transport errors return `None`: the channel is assumed broken and no
    /// reply is attempted.
    pub fn client_message(&self) -> Option<String> {
        match self {
            ServerError::MalformedRequest(_) | ServerError::RequestTimeout => {
                Some("invalid request".to_string())
            }
            ServerError::InvalidSelector(selector) => {
                Some(format!("unknown trajectory: {selector}"))
            }
            ServerError::ResourceNotFound(_)
            | ServerError::MalformedData { .. }
            | ServerError::InvalidTrajectory(_) => Some("trajectory unavailable".to_string()),
            ServerError::AlreadyStreaming(vehicle) => {
                Some(format!("vehicle {vehicle} already has an active stream"))
            }
            ServerError::Io(_)
            | ServerError::Config(_)
            | ServerError::DataDirMissing(_)
            | ServerError::Other(_) => None,
        }
    }
}

impl From<LinesCodecError> for ServerError {
    fn from(error: LinesCodecError) -> Self {
        match error {
            LinesCodecError::MaxLineLengthExceeded => {
                ServerError::MalformedRequest("request line too long".to_string())
            }
            LinesCodecError::Io(e) => ServerError::Io(e),
        }
    }
}
