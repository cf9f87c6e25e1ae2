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

//! Wire protocol types for the FleetCast server
//!
//! The protocol is newline-delimited JSON over TCP, one object per line.
//! Each connection carries exactly one request/stream session:
//!
//! - Request (client → server): `{"trayecto": "<selector>"}`
//! - Error reply (server → client, terminal): `{"error": "<message>"}`
//! - Data (server → client): one JSON object per trajectory record, in
//!   trajectory order, paced at a fixed interval

use crate::error::{Result, ServerError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A client's stream request, the first and only line it sends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamRequest {
    /// Selector naming the trajectory to stream
    pub trayecto: String,
}

impl StreamRequest {
    /// Parse a request from a received line
    ///
    /// An unparsable payload or a missing selector field is a
    /// [`ServerError::MalformedRequest`].
    pub fn parse(line: &str) -> Result<Self> {
        serde_json::from_str(line)
            .map_err(|e| ServerError::MalformedRequest(e.to_string()))
    }
}

/// A terminal error reply; the server closes the connection after sending it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReply {
    /// Human-readable description of the failure
    pub error: String,
}

impl ErrorReply {
    /// Create a new error reply
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into() }
    }

    /// Serialize the reply to a single wire line
    pub fn to_line(&self) -> String {
        serde_json::json!({ "error": self.error }).to_string()
    }
}

/// One telemetry sample of a trajectory
///
/// A record is a JSON object carrying a `car_id` plus an opaque payload of
/// additional fields (position, status, ...) the server never interprets.
/// Records round-trip as-is: whatever fields the trajectory file holds are
/// re-emitted to the client unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrajectoryRecord(Map<String, Value>);

impl TrajectoryRecord {
    /// The record's vehicle id, if present as a string field
    pub fn vehicle_id(&self) -> Option<&str> {
        self.0.get("car_id").and_then(Value::as_str)
    }

    /// The record's raw fields
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Serialize the record to a single wire line
    pub fn to_line(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| ServerError::Other(e.to_string()))
    }
}

impl From<Map<String, Value>> for TrajectoryRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request() {
        let request = StreamRequest::parse(r#"{"trayecto": "Trayecto 1"}"#).unwrap();
        assert_eq!(request.trayecto, "Trayecto 1");
    }

    #[test]
    fn test_parse_request_rejects_garbage() {
        let err = StreamRequest::parse("not json at all").unwrap_err();
        assert!(matches!(err, ServerError::MalformedRequest(_)));
    }

    #[test]
    fn test_parse_request_rejects_missing_selector() {
        let err = StreamRequest::parse(r#"{"route": "Trayecto 1"}"#).unwrap_err();
        assert!(matches!(err, ServerError::MalformedRequest(_)));
    }

    #[test]
    fn test_error_reply_line() {
        let reply = ErrorReply::new("trajectory unavailable");
        let line = reply.to_line();
        let parsed: ErrorReply = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed.error, "trajectory unavailable");
    }

    #[test]
    fn test_record_round_trip() {
        let line = r#"{"car_id":"CAR-1","lat":40.4168,"lon":-3.7038,"speed_kmh":42}"#;
        let record: TrajectoryRecord = serde_json::from_str(line).unwrap();

        assert_eq!(record.vehicle_id(), Some("CAR-1"));

        let emitted = record.to_line().unwrap();
        let reparsed: TrajectoryRecord = serde_json::from_str(&emitted).unwrap();
        assert_eq!(record, reparsed);
    }

    #[test]
    fn test_record_without_vehicle_id() {
        let record: TrajectoryRecord = serde_json::from_str(r#"{"lat": 1.0}"#).unwrap();
        assert_eq!(record.vehicle_id(), None);

        // A non-string car_id does not count as a vehicle id either.
        let record: TrajectoryRecord = serde_json::from_str(r#"{"car_id": 7}"#).unwrap();
        assert_eq!(record.vehicle_id(), None);
    }
}
