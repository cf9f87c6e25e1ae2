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

//! Trajectory store implementation
//!
//! The store resolves a client-supplied selector against a fixed route table
//! and loads the backing JSON file into memory on demand. Loads are pure
//! reads with no shared mutation, so any number of sessions may load
//! concurrently.

use crate::error::{Result, ServerError};
use crate::protocol::TrajectoryRecord;
use crate::types::VehicleId;
use std::collections::HashMap;
use std::path::PathBuf;

/// An ordered, non-empty sequence of telemetry records for one vehicle
#[derive(Debug, Clone)]
pub struct Trajectory {
    selector: String,
    vehicle_id: VehicleId,
    records: Vec<TrajectoryRecord>,
}

impl Trajectory {
    /// The selector this trajectory was loaded under
    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// The vehicle identity, taken from the first record
    pub fn vehicle_id(&self) -> &VehicleId {
        &self.vehicle_id
    }

    /// The records in stored order
    pub fn records(&self) -> &[TrajectoryRecord] {
        &self.records
    }

    /// Number of records in the trajectory
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the trajectory has no records (never true for a loaded one)
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Read-only store of named trajectories backed by JSON files
#[derive(Debug, Clone)]
pub struct TrajectoryStore {
    data_dir: PathBuf,
    routes: HashMap<String, String>,
}

impl TrajectoryStore {
    /// Create a new store over the given data directory and route table
    pub fn new(data_dir: impl Into<PathBuf>, routes: HashMap<String, String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            routes,
        }
    }

    /// The data directory backing this store
    pub fn data_dir(&self) -> &std::path::Path {
        &self.data_dir
    }

    /// The known selectors, sorted for stable logging
    pub fn selectors(&self) -> Vec<&str> {
        let mut selectors: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        selectors.sort_unstable();
        selectors
    }

    /// Load the trajectory named by `selector`
    ///
    /// Fails with [`ServerError::InvalidSelector`] for a selector outside the
    /// route table, [`ServerError::ResourceNotFound`] for a missing file,
    /// [`ServerError::MalformedData`] when the file does not parse as an
    /// array of JSON objects, and [`ServerError::InvalidTrajectory`] when the
    /// array is empty or its first record lacks a string `car_id`.
    pub async fn load(&self, selector: &str) -> Result<Trajectory> {
        let file = self
            .routes
            .get(selector)
            .ok_or_else(|| ServerError::InvalidSelector(selector.to_string()))?;
        let path = self.data_dir.join(file);

        tracing::debug!(selector, path = %path.display(), "loading trajectory");

        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ServerError::ResourceNotFound(path));
            }
            Err(e) => return Err(ServerError::Io(e)),
        };

        let records: Vec<TrajectoryRecord> = serde_json::from_str(&contents)
            .map_err(|source| ServerError::MalformedData {
                path: path.clone(),
                source,
            })?;

        // The first record's car_id is authoritative for registry purposes;
        // later records are intentionally not checked against it.
        let vehicle_id = records
            .first()
            .and_then(TrajectoryRecord::vehicle_id)
            .map(VehicleId::from)
            .ok_or_else(|| ServerError::InvalidTrajectory(selector.to_string()))?;

        tracing::debug!(
            selector,
            vehicle = %vehicle_id,
            records = records.len(),
            "trajectory loaded"
        );

        Ok(Trajectory {
            selector: selector.to_string(),
            vehicle_id,
            records,
        })
    }
}
