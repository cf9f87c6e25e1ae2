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

//! Active-vehicle registry implementation
//!
//! The registry is the only piece of shared mutable state in the server. It
//! tracks which vehicles currently have a live stream and guarantees that
//! the check-and-insert is atomic: two clients racing for the same vehicle
//! can never both be granted a reservation. The lock is held only for the
//! duration of the set operation, never across I/O or sleeps.

use crate::types::VehicleId;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Process-wide set of vehicles with an active stream
///
/// The backing set is never exposed; callers can only reserve and release,
/// which keeps the check-then-insert race confined to this module.
#[derive(Debug, Default)]
pub struct ActiveVehicleRegistry {
    vehicles: Mutex<HashSet<VehicleId>>,
}

impl ActiveVehicleRegistry {
    /// Create a new, empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically reserve a vehicle for streaming
    ///
    /// Returns `true` iff the vehicle was not already reserved. On `false`
    /// the registry is unchanged and the existing reservation is untouched.
    /// A granted reservation must be released exactly once by the owning
    /// session, on every exit path.
    pub fn try_reserve(&self, vehicle: &VehicleId) -> bool {
        self.lock().insert(vehicle.clone())
    }

    /// Release a vehicle's reservation
    ///
    /// Idempotent: releasing a vehicle that is not reserved is a no-op.
    pub fn release(&self, vehicle: &VehicleId) {
        self.lock().remove(vehicle);
    }

    /// Check whether a vehicle currently has an active stream
    pub fn is_active(&self, vehicle: &VehicleId) -> bool {
        self.lock().contains(vehicle)
    }

    /// Number of vehicles currently streaming
    pub fn active_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<VehicleId>> {
        // A poisoned lock only means a holder panicked between two set
        // operations; the set itself is still consistent.
        self.vehicles.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
