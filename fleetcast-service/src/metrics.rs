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

//! Lock-free metrics for the FleetCast server

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Lock-free server metrics
///
/// All metrics are stored as atomics and can be updated concurrently by the
/// acceptor and every session task without locks. Use `snapshot()` for a
/// point-in-time view.
#[derive(Debug)]
pub struct ServerMetrics {
    // Session counts
    sessions_total: AtomicU64,
    sessions_active: AtomicU64,
    sessions_dropped: AtomicU64,

    // Stream outcomes
    streams_completed: AtomicU64,
    streams_rejected: AtomicU64,
    streams_failed: AtomicU64,

    // Throughput
    records_streamed: AtomicU64,

    // Acceptor errors
    accept_errors: AtomicU64,

    // Timing (stored as nanoseconds)
    total_session_duration_ns: AtomicU64,

    // Server start time
    started_at: Instant,
}

impl Default for ServerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerMetrics {
    /// Create a new metrics instance
    pub fn new() -> Self {
        Self {
            sessions_total: AtomicU64::new(0),
            sessions_active: AtomicU64::new(0),
            sessions_dropped: AtomicU64::new(0),
            streams_completed: AtomicU64::new(0),
            streams_rejected: AtomicU64::new(0),
            streams_failed: AtomicU64::new(0),
            records_streamed: AtomicU64::new(0),
            accept_errors: AtomicU64::new(0),
            total_session_duration_ns: AtomicU64::new(0),
            started_at: Instant::now(),
        }
    }

    // Session tracking

    /// Record a new session being opened
    pub fn session_opened(&self) {
        self.sessions_total.fetch_add(1, Ordering::Relaxed);
        self.sessions_active.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a session ending
    pub fn session_closed(&self, duration: Duration) {
        self.sessions_active.fetch_sub(1, Ordering::Relaxed);
        self.total_session_duration_ns
            .fetch_add(duration.as_nanos() as u64, Ordering::Relaxed);
    }

    /// Record a connection dropped at the session ceiling
    pub fn session_dropped(&self) {
        self.sessions_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Get the current number of live sessions
    pub fn active_sessions(&self) -> u64 {
        self.sessions_active.load(Ordering::Relaxed)
    }

    /// Get the total number of sessions since server start
    pub fn total_sessions(&self) -> u64 {
        self.sessions_total.load(Ordering::Relaxed)
    }

    // Stream outcome tracking

    /// Record a stream delivered to completion
    pub fn stream_completed(&self) {
        self.streams_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a stream rejected because the vehicle was already active
    pub fn stream_rejected(&self) {
        self.streams_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a stream that failed for any other reason
    pub fn stream_failed(&self) {
        self.streams_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a single record written to a client
    pub fn record_streamed(&self) {
        self.records_streamed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed accept call
    pub fn accept_error(&self) {
        self.accept_errors.fetch_add(1, Ordering::Relaxed);
    }

    // Snapshot

    /// Get a consistent snapshot of all metrics
    ///
    /// The snapshot may not be perfectly consistent under concurrent
    /// updates, but it is close enough for monitoring purposes.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sessions_total: self.sessions_total.load(Ordering::Relaxed),
            sessions_active: self.sessions_active.load(Ordering::Relaxed),
            sessions_dropped: self.sessions_dropped.load(Ordering::Relaxed),
            streams_completed: self.streams_completed.load(Ordering::Relaxed),
            streams_rejected: self.streams_rejected.load(Ordering::Relaxed),
            streams_failed: self.streams_failed.load(Ordering::Relaxed),
            records_streamed: self.records_streamed.load(Ordering::Relaxed),
            accept_errors: self.accept_errors.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
            avg_session_duration: self.average_session_duration(),
        }
    }

    fn average_session_duration(&self) -> Duration {
        let total = self.sessions_total.load(Ordering::Relaxed);
        if total == 0 {
            return Duration::ZERO;
        }
        let total_ns = self.total_session_duration_ns.load(Ordering::Relaxed);
        Duration::from_nanos(total_ns / total)
    }
}

/// A snapshot of server metrics at a point in time
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    /// Total sessions since server start
    pub sessions_total: u64,
    /// Current live sessions
    pub sessions_active: u64,
    /// Connections dropped at the session ceiling
    pub sessions_dropped: u64,
    /// Streams delivered to completion
    pub streams_completed: u64,
    /// Streams rejected on vehicle conflict
    pub streams_rejected: u64,
    /// Streams failed for any other reason
    pub streams_failed: u64,
    /// Total records written to clients
    pub records_streamed: u64,
    /// Failed accept calls
    pub accept_errors: u64,
    /// Server uptime
    pub uptime: Duration,
    /// Average session duration
    pub avg_session_duration: Duration,
}

impl MetricsSnapshot {
    /// Calculate records streamed per second
    pub fn records_per_sec(&self) -> f64 {
        if self.uptime.is_zero() {
            return 0.0;
        }
        self.records_streamed as f64 / self.uptime.as_secs_f64()
    }

    /// Total failures of any kind
    pub fn total_failures(&self) -> u64 {
        self.streams_failed + self.accept_errors
    }
}
