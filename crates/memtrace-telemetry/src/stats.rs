// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Lock-free counters describing what the recorder has done.
//!
//! Every instrumented thread bumps these from inside its own drain, so they are
//! plain relaxed atomics. A [`StatsSnapshot`] is a consistent-enough copy for
//! reporting; individual counters may be a few events apart from each other.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Recorder-wide activity counters.
#[derive(Debug, Default)]
pub struct RecorderStats {
    threads_registered: AtomicU64,
    threads_unregistered: AtomicU64,
    registrations_rejected: AtomicU64,
    drains: AtomicU64,
    drains_failed: AtomicU64,
    events_drained: AtomicU64,
    reads: AtomicU64,
    writes: AtomicU64,
    lock_acquires: AtomicU64,
    lock_releases: AtomicU64,
    opcodes: AtomicU64,
    set_growths: AtomicU64,
    events_dropped: AtomicU64,
    allocation_failures: AtomicU64,
    drain_nanos_total: AtomicU64,
    drain_nanos_max: AtomicU64,
}

/// What a single drain did, folded into [`RecorderStats`] in one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainCounts {
    /// Raw events consumed.
    pub events: u64,
    /// Events stored in the read set.
    pub reads: u64,
    /// Events stored in the write set.
    pub writes: u64,
    /// Events stored in the lock-acquire set.
    pub lock_acquires: u64,
    /// Events stored in the lock-release set.
    pub lock_releases: u64,
    /// Opcode-only events (logged, never stored).
    pub opcodes: u64,
    /// Set growths triggered by the drain.
    pub set_growths: u64,
    /// Events logged but not stored because a set could not grow.
    pub dropped: u64,
}

impl RecorderStats {
    /// Creates a zeroed set of counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts a successful thread registration.
    pub fn thread_registered(&self) {
        self.threads_registered.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a thread teardown.
    pub fn thread_unregistered(&self) {
        self.threads_unregistered.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a registration refused by the registry.
    pub fn registration_rejected(&self) {
        self.registrations_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a set that could not grow.
    pub fn allocation_failed(&self) {
        self.allocation_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts a drain that stopped on an error.
    pub fn drain_failed(&self) {
        self.drains_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Folds the result of one drain into the totals.
    pub fn record_drain(&self, counts: &DrainCounts) {
        self.drains.fetch_add(1, Ordering::Relaxed);
        self.events_drained.fetch_add(counts.events, Ordering::Relaxed);
        self.reads.fetch_add(counts.reads, Ordering::Relaxed);
        self.writes.fetch_add(counts.writes, Ordering::Relaxed);
        self.lock_acquires.fetch_add(counts.lock_acquires, Ordering::Relaxed);
        self.lock_releases.fetch_add(counts.lock_releases, Ordering::Relaxed);
        self.opcodes.fetch_add(counts.opcodes, Ordering::Relaxed);
        self.set_growths.fetch_add(counts.set_growths, Ordering::Relaxed);
        self.events_dropped.fetch_add(counts.dropped, Ordering::Relaxed);
    }

    /// Records how long one drain took, whether it succeeded or failed.
    pub fn record_drain_time(&self, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.drain_nanos_total.fetch_add(nanos, Ordering::Relaxed);
        self.drain_nanos_max.fetch_max(nanos, Ordering::Relaxed);
    }

    /// Copies the current counter values.
    pub fn snapshot(&self) -> StatsSnapshot {
        let drains = self.drains.load(Ordering::Relaxed);
        let drains_failed = self.drains_failed.load(Ordering::Relaxed);
        let timed = drains + drains_failed;
        let drain_nanos_total = self.drain_nanos_total.load(Ordering::Relaxed);
        StatsSnapshot {
            threads_registered: self.threads_registered.load(Ordering::Relaxed),
            threads_unregistered: self.threads_unregistered.load(Ordering::Relaxed),
            registrations_rejected: self.registrations_rejected.load(Ordering::Relaxed),
            drains,
            drains_failed,
            events_drained: self.events_drained.load(Ordering::Relaxed),
            reads: self.reads.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            lock_acquires: self.lock_acquires.load(Ordering::Relaxed),
            lock_releases: self.lock_releases.load(Ordering::Relaxed),
            opcodes: self.opcodes.load(Ordering::Relaxed),
            set_growths: self.set_growths.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            allocation_failures: self.allocation_failures.load(Ordering::Relaxed),
            mean_drain_micros: if timed == 0 {
                0.0
            } else {
                drain_nanos_total as f64 / timed as f64 / 1_000.0
            },
            max_drain_micros: self.drain_nanos_max.load(Ordering::Relaxed) as f64 / 1_000.0,
        }
    }
}

/// A point-in-time copy of [`RecorderStats`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsSnapshot {
    /// Threads registered since start.
    pub threads_registered: u64,
    /// Threads torn down since start.
    pub threads_unregistered: u64,
    /// Registrations refused (registry full, duplicate slot, allocation or log failure).
    pub registrations_rejected: u64,
    /// Drain calls completed.
    pub drains: u64,
    /// Drain calls that stopped on an error.
    pub drains_failed: u64,
    /// Raw events consumed by drains.
    pub events_drained: u64,
    /// Events stored in read sets.
    pub reads: u64,
    /// Events stored in write sets.
    pub writes: u64,
    /// Events stored in lock-acquire sets.
    pub lock_acquires: u64,
    /// Events stored in lock-release sets.
    pub lock_releases: u64,
    /// Opcode-only events logged.
    pub opcodes: u64,
    /// Set growths across all threads.
    pub set_growths: u64,
    /// Events logged but not stored.
    pub events_dropped: u64,
    /// Sets that failed to grow.
    pub allocation_failures: u64,
    /// Average duration of every drain, failed ones included, in microseconds.
    pub mean_drain_micros: f64,
    /// Longest drain in microseconds.
    pub max_drain_micros: f64,
}

impl StatsSnapshot {
    /// Logs a human-readable summary at info level.
    pub fn log_summary(&self) {
        log::info!("--- Recorder Summary ---");
        log::info!(
            "  threads: {} registered, {} unregistered, {} rejected",
            self.threads_registered,
            self.threads_unregistered,
            self.registrations_rejected
        );
        log::info!(
            "  events: {} drained in {} drains, {} failed ({} r / {} w / {} lock / {} unlock / {} opcode)",
            self.events_drained,
            self.drains,
            self.drains_failed,
            self.reads,
            self.writes,
            self.lock_acquires,
            self.lock_releases,
            self.opcodes
        );
        log::info!(
            "  sets: {} growths, {} dropped events, {} allocation failures",
            self.set_growths,
            self.events_dropped,
            self.allocation_failures
        );
        log::info!(
            "  drain time: mean {:.2}us, max {:.2}us",
            self.mean_drain_micros,
            self.max_drain_micros
        );
    }
}
