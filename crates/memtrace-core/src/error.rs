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

//! Error types shared by every layer of the recorder.

use crate::event::{SlotId, ThreadId};
use std::fmt::{self, Display};
use thiserror::Error;

/// Identifies one of the four per-thread event sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetKind {
    /// Memory loads.
    Reads,
    /// Memory stores.
    Writes,
    /// Lock acquisitions.
    LockAcquires,
    /// Lock releases.
    LockReleases,
}

impl Display for SetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SetKind::Reads => "read",
            SetKind::Writes => "write",
            SetKind::LockAcquires => "lock-acquire",
            SetKind::LockReleases => "lock-release",
        };
        f.write_str(name)
    }
}

/// A set could not obtain the storage it needed.
///
/// The set that reported it is left exactly as it was before the failed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("failed to grow {set} set to {requested_capacity} entries")]
pub struct AllocationFailure {
    /// The set that failed to grow.
    pub set: SetKind,
    /// The capacity that was requested.
    pub requested_capacity: usize,
}

/// Errors reported by the thread registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Every slot of the registry is taken.
    #[error("thread registry is full ({max} threads)")]
    CapacityExceeded {
        /// The configured maximum number of threads.
        max: usize,
    },

    /// No live record exists for the slot.
    #[error("no thread record registered for {0}")]
    NotFound(SlotId),

    /// A live record already exists for the slot.
    #[error("a thread record is already registered for {0}")]
    AlreadyRegistered(SlotId),

    /// One of the record's sets could not be allocated.
    #[error("allocation failed while registering a thread: {0}")]
    Allocation(#[from] AllocationFailure),

    /// The record's log destination could not be opened.
    #[error("failed to open log for {slot}: {source}")]
    LogOpen {
        /// The slot whose log failed to open.
        slot: SlotId,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The record's log could not be flushed during teardown.
    #[error("failed to flush log for {slot}: {source}")]
    LogFlush {
        /// The slot whose log failed to flush.
        slot: SlotId,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors reported while draining a raw buffer.
#[derive(Debug, Error)]
pub enum DrainError {
    /// The slot being drained has no record. This is a lifecycle bug upstream.
    #[error("drain requested for unregistered thread {0}")]
    UnknownThread(SlotId),

    /// A set of the drained thread failed to grow.
    #[error("thread {thread_id} ({slot}): {failure}")]
    Allocation {
        /// The slot being drained.
        slot: SlotId,
        /// The thread being drained.
        thread_id: ThreadId,
        /// Which set failed and how far it tried to grow.
        failure: AllocationFailure,
    },

    /// Writing to the thread's log failed.
    #[error("failed to write access log for {slot}: {source}")]
    Log {
        /// The slot being drained.
        slot: SlotId,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Errors reported when loading or validating a recorder configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid JSON for a `RecorderConfig`.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// A field holds a value the recorder cannot work with.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
