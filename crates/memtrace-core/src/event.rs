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

//! Value records produced by the instrumentation engine and stored by the recorder.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// A machine-word sized memory address inside the instrumented program.
pub type Address = usize;

/// The operating-system level identifier of an instrumented thread.
pub type ThreadId = u32;

/// An opaque per-thread identifier assigned by the instrumentation engine.
///
/// Slot ids are the registry key. The engine may hand out the same slot id again
/// once the thread that held it has exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotId(pub u64);

impl Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot#{}", self.0)
    }
}

/// Whether a memory access loaded or stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessDirection {
    /// A load from memory.
    Read,
    /// A store to memory.
    Write,
}

impl AccessDirection {
    /// The single-letter marker used in the access log.
    pub fn marker(self) -> &'static str {
        match self {
            AccessDirection::Read => "r",
            AccessDirection::Write => "w",
        }
    }
}

/// Whether a lock operation took or gave back the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockKind {
    /// The thread acquired the lock.
    Acquire,
    /// The thread released the lock.
    Release,
}

impl LockKind {
    /// The marker used in the access log.
    pub fn marker(self) -> &'static str {
        match self {
            LockKind::Acquire => "lock",
            LockKind::Release => "unlock",
        }
    }
}

/// A single classified memory access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemoryAccessEvent {
    /// The accessed address.
    pub address: Address,
    /// Width of the access in bytes.
    pub size: u32,
    /// The thread that performed the access.
    pub thread_id: ThreadId,
    /// Load or store.
    pub direction: AccessDirection,
}

impl MemoryAccessEvent {
    /// Creates a new memory access event.
    pub fn new(address: Address, size: u32, thread_id: ThreadId, direction: AccessDirection) -> Self {
        Self {
            address,
            size,
            thread_id,
            direction,
        }
    }
}

/// A single lock acquisition or release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LockEvent {
    /// Address of the lock object.
    pub address: Address,
    /// The thread that operated on the lock.
    pub thread_id: ThreadId,
    /// Acquire or release.
    pub kind: LockKind,
}

impl LockEvent {
    /// Creates a new lock event.
    pub fn new(address: Address, thread_id: ThreadId, kind: LockKind) -> Self {
        Self {
            address,
            thread_id,
            kind,
        }
    }
}

/// The engine-defined tag of a raw event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawKind {
    /// A memory load.
    Read,
    /// A memory store.
    Write,
    /// A lock acquisition reported by the engine.
    LockAcquire,
    /// A lock release reported by the engine.
    LockRelease,
    /// An instruction record that carries only its opcode.
    Opcode(u16),
}

/// An unclassified record captured by the instrumentation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawEvent {
    /// The accessed address (or instruction address for opcode records).
    pub address: Address,
    /// Width of the access in bytes.
    pub size: u32,
    /// What the engine observed.
    pub kind: RawKind,
}

impl RawEvent {
    /// Creates a raw event.
    pub fn new(address: Address, size: u32, kind: RawKind) -> Self {
        Self {
            address,
            size,
            kind,
        }
    }

    /// Shorthand for a raw memory load.
    pub fn read(address: Address, size: u32) -> Self {
        Self::new(address, size, RawKind::Read)
    }

    /// Shorthand for a raw memory store.
    pub fn write(address: Address, size: u32) -> Self {
        Self::new(address, size, RawKind::Write)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markers() {
        assert_eq!(AccessDirection::Read.marker(), "r");
        assert_eq!(AccessDirection::Write.marker(), "w");
        assert_eq!(LockKind::Acquire.marker(), "lock");
        assert_eq!(LockKind::Release.marker(), "unlock");
    }

    #[test]
    fn test_raw_event_deserializes_from_engine_json() {
        let json = r#"[
            {"address": 4096, "size": 4, "kind": "write"},
            {"address": 8192, "size": 8, "kind": {"opcode": 87}}
        ]"#;
        let events: Vec<RawEvent> = serde_json::from_str(json).unwrap();

        assert_eq!(events[0], RawEvent::write(0x1000, 4));
        assert_eq!(events[1].kind, RawKind::Opcode(87));
    }

    #[test]
    fn test_slot_id_display() {
        assert_eq!(SlotId(7).to_string(), "slot#7");
    }
}
