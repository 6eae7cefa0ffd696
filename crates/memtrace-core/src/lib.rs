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

//! # memtrace core
//!
//! Foundational crate of the access recorder: the event records captured from
//! the instrumented program, the error contracts shared by every layer, the
//! recorder configuration and the stable access-log line format.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod event;
pub mod log_format;
pub mod opcode;

pub use config::{AllocationPolicy, GrowthPolicy, LogTarget, RecorderConfig};
pub use error::{AllocationFailure, ConfigError, DrainError, RegistryError, SetKind};
pub use event::{
    AccessDirection, Address, LockEvent, LockKind, MemoryAccessEvent, RawEvent, RawKind, SlotId,
    ThreadId,
};
pub use opcode::{OpcodeNames, OpcodeTable};
