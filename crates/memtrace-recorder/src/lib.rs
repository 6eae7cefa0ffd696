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

//! # memtrace recorder
//!
//! The runtime half of the access recorder. The instrumentation engine buffers
//! raw events in a per-thread [`ThreadContext`] and calls the
//! [`InstrumentationHooks`] of the installed [`Recorder`]; each full buffer is
//! drained by the [`DrainEngine`] into the thread's record and log.

#![warn(missing_docs)]

pub mod context;
pub mod drain;
pub mod error;
pub mod global;
pub mod hooks;
pub mod recorder;

pub use context::{RawBuffer, ThreadContext};
pub use drain::{DrainEngine, DrainOutcome};
pub use error::RecorderError;
pub use global::{install, installed};
pub use hooks::InstrumentationHooks;
pub use recorder::{Recorder, ALLOCATION_FAILURE_EXIT_CODE};
