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

//! # memtrace data
//!
//! Data layouts of the access recorder: the growable per-kind event sets, the
//! per-thread record that owns them, the registry that creates and destroys
//! records, and the log destinations records append to.

#![warn(missing_docs)]

pub mod event_set;
pub mod log_sink;
pub mod registry;
pub mod thread_record;

pub use event_set::GrowableEventSet;
pub use log_sink::{
    factory_for, FileLogFactory, LogFactory, LogWriter, MemoryLogFactory, SharedFileLogFactory,
};
pub use registry::{RecordHandle, ThreadRegistry};
pub use thread_record::ThreadRecord;
