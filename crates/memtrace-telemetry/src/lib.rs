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

//! # memtrace telemetry
//!
//! Counters and timers describing the recorder's own activity: how many threads
//! came and went, how many events were drained and stored, how often sets grew
//! and how long drains take.

#![warn(missing_docs)]

pub mod stats;
pub mod timer;

pub use stats::{DrainCounts, RecorderStats, StatsSnapshot};
pub use timer::ScopedDrainTimer;
