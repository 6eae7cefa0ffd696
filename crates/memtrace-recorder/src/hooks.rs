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

//! The callbacks the instrumentation engine invokes.

use crate::context::ThreadContext;
use crate::error::RecorderError;
use memtrace_core::{SlotId, ThreadId};

/// The thread lifecycle as seen by the instrumentation engine.
///
/// Every callback runs on the thread it concerns. The engine calls
/// `on_thread_start` once per thread, `on_buffer_full` whenever the thread's raw
/// buffer fills up, and `on_thread_exit` once when the thread ends.
pub trait InstrumentationHooks: Send + Sync {
    /// Registers a newly started thread and returns the context the engine
    /// should buffer its events in.
    fn on_thread_start(
        &self,
        slot: SlotId,
        thread_id: ThreadId,
    ) -> Result<ThreadContext, RecorderError>;

    /// Drains the thread's full raw buffer.
    fn on_buffer_full(&self, context: &mut ThreadContext) -> Result<(), RecorderError>;

    /// Drains whatever is still buffered, then writes the exit summary and
    /// frees the thread's slot.
    fn on_thread_exit(&self, context: ThreadContext) -> Result<(), RecorderError>;
}
