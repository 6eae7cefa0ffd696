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

//! What the instrumentation engine keeps for each running thread.

use memtrace_core::{RawEvent, SlotId, ThreadId};

/// A fixed-capacity batch of raw events captured by the engine.
///
/// The engine pushes events until the buffer reports full, then hands the
/// owning [`ThreadContext`] to a drain, which empties it again.
#[derive(Debug, Clone)]
pub struct RawBuffer {
    events: Vec<RawEvent>,
    capacity: usize,
}

impl RawBuffer {
    /// Creates an empty buffer holding up to `capacity` events.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a captured event and returns `true` once the buffer is full.
    ///
    /// A full buffer must be drained before the next push.
    pub fn push(&mut self, event: RawEvent) -> bool {
        debug_assert!(!self.is_full(), "raw buffer pushed past its capacity");
        self.events.push(event);
        self.is_full()
    }

    /// Returns `true` if no more events fit.
    pub fn is_full(&self) -> bool {
        self.events.len() >= self.capacity
    }

    /// Number of buffered events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns `true` if nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Maximum number of buffered events.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The buffered events, oldest first.
    pub fn events(&self) -> &[RawEvent] {
        &self.events
    }

    /// Empties the buffer, keeping its storage.
    pub fn reset(&mut self) {
        self.events.clear();
    }
}

/// Per-thread state handed back to the engine by
/// [`InstrumentationHooks::on_thread_start`](crate::InstrumentationHooks::on_thread_start).
#[derive(Debug, Clone)]
pub struct ThreadContext {
    slot: SlotId,
    thread_id: ThreadId,
    buffer: RawBuffer,
}

impl ThreadContext {
    /// Creates the context of a thread with an empty buffer.
    pub fn new(slot: SlotId, thread_id: ThreadId, buffer_capacity: usize) -> Self {
        Self {
            slot,
            thread_id,
            buffer: RawBuffer::with_capacity(buffer_capacity),
        }
    }

    /// The engine slot of the thread.
    pub fn slot(&self) -> SlotId {
        self.slot
    }

    /// The thread id.
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// The pending raw events.
    pub fn buffer(&self) -> &RawBuffer {
        &self.buffer
    }

    /// Mutable access for the engine to push events.
    pub fn buffer_mut(&mut self) -> &mut RawBuffer {
        &mut self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_reports_full_at_capacity() {
        let mut buffer = RawBuffer::with_capacity(2);

        assert!(!buffer.push(RawEvent::write(0x10, 4)));
        assert!(buffer.push(RawEvent::read(0x20, 8)));
        assert!(buffer.is_full());
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_reset_empties_and_keeps_capacity() {
        let mut buffer = RawBuffer::with_capacity(3);
        buffer.push(RawEvent::write(0x10, 4));

        buffer.reset();

        assert!(buffer.is_empty());
        assert!(buffer.events().is_empty());
        assert_eq!(buffer.capacity(), 3);
    }

    #[test]
    fn test_context_starts_with_empty_buffer() {
        let context = ThreadContext::new(SlotId(7), 70, 16);
        assert_eq!(context.slot(), SlotId(7));
        assert_eq!(context.thread_id(), 70);
        assert!(context.buffer().is_empty());
        assert_eq!(context.buffer().capacity(), 16);
    }
}
