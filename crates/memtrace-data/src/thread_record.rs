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

//! The recorded state of a single instrumented thread.

use crate::event_set::GrowableEventSet;
use crate::log_sink::{LogFactory, LogWriter};
use memtrace_core::log_format::{ExitHeader, RetainedLine};
use memtrace_core::{
    AccessDirection, AllocationFailure, GrowthPolicy, LockEvent, LockKind, MemoryAccessEvent,
    RegistryError, SetKind, SlotId, ThreadId,
};
use std::io::{self, Write};

/// One thread's event sets, log destination and counters.
///
/// Records are created and destroyed only by the
/// [`ThreadRegistry`](crate::registry::ThreadRegistry). Between the two, the
/// sets are mutated exclusively by the owning thread while it drains.
pub struct ThreadRecord {
    slot: SlotId,
    thread_id: ThreadId,
    reads: GrowableEventSet<MemoryAccessEvent>,
    writes: GrowableEventSet<MemoryAccessEvent>,
    lock_acquires: GrowableEventSet<LockEvent>,
    lock_releases: GrowableEventSet<LockEvent>,
    log: LogWriter,
    processed: u64,
    dropped: u64,
}

impl std::fmt::Debug for ThreadRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadRecord")
            .field("slot", &self.slot)
            .field("thread_id", &self.thread_id)
            .field("reads", &self.reads.len())
            .field("writes", &self.writes.len())
            .field("lock_acquires", &self.lock_acquires.len())
            .field("lock_releases", &self.lock_releases.len())
            .field("processed", &self.processed)
            .field("dropped", &self.dropped)
            .finish()
    }
}

impl ThreadRecord {
    /// Allocates the four sets and opens the log.
    ///
    /// If anything fails, every set created so far is dropped before returning.
    pub(crate) fn create(
        slot: SlotId,
        thread_id: ThreadId,
        policy: GrowthPolicy,
        log_factory: &dyn LogFactory,
    ) -> Result<Self, RegistryError> {
        let reads = GrowableEventSet::with_policy(SetKind::Reads, policy)?;
        let writes = GrowableEventSet::with_policy(SetKind::Writes, policy)?;
        let lock_acquires = GrowableEventSet::with_policy(SetKind::LockAcquires, policy)?;
        let lock_releases = GrowableEventSet::with_policy(SetKind::LockReleases, policy)?;
        let log = log_factory
            .open(slot, thread_id)
            .map_err(|source| RegistryError::LogOpen { slot, source })?;

        Ok(Self {
            slot,
            thread_id,
            reads,
            writes,
            lock_acquires,
            lock_releases,
            log,
            processed: 0,
            dropped: 0,
        })
    }

    /// The engine slot this record is registered under.
    pub fn slot(&self) -> SlotId {
        self.slot
    }

    /// The thread the record belongs to.
    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// Memory loads recorded so far.
    pub fn reads(&self) -> &GrowableEventSet<MemoryAccessEvent> {
        &self.reads
    }

    /// Memory stores recorded so far.
    pub fn writes(&self) -> &GrowableEventSet<MemoryAccessEvent> {
        &self.writes
    }

    /// Lock acquisitions recorded so far.
    pub fn lock_acquires(&self) -> &GrowableEventSet<LockEvent> {
        &self.lock_acquires
    }

    /// Lock releases recorded so far.
    pub fn lock_releases(&self) -> &GrowableEventSet<LockEvent> {
        &self.lock_releases
    }

    /// Appends a memory access to the read or write set.
    pub fn record_access(&mut self, event: MemoryAccessEvent) -> Result<(), AllocationFailure> {
        match event.direction {
            AccessDirection::Read => self.reads.append(event),
            AccessDirection::Write => self.writes.append(event),
        }
    }

    /// Appends a lock event to the acquire or release set.
    pub fn record_lock(&mut self, event: LockEvent) -> Result<(), AllocationFailure> {
        match event.kind {
            LockKind::Acquire => self.lock_acquires.append(event),
            LockKind::Release => self.lock_releases.append(event),
        }
    }

    /// The log destination of the thread.
    pub fn log(&mut self) -> &mut dyn Write {
        &mut self.log
    }

    /// Raw events drained for this thread so far.
    pub fn processed(&self) -> u64 {
        self.processed
    }

    /// Counts one drained raw event.
    pub fn note_processed(&mut self) {
        self.processed += 1;
    }

    /// Events that were logged but could not be stored because a set was full.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Counts one event that was logged but not stored.
    pub fn note_dropped(&mut self) {
        self.dropped += 1;
    }

    /// Writes the exit summary (every write, and every read if asked) and
    /// flushes the log.
    pub(crate) fn write_exit_summary(&mut self, include_reads: bool) -> io::Result<()> {
        let header = ExitHeader {
            thread_id: self.thread_id,
            processed: self.processed,
            writes: self.writes.len(),
            reads: self.reads.len(),
        };
        writeln!(self.log, "{header}")?;

        let retained = self
            .writes
            .iter()
            .chain(self.reads.iter().filter(|_| include_reads));
        for event in retained {
            let line = RetainedLine {
                direction: event.direction,
                address: event.address,
                size: event.size,
            };
            writeln!(self.log, "{line}")?;
        }
        self.log.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log_sink::MemoryLogFactory;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Default)]
    struct RefusingFactory {
        attempts: AtomicUsize,
    }

    impl LogFactory for RefusingFactory {
        fn open(&self, _slot: SlotId, _thread_id: ThreadId) -> io::Result<LogWriter> {
            self.attempts.fetch_add(1, Ordering::Relaxed);
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"))
        }
    }

    #[test]
    fn test_create_allocates_all_sets_at_initial_capacity() {
        let factory = MemoryLogFactory::new();
        let record =
            ThreadRecord::create(SlotId(1), 10, GrowthPolicy::default(), &factory).unwrap();

        assert_eq!(record.reads().capacity(), 100);
        assert_eq!(record.writes().capacity(), 100);
        assert_eq!(record.lock_acquires().capacity(), 100);
        assert_eq!(record.lock_releases().capacity(), 100);
        assert_eq!(record.processed(), 0);
    }

    #[test]
    fn test_create_fails_on_log_open() {
        let factory = RefusingFactory::default();
        let result = ThreadRecord::create(SlotId(1), 10, GrowthPolicy::default(), &factory);

        assert!(matches!(result, Err(RegistryError::LogOpen { .. })));
        assert_eq!(factory.attempts.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_create_fails_before_opening_log_when_sets_cannot_be_allocated() {
        let factory = RefusingFactory::default();
        let policy = GrowthPolicy {
            initial_capacity: 10,
            increment: 1,
            ceiling: Some(1),
        };
        let result = ThreadRecord::create(SlotId(1), 10, policy, &factory);

        assert!(matches!(result, Err(RegistryError::Allocation(_))));
        assert_eq!(factory.attempts.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_events_are_routed_to_their_sets() {
        let factory = MemoryLogFactory::new();
        let mut record =
            ThreadRecord::create(SlotId(1), 10, GrowthPolicy::default(), &factory).unwrap();

        record
            .record_access(MemoryAccessEvent::new(0x10, 4, 10, AccessDirection::Write))
            .unwrap();
        record
            .record_access(MemoryAccessEvent::new(0x20, 8, 10, AccessDirection::Read))
            .unwrap();
        record
            .record_lock(LockEvent::new(0x30, 10, LockKind::Acquire))
            .unwrap();

        assert_eq!(record.writes().len(), 1);
        assert_eq!(record.reads().len(), 1);
        assert_eq!(record.lock_acquires().len(), 1);
        assert!(record.lock_releases().is_empty());
    }

    #[test]
    fn test_exit_summary_lists_writes_then_optional_reads() {
        let factory = MemoryLogFactory::new();
        let mut record =
            ThreadRecord::create(SlotId(4), 10, GrowthPolicy::default(), &factory).unwrap();
        record
            .record_access(MemoryAccessEvent::new(0x10, 4, 10, AccessDirection::Write))
            .unwrap();
        record
            .record_access(MemoryAccessEvent::new(0x20, 8, 10, AccessDirection::Read))
            .unwrap();
        record.note_processed();
        record.note_processed();

        record.write_exit_summary(true).unwrap();

        assert_eq!(
            factory.lines(SlotId(4)),
            vec!["# exit 10: 2 refs, 1 writes, 1 reads", "#w 10: 4", "#r 20: 8"]
        );
    }
}
