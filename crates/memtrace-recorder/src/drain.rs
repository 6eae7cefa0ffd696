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

//! Converts a full raw buffer into stored events and log lines.

use crate::context::ThreadContext;
use memtrace_core::log_format::AccessLine;
use memtrace_core::{
    AccessDirection, AllocationFailure, AllocationPolicy, DrainError, LockEvent, LockKind,
    MemoryAccessEvent, OpcodeNames, RawEvent, RawKind, SlotId, ThreadId,
};
use memtrace_data::{ThreadRecord, ThreadRegistry};
use memtrace_telemetry::{DrainCounts, RecorderStats, ScopedDrainTimer};
use std::borrow::Cow;
use std::io::Write;
use std::sync::Arc;

/// What a successful drain did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainOutcome {
    /// The drained slot.
    pub slot: SlotId,
    /// The drained thread.
    pub thread_id: ThreadId,
    /// Per-category counts of the batch.
    pub counts: DrainCounts,
}

/// Where a raw event ends up.
#[derive(Debug, Clone, Copy)]
enum Classified {
    Access(AccessDirection),
    Lock(LockKind),
    Opcode(u16),
}

impl Classified {
    fn of(kind: RawKind) -> Self {
        match kind {
            RawKind::Read => Self::Access(AccessDirection::Read),
            RawKind::Write => Self::Access(AccessDirection::Write),
            RawKind::LockAcquire => Self::Lock(LockKind::Acquire),
            RawKind::LockRelease => Self::Lock(LockKind::Release),
            RawKind::Opcode(opcode) => Self::Opcode(opcode),
        }
    }
}

/// Drains raw buffers into the records of a [`ThreadRegistry`].
///
/// Each drain runs on the thread that owns the buffer and only touches that
/// thread's record, so drains of different threads never contend.
#[derive(Debug)]
pub struct DrainEngine {
    registry: Arc<ThreadRegistry>,
    opcodes: Arc<dyn OpcodeNames>,
    policy: AllocationPolicy,
    stats: Arc<RecorderStats>,
}

impl DrainEngine {
    /// Creates an engine draining into `registry`.
    pub fn new(
        registry: Arc<ThreadRegistry>,
        opcodes: Arc<dyn OpcodeNames>,
        policy: AllocationPolicy,
        stats: Arc<RecorderStats>,
    ) -> Self {
        Self {
            registry,
            opcodes,
            policy,
            stats,
        }
    }

    /// What happens when a set cannot grow.
    pub fn policy(&self) -> AllocationPolicy {
        self.policy
    }

    /// Classifies, stores and logs every event of `context`'s buffer, in order,
    /// then empties the buffer and flushes the thread's log.
    ///
    /// An unregistered slot is reported as [`DrainError::UnknownThread`] and the
    /// buffer is left untouched. Under [`AllocationPolicy::Abort`] a set that
    /// cannot grow stops the drain with [`DrainError::Allocation`]; the caller
    /// is expected to terminate.
    pub fn drain(&self, context: &mut ThreadContext) -> Result<DrainOutcome, DrainError> {
        let slot = context.slot();
        let handle = self
            .registry
            .lookup(slot)
            .ok_or(DrainError::UnknownThread(slot))?;

        let _timer = ScopedDrainTimer::new(&self.stats);
        let mut record = handle.lock();
        let thread_id = record.thread_id();
        let result = self.drain_into(&mut record, context.buffer().events());
        drop(record);
        context.buffer_mut().reset();

        let counts = match result {
            Ok(counts) => counts,
            Err(e) => {
                self.stats.drain_failed();
                return Err(e);
            }
        };
        self.stats.record_drain(&counts);
        log::trace!(
            "Drained {} events for thread {} ({})",
            counts.events,
            thread_id,
            slot
        );
        Ok(DrainOutcome {
            slot,
            thread_id,
            counts,
        })
    }

    fn drain_into(
        &self,
        record: &mut ThreadRecord,
        events: &[RawEvent],
    ) -> Result<DrainCounts, DrainError> {
        let slot = record.slot();
        let thread_id = record.thread_id();
        let growths_before = total_growths(record);
        let mut counts = DrainCounts::default();

        for raw in events {
            let class = Classified::of(raw.kind);
            if let Err(failure) = store(record, class, raw) {
                self.stats.allocation_failed();
                match self.policy {
                    AllocationPolicy::Abort => {
                        return Err(DrainError::Allocation {
                            slot,
                            thread_id,
                            failure,
                        });
                    }
                    AllocationPolicy::LogOnly => {
                        if record.dropped() == 0 {
                            log::warn!(
                                "Thread {thread_id} ({slot}): {failure}, further events are logged only"
                            );
                        }
                        record.note_dropped();
                        counts.dropped += 1;
                    }
                }
            } else {
                match class {
                    Classified::Access(AccessDirection::Read) => counts.reads += 1,
                    Classified::Access(AccessDirection::Write) => counts.writes += 1,
                    Classified::Lock(LockKind::Acquire) => counts.lock_acquires += 1,
                    Classified::Lock(LockKind::Release) => counts.lock_releases += 1,
                    Classified::Opcode(_) => counts.opcodes += 1,
                }
            }

            let marker = self.marker(class);
            let line = AccessLine {
                address: raw.address,
                size: raw.size,
                marker: &*marker,
            };
            writeln!(record.log(), "{line}").map_err(|source| DrainError::Log { slot, source })?;
            record.note_processed();
            counts.events += 1;
        }

        record
            .log()
            .flush()
            .map_err(|source| DrainError::Log { slot, source })?;
        counts.set_growths = total_growths(record) - growths_before;
        Ok(counts)
    }

    fn marker(&self, class: Classified) -> Cow<'_, str> {
        match class {
            Classified::Access(direction) => Cow::Borrowed(direction.marker()),
            Classified::Lock(kind) => Cow::Borrowed(kind.marker()),
            Classified::Opcode(opcode) => self.opcodes.name(opcode),
        }
    }
}

/// Appends the event to the set its class maps to. Opcode-only events are not stored.
fn store(record: &mut ThreadRecord, class: Classified, raw: &RawEvent) -> Result<(), AllocationFailure> {
    let thread_id = record.thread_id();
    match class {
        Classified::Access(direction) => record.record_access(MemoryAccessEvent::new(
            raw.address,
            raw.size,
            thread_id,
            direction,
        )),
        Classified::Lock(kind) => record.record_lock(LockEvent::new(raw.address, thread_id, kind)),
        Classified::Opcode(_) => Ok(()),
    }
}

fn total_growths(record: &ThreadRecord) -> u64 {
    record.reads().growth_count()
        + record.writes().growth_count()
        + record.lock_acquires().growth_count()
        + record.lock_releases().growth_count()
}
