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

//! The process-wide registry of thread records.

use crate::log_sink::LogFactory;
use crate::thread_record::ThreadRecord;
use memtrace_core::{GrowthPolicy, RecorderConfig, RegistryError, SlotId, ThreadId};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A shared handle to a registered [`ThreadRecord`].
///
/// Only the owning thread locks the record while it drains, so the lock is
/// never contended in practice.
#[derive(Debug, Clone)]
pub struct RecordHandle {
    slot: SlotId,
    record: Arc<Mutex<ThreadRecord>>,
}

impl RecordHandle {
    /// The slot the record is registered under.
    pub fn slot(&self) -> SlotId {
        self.slot
    }

    /// Gives exclusive access to the record.
    pub fn lock(&self) -> MutexGuard<'_, ThreadRecord> {
        self.record.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A bounded, thread-safe registry of thread records keyed by slot id.
///
/// Records are built before they are inserted and torn down after they are
/// removed, so a lookup never observes one that is half built or half torn down.
/// The write side of the slot table is only held for the insertion or removal
/// itself, never across log I/O. Slots are kept in registration order and every
/// scan is bounded by the number of live entries.
#[derive(Debug)]
pub struct ThreadRegistry {
    slots: RwLock<Vec<RecordHandle>>,
    max_threads: usize,
    policy: GrowthPolicy,
    flush_reads_on_exit: bool,
    log_factory: Arc<dyn LogFactory>,
}

impl ThreadRegistry {
    /// Creates an empty registry sized and configured from `config`.
    pub fn init(config: &RecorderConfig, log_factory: Arc<dyn LogFactory>) -> Self {
        log::info!(
            "Thread registry initialized (max {} threads, sets {}+{})",
            config.max_threads,
            config.initial_set_capacity,
            config.growth_increment
        );
        Self {
            slots: RwLock::new(Vec::with_capacity(config.max_threads)),
            max_threads: config.max_threads,
            policy: config.growth_policy(),
            flush_reads_on_exit: config.flush_reads_on_exit,
            log_factory,
        }
    }

    fn read_slots(&self) -> RwLockReadGuard<'_, Vec<RecordHandle>> {
        self.slots.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_slots(&self) -> RwLockWriteGuard<'_, Vec<RecordHandle>> {
        self.slots.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_admission(&self, slots: &[RecordHandle], slot: SlotId) -> Result<(), RegistryError> {
        if slots.len() >= self.max_threads {
            return Err(RegistryError::CapacityExceeded {
                max: self.max_threads,
            });
        }
        if slots.iter().any(|handle| handle.slot == slot) {
            return Err(RegistryError::AlreadyRegistered(slot));
        }
        Ok(())
    }

    /// Creates and registers the record of a newly observed thread.
    ///
    /// The record and its log are created outside the slot-table lock; capacity
    /// and duplicates are checked again under the lock before it is inserted.
    pub fn register(
        &self,
        slot: SlotId,
        thread_id: ThreadId,
    ) -> Result<RecordHandle, RegistryError> {
        self.check_admission(&self.read_slots(), slot)?;

        let record = ThreadRecord::create(slot, thread_id, self.policy, self.log_factory.as_ref())?;
        let handle = RecordHandle {
            slot,
            record: Arc::new(Mutex::new(record)),
        };

        let mut slots = self.write_slots();
        self.check_admission(&slots, slot)?;
        slots.push(handle.clone());
        let used = slots.len();
        drop(slots);

        log::info!(
            "Registered thread {} in {} ({}/{} slots used)",
            thread_id,
            slot,
            used,
            self.max_threads
        );
        Ok(handle)
    }

    /// Finds the record registered under `slot`.
    pub fn lookup(&self, slot: SlotId) -> Option<RecordHandle> {
        self.read_slots()
            .iter()
            .find(|handle| handle.slot == slot)
            .cloned()
    }

    /// Frees the slot of the record registered under `slot`, then writes its
    /// exit summary and flushes and closes its log.
    ///
    /// The record is detached from the slot table before any I/O, so other
    /// threads' lookups never wait on it. The flush error, if any, is still
    /// reported.
    pub fn unregister(&self, slot: SlotId) -> Result<(), RegistryError> {
        let handle = {
            let mut slots = self.write_slots();
            let index = slots
                .iter()
                .position(|handle| handle.slot == slot)
                .ok_or(RegistryError::NotFound(slot))?;
            slots.remove(index)
        };

        let flushed = self.finalize(&handle);
        log::info!("Unregistered {}", slot);
        flushed
    }

    fn finalize(&self, handle: &RecordHandle) -> Result<(), RegistryError> {
        let mut record = handle.lock();
        record
            .write_exit_summary(self.flush_reads_on_exit)
            .map_err(|source| RegistryError::LogFlush {
                slot: handle.slot,
                source,
            })
    }

    /// Unregisters every remaining record, in registration order.
    ///
    /// Flush failures are logged and do not stop the teardown. Returns the number
    /// of records that were torn down; calling it again returns zero.
    pub fn shutdown(&self) -> usize {
        let remaining = std::mem::take(&mut *self.write_slots());
        for handle in &remaining {
            if let Err(e) = self.finalize(handle) {
                log::warn!("Thread registry shutdown: {e}");
            }
        }
        if !remaining.is_empty() {
            log::info!(
                "Thread registry shut down, {} records flushed",
                remaining.len()
            );
        }
        remaining.len()
    }

    /// Number of registered threads.
    pub fn len(&self) -> usize {
        self.read_slots().len()
    }

    /// Returns `true` if no thread is registered.
    pub fn is_empty(&self) -> bool {
        self.read_slots().is_empty()
    }

    /// The maximum number of simultaneously registered threads.
    pub fn max_threads(&self) -> usize {
        self.max_threads
    }

    /// Slot ids of all registered threads, in registration order.
    pub fn slot_ids(&self) -> Vec<SlotId> {
        self.read_slots().iter().map(RecordHandle::slot).collect()
    }
}
