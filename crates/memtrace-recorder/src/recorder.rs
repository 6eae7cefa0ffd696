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

//! The recorder facade wiring the registry, the drain engine and the stats.

use crate::context::ThreadContext;
use crate::drain::DrainEngine;
use crate::error::RecorderError;
use crate::hooks::InstrumentationHooks;
use memtrace_core::{
    AllocationPolicy, DrainError, OpcodeTable, RawEvent, RecorderConfig, RegistryError, SlotId,
    ThreadId,
};
use memtrace_data::{factory_for, LogFactory, ThreadRegistry};
use memtrace_telemetry::{RecorderStats, StatsSnapshot};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Exit status used when a set cannot grow under [`AllocationPolicy::Abort`].
pub const ALLOCATION_FAILURE_EXIT_CODE: i32 = 1;

/// The process-wide access recorder.
///
/// Owns the [`ThreadRegistry`], the [`DrainEngine`] and the activity counters,
/// and implements [`InstrumentationHooks`] on top of them.
#[derive(Debug)]
pub struct Recorder {
    config: RecorderConfig,
    registry: Arc<ThreadRegistry>,
    engine: DrainEngine,
    stats: Arc<RecorderStats>,
    shut_down: AtomicBool,
}

impl Recorder {
    /// Builds a recorder writing its logs through `log_factory`.
    pub fn init(
        config: RecorderConfig,
        log_factory: Arc<dyn LogFactory>,
    ) -> Result<Self, RecorderError> {
        config.validate()?;

        let registry = Arc::new(ThreadRegistry::init(&config, log_factory));
        let stats = Arc::new(RecorderStats::new());
        let opcodes = Arc::new(OpcodeTable::from_map(config.opcode_names.clone()));
        let engine = DrainEngine::new(
            Arc::clone(&registry),
            opcodes,
            config.allocation_policy,
            Arc::clone(&stats),
        );

        log::info!(
            "Recorder initialized ({:?} on allocation failure, raw buffers of {} events)",
            config.allocation_policy,
            config.raw_buffer_capacity
        );
        Ok(Self {
            config,
            registry,
            engine,
            stats,
            shut_down: AtomicBool::new(false),
        })
    }

    /// Builds a recorder writing to the log target named in `config`.
    pub fn from_config(config: RecorderConfig) -> Result<Self, RecorderError> {
        let log_factory = factory_for(&config.log).map_err(RecorderError::LogSetup)?;
        Self::init(config, log_factory)
    }

    /// The configuration the recorder was built with.
    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// The registry of live thread records.
    pub fn registry(&self) -> &ThreadRegistry {
        &self.registry
    }

    /// The drain engine.
    pub fn engine(&self) -> &DrainEngine {
        &self.engine
    }

    /// Current activity counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Buffers one raw event for the thread of `context`, draining when the
    /// buffer fills up.
    pub fn record(&self, context: &mut ThreadContext, event: RawEvent) -> Result<(), RecorderError> {
        if context.buffer_mut().push(event) {
            self.on_buffer_full(context)?;
        }
        Ok(())
    }

    /// Flushes and closes every remaining thread record and returns the final
    /// counters.
    ///
    /// Calling it again only returns the counters.
    pub fn shutdown(&self) -> StatsSnapshot {
        if !self.shut_down.swap(true, Ordering::AcqRel) {
            let flushed = self.registry.shutdown();
            for _ in 0..flushed {
                self.stats.thread_unregistered();
            }
            let snapshot = self.stats.snapshot();
            snapshot.log_summary();
            return snapshot;
        }
        self.stats.snapshot()
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) has run.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    fn abort_on_allocation_failure(&self, err: &DrainError) -> ! {
        log::error!("Fatal: {err}. Terminating.");
        let flushed = self.registry.shutdown();
        log::error!("Flushed {flushed} thread logs before exit");
        std::process::exit(ALLOCATION_FAILURE_EXIT_CODE)
    }
}

impl InstrumentationHooks for Recorder {
    fn on_thread_start(
        &self,
        slot: SlotId,
        thread_id: ThreadId,
    ) -> Result<ThreadContext, RecorderError> {
        match self.registry.register(slot, thread_id) {
            Ok(_) => {
                self.stats.thread_registered();
                Ok(ThreadContext::new(
                    slot,
                    thread_id,
                    self.config.raw_buffer_capacity,
                ))
            }
            Err(e) => {
                self.stats.registration_rejected();
                match &e {
                    RegistryError::CapacityExceeded { .. } => {
                        log::warn!("Thread {thread_id} ({slot}) will not be recorded: {e}");
                    }
                    _ => log::error!("Failed to register thread {thread_id} ({slot}): {e}"),
                }
                Err(e.into())
            }
        }
    }

    fn on_buffer_full(&self, context: &mut ThreadContext) -> Result<(), RecorderError> {
        match self.engine.drain(context) {
            Ok(_) => Ok(()),
            Err(e @ DrainError::Allocation { .. })
                if self.engine.policy() == AllocationPolicy::Abort =>
            {
                self.abort_on_allocation_failure(&e)
            }
            Err(e) => {
                log::error!("{e}");
                Err(e.into())
            }
        }
    }

    fn on_thread_exit(&self, mut context: ThreadContext) -> Result<(), RecorderError> {
        let drained = if context.buffer().is_empty() {
            Ok(())
        } else {
            self.on_buffer_full(&mut context)
        };

        // The slot is freed even when the last drain failed.
        let slot = context.slot();
        let unregistered = self.registry.unregister(slot);
        match &unregistered {
            Ok(()) | Err(RegistryError::LogFlush { .. }) => self.stats.thread_unregistered(),
            Err(_) => {}
        }
        if let Err(e) = &unregistered {
            log::warn!("Thread {} ({slot}) exit: {e}", context.thread_id());
        }

        drained?;
        unregistered.map_err(RecorderError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memtrace_data::{LogWriter, MemoryLogFactory};
    use std::io::{self, Write};

    #[derive(Debug)]
    struct FullDiskFactory;

    struct FullDiskWriter;

    impl Write for FullDiskWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::other("disk full"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl LogFactory for FullDiskFactory {
        fn open(&self, _slot: SlotId, _thread_id: ThreadId) -> io::Result<LogWriter> {
            Ok(Box::new(FullDiskWriter))
        }
    }

    fn recorder(config: RecorderConfig) -> (Recorder, MemoryLogFactory) {
        let logs = MemoryLogFactory::new();
        let recorder = Recorder::init(config, Arc::new(logs.clone())).unwrap();
        (recorder, logs)
    }

    #[test]
    fn test_init_rejects_invalid_config() {
        let config = RecorderConfig {
            max_threads: 0,
            ..RecorderConfig::default()
        };
        let result = Recorder::init(config, Arc::new(MemoryLogFactory::new()));
        assert!(matches!(result, Err(RecorderError::Config(_))));
    }

    #[test]
    fn test_record_drains_when_buffer_fills() {
        let (recorder, logs) = recorder(RecorderConfig {
            raw_buffer_capacity: 2,
            ..RecorderConfig::default()
        });
        let mut context = recorder.on_thread_start(SlotId(1), 11).unwrap();

        recorder.record(&mut context, RawEvent::write(0xa0, 4)).unwrap();
        assert!(logs.lines(SlotId(1)).is_empty());
        recorder.record(&mut context, RawEvent::read(0xb0, 4)).unwrap();

        assert!(context.buffer().is_empty());
        assert_eq!(logs.lines(SlotId(1)), vec!["a0: 4, w", "b0: 4, r"]);
    }

    #[test]
    fn test_thread_exit_drains_remaining_events_then_summarizes() {
        let (recorder, logs) = recorder(RecorderConfig::default());
        let mut context = recorder.on_thread_start(SlotId(4), 44).unwrap();
        recorder.record(&mut context, RawEvent::write(0x1000, 4)).unwrap();

        recorder.on_thread_exit(context).unwrap();

        assert_eq!(
            logs.lines(SlotId(4)),
            vec!["1000: 4, w", "# exit 44: 1 refs, 1 writes, 0 reads", "#w 1000: 4"]
        );
        assert!(recorder.registry().is_empty());
        assert_eq!(recorder.stats().threads_unregistered, 1);
    }

    #[test]
    fn test_start_beyond_capacity_is_rejected() {
        let (recorder, _) = recorder(RecorderConfig {
            max_threads: 1,
            ..RecorderConfig::default()
        });
        recorder.on_thread_start(SlotId(0), 1).unwrap();

        let err = recorder.on_thread_start(SlotId(1), 2).unwrap_err();

        assert!(matches!(
            err,
            RecorderError::Registry(RegistryError::CapacityExceeded { max: 1 })
        ));
        assert_eq!(recorder.stats().registrations_rejected, 1);
    }

    #[test]
    fn test_buffer_full_for_unregistered_thread_is_an_error() {
        let (recorder, _) = recorder(RecorderConfig::default());
        let mut context = ThreadContext::new(SlotId(9), 9, 4);
        context.buffer_mut().push(RawEvent::read(0x1, 1));

        let err = recorder.on_buffer_full(&mut context).unwrap_err();

        assert!(matches!(
            err,
            RecorderError::Drain(DrainError::UnknownThread(SlotId(9)))
        ));
    }

    #[test]
    fn test_shutdown_flushes_live_threads_once() {
        let (recorder, logs) = recorder(RecorderConfig::default());
        let mut context = recorder.on_thread_start(SlotId(2), 22).unwrap();
        recorder.record(&mut context, RawEvent::write(0x20, 8)).unwrap();
        recorder.on_buffer_full(&mut context).unwrap();

        let first = recorder.shutdown();
        let second = recorder.shutdown();

        assert!(recorder.is_shut_down());
        assert_eq!(first.threads_unregistered, 1);
        assert_eq!(first, second);
        let headers = logs
            .lines(SlotId(2))
            .into_iter()
            .filter(|line| line.starts_with("# exit"))
            .count();
        assert_eq!(headers, 1);
    }

    #[test]
    fn test_thread_exit_frees_slot_when_last_drain_fails() {
        let recorder = Recorder::init(RecorderConfig::default(), Arc::new(FullDiskFactory)).unwrap();
        let mut context = recorder.on_thread_start(SlotId(1), 10).unwrap();
        recorder.record(&mut context, RawEvent::write(0x1000, 4)).unwrap();

        let err = recorder.on_thread_exit(context).unwrap_err();

        assert!(matches!(err, RecorderError::Drain(DrainError::Log { .. })));
        assert!(recorder.registry().lookup(SlotId(1)).is_none());
        assert!(recorder.registry().is_empty());
        assert_eq!(recorder.stats().threads_unregistered, 1);
        assert!(recorder.on_thread_start(SlotId(1), 11).is_ok());
    }
}
