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

//! Replays a trace through a recorder, one OS thread per traced thread.

use crate::trace::{ThreadTrace, Trace};
use memtrace_recorder::{InstrumentationHooks, Recorder, RecorderError};
use serde::Serialize;
use std::thread;

/// What happened to the threads of a replayed trace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    /// Threads whose events were all recorded.
    pub threads_recorded: usize,
    /// Threads the recorder refused or failed on.
    pub threads_failed: usize,
    /// Events handed to the recorder.
    pub events_replayed: usize,
}

/// Replays every thread of `trace` concurrently through `recorder`.
///
/// A thread that cannot be registered (for instance because the registry is
/// full) is skipped; its failure is logged and counted.
pub fn run(recorder: &Recorder, trace: &Trace) -> ReplayReport {
    log::info!(
        "Replaying {} events from {} threads",
        trace.event_count(),
        trace.threads.len()
    );

    let results: Vec<Result<usize, RecorderError>> = thread::scope(|scope| {
        let workers: Vec<_> = trace
            .threads
            .iter()
            .map(|thread_trace| scope.spawn(move || replay_thread(recorder, thread_trace)))
            .collect();
        workers
            .into_iter()
            .map(|worker| {
                worker
                    .join()
                    .unwrap_or_else(|panic| std::panic::resume_unwind(panic))
            })
            .collect()
    });

    let mut report = ReplayReport::default();
    for (thread_trace, result) in trace.threads.iter().zip(results) {
        match result {
            Ok(events) => {
                report.threads_recorded += 1;
                report.events_replayed += events;
            }
            Err(e) => {
                report.threads_failed += 1;
                log::warn!(
                    "Thread {} ({}) was not fully recorded: {e}",
                    thread_trace.thread_id,
                    thread_trace.slot
                );
            }
        }
    }
    report
}

fn replay_thread(recorder: &Recorder, thread_trace: &ThreadTrace) -> Result<usize, RecorderError> {
    let mut context = recorder.on_thread_start(thread_trace.slot, thread_trace.thread_id)?;
    for event in &thread_trace.events {
        recorder.record(&mut context, *event)?;
    }
    recorder.on_thread_exit(context)?;
    Ok(thread_trace.events.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use memtrace_core::{LogTarget, RawEvent, RecorderConfig, SlotId};

    const TRACE: &str = r#"
{"thread": 10, "slot": 7, "address": 4096, "size": 4, "kind": "write"}
{"thread": 10, "address": 8192, "size": 8, "kind": "read"}
{"thread": 11, "address": 48, "size": 4, "kind": "write"}
{"thread": 12, "address": 64, "size": 4, "kind": "read"}
"#;

    fn recorder_in(dir: &std::path::Path, max_threads: usize) -> Recorder {
        Recorder::from_config(RecorderConfig {
            max_threads,
            log: LogTarget::PerThread {
                directory: dir.to_path_buf(),
                prefix: "replay".into(),
            },
            ..RecorderConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_replay_writes_one_log_per_thread() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = recorder_in(dir.path(), 8);
        let trace = Trace::read(TRACE.as_bytes()).unwrap();

        let report = run(&recorder, &trace);

        assert_eq!(report.threads_recorded, 3);
        assert_eq!(report.events_replayed, 4);
        let log = std::fs::read_to_string(dir.path().join("replay.10.7.log")).unwrap();
        assert!(log.starts_with("1000: 4, w\n2000: 8, r\n# exit 10: 2 refs, 1 writes, 1 reads\n"));
        assert_eq!(recorder.shutdown().threads_unregistered, 3);
    }

    #[test]
    fn test_threads_beyond_capacity_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = recorder_in(dir.path(), 1);
        let live = recorder.on_thread_start(SlotId(5), 5).unwrap();
        let trace = Trace {
            threads: vec![ThreadTrace {
                slot: SlotId(0),
                thread_id: 1,
                events: vec![RawEvent::write(0x10, 4)],
            }],
        };

        let report = run(&recorder, &trace);

        assert_eq!(report.threads_failed, 1);
        assert_eq!(report.threads_recorded, 0);
        assert_eq!(report.events_replayed, 0);
        recorder.on_thread_exit(live).unwrap();
    }
}
