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

//! JSON-lines traces of raw events, grouped per thread.
//!
//! One record per line:
//!
//! ```text
//! {"thread": 1, "address": 4096, "size": 4, "kind": "write"}
//! {"thread": 1, "slot": 7, "address": 8192, "size": 8, "kind": "read"}
//! {"thread": 2, "address": 16394, "size": 2, "kind": {"opcode": 31}}
//! ```
//!
//! A thread's slot defaults to the order in which the thread first appears.

use anyhow::{bail, Context, Result};
use memtrace_core::{Address, RawEvent, RawKind, SlotId, ThreadId};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct TraceRecord {
    thread: ThreadId,
    #[serde(default)]
    slot: Option<u64>,
    address: Address,
    size: u32,
    kind: RawKind,
}

/// The events of one traced thread, in capture order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadTrace {
    /// The slot the thread is registered under.
    pub slot: SlotId,
    /// The thread id.
    pub thread_id: ThreadId,
    /// Its raw events.
    pub events: Vec<RawEvent>,
}

/// A parsed trace: every thread in order of first appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Trace {
    /// Per-thread event streams.
    pub threads: Vec<ThreadTrace>,
}

impl Trace {
    /// Reads a trace file.
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("failed to open trace {}", path.display()))?;
        Self::read(std::io::BufReader::new(file))
            .with_context(|| format!("failed to read trace {}", path.display()))
    }

    /// Parses a trace from any line-oriented reader. Blank lines are skipped.
    pub fn read(reader: impl BufRead) -> Result<Self> {
        let mut threads: Vec<ThreadTrace> = Vec::new();
        let mut index_of: BTreeMap<ThreadId, usize> = BTreeMap::new();

        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: TraceRecord = serde_json::from_str(&line)
                .with_context(|| format!("line {}: invalid trace record", number + 1))?;

            let index = match index_of.get(&record.thread) {
                Some(&index) => {
                    if let Some(slot) = record.slot {
                        if threads[index].slot != SlotId(slot) {
                            bail!(
                                "line {}: thread {} moved from {} to slot#{}",
                                number + 1,
                                record.thread,
                                threads[index].slot,
                                slot
                            );
                        }
                    }
                    index
                }
                None => {
                    let slot = SlotId(record.slot.unwrap_or(threads.len() as u64));
                    threads.push(ThreadTrace {
                        slot,
                        thread_id: record.thread,
                        events: Vec::new(),
                    });
                    index_of.insert(record.thread, threads.len() - 1);
                    threads.len() - 1
                }
            };
            threads[index]
                .events
                .push(RawEvent::new(record.address, record.size, record.kind));
        }

        Ok(Self { threads })
    }

    /// Total number of events across threads.
    pub fn event_count(&self) -> usize {
        self.threads.iter().map(|thread| thread.events.len()).sum()
    }
}
