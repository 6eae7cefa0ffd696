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

//! Append-only log destinations for thread records.
//!
//! A [`LogFactory`] opens one writer per registered thread. The recorder only
//! ever appends whole lines and flushes at the end of every drain, so each
//! implementation may buffer freely between flushes.

use memtrace_core::{LogTarget, SlotId, ThreadId};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// The writer a thread record appends its log lines to.
pub type LogWriter = Box<dyn Write + Send>;

/// Opens the log destination of a newly registered thread.
pub trait LogFactory: Send + Sync + Debug {
    /// Opens an append-only writer for the thread occupying `slot`.
    fn open(&self, slot: SlotId, thread_id: ThreadId) -> io::Result<LogWriter>;
}

/// Builds the factory described by a configured [`LogTarget`].
pub fn factory_for(target: &LogTarget) -> io::Result<Arc<dyn LogFactory>> {
    match target {
        LogTarget::PerThread { directory, prefix } => {
            Ok(Arc::new(FileLogFactory::new(directory, prefix.clone())?))
        }
        LogTarget::PerProcess { path } => Ok(Arc::new(SharedFileLogFactory::create(path)?)),
    }
}

// --- One file per thread ---

/// Creates `<directory>/<prefix>.<thread>.<slot>.log` for every thread.
#[derive(Debug, Clone)]
pub struct FileLogFactory {
    directory: PathBuf,
    prefix: String,
}

impl FileLogFactory {
    /// Creates the factory, making sure `directory` exists.
    pub fn new(directory: impl AsRef<Path>, prefix: impl Into<String>) -> io::Result<Self> {
        let directory = directory.as_ref().to_path_buf();
        std::fs::create_dir_all(&directory)?;
        Ok(Self {
            directory,
            prefix: prefix.into(),
        })
    }

    /// The path of the log file for a given thread and slot.
    pub fn path_for(&self, slot: SlotId, thread_id: ThreadId) -> PathBuf {
        self.directory
            .join(format!("{}.{}.{}.log", self.prefix, thread_id, slot.0))
    }
}

impl LogFactory for FileLogFactory {
    fn open(&self, slot: SlotId, thread_id: ThreadId) -> io::Result<LogWriter> {
        let path = self.path_for(slot, thread_id);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        log::debug!("Opened access log {} for {}", path.display(), slot);
        Ok(Box::new(BufWriter::new(file)))
    }
}

// --- One file per process ---

/// Shares a single log file between every thread of the process.
///
/// Each thread buffers its lines privately and appends them to the shared file
/// under a lock on flush, so lines of different threads never interleave.
#[derive(Debug, Clone)]
pub struct SharedFileLogFactory {
    file: Arc<Mutex<File>>,
}

impl SharedFileLogFactory {
    /// Opens (or creates) the shared log file in append mode.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        log::info!("Access log shared by all threads: {}", path.display());
        Ok(Self {
            file: Arc::new(Mutex::new(file)),
        })
    }
}

impl LogFactory for SharedFileLogFactory {
    fn open(&self, _slot: SlotId, _thread_id: ThreadId) -> io::Result<LogWriter> {
        Ok(Box::new(SharedLogWriter {
            pending: Vec::new(),
            file: Arc::clone(&self.file),
        }))
    }
}

struct SharedLogWriter {
    pending: Vec<u8>,
    file: Arc<Mutex<File>>,
}

impl Write for SharedLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let mut file = self
            .file
            .lock()
            .map_err(|_| io::Error::other("shared access log lock poisoned"))?;
        file.write_all(&self.pending)?;
        file.flush()?;
        self.pending.clear();
        Ok(())
    }
}

impl Drop for SharedLogWriter {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            log::warn!("Failed to flush shared access log on close: {e}");
        }
    }
}

// --- In memory ---

/// Keeps every thread's log in memory, keyed by slot.
///
/// Useful when embedding the recorder somewhere that has no writable
/// filesystem, and for inspecting logs in tests. A slot that is registered
/// again appends to its previous buffer.
#[derive(Debug, Clone, Default)]
pub struct MemoryLogFactory {
    logs: Arc<Mutex<BTreeMap<SlotId, Arc<Mutex<Vec<u8>>>>>>,
}

impl MemoryLogFactory {
    /// Creates an empty in-memory log store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The full text logged for `slot`, if it was ever opened.
    pub fn contents(&self, slot: SlotId) -> Option<String> {
        let logs = self.logs.lock().unwrap_or_else(PoisonError::into_inner);
        let buffer = logs.get(&slot)?;
        let bytes = buffer.lock().unwrap_or_else(PoisonError::into_inner);
        Some(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// The logged lines for `slot`, empty if it was never opened.
    pub fn lines(&self, slot: SlotId) -> Vec<String> {
        self.contents(slot)
            .map(|text| text.lines().map(str::to_owned).collect())
            .unwrap_or_default()
    }
}

impl LogFactory for MemoryLogFactory {
    fn open(&self, slot: SlotId, _thread_id: ThreadId) -> io::Result<LogWriter> {
        let mut logs = self.logs.lock().unwrap_or_else(PoisonError::into_inner);
        let buffer = Arc::clone(logs.entry(slot).or_default());
        Ok(Box::new(MemoryLogWriter { buffer }))
    }
}

struct MemoryLogWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl Write for MemoryLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_per_thread_files_are_named_by_thread_and_slot() {
        let dir = tempfile::tempdir().unwrap();
        let factory = FileLogFactory::new(dir.path().join("logs"), "trace").unwrap();

        let mut writer = factory.open(SlotId(3), 77).unwrap();
        writeln!(writer, "1000: 4, w").unwrap();
        writer.flush().unwrap();

        let path = dir.path().join("logs").join("trace.77.3.log");
        assert_eq!(factory.path_for(SlotId(3), 77), path);
        assert_eq!(std::fs::read_to_string(path).unwrap(), "1000: 4, w\n");
    }

    #[test]
    fn test_shared_file_keeps_each_flush_contiguous() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("process.log");
        let factory = SharedFileLogFactory::create(&path).unwrap();

        let mut first = factory.open(SlotId(1), 1).unwrap();
        let mut second = factory.open(SlotId(2), 2).unwrap();
        write!(first, "10: 1, ").unwrap();
        writeln!(second, "20: 2, r").unwrap();
        writeln!(first, "w").unwrap();
        second.flush().unwrap();
        first.flush().unwrap();

        let mut text = String::new();
        File::open(&path).unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "20: 2, r\n10: 1, w\n");
    }

    #[test]
    fn test_shared_writer_flushes_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("process.log");
        let factory = SharedFileLogFactory::create(&path).unwrap();

        {
            let mut writer = factory.open(SlotId(1), 1).unwrap();
            writeln!(writer, "30: 8, r").unwrap();
        }

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "30: 8, r\n");
    }

    #[test]
    fn test_memory_logs_reopen_appends() {
        let factory = MemoryLogFactory::new();
        writeln!(factory.open(SlotId(5), 1).unwrap(), "a: 1, r").unwrap();
        writeln!(factory.open(SlotId(5), 2).unwrap(), "b: 1, w").unwrap();

        assert_eq!(factory.lines(SlotId(5)), vec!["a: 1, r", "b: 1, w"]);
        assert!(factory.contents(SlotId(6)).is_none());
    }

    #[test]
    fn test_factory_for_per_thread_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = LogTarget::PerThread {
            directory: dir.path().to_path_buf(),
            prefix: "memtrace".into(),
        };
        let factory = factory_for(&target).unwrap();
        let mut writer = factory.open(SlotId(0), 9).unwrap();
        writer.flush().unwrap();

        assert!(dir.path().join("memtrace.9.0.log").exists());
    }
}
