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

//! Recorder configuration.
//!
//! Every field has a default, so a configuration file only needs to name the
//! values it wants to change.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default upper bound on simultaneously registered threads.
pub const DEFAULT_MAX_THREADS: usize = 100;
/// Default number of entries each event set starts with.
pub const DEFAULT_INITIAL_SET_CAPACITY: usize = 100;
/// Default number of entries added to a full event set.
pub const DEFAULT_GROWTH_INCREMENT: usize = 100;
/// Default number of raw events the engine batches before a drain.
pub const DEFAULT_RAW_BUFFER_CAPACITY: usize = 4096;
/// Default file name prefix of per-thread logs.
pub const DEFAULT_LOG_PREFIX: &str = "memtrace";

/// What the recorder does when an event set cannot grow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationPolicy {
    /// Terminate the instrumented run with a diagnostic.
    #[default]
    Abort,
    /// Keep logging every event but stop storing the ones that no longer fit.
    LogOnly,
}

/// Where the per-thread access logs are written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum LogTarget {
    /// One file per thread, named `<prefix>.<thread>.<slot>.log` inside `directory`.
    PerThread {
        /// Directory the log files are created in.
        directory: PathBuf,
        /// File name prefix.
        prefix: String,
    },
    /// A single file shared by every thread of the process.
    PerProcess {
        /// Path of the shared log file.
        path: PathBuf,
    },
}

impl Default for LogTarget {
    fn default() -> Self {
        LogTarget::PerThread {
            directory: PathBuf::from("."),
            prefix: DEFAULT_LOG_PREFIX.to_string(),
        }
    }
}

/// How an event set sizes its storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrowthPolicy {
    /// Entries allocated when the set is created.
    pub initial_capacity: usize,
    /// Entries added each time the set is full.
    pub increment: usize,
    /// Optional hard limit on the set's capacity.
    pub ceiling: Option<usize>,
}

impl Default for GrowthPolicy {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_INITIAL_SET_CAPACITY,
            increment: DEFAULT_GROWTH_INCREMENT,
            ceiling: None,
        }
    }
}

/// Top-level configuration of the access recorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    /// Maximum number of threads that can be registered at once.
    pub max_threads: usize,
    /// Initial capacity of every event set.
    pub initial_set_capacity: usize,
    /// Arithmetic growth step of every event set.
    pub growth_increment: usize,
    /// Optional per-set capacity ceiling.
    pub max_set_capacity: Option<usize>,
    /// Number of raw events buffered per thread between drains.
    pub raw_buffer_capacity: usize,
    /// Reaction to a failed set growth.
    pub allocation_policy: AllocationPolicy,
    /// Also dump the read set into the exit summary.
    pub flush_reads_on_exit: bool,
    /// Log destination layout.
    pub log: LogTarget,
    /// Symbolic names for opcode-only raw events.
    pub opcode_names: BTreeMap<u16, String>,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            max_threads: DEFAULT_MAX_THREADS,
            initial_set_capacity: DEFAULT_INITIAL_SET_CAPACITY,
            growth_increment: DEFAULT_GROWTH_INCREMENT,
            max_set_capacity: None,
            raw_buffer_capacity: DEFAULT_RAW_BUFFER_CAPACITY,
            allocation_policy: AllocationPolicy::default(),
            flush_reads_on_exit: false,
            log: LogTarget::default(),
            opcode_names: BTreeMap::new(),
        }
    }
}

impl RecorderConfig {
    /// Parses and validates a configuration from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&contents)?;
        log::info!("Loaded recorder configuration from {}", path.display());
        Ok(config)
    }

    /// Checks the invariants the registry and the event sets rely on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_threads == 0 {
            return Err(ConfigError::Invalid("max_threads must be at least 1".into()));
        }
        if self.growth_increment == 0 {
            return Err(ConfigError::Invalid(
                "growth_increment must be at least 1".into(),
            ));
        }
        if self.raw_buffer_capacity == 0 {
            return Err(ConfigError::Invalid(
                "raw_buffer_capacity must be at least 1".into(),
            ));
        }
        if let Some(ceiling) = self.max_set_capacity {
            if ceiling < self.initial_set_capacity {
                return Err(ConfigError::Invalid(format!(
                    "max_set_capacity ({ceiling}) is below initial_set_capacity ({})",
                    self.initial_set_capacity
                )));
            }
        }
        Ok(())
    }

    /// The growth policy every event set of a thread record is created with.
    pub fn growth_policy(&self) -> GrowthPolicy {
        GrowthPolicy {
            initial_capacity: self.initial_set_capacity,
            increment: self.growth_increment,
            ceiling: self.max_set_capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reference_sizes() {
        let config = RecorderConfig::default();
        assert_eq!(config.max_threads, 100);
        assert_eq!(config.initial_set_capacity, 100);
        assert_eq!(config.growth_increment, 100);
        assert_eq!(config.allocation_policy, AllocationPolicy::Abort);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = RecorderConfig::from_json_str(
            r#"{
                "max_threads": 8,
                "allocation_policy": "log_only",
                "log": { "mode": "per_process", "path": "/tmp/trace.log" },
                "opcode_names": { "87": "lock xchg" }
            }"#,
        )
        .unwrap();

        assert_eq!(config.max_threads, 8);
        assert_eq!(config.growth_increment, DEFAULT_GROWTH_INCREMENT);
        assert_eq!(config.allocation_policy, AllocationPolicy::LogOnly);
        assert_eq!(
            config.log,
            LogTarget::PerProcess {
                path: PathBuf::from("/tmp/trace.log")
            }
        );
        assert_eq!(config.opcode_names.get(&87).map(String::as_str), Some("lock xchg"));
    }

    #[test]
    fn test_validation_rejects_zero_increment() {
        let result = RecorderConfig::from_json_str(r#"{ "growth_increment": 0 }"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validation_rejects_ceiling_below_initial_capacity() {
        let config = RecorderConfig {
            max_set_capacity: Some(50),
            ..RecorderConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_growth_policy_mirrors_config() {
        let config = RecorderConfig {
            initial_set_capacity: 10,
            growth_increment: 5,
            max_set_capacity: Some(40),
            ..RecorderConfig::default()
        };
        assert_eq!(
            config.growth_policy(),
            GrowthPolicy {
                initial_capacity: 10,
                increment: 5,
                ceiling: Some(40),
            }
        );
    }
}
