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

//! Errors surfaced to the instrumentation engine.

use memtrace_core::{ConfigError, DrainError, RegistryError};
use thiserror::Error;

/// Everything that can go wrong in a recorder callback.
#[derive(Debug, Error)]
pub enum RecorderError {
    /// Registering or unregistering a thread failed.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Draining a raw buffer failed.
    #[error(transparent)]
    Drain(#[from] DrainError),

    /// The configuration was rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The configured log destination could not be prepared.
    #[error("failed to prepare access log destination: {0}")]
    LogSetup(#[source] std::io::Error),

    /// A recorder is already installed for this process.
    #[error("a recorder is already installed")]
    AlreadyInstalled,
}
