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

//! The recorder installed for the whole process.
//!
//! Engine callbacks carry no user data, so the hooks reach the recorder through
//! this one global. It is set once and lives until the process exits.

use crate::error::RecorderError;
use crate::recorder::Recorder;
use std::sync::OnceLock;

static RECORDER: OnceLock<Recorder> = OnceLock::new();

/// Installs `recorder` as the process-wide recorder.
///
/// Fails with [`RecorderError::AlreadyInstalled`] if one is already installed;
/// the rejected recorder is dropped.
pub fn install(recorder: Recorder) -> Result<&'static Recorder, RecorderError> {
    let mut installed_now = false;
    let global = RECORDER.get_or_init(|| {
        installed_now = true;
        recorder
    });
    if installed_now {
        log::info!("Recorder installed");
        Ok(global)
    } else {
        Err(RecorderError::AlreadyInstalled)
    }
}

/// The process-wide recorder, if one has been installed.
pub fn installed() -> Option<&'static Recorder> {
    RECORDER.get()
}
