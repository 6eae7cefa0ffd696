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

//! Folds access logs into one [`LogSummary`].

use anyhow::{Context, Result};
use memtrace_core::log_format::LogSummary;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;

/// Reads every log in `paths` into a single summary.
pub fn summarize(paths: &[PathBuf]) -> Result<LogSummary> {
    let mut summary = LogSummary::new();
    for path in paths {
        let file =
            File::open(path).with_context(|| format!("failed to open log {}", path.display()))?;
        summary
            .read_from(BufReader::new(file))
            .with_context(|| format!("failed to parse log {}", path.display()))?;
        log::debug!("Summarized {}", path.display());
    }
    Ok(summary)
}
