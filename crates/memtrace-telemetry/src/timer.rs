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

//! RAII timer for drain durations. (RAII = Resource Acquisition Is Initialization)

use crate::stats::RecorderStats;
use std::time::Instant;

/// Times the enclosing scope and records the duration into [`RecorderStats`]
/// when dropped.
///
/// The measurement is recorded on every exit path, including early returns
/// with an error.
pub struct ScopedDrainTimer<'a> {
    start: Instant,
    stats: &'a RecorderStats,
}

impl<'a> ScopedDrainTimer<'a> {
    /// Starts timing immediately.
    pub fn new(stats: &'a RecorderStats) -> Self {
        Self {
            start: Instant::now(),
            stats,
        }
    }
}

impl Drop for ScopedDrainTimer<'_> {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        log::trace!("[ScopedDrainTimer] drain took {:?}", elapsed);
        self.stats.record_drain_time(elapsed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_timer_records_on_drop() {
        let stats = RecorderStats::new();
        {
            let _timer = ScopedDrainTimer::new(&stats);
            std::thread::sleep(Duration::from_millis(2));
        }
        assert!(stats.snapshot().max_drain_micros >= 2_000.0);
    }
}
