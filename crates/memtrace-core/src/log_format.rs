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

//! The textual access log.
//!
//! Offline analysis tools consume this format, so it must stay stable. A log is a
//! sequence of lines of three shapes:
//!
//! ```text
//! 1000: 4, w                              access line, one per drained raw event
//! # exit 12: 2 refs, 1 writes, 1 reads    exit header, written on unregister
//! #w 1000: 4                              retained set entry, follows the header
//! ```
//!
//! Addresses are lowercase hexadecimal without a `0x` prefix or leading zeros.

use crate::event::{AccessDirection, Address, ThreadId};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt::{self, Display};
use std::io::BufRead;
use thiserror::Error;

const EXIT_PREFIX: &str = "# exit ";

/// One access line: `<address>: <size>, <marker>`.
#[derive(Debug, Clone, Copy)]
pub struct AccessLine<'a> {
    /// The accessed address.
    pub address: Address,
    /// The access width in bytes.
    pub size: u32,
    /// `r`, `w`, `lock`, `unlock` or an opcode name.
    pub marker: &'a str,
}

impl Display for AccessLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}: {}, {}", self.address, self.size, self.marker)
    }
}

/// The header line opening a thread's exit summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExitHeader {
    /// The exiting thread.
    pub thread_id: ThreadId,
    /// Raw events drained for the thread over its lifetime.
    pub processed: u64,
    /// Entries in the write set.
    pub writes: usize,
    /// Entries in the read set.
    pub reads: usize,
}

impl Display for ExitHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{EXIT_PREFIX}{}: {} refs, {} writes, {} reads",
            self.thread_id, self.processed, self.writes, self.reads
        )
    }
}

/// A set entry dumped into the exit summary: `#w <address>: <size>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetainedLine {
    /// Which set the entry came from.
    pub direction: AccessDirection,
    /// The accessed address.
    pub address: Address,
    /// The access width in bytes.
    pub size: u32,
}

impl Display for RetainedLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {:x}: {}",
            self.direction.marker(),
            self.address,
            self.size
        )
    }
}

/// The marker of a parsed access line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Marker {
    /// `r`
    Read,
    /// `w`
    Write,
    /// `lock`
    Lock,
    /// `unlock`
    Unlock,
    /// Any other marker is an opcode name.
    Opcode(String),
}

impl Marker {
    fn parse(text: &str) -> Self {
        match text {
            "r" => Marker::Read,
            "w" => Marker::Write,
            "lock" => Marker::Lock,
            "unlock" => Marker::Unlock,
            other => Marker::Opcode(other.to_string()),
        }
    }
}

/// A parsed log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogEntry {
    /// A drained raw event.
    Access {
        /// The accessed address.
        address: Address,
        /// The access width in bytes.
        size: u32,
        /// What kind of event it was.
        marker: Marker,
    },
    /// The opening line of an exit summary.
    Exit(ExitHeader),
    /// A set entry listed in an exit summary.
    Retained(RetainedLine),
}

/// Reasons a log line could not be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LogParseError {
    /// The line does not have any of the known shapes.
    #[error("malformed log line: {0:?}")]
    Malformed(String),

    /// The address is not valid hexadecimal.
    #[error("invalid address {0:?}")]
    Address(String),

    /// A numeric field is not a valid decimal number.
    #[error("invalid number {0:?}")]
    Number(String),

    /// A line inside a file failed to parse.
    #[error("line {line}: {source}")]
    AtLine {
        /// 1-based line number.
        line: usize,
        /// What was wrong with it.
        source: Box<LogParseError>,
    },

    /// The log could not be read.
    #[error("failed to read log: {0}")]
    Io(String),
}

fn parse_address(text: &str) -> Result<Address, LogParseError> {
    Address::from_str_radix(text, 16).map_err(|_| LogParseError::Address(text.to_string()))
}

fn parse_number<T: std::str::FromStr>(text: &str) -> Result<T, LogParseError> {
    text.trim()
        .parse()
        .map_err(|_| LogParseError::Number(text.to_string()))
}

fn count_field<'a>(
    field: Option<&'a str>,
    suffix: &str,
    line: &str,
) -> Result<&'a str, LogParseError> {
    field
        .and_then(|field| field.strip_suffix(suffix))
        .ok_or_else(|| LogParseError::Malformed(line.to_string()))
}

/// Parses one line of an access log (without its trailing newline).
pub fn parse_line(line: &str) -> Result<LogEntry, LogParseError> {
    let malformed = || LogParseError::Malformed(line.to_string());

    if let Some(rest) = line.strip_prefix(EXIT_PREFIX) {
        let (thread, counts) = rest.split_once(": ").ok_or_else(malformed)?;
        let mut fields = counts.split(", ");
        let processed = parse_number(count_field(fields.next(), " refs", line)?)?;
        let writes = parse_number(count_field(fields.next(), " writes", line)?)?;
        let reads = parse_number(count_field(fields.next(), " reads", line)?)?;
        return Ok(LogEntry::Exit(ExitHeader {
            thread_id: parse_number(thread)?,
            processed,
            writes,
            reads,
        }));
    }

    if let Some(rest) = line.strip_prefix('#') {
        let (tag, body) = rest.split_once(' ').ok_or_else(malformed)?;
        let direction = match tag {
            "w" => AccessDirection::Write,
            "r" => AccessDirection::Read,
            _ => return Err(malformed()),
        };
        let (address, size) = body.split_once(": ").ok_or_else(malformed)?;
        return Ok(LogEntry::Retained(RetainedLine {
            direction,
            address: parse_address(address)?,
            size: parse_number(size)?,
        }));
    }

    let (address, rest) = line.split_once(": ").ok_or_else(malformed)?;
    let (size, marker) = rest.split_once(", ").ok_or_else(malformed)?;
    if marker.is_empty() {
        return Err(malformed());
    }
    Ok(LogEntry::Access {
        address: parse_address(address)?,
        size: parse_number(size)?,
        marker: Marker::parse(marker),
    })
}

/// Aggregate view of one or more access logs.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LogSummary {
    /// Access lines seen.
    pub accesses: u64,
    /// Access lines marked `r`.
    pub reads: u64,
    /// Access lines marked `w`.
    pub writes: u64,
    /// Access lines marked `lock`.
    pub lock_acquires: u64,
    /// Access lines marked `unlock`.
    pub lock_releases: u64,
    /// Access lines per opcode name.
    pub opcodes: BTreeMap<String, u64>,
    /// Number of distinct addresses touched by access lines.
    pub distinct_addresses: usize,
    /// Exit summaries, in the order they appear.
    pub exits: Vec<ExitHeader>,
    /// Set entries listed in exit summaries.
    pub retained_entries: u64,
    #[serde(skip)]
    addresses: HashSet<Address>,
}

impl LogSummary {
    /// Creates an empty summary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds a parsed entry into the summary.
    pub fn record(&mut self, entry: &LogEntry) {
        match entry {
            LogEntry::Access {
                address, marker, ..
            } => {
                self.accesses += 1;
                match marker {
                    Marker::Read => self.reads += 1,
                    Marker::Write => self.writes += 1,
                    Marker::Lock => self.lock_acquires += 1,
                    Marker::Unlock => self.lock_releases += 1,
                    Marker::Opcode(name) => *self.opcodes.entry(name.clone()).or_insert(0) += 1,
                }
                if self.addresses.insert(*address) {
                    self.distinct_addresses = self.addresses.len();
                }
            }
            LogEntry::Exit(header) => self.exits.push(*header),
            LogEntry::Retained(_) => self.retained_entries += 1,
        }
    }

    /// Parses every line of `reader` into the summary. Blank lines are skipped.
    pub fn read_from(&mut self, reader: impl BufRead) -> Result<(), LogParseError> {
        for (index, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| LogParseError::Io(e.to_string()))?;
            if line.trim().is_empty() {
                continue;
            }
            let entry = parse_line(&line).map_err(|source| LogParseError::AtLine {
                line: index + 1,
                source: Box::new(source),
            })?;
            self.record(&entry);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_line_has_no_leading_zeros() {
        let line = AccessLine {
            address: 0x1000,
            size: 4,
            marker: "w",
        };
        assert_eq!(line.to_string(), "1000: 4, w");

        let line = AccessLine {
            address: 0x7ffd_0000_00a8,
            size: 8,
            marker: "r",
        };
        assert_eq!(line.to_string(), "7ffd000000a8: 8, r");
    }

    #[test]
    fn test_parse_access_lines() {
        assert_eq!(
            parse_line("2000: 8, r").unwrap(),
            LogEntry::Access {
                address: 0x2000,
                size: 8,
                marker: Marker::Read,
            }
        );
        assert_eq!(
            parse_line("40: 0, lock xchg").unwrap(),
            LogEntry::Access {
                address: 0x40,
                size: 0,
                marker: Marker::Opcode("lock xchg".to_string()),
            }
        );
    }

    #[test]
    fn test_exit_summary_lines_parse_back() {
        let header = ExitHeader {
            thread_id: 12,
            processed: 2,
            writes: 1,
            reads: 1,
        };
        assert_eq!(header.to_string(), "# exit 12: 2 refs, 1 writes, 1 reads");
        assert_eq!(
            parse_line(&header.to_string()).unwrap(),
            LogEntry::Exit(header)
        );

        let retained = RetainedLine {
            direction: AccessDirection::Write,
            address: 0xdead,
            size: 2,
        };
        assert_eq!(retained.to_string(), "#w dead: 2");
        assert_eq!(
            parse_line("#w dead: 2").unwrap(),
            LogEntry::Retained(retained)
        );
    }

    #[test]
    fn test_malformed_lines_are_rejected() {
        assert!(matches!(
            parse_line("hello"),
            Err(LogParseError::Malformed(_))
        ));
        assert!(matches!(
            parse_line("zz: 4, w"),
            Err(LogParseError::Address(_))
        ));
        assert!(matches!(
            parse_line("10: four, w"),
            Err(LogParseError::Number(_))
        ));
        assert!(parse_line("#x 10: 4").is_err());
    }

    #[test]
    fn test_summary_counts_markers() {
        let log = "1000: 4, w\n2000: 8, r\n1000: 4, r\n\n30: 0, op7\n# exit 1: 4 refs, 1 writes, 2 reads\n#w 1000: 4\n";
        let mut summary = LogSummary::new();
        summary.read_from(log.as_bytes()).unwrap();

        assert_eq!(summary.accesses, 4);
        assert_eq!(summary.writes, 1);
        assert_eq!(summary.reads, 2);
        assert_eq!(summary.opcodes.get("op7"), Some(&1));
        assert_eq!(summary.distinct_addresses, 3);
        assert_eq!(summary.exits.len(), 1);
        assert_eq!(summary.retained_entries, 1);
    }

    #[test]
    fn test_summary_reports_line_number() {
        let mut summary = LogSummary::new();
        let err = summary.read_from("1000: 4, w\nbogus\n".as_bytes()).unwrap_err();
        assert!(matches!(err, LogParseError::AtLine { line: 2, .. }));
    }
}
