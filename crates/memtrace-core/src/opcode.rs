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

//! Symbolic names for opcode-only raw events.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt::Debug;

/// Resolves an engine opcode to the name written in the access log.
///
/// The instrumentation engine owns the real decoder; the recorder only needs a
/// stable textual name per opcode.
pub trait OpcodeNames: Send + Sync + Debug {
    /// Returns the symbolic name of `opcode`.
    fn name(&self, opcode: u16) -> Cow<'_, str>;
}

/// A table-driven [`OpcodeNames`] with a numeric fallback (`op<N>`).
#[derive(Debug, Clone, Default)]
pub struct OpcodeTable {
    names: BTreeMap<u16, String>,
}

impl OpcodeTable {
    /// Creates an empty table; every opcode resolves to its numeric fallback.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table from an opcode-to-name mapping.
    pub fn from_map(names: BTreeMap<u16, String>) -> Self {
        Self { names }
    }

    /// Adds or replaces the name of an opcode.
    pub fn insert(&mut self, opcode: u16, name: impl Into<String>) {
        self.names.insert(opcode, name.into());
    }
}

impl OpcodeNames for OpcodeTable {
    fn name(&self, opcode: u16) -> Cow<'_, str> {
        match self.names.get(&opcode) {
            Some(name) => Cow::Borrowed(name.as_str()),
            None => Cow::Owned(format!("op{opcode}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_and_unknown_opcodes() {
        let mut table = OpcodeTable::new();
        table.insert(87, "xchg");

        assert_eq!(table.name(87), "xchg");
        assert_eq!(table.name(12), "op12");
    }
}
