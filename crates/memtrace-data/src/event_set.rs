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

//! An append-only event buffer with arithmetic growth.

use memtrace_core::{AllocationFailure, GrowthPolicy, SetKind};

/// An append-only, thread-owned dynamic array of events.
///
/// The set tracks its own logical `capacity`, which starts at the policy's
/// initial capacity and grows by exactly `increment` each time an append finds
/// the set full. Storage is reserved fallibly, so a failed growth reports an
/// [`AllocationFailure`] and leaves every stored element untouched.
///
/// There is no removal: elements live as long as the owning thread record.
#[derive(Debug)]
pub struct GrowableEventSet<T> {
    kind: SetKind,
    policy: GrowthPolicy,
    items: Vec<T>,
    capacity: usize,
    growths: u64,
}

impl<T> GrowableEventSet<T> {
    /// Creates an empty set with the policy's initial capacity reserved.
    pub fn with_policy(kind: SetKind, policy: GrowthPolicy) -> Result<Self, AllocationFailure> {
        let failure = AllocationFailure {
            set: kind,
            requested_capacity: policy.initial_capacity,
        };
        if policy.ceiling.is_some_and(|ceiling| policy.initial_capacity > ceiling) {
            return Err(failure);
        }

        let mut items = Vec::new();
        items
            .try_reserve_exact(policy.initial_capacity)
            .map_err(|_| failure)?;

        Ok(Self {
            kind,
            policy,
            items,
            capacity: policy.initial_capacity,
            growths: 0,
        })
    }

    /// Appends `event`, growing the set by one increment first if it is full.
    pub fn append(&mut self, event: T) -> Result<(), AllocationFailure> {
        if self.items.len() == self.capacity {
            self.grow()?;
        }
        // Storage for `capacity` entries is already reserved, so this never reallocates.
        self.items.push(event);
        Ok(())
    }

    fn grow(&mut self) -> Result<(), AllocationFailure> {
        let requested_capacity = self.capacity.saturating_add(self.policy.increment);
        let failure = AllocationFailure {
            set: self.kind,
            requested_capacity,
        };

        if requested_capacity == self.capacity {
            return Err(failure);
        }
        if self
            .policy
            .ceiling
            .is_some_and(|ceiling| requested_capacity > ceiling)
        {
            return Err(failure);
        }
        self.items
            .try_reserve_exact(requested_capacity - self.items.len())
            .map_err(|_| failure)?;

        self.capacity = requested_capacity;
        self.growths += 1;
        log::debug!(
            "{} set grown to {} entries (growth #{})",
            self.kind,
            self.capacity,
            self.growths
        );
        Ok(())
    }

    /// Iterates over every stored element in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Number of stored elements.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if nothing has been appended yet.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The logical capacity of the set.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// How many times the set has grown since it was created.
    pub fn growth_count(&self) -> u64 {
        self.growths
    }

    /// Which of the thread's sets this is.
    pub fn kind(&self) -> SetKind {
        self.kind
    }
}

impl<'a, T> IntoIterator for &'a GrowableEventSet<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(initial_capacity: usize, increment: usize, ceiling: Option<usize>) -> GrowthPolicy {
        GrowthPolicy {
            initial_capacity,
            increment,
            ceiling,
        }
    }

    #[test]
    fn test_iter_yields_appended_elements_in_order() {
        let mut set = GrowableEventSet::with_policy(SetKind::Reads, policy(4, 3, None)).unwrap();
        assert_eq!(set.iter().count(), 0);

        for value in 0..20u32 {
            set.append(value).unwrap();
        }

        assert_eq!(set.len(), 20);
        assert!(set.iter().copied().eq(0..20));
        // Restartable: a second pass sees the same elements.
        assert_eq!(set.iter().sum::<u32>(), (0..20u32).sum::<u32>());
    }

    #[test]
    fn test_101_appends_grow_exactly_once() {
        let mut set = GrowableEventSet::with_policy(SetKind::Writes, GrowthPolicy::default()).unwrap();
        assert_eq!(set.capacity(), 100);

        for value in 0..101u64 {
            set.append(value).unwrap();
        }

        assert_eq!(set.growth_count(), 1);
        assert_eq!(set.capacity(), 200);
        assert_eq!(set.len(), 101);
    }

    #[test]
    fn test_growth_is_arithmetic_and_monotonic() {
        let mut set = GrowableEventSet::with_policy(SetKind::Reads, policy(2, 5, None)).unwrap();
        let mut previous_capacity = set.capacity();

        for value in 0..40 {
            let growths_before = set.growth_count();
            set.append(value).unwrap();

            if set.growth_count() > growths_before {
                assert_eq!(set.capacity(), previous_capacity + 5);
            } else {
                assert_eq!(set.capacity(), previous_capacity);
            }
            assert!(set.capacity() >= set.len());
            previous_capacity = set.capacity();
        }
    }

    #[test]
    fn test_ceiling_failure_leaves_set_unchanged() {
        let mut set =
            GrowableEventSet::with_policy(SetKind::LockAcquires, policy(2, 2, Some(4))).unwrap();
        for value in 0..4 {
            set.append(value).unwrap();
        }

        let err = set.append(99).unwrap_err();

        assert_eq!(
            err,
            AllocationFailure {
                set: SetKind::LockAcquires,
                requested_capacity: 6,
            }
        );
        assert_eq!(set.len(), 4);
        assert_eq!(set.capacity(), 4);
        assert!(set.iter().copied().eq(0..4));
    }

    #[test]
    fn test_zero_initial_capacity_grows_on_first_append() {
        let mut set = GrowableEventSet::with_policy(SetKind::Reads, policy(0, 10, None)).unwrap();
        assert!(set.is_empty());

        set.append('a').unwrap();

        assert_eq!(set.capacity(), 10);
        assert_eq!(set.growth_count(), 1);
    }

    #[test]
    fn test_initial_capacity_above_ceiling_is_rejected() {
        let result = GrowableEventSet::<u8>::with_policy(SetKind::Writes, policy(10, 1, Some(5)));
        assert!(result.is_err());
    }
}
