// RoutingFilters: incremental local-search filters for vehicle routing
// Copyright (C) 2023-2024 Tibor Schneider <sctibor@ethz.ch>
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Small revertible containers.
//!
//! Every mutation a filter performs while evaluating a neighbor goes
//! through one of these, so that abandoning the neighbor costs time
//! proportional to the number of changed entries, never to the size of the
//! model. Queries always see the tentative value; `commit` promotes it,
//! `revert` drops it.

/// A single value with a committed and a tentative copy.
#[derive(Clone, Copy, Debug, Default)]
pub struct CommittableValue<T: Copy> {
    committed: T,
    current: T,
}

impl<T: Copy> CommittableValue<T> {
    /// Create a new committed value.
    pub fn new(value: T) -> Self {
        Self {
            committed: value,
            current: value,
        }
    }

    /// The tentative value.
    pub fn get(&self) -> T {
        self.current
    }

    /// The committed value.
    pub fn committed(&self) -> T {
        self.committed
    }

    /// Overwrite the tentative value.
    pub fn set(&mut self, value: T) {
        self.current = value;
    }

    /// Promote the tentative value to committed.
    pub fn commit(&mut self) {
        self.committed = self.current;
    }

    /// Drop the tentative value.
    pub fn revert(&mut self) {
        self.current = self.committed;
    }
}

/// A bitset with O(1) `set` and O(changed) enumeration and reset.
///
/// Only `set` and `clear_all` are offered: clearing individual bits would
/// leave stale entries in the change list and break the O(changed)
/// enumeration guarantee.
#[derive(Clone, Debug, Default)]
pub struct SparseBitset {
    words: Vec<u64>,
    active: Vec<usize>,
}

impl SparseBitset {
    /// Create a bitset able to hold indices in `[0, capacity)`.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            words: vec![0; capacity.div_ceil(64)],
            active: Vec::new(),
        }
    }

    /// Set bit `index`. No-op if it is already set.
    pub fn set(&mut self, index: usize) {
        let (word, bit) = (index / 64, index % 64);
        if self.words[word] & (1 << bit) == 0 {
            self.words[word] |= 1 << bit;
            self.active.push(index);
        }
    }

    /// Whether bit `index` is set.
    pub fn contains(&self, index: usize) -> bool {
        self.words[index / 64] & (1 << (index % 64)) != 0
    }

    /// Iterate over the set bits, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.active.iter().copied()
    }

    /// The number of set bits.
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// Whether no bit is set.
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Clear every set bit, in time proportional to their number.
    pub fn clear_all(&mut self) {
        for index in self.active.drain(..) {
            self.words[index / 64] &= !(1 << (index % 64));
        }
    }
}

/// An array with revertible per-index edits and a changed-indices set.
#[derive(Clone, Debug)]
pub struct CommittableVector<T: Copy> {
    committed: Vec<T>,
    current: Vec<T>,
    changed: SparseBitset,
}

impl<T: Copy> CommittableVector<T> {
    /// Create a vector of `len` copies of `value`, all committed.
    pub fn new(value: T, len: usize) -> Self {
        Self {
            committed: vec![value; len],
            current: vec![value; len],
            changed: SparseBitset::with_capacity(len),
        }
    }

    /// The number of entries.
    pub fn len(&self) -> usize {
        self.current.len()
    }

    /// Whether the vector has no entries.
    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    /// The tentative value at `index`.
    pub fn get(&self, index: usize) -> T {
        self.current[index]
    }

    /// The committed value at `index`.
    pub fn committed(&self, index: usize) -> T {
        self.committed[index]
    }

    /// Overwrite the tentative value at `index`.
    pub fn set(&mut self, index: usize, value: T) {
        self.current[index] = value;
        self.changed.set(index);
    }

    /// Iterate over the indices changed since the last commit or revert.
    pub fn changed_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.changed.iter()
    }

    /// Promote all tentative values to committed. O(changed).
    pub fn commit(&mut self) {
        for index in self.changed.iter() {
            self.committed[index] = self.current[index];
        }
        self.changed.clear_all();
    }

    /// Drop all tentative values. O(changed).
    pub fn revert(&mut self) {
        for index in self.changed.iter() {
            self.current[index] = self.committed[index];
        }
        self.changed.clear_all();
    }
}
