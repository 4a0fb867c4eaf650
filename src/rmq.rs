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

//! Sparse-table range minimum query: O(n log n) construction, O(1) query.

/// Range minimum query over a fixed sequence.
#[derive(Clone, Debug, Default)]
pub struct RangeMinimumQuery<T: Ord + Copy> {
    /// `table[l][i]` is the minimum of `values[i..i + 2^l]`.
    table: Vec<Vec<T>>,
}

impl<T: Ord + Copy> RangeMinimumQuery<T> {
    /// Build the table for `values`.
    pub fn new(values: &[T]) -> Self {
        let mut table = Vec::new();
        if values.is_empty() {
            return Self { table };
        }
        table.push(values.to_vec());
        let mut size = 1;
        while 2 * size <= values.len() {
            let previous = table.last().expect("pushed above");
            let row: Vec<T> = (0..previous.len() - size)
                .map(|i| previous[i].min(previous[i + size]))
                .collect();
            table.push(row);
            size *= 2;
        }
        Self { table }
    }

    /// The number of indexed values.
    pub fn len(&self) -> usize {
        self.table.first().map_or(0, Vec::len)
    }

    /// Whether the table indexes no values.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The minimum of `values[begin..end]`. `begin < end` required.
    pub fn range_min(&self, begin: usize, end: usize) -> T {
        debug_assert!(begin < end && end <= self.len());
        let layer = (usize::BITS - 1 - (end - begin).leading_zeros()) as usize;
        let size = 1usize << layer;
        self.table[layer][begin].min(self.table[layer][end - size])
    }
}
