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

//! The interface to the solver's variable substrate: a read-only snapshot
//! of the committed successor variables, and the delta a neighbor proposes.
//!
//! The search engine owns both; filters only ever read them. A delta entry
//! without a value stands for a variable the neighbor leaves unbound, which
//! signals large-neighborhood search: every filter accepts such a neighbor
//! immediately and contributes zero to the objective.

use crate::types::NodeId;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A snapshot of the committed values of all successor variables. Variable
/// `i` belongs to node `i`; nodes without a successor variable (the
/// per-vehicle end nodes) are not part of the snapshot.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct Assignment {
    values: Vec<i64>,
}

impl Assignment {
    /// Create a snapshot from the given values.
    pub fn new(values: Vec<i64>) -> Self {
        Self { values }
    }

    /// The number of variables.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the snapshot holds no variables.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The committed value of variable `var`.
    pub fn value(&self, var: usize) -> i64 {
        self.values[var]
    }

    /// Overwrite the committed value of variable `var`. Called by the
    /// search engine when a neighbor is chosen, before synchronizing the
    /// filters.
    pub fn set_value(&mut self, var: usize, value: i64) {
        self.values[var] = value;
    }
}

/// One proposed variable assignment. `value == None` means the variable is
/// left unbound by the neighbor (large-neighborhood search).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct DeltaElement {
    /// The index of the successor variable.
    pub var: usize,
    /// The proposed value, if bound.
    pub value: Option<i64>,
}

/// The set of variable assignments a neighbor proposes. Contains at most
/// one element per variable.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct Delta {
    elements: Vec<DeltaElement>,
}

impl Delta {
    /// Create an empty delta.
    pub fn new() -> Self {
        Self::default()
    }

    /// Propose `next[var] = value`.
    pub fn set(&mut self, var: usize, value: i64) -> &mut Self {
        self.elements.push(DeltaElement {
            var,
            value: Some(value),
        });
        self
    }

    /// Leave `var` unbound (large-neighborhood search).
    pub fn set_unbound(&mut self, var: usize) -> &mut Self {
        self.elements.push(DeltaElement { var, value: None });
        self
    }

    /// Propose to make `node` a self-loop (unperformed).
    pub fn deactivate(&mut self, node: NodeId) -> &mut Self {
        self.set(node, node as i64)
    }

    /// Iterate over the proposed assignments.
    pub fn iter(&self) -> impl Iterator<Item = &DeltaElement> + '_ {
        self.elements.iter()
    }

    /// The number of proposed assignments.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the delta proposes nothing.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Remove all proposed assignments.
    pub fn clear(&mut self) {
        self.elements.clear();
    }
}

impl FromIterator<(usize, i64)> for Delta {
    fn from_iter<T: IntoIterator<Item = (usize, i64)>>(iter: T) -> Self {
        let mut delta = Delta::new();
        for (var, value) in iter {
            delta.set(var, value);
        }
        delta
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn delta_builder() {
        let mut delta = Delta::new();
        delta.set(3, 4).deactivate(7).set_unbound(1);
        let elements: Vec<_> = delta.iter().collect();
        assert_eq!(elements.len(), 3);
        assert_eq!(elements[0].value, Some(4));
        assert_eq!(elements[1].value, Some(7));
        assert_eq!(elements[2].value, None);
    }

    #[test]
    fn assignment_snapshot() {
        let mut a = Assignment::new(vec![1, 2, 0]);
        assert_eq!(a.value(0), 1);
        a.set_value(0, 2);
        assert_eq!(a.value(0), 2);
        assert_eq!(a.len(), 3);
    }
}
