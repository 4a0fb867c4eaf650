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

//! The node disjunction filter.
//!
//! A disjunction is a set of nodes of which at most `max_cardinality` may
//! be active. Missing active nodes are either tolerated at a penalty
//! (soft) or forbidden (mandatory, encoded as a negative penalty; the
//! magnitude of a negative penalty carries no meaning).

use std::collections::HashMap;

use crate::arith::{cap_add, cap_prod, cap_sub};
use crate::assignment::{Assignment, Delta};
use crate::collections::CommittableValue;
use crate::filter::LocalSearchFilter;
use crate::types::{FilterError, NodeId};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How a disjunction's penalty scales with the number of missing active
/// nodes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub enum PenaltyCostBehavior {
    /// Pay the penalty once per missing active node.
    #[default]
    PenalizePerViolation,
    /// Pay the penalty at most once, however many nodes are missing.
    PenalizeOnce,
}

/// One disjunction.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct Disjunction {
    /// The member nodes.
    pub nodes: Vec<NodeId>,
    /// At most this many members may be active.
    pub max_cardinality: usize,
    /// Penalty per missing active node; negative makes the disjunction
    /// mandatory.
    pub penalty: i64,
}

impl Disjunction {
    /// Whether missing active nodes reject the neighbor outright.
    pub fn is_mandatory(&self) -> bool {
        self.penalty < 0
    }
}

/// Incremental filter over a set of [`Disjunction`]s. O(delta) per
/// neighbor.
#[derive(Debug)]
pub struct NodeDisjunctionFilter {
    disjunctions: Vec<Disjunction>,
    /// Disjunctions of each node.
    of_node: Vec<Vec<usize>>,
    behavior: PenaltyCostBehavior,
    /// Committed successor values.
    values: Vec<i64>,
    /// Committed number of active members per disjunction.
    active: Vec<usize>,
    /// Total penalty: committed on synchronize, tentative per neighbor.
    cost: CommittableValue<i64>,
}

impl NodeDisjunctionFilter {
    /// Create the filter.
    pub fn new(
        num_nodes: usize,
        disjunctions: Vec<Disjunction>,
        behavior: PenaltyCostBehavior,
    ) -> Result<Self, FilterError> {
        let mut of_node: Vec<Vec<usize>> = vec![Vec::new(); num_nodes];
        for (index, disjunction) in disjunctions.iter().enumerate() {
            for &node in &disjunction.nodes {
                if node >= num_nodes {
                    return Err(FilterError::NodeOutOfRange(node, num_nodes));
                }
                of_node[node].push(index);
            }
        }
        Ok(Self {
            active: vec![0; disjunctions.len()],
            disjunctions,
            of_node,
            behavior,
            values: vec![0; num_nodes],
            cost: CommittableValue::new(0),
        })
    }

    /// Penalty of one disjunction with the given number of active
    /// members. Monotone in the number of inactive members.
    fn penalty(&self, index: usize, active: usize) -> i64 {
        let disjunction = &self.disjunctions[index];
        if disjunction.is_mandatory() {
            return 0;
        }
        let allowed_inactive = disjunction.nodes.len() - disjunction.max_cardinality.min(disjunction.nodes.len());
        let inactive = disjunction.nodes.len() - active;
        let violation = inactive.saturating_sub(allowed_inactive) as i64;
        let violation = match self.behavior {
            PenaltyCostBehavior::PenalizePerViolation => violation,
            PenaltyCostBehavior::PenalizeOnce => violation.min(1),
        };
        cap_prod(disjunction.penalty, violation)
    }

    /// Whether the disjunction tolerates the given number of active
    /// members at all.
    fn feasible(&self, index: usize, active: usize) -> bool {
        let disjunction = &self.disjunctions[index];
        if active > disjunction.max_cardinality {
            return false;
        }
        if disjunction.is_mandatory() {
            let inactive = disjunction.nodes.len() - active;
            let allowed_inactive = disjunction.nodes.len() - disjunction.max_cardinality.min(disjunction.nodes.len());
            if inactive > allowed_inactive {
                return false;
            }
        }
        true
    }
}

impl LocalSearchFilter for NodeDisjunctionFilter {
    fn accept(&mut self, delta: &Delta, _: &Delta, _: i64, objective_max: i64) -> bool {
        // deduplicated delta over member nodes
        let mut new_values: HashMap<NodeId, Option<i64>> = HashMap::new();
        for element in delta.iter() {
            if !self.of_node[element.var].is_empty() {
                new_values.insert(element.var, element.value);
            }
        }
        if new_values.values().any(Option::is_none) {
            // large-neighborhood search
            self.cost.set(0);
            return true;
        }
        let mut touched: Vec<usize> = new_values
            .keys()
            .flat_map(|&node| self.of_node[node].iter().copied())
            .collect();
        touched.sort_unstable();
        touched.dedup();
        self.cost.revert();
        let mut cost = self.cost.committed();
        for index in touched {
            let mut active = self.active[index] as i64;
            for (&node, &value) in &new_values {
                if !self.of_node[node].contains(&index) {
                    continue;
                }
                let was_active = self.values[node] != node as i64;
                let is_active = value.expect("bound checked above") != node as i64;
                active += is_active as i64 - was_active as i64;
            }
            let active = active as usize;
            if !self.feasible(index, active) {
                return false;
            }
            cost = cap_sub(cost, self.penalty(index, self.active[index]));
            cost = cap_add(cost, self.penalty(index, active));
        }
        self.cost.set(cost);
        cost <= objective_max
    }

    fn synchronize(&mut self, assignment: &Assignment, _: Option<&Delta>) {
        for var in 0..assignment.len().min(self.values.len()) {
            self.values[var] = assignment.value(var);
        }
        let mut cost = 0;
        for index in 0..self.disjunctions.len() {
            self.active[index] = self.disjunctions[index]
                .nodes
                .iter()
                .filter(|&&node| self.values[node] != node as i64)
                .count();
            cost = cap_add(cost, self.penalty(index, self.active[index]));
        }
        self.cost.set(cost);
        self.cost.commit();
    }

    fn accepted_objective_value(&self) -> i64 {
        self.cost.get()
    }

    fn synchronized_objective_value(&self) -> i64 {
        self.cost.committed()
    }
}
