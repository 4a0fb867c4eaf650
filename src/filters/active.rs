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

//! Filters over node and vehicle activity: a cap on the number of used
//! vehicles, and groups of nodes that must be performed all-or-nothing.

use std::collections::HashMap;

use crate::assignment::{Assignment, Delta};
use crate::filter::LocalSearchFilter;
use crate::types::{FilterError, NodeId, PathId};

/// Accepts a neighbor iff at most `max_active_vehicles` vehicles are used.
/// A vehicle is used iff its start does not point directly at its end.
/// O(delta) per neighbor.
#[derive(Debug)]
pub struct MaxActiveVehiclesFilter {
    starts: Vec<NodeId>,
    ends: Vec<NodeId>,
    /// Node → path, for start nodes only.
    path_of_start: HashMap<NodeId, PathId>,
    max_active_vehicles: usize,
    /// Committed successor values.
    values: Vec<i64>,
    /// Committed number of active vehicles.
    active_count: usize,
}

impl MaxActiveVehiclesFilter {
    /// Create the filter for `num_nodes` nodes and the given paths.
    pub fn new(
        num_nodes: usize,
        starts: Vec<NodeId>,
        ends: Vec<NodeId>,
        max_active_vehicles: usize,
    ) -> Result<Self, FilterError> {
        if starts.len() != ends.len() {
            return Err(FilterError::LengthMismatch {
                what: "path ends",
                expected: starts.len(),
                got: ends.len(),
            });
        }
        let path_of_start = starts
            .iter()
            .enumerate()
            .map(|(path, &start)| (start, path))
            .collect();
        Ok(Self {
            starts,
            ends,
            path_of_start,
            max_active_vehicles,
            values: vec![0; num_nodes],
            active_count: 0,
        })
    }
}

impl LocalSearchFilter for MaxActiveVehiclesFilter {
    fn accept(&mut self, delta: &Delta, _: &Delta, _: i64, _: i64) -> bool {
        // last value per touched start wins
        let mut new_starts: HashMap<NodeId, Option<i64>> = HashMap::new();
        for element in delta.iter() {
            if self.path_of_start.contains_key(&element.var) {
                new_starts.insert(element.var, element.value);
            }
        }
        let mut active = self.active_count as i64;
        for (&start, &value) in &new_starts {
            let Some(value) = value else {
                // large-neighborhood search
                return true;
            };
            let end = self.ends[self.path_of_start[&start]] as i64;
            let was_active = self.values[start] != end;
            let is_active = value != end;
            active += is_active as i64 - was_active as i64;
        }
        active as usize <= self.max_active_vehicles
    }

    fn synchronize(&mut self, assignment: &Assignment, _: Option<&Delta>) {
        for var in 0..assignment.len().min(self.values.len()) {
            self.values[var] = assignment.value(var);
        }
        self.active_count = self
            .starts
            .iter()
            .zip(self.ends.iter())
            .filter(|&(&start, &end)| self.values[start] != end as i64)
            .count();
    }
}

/// A group of nodes that must be all performed or all unperformed.
///
/// The filter keeps per group the number of definitely-active members and
/// the number of members left unbound by the delta, and accepts iff each
/// touched group has either no definitely-active member or enough
/// active-or-unbound members to still complete. Unbound variables are
/// counted as unknown instead of triggering the LNS shortcut, so partial
/// LNS neighbors are still filtered.
#[derive(Debug)]
pub struct ActiveNodeGroupFilter {
    groups: Vec<Vec<NodeId>>,
    group_of: Vec<Option<usize>>,
    /// Committed successor values.
    values: Vec<i64>,
    /// Committed number of active members per group.
    active: Vec<usize>,
}

impl ActiveNodeGroupFilter {
    /// Create the filter; each node may appear in at most one group.
    pub fn new(num_nodes: usize, groups: Vec<Vec<NodeId>>) -> Result<Self, FilterError> {
        let mut group_of = vec![None; num_nodes];
        for (index, group) in groups.iter().enumerate() {
            for &node in group {
                if node >= num_nodes {
                    return Err(FilterError::NodeOutOfRange(node, num_nodes));
                }
                if group_of[node].is_some() {
                    return Err(FilterError::DuplicateMember(node));
                }
                group_of[node] = Some(index);
            }
        }
        Ok(Self {
            active: vec![0; groups.len()],
            groups,
            group_of,
            values: vec![0; num_nodes],
        })
    }
}

impl LocalSearchFilter for ActiveNodeGroupFilter {
    fn accept(&mut self, delta: &Delta, _: &Delta, _: i64, _: i64) -> bool {
        // deduplicated delta values per group member
        let mut new_values: HashMap<NodeId, Option<i64>> = HashMap::new();
        for element in delta.iter() {
            if self.group_of[element.var].is_some() {
                new_values.insert(element.var, element.value);
            }
        }
        let mut touched: Vec<usize> = new_values
            .keys()
            .filter_map(|&node| self.group_of[node])
            .collect();
        touched.sort_unstable();
        touched.dedup();
        for group in touched {
            let mut active = self.active[group] as i64;
            let mut unknown = 0i64;
            for (&node, &value) in &new_values {
                if self.group_of[node] != Some(group) {
                    continue;
                }
                let was_active = self.values[node] != node as i64;
                active -= was_active as i64;
                match value {
                    None => unknown += 1,
                    Some(value) => active += (value != node as i64) as i64,
                }
            }
            let size = self.groups[group].len() as i64;
            if active != 0 && active < size - unknown {
                return false;
            }
        }
        true
    }

    fn synchronize(&mut self, assignment: &Assignment, _: Option<&Delta>) {
        for var in 0..assignment.len().min(self.values.len()) {
            self.values[var] = assignment.value(var);
        }
        for (index, group) in self.groups.iter().enumerate() {
            self.active[index] = group
                .iter()
                .filter(|&&node| self.values[node] != node as i64)
                .count();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// Three vehicles: starts 6, 8, 10, ends 7, 9, 11; nodes 0..=5.
    fn assignment(routes: [Option<NodeId>; 3]) -> Assignment {
        let mut values: Vec<i64> = (0..12).collect();
        for (vehicle, first) in routes.iter().enumerate() {
            let (start, end) = (6 + 2 * vehicle, 7 + 2 * vehicle);
            match first {
                Some(node) => {
                    values[start] = *node as i64;
                    values[*node] = end as i64;
                }
                None => values[start] = end as i64,
            }
        }
        Assignment::new(values)
    }

    #[test]
    fn third_active_vehicle_is_rejected() {
        let mut filter =
            MaxActiveVehiclesFilter::new(12, vec![6, 8, 10], vec![7, 9, 11], 2).unwrap();
        // vehicles 0 and 1 active, vehicle 2 empty
        filter.synchronize(&assignment([Some(0), Some(1), None]), None);
        // activating vehicle 2 exceeds the cap of 2
        let mut delta = Delta::new();
        delta.set(10, 2).set(2, 11);
        assert!(!filter.accept(&delta, &Delta::new(), 0, i64::MAX));
        // swapping activity between vehicles is fine
        let mut delta = Delta::new();
        delta.set(8, 9).deactivate(1).set(10, 2).set(2, 11);
        assert!(filter.accept(&delta, &Delta::new(), 0, i64::MAX));
    }

    #[test]
    fn lns_on_a_start_accepts() {
        let mut filter =
            MaxActiveVehiclesFilter::new(12, vec![6, 8, 10], vec![7, 9, 11], 1).unwrap();
        filter.synchronize(&assignment([Some(0), Some(1), None]), None);
        let mut delta = Delta::new();
        delta.set_unbound(10);
        assert!(filter.accept(&delta, &Delta::new(), 0, i64::MAX));
    }

    #[test]
    fn group_must_activate_together() {
        let mut filter = ActiveNodeGroupFilter::new(12, vec![vec![0, 1, 2]]).unwrap();
        // all three group members inactive
        filter.synchronize(&assignment([None, None, None]), None);
        // activating a single member leaves the group half-done
        let mut delta = Delta::new();
        delta.set(6, 0).set(0, 7);
        assert!(!filter.accept(&delta, &Delta::new(), 0, i64::MAX));
        // activating all three at once is fine
        let mut delta = Delta::new();
        delta.set(6, 0).set(0, 1).set(1, 2).set(2, 7);
        assert!(filter.accept(&delta, &Delta::new(), 0, i64::MAX));
    }

    #[test]
    fn unknown_members_may_complete_the_group() {
        let mut filter = ActiveNodeGroupFilter::new(12, vec![vec![0, 1]]).unwrap();
        filter.synchronize(&assignment([None, None, None]), None);
        // node 0 becomes active, node 1 is left to the LNS subsolver
        let mut delta = Delta::new();
        delta.set(6, 0).set(0, 7).set_unbound(1);
        assert!(filter.accept(&delta, &Delta::new(), 0, i64::MAX));
        // without the unknown, the half-active group is rejected
        let mut delta = Delta::new();
        delta.set(6, 0).set(0, 7);
        assert!(!filter.accept(&delta, &Delta::new(), 0, i64::MAX));
    }
}
