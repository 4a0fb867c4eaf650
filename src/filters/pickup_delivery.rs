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

//! Pickup-before-delivery order on every path.
//!
//! Every pair consists of alternative pickup nodes and alternative
//! delivery nodes; a performed delivery must be preceded on its path by a
//! performed pickup of the same pair. Per vehicle, one of three
//! disciplines applies: any order, LIFO (pairs close in stack order) or
//! FIFO (pairs close in queue order).

use crate::filter::FilterPriority;
use crate::path_filter::{PathContext, PathFilterLogic};
use crate::types::{FilterError, NodeId, PathId};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The ordering discipline of open pairs on one vehicle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub enum PickupDeliveryPolicy {
    /// Deliveries may close their pairs in any order.
    #[default]
    Any,
    /// Deliveries must close the most recently opened pair first.
    Lifo,
    /// Deliveries must close the least recently opened pair first.
    Fifo,
}

/// Path-filter logic checking pickup/delivery order. Walks each touched
/// path in full, rejecting paths longer than the node count (a proposed
/// successor cycle).
#[derive(Debug)]
pub struct PickupDeliveryFilter {
    /// Node → (pair, is pickup).
    pair_of: Vec<Option<(usize, bool)>>,
    /// Discipline per vehicle.
    policy: Vec<PickupDeliveryPolicy>,
}

impl PickupDeliveryFilter {
    /// Create the logic from `(pickups, deliveries)` alternative lists and
    /// the per-vehicle policies.
    pub fn new(
        num_nodes: usize,
        pairs: Vec<(Vec<NodeId>, Vec<NodeId>)>,
        policy: Vec<PickupDeliveryPolicy>,
    ) -> Result<Self, FilterError> {
        let mut pair_of = vec![None; num_nodes];
        for (index, (pickups, deliveries)) in pairs.iter().enumerate() {
            for (nodes, is_pickup) in [(pickups, true), (deliveries, false)] {
                for &node in nodes {
                    if node >= num_nodes {
                        return Err(FilterError::NodeOutOfRange(node, num_nodes));
                    }
                    if pair_of[node].is_some() {
                        return Err(FilterError::DuplicateMember(node));
                    }
                    pair_of[node] = Some((index, is_pickup));
                }
            }
        }
        Ok(Self { pair_of, policy })
    }

    fn check_path(&self, ctx: &PathContext, vehicle: PathId, path_start: NodeId) -> bool {
        let policy = self.policy[vehicle];
        // open pairs in visit order; `front` marks the FIFO consumption
        // point
        let mut open: Vec<usize> = Vec::new();
        let mut front = 0usize;
        let mut node = path_start;
        let mut visited = 0usize;
        loop {
            visited += 1;
            if visited > ctx.num_nodes() {
                // proposed successors form a cycle
                return false;
            }
            match self.pair_of[node] {
                Some((pair, true)) => open.push(pair),
                Some((pair, false)) => match policy {
                    PickupDeliveryPolicy::Any => {
                        match open.iter().rposition(|&p| p == pair) {
                            Some(i) if i >= front => {
                                open.remove(i);
                            }
                            _ => return false,
                        }
                    }
                    PickupDeliveryPolicy::Lifo => {
                        if open.last() != Some(&pair) {
                            return false;
                        }
                        open.pop();
                    }
                    PickupDeliveryPolicy::Fifo => {
                        if open.get(front) != Some(&pair) {
                            return false;
                        }
                        front += 1;
                    }
                },
                None => {}
            }
            match ctx.get_next(node) {
                Some(next) => node = next,
                None => break,
            }
        }
        // every opened pair must be closed on the same path
        open.len() == front
    }
}

impl PathFilterLogic for PickupDeliveryFilter {
    fn accept_path(
        &mut self,
        ctx: &PathContext,
        path_start: NodeId,
        _chain_start: NodeId,
        _chain_end: NodeId,
    ) -> bool {
        let vehicle = ctx.path_of_start(path_start).expect("touched path start");
        self.check_path(ctx, vehicle, path_start)
    }

    fn priority(&self) -> FilterPriority {
        FilterPriority::Path
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::assignment::{Assignment, Delta};
    use crate::filter::LocalSearchFilter;
    use crate::path_filter::BasePathFilter;

    /// Pairs (1 → 2) and (3 → 4); start 5, end 6; node 0 free.
    fn filter(policy: PickupDeliveryPolicy) -> BasePathFilter<PickupDeliveryFilter> {
        let logic =
            PickupDeliveryFilter::new(7, vec![(vec![1], vec![2]), (vec![3], vec![4])], vec![policy])
                .unwrap();
        let mut filter = BasePathFilter::new(7, vec![5], vec![6], logic);
        // committed: the empty path
        let mut values: Vec<i64> = (0..7).collect();
        values[5] = 6;
        filter.synchronize(&Assignment::new(values), None);
        filter
    }

    fn route_delta(route: &[NodeId]) -> Delta {
        let mut delta = Delta::new();
        let mut previous = 5;
        for &node in route {
            delta.set(previous, node as i64);
            previous = node;
        }
        delta.set(previous, 6);
        delta
    }

    #[test]
    fn lifo_accepts_nested_pairs() {
        let mut f = filter(PickupDeliveryPolicy::Lifo);
        assert!(f.accept(&route_delta(&[1, 3, 4, 2]), &Delta::new(), 0, i64::MAX));
    }

    #[test]
    fn lifo_rejects_crossing_pairs() {
        let mut f = filter(PickupDeliveryPolicy::Lifo);
        assert!(!f.accept(&route_delta(&[1, 3, 2, 4]), &Delta::new(), 0, i64::MAX));
    }

    #[test]
    fn fifo_requires_queue_order() {
        let mut f = filter(PickupDeliveryPolicy::Fifo);
        assert!(f.accept(&route_delta(&[1, 3, 2, 4]), &Delta::new(), 0, i64::MAX));
        assert!(!f.accept(&route_delta(&[1, 3, 4, 2]), &Delta::new(), 0, i64::MAX));
    }

    #[test]
    fn any_order_allows_both() {
        let mut f = filter(PickupDeliveryPolicy::Any);
        assert!(f.accept(&route_delta(&[1, 3, 2, 4]), &Delta::new(), 0, i64::MAX));
        assert!(f.accept(&route_delta(&[1, 3, 4, 2]), &Delta::new(), 0, i64::MAX));
    }

    #[test]
    fn delivery_without_pickup_is_rejected() {
        let mut f = filter(PickupDeliveryPolicy::Any);
        assert!(!f.accept(&route_delta(&[2]), &Delta::new(), 0, i64::MAX));
        assert!(!f.accept(&route_delta(&[1]), &Delta::new(), 0, i64::MAX));
        assert!(f.accept(&route_delta(&[1, 2]), &Delta::new(), 0, i64::MAX));
    }
}
