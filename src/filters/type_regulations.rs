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

//! Visit-type regulations.
//!
//! Every node may carry a visit type. Hard incompatibilities (two types
//! that may never share a vehicle) are checked here; temporal
//! incompatibilities and type requirements depend on model data this
//! library does not own and are delegated to an optional route checker
//! supplied by the model.

use std::collections::{HashMap, HashSet};

use crate::path_filter::{PathContext, PathFilterLogic};
use crate::types::{FilterError, NodeId, PathId};

/// A model-supplied verdict on the type regulations of a whole route
/// (temporal incompatibilities, type requirements).
pub type RouteTypeChecker = Box<dyn Fn(PathId, &[NodeId]) -> bool>;

/// Path-filter logic rejecting routes that mix hard-incompatible visit
/// types.
pub struct TypeRegulationsFilter {
    /// Visit type of each node.
    type_of: Vec<Option<usize>>,
    /// Per type: the set of types it may never share a vehicle with.
    hard_incompatibilities: Vec<HashSet<usize>>,
    route_checker: Option<RouteTypeChecker>,
}

impl std::fmt::Debug for TypeRegulationsFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegulationsFilter")
            .field("num_types", &self.hard_incompatibilities.len())
            .field("has_route_checker", &self.route_checker.is_some())
            .finish()
    }
}

impl TypeRegulationsFilter {
    /// Create the logic. `incompatible` lists unordered pairs of types
    /// that may never share a vehicle.
    pub fn new(
        type_of: Vec<Option<usize>>,
        num_types: usize,
        incompatible: &[(usize, usize)],
    ) -> Result<Self, FilterError> {
        if let Some(&t) = type_of
            .iter()
            .flatten()
            .find(|&&t| t >= num_types)
        {
            return Err(FilterError::UnknownClass(t, num_types));
        }
        let mut hard_incompatibilities = vec![HashSet::new(); num_types];
        for &(a, b) in incompatible {
            if a >= num_types || b >= num_types {
                return Err(FilterError::UnknownClass(a.max(b), num_types));
            }
            hard_incompatibilities[a].insert(b);
            hard_incompatibilities[b].insert(a);
        }
        Ok(Self {
            type_of,
            hard_incompatibilities,
            route_checker: None,
        })
    }

    /// Delegate temporal incompatibilities and type requirements to the
    /// model's checker.
    pub fn with_route_checker(mut self, checker: RouteTypeChecker) -> Self {
        self.route_checker = Some(checker);
        self
    }
}

impl PathFilterLogic for TypeRegulationsFilter {
    fn accept_path(
        &mut self,
        ctx: &PathContext,
        path_start: NodeId,
        _chain_start: NodeId,
        _chain_end: NodeId,
    ) -> bool {
        let vehicle = ctx.path_of_start(path_start).expect("touched path start");
        let mut counts: HashMap<usize, usize> = HashMap::new();
        let mut route = Vec::new();
        let mut node = path_start;
        loop {
            route.push(node);
            if route.len() > ctx.num_nodes() {
                return false;
            }
            if let Some(visit_type) = self.type_of[node] {
                if self.hard_incompatibilities[visit_type]
                    .iter()
                    .any(|other| counts.get(other).copied().unwrap_or(0) > 0)
                {
                    return false;
                }
                *counts.entry(visit_type).or_insert(0) += 1;
            }
            match ctx.get_next(node) {
                Some(next) => node = next,
                None => break,
            }
        }
        match &self.route_checker {
            Some(checker) => checker(vehicle, &route),
            None => true,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::assignment::{Assignment, Delta};
    use crate::filter::LocalSearchFilter;
    use crate::path_filter::BasePathFilter;

    /// One vehicle 3 -> 0 -> 4; nodes 1, 2 unperformed. Types: node 0 and
    /// 1 are type 0, node 2 is type 1; types 0 and 1 are incompatible.
    fn filter(
        incompatible: &[(usize, usize)],
        checker: Option<RouteTypeChecker>,
    ) -> BasePathFilter<TypeRegulationsFilter> {
        let mut logic = TypeRegulationsFilter::new(
            vec![Some(0), Some(0), Some(1), None, None],
            2,
            incompatible,
        )
        .unwrap();
        if let Some(checker) = checker {
            logic = logic.with_route_checker(checker);
        }
        let mut f = BasePathFilter::new(5, vec![3], vec![4], logic);
        let mut values: Vec<i64> = (0..5).collect();
        values[3] = 0;
        values[0] = 4;
        f.synchronize(&Assignment::new(values), None);
        f
    }

    #[test]
    fn incompatible_types_may_not_share_a_vehicle() {
        let mut f = filter(&[(0, 1)], None);
        let mut delta = Delta::new();
        delta.set(0, 2).set(2, 4);
        assert!(!f.accept(&delta, &Delta::new(), 0, i64::MAX));
        // a second node of the same type is fine
        let mut delta = Delta::new();
        delta.set(0, 1).set(1, 4);
        assert!(f.accept(&delta, &Delta::new(), 0, i64::MAX));
    }

    #[test]
    fn compatible_types_pass() {
        let mut f = filter(&[], None);
        let mut delta = Delta::new();
        delta.set(0, 2).set(2, 4);
        assert!(f.accept(&delta, &Delta::new(), 0, i64::MAX));
    }

    #[test]
    fn route_checker_is_consulted() {
        let checker: RouteTypeChecker = Box::new(|_, route: &[NodeId]| route.len() <= 3);
        let mut f = filter(&[], Some(checker));
        // 4 nodes on the route: the model checker refuses
        let mut delta = Delta::new();
        delta.set(0, 2).set(2, 4);
        assert!(!f.accept(&delta, &Delta::new(), 0, i64::MAX));
    }
}
