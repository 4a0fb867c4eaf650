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

//! The common filter contract and the manager dispatching a neighbor to a
//! prioritized sequence of filters.

use crate::arith::cap_add;
use crate::assignment::{Assignment, Delta};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Evaluation priority of a filter. Filters with a lower priority are
/// cheaper and evaluated first, so expensive filters only run on neighbors
/// that survived the cheap ones.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub enum FilterPriority {
    /// Lightweight chain/path and cumul filters.
    Path = 0,
    /// Path cumul filters with an embedded route optimizer.
    PathWithOptimizer = 1,
    /// Cumul-bounds propagation.
    CumulBounds = 2,
    /// Resource assignment.
    ResourceAssignment = 3,
    /// Global LP over all cumuls.
    GlobalLp = 4,
}

/// A local-search filter.
///
/// The search engine drives every filter through cycles of
/// `relax → accept → (accept)* → synchronize` for chosen neighbors, or
/// `relax → accept` for rejected ones; an `accept` call implicitly reverts
/// whatever the previous `accept` left behind. Filters never mutate
/// committed state during `accept`.
pub trait LocalSearchFilter: std::fmt::Debug {
    /// Hint that `delta` is about to be evaluated. Filters may precompute;
    /// a no-op is legal.
    fn relax(&mut self, _delta: &Delta) {}

    /// Decide whether the neighbor described by `delta` is acceptable and
    /// whether this filter's objective bound stays within
    /// `objective_max`. `deltadelta` holds the assignments added since the
    /// last `relax` on the same neighbor.
    ///
    /// If any variable in the delta is unbound, the filter must accept
    /// immediately and report an objective contribution of zero.
    fn accept(
        &mut self,
        delta: &Delta,
        deltadelta: &Delta,
        objective_min: i64,
        objective_max: i64,
    ) -> bool;

    /// Commit the chosen neighbor. `delta` is the accepted delta if the
    /// engine still has it, `None` on a from-scratch synchronization.
    fn synchronize(&mut self, assignment: &Assignment, delta: Option<&Delta>);

    /// This filter's contribution to the objective of the last accepted
    /// neighbor (a lower bound or the exact value). Zero during LNS.
    fn accepted_objective_value(&self) -> i64 {
        0
    }

    /// This filter's contribution to the objective of the committed
    /// solution.
    fn synchronized_objective_value(&self) -> i64 {
        0
    }

    /// Evaluation priority. Defaults to the cheapest class.
    fn priority(&self) -> FilterPriority {
        FilterPriority::Path
    }
}

/// Dispatches a neighbor to a set of filters, cheapest first, and
/// accumulates their objective contributions.
#[derive(Debug)]
pub struct LocalSearchFilterManager {
    filters: Vec<Box<dyn LocalSearchFilter>>,
    accepted_value: i64,
    synchronized_value: i64,
}

impl LocalSearchFilterManager {
    /// Create a manager. The filters are reordered by priority (stable, so
    /// registration order breaks ties).
    pub fn new(mut filters: Vec<Box<dyn LocalSearchFilter>>) -> Self {
        filters.sort_by_key(|f| f.priority());
        Self {
            filters,
            accepted_value: 0,
            synchronized_value: 0,
        }
    }

    /// The number of managed filters.
    pub fn num_filters(&self) -> usize {
        self.filters.len()
    }

    /// Relax all filters, then let them accept the neighbor in priority
    /// order. Evaluation stops at the first rejecting filter, or as soon
    /// as the accumulated objective bound exceeds `objective_max`.
    pub fn accept(
        &mut self,
        delta: &Delta,
        deltadelta: &Delta,
        objective_min: i64,
        objective_max: i64,
    ) -> bool {
        for filter in &mut self.filters {
            filter.relax(delta);
        }
        let mut bound = objective_min;
        for filter in &mut self.filters {
            if !filter.accept(delta, deltadelta, 0, objective_max) {
                log::debug!("neighbor rejected by {filter:?}");
                return false;
            }
            bound = cap_add(bound, filter.accepted_objective_value());
            if bound > objective_max {
                log::debug!("neighbor rejected: objective bound {bound} > {objective_max}");
                return false;
            }
        }
        self.accepted_value = bound;
        true
    }

    /// Commit the chosen neighbor on every filter, in priority order.
    pub fn synchronize(&mut self, assignment: &Assignment, delta: Option<&Delta>) {
        let mut value = 0;
        for filter in &mut self.filters {
            filter.synchronize(assignment, delta);
            value = cap_add(value, filter.synchronized_objective_value());
        }
        self.synchronized_value = value;
        log::info!("synchronized {} filters, objective {value}", self.filters.len());
    }

    /// The accumulated objective bound of the last accepted neighbor.
    pub fn accepted_objective_value(&self) -> i64 {
        self.accepted_value
    }

    /// The accumulated objective value of the committed solution.
    pub fn synchronized_objective_value(&self) -> i64 {
        self.synchronized_value
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Debug)]
    struct StaticFilter {
        accept: bool,
        value: i64,
        priority: FilterPriority,
        calls: std::rc::Rc<std::cell::RefCell<Vec<i64>>>,
    }

    impl LocalSearchFilter for StaticFilter {
        fn accept(&mut self, _: &Delta, _: &Delta, _: i64, _: i64) -> bool {
            self.calls.borrow_mut().push(self.value);
            self.accept
        }

        fn synchronize(&mut self, _: &Assignment, _: Option<&Delta>) {}

        fn accepted_objective_value(&self) -> i64 {
            self.value
        }

        fn priority(&self) -> FilterPriority {
            self.priority
        }
    }

    #[test]
    fn manager_orders_by_priority_and_short_circuits() {
        let calls = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let mk = |accept, value, priority| {
            Box::new(StaticFilter {
                accept,
                value,
                priority,
                calls: calls.clone(),
            }) as Box<dyn LocalSearchFilter>
        };
        let mut manager = LocalSearchFilterManager::new(vec![
            mk(true, 2, FilterPriority::GlobalLp),
            mk(true, 1, FilterPriority::Path),
        ]);
        assert!(manager.accept(&Delta::new(), &Delta::new(), 0, 10));
        assert_eq!(*calls.borrow(), vec![1, 2]);
        assert_eq!(manager.accepted_objective_value(), 3);

        // the expensive filter is not called once the bound is exceeded
        calls.borrow_mut().clear();
        let mut manager = LocalSearchFilterManager::new(vec![
            mk(true, 100, FilterPriority::Path),
            mk(true, 1, FilterPriority::GlobalLp),
        ]);
        assert!(!manager.accept(&Delta::new(), &Delta::new(), 0, 10));
        assert_eq!(*calls.borrow(), vec![100]);
    }
}
