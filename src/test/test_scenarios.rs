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

//! End-to-end scenarios driving whole filter stacks through the manager.

use std::cell::RefCell;
use std::rc::Rc;

use crate::assignment::{Assignment, Delta};
use crate::cumul::{CumulDimension, PathCumulFilter};
use crate::dimension_checker::{DemandEvaluator, DimensionChecker};
use crate::filter::{LocalSearchFilter, LocalSearchFilterManager};
use crate::filters::active::MaxActiveVehiclesFilter;
use crate::filters::disjunction::{Disjunction, NodeDisjunctionFilter, PenaltyCostBehavior};
use crate::filters::{DimensionFeasibilityFilter, PathStateFilter};
use crate::interval::Interval;
use crate::path_filter::BasePathFilter;
use crate::path_state::PathState;
use crate::types::NodeId;

/// Three vehicles, at most two of them used: activating the third vehicle
/// is rejected by the manager.
#[test_log::test]
fn vehicle_cap_rejects_through_the_manager() {
    let starts = vec![6, 8, 10];
    let ends = vec![7, 9, 11];
    let filter = MaxActiveVehiclesFilter::new(12, starts, ends, 2).unwrap();
    let mut manager = LocalSearchFilterManager::new(vec![Box::new(filter)]);
    let mut values: Vec<i64> = (0..12).collect();
    values[6] = 0;
    values[0] = 7;
    values[8] = 1;
    values[1] = 9;
    values[10] = 11;
    manager.synchronize(&Assignment::new(values), None);
    let mut delta = Delta::new();
    delta.set(10, 2).set(2, 11);
    assert!(!manager.accept(&delta, &Delta::new(), 0, i64::MAX));
}

/// Disjunction {3, 4, 5} with max cardinality 1 and penalty 7; activating
/// a second member is rejected outright.
#[test]
fn disjunction_cardinality_through_the_manager() {
    let filter = NodeDisjunctionFilter::new(
        12,
        vec![Disjunction {
            nodes: vec![3, 4, 5],
            max_cardinality: 1,
            penalty: 7,
        }],
        PenaltyCostBehavior::PenalizePerViolation,
    )
    .unwrap();
    let mut manager = LocalSearchFilterManager::new(vec![Box::new(filter)]);
    let mut values: Vec<i64> = (0..12).collect();
    values[6] = 3;
    values[3] = 7;
    manager.synchronize(&Assignment::new(values), None);
    assert_eq!(manager.synchronized_objective_value(), 0);
    let mut delta = Delta::new();
    delta.set(3, 4).set(4, 7);
    assert!(!manager.accept(&delta, &Delta::new(), 0, i64::MAX));
}

/// The walk of the cumul filter: transits [10, 15] and [20, 25] under
/// capacity 100 and node windows stay feasible; splicing in a node with a
/// 200-unit transit overshoots every window and is rejected.
#[test]
fn cumul_walk_through_the_manager() {
    let transit: Box<dyn Fn(NodeId, NodeId) -> i64> = Box::new(|a, b| match (a, b) {
        (4, 0) => 10,
        (0, 1) => 20,
        (0, 2) => 200,
        (2, 1) => 0,
        (1, 5) => 20,
        _ => 1,
    });
    let mut dim = CumulDimension::new("load", 6, 1, vec![0], vec![transit]).unwrap();
    dim.vehicle_capacity = vec![100];
    dim.cumul_bounds[0] = Interval::new(0, 30);
    dim.cumul_bounds[1] = Interval::new(0, 50);
    dim.slack_max = vec![5; 6];
    let logic = PathCumulFilter::new(dim, true).unwrap();
    let filter = BasePathFilter::new(6, vec![4], vec![5], logic);
    let mut manager = LocalSearchFilterManager::new(vec![Box::new(filter)]);
    let mut values: Vec<i64> = (0..6).collect();
    values[4] = 0;
    values[0] = 1;
    values[1] = 5;
    manager.synchronize(&Assignment::new(values), None);

    // re-proposing the committed route is accepted
    let mut delta = Delta::new();
    delta.set(0, 1);
    assert!(manager.accept(&delta, &Delta::new(), 0, i64::MAX));

    // inserting node 2 with its 200-unit transit is not
    let mut delta = Delta::new();
    delta.set(0, 2).set(2, 1);
    assert!(!manager.accept(&delta, &Delta::new(), 0, i64::MAX));
}

/// A dimension checker and the path-state filter cooperating under the
/// manager, including commits of accepted neighbors.
#[test_log::test]
fn dimension_checker_stack_commits_accepted_neighbors() {
    let state = Rc::new(RefCell::new(PathState::new(6, vec![4], vec![5]).unwrap()));
    let demand: DemandEvaluator = Box::new(|_, _| Interval::new(4, 4));
    let checker = DimensionChecker::new(
        state.clone(),
        vec![Interval::new(0, 10)],
        vec![0],
        vec![demand],
        vec![Interval::new(0, i64::MAX); 6],
    )
    .unwrap();
    let mut manager = LocalSearchFilterManager::new(vec![
        Box::new(PathStateFilter::new(state.clone())),
        Box::new(DimensionFeasibilityFilter::new(checker)),
    ]);
    let mut values: Vec<i64> = (0..6).collect();
    values[4] = 5;
    let mut assignment = Assignment::new(values);
    manager.synchronize(&assignment, None);

    // one node fits (2 arcs, demand 8 ≤ 10)
    let mut delta = Delta::new();
    delta.set(4, 0).set(0, 5);
    assert!(manager.accept(&delta, &Delta::new(), 0, i64::MAX));
    assignment.set_value(4, 0);
    assignment.set_value(0, 5);
    manager.synchronize(&assignment, Some(&delta));
    assert_eq!(state.borrow().nodes(0).collect::<Vec<_>>(), vec![4, 0, 5]);

    // a second node does not (3 arcs, demand 12 > 10)
    let mut delta = Delta::new();
    delta.set(0, 1).set(1, 5);
    assert!(!manager.accept(&delta, &Delta::new(), 0, i64::MAX));

    // and the rejected neighbor leaves no trace for the next one
    let mut delta = Delta::new();
    delta.set(4, 5).deactivate(0);
    assert!(manager.accept(&delta, &Delta::new(), 0, i64::MAX));
}

/// An unbound variable puts every filter into LNS mode: the neighbor is
/// accepted with objective contribution zero.
#[test]
fn lns_accepts_with_zero_objective() {
    let filter = NodeDisjunctionFilter::new(
        12,
        vec![Disjunction {
            nodes: vec![3, 4, 5],
            max_cardinality: 0,
            penalty: 7,
        }],
        PenaltyCostBehavior::PenalizePerViolation,
    )
    .unwrap();
    let mut manager = LocalSearchFilterManager::new(vec![Box::new(filter)]);
    let values: Vec<i64> = (0..12).collect();
    manager.synchronize(&Assignment::new(values), None);
    let mut delta = Delta::new();
    delta.set_unbound(3);
    assert!(manager.accept(&delta, &Delta::new(), 0, 0));
    assert_eq!(manager.accepted_objective_value(), 0);
}
