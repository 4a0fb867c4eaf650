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

//! Randomized equivalence of the incremental dimension checker against a
//! naive full-length walk, driven through the path-state filter with
//! random solutions and commits.

use std::cell::RefCell;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::assignment::{Assignment, Delta};
use crate::dimension_checker::{DemandEvaluator, DimensionChecker};
use crate::filter::LocalSearchFilter;
use crate::filters::PathStateFilter;
use crate::interval::Interval;
use crate::path_state::{PathState, SharedPathState};
use crate::types::NodeId;

const NUM_REGULAR: usize = 14;
const NUM_VEHICLES: usize = 3;
const NUM_NODES: usize = NUM_REGULAR + 2 * NUM_VEHICLES;
const PATH_CAPACITY: i64 = 120;

fn starts() -> Vec<NodeId> {
    (0..NUM_VEHICLES).map(|v| NUM_REGULAR + 2 * v).collect()
}

fn ends() -> Vec<NodeId> {
    (0..NUM_VEHICLES).map(|v| NUM_REGULAR + 2 * v + 1).collect()
}

/// Deterministic demand interval per arc.
fn demand(a: NodeId, b: NodeId) -> Interval {
    let lo = ((a * 7 + b * 13) % 9) as i64;
    Interval::new(lo, lo + ((a + b) % 3) as i64)
}

/// Deterministic node capacities: every fifth node has a tight window.
fn node_capacities() -> Vec<Interval> {
    (0..NUM_NODES)
        .map(|n| {
            if n < NUM_REGULAR && n % 5 == 4 {
                Interval::new(0, 20 + 3 * n as i64)
            } else {
                Interval::new(0, i64::MAX)
            }
        })
        .collect()
}

/// A random solution: a route per vehicle plus unperformed nodes.
fn random_solution(rng: &mut StdRng) -> Vec<i64> {
    let mut regular: Vec<NodeId> = (0..NUM_REGULAR).collect();
    regular.shuffle(rng);
    let performed = rng.gen_range(0..=NUM_REGULAR);
    let mut values: Vec<i64> = (0..NUM_NODES as i64).collect();
    let mut routes: Vec<Vec<NodeId>> = vec![Vec::new(); NUM_VEHICLES];
    for &node in regular.iter().take(performed) {
        routes[rng.gen_range(0..NUM_VEHICLES)].push(node);
    }
    for (vehicle, route) in routes.iter().enumerate() {
        let mut previous = starts()[vehicle];
        for &node in route {
            values[previous] = node as i64;
            previous = node;
        }
        values[previous] = ends()[vehicle] as i64;
    }
    values
}

/// The delta turning `committed` into `proposed`.
fn delta_between(committed: &[i64], proposed: &[i64]) -> Delta {
    let ends = ends();
    let mut delta = Delta::new();
    for var in 0..NUM_NODES {
        if !ends.contains(&var) && committed[var] != proposed[var] {
            delta.set(var, proposed[var]);
        }
    }
    delta
}

/// Naive O(total length) feasibility of `values`.
fn oracle(values: &[i64], node_capacity: &[Interval]) -> bool {
    for (&start, &end) in starts().iter().zip(ends().iter()) {
        let path_capacity = Interval::new(0, PATH_CAPACITY);
        let mut reach = node_capacity[start].intersect(path_capacity);
        let mut node = start;
        while node != end {
            let next = values[node] as NodeId;
            let t = demand(node, next);
            reach = Interval::new(reach.min + t.min, reach.max + t.max)
                .intersect(path_capacity)
                .intersect(node_capacity[next]);
            if reach.is_empty() {
                return false;
            }
            node = next;
        }
    }
    true
}

fn build(
    min_range_size: usize,
) -> (SharedPathState, DimensionChecker, PathStateFilter, Vec<i64>) {
    let state = Rc::new(RefCell::new(
        PathState::new(NUM_NODES, starts(), ends()).unwrap(),
    ));
    let evaluator: DemandEvaluator = Box::new(demand);
    let checker = DimensionChecker::new(
        state.clone(),
        vec![Interval::new(0, PATH_CAPACITY); NUM_VEHICLES],
        vec![0; NUM_VEHICLES],
        vec![evaluator],
        node_capacities(),
    )
    .unwrap()
    .with_min_range_size(min_range_size);
    let mut path_filter = PathStateFilter::new(state.clone());
    let committed: Vec<i64> = {
        let mut values: Vec<i64> = (0..NUM_NODES as i64).collect();
        for (&start, &end) in starts().iter().zip(ends().iter()) {
            values[start] = end as i64;
        }
        values
    };
    path_filter.synchronize(&Assignment::new(committed.clone()), None);
    (state, checker, path_filter, committed)
}

/// With the range query disabled the checker walks node by node and must
/// agree with the oracle exactly.
#[test]
fn node_by_node_walk_matches_oracle() {
    let mut rng = StdRng::seed_from_u64(31);
    let (state, mut checker, mut path_filter, mut committed) = build(usize::MAX);
    let caps = node_capacities();
    for round in 0..200 {
        let proposed = random_solution(&mut rng);
        let delta = delta_between(&committed, &proposed);
        path_filter.relax(&delta);
        assert!(!state.borrow().is_invalid(), "round {round}");
        // the stitched paths must spell out the proposed routes
        for (vehicle, (&start, &end)) in starts().iter().zip(ends().iter()).enumerate() {
            let mut expected = vec![start];
            let mut node = start;
            while node != end {
                node = proposed[node] as NodeId;
                expected.push(node);
            }
            assert_eq!(
                state.borrow().nodes(vehicle).collect::<Vec<_>>(),
                expected,
                "round {round}"
            );
        }
        let feasible = checker.check();
        assert_eq!(feasible, oracle(&proposed, &caps), "round {round}");
        // commit every third feasible neighbor, drop the rest
        if round % 3 == 0 && feasible {
            path_filter.synchronize(&Assignment::new(proposed.clone()), Some(&delta));
            checker.commit();
            committed = proposed;
        } else {
            path_filter.relax(&Delta::new());
        }
    }
}

/// The range intersection query may only relax the walk: whenever the
/// oracle says feasible, the fast check must accept.
#[test]
fn riq_is_never_stricter_than_oracle() {
    let mut rng = StdRng::seed_from_u64(47);
    let (state, mut checker, mut path_filter, mut committed) = build(3);
    let caps = node_capacities();
    let mut checked_fast_accepts = 0;
    for round in 0..200 {
        let proposed = random_solution(&mut rng);
        let delta = delta_between(&committed, &proposed);
        path_filter.relax(&delta);
        assert!(!state.borrow().is_invalid());
        let fast = checker.check();
        let feasible = oracle(&proposed, &caps);
        if feasible {
            assert!(fast, "fast check rejected a feasible neighbor, round {round}");
            checked_fast_accepts += 1;
        }
        if round % 3 == 0 && fast && feasible {
            path_filter.synchronize(&Assignment::new(proposed.clone()), Some(&delta));
            checker.commit();
            committed = proposed;
        } else {
            path_filter.relax(&Delta::new());
        }
    }
    assert!(checked_fast_accepts > 10, "degenerate test instance");
}
