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

//! Behavioral properties of the filter stack: synchronization idempotence,
//! revert cleanliness, chain-window correctness and cost monotonicity.

use std::cell::RefCell;
use std::rc::Rc;

use pretty_assertions_sorted::assert_eq;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::assignment::{Assignment, Delta};
use crate::filter::LocalSearchFilter;
use crate::filters::disjunction::{
    Disjunction, NodeDisjunctionFilter, PenaltyCostBehavior,
};
use crate::filters::PathStateFilter;
use crate::path_filter::{BasePathFilter, PathContext, PathFilterLogic};
use crate::path_state::PathState;
use crate::types::NodeId;

/// Synchronizing the same assignment twice must not change any observable
/// state.
#[test]
fn synchronize_is_idempotent() {
    let state = Rc::new(RefCell::new(PathState::new(8, vec![4, 6], vec![5, 7]).unwrap()));
    let mut filter = PathStateFilter::new(state.clone());
    let mut values: Vec<i64> = (0..8).collect();
    values[4] = 0;
    values[0] = 1;
    values[1] = 5;
    values[6] = 7;
    let assignment = Assignment::new(values);
    filter.synchronize(&assignment, None);
    let snapshot: Vec<Vec<NodeId>> = (0..2).map(|p| state.borrow().nodes(p).collect()).collect();
    filter.synchronize(&assignment, None);
    let snapshot_after: Vec<Vec<NodeId>> =
        (0..2).map(|p| state.borrow().nodes(p).collect()).collect();
    assert_eq!(snapshot, snapshot_after);
    // a full resynchronization may relocate nodes, but the committed
    // indices must stay a consistent bijection
    for node in 0..8 {
        let index = state.borrow().committed_index(node);
        assert_eq!(state.borrow().committed_node(index), node);
    }
}

/// An evaluated-but-rejected neighbor leaves no trace visible to the next
/// neighbor.
#[test]
fn abandoned_neighbors_leave_no_trace() {
    let state = Rc::new(RefCell::new(PathState::new(8, vec![4, 6], vec![5, 7]).unwrap()));
    let mut filter = PathStateFilter::new(state.clone());
    let mut values: Vec<i64> = (0..8).collect();
    values[4] = 0;
    values[0] = 1;
    values[1] = 5;
    values[6] = 7;
    filter.synchronize(&Assignment::new(values), None);
    // first neighbor: move node 2 in
    let mut first = Delta::new();
    first.set(1, 2).set(2, 5);
    filter.relax(&first);
    assert_eq!(state.borrow().nodes(0).collect::<Vec<_>>(), vec![4, 0, 1, 2, 5]);
    // second neighbor: an unrelated change; the first must be gone
    let mut second = Delta::new();
    second.set(6, 3).set(3, 7);
    filter.relax(&second);
    assert_eq!(state.borrow().nodes(0).collect::<Vec<_>>(), vec![4, 0, 1, 5]);
    assert_eq!(state.borrow().nodes(1).collect::<Vec<_>>(), vec![6, 3, 7]);
    let changed: Vec<_> = state.borrow().changed_paths().collect();
    assert_eq!(changed, vec![1]);
}

/// Records every chain window along with the rank evidence.
#[derive(Debug, Default)]
struct WindowRecorder {
    windows: Vec<(NodeId, usize, usize)>,
}

impl PathFilterLogic for WindowRecorder {
    fn initialize_accept_path(&mut self, _: &PathContext) -> bool {
        self.windows.clear();
        true
    }

    fn accept_path(
        &mut self,
        ctx: &PathContext,
        path_start: NodeId,
        chain_start: NodeId,
        chain_end: NodeId,
    ) -> bool {
        // both window nodes are on the path, in rank order
        assert_eq!(ctx.path_start_of(chain_start), Some(path_start));
        assert_eq!(ctx.path_start_of(chain_end), Some(path_start));
        let start_rank = ctx.rank(chain_start).unwrap();
        let end_rank = ctx.rank(chain_end).unwrap();
        assert!(start_rank <= end_rank);
        self.windows.push((path_start, start_rank, end_rank));
        true
    }
}

/// The chain window of every touched path covers the ranks of all touched
/// nodes of that path; a touched start or end pins the window to it.
#[test]
fn chain_windows_cover_all_touched_nodes() {
    const REGULAR: usize = 10;
    const VEHICLES: usize = 2;
    const NODES: usize = REGULAR + 2 * VEHICLES;
    let starts: Vec<NodeId> = vec![REGULAR, REGULAR + 2];
    let ends: Vec<NodeId> = vec![REGULAR + 1, REGULAR + 3];
    let mut rng = StdRng::seed_from_u64(7);

    for _ in 0..50 {
        // random committed solution with every node performed
        let mut nodes: Vec<NodeId> = (0..REGULAR).collect();
        nodes.shuffle(&mut rng);
        let split = rng.gen_range(0..=REGULAR);
        let mut values: Vec<i64> = (0..NODES as i64).collect();
        let mut rank_of = vec![0usize; NODES];
        for (vehicle, route) in [&nodes[..split], &nodes[split..]].iter().enumerate() {
            let mut previous = starts[vehicle];
            rank_of[previous] = 0;
            for (i, &node) in route.iter().enumerate() {
                values[previous] = node as i64;
                rank_of[node] = i + 1;
                previous = node;
            }
            values[previous] = ends[vehicle] as i64;
            rank_of[ends[vehicle]] = route.len() + 1;
        }
        let mut filter =
            BasePathFilter::new(NODES, starts.clone(), ends.clone(), WindowRecorder::default());
        filter.synchronize(&Assignment::new(values.clone()), None);

        // a random small delta (not necessarily a valid move: the window
        // computation must not care)
        let mut delta = Delta::new();
        let mut touched: Vec<(NodeId, NodeId)> = Vec::new();
        for _ in 0..rng.gen_range(1..4) {
            let var = rng.gen_range(0..REGULAR);
            let value = rng.gen_range(0..NODES);
            delta.set(var, value as i64);
            touched.push((var, value));
        }
        assert!(filter.accept(&delta, &Delta::new(), 0, i64::MAX));

        // expected per-path min/max rank over touched nodes
        let path_of = |node: NodeId| -> usize {
            let mut on_first = std::iter::successors(Some(starts[0]), |&n| {
                (n != ends[0]).then(|| values[n] as NodeId)
            });
            usize::from(!on_first.any(|n| n == node))
        };
        for (vehicle, &start) in starts.iter().enumerate() {
            let ranks: Vec<usize> = touched
                .iter()
                .flat_map(|&(var, value)| [var, value])
                .filter(|&n| path_of(n) == vehicle)
                .map(|n| rank_of[n])
                .collect();
            let window = filter
                .logic()
                .windows
                .iter()
                .find(|&&(s, _, _)| s == start);
            match (ranks.is_empty(), window) {
                (true, None) => {}
                (false, Some(&(_, lo, hi))) => {
                    assert_eq!(lo, ranks.iter().copied().min().unwrap());
                    assert_eq!(hi, ranks.iter().copied().max().unwrap());
                }
                (empty, window) => {
                    panic!("window/touch mismatch: empty={empty}, window={window:?}")
                }
            }
        }
    }
}

/// Increasing the number of inactive nodes never decreases the penalty.
#[test]
fn disjunction_penalty_is_monotone() {
    for behavior in [
        PenaltyCostBehavior::PenalizePerViolation,
        PenaltyCostBehavior::PenalizeOnce,
    ] {
        let mut previous = 0;
        for inactive in 0..=4 {
            let mut filter = NodeDisjunctionFilter::new(
                6,
                vec![Disjunction {
                    nodes: vec![0, 1, 2, 3],
                    max_cardinality: 4,
                    penalty: 5,
                }],
                behavior,
            )
            .unwrap();
            // start 4 -> end 5; the first `4 - inactive` nodes are active
            let mut values: Vec<i64> = (0..6).collect();
            let mut previous_node = 4usize;
            for node in 0..4 - inactive {
                values[previous_node] = node as i64;
                previous_node = node;
            }
            values[previous_node] = 5;
            filter.synchronize(&Assignment::new(values), None);
            let cost = filter.synchronized_objective_value();
            assert!(cost >= previous, "behavior {behavior:?}, inactive {inactive}");
            previous = cost;
        }
    }
}
