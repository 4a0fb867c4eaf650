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

//! The reusable skeleton of every path-based filter.
//!
//! [`BasePathFilter`] turns a delta into the minimal set of touched paths
//! and, per path, a *chain window*: the contiguous subsequence (given by
//! its lowest- and highest-ranked touched nodes) containing every touched
//! arc. Concrete filters implement [`PathFilterLogic`] and only look at
//! those windows, which keeps the per-neighbor work proportional to the
//! delta instead of the route lengths.

use crate::assignment::{Assignment, Delta};
use crate::collections::{CommittableVector, SparseBitset};
use crate::filter::{FilterPriority, LocalSearchFilter};
use crate::types::{NodeId, PathId};

/// Sentinel for "no tentative successor recorded".
const UNASSIGNED: i64 = -1;

/// Read-only view of the skeleton's per-neighbor state, handed to every
/// [`PathFilterLogic`] callback.
#[derive(Debug)]
pub struct PathContext {
    num_nodes: usize,
    starts: Vec<NodeId>,
    ends: Vec<NodeId>,
    is_end: Vec<bool>,
    path_of_start: Vec<Option<PathId>>,
    /// Committed successor values, `UNASSIGNED` before the first
    /// synchronization.
    values: Vec<i64>,
    /// Tentative successors of the delta under evaluation.
    new_nexts: CommittableVector<i64>,
    ranks: Vec<Option<usize>>,
    node_path_starts: Vec<Option<NodeId>>,
    touched_paths: SparseBitset,
    /// Per touched path: lowest- and highest-ranked touched node.
    window: Vec<(NodeId, NodeId)>,
    lns_detected: bool,
    synchronized: bool,
}

impl PathContext {
    fn new(num_nodes: usize, starts: Vec<NodeId>, ends: Vec<NodeId>) -> Self {
        let num_paths = starts.len();
        let mut is_end = vec![false; num_nodes];
        for &end in &ends {
            is_end[end] = true;
        }
        let mut path_of_start = vec![None; num_nodes];
        for (path, &start) in starts.iter().enumerate() {
            path_of_start[start] = Some(path);
        }
        Self {
            num_nodes,
            starts,
            ends,
            is_end,
            path_of_start,
            values: vec![UNASSIGNED; num_nodes],
            new_nexts: CommittableVector::new(UNASSIGNED, num_nodes),
            ranks: vec![None; num_nodes],
            node_path_starts: vec![None; num_nodes],
            touched_paths: SparseBitset::with_capacity(num_paths),
            window: vec![(0, 0); num_paths],
            lns_detected: false,
            synchronized: false,
        }
    }

    /// The number of nodes, starts and ends included.
    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// The number of paths.
    pub fn num_paths(&self) -> usize {
        self.starts.len()
    }

    /// The start node of `path`.
    pub fn start_of_path(&self, path: PathId) -> NodeId {
        self.starts[path]
    }

    /// The end node of `path`.
    pub fn end_of_path(&self, path: PathId) -> NodeId {
        self.ends[path]
    }

    /// The path starting at `start`, if any.
    pub fn path_of_start(&self, start: NodeId) -> Option<PathId> {
        self.path_of_start[start]
    }

    /// Whether `node` is the end of some path.
    pub fn is_end(&self, node: NodeId) -> bool {
        self.is_end[node]
    }

    /// The successor of `node` in the neighbor under evaluation: the delta
    /// value if the delta touches `node`, the committed value otherwise.
    /// `None` for path ends.
    pub fn get_next(&self, node: NodeId) -> Option<NodeId> {
        if self.is_end[node] {
            return None;
        }
        match self.new_nexts.get(node) {
            UNASSIGNED => Some(self.values[node] as NodeId),
            next => Some(next as NodeId),
        }
    }

    /// The committed successor of `node`. `None` for path ends.
    pub fn value(&self, node: NodeId) -> Option<NodeId> {
        if self.is_end[node] {
            None
        } else {
            Some(self.values[node] as NodeId)
        }
    }

    /// The rank of `node` on its synchronized path (0 for starts), `None`
    /// for unperformed nodes.
    pub fn rank(&self, node: NodeId) -> Option<usize> {
        self.ranks[node]
    }

    /// The start of the synchronized path containing `node`, `None` for
    /// unperformed nodes.
    pub fn path_start_of(&self, node: NodeId) -> Option<NodeId> {
        self.node_path_starts[node]
    }

    /// Whether the delta under evaluation left a variable unbound.
    pub fn lns_detected(&self) -> bool {
        self.lns_detected
    }

    /// Reset the per-delta scratch.
    fn reset_delta(&mut self) {
        self.new_nexts.revert();
        self.touched_paths.clear_all();
        self.lns_detected = false;
    }

    /// Mark the path containing `node` as touched and widen its chain
    /// window to include `node`.
    fn touch(&mut self, node: NodeId) {
        let Some(start) = self.node_path_starts[node] else {
            return;
        };
        let path = self.path_of_start[start].expect("path starts map to paths");
        if !self.touched_paths.contains(path) {
            self.touched_paths.set(path);
            self.window[path] = (node, node);
        } else {
            let (chain_start, chain_end) = self.window[path];
            let rank = self.ranks[node].expect("nodes on a path have a rank");
            if rank < self.ranks[chain_start].expect("nodes on a path have a rank") {
                self.window[path].0 = node;
            }
            if rank > self.ranks[chain_end].expect("nodes on a path have a rank") {
                self.window[path].1 = node;
            }
        }
    }

    /// Walk `path` in the committed values, assigning ranks and path
    /// starts.
    fn walk_path(&mut self, path: PathId) {
        let start = self.starts[path];
        let mut node = start;
        let mut rank = 0;
        loop {
            self.ranks[node] = Some(rank);
            self.node_path_starts[node] = Some(start);
            if self.is_end[node] {
                break;
            }
            debug_assert!(rank <= self.num_nodes, "committed path contains a cycle");
            node = self.values[node] as NodeId;
            rank += 1;
        }
    }
}

/// The capability set of a concrete path-based filter. All callbacks except
/// [`accept_path`](Self::accept_path) default to a no-op.
pub trait PathFilterLogic: std::fmt::Debug {
    /// Called while synchronizing, once per (re)walked path.
    fn on_synchronize_path_from_start(&mut self, ctx: &PathContext, start: NodeId) {
        let _ = (ctx, start);
    }

    /// Called before any path is rewalked during synchronization.
    fn on_before_synchronize_paths(&mut self, ctx: &PathContext) {
        let _ = ctx;
    }

    /// Called after all paths have been rewalked during synchronization.
    fn on_after_synchronize_paths(&mut self, ctx: &PathContext) {
        let _ = ctx;
    }

    /// Called once per `accept`, before any path is examined. Returning
    /// `false` rejects the neighbor.
    fn initialize_accept_path(&mut self, ctx: &PathContext) -> bool {
        let _ = ctx;
        true
    }

    /// Examine one touched path. `chain_start` and `chain_end` delimit the
    /// chain window: every touched node of the path lies between their
    /// ranks, inclusive.
    fn accept_path(
        &mut self,
        ctx: &PathContext,
        path_start: NodeId,
        chain_start: NodeId,
        chain_end: NodeId,
    ) -> bool;

    /// Called once per `accept` after every touched path was accepted.
    fn finalize_accept_path(&mut self, ctx: &PathContext, objective_min: i64, objective_max: i64) -> bool {
        let _ = (ctx, objective_min, objective_max);
        true
    }

    /// This filter's objective contribution for the last accepted neighbor.
    fn accepted_objective_value(&self) -> i64 {
        0
    }

    /// This filter's objective contribution for the committed solution.
    fn synchronized_objective_value(&self) -> i64 {
        0
    }

    /// Evaluation priority of the assembled filter.
    fn priority(&self) -> FilterPriority {
        FilterPriority::Path
    }
}

/// A path-based filter: the skeleton state plus the concrete logic.
#[derive(Debug)]
pub struct BasePathFilter<L: PathFilterLogic> {
    ctx: PathContext,
    logic: L,
}

impl<L: PathFilterLogic> BasePathFilter<L> {
    /// Create a filter over `num_nodes` nodes and the paths given by the
    /// parallel `starts`/`ends` vectors.
    pub fn new(num_nodes: usize, starts: Vec<NodeId>, ends: Vec<NodeId>, logic: L) -> Self {
        debug_assert_eq!(starts.len(), ends.len());
        Self {
            ctx: PathContext::new(num_nodes, starts, ends),
            logic,
        }
    }

    /// Access the concrete logic (e.g. to read filter-specific results).
    pub fn logic(&self) -> &L {
        &self.logic
    }
}

impl<L: PathFilterLogic> LocalSearchFilter for BasePathFilter<L> {
    fn accept(
        &mut self,
        delta: &Delta,
        _deltadelta: &Delta,
        objective_min: i64,
        objective_max: i64,
    ) -> bool {
        let Self { ctx, logic } = self;
        ctx.reset_delta();
        debug_assert!(ctx.synchronized, "accept called before synchronize");
        for element in delta.iter() {
            let Some(value) = element.value else {
                // large-neighborhood search: accept with cost 0
                ctx.lns_detected = true;
                return true;
            };
            ctx.new_nexts.set(element.var, value);
            ctx.touch(element.var);
            ctx.touch(value as NodeId);
        }
        if !logic.initialize_accept_path(ctx) {
            return false;
        }
        let touched: Vec<PathId> = ctx.touched_paths.iter().collect();
        for path in touched {
            let (chain_start, chain_end) = ctx.window[path];
            if !logic.accept_path(ctx, ctx.starts[path], chain_start, chain_end) {
                return false;
            }
        }
        logic.finalize_accept_path(ctx, objective_min, objective_max)
    }

    fn synchronize(&mut self, assignment: &Assignment, delta: Option<&Delta>) {
        let Self { ctx, logic } = self;
        ctx.reset_delta();
        logic.on_before_synchronize_paths(ctx);
        let incremental = ctx.synchronized
            && delta.map_or(false, |d| !d.is_empty() && d.iter().all(|e| e.value.is_some()));
        if incremental {
            let delta = delta.expect("incremental synchronization requires a delta");
            // collect the touched paths against the old ranks, then apply
            ctx.touched_paths.clear_all();
            for element in delta.iter() {
                ctx.touch(element.var);
                ctx.touch(element.value.expect("checked above") as NodeId);
            }
            for element in delta.iter() {
                let value = element.value.expect("checked above");
                ctx.values[element.var] = value;
                if value as NodeId == element.var {
                    // the node became a loop
                    ctx.ranks[element.var] = None;
                    ctx.node_path_starts[element.var] = None;
                }
            }
            let touched: Vec<PathId> = ctx.touched_paths.iter().collect();
            for path in touched {
                ctx.walk_path(path);
                logic.on_synchronize_path_from_start(ctx, ctx.starts[path]);
            }
            ctx.touched_paths.clear_all();
        } else {
            for var in 0..assignment.len().min(ctx.num_nodes) {
                ctx.values[var] = assignment.value(var);
            }
            ctx.ranks.iter_mut().for_each(|r| *r = None);
            ctx.node_path_starts.iter_mut().for_each(|s| *s = None);
            for path in 0..ctx.num_paths() {
                ctx.walk_path(path);
                logic.on_synchronize_path_from_start(ctx, ctx.starts[path]);
            }
        }
        ctx.synchronized = true;
        logic.on_after_synchronize_paths(ctx);
    }

    fn accepted_objective_value(&self) -> i64 {
        if self.ctx.lns_detected {
            0
        } else {
            self.logic.accepted_objective_value()
        }
    }

    fn synchronized_objective_value(&self) -> i64 {
        self.logic.synchronized_objective_value()
    }

    fn priority(&self) -> FilterPriority {
        self.logic.priority()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// Records every `accept_path` call.
    #[derive(Debug, Default)]
    struct Recorder {
        calls: Vec<(NodeId, NodeId, NodeId)>,
        synchronized_starts: Vec<NodeId>,
    }

    impl PathFilterLogic for Recorder {
        fn on_synchronize_path_from_start(&mut self, _: &PathContext, start: NodeId) {
            self.synchronized_starts.push(start);
        }

        fn initialize_accept_path(&mut self, _: &PathContext) -> bool {
            self.calls.clear();
            true
        }

        fn accept_path(
            &mut self,
            _: &PathContext,
            path_start: NodeId,
            chain_start: NodeId,
            chain_end: NodeId,
        ) -> bool {
            self.calls.push((path_start, chain_start, chain_end));
            true
        }
    }

    /// Nodes 0..=3 regular, starts 4 and 6, ends 5 and 7.
    /// Committed: 4 -> 0 -> 1 -> 5 and 6 -> 2 -> 3 -> 7.
    fn filter() -> BasePathFilter<Recorder> {
        let mut f = BasePathFilter::new(8, vec![4, 6], vec![5, 7], Recorder::default());
        let mut values = vec![0i64; 8];
        values[4] = 0;
        values[0] = 1;
        values[1] = 5;
        values[6] = 2;
        values[2] = 3;
        values[3] = 7;
        f.synchronize(&Assignment::new(values), None);
        f
    }

    #[test]
    fn synchronize_assigns_ranks() {
        let f = filter();
        assert_eq!(f.ctx.rank(4), Some(0));
        assert_eq!(f.ctx.rank(0), Some(1));
        assert_eq!(f.ctx.rank(1), Some(2));
        assert_eq!(f.ctx.rank(5), Some(3));
        assert_eq!(f.ctx.path_start_of(3), Some(6));
        assert_eq!(f.logic().synchronized_starts, vec![4, 6]);
    }

    #[test]
    fn windows_cover_touched_nodes() {
        let mut f = filter();
        // move node 2 between 0 and 1
        let mut delta = Delta::new();
        delta.set(0, 2).set(2, 1).set(6, 3);
        assert!(f.accept(&delta, &Delta::new(), 0, i64::MAX));
        let mut calls = f.logic().calls.clone();
        calls.sort();
        // path 0: touched nodes 0 (rank 1) and 1 (rank 2)
        // path 1: touched nodes 6 (rank 0), 2 (rank 1), 3 (rank 2)
        assert_eq!(calls, vec![(4, 0, 1), (6, 6, 3)]);
    }

    #[test]
    fn unbound_variable_triggers_lns() {
        let mut f = filter();
        let mut delta = Delta::new();
        delta.set(0, 2).set_unbound(2);
        assert!(f.accept(&delta, &Delta::new(), 0, 0));
        assert_eq!(f.accepted_objective_value(), 0);
        assert!(f.ctx.lns_detected());
    }

    #[test]
    fn get_next_prefers_delta_values() {
        let mut f = filter();
        let mut delta = Delta::new();
        delta.set(0, 2);
        assert!(f.accept(&delta, &Delta::new(), 0, i64::MAX));
        assert_eq!(f.ctx.get_next(0), Some(2));
        assert_eq!(f.ctx.get_next(1), Some(5));
        assert_eq!(f.ctx.get_next(5), None);
        // the next accept resets the scratch
        assert!(f.accept(&Delta::new(), &Delta::new(), 0, i64::MAX));
        assert_eq!(f.ctx.get_next(0), Some(1));
    }

    #[test]
    fn incremental_synchronize_rewalks_touched_paths_only() {
        let mut f = filter();
        // swap node 2 over to path 0
        let mut delta = Delta::new();
        delta.set(0, 2).set(2, 1).set(6, 3);
        assert!(f.accept(&delta, &Delta::new(), 0, i64::MAX));
        let mut values = vec![0i64; 8];
        values[4] = 0;
        values[0] = 2;
        values[2] = 1;
        values[1] = 5;
        values[6] = 3;
        values[3] = 7;
        f.logic.synchronized_starts.clear();
        f.synchronize(&Assignment::new(values), Some(&delta));
        assert_eq!(f.logic().synchronized_starts, vec![4, 6]);
        assert_eq!(f.ctx.rank(2), Some(2));
        assert_eq!(f.ctx.path_start_of(2), Some(4));
        assert_eq!(f.ctx.rank(3), Some(1));
    }

    #[test]
    fn deactivated_nodes_lose_their_rank() {
        let mut f = filter();
        // drop node 1 from path 0
        let mut delta = Delta::new();
        delta.set(0, 5).deactivate(1);
        assert!(f.accept(&delta, &Delta::new(), 0, i64::MAX));
        let mut values = vec![0i64; 8];
        values[4] = 0;
        values[0] = 5;
        values[1] = 1;
        values[6] = 2;
        values[2] = 3;
        values[3] = 7;
        f.synchronize(&Assignment::new(values), Some(&delta));
        assert_eq!(f.ctx.rank(1), None);
        assert_eq!(f.ctx.path_start_of(1), None);
        assert_eq!(f.ctx.rank(5), Some(2));
    }
}
