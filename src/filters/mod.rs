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

//! The concrete filter catalog.
//!
//! This module holds the filter that maintains the shared [`PathState`]
//! ([`PathStateFilter`]), thin filter adapters around the incremental
//! checkers, the specialized constraint filters, and the selector
//! assembling the filters of a cumul dimension from its configuration.
//!
//! Ordering matters in exactly one place: the [`PathStateFilter`] must be
//! registered *before* the filters reading its shared state. It builds
//! the tentative chains first (on relax and on synchronize), the checkers
//! then read them, and the state itself only commits on the path-state
//! filter's next relax, after every checker has updated its own
//! precomputed data. [`make_dimension_filters`] returns the filters in
//! the right order.

use std::collections::{HashMap, HashSet};

use crate::assignment::{Assignment, Delta};
use crate::cumul::{CumulDimension, PathCumulFilter, RouteCumulOptimizer};
use crate::dimension_checker::DimensionChecker;
use crate::energy::PathEnergyCostChecker;
use crate::filter::{FilterPriority, LocalSearchFilter};
use crate::path_filter::BasePathFilter;
use crate::path_state::SharedPathState;
use crate::types::{FilterError, NodeId, PathId};

pub mod active;
pub mod disjunction;
pub mod pickup_delivery;
pub mod route_constraint;
pub mod type_regulations;
pub mod vehicle_var;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The filter owning the shared [`PathState`]: on every relax it
/// decomposes the delta into per-path chain lists (in O(delta·log delta),
/// stitching the committed runs between changed arcs). On synchronize it
/// rebuilds the chains of the chosen neighbor and leaves them tentative,
/// so that the checkers synchronizing after it still see which paths
/// changed; the state commits on this filter's next relax or synchronize.
/// It accepts every neighbor; rejection is the business of the checkers
/// reading the state.
///
/// [`PathState`]: crate::path_state::PathState
#[derive(Debug)]
pub struct PathStateFilter {
    state: SharedPathState,
    synchronized: bool,
    /// The tentative chains describe a chosen neighbor and are committed
    /// at the next relax.
    pending_commit: bool,
}

impl PathStateFilter {
    /// Create the filter owning `state`.
    pub fn new(state: SharedPathState) -> Self {
        Self {
            state,
            synchronized: false,
            pending_commit: false,
        }
    }

    /// Commit the chains of a previously chosen neighbor, once every
    /// dependent checker has seen them.
    fn flush(&mut self) {
        if self.pending_commit {
            self.state.borrow_mut().commit();
            self.pending_commit = false;
        }
    }

    /// Translate `delta` into tentative chains on the shared state. An
    /// unbound variable (LNS) leaves the state committed and untouched; a
    /// successor structure that cannot form valid paths marks the state
    /// invalid.
    fn build_chains(&mut self, delta: &Delta) {
        let mut state = self.state.borrow_mut();
        state.revert();
        if delta.is_empty() || delta.iter().any(|e| e.value.is_none()) {
            return;
        }

        // deduplicate the delta, last value wins
        let mut new_value: HashMap<NodeId, NodeId> = HashMap::with_capacity(delta.len());
        for element in delta.iter() {
            new_value.insert(element.var, element.value.expect("checked above") as NodeId);
        }

        // split the changed variables into new loops and breakpoints, and
        // collect the touched paths
        let mut loops: Vec<NodeId> = Vec::new();
        let mut breakpoints: HashMap<PathId, Vec<(usize, NodeId)>> = HashMap::new();
        let mut touched: Vec<PathId> = Vec::new();
        let mut num_breakpoints = 0usize;
        for (&var, &value) in &new_value {
            match state.path(var) {
                Some(path) => {
                    if !touched.contains(&path) {
                        touched.push(path);
                    }
                    if value == var {
                        loops.push(var);
                    } else {
                        breakpoints
                            .entry(path)
                            .or_default()
                            .push((state.committed_index(var), var));
                        num_breakpoints += 1;
                    }
                }
                // a committed loop: reachable only by a jump
                None if value != var => {
                    num_breakpoints += 1;
                }
                // a loop staying a loop
                None => {}
            }
        }
        for list in breakpoints.values_mut() {
            list.sort_unstable();
        }
        touched.sort_unstable();

        // stitch every touched path from committed runs and delta arcs
        let mut consumed: HashSet<NodeId> = HashSet::with_capacity(num_breakpoints);
        for &path in &touched {
            let mut chains: Vec<(usize, usize)> = Vec::new();
            let mut node = state.start(path);
            let mut complete = false;
            for _ in 0..=num_breakpoints {
                let index = state.committed_index(node);
                match state.path(node) {
                    None => {
                        // an activated former loop: single-node chain
                        let Some(&next) = new_value.get(&node) else {
                            break;
                        };
                        if !consumed.insert(node) {
                            break;
                        }
                        chains.push((index, index + 1));
                        node = next;
                    }
                    Some(committed_path) => {
                        let list = breakpoints.get(&committed_path);
                        let breakpoint = list.and_then(|list| {
                            let i = list.partition_point(|&(bi, _)| bi < index);
                            list.get(i).copied()
                        });
                        match breakpoint {
                            Some((breakpoint_index, breakpoint_var)) => {
                                if !consumed.insert(breakpoint_var) {
                                    break;
                                }
                                chains.push((index, breakpoint_index + 1));
                                node = new_value[&breakpoint_var];
                            }
                            None => {
                                // committed run to the end of the path
                                let end = state.end(committed_path);
                                chains.push((index, state.committed_index(end) + 1));
                                complete = committed_path == path;
                                break;
                            }
                        }
                    }
                }
            }
            if !complete {
                log::debug!("proposed successors do not close path {path}");
                state.set_invalid();
                return;
            }
            state.change_path(path, &chains);
        }
        if consumed.len() != num_breakpoints {
            // a changed arc ended up on no path: a detached cycle
            log::debug!("proposed successors contain a detached cycle");
            state.set_invalid();
            return;
        }
        state.change_loops(&loops);
    }

    /// Rebuild the whole state from a full assignment, one single-node
    /// chain per node.
    fn rebuild_from_assignment(&mut self, assignment: &Assignment) {
        let mut state = self.state.borrow_mut();
        state.revert();
        let num_paths = state.num_paths();
        let num_nodes = state.num_nodes();
        let mut on_path = vec![false; num_nodes];
        for path in 0..num_paths {
            let mut chains = Vec::new();
            let mut node = state.start(path);
            loop {
                let index = state.committed_index(node);
                chains.push((index, index + 1));
                on_path[node] = true;
                if node == state.end(path) {
                    break;
                }
                debug_assert!(chains.len() <= num_nodes, "assignment contains a cycle");
                node = assignment.value(node) as NodeId;
            }
            state.change_path(path, &chains);
        }
        let loops: Vec<NodeId> = (0..num_nodes).filter(|&n| !on_path[n]).collect();
        state.change_loops(&loops);
    }
}

impl LocalSearchFilter for PathStateFilter {
    fn relax(&mut self, delta: &Delta) {
        self.flush();
        self.build_chains(delta);
    }

    fn accept(&mut self, _: &Delta, _: &Delta, _: i64, _: i64) -> bool {
        true
    }

    fn synchronize(&mut self, assignment: &Assignment, delta: Option<&Delta>) {
        self.flush();
        match delta {
            Some(delta)
                if self.synchronized
                    && !delta.is_empty()
                    && delta.iter().all(|e| e.value.is_some()) =>
            {
                self.build_chains(delta);
                if self.state.borrow().is_invalid() {
                    // fall back to the full walk
                    self.rebuild_from_assignment(assignment);
                }
            }
            _ => self.rebuild_from_assignment(assignment),
        }
        self.pending_commit = true;
        self.synchronized = true;
    }
}

/// Adapter running a [`DimensionChecker`] as a local-search filter.
#[derive(Debug)]
pub struct DimensionFeasibilityFilter {
    checker: DimensionChecker,
}

impl DimensionFeasibilityFilter {
    /// Wrap `checker`.
    pub fn new(checker: DimensionChecker) -> Self {
        Self { checker }
    }
}

impl LocalSearchFilter for DimensionFeasibilityFilter {
    fn accept(&mut self, _: &Delta, _: &Delta, _: i64, _: i64) -> bool {
        self.checker.check()
    }

    fn synchronize(&mut self, _: &Assignment, _: Option<&Delta>) {
        self.checker.commit();
    }
}

/// Adapter running a [`PathEnergyCostChecker`] as a local-search filter.
#[derive(Debug)]
pub struct PathEnergyCostFilter {
    checker: PathEnergyCostChecker,
}

impl PathEnergyCostFilter {
    /// Wrap `checker`.
    pub fn new(checker: PathEnergyCostChecker) -> Self {
        Self { checker }
    }
}

impl LocalSearchFilter for PathEnergyCostFilter {
    fn accept(&mut self, _: &Delta, _: &Delta, _: i64, objective_max: i64) -> bool {
        self.checker.check(objective_max)
    }

    fn synchronize(&mut self, _: &Assignment, _: Option<&Delta>) {
        self.checker.commit();
    }

    fn accepted_objective_value(&self) -> i64 {
        self.checker.accepted_cost()
    }

    fn synchronized_objective_value(&self) -> i64 {
        self.checker.committed_cost()
    }
}

/// Configuration of [`make_dimension_filters`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct DimensionFilterOptions {
    /// Disable the LP/MIP optimizers entirely.
    pub disable_scheduling: bool,
    /// The dimension carries cumul costs (soft bounds, span costs, …).
    pub has_cumul_cost: bool,
    /// The dimension carries hard per-path constraints beyond capacities.
    pub has_path_cumul_constraint: bool,
    /// The dimension carries node precedences.
    pub has_precedences: bool,
    /// The dimension has resource groups (handled by an external filter).
    pub has_resource_groups: bool,
    /// Whether the dimension's costs count towards the objective.
    pub filter_objective_cost: bool,
    /// Prefer the lightweight chain-cumul feasibility filter when the
    /// dimension is cost-free.
    pub use_chain_cumul_filter: bool,
}

/// Assemble the filters of one cumul dimension.
///
/// A cost-free dimension with `use_chain_cumul_filter` gets the
/// chain-based feasibility filter; anything else gets the full
/// [`PathCumulFilter`], with the optimizers attached unless
/// `disable_scheduling` is set. The returned filters are ordered so that
/// the [`PathStateFilter`] precedes its consumers.
#[allow(clippy::too_many_arguments)]
pub fn make_dimension_filters(
    num_nodes: usize,
    starts: Vec<NodeId>,
    ends: Vec<NodeId>,
    dim: CumulDimension,
    state: Option<SharedPathState>,
    chain_checker: Option<DimensionChecker>,
    lp_optimizer: Option<Box<dyn RouteCumulOptimizer>>,
    mip_optimizer: Option<Box<dyn RouteCumulOptimizer>>,
    options: &DimensionFilterOptions,
) -> Result<Vec<Box<dyn LocalSearchFilter>>, FilterError> {
    let mut filters: Vec<Box<dyn LocalSearchFilter>> = Vec::new();
    if options.has_resource_groups {
        log::debug!(
            "dimension {}: resource groups are filtered externally (priority {:?})",
            dim.name,
            FilterPriority::ResourceAssignment
        );
    }
    if let Some(state) = state {
        filters.push(Box::new(PathStateFilter::new(state)));
    }
    let needs_filtering = options.has_cumul_cost
        || options.has_path_cumul_constraint
        || options.has_precedences;
    if !needs_filtering {
        return Ok(filters);
    }
    let chain_filter_applies = options.use_chain_cumul_filter
        && !options.has_cumul_cost
        && !options.has_precedences;
    if chain_filter_applies {
        if let Some(checker) = chain_checker {
            filters.push(Box::new(DimensionFeasibilityFilter::new(checker)));
        }
    } else {
        let mut logic = PathCumulFilter::new(dim, options.filter_objective_cost)?;
        if !options.disable_scheduling {
            if let Some(lp) = lp_optimizer {
                logic = logic.with_lp_optimizer(lp);
            }
            if let Some(mip) = mip_optimizer {
                logic = logic.with_mip_optimizer(mip);
            }
        }
        filters.push(Box::new(BasePathFilter::new(num_nodes, starts, ends, logic)));
    }
    Ok(filters)
}
