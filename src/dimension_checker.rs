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

//! Incremental feasibility of one additive dimension.
//!
//! For every committed path the checker precomputes prefix transit sums and
//! a log-layered table of window summaries (a *range intersection query*).
//! When a neighbor reuses a chain of the committed path verbatim, the whole
//! chain is traversed in O(log chain length) by combining two overlapping
//! windows; otherwise the walk falls back to cached per-arc demands or to
//! the evaluator. The overall cost of [`check`](DimensionChecker::check) is
//! proportional to the number and length of *changed* chains, never to the
//! length of the untouched parts of a path.
//!
//! The window combination is conservative in exactly one direction: it can
//! only over-approximate the set of reachable cumul values, so an empty
//! result proves infeasibility while a non-empty result may still be
//! rejected by an exact propagator downstream. With the `strong-checks`
//! feature, every fast-path traversal is verified against the plain walk.

use itertools::Itertools;

use crate::interval::{ExtendedInterval, Interval};
use crate::path_state::{PathState, SharedPathState};
use crate::types::{ClassId, FilterError, NodeId, PathId};

/// Evaluator of the demand (transit interval) of one arc.
pub type DemandEvaluator = Box<dyn Fn(NodeId, NodeId) -> Interval>;

/// Chains at least this long are traversed through the range intersection
/// query, shorter ones node by node.
pub const DEFAULT_MIN_RANGE_SIZE_FOR_RIQ: usize = 4;

/// Summary of a window of consecutive committed nodes.
#[derive(Clone, Copy, Debug, Default)]
struct RiqNode {
    /// Cumul values at the window's first node compatible with all node
    /// capacities of the window, translated along the prefix transits.
    cumuls_to_fst: ExtendedInterval,
    /// Cumul values reachable at the window's last node.
    cumuls_to_lst: ExtendedInterval,
    /// Intersection of all node capacities normalized by their prefix
    /// transit sum (capacity − tsum, componentwise).
    tightest_tsum: ExtendedInterval,
    /// Prefix transit sum at the window's first node.
    tsum_at_fst: ExtendedInterval,
    /// Prefix transit sum at the window's last node.
    tsum_at_lst: ExtendedInterval,
}

/// Combine the summary of a *forward* window `f` with the summary of the
/// adjacent-or-overlapping *last* window `l` (both from the same path, `f`
/// starting first and `l` ending last).
fn merge(f: &RiqNode, l: &RiqNode) -> RiqNode {
    let d_fst = ExtendedInterval::delta(f.tsum_at_fst, l.tsum_at_fst);
    let d_lst = ExtendedInterval::delta(f.tsum_at_lst, l.tsum_at_lst);
    RiqNode {
        cumuls_to_fst: f
            .cumuls_to_fst
            .intersect(l.cumuls_to_fst.sum(d_fst.negated())),
        cumuls_to_lst: l.cumuls_to_lst.intersect(f.cumuls_to_lst.sum(d_lst)),
        tightest_tsum: f.tightest_tsum.intersect(l.tightest_tsum),
        tsum_at_fst: f.tsum_at_fst,
        tsum_at_lst: l.tsum_at_lst,
    }
}

/// Position of the most significant set bit.
fn msb(n: usize) -> usize {
    usize::BITS as usize - 1 - n.leading_zeros() as usize
}

/// Incremental feasibility checker for one additive dimension over a shared
/// [`PathState`].
pub struct DimensionChecker {
    state: SharedPathState,
    path_capacity: Vec<Interval>,
    path_class: Vec<ClassId>,
    demand: Vec<DemandEvaluator>,
    node_capacity: Vec<Interval>,
    min_range_size_for_riq: usize,
    /// Layer-0 position of each node, as of the last commit.
    index: Vec<usize>,
    /// `riq[layer][position]`; layer `l` windows span `2^l` nodes. All
    /// layers are kept index-aligned with layer 0.
    riq: Vec<Vec<RiqNode>>,
    /// Demand from the node at layer-0 position `i` to its committed
    /// successor (unused for the last node of a path).
    cached_demand: Vec<ExtendedInterval>,
}

impl std::fmt::Debug for DimensionChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DimensionChecker")
            .field("path_capacity", &self.path_capacity)
            .field("path_class", &self.path_class)
            .field("min_range_size_for_riq", &self.min_range_size_for_riq)
            .field("layer0_size", &self.riq[0].len())
            .finish()
    }
}

impl DimensionChecker {
    /// Create a checker. `path_capacity` and `path_class` are per path,
    /// `demand` per class, `node_capacity` per node. The committed state of
    /// `state` is precomputed immediately.
    pub fn new(
        state: SharedPathState,
        path_capacity: Vec<Interval>,
        path_class: Vec<ClassId>,
        demand: Vec<DemandEvaluator>,
        node_capacity: Vec<Interval>,
    ) -> Result<Self, FilterError> {
        let (num_nodes, num_paths) = {
            let state = state.borrow();
            (state.num_nodes(), state.num_paths())
        };
        if path_capacity.len() != num_paths {
            return Err(FilterError::LengthMismatch {
                what: "path capacities",
                expected: num_paths,
                got: path_capacity.len(),
            });
        }
        if path_class.len() != num_paths {
            return Err(FilterError::LengthMismatch {
                what: "path classes",
                expected: num_paths,
                got: path_class.len(),
            });
        }
        if node_capacity.len() != num_nodes {
            return Err(FilterError::LengthMismatch {
                what: "node capacities",
                expected: num_nodes,
                got: node_capacity.len(),
            });
        }
        if let Some(&class) = path_class.iter().find(|&&c| c >= demand.len()) {
            return Err(FilterError::UnknownClass(class, demand.len()));
        }
        let mut checker = Self {
            state,
            path_capacity,
            path_class,
            demand,
            node_capacity,
            min_range_size_for_riq: DEFAULT_MIN_RANGE_SIZE_FOR_RIQ,
            index: vec![0; num_nodes],
            riq: vec![Vec::new()],
            cached_demand: Vec::new(),
        };
        checker.rebuild_full();
        Ok(checker)
    }

    /// Override the chain length above which the range intersection query
    /// is used.
    pub fn with_min_range_size(mut self, min_range_size: usize) -> Self {
        self.min_range_size_for_riq = min_range_size.max(2);
        self
    }

    /// Whether the changed paths of the shared state admit a feasible
    /// cumul sequence for this dimension. Accepts unconditionally while the
    /// state is invalid.
    pub fn check(&self) -> bool {
        let state = self.state.borrow();
        if state.is_invalid() {
            return true;
        }
        let result = state.changed_paths().all(|path| self.check_path(&state, path));
        result
    }

    /// Update the precomputed data to the current (tentative) paths. Must
    /// be called once per synchronization, before the shared state itself
    /// commits.
    pub fn commit(&mut self) {
        let appended: usize = {
            let state = self.state.borrow();
            state
                .changed_paths()
                .map(|p| state.nodes(p).count())
                .sum()
        };
        if self.riq[0].len() + appended > self.max_riq_layer_size() {
            log::trace!("dimension checker: full rebuild");
            self.rebuild_full();
        } else {
            log::trace!("dimension checker: incremental commit of {appended} nodes");
            let changed: Vec<PathId> = self.state.borrow().changed_paths().collect();
            for path in changed {
                self.append_path(path);
            }
        }
    }

    /// Size above which `commit` rebuilds the table from scratch.
    fn max_riq_layer_size(&self) -> usize {
        16.max(4 * self.index.len())
    }

    fn rebuild_full(&mut self) {
        self.riq = vec![Vec::new()];
        self.cached_demand.clear();
        let num_paths = self.state.borrow().num_paths();
        for path in 0..num_paths {
            self.append_path(path);
        }
    }

    /// Append the current node sequence of `path` to the table and build
    /// its upper layers.
    fn append_path(&mut self, path: PathId) {
        let nodes: Vec<NodeId> = self.state.borrow().nodes(path).collect();
        let base = self.riq[0].len();
        let class = self.path_class[path];
        let path_capacity = self.path_capacity[path];
        let mut tsum = ExtendedInterval::singleton(0);
        for (i, &node) in nodes.iter().enumerate() {
            if i > 0 {
                let transit = ExtendedInterval::from((self.demand[class])(nodes[i - 1], node));
                self.cached_demand[base + i - 1] = transit;
                tsum = tsum.sum(transit);
            }
            let capacity =
                ExtendedInterval::from(self.node_capacity[node].intersect(path_capacity));
            self.index[node] = base + i;
            self.riq[0].push(RiqNode {
                cumuls_to_fst: capacity,
                cumuls_to_lst: capacity,
                tightest_tsum: ExtendedInterval::delta(tsum, capacity),
                tsum_at_fst: tsum,
                tsum_at_lst: tsum,
            });
            self.cached_demand.push(ExtendedInterval::default());
        }
        // build the upper layers, index-aligned with layer 0
        let len = nodes.len();
        let max_layer = if len < 2 { 0 } else { msb(len) };
        while self.riq.len() <= max_layer {
            self.riq.push(Vec::new());
        }
        for layer in 1..self.riq.len() {
            self.riq[layer].resize(base, RiqNode::default());
        }
        for layer in 1..=max_layer {
            let window = 1usize << layer;
            for j in 0..len {
                let entry = if j + 1 >= window {
                    let position = base + j;
                    merge(
                        &self.riq[layer - 1][position - window / 2],
                        &self.riq[layer - 1][position],
                    )
                } else {
                    RiqNode::default()
                };
                self.riq[layer].push(entry);
            }
        }
        for layer in 1..self.riq.len() {
            self.riq[layer].resize(base + len, RiqNode::default());
        }
    }

    /// Walk one changed path, chain by chain, propagating the reachable
    /// cumul set. Returns false as soon as it becomes empty.
    fn check_path(&self, state: &PathState, path: PathId) -> bool {
        let class = self.path_class[path];
        let path_capacity = ExtendedInterval::from(self.path_capacity[path]);
        let mut cumul: Option<ExtendedInterval> = None;
        let mut previous: Option<NodeId> = None;
        for chain in state.chains(path) {
            let Some((&first, &last)) = chain.first().zip(chain.last()) else {
                continue;
            };
            let mut reach = match (previous, cumul) {
                (None, None) => ExtendedInterval::from(
                    self.node_capacity[first].intersect(self.path_capacity[path]),
                ),
                (Some(prev), Some(cumul)) => {
                    let transit = ExtendedInterval::from((self.demand[class])(prev, first));
                    cumul
                        .sum(transit)
                        .intersect(path_capacity)
                        .intersect(self.node_capacity[first].into())
                }
                _ => unreachable!("previous node and cumul set always evolve together"),
            };
            if reach.is_empty() {
                return false;
            }
            if chain.len() >= 2 {
                let same_class = state.path(first).is_some_and(|committed| {
                    self.path_class[committed] == class
                        && self.path_capacity[committed] == self.path_capacity[path]
                });
                if same_class && chain.len() >= self.min_range_size_for_riq {
                    let updated = self
                        .traverse_chain_riq(self.index[first], self.index[last], reach)
                        .intersect(path_capacity);
                    #[cfg(feature = "strong-checks")]
                    self.assert_riq_not_stricter(chain, class, path_capacity, reach, updated);
                    reach = updated;
                } else {
                    for (&a, &b) in chain.iter().tuple_windows() {
                        let transit = if same_class {
                            self.cached_demand[self.index[a]]
                        } else {
                            ExtendedInterval::from((self.demand[class])(a, b))
                        };
                        reach = reach
                            .sum(transit)
                            .intersect(path_capacity)
                            .intersect(self.node_capacity[b].into());
                        if reach.is_empty() {
                            return false;
                        }
                    }
                }
            }
            if reach.is_empty() {
                return false;
            }
            previous = Some(last);
            cumul = Some(reach);
        }
        true
    }

    /// Traverse the committed chain `[first, last]` (layer-0 positions) in
    /// one step, by combining the largest pair of windows covering it.
    /// `cumul` is the reachable set at the chain's first node.
    fn traverse_chain_riq(
        &self,
        first: usize,
        last: usize,
        cumul: ExtendedInterval,
    ) -> ExtendedInterval {
        debug_assert!(last > first);
        let layer = msb(last - first + 1);
        let window = 1usize << layer;
        let f = &self.riq[layer][first + window - 1];
        let l = &self.riq[layer][last];
        let d_fst = ExtendedInterval::delta(f.tsum_at_fst, l.tsum_at_fst);
        let feasible = cumul
            .intersect(f.cumuls_to_fst)
            .intersect(l.cumuls_to_fst.sum(d_fst.negated()));
        if feasible.is_empty() {
            return feasible;
        }
        let tightest = f.tightest_tsum.intersect(l.tightest_tsum);
        let d_lst = ExtendedInterval::delta(f.tsum_at_lst, l.tsum_at_lst);
        ExtendedInterval::delta(f.tsum_at_fst, feasible)
            .intersect(tightest)
            .sum(l.tsum_at_lst)
            .intersect(l.cumuls_to_lst)
            .intersect(f.cumuls_to_lst.sum(d_lst))
    }

    /// The fast path may only over-approximate the naive walk: whenever the
    /// naive walk finds a feasible cumul, the query must as well.
    #[cfg(feature = "strong-checks")]
    fn assert_riq_not_stricter(
        &self,
        chain: &[NodeId],
        class: ClassId,
        path_capacity: ExtendedInterval,
        mut reach: ExtendedInterval,
        updated: ExtendedInterval,
    ) {
        for (&a, &b) in chain.iter().tuple_windows() {
            reach = reach
                .sum(ExtendedInterval::from((self.demand[class])(a, b)))
                .intersect(path_capacity)
                .intersect(self.node_capacity[b].into());
            if reach.is_empty() {
                return;
            }
        }
        assert!(
            !updated.is_empty(),
            "range intersection query rejected a feasible chain"
        );
    }
}
