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

//! Threshold energy cost of paths.
//!
//! A vehicle accumulates a signed *force* along its path (e.g. payload
//! weight); each arc has a distance. The energy spent on an arc is the
//! running force times the distance, priced in two pieces around a
//! threshold:
//!
//! ```text
//! cost = cost_below · Σ min(threshold, force) · distance
//!      + cost_above · Σ max(0, force − threshold) · distance
//! ```
//!
//! Per committed path the checker stores force prefix sums, a range-min
//! table (for the minimal running force of a chain) and two weighted
//! wavelet trees keyed on the running force, weighted by force·distance
//! and by distance. A chain reused from a committed path of the same class
//! is then priced at any force offset with four threshold queries, because
//! shifting all forces by `s` is the same as querying at `threshold − s`.

use crate::arith::{cap_add, cap_prod, cap_sub};
use crate::path_state::{PathState, SharedPathState};
use crate::rmq::RangeMinimumQuery;
use crate::types::{ClassId, FilterError, NodeId, PathId};
use crate::wavelet::WeightedWaveletTree;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Evaluator of the force a node adds to its vehicle.
pub type ForceEvaluator = Box<dyn Fn(NodeId) -> i64>;
/// Evaluator of the distance of one arc.
pub type DistanceEvaluator = Box<dyn Fn(NodeId, NodeId) -> i64>;

/// Two-piece linear energy cost around a threshold.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct EnergyCost {
    /// Force level at which the expensive piece starts.
    pub threshold: i64,
    /// Cost per unit of energy accumulated below the threshold.
    pub cost_per_unit_below_threshold: i64,
    /// Cost per unit of energy accumulated above the threshold.
    pub cost_per_unit_above_threshold: i64,
}

impl EnergyCost {
    /// Whether this cost is identically zero.
    pub fn is_null(&self) -> bool {
        self.cost_per_unit_below_threshold == 0 && self.cost_per_unit_above_threshold == 0
    }
}

/// Committed per-path data.
#[derive(Debug, Default)]
struct PathForceData {
    /// First position of the path in the global arrays.
    base: usize,
    /// Number of nodes.
    len: usize,
    /// Range-min over the path's force prefix sums (local indices).
    rmq: RangeMinimumQuery<i64>,
}

/// One priced segment of a tentative path, collected while walking its
/// chains and priced once the mandatory force offset is known.
#[derive(Debug)]
enum Segment {
    /// A committed chain, priced through the wavelet trees: wavelet range
    /// and force shift relative to the committed prefix sums.
    Cached { begin: usize, end: usize, shift: i64 },
    /// A single arc priced directly: running force at its source, distance.
    Direct { force: i64, distance: i64 },
}

/// Incremental threshold-energy cost checker over a shared [`PathState`].
pub struct PathEnergyCostChecker {
    state: SharedPathState,
    force_class: Vec<ClassId>,
    distance_class: Vec<ClassId>,
    force: Vec<ForceEvaluator>,
    distance: Vec<DistanceEvaluator>,
    force_start_min: Vec<i64>,
    force_end_min: Vec<i64>,
    energy_cost: Vec<EnergyCost>,
    /// Global position of each node, as of the last commit.
    position: Vec<usize>,
    /// Running force at each position, relative to its path start.
    tsum_force: Vec<i64>,
    path_data: Vec<PathForceData>,
    /// Keyed on running force, weighted by force·distance.
    energy_query: WeightedWaveletTree,
    /// Keyed on running force, weighted by distance.
    distance_query: WeightedWaveletTree,
    committed_path_cost: Vec<i64>,
    committed_total_cost: i64,
    accepted_total_cost: i64,
}

impl std::fmt::Debug for PathEnergyCostChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathEnergyCostChecker")
            .field("committed_total_cost", &self.committed_total_cost)
            .field("accepted_total_cost", &self.accepted_total_cost)
            .field("num_positions", &self.tsum_force.len())
            .finish()
    }
}

impl PathEnergyCostChecker {
    /// Create a checker. `force_class`, `distance_class`,
    /// `force_start_min`, `force_end_min` and `energy_cost` are per path;
    /// `force` and `distance` per class. The committed state is
    /// precomputed immediately.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        state: SharedPathState,
        force_class: Vec<ClassId>,
        distance_class: Vec<ClassId>,
        force: Vec<ForceEvaluator>,
        distance: Vec<DistanceEvaluator>,
        force_start_min: Vec<i64>,
        force_end_min: Vec<i64>,
        energy_cost: Vec<EnergyCost>,
    ) -> Result<Self, FilterError> {
        let (num_nodes, num_paths) = {
            let state = state.borrow();
            (state.num_nodes(), state.num_paths())
        };
        for (what, len) in [
            ("force classes", force_class.len()),
            ("distance classes", distance_class.len()),
            ("start force minima", force_start_min.len()),
            ("end force minima", force_end_min.len()),
            ("energy costs", energy_cost.len()),
        ] {
            if len != num_paths {
                return Err(FilterError::LengthMismatch {
                    what,
                    expected: num_paths,
                    got: len,
                });
            }
        }
        if let Some(&class) = force_class.iter().find(|&&c| c >= force.len()) {
            return Err(FilterError::UnknownClass(class, force.len()));
        }
        if let Some(&class) = distance_class.iter().find(|&&c| c >= distance.len()) {
            return Err(FilterError::UnknownClass(class, distance.len()));
        }
        let mut checker = Self {
            state,
            force_class,
            distance_class,
            force,
            distance,
            force_start_min,
            force_end_min,
            energy_cost,
            position: vec![0; num_nodes],
            tsum_force: Vec::new(),
            path_data: Vec::new(),
            energy_query: WeightedWaveletTree::new(),
            distance_query: WeightedWaveletTree::new(),
            committed_path_cost: vec![0; num_paths],
            committed_total_cost: 0,
            accepted_total_cost: 0,
        };
        checker.path_data.resize_with(num_paths, Default::default);
        checker.rebuild_full();
        Ok(checker)
    }

    /// The committed total energy cost.
    pub fn committed_cost(&self) -> i64 {
        self.committed_total_cost
    }

    /// The total energy cost computed by the last [`check`](Self::check).
    pub fn accepted_cost(&self) -> i64 {
        self.accepted_total_cost
    }

    /// Compute the total energy cost of the proposed neighbor and compare
    /// it against `cost_max`. Accepts unconditionally while the shared
    /// state is invalid.
    pub fn check(&mut self, cost_max: i64) -> bool {
        let state = self.state.borrow();
        if state.is_invalid() {
            self.accepted_total_cost = self.committed_total_cost;
            return true;
        }
        let mut total = self.committed_total_cost;
        for path in state.changed_paths() {
            total = cap_sub(total, self.committed_path_cost[path]);
            total = cap_add(total, self.path_cost(&state, path));
        }
        drop(state);
        self.accepted_total_cost = total;
        total <= cost_max
    }

    /// Update the precomputed data and the committed costs to the current
    /// (tentative) paths. Must be called once per synchronization, before
    /// the shared state itself commits.
    pub fn commit(&mut self) {
        let (appended, changed): (usize, Vec<PathId>) = {
            let state = self.state.borrow();
            (
                state.changed_paths().map(|p| state.nodes(p).count()).sum(),
                state.changed_paths().collect(),
            )
        };
        if self.tsum_force.len() + appended > 16.max(4 * self.position.len()) {
            log::trace!("energy checker: full rebuild");
            self.rebuild_full();
        } else {
            for path in changed {
                self.append_path(path);
            }
        }
        self.committed_total_cost = self
            .committed_path_cost
            .iter()
            .fold(0, |acc, &c| cap_add(acc, c));
        self.accepted_total_cost = self.committed_total_cost;
    }

    fn rebuild_full(&mut self) {
        self.tsum_force.clear();
        self.energy_query.clear();
        self.distance_query.clear();
        let num_paths = self.state.borrow().num_paths();
        for path in 0..num_paths {
            self.append_path(path);
        }
        self.committed_total_cost = self
            .committed_path_cost
            .iter()
            .fold(0, |acc, &c| cap_add(acc, c));
        self.accepted_total_cost = self.committed_total_cost;
    }

    /// Append the current node sequence of `path` to the committed layout
    /// and recompute its committed cost.
    fn append_path(&mut self, path: PathId) {
        let nodes: Vec<NodeId> = self.state.borrow().nodes(path).collect();
        let base = self.tsum_force.len();
        let force = &self.force[self.force_class[path]];
        let distance = &self.distance[self.distance_class[path]];
        let mut running = 0i64;
        let mut arcs: Vec<(i64, i64)> = Vec::with_capacity(nodes.len().saturating_sub(1));
        for (i, &node) in nodes.iter().enumerate() {
            running = cap_add(running, force(node));
            self.position[node] = base + i;
            self.tsum_force.push(running);
            let (weight_energy, weight_distance) = if i + 1 < nodes.len() {
                let d = distance(node, nodes[i + 1]);
                arcs.push((running, d));
                (cap_prod(running, d), d)
            } else {
                (0, 0)
            };
            self.energy_query.push_back(running, weight_energy);
            self.distance_query.push_back(running, weight_distance);
        }
        self.energy_query.make_tree_from_new_elements();
        self.distance_query.make_tree_from_new_elements();
        self.path_data[path] = PathForceData {
            base,
            len: nodes.len(),
            rmq: RangeMinimumQuery::new(&self.tsum_force[base..]),
        };
        // committed cost, directly from the collected arcs
        let min_running = self.tsum_force[base..].iter().copied().min().unwrap_or(0);
        let total_force = running;
        let offset = self.offset(path, min_running, total_force);
        let cost = self.energy_cost[path];
        self.committed_path_cost[path] = arcs.iter().fold(0, |acc, &(force, distance)| {
            cap_add(acc, price_arc(&cost, cap_add(force, offset), distance))
        });
    }

    /// The mandatory force offset of a path: at least `force_start_min`,
    /// high enough that the running force never drops below zero, and high
    /// enough to end at `force_end_min`.
    fn offset(&self, path: PathId, min_running: i64, total_force: i64) -> i64 {
        cap_add(
            self.force_start_min[path],
            0.max(cap_sub(0, min_running))
                .max(cap_sub(self.force_end_min[path], total_force)),
        )
    }

    /// Cost of the tentative `path`, chain by chain.
    fn path_cost(&self, state: &PathState, path: PathId) -> i64 {
        let cost = self.energy_cost[path];
        if cost.is_null() {
            return 0;
        }
        let force_class = self.force_class[path];
        let distance_class = self.distance_class[path];
        let force = &self.force[force_class];
        let distance = &self.distance[distance_class];

        // first pass: segments, total force, minimal running force
        let mut segments: Vec<Segment> = Vec::new();
        let mut running = 0i64;
        let mut min_running = i64::MAX;
        let mut previous: Option<NodeId> = None;
        for chain in state.chains(path) {
            let Some((&first, &last)) = chain.first().zip(chain.last()) else {
                continue;
            };
            let same_class = state.path(first).is_some_and(|committed| {
                self.force_class[committed] == force_class
                    && self.distance_class[committed] == distance_class
            });
            if let Some(prev) = previous {
                // the arc connecting the previous chain to this one rides
                // the running force before `first` adds its own
                segments.push(Segment::Direct {
                    force: running,
                    distance: distance(prev, first),
                });
            }
            if same_class && chain.len() >= 2 {
                let data = &self.path_data
                    [state.path(first).expect("same_class implies a committed path")];
                let (pos_first, pos_last) = (self.position[first], self.position[last]);
                let shift = cap_sub(
                    cap_add(running, force(first)),
                    self.tsum_force[pos_first],
                );
                segments.push(Segment::Cached {
                    begin: pos_first,
                    end: pos_last,
                    shift,
                });
                let local = (pos_first - data.base, pos_last - data.base + 1);
                min_running = min_running.min(cap_add(data.rmq.range_min(local.0, local.1), shift));
                running = cap_add(self.tsum_force[pos_last], shift);
            } else {
                for (i, &node) in chain.iter().enumerate() {
                    running = cap_add(running, force(node));
                    min_running = min_running.min(running);
                    if i + 1 < chain.len() {
                        segments.push(Segment::Direct {
                            force: running,
                            distance: distance(node, chain[i + 1]),
                        });
                    }
                }
            }
            previous = Some(last);
        }
        if min_running == i64::MAX {
            min_running = 0;
        }

        // second pass: price all segments at the mandatory offset
        let offset = self.offset(path, min_running, running);
        let mut total = 0i64;
        for segment in &segments {
            match *segment {
                Segment::Direct { force, distance } => {
                    total = cap_add(total, price_arc(&cost, cap_add(force, offset), distance));
                }
                Segment::Cached { begin, end, shift } => {
                    let shift = cap_add(shift, offset);
                    let threshold = cap_sub(cost.threshold, shift);
                    let total_e = self.energy_query.range_sum_with_threshold(i64::MIN, begin, end);
                    let total_d = self
                        .distance_query
                        .range_sum_with_threshold(i64::MIN, begin, end);
                    let e_above = self.energy_query.range_sum_with_threshold(threshold, begin, end);
                    let d_above = self
                        .distance_query
                        .range_sum_with_threshold(threshold, begin, end);
                    // Σ max(0, force + shift − T) · d over the chain
                    let above = cap_sub(e_above, cap_prod(threshold, d_above));
                    // Σ min(T, force + shift) · d over the chain: the
                    // above-threshold arcs are clamped to T, the rest keep
                    // their shifted force
                    let below = cap_add(
                        cap_add(cap_prod(cost.threshold, d_above), cap_sub(total_e, e_above)),
                        cap_prod(shift, cap_sub(total_d, d_above)),
                    );
                    total = cap_add(total, cap_prod(cost.cost_per_unit_below_threshold, below));
                    total = cap_add(total, cap_prod(cost.cost_per_unit_above_threshold, above));
                }
            }
        }
        total
    }
}

/// Price one arc at the given (offset-corrected) running force.
fn price_arc(cost: &EnergyCost, force: i64, distance: i64) -> i64 {
    let below = cap_prod(force.min(cost.threshold), distance);
    let above = cap_prod(0.max(cap_sub(force, cost.threshold)), distance);
    cap_add(
        cap_prod(cost.cost_per_unit_below_threshold, below),
        cap_prod(cost.cost_per_unit_above_threshold, above),
    )
}
