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

//! The incremental cost and feasibility filter of one cumul dimension.
//!
//! [`PathCumulFilter`] drives a dimension (time, load, …) over the
//! path-filter skeleton. Per touched path it propagates the minimal and
//! maximal cumul forward under hard bounds, slacks and forbidden
//! intervals, walks backward for the tightest span lower bound, prices
//! soft bounds, piecewise-linear node costs, slack, span and global span,
//! accounts for mandatory breaks, and checks pickup→delivery limits and
//! node precedences. An optional LP optimizer refines the bound, escalated
//! to MIP where the LP relaxation is known to be weak (breaks, quadratic
//! span costs).
//!
//! Every arithmetic operation saturates, so an overflow can only make the
//! filter reject, never accept.

use std::collections::HashMap;

use crate::arith::{cap_add, cap_prod, cap_sub};
use crate::filter::FilterPriority;
use crate::interval::Interval;
use crate::path_filter::{PathContext, PathFilterLogic};
use crate::types::{ClassId, FilterError, NodeId, PathId};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A soft bound: violating `bound` costs `cost` per unit of violation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct BoundCost {
    /// The bound itself.
    pub bound: i64,
    /// Cost per unit of violation.
    pub cost: i64,
}

/// A piecewise-linear cost over cumul values: a sorted list of segments,
/// each starting at `start` with value `value` and the given `slope`.
/// Values below the first segment cost the first segment's value.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct PiecewiseLinearCost {
    segments: Vec<(i64, i64, i64)>,
}

impl PiecewiseLinearCost {
    /// Create a function from `(start, value, slope)` segments, sorted by
    /// `start`.
    pub fn new(mut segments: Vec<(i64, i64, i64)>) -> Self {
        segments.sort_by_key(|&(start, _, _)| start);
        Self { segments }
    }

    /// Evaluate the function at `x`.
    pub fn value(&self, x: i64) -> i64 {
        match self.segments.partition_point(|&(start, _, _)| start <= x) {
            0 => self.segments.first().map_or(0, |&(_, value, _)| value),
            i => {
                let (start, value, slope) = self.segments[i - 1];
                cap_add(value, cap_prod(slope, cap_sub(x, start)))
            }
        }
    }

    /// The minimum of the function over `[lo, hi]`. Each segment is
    /// linear, so the minimum is attained at an endpoint of one of the
    /// overlapping pieces.
    pub fn range_min(&self, lo: i64, hi: i64) -> i64 {
        debug_assert!(lo <= hi);
        let mut min = self.value(lo).min(self.value(hi));
        for &(start, value, _) in &self.segments {
            if lo <= start && start <= hi {
                min = min.min(value);
            }
        }
        min
    }
}

/// Sorted disjoint intervals of forbidden cumul values.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct ForbiddenIntervals {
    intervals: Vec<Interval>,
}

impl ForbiddenIntervals {
    /// Create a forbidden set from arbitrary intervals (merged and
    /// sorted).
    pub fn new(mut intervals: Vec<Interval>) -> Self {
        intervals.retain(|i| !i.is_empty());
        intervals.sort_by_key(|i| i.min);
        let mut merged: Vec<Interval> = Vec::with_capacity(intervals.len());
        for interval in intervals {
            match merged.last_mut() {
                Some(last) if cap_add(last.max, 1) >= interval.min => {
                    last.max = last.max.max(interval.max);
                }
                _ => merged.push(interval),
            }
        }
        Self { intervals: merged }
    }

    /// Whether no value is forbidden.
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// The smallest allowed value that is at least `value`.
    pub fn next_allowed(&self, value: i64) -> i64 {
        let i = self.intervals.partition_point(|iv| iv.max < value);
        match self.intervals.get(i) {
            Some(iv) if iv.min <= value => cap_add(iv.max, 1),
            _ => value,
        }
    }
}

/// One allowed interval for a vehicle break.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct BreakInterval {
    /// Earliest possible break start.
    pub start_min: i64,
    /// Latest possible break start.
    pub start_max: i64,
    /// Earliest possible break end.
    pub end_min: i64,
    /// Latest possible break end.
    pub end_max: i64,
    /// Minimal break duration.
    pub duration_min: i64,
}

/// Result of a route optimizer call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OptimizerStatus {
    /// The route is feasible with the given optimal cost.
    Optimal(i64),
    /// Only the relaxation could be solved; the cost is a lower bound.
    RelaxedOptimalOnly(i64),
    /// The route is infeasible (or the optimizer timed out; callers treat
    /// both as a soft reject and must not cache a cost).
    Infeasible,
}

/// A black-box LP or MIP optimizer for the cumuls of a single route.
pub trait RouteCumulOptimizer: std::fmt::Debug {
    /// Compute a cost bound for `vehicle` visiting exactly `route`
    /// (start and end included).
    fn compute_route_cost(&mut self, vehicle: PathId, route: &[NodeId]) -> OptimizerStatus;
}

/// Everything the routing model knows about one cumul dimension. Evaluator
/// vectors are per vehicle class, the rest per node or per vehicle as
/// documented.
pub struct CumulDimension {
    /// Name of the dimension (for logs only).
    pub name: String,
    /// Per vehicle: hard capacity; cumuls stay within `[0, capacity]`.
    pub vehicle_capacity: Vec<i64>,
    /// Per vehicle: hard upper bound on the span (`i64::MAX` for none).
    pub vehicle_span_upper_bound: Vec<i64>,
    /// Per vehicle: its evaluator class.
    pub vehicle_class: Vec<ClassId>,
    /// Per class: fixed (minimal) transit of an arc.
    pub transit: Vec<Box<dyn Fn(NodeId, NodeId) -> i64>>,
    /// Per node: maximal slack added on top of the outgoing transit.
    pub slack_max: Vec<i64>,
    /// Per node: hard cumul bounds.
    pub cumul_bounds: Vec<Interval>,
    /// Per node: forbidden cumul values.
    pub forbidden: Vec<ForbiddenIntervals>,
    /// Per node: soft upper bound on the cumul.
    pub soft_upper_bound: Vec<Option<BoundCost>>,
    /// Per node: soft lower bound on the cumul.
    pub soft_lower_bound: Vec<Option<BoundCost>>,
    /// Per node: piecewise-linear cumul cost.
    pub piecewise_cost: Vec<Option<PiecewiseLinearCost>>,
    /// Per vehicle: cost per unit of span plus slack.
    pub span_cost_coefficient: Vec<i64>,
    /// Per vehicle: soft upper bound on the span.
    pub soft_span_upper_bound: Vec<Option<BoundCost>>,
    /// Per vehicle: quadratic soft upper bound on the span.
    pub quadratic_soft_span_upper_bound: Vec<Option<BoundCost>>,
    /// Cost per unit of `max_end − min_start` over all vehicles.
    pub global_span_cost_coefficient: i64,
    /// Per vehicle: allowed break intervals.
    pub breaks: Vec<Vec<BreakInterval>>,
    /// Per vehicle: `(limit, duration_min)` pairs; one break of at least
    /// `duration_min` is due every `limit` units of transit.
    pub break_distance_duration: Vec<Vec<(i64, i64)>>,
    /// Pickup/delivery pairs of this dimension.
    pub pickup_delivery_pairs: Vec<(NodeId, NodeId)>,
    /// Per pair: maximal cumul distance from pickup to delivery
    /// (`i64::MAX` for none).
    pub pickup_to_delivery_limit: Vec<i64>,
    /// `(first, second, offset)`: if both nodes are performed,
    /// `cumul(second) ≥ cumul(first) + offset` must be satisfiable.
    pub precedences: Vec<(NodeId, NodeId, i64)>,
}

impl std::fmt::Debug for CumulDimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CumulDimension")
            .field("name", &self.name)
            .field("num_vehicles", &self.vehicle_capacity.len())
            .field("num_nodes", &self.cumul_bounds.len())
            .field("global_span_cost_coefficient", &self.global_span_cost_coefficient)
            .finish()
    }
}

impl CumulDimension {
    /// Create a dimension with the given transit evaluators and otherwise
    /// neutral data (unbounded, cost-free). Callers fill in the fields
    /// they need.
    pub fn new(
        name: impl Into<String>,
        num_nodes: usize,
        num_vehicles: usize,
        vehicle_class: Vec<ClassId>,
        transit: Vec<Box<dyn Fn(NodeId, NodeId) -> i64>>,
    ) -> Result<Self, FilterError> {
        if vehicle_class.len() != num_vehicles {
            return Err(FilterError::LengthMismatch {
                what: "vehicle classes",
                expected: num_vehicles,
                got: vehicle_class.len(),
            });
        }
        if let Some(&class) = vehicle_class.iter().find(|&&c| c >= transit.len()) {
            return Err(FilterError::UnknownClass(class, transit.len()));
        }
        Ok(Self {
            name: name.into(),
            vehicle_capacity: vec![i64::MAX; num_vehicles],
            vehicle_span_upper_bound: vec![i64::MAX; num_vehicles],
            vehicle_class,
            transit,
            slack_max: vec![0; num_nodes],
            cumul_bounds: vec![Interval::new(0, i64::MAX); num_nodes],
            forbidden: vec![ForbiddenIntervals::default(); num_nodes],
            soft_upper_bound: vec![None; num_nodes],
            soft_lower_bound: vec![None; num_nodes],
            piecewise_cost: vec![None; num_nodes],
            span_cost_coefficient: vec![0; num_vehicles],
            soft_span_upper_bound: vec![None; num_vehicles],
            quadratic_soft_span_upper_bound: vec![None; num_vehicles],
            global_span_cost_coefficient: 0,
            breaks: vec![Vec::new(); num_vehicles],
            break_distance_duration: vec![Vec::new(); num_vehicles],
            pickup_delivery_pairs: Vec::new(),
            pickup_to_delivery_limit: Vec::new(),
            precedences: Vec::new(),
        })
    }

    /// The number of vehicles of the dimension.
    pub fn num_vehicles(&self) -> usize {
        self.vehicle_capacity.len()
    }
}

/// Everything one forward-and-backward walk learns about a path.
#[derive(Debug, Default, Clone)]
struct PathWalk {
    /// Cumul cost contribution of the path (soft bounds, piecewise costs,
    /// slack, span costs).
    cost: i64,
    /// Minimal feasible cumul at the path end.
    end_cumul_min: i64,
    /// Sum of the fixed transits.
    total_transit: i64,
    /// `M` such that the latest feasible start for ending by `e` is
    /// `min(e − total_transit, M)`.
    max_start_profile: i64,
    /// The visited nodes.
    nodes: Vec<NodeId>,
    /// Per precedence node on this path: its feasible cumul bounds.
    precedence_cumuls: Vec<(NodeId, i64, i64)>,
}

/// Latest feasible start of a walked path when it must end by
/// `end_cumul`.
fn max_start_from_end_cumul(total_transit: i64, max_start_profile: i64, end_cumul: i64) -> i64 {
    cap_sub(end_cumul, total_transit).min(max_start_profile)
}

/// The incremental cumul dimension filter. Used as the logic of a
/// [`BasePathFilter`](crate::path_filter::BasePathFilter).
pub struct PathCumulFilter {
    dim: CumulDimension,
    /// Node → (pair index, is pickup).
    pair_of_node: Vec<Option<(usize, bool)>>,
    /// Whether a node appears in any precedence.
    has_precedence: Vec<bool>,
    /// Whether costs count towards the objective (feasibility is always
    /// enforced).
    filter_objective_cost: bool,
    lp_optimizer: Option<Box<dyn RouteCumulOptimizer>>,
    mip_optimizer: Option<Box<dyn RouteCumulOptimizer>>,

    // committed data, rebuilt by the synchronize callbacks
    committed_walk: Vec<PathWalk>,
    committed_node_cumuls: Vec<(i64, i64)>,
    committed_total_cost: i64,
    committed_max_end: i64,
    committed_min_start: i64,
    committed_support_max_end: PathId,
    committed_support_min_start: PathId,
    synchronized_objective: i64,

    // per-neighbor scratch, reset by `initialize_accept_path`
    delta_paths: Vec<PathId>,
    delta_walks: Vec<PathWalk>,
    delta_node_cumuls: HashMap<NodeId, (i64, i64)>,
    accepted_objective: i64,
}

impl std::fmt::Debug for PathCumulFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathCumulFilter")
            .field("dimension", &self.dim.name)
            .field("committed_total_cost", &self.committed_total_cost)
            .field("filter_objective_cost", &self.filter_objective_cost)
            .finish()
    }
}

impl PathCumulFilter {
    /// Create the filter logic for `dim`.
    pub fn new(dim: CumulDimension, filter_objective_cost: bool) -> Result<Self, FilterError> {
        let num_nodes = dim.cumul_bounds.len();
        let mut pair_of_node = vec![None; num_nodes];
        for (pair, &(pickup, delivery)) in dim.pickup_delivery_pairs.iter().enumerate() {
            for (node, is_pickup) in [(pickup, true), (delivery, false)] {
                if node >= num_nodes {
                    return Err(FilterError::NodeOutOfRange(node, num_nodes));
                }
                if pair_of_node[node].is_some() {
                    return Err(FilterError::DuplicateMember(node));
                }
                pair_of_node[node] = Some((pair, is_pickup));
            }
        }
        let mut has_precedence = vec![false; num_nodes];
        for &(first, second, _) in &dim.precedences {
            if first >= num_nodes || second >= num_nodes {
                return Err(FilterError::NodeOutOfRange(first.max(second), num_nodes));
            }
            has_precedence[first] = true;
            has_precedence[second] = true;
        }
        let num_vehicles = dim.num_vehicles();
        Ok(Self {
            dim,
            pair_of_node,
            has_precedence,
            filter_objective_cost,
            lp_optimizer: None,
            mip_optimizer: None,
            committed_walk: vec![PathWalk::default(); num_vehicles],
            committed_node_cumuls: vec![(0, i64::MAX); num_nodes],
            committed_total_cost: 0,
            committed_max_end: 0,
            committed_min_start: 0,
            committed_support_max_end: 0,
            committed_support_min_start: 0,
            synchronized_objective: 0,
            delta_paths: Vec::new(),
            delta_walks: Vec::new(),
            delta_node_cumuls: HashMap::new(),
            accepted_objective: 0,
        })
    }

    /// Attach an LP optimizer refining the per-route bound.
    pub fn with_lp_optimizer(mut self, optimizer: Box<dyn RouteCumulOptimizer>) -> Self {
        self.lp_optimizer = Some(optimizer);
        self
    }

    /// Attach a MIP optimizer, used when the LP only solves the
    /// relaxation and for vehicles with breaks or quadratic span costs.
    pub fn with_mip_optimizer(mut self, optimizer: Box<dyn RouteCumulOptimizer>) -> Self {
        self.mip_optimizer = Some(optimizer);
        self
    }

    /// Whether an optimizer is attached.
    pub fn has_optimizer(&self) -> bool {
        self.lp_optimizer.is_some() || self.mip_optimizer.is_some()
    }

    /// Walk one path of the proposed neighbor. `None` means infeasible.
    fn walk_path(&self, ctx: &PathContext, vehicle: PathId) -> Option<PathWalk> {
        let dim = &self.dim;
        let class = dim.vehicle_class[vehicle];
        let transit = &dim.transit[class];
        let capacity = dim.vehicle_capacity[vehicle];
        let start = ctx.start_of_path(vehicle);

        // collect the nodes; a proposed successor cycle shows up as an
        // overlong path
        let mut nodes = Vec::new();
        let mut node = start;
        loop {
            nodes.push(node);
            if nodes.len() > ctx.num_nodes() {
                return None;
            }
            match ctx.get_next(node) {
                Some(next) => node = next,
                None => break,
            }
        }

        // forward pass: minimal and maximal cumuls, node costs
        let mut cost = 0i64;
        let mut total_transit = 0i64;
        let mut max_start_profile = i64::MAX;
        let mut cumuls: Vec<(i64, i64)> = Vec::with_capacity(nodes.len());
        let mut min = 0.max(dim.cumul_bounds[start].min);
        let mut max = capacity.min(dim.cumul_bounds[start].max);
        min = dim.forbidden[start].next_allowed(min);
        for (i, &node) in nodes.iter().enumerate() {
            if i > 0 {
                let prev = nodes[i - 1];
                let t = transit(prev, node);
                total_transit = cap_add(total_transit, t);
                min = cap_add(min, t).max(dim.cumul_bounds[node].min);
                min = dim.forbidden[node].next_allowed(min);
                let allowed_max = capacity.min(dim.cumul_bounds[node].max);
                if min > allowed_max {
                    return None;
                }
                max = allowed_max.min(cap_add(max, cap_add(t, dim.slack_max[prev])));
                if max < min {
                    return None;
                }
            } else if min > max {
                return None;
            }
            max_start_profile = max_start_profile
                .min(cap_sub(capacity.min(dim.cumul_bounds[node].max), total_transit));
            cumuls.push((min, max));
            cost = cap_add(cost, self.node_cost(node, min, max));
        }

        // backward pass: latest start compatible with the minimal end
        // cumul, pickup→delivery limits, cumul records for precedences
        let mut precedence_cumuls = Vec::new();
        let mut open_deliveries: HashMap<usize, i64> = HashMap::new();
        for (i, &node) in nodes.iter().enumerate().rev() {
            let (min, max) = cumuls[i];
            match self.pair_of_node[node] {
                Some((pair, false)) => {
                    open_deliveries.insert(pair, min);
                }
                Some((pair, true)) => {
                    // the nearest delivery of the pair was seen already
                    if let Some(&delivery_min) = open_deliveries.get(&pair) {
                        let limit = dim.pickup_to_delivery_limit[pair];
                        if cap_sub(delivery_min, max) > limit {
                            return None;
                        }
                    }
                }
                None => {}
            }
            if self.has_precedence[node] {
                precedence_cumuls.push((node, min, max));
            }
        }
        let end_cumul_min = cumuls.last().map(|&(min, _)| min).unwrap_or(0);
        let max_start = max_start_from_end_cumul(total_transit, max_start_profile, end_cumul_min);

        // span lower bound: the backward walk, plus slack forced by break
        // requirements
        let mut slack_lb = 0i64;
        for &(limit, duration) in &dim.break_distance_duration[vehicle] {
            if total_transit > 0 && limit > 0 {
                let due = (total_transit - 1) / limit;
                slack_lb = cap_add(slack_lb, cap_prod(due, duration));
            }
        }
        for br in &dim.breaks[vehicle] {
            if br.start_max < end_cumul_min && br.end_min > max_start {
                slack_lb = cap_add(slack_lb, br.duration_min);
            }
        }
        let span_lb = cap_sub(end_cumul_min, max_start).max(cap_add(total_transit, slack_lb));
        if span_lb > dim.vehicle_span_upper_bound[vehicle] {
            return None;
        }
        cost = cap_add(
            cost,
            cap_prod(
                dim.span_cost_coefficient[vehicle],
                cap_sub(span_lb, total_transit).max(0),
            ),
        );
        if let Some(bc) = dim.soft_span_upper_bound[vehicle] {
            cost = cap_add(cost, cap_prod(bc.cost, cap_sub(span_lb, bc.bound).max(0)));
        }
        if let Some(bc) = dim.quadratic_soft_span_upper_bound[vehicle] {
            let violation = cap_sub(span_lb, bc.bound).max(0);
            cost = cap_add(cost, cap_prod(bc.cost, cap_prod(violation, violation)));
        }

        Some(PathWalk {
            cost,
            end_cumul_min,
            total_transit,
            max_start_profile,
            nodes,
            precedence_cumuls,
        })
    }

    /// Soft-bound and piecewise cost of one node with cumul in
    /// `[min, max]`. A lower bound: the soft upper bound is priced at the
    /// minimal cumul, the soft lower bound at the maximal one.
    fn node_cost(&self, node: NodeId, min: i64, max: i64) -> i64 {
        let mut cost = 0i64;
        if let Some(bc) = self.dim.soft_upper_bound[node] {
            cost = cap_add(cost, cap_prod(bc.cost, cap_sub(min, bc.bound).max(0)));
        }
        if let Some(bc) = self.dim.soft_lower_bound[node] {
            cost = cap_add(cost, cap_prod(bc.cost, cap_sub(bc.bound, max).max(0)));
        }
        if let Some(plc) = &self.dim.piecewise_cost[node] {
            cost = cap_add(cost, plc.range_min(min, max));
        }
        cost
    }

    /// Minimal cumul of a precedence node in the proposed neighbor.
    fn node_cumul(&self, node: NodeId) -> (i64, i64) {
        self.delta_node_cumuls
            .get(&node)
            .copied()
            .unwrap_or(self.committed_node_cumuls[node])
    }

    /// Refine `walk_cost` of one touched route through the optimizers.
    /// `None` means the optimizer proved infeasibility (or timed out).
    fn optimize_route(&mut self, vehicle: PathId, walk_index: usize) -> Option<i64> {
        let walk_cost = self.delta_walks[walk_index].cost;
        let needs_mip = !self.dim.breaks[vehicle].is_empty()
            || self.dim.quadratic_soft_span_upper_bound[vehicle].is_some();
        let route = std::mem::take(&mut self.delta_walks[walk_index].nodes);
        let status = match (&mut self.lp_optimizer, &mut self.mip_optimizer) {
            (_, Some(mip)) if needs_mip => mip.compute_route_cost(vehicle, &route),
            (Some(lp), mip) => match lp.compute_route_cost(vehicle, &route) {
                OptimizerStatus::RelaxedOptimalOnly(bound) => match mip {
                    Some(mip) => mip.compute_route_cost(vehicle, &route),
                    None => OptimizerStatus::RelaxedOptimalOnly(bound),
                },
                status => status,
            },
            (None, Some(mip)) => mip.compute_route_cost(vehicle, &route),
            (None, None) => OptimizerStatus::RelaxedOptimalOnly(walk_cost),
        };
        self.delta_walks[walk_index].nodes = route;
        match status {
            OptimizerStatus::Infeasible => None,
            OptimizerStatus::Optimal(cost) | OptimizerStatus::RelaxedOptimalOnly(cost) => {
                // keep the tighter of the walk's and the optimizer's bound
                Some(cost.max(walk_cost))
            }
        }
    }

    /// The committed `max_end` and `min_start` aggregates.
    fn recompute_committed_aggregates(&mut self) {
        let num_vehicles = self.dim.num_vehicles();
        self.committed_max_end = i64::MIN;
        for vehicle in 0..num_vehicles {
            let end = self.committed_walk[vehicle].end_cumul_min;
            if end > self.committed_max_end {
                self.committed_max_end = end;
                self.committed_support_max_end = vehicle;
            }
        }
        self.committed_min_start = i64::MAX;
        for vehicle in 0..num_vehicles {
            let walk = &self.committed_walk[vehicle];
            let start = max_start_from_end_cumul(
                walk.total_transit,
                walk.max_start_profile,
                self.committed_max_end,
            );
            if start < self.committed_min_start {
                self.committed_min_start = start;
                self.committed_support_min_start = vehicle;
            }
        }
    }
}

impl PathFilterLogic for PathCumulFilter {
    fn on_synchronize_path_from_start(&mut self, ctx: &PathContext, start: NodeId) {
        let vehicle = ctx.path_of_start(start).expect("synchronized path start");
        let walk = self.walk_path(ctx, vehicle).unwrap_or_else(|| {
            debug_assert!(false, "committed path must be feasible");
            PathWalk::default()
        });
        for &(node, min, max) in &walk.precedence_cumuls {
            self.committed_node_cumuls[node] = (min, max);
        }
        self.committed_walk[vehicle] = walk;
    }

    fn on_after_synchronize_paths(&mut self, _: &PathContext) {
        self.committed_total_cost = self
            .committed_walk
            .iter()
            .fold(0, |acc, walk| cap_add(acc, walk.cost));
        self.recompute_committed_aggregates();
        let global_span = cap_prod(
            self.dim.global_span_cost_coefficient,
            cap_sub(self.committed_max_end, self.committed_min_start).max(0),
        );
        self.synchronized_objective = cap_add(self.committed_total_cost, global_span);
        log::debug!(
            "dimension {}: synchronized objective {}",
            self.dim.name,
            self.synchronized_objective
        );
    }

    fn initialize_accept_path(&mut self, _: &PathContext) -> bool {
        self.delta_paths.clear();
        self.delta_walks.clear();
        self.delta_node_cumuls.clear();
        self.accepted_objective = 0;
        true
    }

    fn accept_path(
        &mut self,
        ctx: &PathContext,
        path_start: NodeId,
        _chain_start: NodeId,
        _chain_end: NodeId,
    ) -> bool {
        let vehicle = ctx.path_of_start(path_start).expect("touched path start");
        let Some(walk) = self.walk_path(ctx, vehicle) else {
            return false;
        };
        for &(node, min, max) in &walk.precedence_cumuls {
            self.delta_node_cumuls.insert(node, (min, max));
        }
        self.delta_paths.push(vehicle);
        self.delta_walks.push(walk);
        true
    }

    fn finalize_accept_path(
        &mut self,
        ctx: &PathContext,
        _objective_min: i64,
        objective_max: i64,
    ) -> bool {
        // precedences: both nodes performed ⇒ the second must still be
        // reachable after the first
        for &(first, second, offset) in &self.dim.precedences {
            let performed =
                |n: NodeId| ctx.get_next(n) != Some(n) && (ctx.path_start_of(n).is_some() || self.delta_node_cumuls.contains_key(&n));
            if !performed(first) || !performed(second) {
                continue;
            }
            let (first_min, _) = self.node_cumul(first);
            let (_, second_max) = self.node_cumul(second);
            if cap_add(first_min, offset) > second_max {
                return false;
            }
        }

        // cost of the neighbor: committed cost with the touched paths
        // replaced
        let mut cost = self.committed_total_cost;
        for (i, &vehicle) in self.delta_paths.iter().enumerate() {
            cost = cap_sub(cost, self.committed_walk[vehicle].cost);
            cost = cap_add(cost, self.delta_walks[i].cost);
        }

        // global span
        if self.dim.global_span_cost_coefficient > 0 {
            let touched = |vehicle: PathId| self.delta_paths.contains(&vehicle);
            let mut max_end = if touched(self.committed_support_max_end) {
                let mut max_end = i64::MIN;
                for vehicle in 0..self.dim.num_vehicles() {
                    if !touched(vehicle) {
                        max_end = max_end.max(self.committed_walk[vehicle].end_cumul_min);
                    }
                }
                max_end
            } else {
                self.committed_max_end
            };
            for walk in &self.delta_walks {
                max_end = max_end.max(walk.end_cumul_min);
            }
            let mut min_start = i64::MAX;
            if max_end == self.committed_max_end && !touched(self.committed_support_min_start) {
                min_start = self.committed_min_start;
                for walk in &self.delta_walks {
                    min_start = min_start.min(max_start_from_end_cumul(
                        walk.total_transit,
                        walk.max_start_profile,
                        max_end,
                    ));
                }
            } else {
                for vehicle in 0..self.dim.num_vehicles() {
                    let walk = match self.delta_paths.iter().position(|&p| p == vehicle) {
                        Some(i) => &self.delta_walks[i],
                        None => &self.committed_walk[vehicle],
                    };
                    min_start = min_start.min(max_start_from_end_cumul(
                        walk.total_transit,
                        walk.max_start_profile,
                        max_end,
                    ));
                }
            }
            cost = cap_add(
                cost,
                cap_prod(
                    self.dim.global_span_cost_coefficient,
                    cap_sub(max_end, min_start).max(0),
                ),
            );
        }

        if !self.filter_objective_cost {
            self.accepted_objective = 0;
            return true;
        }
        if cost > objective_max {
            return false;
        }

        // optimizer refinement, only while the bound can still reject
        if self.has_optimizer() {
            for i in 0..self.delta_paths.len() {
                let vehicle = self.delta_paths[i];
                match self.optimize_route(vehicle, i) {
                    None => return false,
                    Some(refined) => {
                        cost = cap_add(cost, cap_sub(refined, self.delta_walks[i].cost));
                    }
                }
                if cost > objective_max {
                    return false;
                }
            }
        }

        self.accepted_objective = cost;
        cost <= objective_max
    }

    fn accepted_objective_value(&self) -> i64 {
        self.accepted_objective
    }

    fn synchronized_objective_value(&self) -> i64 {
        if self.filter_objective_cost {
            self.synchronized_objective
        } else {
            0
        }
    }

    fn priority(&self) -> FilterPriority {
        if self.has_optimizer() {
            FilterPriority::PathWithOptimizer
        } else {
            FilterPriority::Path
        }
    }
}
