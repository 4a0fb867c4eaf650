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

//! Whole-route cost filters: a user-provided route cost callback, and the
//! amortized vehicle cost.

use crate::arith::{cap_add, cap_prod, cap_sub};
use crate::path_filter::{PathContext, PathFilterLogic};
use crate::types::{FilterError, NodeId, PathId};

/// A user route-cost function: `None` rejects the route, a value replaces
/// the route's contribution to the objective.
pub type RouteCostCallback = Box<dyn Fn(PathId, &[NodeId]) -> Option<i64>>;

/// Shared bookkeeping of filters whose objective is a per-path value
/// recomputed on every touched path.
#[derive(Debug, Default)]
struct PerPathCost {
    committed: Vec<i64>,
    committed_total: i64,
    delta_paths: Vec<PathId>,
    delta_costs: Vec<i64>,
    accepted: i64,
}

impl PerPathCost {
    fn with_paths(num_paths: usize) -> Self {
        Self {
            committed: vec![0; num_paths],
            ..Default::default()
        }
    }

    fn set_committed(&mut self, path: PathId, cost: i64) {
        self.committed[path] = cost;
    }

    fn recompute_total(&mut self) {
        self.committed_total = self.committed.iter().fold(0, |acc, &c| cap_add(acc, c));
        self.accepted = self.committed_total;
    }

    fn reset_delta(&mut self) {
        self.delta_paths.clear();
        self.delta_costs.clear();
    }

    fn record(&mut self, path: PathId, cost: i64) {
        self.delta_paths.push(path);
        self.delta_costs.push(cost);
    }

    fn accepted_total(&mut self) -> i64 {
        let mut total = self.committed_total;
        for (&path, &cost) in self.delta_paths.iter().zip(self.delta_costs.iter()) {
            total = cap_sub(total, self.committed[path]);
            total = cap_add(total, cost);
        }
        self.accepted = total;
        total
    }
}

/// Filter delegating the cost of each touched route to a callback;
/// a `None` verdict rejects the neighbor.
pub struct RouteConstraintFilter {
    route_cost: RouteCostCallback,
    costs: PerPathCost,
}

impl std::fmt::Debug for RouteConstraintFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteConstraintFilter")
            .field("costs", &self.costs)
            .finish()
    }
}

impl RouteConstraintFilter {
    /// Create the logic for `num_paths` vehicles.
    pub fn new(num_paths: usize, route_cost: RouteCostCallback) -> Self {
        Self {
            route_cost,
            costs: PerPathCost::with_paths(num_paths),
        }
    }
}

/// Collect the nodes of a path, `None` on a proposed successor cycle.
fn collect_route(ctx: &PathContext, path_start: NodeId) -> Option<Vec<NodeId>> {
    let mut nodes = Vec::new();
    let mut node = path_start;
    loop {
        nodes.push(node);
        if nodes.len() > ctx.num_nodes() {
            return None;
        }
        match ctx.get_next(node) {
            Some(next) => node = next,
            None => return Some(nodes),
        }
    }
}

impl PathFilterLogic for RouteConstraintFilter {
    fn on_synchronize_path_from_start(&mut self, ctx: &PathContext, start: NodeId) {
        let vehicle = ctx.path_of_start(start).expect("synchronized path start");
        let route = collect_route(ctx, start).expect("committed paths are acyclic");
        let cost = (self.route_cost)(vehicle, &route).unwrap_or(0);
        self.costs.set_committed(vehicle, cost);
    }

    fn on_after_synchronize_paths(&mut self, _: &PathContext) {
        self.costs.recompute_total();
    }

    fn initialize_accept_path(&mut self, _: &PathContext) -> bool {
        self.costs.reset_delta();
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
        let Some(route) = collect_route(ctx, path_start) else {
            return false;
        };
        match (self.route_cost)(vehicle, &route) {
            Some(cost) => {
                self.costs.record(vehicle, cost);
                true
            }
            None => false,
        }
    }

    fn finalize_accept_path(&mut self, _: &PathContext, _: i64, objective_max: i64) -> bool {
        self.costs.accepted_total() <= objective_max
    }

    fn accepted_objective_value(&self) -> i64 {
        self.costs.accepted
    }

    fn synchronized_objective_value(&self) -> i64 {
        self.costs.committed_total
    }
}

/// Amortized vehicle cost: a used vehicle with `n` visited nodes
/// contributes `linear_factor − quadratic_factor · n²`, an empty one
/// nothing. The linear part therefore enters the cost delta exactly when a
/// path transitions between empty and non-empty.
pub struct VehicleAmortizedCostFilter {
    linear_factor: Vec<i64>,
    quadratic_factor: Vec<i64>,
    costs: PerPathCost,
}

impl std::fmt::Debug for VehicleAmortizedCostFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VehicleAmortizedCostFilter")
            .field("costs", &self.costs)
            .finish()
    }
}

impl VehicleAmortizedCostFilter {
    /// Create the logic from the per-vehicle factors.
    pub fn new(
        linear_factor: Vec<i64>,
        quadratic_factor: Vec<i64>,
    ) -> Result<Self, FilterError> {
        if linear_factor.len() != quadratic_factor.len() {
            return Err(FilterError::LengthMismatch {
                what: "quadratic factors",
                expected: linear_factor.len(),
                got: quadratic_factor.len(),
            });
        }
        let num_paths = linear_factor.len();
        Ok(Self {
            linear_factor,
            quadratic_factor,
            costs: PerPathCost::with_paths(num_paths),
        })
    }

    fn route_cost(&self, vehicle: PathId, visited: usize) -> i64 {
        if visited == 0 {
            return 0;
        }
        cap_sub(
            self.linear_factor[vehicle],
            cap_prod(self.quadratic_factor[vehicle], cap_prod(visited as i64, visited as i64)),
        )
    }
}

impl PathFilterLogic for VehicleAmortizedCostFilter {
    fn on_synchronize_path_from_start(&mut self, ctx: &PathContext, start: NodeId) {
        let vehicle = ctx.path_of_start(start).expect("synchronized path start");
        let route = collect_route(ctx, start).expect("committed paths are acyclic");
        let cost = self.route_cost(vehicle, route.len() - 2);
        self.costs.set_committed(vehicle, cost);
    }

    fn on_after_synchronize_paths(&mut self, _: &PathContext) {
        self.costs.recompute_total();
    }

    fn initialize_accept_path(&mut self, _: &PathContext) -> bool {
        self.costs.reset_delta();
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
        let Some(route) = collect_route(ctx, path_start) else {
            return false;
        };
        let cost = self.route_cost(vehicle, route.len() - 2);
        self.costs.record(vehicle, cost);
        true
    }

    fn finalize_accept_path(&mut self, _: &PathContext, _: i64, objective_max: i64) -> bool {
        self.costs.accepted_total() <= objective_max
    }

    fn accepted_objective_value(&self) -> i64 {
        self.costs.accepted
    }

    fn synchronized_objective_value(&self) -> i64 {
        self.costs.committed_total
    }
}
