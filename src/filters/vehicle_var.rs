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

//! Per-node vehicle allow-lists.

use std::collections::HashSet;

use crate::path_filter::{PathContext, PathFilterLogic};
use crate::types::{FilterError, NodeId, PathId};

/// Path-filter logic accepting a path iff every node of its chain window
/// may be served by the path's vehicle. `None` means a node is
/// unconstrained. O(chain window) per touched path.
#[derive(Debug)]
pub struct VehicleVarFilter {
    allowed: Vec<Option<HashSet<PathId>>>,
}

impl VehicleVarFilter {
    /// Create the logic from the per-node allow-lists.
    pub fn new(num_nodes: usize, allowed: Vec<Option<HashSet<PathId>>>) -> Result<Self, FilterError> {
        if allowed.len() != num_nodes {
            return Err(FilterError::LengthMismatch {
                what: "vehicle allow-lists",
                expected: num_nodes,
                got: allowed.len(),
            });
        }
        Ok(Self { allowed })
    }

    fn is_allowed(&self, node: NodeId, vehicle: PathId) -> bool {
        self.allowed[node]
            .as_ref()
            .map_or(true, |vehicles| vehicles.contains(&vehicle))
    }
}

impl PathFilterLogic for VehicleVarFilter {
    fn accept_path(
        &mut self,
        ctx: &PathContext,
        path_start: NodeId,
        chain_start: NodeId,
        chain_end: NodeId,
    ) -> bool {
        let vehicle = ctx.path_of_start(path_start).expect("touched path start");
        let mut node = chain_start;
        loop {
            if !self.is_allowed(node, vehicle) {
                return false;
            }
            if node == chain_end {
                return true;
            }
            match ctx.get_next(node) {
                Some(next) => node = next,
                // the walk ran past the path end: cycle through the window
                None => return node == chain_end,
            }
        }
    }
}
