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

//! Shared identifiers and the crate-wide error type.

use thiserror::Error;

/// Identifier of a node. Nodes are dense integers in `[0, num_nodes)`; the
/// per-vehicle start and end nodes are part of that range, and only nodes
/// that are neither ends nor unperformed own a successor variable.
pub type NodeId = usize;

/// Identifier of a path. Paths are dense integers in `[0, num_paths)`; path
/// `p` belongs to vehicle `p`.
pub type PathId = usize;

/// Identifier of a vehicle class. Vehicles of the same class share their
/// evaluators (transits, demands, forces, distances) and their capacity, so
/// per-arc values cached for one vehicle can be reused for any vehicle of
/// the same class.
pub type ClassId = usize;

/// Error returned when constructing or registering a filter with
/// inconsistent model data. Once a filter is built, its hot-path operations
/// never fail; infeasibility is expressed as a rejected neighbor.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// Two per-node or per-path vectors that must be parallel have
    /// different lengths.
    #[error("expected {expected} {what}, but got {got}")]
    LengthMismatch {
        /// What kind of entries were expected (e.g. "node capacities").
        what: &'static str,
        /// The expected number of entries.
        expected: usize,
        /// The number of entries actually provided.
        got: usize,
    },
    /// A node identifier lies outside of `[0, num_nodes)`.
    #[error("node {0} is out of range (num_nodes = {1})")]
    NodeOutOfRange(NodeId, usize),
    /// A vehicle class identifier has no registered evaluator.
    #[error("class {0} has no evaluator (only {1} classes are registered)")]
    UnknownClass(ClassId, usize),
    /// A node appears in more than one pickup/delivery pair or group.
    #[error("node {0} is already member of another group")]
    DuplicateMember(NodeId),
}
