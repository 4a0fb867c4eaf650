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

#![deny(missing_docs, missing_debug_implementations, rust_2018_idioms)]

//! # RoutingFilters
//!
//! Incremental local-search filters for a vehicle routing solver.
//!
//! A local-search engine explores neighbors of the current solution by
//! proposing *deltas*: small sets of reassignments of the per-node
//! successor variables. Filters decide, fast, whether such a neighbor is
//! feasible and bound its objective. Since filters run on every explored
//! neighbor, their per-call latency dominates the search: the contract is
//! O(size of delta) work wherever possible, never O(route length) and
//! never O(model size).
//!
//! ## Structure
//!
//! - [`filter`] defines the [`LocalSearchFilter`](filter::LocalSearchFilter)
//!   contract every filter implements, and the manager dispatching a
//!   neighbor to a prioritized filter sequence.
//! - [`path_filter`] is the reusable skeleton of path-based filters: it
//!   decomposes a delta into touched paths and per-path chain windows.
//! - [`path_state`] is the committable chain representation of all paths,
//!   shared between the checkers of one neighbor and maintained by
//!   [`filters::PathStateFilter`].
//! - [`dimension_checker`] answers feasibility of one additive dimension
//!   in time proportional to the changed chains, via a range intersection
//!   query over precomputed window summaries.
//! - [`cumul`] is the full cumul dimension filter: hard and soft bounds,
//!   piecewise-linear costs, spans, breaks, precedences, and optional
//!   LP/MIP refinement behind the
//!   [`RouteCumulOptimizer`](cumul::RouteCumulOptimizer) trait.
//! - [`wavelet`], [`rmq`] and [`energy`] implement the threshold energy
//!   cost of force/distance dimensions.
//! - [`filters`] holds the specialized filter catalog (disjunctions,
//!   active groups, pickup/delivery order, vehicle allow-lists, …) and
//!   the per-dimension filter selector.
//!
//! The supporting cast: [`arith`] (saturating 64-bit arithmetic; an
//! overflow may reject a neighbor but never accept one), [`interval`]
//! (interval algebra with ±∞ counts), [`collections`] (revertible
//! containers making an abandoned neighbor cost O(delta) to undo), and
//! [`assignment`] (the read-only view of the solver's variables).
//!
//! ## Example
//!
//! ```
//! use routing_filters::prelude::*;
//! use std::{cell::RefCell, rc::Rc};
//!
//! // two nodes 0 and 1, one vehicle from start 2 to end 3
//! let state = Rc::new(RefCell::new(PathState::new(4, vec![2], vec![3]).unwrap()));
//! let checker = DimensionChecker::new(
//!     state.clone(),
//!     vec![Interval::new(0, 10)],                     // vehicle capacity
//!     vec![0],                                        // vehicle class
//!     vec![Box::new(|_, _| Interval::new(4, 4))],     // demand per arc
//!     vec![Interval::new(0, i64::MAX); 4],            // node capacities
//! )
//! .unwrap();
//! let mut manager = LocalSearchFilterManager::new(vec![
//!     Box::new(PathStateFilter::new(state)),
//!     Box::new(DimensionFeasibilityFilter::new(checker)),
//! ]);
//!
//! // committed solution: the empty route
//! let mut values: Vec<i64> = (0..4).collect();
//! values[2] = 3;
//! let assignment = Assignment::new(values);
//! manager.synchronize(&assignment, None);
//!
//! // serving both nodes needs 3 * 4 = 12 > 10 units: rejected
//! let mut delta = Delta::new();
//! delta.set(2, 0).set(0, 1).set(1, 3);
//! assert!(!manager.accept(&delta, &Delta::new(), 0, i64::MAX));
//!
//! // serving node 0 alone fits
//! let mut delta = Delta::new();
//! delta.set(2, 0).set(0, 3);
//! assert!(manager.accept(&delta, &Delta::new(), 0, i64::MAX));
//! ```

pub mod arith;
pub mod assignment;
pub mod collections;
pub mod cumul;
pub mod dimension_checker;
pub mod energy;
pub mod filter;
pub mod filters;
pub mod interval;
pub mod path_filter;
pub mod path_state;
pub mod prelude;
pub mod rmq;
pub mod types;
pub mod wavelet;

#[cfg(test)]
mod test;
