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

//! Convenience re-export of the most used types.

pub use crate::arith::{cap_add, cap_opp, cap_prod, cap_sub};
pub use crate::assignment::{Assignment, Delta};
pub use crate::cumul::{
    BoundCost, BreakInterval, CumulDimension, ForbiddenIntervals, OptimizerStatus,
    PathCumulFilter, PiecewiseLinearCost, RouteCumulOptimizer,
};
pub use crate::dimension_checker::DimensionChecker;
pub use crate::energy::{EnergyCost, PathEnergyCostChecker};
pub use crate::filter::{FilterPriority, LocalSearchFilter, LocalSearchFilterManager};
pub use crate::filters::{
    make_dimension_filters, DimensionFeasibilityFilter, DimensionFilterOptions,
    PathEnergyCostFilter, PathStateFilter,
};
pub use crate::interval::{ExtendedInterval, Interval};
pub use crate::path_filter::{BasePathFilter, PathContext, PathFilterLogic};
pub use crate::path_state::{PathState, SharedPathState};
pub use crate::types::{ClassId, FilterError, NodeId, PathId};
pub use crate::wavelet::WeightedWaveletTree;
