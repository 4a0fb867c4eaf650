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

//! Closed integer intervals and the extended interval algebra used by the
//! incremental dimension checker.
//!
//! An [`ExtendedInterval`] augments its bounds with *infinity counts*: a
//! bound of `i64::MIN`/`i64::MAX` in a raw interval is turned into one unit
//! of −∞/+∞ and a finite part of zero. Sums and differences of such
//! intervals then stay associative: the counts add and cancel exactly like
//! the finite parts, which is what makes the window-merge recurrence of the
//! range intersection query valid even when some transits are unbounded.

use crate::arith::{cap_add, cap_opp, cap_sub};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A closed interval `[min, max]` of 64-bit integers. Empty iff `min > max`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(Deserialize, Serialize))]
pub struct Interval {
    /// Lower bound (inclusive).
    pub min: i64,
    /// Upper bound (inclusive).
    pub max: i64,
}

impl Interval {
    /// The interval containing every `i64`.
    pub const ALL: Interval = Interval {
        min: i64::MIN,
        max: i64::MAX,
    };

    /// Create a new interval.
    pub fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    /// The interval containing exactly `value`.
    pub fn singleton(value: i64) -> Self {
        Self {
            min: value,
            max: value,
        }
    }

    /// The interval `[min, i64::MAX]`.
    pub fn at_least(min: i64) -> Self {
        Self { min, max: i64::MAX }
    }

    /// Whether the interval contains no value.
    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }

    /// Whether `value` lies within the interval.
    pub fn contains(&self, value: i64) -> bool {
        self.min <= value && value <= self.max
    }

    /// The intersection of two intervals.
    pub fn intersect(self, other: Interval) -> Interval {
        Interval {
            min: self.min.max(other.min),
            max: self.max.min(other.max),
        }
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.min, self.max)
    }
}

/// An interval with explicit ±∞ bookkeeping.
///
/// The represented set is `[min − num_neg_inf·∞, max + num_pos_inf·∞]`.
/// Negative counts appear in intermediate differences and cancel against
/// later sums; they never survive into a value that is tested for
/// emptiness or membership.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct ExtendedInterval {
    /// Finite part of the lower bound.
    pub min: i64,
    /// Finite part of the upper bound.
    pub max: i64,
    /// Units of −∞ on the lower bound.
    pub num_neg_inf: i64,
    /// Units of +∞ on the upper bound.
    pub num_pos_inf: i64,
}

impl From<Interval> for ExtendedInterval {
    fn from(i: Interval) -> Self {
        let (min, num_neg_inf) = if i.min == i64::MIN { (0, 1) } else { (i.min, 0) };
        let (max, num_pos_inf) = if i.max == i64::MAX { (0, 1) } else { (i.max, 0) };
        ExtendedInterval {
            min,
            max,
            num_neg_inf,
            num_pos_inf,
        }
    }
}

impl ExtendedInterval {
    /// The extended interval containing exactly `value`.
    pub fn singleton(value: i64) -> Self {
        ExtendedInterval {
            min: value,
            max: value,
            num_neg_inf: 0,
            num_pos_inf: 0,
        }
    }

    /// Whether the interval contains no value. The lower bound exceeds the
    /// upper bound iff the net infinity count is negative, or zero with
    /// `min > max`.
    pub fn is_empty(&self) -> bool {
        let net = self.num_neg_inf + self.num_pos_inf;
        net < 0 || (net == 0 && self.min > self.max)
    }

    /// The intersection of two extended intervals. Bounds are compared
    /// lexicographically by (infinity count, finite part): fewer units of
    /// −∞ make a larger lower bound, fewer units of +∞ a smaller upper.
    pub fn intersect(self, other: ExtendedInterval) -> ExtendedInterval {
        // larger lower bound wins
        let (min, num_neg_inf) = if (other.num_neg_inf, self.min) < (self.num_neg_inf, other.min) {
            (other.min, other.num_neg_inf)
        } else {
            (self.min, self.num_neg_inf)
        };
        // smaller upper bound wins
        let (max, num_pos_inf) = if (other.num_pos_inf, other.max) < (self.num_pos_inf, self.max) {
            (other.max, other.num_pos_inf)
        } else {
            (self.max, self.num_pos_inf)
        };
        ExtendedInterval {
            min,
            max,
            num_neg_inf,
            num_pos_inf,
        }
    }

    /// The componentwise (Minkowski) sum: bounds add, counts add.
    pub fn sum(self, other: ExtendedInterval) -> ExtendedInterval {
        ExtendedInterval {
            min: cap_add(self.min, other.min),
            max: cap_add(self.max, other.max),
            num_neg_inf: self.num_neg_inf + other.num_neg_inf,
            num_pos_inf: self.num_pos_inf + other.num_pos_inf,
        }
    }

    /// The componentwise difference `to − from`. Applied to two prefix
    /// transit sums of the same path, this recovers the exact transit
    /// interval between the two positions, infinity counts included.
    pub fn delta(from: ExtendedInterval, to: ExtendedInterval) -> ExtendedInterval {
        ExtendedInterval {
            min: cap_sub(to.min, from.min),
            max: cap_sub(to.max, from.max),
            num_neg_inf: to.num_neg_inf - from.num_neg_inf,
            num_pos_inf: to.num_pos_inf - from.num_pos_inf,
        }
    }

    /// The negated interval: `[−max, −min]`, with the infinity counts
    /// swapped. `a.sum(b.negated())` translates `a` backwards through the
    /// transit `b` (the preimage, not the componentwise difference).
    pub fn negated(self) -> ExtendedInterval {
        ExtendedInterval {
            min: cap_opp(self.max),
            max: cap_opp(self.min),
            num_neg_inf: self.num_pos_inf,
            num_pos_inf: self.num_neg_inf,
        }
    }
}

impl std::fmt::Display for ExtendedInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}{}, {}{}]",
            self.min,
            if self.num_neg_inf != 0 {
                format!(" - {}inf", self.num_neg_inf)
            } else {
                String::new()
            },
            self.max,
            if self.num_pos_inf != 0 {
                format!(" + {}inf", self.num_pos_inf)
            } else {
                String::new()
            },
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn ext(min: i64, max: i64) -> ExtendedInterval {
        ExtendedInterval::from(Interval::new(min, max))
    }

    #[test]
    fn interval_basics() {
        assert!(Interval::new(3, 2).is_empty());
        assert!(!Interval::new(2, 2).is_empty());
        assert!(Interval::new(0, 10).contains(10));
        assert_eq!(
            Interval::new(0, 10).intersect(Interval::new(5, 20)),
            Interval::new(5, 10)
        );
    }

    #[test]
    fn conversion_extracts_infinities() {
        let e = ext(i64::MIN, 7);
        assert_eq!(e.num_neg_inf, 1);
        assert_eq!(e.min, 0);
        assert_eq!(e.max, 7);
        let e = ext(3, i64::MAX);
        assert_eq!(e.num_pos_inf, 1);
        assert_eq!(e.max, 0);
    }

    #[test]
    fn sum_and_delta_cancel() {
        let a = ext(2, 5);
        let b = ext(10, i64::MAX);
        let s = a.sum(b);
        assert_eq!(ExtendedInterval::delta(a, s), b);
        assert_eq!(ExtendedInterval::delta(b, s), a);
    }

    #[test]
    fn intersection_prefers_finite_bounds() {
        let finite = ext(0, 100);
        let open = ext(10, i64::MAX);
        let i = finite.intersect(open);
        assert_eq!(i, ext(10, 100));
        // an unbounded side never shadows a finite one
        let i = ext(i64::MIN, 50).intersect(ext(-3, i64::MAX));
        assert_eq!(i, ext(-3, 50));
    }

    #[test]
    fn emptiness_with_counts() {
        assert!(ext(5, 3).is_empty());
        assert!(!ext(5, i64::MAX).is_empty());
        assert!(!ext(i64::MIN, i64::MAX).is_empty());
        // a net negative count is empty regardless of the finite parts
        let e = ExtendedInterval {
            min: 0,
            max: 100,
            num_neg_inf: -1,
            num_pos_inf: 0,
        };
        assert!(e.is_empty());
    }

    #[test]
    fn backward_translation_swaps_bounds() {
        // values at the head of an arc [2, 4] that can reach [10, 11]
        let reach = ext(10, 11);
        let transit = ext(2, 4);
        let back = reach.sum(transit.negated());
        assert_eq!(back, ext(6, 9));
    }
}
