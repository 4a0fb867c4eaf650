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

//! A weighted wavelet tree over an append-only sequence of
//! `(height, weight)` pairs.
//!
//! The one supported query is
//! `range_sum_with_threshold(t, l, r) = Σ { weight[i] : l ≤ i < r ∧ height[i] ≥ t }`
//! in O(log #distinct heights). Elements are appended in batches; each
//! [`make_tree_from_new_elements`](WeightedWaveletTree::make_tree_from_new_elements)
//! builds a separate subtree for the pending batch, and queries must stay
//! within one batch (which holds for the path-energy checker, whose batches
//! are whole paths).

use crate::arith::cap_add;

/// One node of a batch subtree: a range of heights, split at the median.
#[derive(Debug)]
struct TreeNode {
    /// Smallest height stored in this node.
    height_min: i64,
    /// Elements with height ≥ `pivot` go right, others left. Meaningless
    /// for leaves.
    pivot: i64,
    /// `prefix_weight[i]` is the weight sum of the node's first `i`
    /// elements (saturating).
    prefix_weight: Vec<i64>,
    /// `left_count[i]` is how many of the node's first `i` elements went
    /// into the left child.
    left_count: Vec<u32>,
    left: Option<Box<TreeNode>>,
    right: Option<Box<TreeNode>>,
}

impl TreeNode {
    /// Build a node over `elements` (in sequence order) whose distinct
    /// sorted heights are `heights`.
    fn build(heights: &[i64], elements: &[(i64, i64)]) -> Self {
        let mut prefix_weight = Vec::with_capacity(elements.len() + 1);
        prefix_weight.push(0);
        for &(_, w) in elements {
            prefix_weight.push(cap_add(*prefix_weight.last().expect("non-empty"), w));
        }
        if heights.len() == 1 {
            return Self {
                height_min: heights[0],
                pivot: heights[0],
                prefix_weight,
                left_count: Vec::new(),
                left: None,
                right: None,
            };
        }
        let pivot = heights[heights.len() / 2];
        let mut left_count = Vec::with_capacity(elements.len() + 1);
        left_count.push(0);
        let (mut lower, mut upper) = (Vec::new(), Vec::new());
        for &(h, w) in elements {
            if h < pivot {
                lower.push((h, w));
            } else {
                upper.push((h, w));
            }
            left_count.push(lower.len() as u32);
        }
        let (lower_heights, upper_heights) = heights.split_at(heights.len() / 2);
        Self {
            height_min: heights[0],
            pivot,
            prefix_weight,
            left_count,
            left: (!lower.is_empty()).then(|| Box::new(Self::build(lower_heights, &lower))),
            right: (!upper.is_empty()).then(|| Box::new(Self::build(upper_heights, &upper))),
        }
    }

    /// Weight sum of elements `[begin, end)` of this node with height ≥
    /// `threshold`.
    fn sum(&self, threshold: i64, begin: usize, end: usize) -> i64 {
        if begin >= end {
            return 0;
        }
        if threshold <= self.height_min {
            return crate::arith::cap_sub(self.prefix_weight[end], self.prefix_weight[begin]);
        }
        if self.left.is_none() && self.right.is_none() {
            // leaf with a single height < threshold
            return 0;
        }
        let left_begin = self.left_count[begin] as usize;
        let left_end = self.left_count[end] as usize;
        let mut total = 0;
        if threshold < self.pivot {
            if let Some(left) = &self.left {
                total = cap_add(total, left.sum(threshold, left_begin, left_end));
            }
        }
        if let Some(right) = &self.right {
            total = cap_add(
                total,
                right.sum(threshold, begin - left_begin, end - left_end),
            );
        }
        total
    }
}

/// One committed batch: a subtree plus its base index in the sequence.
#[derive(Debug)]
struct Batch {
    base: usize,
    root: TreeNode,
}

/// Range sum with threshold over an append-only weighted sequence.
#[derive(Debug, Default)]
pub struct WeightedWaveletTree {
    pending: Vec<(i64, i64)>,
    batches: Vec<Batch>,
    /// Batch of each committed sequence index.
    tree_location: Vec<u32>,
}

impl WeightedWaveletTree {
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of committed elements.
    pub fn len(&self) -> usize {
        self.tree_location.len()
    }

    /// Whether the tree holds no committed element.
    pub fn is_empty(&self) -> bool {
        self.tree_location.is_empty()
    }

    /// Append an element to the pending batch. Invisible to queries until
    /// the next [`make_tree_from_new_elements`](Self::make_tree_from_new_elements).
    pub fn push_back(&mut self, height: i64, weight: i64) {
        self.pending.push((height, weight));
    }

    /// Build the subtree of the pending batch and commit its elements.
    pub fn make_tree_from_new_elements(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let base = self.tree_location.len();
        let batch = self.batches.len() as u32;
        self.tree_location
            .extend(std::iter::repeat(batch).take(self.pending.len()));
        let mut heights: Vec<i64> = self.pending.iter().map(|&(h, _)| h).collect();
        heights.sort_unstable();
        heights.dedup();
        let elements = std::mem::take(&mut self.pending);
        self.batches.push(Batch {
            base,
            root: TreeNode::build(&heights, &elements),
        });
    }

    /// Drop all elements, committed and pending.
    pub fn clear(&mut self) {
        self.pending.clear();
        self.batches.clear();
        self.tree_location.clear();
    }

    /// `Σ { weight[i] : begin ≤ i < end ∧ height[i] ≥ threshold }`, with
    /// saturating sums. `[begin, end)` must lie within a single batch.
    pub fn range_sum_with_threshold(&self, threshold: i64, begin: usize, end: usize) -> i64 {
        if begin >= end {
            return 0;
        }
        let batch = &self.batches[self.tree_location[begin] as usize];
        debug_assert_eq!(
            self.tree_location[begin],
            self.tree_location[end - 1],
            "query range spans batches"
        );
        batch.root.sum(threshold, begin - batch.base, end - batch.base)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    #[test]
    fn threshold_sums() {
        let mut tree = WeightedWaveletTree::new();
        for (h, w) in [(5, 1), (2, 2), (7, 3), (5, 4)] {
            tree.push_back(h, w);
        }
        tree.make_tree_from_new_elements();
        assert_eq!(tree.range_sum_with_threshold(5, 0, 4), 8);
        assert_eq!(tree.range_sum_with_threshold(6, 0, 4), 3);
        assert_eq!(tree.range_sum_with_threshold(8, 0, 4), 0);
        assert_eq!(tree.range_sum_with_threshold(i64::MIN, 0, 4), 10);
        assert_eq!(tree.range_sum_with_threshold(5, 1, 3), 3);
        assert_eq!(tree.range_sum_with_threshold(2, 1, 2), 2);
    }

    #[test]
    fn batches_are_independent() {
        let mut tree = WeightedWaveletTree::new();
        tree.push_back(1, 10);
        tree.push_back(3, 20);
        tree.make_tree_from_new_elements();
        tree.push_back(2, 40);
        // pending elements are not yet visible
        assert_eq!(tree.len(), 2);
        tree.make_tree_from_new_elements();
        assert_eq!(tree.len(), 3);
        assert_eq!(tree.range_sum_with_threshold(2, 0, 2), 20);
        assert_eq!(tree.range_sum_with_threshold(2, 2, 3), 40);
    }

    #[test]
    fn matches_brute_force() {
        let mut rng = StdRng::seed_from_u64(0x77a5);
        let mut tree = WeightedWaveletTree::new();
        let elements: Vec<(i64, i64)> = (0..80)
            .map(|_| (rng.gen_range(-20..20), rng.gen_range(-50..50)))
            .collect();
        for &(h, w) in &elements {
            tree.push_back(h, w);
        }
        tree.make_tree_from_new_elements();
        for threshold in -25..25 {
            for begin in 0..elements.len() {
                for end in begin..=elements.len() {
                    let expected: i64 = elements[begin..end]
                        .iter()
                        .filter(|&&(h, _)| h >= threshold)
                        .map(|&(_, w)| w)
                        .sum();
                    assert_eq!(
                        tree.range_sum_with_threshold(threshold, begin, end),
                        expected
                    );
                }
            }
        }
    }
}
