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

//! A committable representation of all paths as chains of committed
//! indices.
//!
//! The committed nodes of every path are stored contiguously in one array.
//! A tentative change to a path is a list of *chains*: half-open ranges of
//! that array to be reused, in order. An operator that splices a segment of
//! a committed path into a new position therefore describes the new path
//! almost entirely by reference, and checkers can process a neighbor in
//! time proportional to the number of chains instead of the path length.
//!
//! [`PathState`] is shared read-only between the checkers evaluating the
//! same neighbor; only the owning path-state filter calls [`commit`] or
//! [`revert`].
//!
//! [`commit`]: PathState::commit
//! [`revert`]: PathState::revert

use std::cell::RefCell;
use std::rc::Rc;

use crate::collections::SparseBitset;
use crate::types::{FilterError, NodeId, PathId};

/// A [`PathState`] shared between the filters evaluating the same neighbor.
pub type SharedPathState = Rc<RefCell<PathState>>;

/// A half-open range of committed positions, reused as one piece of a
/// tentative path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChainBounds {
    /// First committed position of the chain.
    pub begin: usize,
    /// One past the last committed position of the chain.
    pub end: usize,
}

/// The range of chain slots describing one path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct PathBounds {
    begin: usize,
    end: usize,
}

/// Chain-based committable representation of all paths.
#[derive(Debug)]
pub struct PathState {
    num_nodes: usize,
    starts: Vec<NodeId>,
    ends: Vec<NodeId>,
    /// Committed nodes, one contiguous run per path, loops and stale copies
    /// after them. Compacted when it outgrows `max(16, 4 * num_nodes)`.
    committed_nodes: Vec<NodeId>,
    /// Position of each node in `committed_nodes`.
    committed_index: Vec<usize>,
    /// Committed path of each node, `None` for loops (unperformed nodes).
    committed_paths: Vec<Option<PathId>>,
    /// The first `num_paths` slots hold the committed chain of each path;
    /// the tail holds the tentative chain lists of changed paths.
    chains: Vec<ChainBounds>,
    /// Chain slots of each path, pointing either at the path's committed
    /// slot or into the tentative tail.
    paths: Vec<PathBounds>,
    changed_paths: SparseBitset,
    changed_loops: SparseBitset,
    is_invalid: bool,
}

impl PathState {
    /// Create the state for `num_nodes` nodes and one path per
    /// (start, end) pair. Initially every path is empty (start followed by
    /// end) and every other node is a loop.
    pub fn new(
        num_nodes: usize,
        starts: Vec<NodeId>,
        ends: Vec<NodeId>,
    ) -> Result<Self, FilterError> {
        if starts.len() != ends.len() {
            return Err(FilterError::LengthMismatch {
                what: "path ends",
                expected: starts.len(),
                got: ends.len(),
            });
        }
        if let Some(&node) = starts.iter().chain(ends.iter()).find(|&&n| n >= num_nodes) {
            return Err(FilterError::NodeOutOfRange(node, num_nodes));
        }
        let num_paths = starts.len();
        let mut committed_nodes = Vec::with_capacity(num_nodes);
        let mut committed_index = vec![usize::MAX; num_nodes];
        let mut committed_paths = vec![None; num_nodes];
        let mut chains = Vec::with_capacity(num_paths + 1);
        let mut paths = Vec::with_capacity(num_paths);
        for (path, (&start, &end)) in starts.iter().zip(ends.iter()).enumerate() {
            let begin = committed_nodes.len();
            committed_nodes.push(start);
            committed_nodes.push(end);
            committed_index[start] = begin;
            committed_index[end] = begin + 1;
            committed_paths[start] = Some(path);
            committed_paths[end] = Some(path);
            chains.push(ChainBounds {
                begin,
                end: begin + 2,
            });
            paths.push(PathBounds {
                begin: path,
                end: path + 1,
            });
        }
        for node in 0..num_nodes {
            if committed_index[node] == usize::MAX {
                committed_index[node] = committed_nodes.len();
                committed_nodes.push(node);
            }
        }
        Ok(Self {
            num_nodes,
            starts,
            ends,
            committed_nodes,
            committed_index,
            committed_paths,
            chains,
            paths,
            changed_paths: SparseBitset::with_capacity(num_paths),
            changed_loops: SparseBitset::with_capacity(num_nodes),
            is_invalid: false,
        })
    }

    /// The number of nodes, starts and ends included.
    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    /// The number of paths.
    pub fn num_paths(&self) -> usize {
        self.paths.len()
    }

    /// The start node of `path`.
    pub fn start(&self, path: PathId) -> NodeId {
        self.starts[path]
    }

    /// The end node of `path`.
    pub fn end(&self, path: PathId) -> NodeId {
        self.ends[path]
    }

    /// The committed position of `node`.
    pub fn committed_index(&self, node: NodeId) -> usize {
        self.committed_index[node]
    }

    /// The node at committed position `index`.
    pub fn committed_node(&self, index: usize) -> NodeId {
        self.committed_nodes[index]
    }

    /// The committed path of `node`, `None` if it is a loop. Tentative
    /// changes do not affect this query.
    pub fn path(&self, node: NodeId) -> Option<PathId> {
        self.committed_paths[node]
    }

    /// Replace the chain list of `path`. Each `(begin, end)` range refers
    /// to committed positions; ranges must describe a valid path from the
    /// path's start to its end under the proposed successor values.
    pub fn change_path(&mut self, path: PathId, chains: &[(usize, usize)]) {
        let begin = self.chains.len();
        self.chains
            .extend(chains.iter().map(|&(begin, end)| ChainBounds { begin, end }));
        self.paths[path] = PathBounds {
            begin,
            end: self.chains.len(),
        };
        self.changed_paths.set(path);
    }

    /// Declare `loops` to be unperformed in the proposed neighbor.
    pub fn change_loops(&mut self, loops: &[NodeId]) {
        for &node in loops {
            self.changed_loops.set(node);
        }
    }

    /// The chains currently describing `path`: the tentative list if the
    /// path changed, its committed run otherwise.
    pub fn chains(&self, path: PathId) -> impl Iterator<Item = &[NodeId]> + '_ {
        let PathBounds { begin, end } = self.paths[path];
        self.chains[begin..end]
            .iter()
            .map(move |cb| &self.committed_nodes[cb.begin..cb.end])
    }

    /// The nodes currently describing `path`, in order.
    pub fn nodes(&self, path: PathId) -> impl Iterator<Item = NodeId> + '_ {
        self.chains(path).flatten().copied()
    }

    /// The paths changed since the last commit or revert.
    pub fn changed_paths(&self) -> impl Iterator<Item = PathId> + '_ {
        self.changed_paths.iter()
    }

    /// The nodes declared loops since the last commit or revert.
    pub fn changed_loops(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.changed_loops.iter()
    }

    /// Mark the tentative state as unusable (e.g. the proposed successors
    /// contain a cycle). Sticky until [`revert`](Self::revert); while set,
    /// dependent checkers accept unconditionally and the neighbor is
    /// rejected elsewhere.
    pub fn set_invalid(&mut self) {
        self.is_invalid = true;
    }

    /// Whether the tentative state is unusable.
    pub fn is_invalid(&self) -> bool {
        self.is_invalid
    }

    /// Promote the tentative chains and loops to committed state.
    ///
    /// Committing an invalid state is a programmer error and panics.
    pub fn commit(&mut self) {
        assert!(!self.is_invalid, "cannot commit an invalid path state");
        let appended: usize = self
            .changed_paths
            .iter()
            .map(|p| self.nodes(p).count())
            .sum::<usize>()
            + self.changed_loops.len();
        if self.committed_nodes.len() + appended <= self.max_committed_size() {
            self.commit_incremental();
        } else {
            self.commit_full();
        }
        self.chains.truncate(self.paths.len());
        self.changed_paths.clear_all();
        self.changed_loops.clear_all();
    }

    /// Drop all tentative chains and loops and clear the invalid flag.
    pub fn revert(&mut self) {
        self.chains.truncate(self.paths.len());
        for path in self.changed_paths.iter() {
            self.paths[path] = PathBounds {
                begin: path,
                end: path + 1,
            };
        }
        self.changed_paths.clear_all();
        self.changed_loops.clear_all();
        self.is_invalid = false;
    }

    /// Size above which `commit` compacts the committed array.
    fn max_committed_size(&self) -> usize {
        16.max(4 * self.num_nodes)
    }

    /// Append the changed paths and new loops to the committed array,
    /// leaving the stale copies behind. O(changed).
    fn commit_incremental(&mut self) {
        let changed: Vec<PathId> = self.changed_paths.iter().collect();
        for path in changed {
            let PathBounds { begin, end } = self.paths[path];
            let bounds: Vec<ChainBounds> = self.chains[begin..end].to_vec();
            let new_begin = self.committed_nodes.len();
            for cb in bounds {
                for index in cb.begin..cb.end {
                    let node = self.committed_nodes[index];
                    self.committed_nodes.push(node);
                }
            }
            for position in new_begin..self.committed_nodes.len() {
                let node = self.committed_nodes[position];
                self.committed_index[node] = position;
                self.committed_paths[node] = Some(path);
            }
            self.chains[path] = ChainBounds {
                begin: new_begin,
                end: self.committed_nodes.len(),
            };
            self.paths[path] = PathBounds {
                begin: path,
                end: path + 1,
            };
        }
        let loops: Vec<NodeId> = self.changed_loops.iter().collect();
        for node in loops {
            self.committed_paths[node] = None;
            self.committed_index[node] = self.committed_nodes.len();
            self.committed_nodes.push(node);
        }
    }

    /// Rewrite the committed array from scratch: all paths first, loops at
    /// the tail, no stale entries. O(num_nodes).
    fn commit_full(&mut self) {
        let num_paths = self.paths.len();
        let mut new_nodes = Vec::with_capacity(self.num_nodes);
        let mut on_path = vec![false; self.num_nodes];
        let mut new_chains = Vec::with_capacity(num_paths);
        for path in 0..num_paths {
            let begin = new_nodes.len();
            let nodes: Vec<NodeId> = self.nodes(path).collect();
            for &node in &nodes {
                new_nodes.push(node);
                on_path[node] = true;
                self.committed_paths[node] = Some(path);
            }
            new_chains.push(ChainBounds {
                begin,
                end: new_nodes.len(),
            });
        }
        for node in 0..self.num_nodes {
            if !on_path[node] {
                self.committed_paths[node] = None;
                new_nodes.push(node);
            }
        }
        for (position, &node) in new_nodes.iter().enumerate() {
            self.committed_index[node] = position;
        }
        self.committed_nodes = new_nodes;
        self.chains.clear();
        self.chains.extend(new_chains);
        for path in 0..num_paths {
            self.paths[path] = PathBounds {
                begin: path,
                end: path + 1,
            };
        }
    }
}
