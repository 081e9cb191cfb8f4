// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Ingress types: node descriptors from the data source, and what ingestion reports.

use canopy_path::{PathId, PathRemap};
use thiserror::Error;

/// Whether a node has children, as far as the tree knows.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Leaf {
    /// The node has no children.
    Yes,
    /// The node has children (loaded or not).
    No,
    /// The data source has not said yet.
    Unknown,
}

/// Where a described node goes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Placement<K> {
    /// Under the given parent (`None` for a root). The parent may appear later in the
    /// same batch.
    Parent(Option<K>),
    /// Under the node currently at the parent of this path (as of the start of the
    /// batch). The path must not be taken already.
    Path(PathId),
}

/// One node as reported by the data source.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeDescriptor<K> {
    /// Stable, externally assigned id.
    pub id: K,
    /// Parent or path.
    pub placement: Placement<K>,
    /// Rank among siblings; ties keep arrival order.
    pub sibling_order: i64,
    /// Whether the node has children. `None` when unknown (lazy subtrees).
    pub has_children: Option<bool>,
    /// Whether all children have been reported.
    pub children_complete: bool,
    /// Row height estimate for virtualization.
    pub estimated_height: Option<f64>,
}

impl<K> NodeDescriptor<K> {
    /// A root node.
    pub fn root(id: K, sibling_order: i64) -> Self {
        Self::new(id, Placement::Parent(None), sibling_order)
    }

    /// A child of `parent`.
    pub fn child(id: K, parent: K, sibling_order: i64) -> Self {
        Self::new(id, Placement::Parent(Some(parent)), sibling_order)
    }

    /// A node placed by path.
    pub fn at_path(id: K, path: PathId, sibling_order: i64) -> Self {
        Self::new(id, Placement::Path(path), sibling_order)
    }

    fn new(id: K, placement: Placement<K>, sibling_order: i64) -> Self {
        Self {
            id,
            placement,
            sibling_order,
            has_children: None,
            children_complete: false,
            estimated_height: None,
        }
    }

    /// Set whether the node has children.
    #[must_use]
    pub fn with_has_children(mut self, has_children: bool) -> Self {
        self.has_children = Some(has_children);
        self
    }

    /// Mark the node's children as fully reported.
    #[must_use]
    pub fn with_children_complete(mut self) -> Self {
        self.children_complete = true;
        self
    }

    /// Set the row height estimate.
    #[must_use]
    pub fn with_estimated_height(mut self, height: f64) -> Self {
        self.estimated_height = Some(height);
        self
    }
}

/// Why a descriptor was rejected.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum IngestError<K> {
    /// The id is already in the tree or earlier in the batch.
    #[error("duplicate node id {0:?}")]
    DuplicateId(K),
    /// The path is already taken, or repeated in the batch.
    #[error("duplicate path {0}")]
    DuplicatePath(PathId),
    /// The parent is neither in the tree nor accepted in the batch.
    #[error("node {id:?} names unknown parent {parent:?}")]
    UnknownParent {
        /// Rejected node.
        id: K,
        /// Missing parent.
        parent: K,
    },
    /// The node is its own ancestor (self-parent or a cycle within the batch).
    #[error("node {0:?} would be its own ancestor")]
    Cycle(K),
    /// No node lives at the parent of the given path.
    #[error("node {id:?} placed at {path}, but its parent path does not exist")]
    InvalidPath {
        /// Rejected node.
        id: K,
        /// Requested path.
        path: PathId,
    },
}

/// A rejected descriptor and its position in the batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rejected<K> {
    /// Zero-based index in the batch.
    pub index: usize,
    /// What was wrong.
    pub error: IngestError<K>,
}

/// A node whose path changed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Renamed<K> {
    /// The node.
    pub id: K,
    /// Path before the change.
    pub old: PathId,
    /// Path after the change.
    pub new: PathId,
}

/// Outcome of [`Tree::ingest`](crate::Tree::ingest).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IngestReport<K> {
    /// Ids inserted, parents before children.
    pub accepted: Vec<K>,
    /// Descriptors that were not applied.
    pub rejected: Vec<Rejected<K>>,
    /// How pre-existing paths moved to make room.
    pub remap: PathRemap,
    /// Pre-existing nodes whose path changed.
    pub renamed: Vec<Renamed<K>>,
}

impl<K> Default for IngestReport<K> {
    fn default() -> Self {
        Self {
            accepted: Vec::new(),
            rejected: Vec::new(),
            remap: PathRemap::new(),
            renamed: Vec::new(),
        }
    }
}

/// Outcome of [`Tree::remove`](crate::Tree::remove).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Removal<K> {
    /// The removed node and its descendants, in depth-first order.
    pub removed: Vec<K>,
    /// Path the removed node had.
    pub root_path: PathId,
    /// How the later siblings (and their subtrees) moved up.
    pub remap: PathRemap,
    /// Nodes whose path changed.
    pub renamed: Vec<Renamed<K>>,
}
