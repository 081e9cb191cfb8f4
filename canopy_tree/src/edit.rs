// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Structural edits: moving subtrees.

use core::fmt::Debug;
use core::hash::Hash;

use canopy_path::{PathId, PathRemap};
use hashbrown::HashSet;
use thiserror::Error;
use tracing::debug;

use crate::descriptor::Renamed;
use crate::tree::Tree;

/// Why a structural edit was refused. The tree is unchanged when one is returned.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum EditError<K> {
    /// The node to edit is not in the tree.
    #[error("unknown node {0:?}")]
    UnknownNode(K),
    /// The destination parent is not in the tree.
    #[error("unknown parent {0:?}")]
    UnknownParent(K),
    /// The destination is the node itself or one of its descendants.
    #[error("cannot move {node:?} under itself or its descendant {parent:?}")]
    Cycle {
        /// The node being moved.
        node: K,
        /// The requested parent.
        parent: K,
    },
    /// The destination index is past the end of the destination group.
    #[error("index {index} is out of range for a group of {len}")]
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Size of the destination group once the node is detached.
        len: usize,
    },
}

/// Outcome of [`Tree::move_node`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MoveOutcome<K> {
    /// Path of the moved node before the move.
    pub old_path: PathId,
    /// Path of the moved node after the move.
    pub new_path: PathId,
    /// How every affected path moved: the node's subtree, its old later siblings, and its
    /// new later siblings.
    pub remap: PathRemap,
    /// Nodes whose path changed.
    pub renamed: Vec<Renamed<K>>,
    /// Nodes whose sibling rank was renumbered.
    pub reordered: Vec<K>,
}

impl<K> Tree<K>
where
    K: Copy + Eq + Hash + Debug,
{
    /// Move `id` (with its subtree) to position `new_index` under `new_parent`.
    ///
    /// `new_index` counts the destination's children with `id` already detached, so
    /// moving within one group to index `i` leaves the node at position `i`. Both
    /// affected sibling groups get dense ranks afterwards, so a later ingest slots new
    /// nodes relative to the edited order.
    pub fn move_node(
        &mut self,
        id: K,
        new_parent: Option<K>,
        new_index: usize,
    ) -> Result<MoveOutcome<K>, EditError<K>> {
        let node = self.get(id).ok_or(EditError::UnknownNode(id))?;
        let old_parent = node.parent();
        let old_path = node.path().clone();
        if let Some(parent) = new_parent {
            if !self.contains(parent) {
                return Err(EditError::UnknownParent(parent));
            }
            if parent == id || self.ancestors(parent).any(|a| a == id) {
                return Err(EditError::Cycle { node: id, parent });
            }
        }
        let old_index = self.position_of(id).ok_or(EditError::UnknownNode(id))?;
        let len = self.group(new_parent).len() - usize::from(new_parent == old_parent);
        if new_index > len {
            return Err(EditError::IndexOutOfRange {
                index: new_index,
                len,
            });
        }

        if let Some(group) = self.group_mut(old_parent) {
            group.remove(old_index);
        }
        if let Some(group) = self.group_mut(new_parent) {
            group.insert(new_index, id);
        }
        if let Some(node) = self.nodes.get_mut(&id) {
            node.parent = new_parent;
        }

        let (remap, renamed) = self.repath(
            vec![(old_parent, old_index), (new_parent, new_index)],
            &HashSet::new(),
        );
        let mut reordered = self.renumber_siblings(old_parent);
        if new_parent != old_parent {
            reordered.extend(self.renumber_siblings(new_parent));
        }
        let new_path = self.path_of(id).cloned().unwrap_or_else(|| old_path.clone());
        debug!(?id, from = %old_path, to = %new_path, renamed = renamed.len(), "moved subtree");
        Ok(MoveOutcome {
            old_path,
            new_path,
            remap,
            renamed,
            reordered,
        })
    }
}
