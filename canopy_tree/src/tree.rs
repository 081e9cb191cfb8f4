// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The structural store: always-resident node records, sibling groups, and paths.

use core::fmt::Debug;
use core::hash::Hash;

use canopy_path::{PathId, PathRemap};
use canopy_selection::Shape;
use hashbrown::{HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, warn};

use crate::descriptor::{
    IngestError, IngestReport, Leaf, NodeDescriptor, Placement, Rejected, Removal, Renamed,
};
use crate::edit::EditError;

/// The structural record of one node.
#[derive(Clone, Debug)]
pub struct Node<K> {
    pub(crate) parent: Option<K>,
    pub(crate) children: Vec<K>,
    pub(crate) path: PathId,
    pub(crate) sibling_order: i64,
    arrival: u64,
    has_children: Option<bool>,
    children_complete: bool,
    estimated_height: Option<f64>,
}

impl<K: Copy> Node<K> {
    /// Parent id, or `None` for roots.
    pub fn parent(&self) -> Option<K> {
        self.parent
    }

    /// Known children in sibling order.
    pub fn children(&self) -> &[K] {
        &self.children
    }

    /// Current path.
    pub fn path(&self) -> &PathId {
        &self.path
    }

    /// Depth (roots are 0).
    pub fn depth(&self) -> usize {
        self.path.depth()
    }

    /// Rank among siblings.
    pub fn sibling_order(&self) -> i64 {
        self.sibling_order
    }

    /// Whether all children have been reported.
    pub fn children_complete(&self) -> bool {
        self.children_complete
    }

    /// Row height estimate, if the data source gave one.
    pub fn estimated_height(&self) -> Option<f64> {
        self.estimated_height
    }

    /// Leaf state, combining loaded children with what the data source said.
    pub fn leaf(&self) -> Leaf {
        if !self.children.is_empty() {
            return Leaf::No;
        }
        match self.has_children {
            Some(true) => Leaf::No,
            Some(false) => Leaf::Yes,
            None if self.children_complete => Leaf::Yes,
            None => Leaf::Unknown,
        }
    }
}

/// A broken structural invariant, found by [`Tree::check_invariants`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum InvariantViolation<K> {
    /// A node's stored path disagrees with its position.
    #[error("node {id:?} stores path {stored} but its position gives {derived}")]
    PathMismatch {
        /// The node.
        id: K,
        /// Path stored on the node.
        stored: PathId,
        /// Path derived from the parent chain.
        derived: PathId,
    },
    /// The path index points at the wrong node or misses one.
    #[error("path index is stale at {0}")]
    StaleIndex(PathId),
    /// Sibling ranks decrease somewhere in a group.
    #[error("siblings under {parent:?} are out of order at position {position}")]
    SiblingOrder {
        /// Parent of the group (`None` for roots).
        parent: Option<K>,
        /// Position of the first out-of-order child.
        position: usize,
    },
    /// A child does not point back at the group it is listed in.
    #[error("node {0:?} is listed under a parent it does not name")]
    BrokenLink(K),
}

/// Always-resident structure of the tree.
///
/// Nodes are keyed by caller-assigned ids. Every node has a dense path: the child at
/// zero-based position `i` of a node at `p` lives at `p.child(i)`, and the `i`-th root at
/// `PathId::root(i)`. Paths are kept up to date by every structural operation, which
/// reports how they moved as a [`PathRemap`].
#[derive(Clone, Debug)]
pub struct Tree<K> {
    pub(crate) nodes: HashMap<K, Node<K>>,
    pub(crate) roots: Vec<K>,
    pub(crate) by_path: HashMap<PathId, K>,
    next_arrival: u64,
}

impl<K> Default for Tree<K> {
    fn default() -> Self {
        Self {
            nodes: HashMap::new(),
            roots: Vec::new(),
            by_path: HashMap::new(),
            next_arrival: 0,
        }
    }
}

impl<K> Tree<K>
where
    K: Copy + Eq + Hash + Debug,
{
    /// Create an empty tree.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the tree has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns `true` if `id` is in the tree.
    pub fn contains(&self, id: K) -> bool {
        self.nodes.contains_key(&id)
    }

    /// The structural record of `id`.
    pub fn get(&self, id: K) -> Option<&Node<K>> {
        self.nodes.get(&id)
    }

    /// Current path of `id`.
    pub fn path_of(&self, id: K) -> Option<&PathId> {
        self.nodes.get(&id).map(|n| &n.path)
    }

    /// The node currently at `path`.
    pub fn node_at(&self, path: &PathId) -> Option<K> {
        self.by_path.get(path).copied()
    }

    /// Parent of `id`, or `None` for roots and unknown ids.
    pub fn parent_of(&self, id: K) -> Option<K> {
        self.nodes.get(&id).and_then(|n| n.parent)
    }

    /// Children of `id` in sibling order, or an empty slice for unknown ids.
    pub fn children_of(&self, id: K) -> &[K] {
        self.nodes.get(&id).map_or(&[][..], |n| n.children.as_slice())
    }

    /// Root nodes in sibling order.
    pub fn roots(&self) -> &[K] {
        &self.roots
    }

    /// Proper ancestors of `id`, nearest first.
    pub fn ancestors(&self, id: K) -> impl Iterator<Item = K> + '_ {
        core::iter::successors(self.parent_of(id), move |&p| self.parent_of(p))
    }

    /// Proper descendants of `id` in depth-first order.
    pub fn descendants(&self, id: K) -> Vec<K> {
        let mut out = self.subtree(id);
        if !out.is_empty() {
            out.remove(0);
        }
        out
    }

    /// `id` followed by its descendants in depth-first order.
    pub fn subtree(&self, id: K) -> Vec<K> {
        let mut out = Vec::new();
        if !self.contains(id) {
            return out;
        }
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.children_of(current).iter().rev().copied());
        }
        out
    }

    /// Next node in depth-first order across the whole forest.
    ///
    /// Returns `None` at the end or for unknown ids. Does not wrap around.
    pub fn next_depth_first(&self, current: K) -> Option<K> {
        let node = self.nodes.get(&current)?;
        if let Some(&first) = node.children.first() {
            return Some(first);
        }
        let mut at = current;
        loop {
            if let Some(next) = self.next_sibling(at) {
                return Some(next);
            }
            at = self.parent_of(at)?;
        }
    }

    /// Previous node in depth-first order across the whole forest.
    pub fn prev_depth_first(&self, current: K) -> Option<K> {
        if !self.contains(current) {
            return None;
        }
        match self.prev_sibling(current) {
            Some(prev) => {
                let mut at = prev;
                while let Some(&last) = self.children_of(at).last() {
                    at = last;
                }
                Some(at)
            }
            None => self.parent_of(current),
        }
    }

    /// Record that every child of `id` has been reported.
    pub fn mark_children_complete(&mut self, id: K) -> bool {
        let Some(node) = self.nodes.get_mut(&id) else {
            return false;
        };
        node.children_complete = true;
        true
    }

    /// Update the row height estimate of `id`.
    pub fn set_estimated_height(&mut self, id: K, height: Option<f64>) -> bool {
        let Some(node) = self.nodes.get_mut(&id) else {
            return false;
        };
        node.estimated_height = height;
        true
    }

    /// Apply a batch of descriptors.
    ///
    /// Bad descriptors are rejected individually and the rest of the batch is applied.
    /// Descriptors may name parents that appear later in the batch. New nodes are slotted
    /// into their sibling group by `sibling_order` (ties keep arrival order) and every
    /// touched group is renumbered, so later siblings may get new paths; the report says
    /// how.
    pub fn ingest<I>(&mut self, batch: I) -> IngestReport<K>
    where
        I: IntoIterator<Item = NodeDescriptor<K>>,
    {
        let batch: Vec<NodeDescriptor<K>> = batch.into_iter().collect();
        let mut report = IngestReport::default();

        // Checks against the tree and earlier entries of the batch.
        let mut pending: HashMap<K, (usize, Option<K>)> = HashMap::new();
        let mut order: Vec<K> = Vec::new();
        let mut claimed: HashSet<PathId> = HashSet::new();
        for (index, descriptor) in batch.iter().enumerate() {
            let id = descriptor.id;
            if self.nodes.contains_key(&id) || pending.contains_key(&id) {
                report.rejected.push(Rejected {
                    index,
                    error: IngestError::DuplicateId(id),
                });
                continue;
            }
            let parent = match &descriptor.placement {
                Placement::Parent(parent) => {
                    if *parent == Some(id) {
                        report.rejected.push(Rejected {
                            index,
                            error: IngestError::Cycle(id),
                        });
                        continue;
                    }
                    *parent
                }
                Placement::Path(path) => match self.resolve_path_placement(id, path, &mut claimed) {
                    Ok(parent) => parent,
                    Err(error) => {
                        report.rejected.push(Rejected { index, error });
                        continue;
                    }
                },
            };
            pending.insert(id, (index, parent));
            order.push(id);
        }

        // Anchor entries to the existing tree, parents before children.
        let mut batch_children: HashMap<K, Vec<K>> = HashMap::new();
        let mut queue: Vec<K> = Vec::new();
        for &id in &order {
            match pending[&id].1 {
                Some(parent) if pending.contains_key(&parent) => {
                    batch_children.entry(parent).or_default().push(id);
                }
                Some(parent) if !self.nodes.contains_key(&parent) => {}
                _ => queue.push(id),
            }
        }
        let mut anchored: Vec<K> = Vec::with_capacity(order.len());
        let mut head = 0;
        while head < queue.len() {
            let id = queue[head];
            head += 1;
            anchored.push(id);
            if let Some(children) = batch_children.get(&id) {
                queue.extend(children.iter().copied());
            }
        }
        let anchored_set: HashSet<K> = anchored.iter().copied().collect();
        for &id in &order {
            if !anchored_set.contains(&id) {
                let (index, _) = pending[&id];
                report.rejected.push(Rejected {
                    index,
                    error: self.unanchored_error(id, &pending),
                });
            }
        }

        // Link, then renumber every touched group.
        let mut before: HashMap<Option<K>, Vec<K>> = HashMap::new();
        for &id in &anchored {
            let (index, parent) = pending[&id];
            let descriptor = &batch[index];
            if parent.is_none_or(|p| !anchored_set.contains(&p)) {
                before
                    .entry(parent)
                    .or_insert_with(|| self.group(parent).to_vec());
            }
            self.next_arrival += 1;
            self.nodes.insert(
                id,
                Node {
                    parent,
                    children: Vec::new(),
                    path: PathId::root(0),
                    sibling_order: descriptor.sibling_order,
                    arrival: self.next_arrival,
                    has_children: descriptor.has_children,
                    children_complete: descriptor.children_complete,
                    estimated_height: descriptor.estimated_height,
                },
            );
            if let Some(group) = self.group_mut(parent) {
                group.push(id);
            }
        }
        let mut touched: Vec<Option<K>> = before.keys().copied().collect();
        touched.extend(anchored.iter().map(|&id| Some(id)));
        for &parent in &touched {
            self.sort_group(parent);
        }
        let ranges = before
            .iter()
            .filter_map(|(&parent, old)| {
                let new = self.group(parent);
                let from = (0..new.len()).find(|&i| old.get(i) != new.get(i))?;
                Some((parent, from))
            })
            .collect();
        let (remap, renamed) = self.repath(ranges, &anchored_set);

        report.rejected.sort_by_key(|r| r.index);
        for rejected in &report.rejected {
            warn!(index = rejected.index, error = %rejected.error, "rejected node descriptor");
        }
        debug!(
            accepted = anchored.len(),
            rejected = report.rejected.len(),
            renamed = renamed.len(),
            "ingested batch"
        );
        report.accepted = anchored;
        report.remap = remap;
        report.renamed = renamed;
        report
    }

    /// Delete `id` and its subtree. Later siblings move up.
    pub fn remove(&mut self, id: K) -> Result<Removal<K>, EditError<K>> {
        let node = self.nodes.get(&id).ok_or(EditError::UnknownNode(id))?;
        let parent = node.parent;
        let root_path = node.path.clone();
        let position = self.position_of(id).ok_or(EditError::UnknownNode(id))?;

        let removed = self.subtree(id);
        for gone in &removed {
            if let Some(node) = self.nodes.remove(gone) {
                if self.by_path.get(&node.path) == Some(gone) {
                    self.by_path.remove(&node.path);
                }
            }
        }
        if let Some(group) = self.group_mut(parent) {
            group.remove(position);
        }
        let (remap, renamed) = self.repath(vec![(parent, position)], &HashSet::new());
        debug!(?id, path = %root_path, removed = removed.len(), "removed subtree");
        Ok(Removal {
            removed,
            root_path,
            remap,
            renamed,
        })
    }

    /// Verify the structural invariants over the whole tree.
    ///
    /// Every stored path must match the node's position, ranks must not decrease within a
    /// group, children must point back at their parent, and the path index must be exact.
    pub fn check_invariants(&self) -> Result<(), InvariantViolation<K>> {
        let mut groups: Vec<(Option<K>, Option<PathId>)> = vec![(None, None)];
        let mut visited = 0_usize;
        while let Some((parent, base)) = groups.pop() {
            let group = self.group(parent);
            for (position, &child) in group.iter().enumerate() {
                let node = self
                    .nodes
                    .get(&child)
                    .ok_or(InvariantViolation::BrokenLink(child))?;
                if node.parent != parent {
                    return Err(InvariantViolation::BrokenLink(child));
                }
                let derived = base
                    .as_ref()
                    .map_or_else(|| PathId::root(position), |b| b.child(position));
                if node.path != derived {
                    return Err(InvariantViolation::PathMismatch {
                        id: child,
                        stored: node.path.clone(),
                        derived,
                    });
                }
                if self.by_path.get(&node.path) != Some(&child) {
                    return Err(InvariantViolation::StaleIndex(node.path.clone()));
                }
                if position > 0 {
                    let prev = &self.nodes[&group[position - 1]];
                    if prev.sibling_order > node.sibling_order {
                        return Err(InvariantViolation::SiblingOrder { parent, position });
                    }
                }
                visited += 1;
                groups.push((Some(child), Some(derived)));
            }
        }
        if visited != self.nodes.len() || self.by_path.len() != self.nodes.len() {
            let stray = self
                .by_path
                .iter()
                .find(|(path, id)| self.nodes.get(*id).is_none_or(|n| &n.path != *path))
                .map_or_else(|| PathId::root(0), |(path, _)| path.clone());
            return Err(InvariantViolation::StaleIndex(stray));
        }
        Ok(())
    }

    pub(crate) fn group(&self, parent: Option<K>) -> &[K] {
        match parent {
            None => &self.roots,
            Some(p) => self.children_of(p),
        }
    }

    pub(crate) fn group_mut(&mut self, parent: Option<K>) -> Option<&mut Vec<K>> {
        match parent {
            None => Some(&mut self.roots),
            Some(p) => self.nodes.get_mut(&p).map(|n| &mut n.children),
        }
    }

    /// Zero-based position of `id` in its sibling group.
    pub(crate) fn position_of(&self, id: K) -> Option<usize> {
        let node = self.nodes.get(&id)?;
        let group = self.group(node.parent);
        let guess = node.path.position();
        if group.get(guess) == Some(&id) {
            return Some(guess);
        }
        group.iter().position(|&c| c == id)
    }

    /// Rewrite paths below the given `(parent, from)` ranges.
    ///
    /// Every child of `parent` at position `from` or later is a dirty root: its path and
    /// its whole subtree are recomputed from the parent's current path. Nodes in `fresh`
    /// were not in the tree before and get no remap rule.
    pub(crate) fn repath(
        &mut self,
        mut ranges: Vec<(Option<K>, usize)>,
        fresh: &HashSet<K>,
    ) -> (PathRemap, Vec<Renamed<K>>) {
        // Shallow groups first, so each node is rewritten once from a final parent path.
        ranges.sort_by_cached_key(|&(parent, _)| {
            parent.map_or(0, |p| self.ancestors(p).count() + 1)
        });

        let mut old_paths: HashMap<K, PathId> = HashMap::new();
        let mut dirty_roots: Vec<K> = Vec::new();
        let mut stack: Vec<(K, PathId)> = Vec::new();
        for (parent, from) in ranges {
            let base = match parent {
                Some(p) => match self.nodes.get(&p) {
                    Some(node) => Some(node.path.clone()),
                    None => continue,
                },
                None => None,
            };
            let roots: Vec<K> = self
                .group(parent)
                .get(from..)
                .map(<[K]>::to_vec)
                .unwrap_or_default();
            for (offset, root) in roots.into_iter().enumerate() {
                dirty_roots.push(root);
                if old_paths.contains_key(&root) {
                    continue;
                }
                let position = from + offset;
                let path = base
                    .as_ref()
                    .map_or_else(|| PathId::root(position), |b| b.child(position));
                stack.push((root, path));
                while let Some((id, path)) = stack.pop() {
                    let Some(node) = self.nodes.get_mut(&id) else {
                        continue;
                    };
                    let old = core::mem::replace(&mut node.path, path.clone());
                    old_paths.insert(id, old);
                    for (i, &child) in node.children.iter().enumerate() {
                        stack.push((child, path.child(i)));
                    }
                }
            }
        }

        for (id, old) in &old_paths {
            if !fresh.contains(id) && self.by_path.get(old) == Some(id) {
                self.by_path.remove(old);
            }
        }
        for &id in old_paths.keys() {
            if let Some(node) = self.nodes.get(&id) {
                self.by_path.insert(node.path.clone(), id);
            }
        }

        let mut remap = PathRemap::new();
        for root in dirty_roots {
            if fresh.contains(&root) {
                continue;
            }
            if let (Some(old), Some(node)) = (old_paths.get(&root), self.nodes.get(&root)) {
                remap.insert(old.clone(), node.path.clone());
            }
        }
        let mut renamed: Vec<Renamed<K>> = old_paths
            .into_iter()
            .filter(|(id, _)| !fresh.contains(id))
            .filter_map(|(id, old)| {
                let new = self.nodes.get(&id)?.path.clone();
                (old != new).then_some(Renamed { id, old, new })
            })
            .collect();
        renamed.sort_by(|a, b| a.old.cmp(&b.old));
        (remap, renamed)
    }

    /// Set each child's rank to its 1-based position where it differs. Returns the
    /// children that changed.
    pub(crate) fn renumber_siblings(&mut self, parent: Option<K>) -> Vec<K> {
        let group = self.group(parent).to_vec();
        let mut changed = Vec::new();
        for (rank, id) in (1_i64..).zip(group) {
            if let Some(node) = self.nodes.get_mut(&id) {
                if node.sibling_order != rank {
                    node.sibling_order = rank;
                    changed.push(id);
                }
            }
        }
        changed
    }

    fn sort_group(&mut self, parent: Option<K>) {
        let Some(group) = self.group_mut(parent) else {
            return;
        };
        let mut children = core::mem::take(group);
        children.sort_by_key(|id| {
            self.nodes
                .get(id)
                .map_or((i64::MAX, u64::MAX), |n| (n.sibling_order, n.arrival))
        });
        if let Some(group) = self.group_mut(parent) {
            *group = children;
        }
    }

    fn next_sibling(&self, id: K) -> Option<K> {
        let position = self.position_of(id)?;
        self.group(self.parent_of(id)).get(position + 1).copied()
    }

    fn prev_sibling(&self, id: K) -> Option<K> {
        let position = self.position_of(id)?.checked_sub(1)?;
        self.group(self.parent_of(id)).get(position).copied()
    }

    fn resolve_path_placement(
        &self,
        id: K,
        path: &PathId,
        claimed: &mut HashSet<PathId>,
    ) -> Result<Option<K>, IngestError<K>> {
        if self.by_path.contains_key(path) || !claimed.insert(path.clone()) {
            return Err(IngestError::DuplicatePath(path.clone()));
        }
        match path.parent() {
            None => Ok(None),
            Some(parent_path) => match self.by_path.get(&parent_path) {
                Some(&parent) => Ok(Some(parent)),
                None => Err(IngestError::InvalidPath {
                    id,
                    path: path.clone(),
                }),
            },
        }
    }

    /// Classify a batch entry that never reached the existing tree.
    fn unanchored_error(&self, id: K, pending: &HashMap<K, (usize, Option<K>)>) -> IngestError<K> {
        let Some(parent) = pending.get(&id).and_then(|&(_, p)| p) else {
            return IngestError::Cycle(id);
        };
        let mut seen: HashSet<K> = HashSet::new();
        let mut at = parent;
        loop {
            if at == id {
                return IngestError::Cycle(id);
            }
            if !seen.insert(at) {
                // The chain runs into a cycle that does not include `id`.
                return IngestError::UnknownParent { id, parent };
            }
            match pending.get(&at).and_then(|&(_, p)| p) {
                Some(next) => at = next,
                None => return IngestError::UnknownParent { id, parent },
            }
        }
    }
}

impl<K> Shape for Tree<K>
where
    K: Copy + Eq + Hash + Debug,
{
    fn child_count(&self, path: &PathId) -> usize {
        self.node_at(path).map_or(0, |id| self.children_of(id).len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> PathId {
        s.parse().unwrap()
    }

    /// Roots `1..=3`, each with children `10*r + 1 ..= 10*r + 2`.
    fn sample() -> Tree<u32> {
        let mut tree = Tree::new();
        let mut batch = Vec::new();
        for r in 1..=3_u32 {
            batch.push(NodeDescriptor::root(r, i64::from(r)));
            for c in 1..=2_u32 {
                batch.push(NodeDescriptor::child(10 * r + c, r, i64::from(c)));
            }
        }
        let report = tree.ingest(batch);
        assert!(report.rejected.is_empty(), "{:?}", report.rejected);
        tree
    }

    #[test]
    fn ingest_assigns_dense_paths() {
        let tree = sample();
        assert_eq!(tree.len(), 9);
        assert_eq!(tree.path_of(1), Some(&p("1")));
        assert_eq!(tree.path_of(22), Some(&p("2.2")));
        assert_eq!(tree.node_at(&p("3.1")), Some(31));
        assert_eq!(tree.parent_of(32), Some(3));
        assert_eq!(tree.children_of(2), [21, 22]);
        assert_eq!(tree.get(21).unwrap().depth(), 1);
        tree.check_invariants().unwrap();
    }

    #[test]
    fn children_may_arrive_before_parents() {
        let mut tree = Tree::new();
        let report = tree.ingest([
            NodeDescriptor::child(3, 2, 0),
            NodeDescriptor::child(2, 1, 0),
            NodeDescriptor::root(1, 0),
        ]);
        assert!(report.rejected.is_empty());
        assert_eq!(report.accepted, [1, 2, 3]);
        assert_eq!(tree.path_of(3), Some(&p("1.1.1")));
        tree.check_invariants().unwrap();
    }

    #[test]
    fn bad_descriptors_are_rejected_individually() {
        let mut tree = sample();
        let report = tree.ingest([
            NodeDescriptor::child(100, 1, 5),
            NodeDescriptor::root(1, 9),
            NodeDescriptor::child(101, 101, 0),
            NodeDescriptor::child(102, 999, 0),
            NodeDescriptor::child(103, 104, 0),
            NodeDescriptor::child(104, 103, 0),
            NodeDescriptor::at_path(105, p("7.1"), 0),
            NodeDescriptor::at_path(106, p("2.1"), 0),
            NodeDescriptor::child(107, 102, 0),
        ]);
        assert_eq!(report.accepted, [100]);
        let errors: Vec<_> = report.rejected.iter().map(|r| (r.index, r.error.clone())).collect();
        assert_eq!(
            errors,
            [
                (1, IngestError::DuplicateId(1)),
                (2, IngestError::Cycle(101)),
                (3, IngestError::UnknownParent { id: 102, parent: 999 }),
                (4, IngestError::Cycle(103)),
                (5, IngestError::Cycle(104)),
                (6, IngestError::InvalidPath { id: 105, path: p("7.1") }),
                (7, IngestError::DuplicatePath(p("2.1"))),
                (8, IngestError::UnknownParent { id: 107, parent: 102 }),
            ]
        );
        assert_eq!(tree.path_of(100), Some(&p("1.3")));
        tree.check_invariants().unwrap();
    }

    #[test]
    fn inserting_in_the_middle_shifts_later_siblings() {
        let mut tree = sample();
        let report = tree.ingest([NodeDescriptor::root(50, 1).with_has_children(false)]);
        // Rank 1 ties with root 1, and arrival order keeps 1 first.
        assert_eq!(tree.roots(), [1, 50, 2, 3]);
        assert_eq!(tree.path_of(50), Some(&p("2")));
        assert_eq!(tree.path_of(22), Some(&p("3.2")));
        assert_eq!(report.remap.rewrite(&p("2.2")), p("3.2"));
        assert_eq!(report.remap.rewrite(&p("3.1")), p("4.1"));
        assert_eq!(report.remap.rewrite(&p("1.1")), p("1.1"));
        let renamed: Vec<u32> = report.renamed.iter().map(|r| r.id).collect();
        assert_eq!(renamed, [2, 21, 22, 3, 31, 32]);
        assert_eq!(tree.get(50).unwrap().leaf(), Leaf::Yes);
        tree.check_invariants().unwrap();
    }

    #[test]
    fn path_placement_uses_the_parent_path() {
        let mut tree = sample();
        let report = tree.ingest([NodeDescriptor::at_path(23, p("2.3"), 3)]);
        assert!(report.rejected.is_empty());
        assert_eq!(tree.parent_of(23), Some(2));
        assert_eq!(tree.node_at(&p("2.3")), Some(23));
    }

    #[test]
    fn remove_shifts_later_siblings_up() {
        let mut tree = sample();
        let removal = tree.remove(1).unwrap();
        assert_eq!(removal.removed, [1, 11, 12]);
        assert_eq!(removal.root_path, p("1"));
        assert_eq!(tree.path_of(31), Some(&p("2.1")));
        assert_eq!(removal.remap.rewrite(&p("3.2")), p("2.2"));
        assert_eq!(tree.node_at(&p("3")), None);
        assert!(matches!(tree.remove(1), Err(EditError::UnknownNode(1))));
        tree.check_invariants().unwrap();
    }

    #[test]
    fn depth_first_walks_the_forest() {
        let tree = sample();
        let mut order = vec![1];
        while let Some(next) = tree.next_depth_first(*order.last().unwrap()) {
            order.push(next);
        }
        assert_eq!(order, [1, 11, 12, 2, 21, 22, 3, 31, 32]);

        let mut back = vec![32];
        while let Some(prev) = tree.prev_depth_first(*back.last().unwrap()) {
            back.push(prev);
        }
        back.reverse();
        assert_eq!(back, order);
        assert_eq!(tree.next_depth_first(999), None);
    }

    #[test]
    fn ancestors_and_descendants() {
        let mut tree = sample();
        tree.ingest([NodeDescriptor::child(211, 21, 0)]);
        assert_eq!(tree.ancestors(211).collect::<Vec<_>>(), [21, 2]);
        assert_eq!(tree.descendants(2), [21, 211, 22]);
        assert_eq!(tree.subtree(22), [22]);
        assert!(tree.descendants(999).is_empty());
    }

    #[test]
    fn leaf_state_combines_hints() {
        let mut tree = Tree::new();
        tree.ingest([
            NodeDescriptor::root(1, 0),
            NodeDescriptor::root(2, 1).with_has_children(true),
            NodeDescriptor::root(3, 2).with_children_complete(),
            NodeDescriptor::child(4, 2, 0),
        ]);
        assert_eq!(tree.get(1).unwrap().leaf(), Leaf::Unknown);
        assert_eq!(tree.get(2).unwrap().leaf(), Leaf::No);
        assert_eq!(tree.get(3).unwrap().leaf(), Leaf::Yes);
        assert!(tree.mark_children_complete(1));
        assert_eq!(tree.get(1).unwrap().leaf(), Leaf::Yes);
    }

    #[test]
    fn shape_counts_children_by_path() {
        let tree = sample();
        assert_eq!(tree.child_count(&p("2")), 2);
        assert_eq!(tree.child_count(&p("2.1")), 0);
        assert_eq!(tree.child_count(&p("9")), 0);
    }

    #[test]
    fn check_invariants_detects_corruption() {
        let mut tree = sample();
        if let Some(node) = tree.nodes.get_mut(&22) {
            node.path = p("2.5");
        }
        assert!(matches!(
            tree.check_invariants(),
            Err(InvariantViolation::PathMismatch { id: 22, .. })
        ));
    }
}
