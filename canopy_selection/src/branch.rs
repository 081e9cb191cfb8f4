// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Branch records and per-branch membership verdicts.

use canopy_path::PathId;

/// How a single [`Branch`] classifies a path.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// The path is the root or a descendant of the root, and not under an exception.
    Explicit,
    /// The path is at or under one of the branch's descendant exceptions.
    Excluded,
    /// The path is a proper ancestor of the root and is not an ancestor exception.
    Implicit,
    /// The branch says nothing about this path.
    Unrelated,
}

/// Combine per-branch verdicts into a membership answer.
///
/// Any [`Verdict::Explicit`] selects. Otherwise any [`Verdict::Excluded`] deselects, so a
/// descendant exception beats implicit ancestor coverage from another branch. Otherwise
/// any [`Verdict::Implicit`] selects. The answer depends only on which verdicts occur,
/// never on their order.
pub fn combine<I>(verdicts: I) -> bool
where
    I: IntoIterator<Item = Verdict>,
{
    let mut excluded = false;
    let mut implicit = false;
    for verdict in verdicts {
        match verdict {
            Verdict::Explicit => return true,
            Verdict::Excluded => excluded = true,
            Verdict::Implicit => implicit = true,
            Verdict::Unrelated => {}
        }
    }
    implicit && !excluded
}

/// A compressed selection unit: a subtree claimed as selected, modulo exceptions.
///
/// Every path prefixed by [`Branch::root`] is selected except those at or under an entry
/// of [`Branch::deselected_descendants`]. Proper ancestors of the root are implicitly
/// selected (so a selected leaf shows an unbroken chain of selected ancestors) unless
/// listed in [`Branch::deselected_ancestors`].
///
/// Both exception lists are kept sorted in depth-first order and free of redundant
/// entries: ancestor exceptions are proper ancestors of the root, descendant exceptions
/// are proper descendants of the root, and no descendant exception is nested under
/// another one.
///
/// [`Branch::sealed`] lists covered paths that were selected without their children.
/// It does not change membership. It tells the owner of the tree that children loaded
/// under those paths later must start out deselected (see
/// [`Selection::exclude_new_children`](crate::Selection::exclude_new_children)).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Branch {
    root: PathId,
    deselected_ancestors: Vec<PathId>,
    deselected_descendants: Vec<PathId>,
    sealed: Vec<PathId>,
}

impl Branch {
    /// A branch selecting the whole subtree at `root`.
    pub fn new(root: PathId) -> Self {
        Self {
            root,
            deselected_ancestors: Vec::new(),
            deselected_descendants: Vec::new(),
            sealed: Vec::new(),
        }
    }

    /// A branch with exception lists; redundant or misplaced entries are dropped.
    pub fn with_exceptions(
        root: PathId,
        deselected_ancestors: Vec<PathId>,
        deselected_descendants: Vec<PathId>,
    ) -> Self {
        let mut branch = Self {
            root,
            deselected_ancestors,
            deselected_descendants,
            sealed: Vec::new(),
        };
        branch.normalize();
        branch
    }

    /// Replace the sealed paths; entries this branch does not cover are dropped.
    #[must_use]
    pub fn with_sealed(mut self, sealed: Vec<PathId>) -> Self {
        self.sealed = sealed;
        self.normalize();
        self
    }

    /// Root of the selected subtree.
    pub fn root(&self) -> &PathId {
        &self.root
    }

    /// Proper ancestors of the root treated as not selected.
    pub fn deselected_ancestors(&self) -> &[PathId] {
        &self.deselected_ancestors
    }

    /// Subtrees under the root excluded from the selection.
    pub fn deselected_descendants(&self) -> &[PathId] {
        &self.deselected_descendants
    }

    /// Covered paths whose later-loaded children start out deselected.
    pub fn sealed(&self) -> &[PathId] {
        &self.sealed
    }

    /// Returns `true` if `path` is one of [`Branch::sealed`].
    pub fn is_sealed(&self, path: &PathId) -> bool {
        self.sealed.binary_search(path).is_ok()
    }

    /// Classify `path` against this branch.
    pub fn verdict(&self, path: &PathId) -> Verdict {
        if self.root.is_ancestor_or_self_of(path) {
            if contains_self_or_ancestor(&self.deselected_descendants, path) {
                Verdict::Excluded
            } else {
                Verdict::Explicit
            }
        } else if path.is_ancestor_of(&self.root) {
            if self.deselected_ancestors.binary_search(path).is_ok() {
                Verdict::Unrelated
            } else {
                Verdict::Implicit
            }
        } else {
            Verdict::Unrelated
        }
    }

    /// Returns `true` if this branch explicitly covers `path`.
    pub fn covers(&self, path: &PathId) -> bool {
        self.verdict(path) == Verdict::Explicit
    }

    pub(crate) fn deselect_ancestor(&mut self, path: PathId) {
        self.deselected_ancestors.push(path);
        self.normalize();
    }

    /// Returns `true` if `path` was listed.
    pub(crate) fn reselect_ancestor(&mut self, path: &PathId) -> bool {
        let before = self.deselected_ancestors.len();
        self.deselected_ancestors.retain(|a| a != path);
        before != self.deselected_ancestors.len()
    }

    pub(crate) fn deselect_descendant(&mut self, path: PathId) {
        self.deselected_descendants.push(path);
        self.normalize();
    }

    /// Replace the exception at exactly `path` with `replacements`.
    ///
    /// Returns `true` if `path` was listed.
    pub(crate) fn replace_descendant_exception<I>(&mut self, path: &PathId, replacements: I) -> bool
    where
        I: IntoIterator<Item = PathId>,
    {
        let Ok(at) = self.deselected_descendants.binary_search(path) else {
            return false;
        };
        self.deselected_descendants.remove(at);
        self.deselected_descendants.extend(replacements);
        self.normalize();
        true
    }

    pub(crate) fn seal(&mut self, path: PathId) {
        self.sealed.push(path);
        self.normalize();
    }

    /// Remove and return the descendant exceptions strictly under `path`.
    pub(crate) fn take_exceptions_under(&mut self, path: &PathId) -> Vec<PathId> {
        let (under, rest): (Vec<PathId>, Vec<PathId>) =
            core::mem::take(&mut self.deselected_descendants)
                .into_iter()
                .partition(|d| path.is_ancestor_of(d));
        self.deselected_descendants = rest;
        under
    }

    /// Remove and return the sealed paths at or under `path`.
    pub(crate) fn take_sealed_at(&mut self, path: &PathId) -> Vec<PathId> {
        let (at, rest): (Vec<PathId>, Vec<PathId>) = core::mem::take(&mut self.sealed)
            .into_iter()
            .partition(|s| path.is_ancestor_or_self_of(s));
        self.sealed = rest;
        at
    }

    /// Forget exception entries at or under `path`.
    pub(crate) fn forget_exceptions_at(&mut self, path: &PathId) {
        self.deselected_descendants
            .retain(|d| !path.is_ancestor_or_self_of(d));
        self.deselected_ancestors
            .retain(|a| !path.is_ancestor_or_self_of(a));
        self.sealed.retain(|s| !path.is_ancestor_or_self_of(s));
    }

    /// Apply `rewrite` to the root and every exception, then re-normalize.
    pub(crate) fn rewrite_paths(&mut self, mut rewrite: impl FnMut(&PathId) -> PathId) {
        self.root = rewrite(&self.root);
        for path in &mut self.deselected_ancestors {
            *path = rewrite(path);
        }
        for path in &mut self.deselected_descendants {
            *path = rewrite(path);
        }
        for path in &mut self.sealed {
            *path = rewrite(path);
        }
        self.normalize();
    }

    /// Restore the exception-list invariants.
    pub(crate) fn normalize(&mut self) {
        let root = &self.root;
        self.deselected_ancestors.retain(|a| a.is_ancestor_of(root));
        self.deselected_ancestors.sort();
        self.deselected_ancestors.dedup();

        self.deselected_descendants.retain(|d| root.is_ancestor_of(d));
        self.deselected_descendants.sort();
        self.deselected_descendants.dedup();
        // Depth-first order puts every entry before the entries nested under it.
        let mut kept: Vec<PathId> = Vec::with_capacity(self.deselected_descendants.len());
        for d in self.deselected_descendants.drain(..) {
            if kept.last().is_some_and(|last| last.is_ancestor_of(&d)) {
                continue;
            }
            kept.push(d);
        }
        self.deselected_descendants = kept;

        let excluded = &self.deselected_descendants;
        self.sealed.retain(|s| {
            root.is_ancestor_or_self_of(s) && !contains_self_or_ancestor(excluded, s)
        });
        self.sealed.sort();
        self.sealed.dedup();
    }
}

/// Whether a sorted, nesting-free exception list contains `path` or one of its ancestors.
fn contains_self_or_ancestor(sorted: &[PathId], path: &PathId) -> bool {
    if sorted.is_empty() {
        return false;
    }
    if sorted.binary_search(path).is_ok() {
        return true;
    }
    path.ancestors().any(|a| sorted.binary_search(&a).is_ok())
}
