// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Selection snapshots and the add / remove / optimize / remap algorithms.

use std::sync::Arc;

use canopy_path::{PathId, PathRemap};
use tracing::{debug, trace};

use crate::branch::{Branch, Verdict, combine};
use crate::shape::{SelectionFlags, Shape};

/// An immutable snapshot of a selection: an ordered list of [`Branch`] records.
///
/// Every mutating operation returns a new snapshot and leaves `self` untouched, so a
/// reader holding a snapshot never observes a half-applied update. Cloning is cheap (the
/// branch list is shared behind an [`Arc`]).
///
/// Equality compares the branch lists structurally. Two selections that denote the same
/// node set but are fragmented differently compare unequal; use
/// [`Selection::denotes_same`] or compare [`Selection::optimize`] outputs instead.
#[derive(Clone, Debug, Default)]
pub struct Selection {
    branches: Arc<Vec<Branch>>,
    version: u64,
}

impl PartialEq for Selection {
    fn eq(&self, other: &Self) -> bool {
        self.branches == other.branches
    }
}

impl Eq for Selection {}

impl Selection {
    /// An empty selection.
    pub fn new() -> Self {
        Self::default()
    }

    /// A selection holding `branches` as given (not optimized).
    pub fn from_branches<I>(branches: I) -> Self
    where
        I: IntoIterator<Item = Branch>,
    {
        Self {
            branches: Arc::new(branches.into_iter().collect()),
            version: 0,
        }
    }

    /// The branch records.
    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    /// Number of branch records.
    pub fn len(&self) -> usize {
        self.branches.len()
    }

    /// Returns `true` if nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    /// Monotonic counter bumped by every operation that changes the branch list.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Roots of all branches, in record order.
    pub fn roots(&self) -> impl Iterator<Item = &PathId> + '_ {
        self.branches.iter().map(Branch::root)
    }

    /// Returns `true` if `path` is selected. See [`is_selected`].
    pub fn is_selected(&self, path: &PathId) -> bool {
        is_selected(path, &self.branches)
    }

    /// Returns `true` if some branch covers `path` as its root or a descendant.
    pub fn is_explicitly_selected(&self, path: &PathId) -> bool {
        self.branches.iter().any(|b| b.covers(path))
    }

    /// Returns `true` if both selections agree on every path in `universe`.
    pub fn denotes_same<'a, I>(&self, other: &Self, universe: I) -> bool
    where
        I: IntoIterator<Item = &'a PathId>,
    {
        universe
            .into_iter()
            .all(|path| self.is_selected(path) == other.is_selected(path))
    }

    /// Select `node`. See [`add`] for the rules.
    #[must_use]
    pub fn add<S: Shape>(&self, node: &PathId, shape: &S, flags: SelectionFlags) -> Self {
        let mut branches = self.branches.to_vec();
        if add_in(&mut branches, node, shape, flags) {
            self.successor(branches)
        } else {
            self.clone()
        }
    }

    /// Deselect `node`. See [`remove`] for the rules.
    #[must_use]
    pub fn remove<S: Shape>(&self, node: &PathId, shape: &S, flags: SelectionFlags) -> Self {
        let mut branches = self.branches.to_vec();
        if remove_in(&mut branches, node, shape, flags) {
            self.successor(branches)
        } else {
            self.clone()
        }
    }

    /// Merge nested branches and drop redundant exceptions. See [`optimize`].
    #[must_use]
    pub fn optimize(&self) -> Self {
        let optimized = optimize(&self.branches);
        if optimized == *self.branches {
            self.clone()
        } else {
            self.successor(optimized)
        }
    }

    /// Rewrite every root and exception through `remap`.
    #[must_use]
    pub fn remap(&self, remap: &PathRemap) -> Self {
        if remap.is_empty() {
            return self.clone();
        }
        let mut branches = self.branches.to_vec();
        remap_in(&mut branches, remap);
        self.successor(branches)
    }

    /// Rewrite through `remap` after the subtree at `moved_old` was moved elsewhere.
    ///
    /// Branches that strictly contained the moved node lose it to the move: the moved
    /// subtree is carved into its own branch (carrying the exceptions beneath it) before
    /// the rewrite, so the selection follows the nodes rather than their old positions.
    #[must_use]
    pub fn remap_moved(&self, remap: &PathRemap, moved_old: &PathId) -> Self {
        let mut branches = self.branches.to_vec();
        let mut carved = Vec::new();
        for branch in &mut branches {
            if branch.root().is_ancestor_of(moved_old) && branch.covers(moved_old) {
                let carried = branch.take_exceptions_under(moved_old);
                let sealed = branch.take_sealed_at(moved_old);
                carved.push(
                    Branch::with_exceptions(moved_old.clone(), Vec::new(), carried)
                        .with_sealed(sealed),
                );
            }
        }
        if !carved.is_empty() {
            trace!(
                moved = %moved_old,
                carved = carved.len(),
                "carved moved subtree out of branches"
            );
        }
        branches.extend(carved);
        remap_in(&mut branches, remap);
        self.successor(branches)
    }

    /// Forget every branch and exception at or under `path` (for deleted subtrees).
    #[must_use]
    pub fn drop_subtree(&self, path: &PathId) -> Self {
        let mut branches = self.branches.to_vec();
        branches.retain(|b| !path.is_ancestor_or_self_of(b.root()));
        for branch in &mut branches {
            branch.forget_exceptions_at(path);
        }
        if branches == *self.branches {
            self.clone()
        } else {
            self.successor(branches)
        }
    }

    /// Deselect freshly loaded `children` of `parent` in every branch that sealed it.
    ///
    /// Call this after inserting nodes under an existing parent (and after applying the
    /// insertion's remap), so that "select this node only" keeps meaning the node alone
    /// once its children arrive.
    #[must_use]
    pub fn exclude_new_children<I>(&self, parent: &PathId, children: I) -> Self
    where
        I: IntoIterator<Item = PathId>,
    {
        if !self.branches.iter().any(|b| b.is_sealed(parent)) {
            return self.clone();
        }
        let children: Vec<PathId> = children
            .into_iter()
            .filter(|c| c.parent().as_ref() == Some(parent))
            .collect();
        if children.is_empty() {
            return self.clone();
        }
        let mut branches = self.branches.to_vec();
        for branch in branches.iter_mut().filter(|b| b.is_sealed(parent)) {
            for child in &children {
                branch.deselect_descendant(child.clone());
            }
        }
        trace!(
            parent = %parent,
            children = children.len(),
            "excluded children of sealed node"
        );
        self.successor(branches)
    }

    /// An empty selection that continues this snapshot's version sequence.
    #[must_use]
    pub fn cleared(&self) -> Self {
        self.successor(Vec::new())
    }

    fn successor(&self, branches: Vec<Branch>) -> Self {
        Self {
            branches: Arc::new(branches),
            version: self.version + 1,
        }
    }
}

/// Returns `true` if `path` is selected by `branches`.
///
/// Each branch classifies the path independently (see [`Branch::verdict`]) and the
/// verdicts are combined with [`combine`]: explicit coverage wins, then descendant
/// exceptions, then implicit ancestor coverage. Branch order never matters.
pub fn is_selected(path: &PathId, branches: &[Branch]) -> bool {
    combine(branches.iter().map(|b| b.verdict(path)))
}

/// Select `node` in `branches`, returning the new branch list.
///
/// - No-op if `node` is explicitly selected, or selected at all when descendant
///   exceptions are allowed ("select this node only" already holds).
/// - If `node` is an ancestor exception and ancestor exceptions are allowed, it is taken
///   off those lists.
/// - If `node` is exactly a descendant exception and descendant exceptions are allowed,
///   the exception is replaced by exceptions for `node`'s immediate children.
/// - Otherwise a new branch is rooted at `node`. Its immediate children are pre-excluded
///   when descendant exceptions are allowed, and its currently unselected ancestors are
///   pre-excluded when ancestor exceptions are allowed.
///
/// Whenever children are pre-excluded, `node` is also recorded in [`Branch::sealed`] so
/// children loaded later can be excluded too.
pub fn add<S: Shape>(
    node: &PathId,
    branches: &[Branch],
    shape: &S,
    allow_deselecting_ancestors: bool,
    allow_deselecting_descendants: bool,
) -> Vec<Branch> {
    let mut branches = branches.to_vec();
    let flags =
        SelectionFlags::from_allow(allow_deselecting_ancestors, allow_deselecting_descendants);
    add_in(&mut branches, node, shape, flags);
    branches
}

/// Deselect `node` in `branches`, returning the new branch list.
///
/// - Branches rooted exactly at `node` are deleted.
/// - Branches strictly containing `node` either gain a descendant exception (when
///   allowed) or are split into sibling branches covering everything but `node`'s
///   subtree.
/// - If `node` is then still selected through implicit ancestor coverage, it is added to
///   the ancestor exceptions of the covering branches (when allowed), or the branches
///   rooted under it are deleted.
///
/// Afterwards `node` is never selected.
pub fn remove<S: Shape>(
    node: &PathId,
    branches: &[Branch],
    shape: &S,
    allow_deselecting_ancestors: bool,
    allow_deselecting_descendants: bool,
) -> Vec<Branch> {
    let mut branches = branches.to_vec();
    let flags =
        SelectionFlags::from_allow(allow_deselecting_ancestors, allow_deselecting_descendants);
    remove_in(&mut branches, node, shape, flags);
    branches
}

/// Merge nested branches into their outermost mergeable ancestor.
///
/// A branch `inner` whose root is at or under the root of `outer` merges into `outer`
/// unless `inner`'s root lies strictly under one of `outer`'s descendant exceptions (that
/// combination has no exact single-branch form). The merged branch excludes exactly the
/// nodes both branches excluded. The result is normalized and sorted by root, and
/// `optimize(&optimize(x)) == optimize(x)`.
pub fn optimize(branches: &[Branch]) -> Vec<Branch> {
    let mut list: Vec<Branch> = branches
        .iter()
        .cloned()
        .map(|mut b| {
            b.normalize();
            b
        })
        .collect();
    list.sort();
    list.dedup();

    loop {
        let mut merged_any = false;
        let mut kept: Vec<Branch> = Vec::with_capacity(list.len());
        for branch in list.drain(..) {
            // `kept` is sorted by root, so candidate outers precede `branch`.
            match kept.iter().rposition(|outer| can_absorb(outer, &branch)) {
                Some(at) => {
                    kept[at] = merge(&kept[at], &branch);
                    merged_any = true;
                }
                None => kept.push(branch),
            }
        }
        kept.sort();
        kept.dedup();
        list = kept;
        if !merged_any {
            return list;
        }
    }
}

fn add_in<S: Shape>(
    branches: &mut Vec<Branch>,
    node: &PathId,
    shape: &S,
    flags: SelectionFlags,
) -> bool {
    if branches.iter().any(|b| b.covers(node)) {
        return false;
    }
    if flags.descendants() && is_selected(node, branches) {
        return false;
    }

    if flags.ancestors() {
        let mut listed = false;
        for branch in branches.iter_mut() {
            listed |= branch.reselect_ancestor(node);
        }
        if listed && flags.descendants() && is_selected(node, branches) {
            trace!(node = %node, "reselected ancestor exception");
            return true;
        }
    }

    if flags.descendants() {
        let mut replaced = false;
        for branch in branches.iter_mut() {
            if branch.replace_descendant_exception(node, shape.child_paths(node)) {
                branch.seal(node.clone());
                replaced = true;
            }
        }
        if replaced && branches.iter().any(|b| b.covers(node)) {
            trace!(node = %node, "reselected descendant exception");
            return true;
        }
    }

    let ancestors = if flags.ancestors() {
        node.ancestors()
            .filter(|a| !is_selected(a, branches))
            .collect()
    } else {
        Vec::new()
    };
    let (descendants, sealed) = if flags.descendants() {
        (shape.child_paths(node), vec![node.clone()])
    } else {
        (Vec::new(), Vec::new())
    };
    trace!(node = %node, "new branch");
    branches.push(
        Branch::with_exceptions(node.clone(), ancestors, descendants).with_sealed(sealed),
    );
    true
}

fn remove_in<S: Shape>(
    branches: &mut Vec<Branch>,
    node: &PathId,
    shape: &S,
    flags: SelectionFlags,
) -> bool {
    if !is_selected(node, branches) {
        return false;
    }

    let mut lost = Vec::new();
    let mut out = Vec::with_capacity(branches.len());
    for mut branch in branches.drain(..) {
        if branch.root() == node {
            lost.extend_from_slice(branch.deselected_descendants());
        } else if branch.root().is_ancestor_of(node) && branch.covers(node) {
            if flags.descendants() {
                branch.deselect_descendant(node.clone());
                out.push(branch);
            } else {
                let (pieces, dropped) = split(&branch, node, shape);
                out.extend(pieces);
                lost.extend(dropped);
            }
        } else {
            out.push(branch);
        }
    }
    *branches = out;
    keep_excluded(branches, &lost);

    if is_selected(node, branches) {
        if flags.ancestors() {
            for branch in branches.iter_mut() {
                if branch.verdict(node) == Verdict::Implicit {
                    branch.deselect_ancestor(node.clone());
                }
            }
        } else {
            branches.retain(|b| !node.is_ancestor_or_self_of(b.root()));
        }
    }
    true
}

/// Cover `branch` minus the subtree at `node` without using a new exception.
///
/// Walks the chain from the branch root down to `node` and emits one branch per sibling
/// off the chain. Chain nodes stay selected through implicit ancestor coverage only.
/// Also returns the descendant exceptions no piece carries over.
fn split<S: Shape>(branch: &Branch, node: &PathId, shape: &S) -> (Vec<Branch>, Vec<PathId>) {
    let mut chain: Vec<PathId> = node
        .ancestors()
        .take_while(|a| branch.root().is_ancestor_or_self_of(a))
        .collect();
    chain.reverse();

    let mut pieces = Vec::new();
    for (i, parent) in chain.iter().enumerate() {
        let on_chain = chain.get(i + 1).unwrap_or(node);
        for child in shape.child_paths(parent) {
            if &child == on_chain || !branch.covers(&child) {
                continue;
            }
            let exceptions = branch
                .deselected_descendants()
                .iter()
                .filter(|d| child.is_ancestor_of(d))
                .cloned()
                .collect();
            let sealed = branch
                .sealed()
                .iter()
                .filter(|s| child.is_ancestor_or_self_of(s))
                .cloned()
                .collect();
            pieces.push(
                Branch::with_exceptions(child, branch.deselected_ancestors().to_vec(), exceptions)
                    .with_sealed(sealed),
            );
        }
    }
    debug!(
        root = %branch.root(),
        removed = %node,
        pieces = pieces.len(),
        "split branch around removed node"
    );
    let dropped = branch
        .deselected_descendants()
        .iter()
        .filter(|d| !pieces.iter().any(|piece| piece.root().is_ancestor_of(d)))
        .cloned()
        .collect();
    (pieces, dropped)
}

/// Keep the paths under `lost` exceptions unselected after their branch stopped
/// recording them.
///
/// A descendant exception overrides implicit coverage from branches rooted beneath it.
/// Once the exception is gone, those branches list the affected ancestors themselves.
fn keep_excluded(branches: &mut [Branch], lost: &[PathId]) {
    for exception in lost {
        for branch in branches.iter_mut() {
            if !exception.is_ancestor_of(branch.root()) {
                continue;
            }
            let hidden: Vec<PathId> = branch
                .root()
                .ancestors()
                .take_while(|a| exception.is_ancestor_or_self_of(a))
                .collect();
            for ancestor in hidden {
                branch.deselect_ancestor(ancestor);
            }
        }
    }
}

fn can_absorb(outer: &Branch, inner: &Branch) -> bool {
    outer.root().is_ancestor_or_self_of(inner.root())
        && !outer
            .deselected_descendants()
            .iter()
            .any(|d| d.is_ancestor_of(inner.root()))
}

/// Union of two branches where `outer` can absorb `inner`.
fn merge(outer: &Branch, inner: &Branch) -> Branch {
    let inner_root = inner.root();
    let mut descendants = Vec::new();
    for d in outer.deselected_descendants() {
        if !d.is_comparable_with(inner_root) {
            descendants.push(d.clone());
            continue;
        }
        // `d` is at or under the inner root: excluded only where `inner` excludes too.
        for e in inner.deselected_descendants() {
            if e.is_ancestor_or_self_of(d) {
                descendants.push(d.clone());
            } else if d.is_ancestor_of(e) {
                descendants.push(e.clone());
            }
        }
    }
    let ancestors = outer
        .deselected_ancestors()
        .iter()
        .filter(|a| inner.deselected_ancestors().contains(a))
        .cloned()
        .collect();
    // A path stays sealed only if no side selects its future children.
    let sealed = outer
        .sealed()
        .iter()
        .chain(inner.sealed())
        .filter(|s| keeps_seal(outer, s) && keeps_seal(inner, s))
        .cloned()
        .collect();
    Branch::with_exceptions(outer.root().clone(), ancestors, descendants).with_sealed(sealed)
}

fn keeps_seal(branch: &Branch, path: &PathId) -> bool {
    !branch.covers(path) || branch.is_sealed(path)
}

fn remap_in(branches: &mut [Branch], remap: &PathRemap) {
    for branch in branches.iter_mut() {
        branch.rewrite_paths(|path| remap.rewrite(path));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::Leaves;

    fn p(s: &str) -> PathId {
        s.parse().unwrap()
    }

    /// Every node has `fan` children, down to `depth` levels.
    struct Uniform {
        fan: usize,
        depth: usize,
    }

    impl Shape for Uniform {
        fn child_count(&self, path: &PathId) -> usize {
            if path.len() < self.depth { self.fan } else { 0 }
        }
    }

    impl Uniform {
        fn all_paths(&self) -> Vec<PathId> {
            let mut out = Vec::new();
            let mut stack: Vec<PathId> = (0..self.fan).rev().map(PathId::root).collect();
            while let Some(path) = stack.pop() {
                for i in (0..self.child_count(&path)).rev() {
                    stack.push(path.child(i));
                }
                out.push(path);
            }
            out
        }
    }

    const TREE: Uniform = Uniform { fan: 3, depth: 3 };
    const DEEP: Uniform = Uniform { fan: 3, depth: 4 };
    const NONE: SelectionFlags = SelectionFlags::empty();

    #[test]
    fn split_when_descendant_exceptions_are_disallowed() {
        let selection = Selection::new().add(&p("1"), &TREE, NONE);
        assert_eq!(selection.len(), 1);

        let split = selection.remove(&p("1.2"), &TREE, NONE);
        let roots: Vec<String> = split.roots().map(ToString::to_string).collect();
        assert_eq!(roots, ["1.1", "1.3"]);
        assert!(split.branches().iter().all(|b| b.deselected_descendants().is_empty()));
        assert!(!split.is_selected(&p("1.2")));
        assert!(!split.is_selected(&p("1.2.1")));
        assert!(split.is_selected(&p("1.1")));
        assert!(split.is_selected(&p("1.3.2")));
        // The parent stays visibly selected through its remaining children.
        assert!(split.is_selected(&p("1")));
        // The original snapshot is untouched.
        assert!(selection.is_selected(&p("1.2")));
        assert!(split.version() > selection.version());
    }

    #[test]
    fn deep_split_carries_exceptions() {
        let selection = Selection::new()
            .add(&p("1"), &DEEP, NONE)
            .remove(&p("1.3.1"), &DEEP, SelectionFlags::ALLOW_DESELECTING_DESCENDANTS);
        assert_eq!(selection.len(), 1);
        assert_eq!(selection.branches()[0].deselected_descendants(), [p("1.3.1")]);

        let split = selection.remove(&p("1.3.2.1"), &DEEP, NONE);
        let roots: Vec<String> = split.roots().map(ToString::to_string).collect();
        assert_eq!(roots, ["1.1", "1.2", "1.3.3", "1.3.2.2", "1.3.2.3"]);
        assert!(!split.is_selected(&p("1.3.1")));
        assert!(!split.is_selected(&p("1.3.2.1")));
        for path in ["1.1.3", "1.2", "1.3.3.1", "1.3.2.2", "1.3.2"] {
            assert!(split.is_selected(&p(path)), "{path} should stay selected");
        }
    }

    #[test]
    fn split_keeps_dropped_exceptions_in_force() {
        // `1.1` is excluded from branch `1`, which beats the implicit coverage
        // branch `1.1.2.1` gives its ancestors.
        let selection = Selection::from_branches([
            Branch::with_exceptions(p("1"), vec![], vec![p("1.1")]),
            Branch::new(p("1.1.2.1")),
        ]);
        assert!(!selection.is_selected(&p("1.1.2")));

        let split = selection.remove(&p("1.3"), &DEEP, NONE);
        assert!(!split.is_selected(&p("1.3")));
        assert!(!split.is_selected(&p("1.1")));
        assert!(!split.is_selected(&p("1.1.2")));
        assert!(split.is_selected(&p("1.1.2.1")));
        assert!(split.is_selected(&p("1.2.2")));
        let deep = split
            .branches()
            .iter()
            .find(|b| b.root() == &p("1.1.2.1"))
            .unwrap();
        assert_eq!(deep.deselected_ancestors(), [p("1.1"), p("1.1.2")]);
    }

    #[test]
    fn remove_with_exceptions_allowed_keeps_one_branch() {
        let flags = SelectionFlags::ALLOW_DESELECTING_DESCENDANTS;
        let selection = Selection::new()
            .add(&p("2"), &TREE, NONE)
            .remove(&p("2.2"), &TREE, flags);
        assert_eq!(selection.len(), 1);
        assert_eq!(selection.branches()[0].deselected_descendants(), [p("2.2")]);
        assert!(!selection.is_selected(&p("2.2.3")));
        assert!(selection.is_selected(&p("2.3")));
    }

    #[test]
    fn removing_a_root_deletes_its_branch() {
        let selection = Selection::new()
            .add(&p("1.1"), &TREE, NONE)
            .add(&p("2"), &TREE, NONE);
        let removed = selection.remove(&p("2"), &TREE, NONE);
        let roots: Vec<String> = removed.roots().map(ToString::to_string).collect();
        assert_eq!(roots, ["1.1"]);
        assert!(!removed.is_selected(&p("2.1")));
    }

    #[test]
    fn ancestors_are_implicitly_selected_unless_excluded() {
        let path_mode = Selection::new().add(&p("1.2.3"), &TREE, NONE);
        assert!(path_mode.is_selected(&p("1")));
        assert!(path_mode.is_selected(&p("1.2")));
        assert!(!path_mode.is_selected(&p("1.1")));

        let fine = Selection::new().add(
            &p("1.2.3"),
            &TREE,
            SelectionFlags::ALLOW_DESELECTING_ANCESTORS,
        );
        assert!(!fine.is_selected(&p("1")));
        assert!(!fine.is_selected(&p("1.2")));
        assert!(fine.is_selected(&p("1.2.3")));

        // Re-adding an excluded ancestor takes it off the list.
        let both = SelectionFlags::all();
        let readded = fine.add(&p("1.2"), &TREE, both);
        assert!(readded.is_selected(&p("1.2")));
        assert!(!readded.is_selected(&p("1.2.1")));
        assert_eq!(readded.len(), 1);
    }

    #[test]
    fn deselecting_an_implicit_ancestor() {
        let selection = Selection::new()
            .add(&p("1.2.3"), &TREE, NONE)
            .add(&p("1.3"), &TREE, NONE);

        let excluded =
            selection.remove(&p("1"), &TREE, SelectionFlags::ALLOW_DESELECTING_ANCESTORS);
        assert!(!excluded.is_selected(&p("1")));
        assert!(excluded.is_selected(&p("1.2.3")));
        assert!(excluded.is_selected(&p("1.3")));

        let cleared = selection.remove(&p("1.2"), &TREE, NONE);
        assert!(!cleared.is_selected(&p("1.2")));
        assert!(!cleared.is_selected(&p("1.2.3")));
        assert!(cleared.is_selected(&p("1.3")));
    }

    #[test]
    fn select_node_only_excludes_children() {
        let flags = SelectionFlags::ALLOW_DESELECTING_DESCENDANTS;
        let selection = Selection::new().add(&p("3"), &TREE, flags);
        assert!(selection.is_selected(&p("3")));
        assert!(!selection.is_selected(&p("3.1")));
        assert!(!selection.is_selected(&p("3.3.2")));

        // Re-including an excluded child selects only that child.
        let more = selection.add(&p("3.2"), &TREE, flags);
        assert_eq!(more.len(), 1);
        assert!(more.is_selected(&p("3.2")));
        assert!(!more.is_selected(&p("3.2.1")));
        assert!(!more.is_selected(&p("3.1")));
    }

    #[test]
    fn sealed_nodes_exclude_children_loaded_later() {
        let flags = SelectionFlags::ALLOW_DESELECTING_DESCENDANTS;
        let selection = Selection::new().add(&p("3"), &Leaves, flags);
        assert_eq!(selection.branches()[0].sealed(), [p("3")]);

        let loaded = selection.exclude_new_children(&p("3"), [p("3.1"), p("3.2"), p("4.1")]);
        assert_eq!(
            loaded.branches()[0].deselected_descendants(),
            [p("3.1"), p("3.2")]
        );
        assert!(loaded.is_selected(&p("3")));
        assert!(!loaded.is_selected(&p("3.2")));

        // Re-including an excluded child seals it in turn.
        let child = loaded.add(&p("3.2"), &Leaves, flags);
        assert_eq!(child.branches()[0].sealed(), [p("3"), p("3.2")]);

        let open = Selection::new().add(&p("3"), &Leaves, NONE);
        let same = open.exclude_new_children(&p("3"), [p("3.1")]);
        assert_eq!(same.version(), open.version());
        assert!(same.is_selected(&p("3.1")));
    }

    #[test]
    fn seals_follow_splits_merges_and_moves() {
        let sealed = Branch::with_exceptions(p("1"), vec![], vec![p("1.3.1")])
            .with_sealed(vec![p("1.3")]);
        let split = Selection::from_branches([sealed]).remove(&p("1.2"), &TREE, NONE);
        let piece = split
            .branches()
            .iter()
            .find(|b| b.root() == &p("1.3"))
            .unwrap();
        assert_eq!(piece.sealed(), [p("1.3")]);
        assert!(split.branches().iter().all(|b| b.root() == &p("1.3") || b.sealed().is_empty()));

        // A seal survives a merge only where neither side selects future children.
        let node_only = Branch::with_exceptions(p("1"), vec![], vec![p("1.1"), p("1.2")])
            .with_sealed(vec![p("1")]);
        let merged = Selection::from_branches([node_only, Branch::new(p("1.2"))]).optimize();
        assert_eq!(merged.len(), 1);
        assert_eq!(merged.branches()[0].deselected_descendants(), [p("1.1")]);
        assert_eq!(merged.branches()[0].sealed(), [p("1")]);

        let child_only = Branch::with_exceptions(p("1.2"), vec![], vec![p("1.2.1")])
            .with_sealed(vec![p("1.2")]);
        let merged = Selection::from_branches([Branch::new(p("1")), child_only]).optimize();
        assert_eq!(merged.branches(), [Branch::new(p("1"))]);

        // The carved branch takes the seal of the moved node with it.
        let parent = Branch::with_exceptions(p("2"), vec![], vec![p("2.1.1")])
            .with_sealed(vec![p("2.1")]);
        let remap: PathRemap = [(p("2.1"), p("3.1"))].into_iter().collect();
        let moved = Selection::from_branches([parent]).remap_moved(&remap, &p("2.1"));
        let carved = moved
            .branches()
            .iter()
            .find(|b| b.root() == &p("3.1"))
            .unwrap();
        assert_eq!(carved.sealed(), [p("3.1")]);
        assert_eq!(carved.deselected_descendants(), [p("3.1.1")]);
        assert!(moved.branches()[0].sealed().is_empty());
    }

    #[test]
    fn add_is_a_no_op_when_already_selected() {
        let selection = Selection::new().add(&p("1"), &TREE, NONE);
        let again = selection.add(&p("1.2"), &TREE, NONE);
        assert_eq!(again, selection);
        assert_eq!(again.version(), selection.version());
    }

    #[test]
    fn descendant_exception_beats_implicit_ancestor() {
        // Branch `1` excludes `1.2`; branch `1.2.3` would imply `1.2`.
        let selection = Selection::from_branches([
            Branch::with_exceptions(p("1"), vec![], vec![p("1.2")]),
            Branch::new(p("1.2.3")),
        ]);
        assert!(!selection.is_selected(&p("1.2")));
        assert!(selection.is_selected(&p("1.2.3")));
        assert!(selection.is_selected(&p("1")));
    }

    #[test]
    fn optimize_merges_nested_branches() {
        let selection = Selection::from_branches([
            Branch::with_exceptions(p("1.2"), vec![], vec![p("1.2.1"), p("1.2.3")]),
            Branch::with_exceptions(p("1"), vec![], vec![p("1.2"), p("1.3.1")]),
            Branch::new(p("1.2.1.2")),
        ]);
        let optimized = selection.optimize();
        let roots: Vec<String> = optimized.roots().map(ToString::to_string).collect();
        assert_eq!(roots, ["1", "1.2.1.2"]);
        assert_eq!(
            optimized.branches()[0].deselected_descendants(),
            [p("1.2.1"), p("1.2.3"), p("1.3.1")]
        );
        assert!(optimized.denotes_same(&selection, &TREE.all_paths()));
        assert_eq!(optimized.optimize(), optimized);
    }

    #[test]
    fn optimize_keeps_branches_under_exceptions() {
        let selection = Selection::from_branches([
            Branch::with_exceptions(p("1"), vec![], vec![p("1.2")]),
            Branch::new(p("1.2.3")),
        ]);
        let optimized = selection.optimize();
        assert_eq!(optimized.len(), 2);
        assert!(optimized.denotes_same(&selection, &TREE.all_paths()));
    }

    #[test]
    fn optimize_intersects_ancestor_exceptions() {
        let selection = Selection::from_branches([
            Branch::with_exceptions(p("1.2"), vec![p("1")], vec![]),
            Branch::with_exceptions(p("1.2.1"), vec![p("1"), p("1.2")], vec![]),
        ]);
        let optimized = selection.optimize();
        assert_eq!(optimized.len(), 1);
        assert_eq!(optimized.branches()[0].deselected_ancestors(), [p("1")]);
        assert!(optimized.denotes_same(&selection, &TREE.all_paths()));
    }

    #[test]
    fn remap_moves_roots_and_exceptions() {
        let selection = Selection::from_branches([
            Branch::new(p("2.1")),
            Branch::with_exceptions(p("3"), vec![], vec![p("3.2")]),
        ]);
        let remap: PathRemap = [(p("2.1"), p("3.3")), (p("3.2"), p("3.1"))]
            .into_iter()
            .collect();
        let moved = selection.remap(&remap);
        let roots: Vec<String> = moved.roots().map(ToString::to_string).collect();
        assert_eq!(roots, ["3.3", "3"]);
        assert_eq!(moved.branches()[1].deselected_descendants(), [p("3.1")]);
    }

    #[test]
    fn remap_moved_follows_node_out_of_selected_parent() {
        // `2` is selected except `2.1.1`; `2.1` moves to `3.1`, `2.2` shifts to `2.1`.
        let selection = Selection::from_branches([Branch::with_exceptions(
            p("2"),
            vec![],
            vec![p("2.1.1")],
        )]);
        let remap: PathRemap = [(p("2.1"), p("3.1")), (p("2.2"), p("2.1"))]
            .into_iter()
            .collect();
        let moved = selection.remap_moved(&remap, &p("2.1"));
        assert!(moved.is_selected(&p("3.1")));
        assert!(!moved.is_selected(&p("3.1.1")));
        assert!(moved.is_selected(&p("3.1.2")));
        assert!(moved.is_selected(&p("2.1")));
        assert!(moved.branches()[0].deselected_descendants().is_empty());
    }

    #[test]
    fn drop_subtree_forgets_deleted_state() {
        let selection = Selection::from_branches([
            Branch::with_exceptions(p("1"), vec![], vec![p("1.2.1")]),
            Branch::new(p("1.2.3")),
        ]);
        let dropped = selection.drop_subtree(&p("1.2"));
        assert_eq!(dropped.len(), 1);
        assert!(dropped.branches()[0].deselected_descendants().is_empty());
    }

    #[test]
    fn free_functions_match_methods() {
        let branches = add(&p("1"), &[], &TREE, false, false);
        let branches = remove(&p("1.2"), &branches, &TREE, false, false);
        let selection = Selection::new()
            .add(&p("1"), &TREE, NONE)
            .remove(&p("1.2"), &TREE, NONE);
        assert_eq!(branches, selection.branches());
        assert!(is_selected(&p("1.1"), &branches));
        assert_eq!(optimize(&branches), selection.optimize().branches());
    }

    #[test]
    fn leaves_shape_splits_into_nothing() {
        let selection = Selection::new()
            .add(&p("1"), &Leaves, NONE)
            .remove(&p("1.1"), &Leaves, NONE);
        assert!(selection.is_empty());
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        const SMALL: Uniform = Uniform { fan: 3, depth: 3 };

        fn arb_path() -> impl Strategy<Value = PathId> {
            prop::collection::vec(1_u32..=3, 1..=3)
                .prop_map(|segments| PathId::from_segments(segments).unwrap())
        }

        fn arb_op() -> impl Strategy<Value = (bool, PathId, bool, bool)> {
            (any::<bool>(), arb_path(), any::<bool>(), any::<bool>())
        }

        /// Build a selection through a sequence of public operations.
        fn arb_selection() -> impl Strategy<Value = Selection> {
            prop::collection::vec(arb_op(), 0..8).prop_map(|ops| {
                ops.into_iter()
                    .fold(Selection::new(), |sel, (adding, path, anc, desc)| {
                        let flags = SelectionFlags::from_allow(anc, desc);
                        if adding {
                            sel.add(&path, &SMALL, flags)
                        } else {
                            sel.remove(&path, &SMALL, flags)
                        }
                    })
            })
        }

        /// Arbitrary (possibly overlapping, unoptimized) branch lists.
        fn arb_branches() -> impl Strategy<Value = Vec<Branch>> {
            let branch = (
                arb_path(),
                prop::collection::vec(arb_path(), 0..3),
                prop::collection::vec(arb_path(), 0..3),
                prop::collection::vec(arb_path(), 0..2),
            )
                .prop_map(|(root, anc, desc, sealed)| {
                    Branch::with_exceptions(root, anc, desc).with_sealed(sealed)
                });
            prop::collection::vec(branch, 0..6)
        }

        fn no_exceptions_near(selection: &Selection, node: &PathId) -> bool {
            selection.branches().iter().all(|b| {
                b.deselected_ancestors()
                    .iter()
                    .chain(b.deselected_descendants())
                    .all(|e| !e.is_comparable_with(node))
            })
        }

        /// Neither a root nor an exception of `selection` is on `node`'s line.
        fn untouched(selection: &Selection, node: &PathId) -> bool {
            no_exceptions_near(selection, node)
                && selection.roots().all(|root| !root.is_comparable_with(node))
        }

        proptest! {
            #[test]
            fn optimize_is_idempotent(branches in arb_branches()) {
                let once = optimize(&branches);
                prop_assert_eq!(optimize(&once), once);
            }

            #[test]
            fn optimize_preserves_membership(branches in arb_branches()) {
                let once = optimize(&branches);
                for path in SMALL.all_paths() {
                    prop_assert_eq!(is_selected(&path, &once), is_selected(&path, &branches));
                }
            }

            #[test]
            fn membership_ignores_branch_order(
                branches in arb_branches(),
                seed in any::<u64>(),
            ) {
                let mut shuffled = branches.clone();
                // Deterministic Fisher-Yates driven by the generated seed.
                let mut state = seed | 1;
                for i in (1..shuffled.len()).rev() {
                    state ^= state << 13;
                    state ^= state >> 7;
                    state ^= state << 17;
                    let j = (state % (i as u64 + 1)) as usize;
                    shuffled.swap(i, j);
                }
                for path in SMALL.all_paths() {
                    prop_assert_eq!(is_selected(&path, &shuffled), is_selected(&path, &branches));
                }
            }

            #[test]
            fn round_trip_on_untouched_node(
                base in arb_selection(),
                node in arb_path(),
                anc in any::<bool>(),
                desc in any::<bool>(),
            ) {
                prop_assume!(untouched(&base, &node));
                let flags = SelectionFlags::from_allow(anc, desc);
                let added = base.add(&node, &SMALL, flags);
                let round = added
                    .remove(&node, &SMALL, flags)
                    .add(&node, &SMALL, flags);
                prop_assert_eq!(round.optimize(), added.optimize());
            }

            #[test]
            fn round_trip_in_tri_state_mode(
                base in arb_selection(),
                node in arb_path(),
            ) {
                prop_assume!(no_exceptions_near(&base, &node));
                let added = base.add(&node, &SMALL, NONE);
                let round = added
                    .remove(&node, &SMALL, NONE)
                    .add(&node, &SMALL, NONE)
                    .optimize();
                prop_assert!(round.denotes_same(&added.optimize(), &SMALL.all_paths()));
            }

            #[test]
            fn add_selects_and_remove_deselects(
                base in arb_selection(),
                node in arb_path(),
                anc in any::<bool>(),
                desc in any::<bool>(),
            ) {
                let flags = SelectionFlags::from_allow(anc, desc);
                prop_assert!(base.add(&node, &SMALL, flags).is_selected(&node));
                prop_assert!(!base.remove(&node, &SMALL, flags).is_selected(&node));
            }
        }
    }
}
