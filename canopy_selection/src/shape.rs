// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! What the selection codec needs to know about the tree, and how callers steer it.

use canopy_path::PathId;

/// Read-only view of tree shape, addressed by path.
///
/// Paths number siblings densely, so the children of `p` are exactly
/// `p.child(0) .. p.child(child_count(p) - 1)`.
pub trait Shape {
    /// Number of known children of the node at `path`; 0 for leaves and unknown paths.
    fn child_count(&self, path: &PathId) -> usize;

    /// Paths of the known children of `path`, in order.
    fn child_paths(&self, path: &PathId) -> Vec<PathId> {
        (0..self.child_count(path)).map(|i| path.child(i)).collect()
    }
}

/// A shape that knows no children anywhere.
///
/// Useful when every selected node is a leaf, or when the caller never allows
/// descendant exceptions and never removes strictly inside a branch.
#[derive(Copy, Clone, Debug, Default)]
pub struct Leaves;

impl Shape for Leaves {
    fn child_count(&self, _path: &PathId) -> usize {
        0
    }
}

impl<S: Shape + ?Sized> Shape for &S {
    fn child_count(&self, path: &PathId) -> usize {
        (**self).child_count(path)
    }
}

bitflags::bitflags! {
    /// Controls how [`crate::Selection::add`] and [`crate::Selection::remove`] treat
    /// nodes around the target.
    ///
    /// With no flags set the codec behaves like a classic tri-state tree: selecting a
    /// node selects its subtree and shows its ancestors as selected, and deselecting a
    /// node deselects its subtree.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct SelectionFlags: u8 {
        /// Ancestors may be listed as exceptions, so they can stay unselected while a
        /// descendant is selected.
        const ALLOW_DESELECTING_ANCESTORS   = 0b0000_0001;
        /// Descendants may be listed as exceptions, so a node can be selected without
        /// its subtree and a node can be deselected inside a branch without splitting.
        const ALLOW_DESELECTING_DESCENDANTS = 0b0000_0010;
    }
}

impl SelectionFlags {
    /// Build flags from the two booleans hosts usually carry around.
    pub fn from_allow(deselecting_ancestors: bool, deselecting_descendants: bool) -> Self {
        let mut flags = Self::empty();
        flags.set(Self::ALLOW_DESELECTING_ANCESTORS, deselecting_ancestors);
        flags.set(Self::ALLOW_DESELECTING_DESCENDANTS, deselecting_descendants);
        flags
    }

    pub(crate) fn ancestors(self) -> bool {
        self.contains(Self::ALLOW_DESELECTING_ANCESTORS)
    }

    pub(crate) fn descendants(self) -> bool {
        self.contains(Self::ALLOW_DESELECTING_DESCENDANTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fan(usize);

    impl Shape for Fan {
        fn child_count(&self, _path: &PathId) -> usize {
            self.0
        }
    }

    #[test]
    fn child_paths_are_dense() {
        let root: PathId = "4".parse().unwrap();
        let shown: Vec<String> = Fan(3)
            .child_paths(&root)
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(shown, ["4.1", "4.2", "4.3"]);
        assert!(Leaves.child_paths(&root).is_empty());
    }

    #[test]
    fn flags_from_booleans() {
        assert_eq!(SelectionFlags::from_allow(false, false), SelectionFlags::empty());
        assert_eq!(
            SelectionFlags::from_allow(true, true),
            SelectionFlags::all()
        );
        assert!(SelectionFlags::from_allow(false, true).descendants());
        assert!(!SelectionFlags::from_allow(false, true).ancestors());
    }
}
