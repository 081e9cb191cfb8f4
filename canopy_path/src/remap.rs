// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Prefix rewrite rules describing how paths changed after a structural edit.

use alloc::vec::Vec;

use hashbrown::HashMap;

use crate::path::PathId;

/// A set of `old_prefix → new_prefix` rules keyed on pre-edit paths.
///
/// A rule for `old` covers `old` itself and every descendant of `old`. When several rules
/// cover a path, the longest (most specific) `old` prefix wins. Rules are applied exactly
/// once: the output of one rule is never matched against another, so a remap describes a
/// simultaneous renaming even when old and new paths overlap.
///
/// Identity rules (`old == new`) are meaningful: they shield a subtree from a rule on one
/// of its old ancestors.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PathRemap {
    rules: HashMap<PathId, PathId>,
}

impl PathRemap {
    /// Create an empty remap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that the subtree formerly at `old` now lives at `new`.
    ///
    /// A later rule for the same `old` replaces the earlier one.
    pub fn insert(&mut self, old: PathId, new: PathId) {
        self.rules.insert(old, new);
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns `true` if there are no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The rule for exactly `old`, if any.
    pub fn rule(&self, old: &PathId) -> Option<&PathId> {
        self.rules.get(old)
    }

    /// All rules sorted by their old prefix (depth-first order).
    pub fn sorted_rules(&self) -> Vec<(PathId, PathId)> {
        let mut rules: Vec<_> = self
            .rules
            .iter()
            .map(|(old, new)| (old.clone(), new.clone()))
            .collect();
        rules.sort();
        rules
    }

    /// Rewrite `path` through the most specific covering rule.
    ///
    /// Returns `None` when no rule covers `path` (the path is unaffected).
    pub fn apply(&self, path: &PathId) -> Option<PathId> {
        if self.rules.is_empty() {
            return None;
        }
        if let Some(new) = self.rules.get(path) {
            return Some(new.clone());
        }
        path.ancestors().find_map(|old| {
            self.rules
                .get(&old)
                .and_then(|new| path.rebase(&old, new))
        })
    }

    /// Rewrite `path`, returning it unchanged when no rule covers it.
    pub fn rewrite(&self, path: &PathId) -> PathId {
        self.apply(path).unwrap_or_else(|| path.clone())
    }

    /// Returns `true` if some rule covers `path`.
    pub fn covers(&self, path: &PathId) -> bool {
        self.rules.contains_key(path) || path.ancestors().any(|old| self.rules.contains_key(&old))
    }
}

impl Extend<(PathId, PathId)> for PathRemap {
    fn extend<T: IntoIterator<Item = (PathId, PathId)>>(&mut self, iter: T) {
        self.rules.extend(iter);
    }
}

impl FromIterator<(PathId, PathId)> for PathRemap {
    fn from_iter<T: IntoIterator<Item = (PathId, PathId)>>(iter: T) -> Self {
        Self {
            rules: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> PathId {
        s.parse().unwrap()
    }

    #[test]
    fn empty_remap_changes_nothing() {
        let remap = PathRemap::new();
        assert!(remap.is_empty());
        assert_eq!(remap.apply(&p("1.2")), None);
        assert_eq!(remap.rewrite(&p("1.2")), p("1.2"));
    }

    #[test]
    fn longest_prefix_wins() {
        let remap: PathRemap = [(p("2"), p("3")), (p("2.4"), p("1.1"))]
            .into_iter()
            .collect();
        assert_eq!(remap.rewrite(&p("2.1.5")), p("3.1.5"));
        assert_eq!(remap.rewrite(&p("2.4.5")), p("1.1.5"));
        assert_eq!(remap.rewrite(&p("2.4")), p("1.1"));
        assert!(remap.covers(&p("2.9")));
        assert!(!remap.covers(&p("1.1")));
    }

    #[test]
    fn rules_do_not_chain() {
        // Swap two siblings: each rule applies once to the pre-edit path.
        let mut remap = PathRemap::new();
        remap.insert(p("1.1"), p("1.2"));
        remap.insert(p("1.2"), p("1.1"));
        assert_eq!(remap.rewrite(&p("1.1.3")), p("1.2.3"));
        assert_eq!(remap.rewrite(&p("1.2.3")), p("1.1.3"));
    }

    #[test]
    fn identity_rule_shields_subtree() {
        let mut remap = PathRemap::new();
        remap.insert(p("1"), p("2"));
        remap.insert(p("1.1"), p("1.1"));
        assert_eq!(remap.rewrite(&p("1.1.1")), p("1.1.1"));
        assert_eq!(remap.rewrite(&p("1.2")), p("2.2"));
    }

    #[test]
    fn sorted_rules_follow_depth_first_order() {
        let mut remap = PathRemap::new();
        remap.insert(p("3"), p("2"));
        remap.insert(p("1.10"), p("1.9"));
        remap.insert(p("1.2"), p("1.1"));
        let olds: Vec<_> = remap.sorted_rules().into_iter().map(|(old, _)| old).collect();
        assert_eq!(olds, [p("1.2"), p("1.10"), p("3")]);
    }
}
