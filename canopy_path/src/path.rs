// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The path identifier type and its pure operations.

use core::cmp::Ordering;
use core::fmt;
use core::str::FromStr;

use smallvec::SmallVec;

/// Inline capacity for path segments; deeper paths spill to the heap.
const INLINE_SEGMENTS: usize = 8;

/// Errors produced when parsing or building a [`PathId`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    /// The path has no segments.
    #[error("path is empty")]
    Empty,
    /// A segment between two separators (or at either end) is empty, as in `1..2`.
    #[error("segment {index} is empty")]
    EmptySegment {
        /// Zero-based index of the offending segment.
        index: usize,
    },
    /// A segment is not a canonical decimal number that fits in a `u32`.
    #[error("segment {index} is not a canonical positive integer")]
    InvalidSegment {
        /// Zero-based index of the offending segment.
        index: usize,
    },
    /// A segment is `0`; ordinals start at 1.
    #[error("segment {index} is zero")]
    ZeroSegment {
        /// Zero-based index of the offending segment.
        index: usize,
    },
}

/// Position identifier of a node: a non-empty sequence of positive ordinals.
///
/// Segment `i` is the 1-based position of the node's depth-`i` ancestor (or of the node
/// itself, for the last segment) among its siblings. A root node has a single segment.
///
/// `PathId` orders segment by segment, numerically, and a proper prefix sorts before
/// everything it prefixes. That ordering is exactly depth-first pre-order over the tree.
///
/// The empty path is unrepresentable: every constructor either guarantees at least one
/// positive segment or returns a [`PathError`].
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PathId(SmallVec<[u32; INLINE_SEGMENTS]>);

impl PathId {
    /// Path of the root at zero-based `position` among the roots.
    ///
    /// The resulting segment is `position + 1`.
    pub fn root(position: usize) -> Self {
        let mut segments = SmallVec::new();
        segments.push(ordinal(position));
        Self(segments)
    }

    /// Build a path from raw 1-based segments.
    pub fn from_segments<I>(segments: I) -> Result<Self, PathError>
    where
        I: IntoIterator<Item = u32>,
    {
        let mut out: SmallVec<[u32; INLINE_SEGMENTS]> = SmallVec::new();
        for (index, segment) in segments.into_iter().enumerate() {
            if segment == 0 {
                return Err(PathError::ZeroSegment { index });
            }
            out.push(segment);
        }
        if out.is_empty() {
            return Err(PathError::Empty);
        }
        Ok(Self(out))
    }

    /// Path of this node's child at zero-based `position`.
    #[must_use]
    pub fn child(&self, position: usize) -> Self {
        let mut segments = self.0.clone();
        segments.push(ordinal(position));
        Self(segments)
    }

    /// Path of the sibling at zero-based `position` under the same parent.
    #[must_use]
    pub fn sibling(&self, position: usize) -> Self {
        let mut segments = self.0.clone();
        if let Some(last) = segments.last_mut() {
            *last = ordinal(position);
        }
        Self(segments)
    }

    /// The raw 1-based segments.
    pub fn segments(&self) -> &[u32] {
        &self.0
    }

    /// Number of segments (always at least one).
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; present for API symmetry with [`PathId::len`].
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Depth of the node: segment count minus one, so roots have depth 0.
    pub fn depth(&self) -> usize {
        self.0.len() - 1
    }

    /// Returns `true` for single-segment paths.
    pub fn is_root(&self) -> bool {
        self.0.len() == 1
    }

    /// The last (1-based) segment.
    pub fn last_segment(&self) -> u32 {
        self.0[self.0.len() - 1]
    }

    /// Zero-based sibling position encoded by the last segment.
    pub fn position(&self) -> usize {
        self.last_segment() as usize - 1
    }

    /// Path of the parent, or `None` for roots.
    pub fn parent(&self) -> Option<Self> {
        self.prefix(self.0.len() - 1)
    }

    /// The first `len` segments as a path, or `None` if `len` is 0 or exceeds this path.
    pub fn prefix(&self, len: usize) -> Option<Self> {
        if len == 0 || len > self.0.len() {
            return None;
        }
        Some(Self(SmallVec::from_slice(&self.0[..len])))
    }

    /// Proper ancestors of this path, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = Self> + '_ {
        (1..self.0.len())
            .rev()
            .map(|len| Self(SmallVec::from_slice(&self.0[..len])))
    }

    /// Returns `true` if `self` is a proper ancestor of `other`.
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        self.0.len() < other.0.len() && other.0.starts_with(&self.0)
    }

    /// Returns `true` if `self` equals `other` or is a proper ancestor of it.
    pub fn is_ancestor_or_self_of(&self, other: &Self) -> bool {
        other.0.starts_with(&self.0)
    }

    /// Returns `true` if one of the two paths contains the other.
    pub fn is_comparable_with(&self, other: &Self) -> bool {
        self.is_ancestor_or_self_of(other) || other.is_ancestor_of(self)
    }

    /// Deepest path that is an ancestor-or-self of both, or `None` when they are under
    /// different roots.
    pub fn common_ancestor(&self, other: &Self) -> Option<Self> {
        let shared = self
            .0
            .iter()
            .zip(other.0.iter())
            .take_while(|(a, b)| a == b)
            .count();
        self.prefix(shared)
    }

    /// Replace the prefix `old_prefix` with `new_prefix`, keeping the relative suffix.
    ///
    /// Returns `None` if `old_prefix` is not an ancestor-or-self of this path.
    pub fn rebase(&self, old_prefix: &Self, new_prefix: &Self) -> Option<Self> {
        if !old_prefix.is_ancestor_or_self_of(self) {
            return None;
        }
        let mut segments = new_prefix.0.clone();
        segments.extend_from_slice(&self.0[old_prefix.0.len()..]);
        Some(Self(segments))
    }
}

#[allow(
    clippy::cast_possible_truncation,
    reason = "Sibling groups are far below u32::MAX entries."
)]
fn ordinal(position: usize) -> u32 {
    debug_assert!(position < u32::MAX as usize, "sibling position overflow");
    (position + 1) as u32
}

impl fmt::Display for PathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut segments = self.0.iter();
        if let Some(first) = segments.next() {
            write!(f, "{first}")?;
        }
        for segment in segments {
            write!(f, ".{segment}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for PathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PathId({self})")
    }
}

impl FromStr for PathId {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(PathError::Empty);
        }
        let mut segments: SmallVec<[u32; INLINE_SEGMENTS]> = SmallVec::new();
        for (index, raw) in s.split('.').enumerate() {
            segments.push(parse_segment(raw, index)?);
        }
        Ok(Self(segments))
    }
}

fn parse_segment(raw: &str, index: usize) -> Result<u32, PathError> {
    if raw.is_empty() {
        return Err(PathError::EmptySegment { index });
    }
    // Only canonical decimal: no signs, no whitespace, no leading zeros.
    if !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PathError::InvalidSegment { index });
    }
    if raw == "0" {
        return Err(PathError::ZeroSegment { index });
    }
    if raw.starts_with('0') {
        return Err(PathError::InvalidSegment { index });
    }
    raw.parse::<u32>()
        .map_err(|_| PathError::InvalidSegment { index })
}

/// Returns `true` iff `a` is a proper ancestor of `b`.
///
/// Equivalent to `b.to_string().starts_with(&(a.to_string() + "."))`.
pub fn is_ancestor(a: &PathId, b: &PathId) -> bool {
    a.is_ancestor_of(b)
}

/// Depth-first order of two paths: segment-wise numeric comparison, prefixes first.
pub fn compare_order(a: &PathId, b: &PathId) -> Ordering {
    a.cmp(b)
}

/// Depth of a path (segment count minus one).
pub fn depth_of(path: &PathId) -> usize {
    path.depth()
}

/// Parent path, or `None` for roots.
pub fn parent_path(path: &PathId) -> Option<PathId> {
    path.parent()
}

#[cfg(feature = "serde")]
mod serde_impls {
    use alloc::string::String;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use super::PathId;

    impl Serialize for PathId {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            serializer.collect_str(self)
        }
    }

    impl<'de> Deserialize<'de> for PathId {
        fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
            let raw = String::deserialize(deserializer)?;
            raw.parse().map_err(D::Error::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;
    use alloc::vec::Vec;

    fn p(s: &str) -> PathId {
        s.parse().unwrap()
    }

    #[test]
    fn parse_and_display_round_trip() {
        for s in ["1", "1.2.3", "10.200.3000", "4294967295"] {
            assert_eq!(p(s).to_string(), s);
        }
    }

    #[test]
    fn rejects_malformed_paths() {
        assert_eq!("".parse::<PathId>(), Err(PathError::Empty));
        assert_eq!(
            "1..2".parse::<PathId>(),
            Err(PathError::EmptySegment { index: 1 })
        );
        assert_eq!(
            "1.2.".parse::<PathId>(),
            Err(PathError::EmptySegment { index: 2 })
        );
        assert_eq!(
            ".1".parse::<PathId>(),
            Err(PathError::EmptySegment { index: 0 })
        );
        assert_eq!(
            "1.0".parse::<PathId>(),
            Err(PathError::ZeroSegment { index: 1 })
        );
        assert_eq!(
            "1.02".parse::<PathId>(),
            Err(PathError::InvalidSegment { index: 1 })
        );
        assert_eq!(
            "+1".parse::<PathId>(),
            Err(PathError::InvalidSegment { index: 0 })
        );
        assert_eq!(
            "1.a".parse::<PathId>(),
            Err(PathError::InvalidSegment { index: 1 })
        );
        assert_eq!(
            "4294967296".parse::<PathId>(),
            Err(PathError::InvalidSegment { index: 0 })
        );
        assert_eq!(PathId::from_segments([]), Err(PathError::Empty));
        assert_eq!(
            PathId::from_segments([3, 0]),
            Err(PathError::ZeroSegment { index: 1 })
        );
    }

    #[test]
    fn ordering_is_numeric_and_depth_first() {
        assert_eq!(compare_order(&p("2"), &p("10")), Ordering::Less);
        assert_eq!(compare_order(&p("1"), &p("1.1")), Ordering::Less);
        assert_eq!(compare_order(&p("1.1"), &p("2")), Ordering::Less);
        assert_eq!(compare_order(&p("1.9"), &p("1.10")), Ordering::Less);
        assert_eq!(compare_order(&p("3.1"), &p("3.1")), Ordering::Equal);

        let mut paths = [p("2"), p("1.10"), p("1"), p("1.2.1"), p("1.2"), p("10")];
        paths.sort();
        let shown: Vec<_> = paths.iter().map(ToString::to_string).collect();
        assert_eq!(shown, ["1", "1.2", "1.2.1", "1.10", "2", "10"]);
    }

    #[test]
    fn ancestry_is_proper_prefix() {
        assert!(is_ancestor(&p("1"), &p("1.2")));
        assert!(is_ancestor(&p("1"), &p("1.2.3")));
        assert!(!is_ancestor(&p("1"), &p("1")));
        assert!(!is_ancestor(&p("1"), &p("10.2")));
        assert!(!is_ancestor(&p("1.2"), &p("1")));
        assert!(p("1.2").is_ancestor_or_self_of(&p("1.2")));
        assert!(p("1.2.3").is_comparable_with(&p("1")));
        assert!(!p("1.2").is_comparable_with(&p("1.3")));
    }

    #[test]
    fn structural_accessors() {
        let path = p("3.1.4");
        assert_eq!(depth_of(&path), 2);
        assert_eq!(parent_path(&path), Some(p("3.1")));
        assert_eq!(parent_path(&p("3")), None);
        assert_eq!(path.last_segment(), 4);
        assert_eq!(path.position(), 3);
        assert!(p("7").is_root());
        assert_eq!(PathId::root(0), p("1"));
        assert_eq!(path.child(1), p("3.1.4.2"));
        assert_eq!(path.sibling(0), p("3.1.1"));
        let ancestors: Vec<_> = path.ancestors().collect();
        assert_eq!(ancestors, [p("3.1"), p("3")]);
        assert_eq!(p("1.2.3").common_ancestor(&p("1.2.7.1")), Some(p("1.2")));
        assert_eq!(p("1.2").common_ancestor(&p("2.2")), None);
    }

    #[test]
    fn rebase_keeps_relative_suffix() {
        assert_eq!(
            p("2.1.2").rebase(&p("2.1"), &p("3.3")),
            Some(p("3.3.2"))
        );
        assert_eq!(p("2.1").rebase(&p("2.1"), &p("3.3")), Some(p("3.3")));
        assert_eq!(p("2.2").rebase(&p("2.1"), &p("3.3")), None);
    }

    mod properties {
        use super::*;
        use alloc::format;
        use alloc::vec;
        use proptest::prelude::*;

        fn arb_path() -> impl Strategy<Value = PathId> {
            prop::collection::vec(1_u32..12, 1..6)
                .prop_map(|segments| PathId::from_segments(segments).unwrap())
        }

        proptest! {
            #[test]
            fn ancestry_matches_string_prefix(a in arb_path(), b in arb_path()) {
                let expected = b.to_string().starts_with(&format!("{a}."));
                prop_assert_eq!(is_ancestor(&a, &b), expected);
            }

            #[test]
            fn ancestry_matches_parent_walk(a in arb_path(), b in arb_path()) {
                let mut walk = vec![];
                let mut current = b.parent();
                while let Some(parent) = current {
                    current = parent.parent();
                    walk.push(parent);
                }
                prop_assert_eq!(is_ancestor(&a, &b), walk.contains(&a));
            }

            #[test]
            fn display_parse_is_lossless(a in arb_path()) {
                prop_assert_eq!(a.to_string().parse::<PathId>(), Ok(a));
            }

            #[test]
            fn ancestors_sort_before_descendants(a in arb_path(), b in arb_path()) {
                if is_ancestor(&a, &b) {
                    prop_assert_eq!(compare_order(&a, &b), Ordering::Less);
                }
            }
        }
    }
}
