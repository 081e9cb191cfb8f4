// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=canopy_path --heading-base-level=0

//! Canopy Path: order-preserving structure paths for very large trees.
//!
//! Every node in a Canopy tree carries a [`PathId`]: a non-empty sequence of positive
//! ordinals such as `1.2.3`, where each segment is the node's 1-based position among its
//! siblings. Paths give three guarantees the rest of the workspace builds on:
//!
//! - **Ancestry is prefix containment.** `a` is an ancestor of `b` iff `b` starts with
//!   `a` followed by `.`. See [`is_ancestor`].
//! - **Order is depth-first order.** Comparing paths segment by segment (numerically, so
//!   `2 < 10`) yields the pre-order traversal of the tree. See [`compare_order`].
//! - **Edits are prefix rewrites.** Moving a subtree changes a prefix and keeps every
//!   relative suffix, so a structural edit can be described by a handful of
//!   [`PathRemap`] rules instead of a per-node table.
//!
//! ## Minimal example
//!
//! ```rust
//! use core::cmp::Ordering;
//! use canopy_path::{PathId, compare_order, is_ancestor};
//!
//! let parent: PathId = "1.2".parse().unwrap();
//! let child: PathId = "1.2.10".parse().unwrap();
//! let sibling: PathId = "1.3".parse().unwrap();
//!
//! assert!(is_ancestor(&parent, &child));
//! assert!(!is_ancestor(&child, &parent));
//! assert_eq!(compare_order(&child, &sibling), Ordering::Less);
//! assert_eq!(child.depth(), 2);
//! assert_eq!(child.parent(), Some(parent));
//! ```
//!
//! ## Remapping after an edit
//!
//! ```rust
//! use canopy_path::{PathId, PathRemap};
//!
//! let p = |s: &str| s.parse::<PathId>().unwrap();
//!
//! // `2.1` moved to become `3.3`, and `2.2` shifted down to `2.1`.
//! let mut remap = PathRemap::new();
//! remap.insert(p("2.1"), p("3.3"));
//! remap.insert(p("2.2"), p("2.1"));
//!
//! assert_eq!(remap.rewrite(&p("2.1.2")), p("3.3.2"));
//! assert_eq!(remap.rewrite(&p("2.2.7")), p("2.1.7"));
//! assert_eq!(remap.rewrite(&p("4")), p("4"));
//! ```
//!
//! Rules are keyed on pre-edit paths and applied once: the longest matching prefix wins
//! and its output is never fed back into another rule.
//!
//! ## String helpers
//!
//! Hosts that keep paths as strings can use [`is_ancestor_str`], [`compare_order_str`],
//! [`depth_of_str`], and [`parent_path_str`]. They validate their input and reject the
//! empty path (and any other malformed path) with a [`PathError`].
//!
//! ## Features
//!
//! - `serde`: serialize [`PathId`] as its dotted string form.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

#[cfg(test)]
#[macro_use]
extern crate std;

mod path;
mod remap;
mod text;

pub use path::{PathError, PathId, compare_order, depth_of, is_ancestor, parent_path};
pub use remap::PathRemap;
pub use text::{compare_order_str, depth_of_str, is_ancestor_str, parent_path_str};
