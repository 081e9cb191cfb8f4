// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=canopy_selection --heading-base-level=0

//! Canopy Selection: compressed subtree selections for very large trees.
//!
//! Instead of a flag per node, a [`Selection`] stores a short list of [`Branch`]
//! records. Each branch says "everything under this root is selected, except these
//! subtrees", and optionally "these ancestors of the root are not". Selecting a folder
//! with a million descendants is one record; deselecting one file inside it adds one
//! exception.
//!
//! Membership is answered from the records alone, by path:
//!
//! - A path at or under a branch root is selected unless it lies under one of that
//!   branch's descendant exceptions.
//! - A proper ancestor of a branch root is *implicitly* selected, so selecting a deep
//!   leaf shows an unbroken chain of selected ancestors, unless the branch lists it as
//!   an ancestor exception.
//! - When branches disagree, explicit coverage wins, then descendant exceptions, then
//!   implicit coverage (the most specific statement wins). Branch order never matters.
//!
//! Operations that need to know the tree (adding a node "without its subtree", or
//! splitting a branch around a removed node) ask a [`Shape`] for child counts.
//!
//! ## Minimal example
//!
//! ```rust
//! use canopy_path::PathId;
//! use canopy_selection::{Selection, SelectionFlags, Shape};
//!
//! /// Three children under every node, two levels deep.
//! struct Small;
//!
//! impl Shape for Small {
//!     fn child_count(&self, path: &PathId) -> usize {
//!         if path.len() < 2 { 3 } else { 0 }
//!     }
//! }
//!
//! let p = |s: &str| s.parse::<PathId>().unwrap();
//!
//! // Classic tri-state behavior: no exceptions allowed, so removing a node inside a
//! // branch splits the branch.
//! let selection = Selection::new()
//!     .add(&p("1"), &Small, SelectionFlags::empty())
//!     .remove(&p("1.2"), &Small, SelectionFlags::empty());
//!
//! let roots: Vec<String> = selection.roots().map(|r| r.to_string()).collect();
//! assert_eq!(roots, ["1.1", "1.3"]);
//! assert!(!selection.is_selected(&p("1.2")));
//! assert!(selection.is_selected(&p("1")));
//!
//! // With descendant exceptions the same edit is a single record.
//! let fine = Selection::new()
//!     .add(&p("1"), &Small, SelectionFlags::empty())
//!     .remove(&p("1.2"), &Small, SelectionFlags::ALLOW_DESELECTING_DESCENDANTS);
//! assert_eq!(fine.len(), 1);
//! ```
//!
//! ## Snapshots
//!
//! Selections are immutable. Every operation returns a new snapshot with a bumped
//! [`Selection::version`], and clones share their branch list, so readers can keep an
//! old snapshot while a writer produces the next one.
//!
//! ## Persistence
//!
//! [`encode`] and [`decode`] convert to and from a JSON array of records
//! (`rootPath`, `deselectedAncestorPaths`, `deselectedDescendantPaths`).
//! [`decode_lenient`] keeps the good records and reports the rest. [`Selection`] also
//! implements `serde`'s `Serialize` and `Deserialize` with the same record format.
//!
//! ## Structural edits
//!
//! When nodes move, [`Selection::remap`] and [`Selection::remap_moved`] rewrite roots
//! and exceptions through a [`PathRemap`](canopy_path::PathRemap) so the selection
//! follows the nodes. [`Selection::drop_subtree`] forgets a deleted subtree.

mod branch;
mod codec;
mod selection;
mod shape;

pub use branch::{Branch, Verdict, combine};
pub use codec::{
    BranchRecord, CodecError, LenientDecode, RecordError, RecordFault, decode, decode_lenient,
    encode, from_json_str, to_json_string, to_records,
};
pub use selection::{Selection, add, is_selected, optimize, remove};
pub use shape::{Leaves, SelectionFlags, Shape};
