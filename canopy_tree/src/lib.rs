// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=canopy_tree --heading-base-level=0

//! Canopy Tree: hierarchical state for trees with millions of nodes.
//!
//! This crate keeps the structure of a huge, lazily loaded tree and the UI state that
//! lives on top of it: which nodes are expanded, which are selected, and which have
//! their full payload in memory. It does not render anything and does not fetch
//! anything; hosts feed it node descriptors and fetched payloads and read back
//! visible rows.
//!
//! The pieces are:
//!
//! - [`Tree`]: the always-resident structure. Nodes are keyed by caller ids and each
//!   has a dense path ([`PathId`](canopy_path::PathId)). [`Tree::ingest`] applies
//!   batches of [`NodeDescriptor`]s, accepting good ones and reporting bad ones;
//!   [`Tree::remove`] and [`Tree::move_node`] edit the structure. Every operation that
//!   renumbers siblings reports a [`PathRemap`](canopy_path::PathRemap) saying how old
//!   paths map to new ones.
//! - [`TreeState`]: the facade. It owns a [`Tree`], the expanded set, a
//!   [`Selection`](canopy_selection::Selection), and a
//!   [`MemoryManager`](canopy_memory::MemoryManager), and keeps them consistent: path
//!   changes are applied to the selection, deleted nodes are forgotten, and expanded
//!   nodes and selection roots are protected from eviction.
//! - [`WindowRow`] and [`RowStrip`]: what a virtualized renderer needs for the rows it
//!   realizes.
//!
//! ## Minimal example
//!
//! ```rust
//! use canopy_selection::SelectionFlags;
//! use canopy_tree::{EngineConfig, NodeDescriptor, TreeState};
//!
//! let mut state: TreeState<u32, String> = TreeState::new(EngineConfig::default());
//! state.ingest([
//!     NodeDescriptor::root(1, 0),
//!     NodeDescriptor::child(2, 1, 0),
//!     NodeDescriptor::child(3, 1, 1),
//! ]);
//!
//! state.set_expanded(1, true, 0);
//! assert_eq!(state.visible_rows(), [1, 2, 3]);
//!
//! // Selecting a child implicitly selects its ancestors.
//! state.select(3, SelectionFlags::empty());
//! assert!(state.is_selected(1));
//!
//! // Moving the node moves its selection with it.
//! state.move_node(3, Some(1), 0).unwrap();
//! assert_eq!(state.tree().path_of(3).map(ToString::to_string).as_deref(), Some("1.1"));
//! assert!(state.is_selected(3));
//! assert!(!state.is_selected(2));
//!
//! // The viewport decides which payloads are wanted.
//! let tickets = state.set_viewport(0..3, 1);
//! assert_eq!(tickets.len(), 3);
//! ```
//!
//! ## Paths
//!
//! Paths are kept dense: the `i`-th child (zero-based) of the node at `p` is at
//! `p.child(i)`. Inserting, removing, or moving a node shifts its later siblings, and
//! the reported remap is what keeps path-keyed state (like selections) attached to the
//! right nodes. [`Tree::check_invariants`] verifies the whole structure and is cheap
//! enough for tests and debug assertions.

mod descriptor;
mod edit;
mod engine;
mod tree;
mod window;

pub use descriptor::{
    IngestError, IngestReport, Leaf, NodeDescriptor, Placement, Rejected, Removal, Renamed,
};
pub use edit::{EditError, MoveOutcome};
pub use engine::{EngineConfig, TreeState};
pub use tree::{InvariantViolation, Node, Tree};
pub use window::{RowStrip, WindowRow};
