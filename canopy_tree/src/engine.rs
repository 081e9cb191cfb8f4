// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The facade tying structure, expansion, selection, and memory together.

use core::fmt::Debug;
use core::hash::Hash;
use core::ops::Range;

use canopy_memory::{
    ActivityKind, Completion, EvictionReport, HydratedRecord, HydrationFailure, HydrationTicket,
    MemoryConfig, MemoryManager,
};
use canopy_selection::{CodecError, Selection, SelectionFlags};
use hashbrown::HashSet;
use serde_json::Value;
use tracing::{debug, trace};

use crate::descriptor::{IngestReport, NodeDescriptor, Removal};
use crate::edit::{EditError, MoveOutcome};
use crate::tree::{Node, Tree};
use crate::window::{RowExtents, RowStrip, WindowRow, compute_row_strip};

/// Tunables for a [`TreeState`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineConfig {
    /// Payload budget.
    pub memory: MemoryConfig,
    /// Rows kept protected and hydrated on each side of the viewport.
    pub overscan_rows: usize,
    /// Height used for rows without an estimate.
    pub default_row_height: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            memory: MemoryConfig::default(),
            overscan_rows: 10,
            default_row_height: 24.0,
        }
    }
}

impl EngineConfig {
    /// Default settings with the given payload budget.
    pub fn with_memory(memory: MemoryConfig) -> Self {
        Self {
            memory,
            ..Self::default()
        }
    }

    /// Replace the overscan row count.
    #[must_use]
    pub fn with_overscan_rows(mut self, rows: usize) -> Self {
        self.overscan_rows = rows;
        self
    }

    /// Replace the fallback row height.
    #[must_use]
    pub fn with_default_row_height(mut self, height: f64) -> Self {
        self.default_row_height = height;
        self
    }
}

/// A tree with expansion, selection, and payload memory kept consistent across edits.
///
/// Structural operations go through this type so that every path change is applied to
/// the selection, deleted nodes are dropped from memory and expansion, and the memory
/// manager's protection set (expanded nodes and selection roots) stays current.
///
/// The flattened list of visible rows (roots, plus the children of expanded nodes, in
/// depth-first order) is rebuilt lazily after a change.
#[derive(Clone, Debug)]
pub struct TreeState<K, P = HydratedRecord> {
    config: EngineConfig,
    tree: Tree<K>,
    selection: Selection,
    memory: MemoryManager<K, P>,
    expanded: HashSet<K>,
    rows: Vec<K>,
    extents: RowExtents,
    rows_dirty: bool,
}

impl<K, P> Default for TreeState<K, P>
where
    K: Copy + Eq + Hash + Debug,
{
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl<K, P> TreeState<K, P>
where
    K: Copy + Eq + Hash + Debug,
{
    /// Create an empty state.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            tree: Tree::new(),
            selection: Selection::new(),
            memory: MemoryManager::new(config.memory),
            expanded: HashSet::new(),
            rows: Vec::new(),
            extents: RowExtents::default(),
            rows_dirty: false,
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The structural store.
    pub fn tree(&self) -> &Tree<K> {
        &self.tree
    }

    /// The current selection snapshot.
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// The payload manager.
    pub fn memory(&self) -> &MemoryManager<K, P> {
        &self.memory
    }

    /// Apply a batch of node descriptors. See [`Tree::ingest`].
    ///
    /// New children of a node that was selected on its own ("select this node only")
    /// arrive deselected.
    pub fn ingest<I>(&mut self, batch: I) -> IngestReport<K>
    where
        I: IntoIterator<Item = NodeDescriptor<K>>,
    {
        let report = self.tree.ingest(batch);
        self.selection = self.selection.remap(&report.remap);
        for &id in &report.accepted {
            let (Some(parent), Some(path)) = (self.tree.parent_of(id), self.tree.path_of(id))
            else {
                continue;
            };
            let Some(parent_path) = self.tree.path_of(parent) else {
                continue;
            };
            self.selection = self
                .selection
                .exclude_new_children(parent_path, [path.clone()]);
        }
        if !report.accepted.is_empty() || !report.remap.is_empty() {
            self.rows_dirty = true;
        }
        self.refresh_protection();
        report
    }

    /// Delete `id` and its subtree, dropping their selection, expansion, and payloads.
    pub fn remove(&mut self, id: K) -> Result<Removal<K>, EditError<K>> {
        let removal = self.tree.remove(id)?;
        self.selection = self
            .selection
            .drop_subtree(&removal.root_path)
            .remap(&removal.remap);
        for gone in &removal.removed {
            self.memory.forget(*gone);
            self.expanded.remove(gone);
        }
        self.rows_dirty = true;
        self.refresh_protection();
        Ok(removal)
    }

    /// Move `id` under `new_parent` at `new_index`. See [`Tree::move_node`].
    ///
    /// The moved subtree keeps its selection state. Nodes moved into a selected region
    /// become selected with it.
    pub fn move_node(
        &mut self,
        id: K,
        new_parent: Option<K>,
        new_index: usize,
    ) -> Result<MoveOutcome<K>, EditError<K>> {
        let outcome = self.tree.move_node(id, new_parent, new_index)?;
        self.selection = self
            .selection
            .remap_moved(&outcome.remap, &outcome.old_path);
        self.rows_dirty = true;
        self.refresh_protection();
        Ok(outcome)
    }

    /// Record that every child of `id` has been reported.
    pub fn mark_children_complete(&mut self, id: K) -> bool {
        self.tree.mark_children_complete(id)
    }

    /// Update the row height estimate of `id`.
    pub fn set_row_height(&mut self, id: K, height: Option<f64>) -> bool {
        let known = self.tree.set_estimated_height(id, height);
        self.rows_dirty |= known;
        known
    }

    /// Expand or collapse `id`. Returns `true` if the state changed.
    pub fn set_expanded(&mut self, id: K, expanded: bool, now: u64) -> bool {
        if !self.tree.contains(id) {
            debug!(?id, "ignoring expansion change for unknown node");
            return false;
        }
        let changed = if expanded {
            self.expanded.insert(id)
        } else {
            self.expanded.remove(&id)
        };
        if changed {
            self.memory.record_activity(ActivityKind::Expand, now);
            self.rows_dirty = true;
            self.refresh_protection();
        }
        changed
    }

    /// Flip the expansion of `id` and return the new state.
    pub fn toggle_expanded(&mut self, id: K, now: u64) -> bool {
        let expand = !self.is_expanded(id);
        self.set_expanded(id, expand, now);
        self.is_expanded(id)
    }

    /// Returns `true` if `id` is expanded.
    pub fn is_expanded(&self, id: K) -> bool {
        self.expanded.contains(&id)
    }

    /// Ids of the visible rows in display order.
    pub fn visible_rows(&mut self) -> &[K] {
        self.ensure_rows();
        &self.rows
    }

    /// Number of visible rows.
    pub fn visible_len(&mut self) -> usize {
        self.ensure_rows();
        self.rows.len()
    }

    /// Render data for the visible rows in `range` (clamped to the row count).
    pub fn visible_window(&mut self, range: Range<usize>) -> Vec<WindowRow<K>> {
        self.ensure_rows();
        let end = range.end.min(self.rows.len());
        let start = range.start.min(end);
        self.rows[start..end]
            .iter()
            .filter_map(|&id| {
                let node = self.tree.get(id)?;
                Some(WindowRow {
                    id,
                    depth: node.depth(),
                    is_expanded: self.expanded.contains(&id),
                    is_selected: self.selection.is_selected(node.path()),
                    leaf: node.leaf(),
                    hydration: self.memory.state(&id),
                })
            })
            .collect()
    }

    /// Rows to realize for a pixel viewport. See [`RowStrip`].
    pub fn visible_strip(
        &mut self,
        scroll_offset: f64,
        viewport_extent: f64,
        overscan_before: f64,
        overscan_after: f64,
    ) -> RowStrip {
        self.ensure_rows();
        compute_row_strip(
            &self.extents,
            scroll_offset,
            viewport_extent,
            overscan_before,
            overscan_after,
        )
    }

    /// Report the visible row range.
    ///
    /// The range is widened by the configured overscan; those rows become the memory
    /// manager's viewport and tickets are returned for the ones without a payload. Rows
    /// that scrolled out lose their protection, so the payload ceiling is enforced again.
    pub fn set_viewport(&mut self, range: Range<usize>, now: u64) -> Vec<HydrationTicket<K>> {
        self.ensure_rows();
        let len = self.rows.len();
        let overscan = self.config.overscan_rows;
        let end = range.end.saturating_add(overscan).min(len);
        let start = range.start.saturating_sub(overscan).min(end);
        let ids = self.rows[start..end].to_vec();
        trace!(start, end, "viewport updated");
        self.memory.record_activity(ActivityKind::Scroll, now);
        let report = self.memory.update_viewport(ids.iter().copied(), now);
        if !report.evicted.is_empty() {
            debug!(evicted = report.evicted.len(), "rows left the viewport");
        }
        self.memory.request_hydration(ids, now)
    }

    /// Report the outcome of a fetch. See [`MemoryManager::complete_hydration`].
    pub fn complete_hydration(
        &mut self,
        ticket: HydrationTicket<K>,
        result: Result<P, HydrationFailure>,
        now: u64,
    ) -> Completion<K> {
        if !self.tree.contains(ticket.id) {
            debug!(id = ?ticket.id, "completion for a deleted node ignored");
            return Completion::Stale;
        }
        self.memory.complete_hydration(ticket, result, now)
    }

    /// Note user activity.
    pub fn record_activity(&mut self, kind: ActivityKind, now: u64) {
        self.memory.record_activity(kind, now);
    }

    /// Run the idle and TTL eviction pass.
    pub fn sweep(&mut self, now: u64) -> EvictionReport<K> {
        self.memory.sweep(now)
    }

    /// Select `id`. Returns `true` if the selection changed.
    pub fn select(&mut self, id: K, flags: SelectionFlags) -> bool {
        let Some(path) = self.tree.path_of(id).cloned() else {
            debug!(?id, "ignoring selection of unknown node");
            return false;
        };
        let next = self.selection.add(&path, &self.tree, flags);
        self.replace_selection(next)
    }

    /// Deselect `id`. Returns `true` if the selection changed.
    pub fn deselect(&mut self, id: K, flags: SelectionFlags) -> bool {
        let Some(path) = self.tree.path_of(id).cloned() else {
            debug!(?id, "ignoring deselection of unknown node");
            return false;
        };
        let next = self.selection.remove(&path, &self.tree, flags);
        self.replace_selection(next)
    }

    /// Drop the whole selection.
    pub fn clear_selection(&mut self) -> bool {
        if self.selection.is_empty() {
            return false;
        }
        let next = self.selection.cleared();
        self.replace_selection(next)
    }

    /// Returns `true` if `id` is selected.
    pub fn is_selected(&self, id: K) -> bool {
        self.tree
            .path_of(id)
            .is_some_and(|path| self.selection.is_selected(path))
    }

    /// Ids of the selection's branch roots that are in the tree.
    pub fn selected_roots(&self) -> Vec<K> {
        self.selection
            .roots()
            .filter_map(|path| self.tree.node_at(path))
            .collect()
    }

    /// The selection in its JSON record form, normalized first.
    pub fn save_selection(&self) -> Value {
        canopy_selection::encode(&self.selection.optimize())
    }

    /// Replace the selection from its JSON record form.
    ///
    /// Strict: on error the current selection is kept.
    pub fn restore_selection(&mut self, value: &Value) -> Result<(), CodecError> {
        self.selection = canopy_selection::decode(value)?.optimize();
        self.refresh_protection();
        Ok(())
    }

    fn replace_selection(&mut self, next: Selection) -> bool {
        if next.version() == self.selection.version() {
            return false;
        }
        self.selection = next;
        self.refresh_protection();
        true
    }

    fn refresh_protection(&mut self) {
        let roots = self.selected_roots();
        let report = self
            .memory
            .update_memory_protection(self.expanded.iter().copied(), roots);
        if !report.evicted.is_empty() {
            debug!(evicted = report.evicted.len(), "nodes lost protection");
        }
    }

    fn ensure_rows(&mut self) {
        if !self.rows_dirty {
            return;
        }
        self.rows.clear();
        let mut stack: Vec<K> = self.tree.roots().iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            self.rows.push(id);
            if self.expanded.contains(&id) {
                stack.extend(self.tree.children_of(id).iter().rev().copied());
            }
        }
        let fallback = self.config.default_row_height;
        self.extents = RowExtents::from_heights(self.rows.iter().map(|&id| {
            self.tree
                .get(id)
                .and_then(Node::estimated_height)
                .unwrap_or(fallback)
        }));
        self.rows_dirty = false;
        trace!(rows = self.rows.len(), "rebuilt visible rows");
    }
}
