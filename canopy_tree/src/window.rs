// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Virtualization support for the flattened list of visible rows.

use core::ops::Range;

use canopy_memory::HydrationState;

use crate::descriptor::Leaf;

/// One visible row, as a renderer needs it.
#[derive(Clone, Debug, PartialEq)]
pub struct WindowRow<K> {
    /// The node shown on this row.
    pub id: K,
    /// Indentation depth (roots are 0).
    pub depth: usize,
    /// Whether the node is expanded.
    pub is_expanded: bool,
    /// Whether the node is selected, explicitly or implicitly.
    pub is_selected: bool,
    /// Whether the node may have children, for drawing a disclosure triangle.
    pub leaf: Leaf,
    /// Payload state of the node.
    pub hydration: HydrationState,
}

/// Rows to realize for a scroll position, and the padding around them.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RowStrip {
    /// First realized row (inclusive).
    pub start: usize,
    /// One past the last realized row.
    pub end: usize,
    /// Total height of the rows before `start`.
    pub before_extent: f64,
    /// Total height of the rows after `end`.
    pub after_extent: f64,
    /// Total height of all visible rows.
    pub content_extent: f64,
}

impl RowStrip {
    const EMPTY: Self = Self {
        start: 0,
        end: 0,
        before_extent: 0.0,
        after_extent: 0.0,
        content_extent: 0.0,
    };

    /// Returns `true` if no rows are realized.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Realized row indices.
    pub fn rows(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Prefix sums over row heights. `starts[i]` is the offset of row `i`, and the final
/// entry is the total.
#[derive(Clone, Debug, Default)]
pub(crate) struct RowExtents {
    starts: Vec<f64>,
}

impl RowExtents {
    pub(crate) fn from_heights(heights: impl IntoIterator<Item = f64>) -> Self {
        let mut starts = vec![0.0];
        let mut pos = 0.0;
        for height in heights {
            // Negative and NaN heights count as zero.
            pos += height.max(0.0);
            starts.push(pos);
        }
        Self { starts }
    }

    pub(crate) fn len(&self) -> usize {
        self.starts.len().saturating_sub(1)
    }

    pub(crate) fn total(&self) -> f64 {
        self.starts.last().copied().unwrap_or(0.0)
    }

    pub(crate) fn offset_of(&self, index: usize) -> f64 {
        self.starts
            .get(index)
            .copied()
            .unwrap_or_else(|| self.total())
    }

    /// Index of the row containing `offset`, clamped to the last row.
    pub(crate) fn index_at_offset(&self, offset: f64) -> usize {
        let len = self.len();
        self.starts[..len]
            .partition_point(|&start| start <= offset)
            .saturating_sub(1)
    }
}

/// The rows to realize for a viewport at `scroll_offset` of height `viewport_extent`,
/// plus the given overscan margins (all in the same units as the row heights).
pub(crate) fn compute_row_strip(
    extents: &RowExtents,
    scroll_offset: f64,
    viewport_extent: f64,
    overscan_before: f64,
    overscan_after: f64,
) -> RowStrip {
    let len = extents.len();
    let content_extent = extents.total();
    if len == 0 || content_extent <= 0.0 {
        return RowStrip::EMPTY;
    }

    let scroll_offset = scroll_offset.max(0.0);
    let min = (scroll_offset - overscan_before.max(0.0)).max(0.0);
    let max = (scroll_offset + viewport_extent.max(0.0) + overscan_after.max(0.0))
        .min(content_extent);
    if max <= min {
        return RowStrip {
            before_extent: min.min(content_extent),
            after_extent: (content_extent - min).max(0.0),
            content_extent,
            ..RowStrip::EMPTY
        };
    }

    let start = extents.index_at_offset(min).min(len - 1);
    let mut end = start;
    while end < len && extents.offset_of(end) < max {
        end += 1;
    }
    RowStrip {
        start,
        end,
        before_extent: extents.offset_of(start),
        after_extent: (content_extent - extents.offset_of(end)).max(0.0),
        content_extent,
    }
}
