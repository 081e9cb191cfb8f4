// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Path operations over raw strings, for hosts that persist paths as text.

use alloc::string::{String, ToString};
use core::cmp::Ordering;

use crate::path::{PathError, PathId};

/// Returns whether `a` is a proper ancestor of `b`, validating both strings first.
///
/// For valid paths this is exactly `b.starts_with(&(a.to_owned() + "."))`.
pub fn is_ancestor_str(a: &str, b: &str) -> Result<bool, PathError> {
    let a: PathId = a.parse()?;
    let b: PathId = b.parse()?;
    Ok(a.is_ancestor_of(&b))
}

/// Depth-first order of two path strings, comparing segments numerically.
///
/// Unlike plain string comparison, `"2" < "10"` and `"1.9" < "1.10"`.
pub fn compare_order_str(a: &str, b: &str) -> Result<Ordering, PathError> {
    let a: PathId = a.parse()?;
    let b: PathId = b.parse()?;
    Ok(a.cmp(&b))
}

/// Depth (segment count minus one) of a path string.
pub fn depth_of_str(path: &str) -> Result<usize, PathError> {
    Ok(path.parse::<PathId>()?.depth())
}

/// Parent of a path string, or `None` for a root path.
pub fn parent_path_str(path: &str) -> Result<Option<String>, PathError> {
    Ok(path.parse::<PathId>()?.parent().map(|p| p.to_string()))
}
