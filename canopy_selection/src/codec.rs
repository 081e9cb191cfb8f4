// Copyright 2025 the Canopy Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The flat list-of-records form a selection is persisted and exchanged in.
//!
//! Each branch becomes one JSON object:
//!
//! ```json
//! { "rootPath": "1.2", "deselectedAncestorPaths": ["1"], "deselectedDescendantPaths": ["1.2.3"] }
//! ```
//!
//! Branches with sealed paths (see [`Branch::sealed`]) also carry a `"sealedPaths"` list.
//! The field is omitted when empty and defaults to empty when missing.
//!
//! Decoding never panics. Malformed records (wrong field types, non-array exception
//! lists, unparsable paths, exceptions that are not related to the root the way their
//! list claims) are reported with their index.

use canopy_path::PathId;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::branch::Branch;
use crate::selection::Selection;

/// External form of one [`Branch`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchRecord {
    /// Root of the selected subtree.
    pub root_path: PathId,
    /// Proper ancestors of the root treated as not selected.
    #[serde(default)]
    pub deselected_ancestor_paths: Vec<PathId>,
    /// Subtrees under the root excluded from the selection.
    #[serde(default)]
    pub deselected_descendant_paths: Vec<PathId>,
    /// Covered paths whose later-loaded children start out deselected.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sealed_paths: Vec<PathId>,
}

/// Why a single record was rejected.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RecordFault {
    /// The record does not have the expected shape or field types.
    #[error("malformed record: {0}")]
    Malformed(String),
    /// An ancestor exception is not a proper ancestor of the root.
    #[error("{exception} is not a proper ancestor of root {root}")]
    NotAnAncestor {
        /// Root of the record.
        root: PathId,
        /// Offending entry.
        exception: PathId,
    },
    /// A descendant exception is not a proper descendant of the root.
    #[error("{exception} is not a proper descendant of root {root}")]
    NotADescendant {
        /// Root of the record.
        root: PathId,
        /// Offending entry.
        exception: PathId,
    },
    /// A sealed path is not covered by the record's branch.
    #[error("sealed path {path} is not covered by root {root}")]
    NotCovered {
        /// Root of the record.
        root: PathId,
        /// Offending entry.
        path: PathId,
    },
}

/// A rejected record and its position in the input list.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("record {index}: {fault}")]
pub struct RecordError {
    /// Zero-based index of the record in the input list.
    pub index: usize,
    /// What was wrong with it.
    pub fault: RecordFault,
}

/// Errors from decoding a whole selection.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The input is not valid JSON.
    #[error("invalid selection JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The top-level value is not an array of records.
    #[error("selection must be an array of branch records")]
    NotAnArray,
    /// A record was rejected (strict decoding only).
    #[error(transparent)]
    Record(#[from] RecordError),
}

/// Result of [`decode_lenient`]: the records that decoded, plus the ones that did not.
#[derive(Clone, Debug, Default)]
pub struct LenientDecode {
    /// Selection built from the accepted records, in input order.
    pub selection: Selection,
    /// Rejected records.
    pub rejected: Vec<RecordError>,
}

impl From<&Branch> for BranchRecord {
    fn from(branch: &Branch) -> Self {
        Self {
            root_path: branch.root().clone(),
            deselected_ancestor_paths: branch.deselected_ancestors().to_vec(),
            deselected_descendant_paths: branch.deselected_descendants().to_vec(),
            sealed_paths: branch.sealed().to_vec(),
        }
    }
}

impl TryFrom<BranchRecord> for Branch {
    type Error = RecordFault;

    fn try_from(record: BranchRecord) -> Result<Self, Self::Error> {
        let root = record.root_path;
        if let Some(bad) = record
            .deselected_ancestor_paths
            .iter()
            .find(|a| !a.is_ancestor_of(&root))
        {
            return Err(RecordFault::NotAnAncestor {
                exception: bad.clone(),
                root,
            });
        }
        if let Some(bad) = record
            .deselected_descendant_paths
            .iter()
            .find(|d| !root.is_ancestor_of(d))
        {
            return Err(RecordFault::NotADescendant {
                exception: bad.clone(),
                root,
            });
        }
        let branch = Self::with_exceptions(
            root,
            record.deselected_ancestor_paths,
            record.deselected_descendant_paths,
        );
        if let Some(bad) = record.sealed_paths.iter().find(|s| !branch.covers(s)) {
            return Err(RecordFault::NotCovered {
                root: branch.root().clone(),
                path: bad.clone(),
            });
        }
        Ok(branch.with_sealed(record.sealed_paths))
    }
}

/// The records of `selection`, in branch order.
pub fn to_records(selection: &Selection) -> Vec<BranchRecord> {
    selection.branches().iter().map(BranchRecord::from).collect()
}

/// Encode `selection` as a JSON array of records.
pub fn encode(selection: &Selection) -> Value {
    match serde_json::to_value(to_records(selection)) {
        Ok(value) => value,
        // Records hold only strings and string lists, which always serialize.
        Err(err) => unreachable!("branch records failed to serialize: {err}"),
    }
}

/// Decode a selection, rejecting the whole input at the first bad record.
pub fn decode(value: &Value) -> Result<Selection, CodecError> {
    let items = value.as_array().ok_or(CodecError::NotAnArray)?;
    let branches = items
        .iter()
        .enumerate()
        .map(|(index, item)| decode_record(item).map_err(|fault| RecordError { index, fault }))
        .collect::<Result<Vec<_>, _>>()?;
    debug!(branches = branches.len(), "decoded selection");
    Ok(Selection::from_branches(branches))
}

/// Decode a selection, skipping bad records.
///
/// Only a non-array top-level value fails outright.
pub fn decode_lenient(value: &Value) -> Result<LenientDecode, CodecError> {
    let items = value.as_array().ok_or(CodecError::NotAnArray)?;
    let mut branches = Vec::with_capacity(items.len());
    let mut rejected = Vec::new();
    for (index, item) in items.iter().enumerate() {
        match decode_record(item) {
            Ok(branch) => branches.push(branch),
            Err(fault) => {
                warn!(index, %fault, "rejected selection record");
                rejected.push(RecordError { index, fault });
            }
        }
    }
    Ok(LenientDecode {
        selection: Selection::from_branches(branches),
        rejected,
    })
}

/// Parse JSON text and [`decode`] it.
pub fn from_json_str(text: &str) -> Result<Selection, CodecError> {
    let value: Value = serde_json::from_str(text)?;
    decode(&value)
}

/// [`encode`] and render as compact JSON text.
pub fn to_json_string(selection: &Selection) -> String {
    encode(selection).to_string()
}

fn decode_record(item: &Value) -> Result<Branch, RecordFault> {
    let record = BranchRecord::deserialize(item)
        .map_err(|err| RecordFault::Malformed(err.to_string()))?;
    Branch::try_from(record)
}

impl Serialize for Selection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.branches().iter().map(BranchRecord::from))
    }
}

impl<'de> Deserialize<'de> for Selection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let records = Vec::<BranchRecord>::deserialize(deserializer)?;
        let branches = records
            .into_iter()
            .enumerate()
            .map(|(index, record)| {
                Branch::try_from(record)
                    .map_err(|fault| D::Error::custom(RecordError { index, fault }))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_branches(branches))
    }
}
