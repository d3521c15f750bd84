//! Decoded bundle values held by the [`DecodedCache`](crate::DecodedCache).
//!
//! Only the shape matters here; turning raw bundle rows into these structs is
//! the caller's job.

use crate::decoded::Weighted;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Identifier of an element within a bundle.
pub type Id = u64;

fn cost(children: usize) -> u32 {
    u32::try_from(children).unwrap_or(u32::MAX).saturating_add(1)
}

/// Everything needed to answer queries about a single document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentData {
    pub ranges: HashMap<Id, RangeData>,
    pub hover_results: HashMap<Id, String>,
    pub monikers: HashMap<Id, MonikerData>,
    pub package_information: HashMap<Id, PackageInformationData>,
}

impl Weighted for DocumentData {
    fn cost(&self) -> u32 {
        cost(self.ranges.len() + self.hover_results.len() + self.monikers.len() + self.package_information.len())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RangeData {
    pub start_line: u32,
    pub start_character: u32,
    pub end_line: u32,
    pub end_character: u32,
    pub definition_result_id: Option<Id>,
    pub reference_result_id: Option<Id>,
    pub hover_result_id: Option<Id>,
    #[serde(default)]
    pub moniker_ids: Vec<Id>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonikerData {
    /// `import`, `export` or `local`.
    pub kind: String,
    pub scheme: String,
    pub identifier: String,
    pub package_information_id: Option<Id>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageInformationData {
    pub name: String,
    pub version: String,
}

/// A shard of a bundle's definition/reference results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultChunkData {
    pub document_paths: HashMap<Id, String>,
    /// Keyed by definition or reference result id.
    pub document_id_range_ids: HashMap<Id, Vec<DocumentIdRangeId>>,
}

impl Weighted for ResultChunkData {
    fn cost(&self) -> u32 {
        cost(self.document_paths.len() + self.document_id_range_ids.len())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentIdRangeId {
    pub document_id: Id,
    pub range_id: Id,
}
