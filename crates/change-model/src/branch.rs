//! `Branch`: a forked document with its own change stream.

use serde::{Deserialize, Serialize};
use smartstring::alias::String as SmartString;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BranchStatus {
 Open,
 Closed,
 Merged,
 Archived,
 Abandoned,
}

impl BranchStatus {
 /// Closed-for-merge branches cannot accept further commits.
 pub fn accepts_commits(&self) -> bool {
 matches!(self, BranchStatus::Open)
 }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
 pub id: SmartString,
 pub doc_id: SmartString,
 pub branched_at_rev: u64,
 pub status: BranchStatus,
 pub name: Option<SmartString>,
 pub metadata: Option<serde_json::Value>,
}
