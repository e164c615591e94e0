//! `VersionMetadata`: the simple parent-link version tree used to bound snapshot
//! reconstruction and to record offline sessions. Not a full causal DAG (spec Non-goals).

use serde::{Deserialize, Serialize};
use smartstring::alias::String as SmartString;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersionOrigin {
 Main,
 Offline,
 Branch,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionMetadata {
 pub id: SmartString,
 pub parent_id: Option<SmartString>,
 /// Shared by every version created from the same offline batch (spec §4.3 step 5).
 pub group_id: Option<SmartString>,
 pub origin: VersionOrigin,
 pub started_at: i64,
 pub ended_at: i64,
 pub start_rev: u64,
 pub end_rev: u64,
 pub base_rev: u64,
 pub name: Option<SmartString>,
 pub branch_name: Option<SmartString>,
}
