//! The OT `Change` record and the LWW `TimedOp` record.

use patch_algebra::Op;
use serde::{Deserialize, Serialize};
use smartstring::alias::String as SmartString;

/// An atomic unit of OT edit: an id, base/target revision, and an ordered op list.
///
/// Invariants: for committed changes, `committed_at > 0` and revs form a contiguous
/// ascending sequence per document; `base_rev` is the server rev the client observed when the
/// change was created, and the server preserves `id` across any transform it applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
 pub id: SmartString,
 pub rev: u64,
 pub base_rev: u64,
 pub ops: Vec<Op>,
 pub created_at: i64,
 /// `0` until the server commits this change.
 pub committed_at: i64,
 pub metadata: Option<serde_json::Value>,
 pub batch_id: Option<SmartString>,
}

impl Change {
 pub fn is_committed(&self) -> bool {
 self.committed_at > 0
 }

 /// Approximate wire size in bytes, used by `breakChange`/`breakIntoBatches`.
 pub fn byte_size(&self) -> usize {
 serde_json::to_vec(self).map(|v| v.len()).unwrap_or(usize::MAX)
 }
}

/// A JSON-Patch op stamped with a wall-clock timestamp and, once committed, a per-document
/// monotonic `rev` (spec §3 "Timed op (LWW)"). An op at a path supersedes all ops at child paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimedOp {
 pub op: Op,
 pub ts: i64,
 pub rev: Option<u64>,
}

impl TimedOp {
 pub fn path(&self) -> &str {
 self.op.path()
 }
}
