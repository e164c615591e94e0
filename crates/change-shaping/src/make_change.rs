//! `makeChange`: turn a mutator's recorded ops into one (or, once broken, several)
//! pending [`Change`]s, re-validated against the live state before being handed back.
//!
//! The source spec's mutator runs against a typed path-proxy; design notes, "
//! implementations without expressive type systems expose a string-path API instead" -- this is
//! that string-path API: [`ChangeBuilder`] just accumulates [`Op`]s for the caller to apply.

use change_model::{Change, SyncConfig, SyncError};
use patch_algebra::{apply, Op};
use serde_json::Value;
use smartstring::alias::String as SmartString;

use crate::shape::break_change;

#[derive(Debug, Default)]
pub struct ChangeBuilder {
 ops: Vec<Op>,
}

impl ChangeBuilder {
 pub fn new() -> Self { Self::default() }

 pub fn push(&mut self, op: Op) -> &mut Self {
 self.ops.push(op);
 self
 }

 pub fn add(&mut self, path: impl Into<SmartString>, value: Value) -> &mut Self { self.push(Op::add(path, value)) }
 pub fn replace(&mut self, path: impl Into<SmartString>, value: Value) -> &mut Self { self.push(Op::replace(path, value)) }
 pub fn remove(&mut self, path: impl Into<SmartString>) -> &mut Self { self.push(Op::remove(path)) }

 /// Consume the builder, handing back whatever ops the mutator recorded. Used by `DocState`'s
 /// `change()`, which only needs to emit the ops (not turn them into a `Change` itself -- that
 /// happens once the coordinator calls `make_change`).
 pub fn into_ops(self) -> Vec<Op> {
 self.ops
 }
}

pub struct MakeChangeInput<'a> {
 pub state: &'a Value,
 pub snapshot_rev: u64,
 pub last_pending_rev: Option<u64>,
 pub id: SmartString,
 pub created_at: i64,
 pub metadata: Option<Value>,
 pub max_bytes: Option<usize>,
}

/// Run `mutator` against a builder, validate the resulting ops by reapplying them to `state`, and
/// produce the change (or changes, if `max_bytes` forces a split). Returns an empty `Vec` if the
/// mutator recorded no ops.
pub fn make_change(
 input: MakeChangeInput,
 mutator: impl FnOnce(&mut ChangeBuilder),
 config: &SyncConfig,
) -> Result<Vec<Change>, SyncError> {
 let mut builder = ChangeBuilder::new();
 mutator(&mut builder);
 if builder.ops.is_empty() {
 return Ok(Vec::new());
 }

 apply(input.state, &builder.ops, true)?;

 let rev = input.last_pending_rev.map(|r| r + 1).unwrap_or(input.snapshot_rev + 1);
 let change = Change {
 id: input.id,
 rev,
 base_rev: input.snapshot_rev,
 ops: builder.ops,
 created_at: input.created_at,
 committed_at: 0,
 metadata: input.metadata,
 batch_id: None,
 };

 let max_bytes = input.max_bytes.unwrap_or(config.max_payload_bytes);
 Ok(break_change(&change, max_bytes))
}

#[cfg(test)]
mod test {
 use super::*;
 use serde_json::json;

 #[test]
 fn empty_mutator_yields_no_change() {
 let state = json!({"a": 1});
 let result = make_change(
 MakeChangeInput { state: &state, snapshot_rev: 0, last_pending_rev: None, id: "c".into(), created_at: 0, metadata: None, max_bytes: None },
 |_b| {},
 &SyncConfig::default(),
 ).unwrap();
 assert!(result.is_empty());
 }

 #[test]
 fn mutator_produces_one_change_with_expected_revs() {
 let state = json!({"a": 1});
 let result = make_change(
 MakeChangeInput { state: &state, snapshot_rev: 5, last_pending_rev: Some(7), id: "c".into(), created_at: 0, metadata: None, max_bytes: None },
 |b| { b.replace("/a", json!(2)); },
 &SyncConfig::default(),
 ).unwrap();
 assert_eq!(result.len(), 1);
 assert_eq!(result[0].base_rev, 5);
 assert_eq!(result[0].rev, 8);
 }

 #[test]
 fn invalid_op_fails_validation() {
 let state = json!({"a": 1});
 let result = make_change(
 MakeChangeInput { state: &state, snapshot_rev: 0, last_pending_rev: None, id: "c".into(), created_at: 0, metadata: None, max_bytes: None },
 |b| { b.remove("/missing"); },
 &SyncConfig::default(),
 );
 assert!(result.is_err());
 }
}
