//! The LWW half of the client store contract plus an in-memory reference
//! implementation.
//!
//! Local writes move through two stages before they're folded into `committed_ops`: they start in
//! `pending`, and once the coordinator is ready to send them, `save_sending_change` atomically
//! moves the whole pending list into `sending` so further local edits keep accumulating in a fresh
//! (empty) `pending` without racing the in-flight request.

use std::collections::HashMap;

use change_model::{SyncError, TimedOp};
use lww_engine::resolve_lww_set;
use patch_algebra::apply::apply_one;
use serde_json::Value;
use smartstring::alias::String as SmartString;

use crate::types::{DocIndexEntry, LwwStoredDoc};

pub trait LwwClientStore {
 fn track_docs(&mut self, ids: &[SmartString]) -> Result<(), SyncError>;
 fn untrack_docs(&mut self, ids: &[SmartString]) -> Result<(), SyncError>;
 fn list_docs(&self, include_deleted: bool) -> Result<Vec<DocIndexEntry>, SyncError>;
 fn get_doc(&self, id: &str) -> Result<Option<LwwStoredDoc>, SyncError>;
 fn get_pending_ops(&self, id: &str, path_prefixes: Option<&[SmartString]>) -> Result<Vec<TimedOp>, SyncError>;
 fn save_pending_ops(&mut self, id: &str, ops_to_save: &[TimedOp], paths_to_delete: &[SmartString]) -> Result<(), SyncError>;
 fn get_sending_change(&self, id: &str) -> Result<Vec<TimedOp>, SyncError>;
 /// Atomically moves the entire pending list into the sending slot, leaving pending empty.
 fn save_sending_change(&mut self, id: &str) -> Result<Vec<TimedOp>, SyncError>;
 fn confirm_sending_change(&mut self, id: &str) -> Result<(), SyncError>;
 /// Folds `server_ops` into the committed set. Preserves `sending` and `pending` untouched
 /// -- a concurrent incoming broadcast doesn't get to interfere with an in-flight
 /// local commit.
 fn apply_server_changes(&mut self, id: &str, server_ops: &[TimedOp]) -> Result<(), SyncError>;
 fn delete_doc(&mut self, id: &str) -> Result<(), SyncError>;
 fn confirm_delete_doc(&mut self, id: &str) -> Result<(), SyncError>;
 fn close(&mut self) -> Result<(), SyncError>;
}

struct LwwDocRecord {
 base_state: Value,
 committed_ops: Vec<TimedOp>,
 pending: Vec<TimedOp>,
 sending: Vec<TimedOp>,
 deleted: bool,
}

impl LwwDocRecord {
 fn new(base_state: Value) -> Self {
 LwwDocRecord { base_state, committed_ops: Vec::new(), pending: Vec::new(), sending: Vec::new(), deleted: false }
 }

 fn committed_rev(&self) -> u64 {
 self.committed_ops.iter().filter_map(|o| o.rev).max().unwrap_or(0)
 }

 fn reconstruct_state(&self) -> Value {
 let winners = resolve_lww_set(self.committed_ops.iter().cloned().map(|o| (o, false)));
 let mut state = self.base_state.clone();
 for op in &winners {
 let _ = apply_one(&mut state, &op.op, false);
 }
 state
 }
}

/// Reference `LwwClientStore`: plain in-process map, no real persistence.
pub struct InMemoryLwwStore {
 docs: HashMap<SmartString, LwwDocRecord>,
}

impl InMemoryLwwStore {
 pub fn new() -> Self {
 InMemoryLwwStore { docs: HashMap::new() }
 }

 pub fn seed(&mut self, id: impl Into<SmartString>, state: Value) {
 self.docs.insert(id.into(), LwwDocRecord::new(state));
 }
}

impl Default for InMemoryLwwStore {
 fn default() -> Self {
 Self::new()
 }
}

impl LwwClientStore for InMemoryLwwStore {
 fn track_docs(&mut self, ids: &[SmartString]) -> Result<(), SyncError> {
 for id in ids {
 match self.docs.get_mut(id) {
 Some(record) => record.deleted = false,
 None => {
 self.docs.insert(id.clone(), LwwDocRecord::new(Value::Null));
 }
 }
 }
 Ok(())
 }

 fn untrack_docs(&mut self, ids: &[SmartString]) -> Result<(), SyncError> {
 for id in ids {
 self.docs.remove(id);
 }
 Ok(())
 }

 fn list_docs(&self, include_deleted: bool) -> Result<Vec<DocIndexEntry>, SyncError> {
 Ok(self
.docs
.iter()
.filter(|(_, r)| include_deleted || !r.deleted)
.map(|(id, r)| DocIndexEntry { id: id.clone(), committed_rev: r.committed_rev(), deleted: r.deleted })
.collect())
 }

 fn get_doc(&self, id: &str) -> Result<Option<LwwStoredDoc>, SyncError> {
 let Some(record) = self.docs.get(id) else { return Ok(None) };
 if record.deleted {
 return Ok(None);
 }
 Ok(Some(LwwStoredDoc { state: record.reconstruct_state(), rev: record.committed_rev() }))
 }

 fn get_pending_ops(&self, id: &str, path_prefixes: Option<&[SmartString]>) -> Result<Vec<TimedOp>, SyncError> {
 let Some(record) = self.docs.get(id) else { return Ok(Vec::new()) };
 let ops = record.pending.iter().filter(|op| {
 path_prefixes.map_or(true, |prefixes| prefixes.iter().any(|p| patch_algebra::path::is_at_or_under(op.path(), p)))
 });
 Ok(ops.cloned().collect())
 }

 fn save_pending_ops(&mut self, id: &str, ops_to_save: &[TimedOp], paths_to_delete: &[SmartString]) -> Result<(), SyncError> {
 let record = self.docs.entry(id.into()).or_insert_with(|| LwwDocRecord::new(Value::Null));
 record.deleted = false;
 record.pending.retain(|op| !paths_to_delete.iter().any(|p| patch_algebra::path::is_at_or_under(op.path(), p)));
 record.pending.extend_from_slice(ops_to_save);
 Ok(())
 }

 fn get_sending_change(&self, id: &str) -> Result<Vec<TimedOp>, SyncError> {
 Ok(self.docs.get(id).map(|r| r.sending.clone()).unwrap_or_default())
 }

 fn save_sending_change(&mut self, id: &str) -> Result<Vec<TimedOp>, SyncError> {
 let record = self
.docs
.get_mut(id)
.ok_or_else(|| SyncError::Storage(format!("doc {id} not tracked")))?;
 record.sending = std::mem::take(&mut record.pending);
 Ok(record.sending.clone())
 }

 fn confirm_sending_change(&mut self, id: &str) -> Result<(), SyncError> {
 if let Some(record) = self.docs.get_mut(id) {
 record.sending.clear();
 }
 Ok(())
 }

 fn apply_server_changes(&mut self, id: &str, server_ops: &[TimedOp]) -> Result<(), SyncError> {
 let record = self
.docs
.get_mut(id)
.ok_or_else(|| SyncError::Storage(format!("doc {id} not tracked")))?;
 let merged = resolve_lww_set(
 record.committed_ops.iter().cloned().map(|o| (o, false))
.chain(server_ops.iter().cloned().map(|o| (o, false))),
 );
 record.committed_ops = merged;
 Ok(())
 }

 fn delete_doc(&mut self, id: &str) -> Result<(), SyncError> {
 if let Some(record) = self.docs.get_mut(id) {
 record.deleted = true;
 record.committed_ops.clear();
 record.pending.clear();
 record.sending.clear();
 record.base_state = Value::Null;
 }
 Ok(())
 }

 fn confirm_delete_doc(&mut self, id: &str) -> Result<(), SyncError> {
 self.docs.remove(id);
 Ok(())
 }

 fn close(&mut self) -> Result<(), SyncError> {
 Ok(())
 }
}

#[cfg(test)]
mod test {
 use super::*;
 use patch_algebra::Op;
 use serde_json::json;

 fn timed(op: Op, ts: i64, rev: Option<u64>) -> TimedOp {
 TimedOp { op, ts, rev }
 }

 #[test]
 fn pending_ops_filtered_by_path_prefix() {
 let mut store = InMemoryLwwStore::new();
 store.seed("a", json!({}));
 store
.save_pending_ops(
 "a",
 &[timed(Op::add("/title", json!("x")), 1, None), timed(Op::add("/body", json!("y")), 2, None)],
 &[],
 )
.unwrap();

 let filtered = store.get_pending_ops("a", Some(&["/title".into()])).unwrap();
 assert_eq!(filtered.len(), 1);
 assert_eq!(filtered[0].path(), "/title");
 }

 #[test]
 fn save_sending_change_atomically_empties_pending() {
 let mut store = InMemoryLwwStore::new();
 store.seed("a", json!({}));
 store.save_pending_ops("a", &[timed(Op::add("/x", json!(1)), 1, None)], &[]).unwrap();

 let sent = store.save_sending_change("a").unwrap();
 assert_eq!(sent.len(), 1);
 assert!(store.get_pending_ops("a", None).unwrap().is_empty());
 assert_eq!(store.get_sending_change("a").unwrap().len(), 1);
 }

 #[test]
 fn apply_server_changes_preserves_sending_and_pending() {
 let mut store = InMemoryLwwStore::new();
 store.seed("a", json!({"title": "orig"}));
 store.save_pending_ops("a", &[timed(Op::add("/local", json!(1)), 1, None)], &[]).unwrap();
 store.save_sending_change("a").unwrap();
 store.save_pending_ops("a", &[timed(Op::add("/fresh", json!(2)), 2, None)], &[]).unwrap();

 store
.apply_server_changes("a", &[timed(Op::replace("/title", json!("server")), 10, Some(1))])
.unwrap();

 assert_eq!(store.get_sending_change("a").unwrap().len(), 1);
 assert_eq!(store.get_pending_ops("a", None).unwrap().len(), 1);
 assert_eq!(store.get_doc("a").unwrap().unwrap().state, json!({"title": "server"}));
 }

 #[test]
 fn confirm_sending_change_clears_the_sending_slot() {
 let mut store = InMemoryLwwStore::new();
 store.seed("a", json!({}));
 store.save_pending_ops("a", &[timed(Op::add("/x", json!(1)), 1, None)], &[]).unwrap();
 store.save_sending_change("a").unwrap();
 store.confirm_sending_change("a").unwrap();
 assert!(store.get_sending_change("a").unwrap().is_empty());
 }
}
