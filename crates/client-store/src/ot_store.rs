//! The OT half of the client store contract plus an in-memory reference
//! implementation.

use std::collections::HashMap;

use change_model::{Change, SyncError};
use patch_algebra::apply;
use serde_json::Value;
use smartstring::alias::String as SmartString;

use crate::types::{DocIndexEntry, StoredDoc};

pub trait OtClientStore {
 fn track_docs(&mut self, ids: &[SmartString]) -> Result<(), SyncError>;
 fn untrack_docs(&mut self, ids: &[SmartString]) -> Result<(), SyncError>;
 fn list_docs(&self, include_deleted: bool) -> Result<Vec<DocIndexEntry>, SyncError>;
 fn get_doc(&self, id: &str) -> Result<Option<StoredDoc>, SyncError>;
 fn save_pending_changes(&mut self, id: &str, changes: &[Change]) -> Result<(), SyncError>;
 fn get_pending_changes(&self, id: &str) -> Result<Vec<Change>, SyncError>;
 /// Atomic: append `server_changes` to the committed log, replace the entire
 /// pending list with `rebased_pending`, update `committedRev`. If the committed log grows to
 /// `snapshot_interval` or more, fold it into a new snapshot and truncate.
 fn apply_server_changes(
 &mut self,
 id: &str,
 server_changes: &[Change],
 rebased_pending: &[Change],
 ) -> Result<(), SyncError>;
 fn delete_doc(&mut self, id: &str) -> Result<(), SyncError>;
 fn confirm_delete_doc(&mut self, id: &str) -> Result<(), SyncError>;
 fn close(&mut self) -> Result<(), SyncError>;
}

struct OtDocRecord {
 snapshot_state: Value,
 snapshot_rev: u64,
 /// Committed changes folded on top of `snapshot_state`, not yet compacted away.
 committed_tail: Vec<Change>,
 pending: Vec<Change>,
 deleted: bool,
}

impl OtDocRecord {
 fn new(initial_state: Value) -> Self {
 OtDocRecord {
 snapshot_state: initial_state,
 snapshot_rev: 0,
 committed_tail: Vec::new(),
 pending: Vec::new(),
 deleted: false,
 }
 }

 fn committed_rev(&self) -> u64 {
 self.committed_tail.last().map(|c| c.rev).unwrap_or(self.snapshot_rev)
 }

 fn reconstruct_state(&self) -> Result<Value, SyncError> {
 let mut state = self.snapshot_state.clone();
 for change in &self.committed_tail {
 state = apply(&state, &change.ops, true)?;
 }
 for change in &self.pending {
 state = apply(&state, &change.ops, true)?;
 }
 Ok(state)
 }

 fn compact_if_due(&mut self, snapshot_interval: usize) -> Result<(), SyncError> {
 if self.committed_tail.len() < snapshot_interval {
 return Ok(());
 }
 let mut state = self.snapshot_state.clone();
 for change in &self.committed_tail {
 state = apply(&state, &change.ops, true)?;
 }
 self.snapshot_rev = self.committed_tail.last().map(|c| c.rev).unwrap_or(self.snapshot_rev);
 self.snapshot_state = state;
 self.committed_tail.clear();
 Ok(())
 }
}

/// Reference `OtClientStore`: a plain in-process map, no actual persistence. Used by tests and by
/// embedders that don't need durability across process restarts.
pub struct InMemoryOtStore {
 docs: HashMap<SmartString, OtDocRecord>,
 snapshot_interval: usize,
}

impl InMemoryOtStore {
 pub fn new(snapshot_interval: usize) -> Self {
 InMemoryOtStore { docs: HashMap::new(), snapshot_interval }
 }

 /// Seed a doc that doesn't exist yet with its initial committed state (used by
 /// `BranchManager::create_branch` and by tests; `trackDocs` alone doesn't know what state to
 /// start a brand-new doc at).
 pub fn seed(&mut self, id: impl Into<SmartString>, state: Value, rev: u64) {
 let mut record = OtDocRecord::new(state);
 record.snapshot_rev = rev;
 self.docs.insert(id.into(), record);
 }
}

impl OtClientStore for InMemoryOtStore {
 fn track_docs(&mut self, ids: &[SmartString]) -> Result<(), SyncError> {
 for id in ids {
 match self.docs.get_mut(id) {
 Some(record) => record.deleted = false,
 None => {
 self.docs.insert(id.clone(), OtDocRecord::new(Value::Null));
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

 fn get_doc(&self, id: &str) -> Result<Option<StoredDoc>, SyncError> {
 let Some(record) = self.docs.get(id) else { return Ok(None) };
 if record.deleted {
 return Ok(None);
 }
 Ok(Some(StoredDoc {
 state: record.reconstruct_state()?,
 rev: record.committed_rev(),
 pending: record.pending.clone(),
 }))
 }

 fn save_pending_changes(&mut self, id: &str, changes: &[Change]) -> Result<(), SyncError> {
 let record = self
.docs
.entry(id.into())
.or_insert_with(|| OtDocRecord::new(Value::Null));
 record.deleted = false;
 record.pending.extend_from_slice(changes);
 Ok(())
 }

 fn get_pending_changes(&self, id: &str) -> Result<Vec<Change>, SyncError> {
 Ok(self.docs.get(id).map(|r| r.pending.clone()).unwrap_or_default())
 }

 fn apply_server_changes(
 &mut self,
 id: &str,
 server_changes: &[Change],
 rebased_pending: &[Change],
 ) -> Result<(), SyncError> {
 let record = self
.docs
.get_mut(id)
.ok_or_else(|| SyncError::Storage(format!("doc {id} not tracked")))?;
 record.committed_tail.extend_from_slice(server_changes);
 record.pending = rebased_pending.to_vec();
 record.compact_if_due(self.snapshot_interval)?;
 Ok(())
 }

 fn delete_doc(&mut self, id: &str) -> Result<(), SyncError> {
 if let Some(record) = self.docs.get_mut(id) {
 record.deleted = true;
 record.committed_tail.clear();
 record.pending.clear();
 record.snapshot_state = Value::Null;
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
 use serde_json::json;

 fn change(id: &str, rev: u64, base_rev: u64, committed_at: i64, ops: Vec<patch_algebra::Op>) -> Change {
 Change { id: id.into(), rev, base_rev, ops, created_at: 0, committed_at, metadata: None, batch_id: None }
 }

 #[test]
 fn track_then_list_shows_untracked_doc_with_zero_rev() {
 let mut store = InMemoryOtStore::new(200);
 store.track_docs(&["a".into()]).unwrap();
 let docs = store.list_docs(false).unwrap();
 assert_eq!(docs, vec![DocIndexEntry { id: "a".into(), committed_rev: 0, deleted: false }]);
 }

 #[test]
 fn get_doc_folds_snapshot_committed_and_pending() {
 let mut store = InMemoryOtStore::new(200);
 store.seed("a", json!({"x": 1}), 0);
 store
.apply_server_changes("a", &[change("s1", 1, 0, 5, vec![patch_algebra::Op::replace("/x", json!(2))])], &[])
.unwrap();
 store
.save_pending_changes("a", &[change("p1", 2, 1, 0, vec![patch_algebra::Op::add("/y", json!(9))])])
.unwrap();

 let doc = store.get_doc("a").unwrap().unwrap();
 assert_eq!(doc.rev, 1);
 assert_eq!(doc.state, json!({"x": 2, "y": 9}));
 assert_eq!(doc.pending.len(), 1);
 }

 #[test]
 fn apply_server_changes_replaces_pending_atomically() {
 let mut store = InMemoryOtStore::new(200);
 store.seed("a", json!({}), 0);
 store.save_pending_changes("a", &[change("stale", 1, 0, 0, vec![])]).unwrap();
 store
.apply_server_changes("a", &[change("s1", 1, 0, 5, vec![])], &[change("rebased", 2, 1, 0, vec![])])
.unwrap();

 let pending = store.get_pending_changes("a").unwrap();
 assert_eq!(pending.len(), 1);
 assert_eq!(pending[0].id, "rebased".into());
 }

 #[test]
 fn compaction_folds_committed_tail_once_interval_reached() {
 let mut store = InMemoryOtStore::new(2);
 store.seed("a", json!({"n": 0}), 0);
 let committed = vec![
 change("s1", 1, 0, 1, vec![patch_algebra::Op::replace("/n", json!(1))]),
 change("s2", 2, 1, 2, vec![patch_algebra::Op::replace("/n", json!(2))]),
 ];
 store.apply_server_changes("a", &committed, &[]).unwrap();

 let record = store.docs.get("a").unwrap();
 assert!(record.committed_tail.is_empty());
 assert_eq!(record.snapshot_rev, 2);
 assert_eq!(record.snapshot_state, json!({"n": 2}));
 }

 #[test]
 fn delete_then_get_doc_returns_none() {
 let mut store = InMemoryOtStore::new(200);
 store.seed("a", json!({}), 0);
 store.delete_doc("a").unwrap();
 assert!(store.get_doc("a").unwrap().is_none());

 let docs = store.list_docs(true).unwrap();
 assert!(docs[0].deleted);
 }

 #[test]
 fn confirm_delete_removes_index_entry_entirely() {
 let mut store = InMemoryOtStore::new(200);
 store.seed("a", json!({}), 0);
 store.delete_doc("a").unwrap();
 store.confirm_delete_doc("a").unwrap();
 assert!(store.list_docs(true).unwrap().is_empty());
 }
}
