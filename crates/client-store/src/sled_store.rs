//! A sled-backed indexed-kv `ClientStore` reference (spec §4.6's "indexed-kv" implementation):
//! each tracked doc is one serialized record under its id in a single `sled::Tree`, so every
//! mutation -- including `apply_server_changes`'s atomic append-and-replace -- is a single
//! `Tree::insert`, which sled guarantees is crash-atomic on its own (no multi-key transaction
//! needed, following the single-blob-per-key pattern the pack's other sled users store
//! transactions under).

use change_model::{Change, SyncError, TimedOp};
use lww_engine::resolve_lww_set;
use patch_algebra::apply::apply_one;
use patch_algebra::apply;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smartstring::alias::String as SmartString;

use crate::lww_store::LwwClientStore;
use crate::ot_store::OtClientStore;
use crate::types::{DocIndexEntry, LwwStoredDoc, StoredDoc};

fn io_err(e: sled::Error) -> SyncError {
 SyncError::Io(e.to_string())
}

fn ser_err(e: serde_json::Error) -> SyncError {
 SyncError::Io(e.to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OtDocRecord {
 snapshot_state: Value,
 snapshot_rev: u64,
 committed_tail: Vec<Change>,
 pending: Vec<Change>,
 deleted: bool,
}

impl OtDocRecord {
 fn new(state: Value) -> Self {
 OtDocRecord { snapshot_state: state, snapshot_rev: 0, committed_tail: Vec::new(), pending: Vec::new(), deleted: false }
 }

 fn committed_rev(&self) -> u64 {
 self.committed_tail.last().map(|c| c.rev).unwrap_or(self.snapshot_rev)
 }

 fn reconstruct_state(&self) -> Result<Value, SyncError> {
 let mut state = self.snapshot_state.clone();
 for change in self.committed_tail.iter().chain(self.pending.iter()) {
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

/// Opens (or creates) a sled database at `path` and exposes a single "docs" tree for the OT
/// variant of the client store.
pub struct SledOtStore {
 tree: sled::Tree,
 snapshot_interval: usize,
}

impl SledOtStore {
 pub fn open(path: impl AsRef<std::path::Path>, snapshot_interval: usize) -> Result<Self, SyncError> {
 let db = sled::open(path).map_err(io_err)?;
 let tree = db.open_tree("ot_docs").map_err(io_err)?;
 Ok(SledOtStore { tree, snapshot_interval })
 }

 fn read(&self, id: &str) -> Result<Option<OtDocRecord>, SyncError> {
 match self.tree.get(id.as_bytes()).map_err(io_err)? {
 Some(bytes) => Ok(Some(serde_json::from_slice(&bytes).map_err(ser_err)?)),
 None => Ok(None),
 }
 }

 fn write(&self, id: &str, record: &OtDocRecord) -> Result<(), SyncError> {
 let bytes = serde_json::to_vec(record).map_err(ser_err)?;
 self.tree.insert(id.as_bytes(), bytes).map_err(io_err)?;
 Ok(())
 }
}

impl OtClientStore for SledOtStore {
 fn track_docs(&mut self, ids: &[SmartString]) -> Result<(), SyncError> {
 for id in ids {
 let mut record = self.read(id)?.unwrap_or_else(|| OtDocRecord::new(Value::Null));
 record.deleted = false;
 self.write(id, &record)?;
 }
 Ok(())
 }

 fn untrack_docs(&mut self, ids: &[SmartString]) -> Result<(), SyncError> {
 for id in ids {
 self.tree.remove(id.as_bytes()).map_err(io_err)?;
 }
 Ok(())
 }

 fn list_docs(&self, include_deleted: bool) -> Result<Vec<DocIndexEntry>, SyncError> {
 let mut out = Vec::new();
 for item in self.tree.iter() {
 let (key, value) = item.map_err(io_err)?;
 let record: OtDocRecord = serde_json::from_slice(&value).map_err(ser_err)?;
 if include_deleted || !record.deleted {
 let id: SmartString = String::from_utf8_lossy(&key).into_owned().into();
 out.push(DocIndexEntry { id, committed_rev: record.committed_rev(), deleted: record.deleted });
 }
 }
 Ok(out)
 }

 fn get_doc(&self, id: &str) -> Result<Option<StoredDoc>, SyncError> {
 let Some(record) = self.read(id)? else { return Ok(None) };
 if record.deleted {
 return Ok(None);
 }
 Ok(Some(StoredDoc { state: record.reconstruct_state()?, rev: record.committed_rev(), pending: record.pending.clone() }))
 }

 fn save_pending_changes(&mut self, id: &str, changes: &[Change]) -> Result<(), SyncError> {
 let mut record = self.read(id)?.unwrap_or_else(|| OtDocRecord::new(Value::Null));
 record.deleted = false;
 record.pending.extend_from_slice(changes);
 self.write(id, &record)
 }

 fn get_pending_changes(&self, id: &str) -> Result<Vec<Change>, SyncError> {
 Ok(self.read(id)?.map(|r| r.pending).unwrap_or_default())
 }

 fn apply_server_changes(&mut self, id: &str, server_changes: &[Change], rebased_pending: &[Change]) -> Result<(), SyncError> {
 let mut record = self.read(id)?.ok_or_else(|| SyncError::Storage(format!("doc {id} not tracked")))?;
 record.committed_tail.extend_from_slice(server_changes);
 record.pending = rebased_pending.to_vec();
 record.compact_if_due(self.snapshot_interval)?;
 self.write(id, &record)
 }

 fn delete_doc(&mut self, id: &str) -> Result<(), SyncError> {
 if let Some(mut record) = self.read(id)? {
 record.deleted = true;
 record.committed_tail.clear();
 record.pending.clear();
 record.snapshot_state = Value::Null;
 self.write(id, &record)?;
 }
 Ok(())
 }

 fn confirm_delete_doc(&mut self, id: &str) -> Result<(), SyncError> {
 self.tree.remove(id.as_bytes()).map_err(io_err)?;
 Ok(())
 }

 fn close(&mut self) -> Result<(), SyncError> {
 self.tree.flush().map_err(io_err)?;
 Ok(())
 }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
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

pub struct SledLwwStore {
 tree: sled::Tree,
}

impl SledLwwStore {
 pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, SyncError> {
 let db = sled::open(path).map_err(io_err)?;
 let tree = db.open_tree("lww_docs").map_err(io_err)?;
 Ok(SledLwwStore { tree })
 }

 fn read(&self, id: &str) -> Result<Option<LwwDocRecord>, SyncError> {
 match self.tree.get(id.as_bytes()).map_err(io_err)? {
 Some(bytes) => Ok(Some(serde_json::from_slice(&bytes).map_err(ser_err)?)),
 None => Ok(None),
 }
 }

 fn write(&self, id: &str, record: &LwwDocRecord) -> Result<(), SyncError> {
 let bytes = serde_json::to_vec(record).map_err(ser_err)?;
 self.tree.insert(id.as_bytes(), bytes).map_err(io_err)?;
 Ok(())
 }
}

impl LwwClientStore for SledLwwStore {
 fn track_docs(&mut self, ids: &[SmartString]) -> Result<(), SyncError> {
 for id in ids {
 let mut record = self.read(id)?.unwrap_or_else(|| LwwDocRecord::new(Value::Null));
 record.deleted = false;
 self.write(id, &record)?;
 }
 Ok(())
 }

 fn untrack_docs(&mut self, ids: &[SmartString]) -> Result<(), SyncError> {
 for id in ids {
 self.tree.remove(id.as_bytes()).map_err(io_err)?;
 }
 Ok(())
 }

 fn list_docs(&self, include_deleted: bool) -> Result<Vec<DocIndexEntry>, SyncError> {
 let mut out = Vec::new();
 for item in self.tree.iter() {
 let (key, value) = item.map_err(io_err)?;
 let record: LwwDocRecord = serde_json::from_slice(&value).map_err(ser_err)?;
 if include_deleted || !record.deleted {
 let id: SmartString = String::from_utf8_lossy(&key).into_owned().into();
 out.push(DocIndexEntry { id, committed_rev: record.committed_rev(), deleted: record.deleted });
 }
 }
 Ok(out)
 }

 fn get_doc(&self, id: &str) -> Result<Option<LwwStoredDoc>, SyncError> {
 let Some(record) = self.read(id)? else { return Ok(None) };
 if record.deleted {
 return Ok(None);
 }
 Ok(Some(LwwStoredDoc { state: record.reconstruct_state(), rev: record.committed_rev() }))
 }

 fn get_pending_ops(&self, id: &str, path_prefixes: Option<&[SmartString]>) -> Result<Vec<TimedOp>, SyncError> {
 let Some(record) = self.read(id)? else { return Ok(Vec::new()) };
 Ok(record
.pending
.into_iter()
.filter(|op| path_prefixes.map_or(true, |prefixes| prefixes.iter().any(|p| patch_algebra::path::is_at_or_under(op.path(), p))))
.collect())
 }

 fn save_pending_ops(&mut self, id: &str, ops_to_save: &[TimedOp], paths_to_delete: &[SmartString]) -> Result<(), SyncError> {
 let mut record = self.read(id)?.unwrap_or_else(|| LwwDocRecord::new(Value::Null));
 record.deleted = false;
 record.pending.retain(|op| !paths_to_delete.iter().any(|p| patch_algebra::path::is_at_or_under(op.path(), p)));
 record.pending.extend_from_slice(ops_to_save);
 self.write(id, &record)
 }

 fn get_sending_change(&self, id: &str) -> Result<Vec<TimedOp>, SyncError> {
 Ok(self.read(id)?.map(|r| r.sending).unwrap_or_default())
 }

 fn save_sending_change(&mut self, id: &str) -> Result<Vec<TimedOp>, SyncError> {
 let mut record = self.read(id)?.ok_or_else(|| SyncError::Storage(format!("doc {id} not tracked")))?;
 record.sending = std::mem::take(&mut record.pending);
 let sent = record.sending.clone();
 self.write(id, &record)?;
 Ok(sent)
 }

 fn confirm_sending_change(&mut self, id: &str) -> Result<(), SyncError> {
 if let Some(mut record) = self.read(id)? {
 record.sending.clear();
 self.write(id, &record)?;
 }
 Ok(())
 }

 fn apply_server_changes(&mut self, id: &str, server_ops: &[TimedOp]) -> Result<(), SyncError> {
 let mut record = self.read(id)?.ok_or_else(|| SyncError::Storage(format!("doc {id} not tracked")))?;
 record.committed_ops = resolve_lww_set(
 record.committed_ops.iter().cloned().map(|o| (o, false))
.chain(server_ops.iter().cloned().map(|o| (o, false))),
 );
 self.write(id, &record)
 }

 fn delete_doc(&mut self, id: &str) -> Result<(), SyncError> {
 if let Some(mut record) = self.read(id)? {
 record.deleted = true;
 record.committed_ops.clear();
 record.pending.clear();
 record.sending.clear();
 record.base_state = Value::Null;
 self.write(id, &record)?;
 }
 Ok(())
 }

 fn confirm_delete_doc(&mut self, id: &str) -> Result<(), SyncError> {
 self.tree.remove(id.as_bytes()).map_err(io_err)?;
 Ok(())
 }

 fn close(&mut self) -> Result<(), SyncError> {
 self.tree.flush().map_err(io_err)?;
 Ok(())
 }
}

#[cfg(test)]
mod test {
 use super::*;
 use patch_algebra::Op;
 use serde_json::json;

 fn temp_path(name: &str) -> std::path::PathBuf {
 std::env::temp_dir().join(format!("syncdoc-client-store-test-{name}-{}", std::process::id()))
 }

 #[test]
 fn ot_store_round_trips_through_disk() {
 let path = temp_path("ot");
 let mut store = SledOtStore::open(&path, 200).unwrap();
 store.track_docs(&["a".into()]).unwrap();
 store
.save_pending_changes(
 "a",
 &[Change { id: "c1".into(), rev: 1, base_rev: 0, ops: vec![Op::add("/x", json!(1))], created_at: 0, committed_at: 0, metadata: None, batch_id: None }],
 )
.unwrap();

 let doc = store.get_doc("a").unwrap().unwrap();
 assert_eq!(doc.state, json!({"x": 1}));
 store.close().unwrap();
 let _ = std::fs::remove_dir_all(&path);
 }

 #[test]
 fn lww_store_round_trips_through_disk() {
 let path = temp_path("lww");
 let mut store = SledLwwStore::open(&path).unwrap();
 store.track_docs(&["a".into()]).unwrap();
 store
.save_pending_ops("a", &[TimedOp { op: Op::add("/title", json!("hi")), ts: 1, rev: None }], &[])
.unwrap();

 assert_eq!(store.get_doc("a").unwrap().unwrap().state, json!({"title": "hi"}));
 store.close().unwrap();
 let _ = std::fs::remove_dir_all(&path);
 }
}
