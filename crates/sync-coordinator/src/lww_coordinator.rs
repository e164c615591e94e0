//! The LWW half of the sync coordinator: connects a `LwwClientStore` to one `LwwDoc` per tracked
//! document. No batch-splitting here -- field ops are independent of each other, so there is
//! nothing analogous to `breakChange` to apply (spec §4.2 only names OT as needing it).

use std::collections::HashMap;

use change_model::{SyncError, TimedOp};
use change_shaping::ChangeBuilder;
use client_store::LwwClientStore;
use doc_state::{LwwDoc, SyncingState};
use smartstring::alias::String as SmartString;

use crate::handle::{DocHandle, Entry};

pub struct LwwCoordinator<S: LwwClientStore> {
 store: S,
 entries: HashMap<SmartString, Entry<LwwDoc>>,
 next_generation: u64,
}

impl<S: LwwClientStore> LwwCoordinator<S> {
 pub fn new(store: S) -> Self {
 LwwCoordinator { store, entries: HashMap::new(), next_generation: 0 }
 }

 pub fn open(&mut self, id: &str) -> Result<DocHandle, SyncError> {
 if let Some(entry) = self.entries.get_mut(id) {
 entry.refcount += 1;
 return Ok(DocHandle { id: id.into(), generation: entry.generation });
 }

 self.store.track_docs(std::slice::from_ref(&SmartString::from(id)))?;
 let stored = self.store.get_doc(id)?;
 let (state, rev) = match stored {
 Some(doc) if !doc.state.is_null() => (doc.state, doc.rev),
 Some(doc) => (serde_json::Value::Object(Default::default()), doc.rev),
 None => (serde_json::Value::Object(Default::default()), 0),
 };
 let mut doc = LwwDoc::new(id, state, rev);

 let pending = self.store.get_pending_ops(id, None)?;
 let sending = self.store.get_sending_change(id)?;
 if !pending.is_empty() || !sending.is_empty() {
 let paths: Vec<SmartString> = Vec::new();
 let mut all = sending;
 all.extend(pending);
 doc.apply_local_ops(all, &paths);
 }

 let generation = self.next_generation;
 self.next_generation += 1;
 self.entries.insert(id.into(), Entry { doc, refcount: 1, generation });
 Ok(DocHandle { id: id.into(), generation })
 }

 pub fn close(&mut self, handle: &DocHandle) {
 let Some(entry) = self.entries.get_mut(handle.id.as_str()) else { return };
 if entry.generation != handle.generation {
 return;
 }
 entry.refcount = entry.refcount.saturating_sub(1);
 if entry.refcount == 0 {
 self.entries.remove(handle.id.as_str());
 }
 }

 fn live_entry(&mut self, handle: &DocHandle) -> Result<&mut Entry<LwwDoc>, SyncError> {
 let entry = self
.entries
.get_mut(handle.id.as_str())
.ok_or_else(|| SyncError::Validation(format!("doc {} is not open", handle.id)))?;
 if entry.generation != handle.generation {
 return Err(SyncError::Validation(format!("stale handle for doc {}", handle.id)));
 }
 Ok(entry)
 }

 pub fn state(&self, handle: &DocHandle) -> Option<&serde_json::Value> {
 self.entries.get(handle.id.as_str()).filter(|e| e.generation == handle.generation).map(|e| e.doc.state())
 }

 /// `change(mutator)`: stamp every captured op with `now`, fold it into the doc's
 /// live pending set, and persist it -- each op wins or loses independently, so there is no
 /// batching concern to resolve here.
 pub fn change(
 &mut self,
 handle: &DocHandle,
 now: i64,
 mutator: impl FnOnce(&mut ChangeBuilder),
 ) -> Result<Vec<TimedOp>, SyncError> {
 let entry = self.live_entry(handle)?;
 let ops = entry.doc.change(mutator);
 if ops.is_empty() {
 return Ok(Vec::new());
 }

 let timed: Vec<TimedOp> = ops.into_iter().map(|op| TimedOp { op, ts: now, rev: None }).collect();
 let paths: Vec<SmartString> = timed.iter().map(|t| t.path().into()).collect();

 entry.doc.apply_local_ops(timed.clone(), &paths);
 self.store.save_pending_ops(handle.id.as_str(), &timed, &paths)?;
 Ok(timed)
 }

 /// Atomically hand the whole pending queue to a caller about to send it over the wire (spec
 /// §4.6). The doc itself still carries these as pending until the server confirms them.
 pub fn begin_sending(&mut self, handle: &DocHandle) -> Result<Vec<TimedOp>, SyncError> {
 self.live_entry(handle)?;
 self.store.save_sending_change(handle.id.as_str())
 }

 pub fn confirm_sent(&mut self, handle: &DocHandle) -> Result<(), SyncError> {
 self.live_entry(handle)?;
 self.store.confirm_sending_change(handle.id.as_str())
 }

 /// Fold a server broadcast into both the live doc and the store: resolution
 /// is purely per-path timestamp comparison, so there is no rebase step the way OT needs one.
 pub fn receive_server_changes(&mut self, handle: &DocHandle, server_ops: &[TimedOp]) -> Result<(), SyncError> {
 let entry = self.live_entry(handle)?;
 entry.doc.set_syncing(SyncingState::Syncing);

 let result = self.store.apply_server_changes(handle.id.as_str(), server_ops);
 let entry = self.live_entry(handle)?;
 match &result {
 Ok(()) => {
 entry.doc.apply_server_changes(server_ops);
 entry.doc.set_syncing(SyncingState::Idle);
 }
 Err(e) => entry.doc.set_syncing(SyncingState::Error(e.clone())),
 }
 result
 }

 pub fn import(&mut self, handle: &DocHandle, state: serde_json::Value, rev: u64) -> Result<(), SyncError> {
 let entry = self.live_entry(handle)?;
 entry.doc.import(state, rev);
 Ok(())
 }
}

#[cfg(test)]
mod test {
 use super::*;
 use client_store::InMemoryLwwStore;
 use patch_algebra::Op;
 use serde_json::json;

 fn coordinator() -> LwwCoordinator<InMemoryLwwStore> {
 LwwCoordinator::new(InMemoryLwwStore::new())
 }

 #[test]
 fn open_then_change_persists_pending_ops_through_the_store() {
 let mut coord = coordinator();
 let handle = coord.open("d1").unwrap();
 let ops = coord.change(&handle, 10, |b| { b.replace("/title", json!("hi")); }).unwrap();
 assert_eq!(ops.len(), 1);
 assert_eq!(coord.state(&handle), Some(&json!({"title": "hi"})));

 let pending = coord.store.get_pending_ops("d1", None).unwrap();
 assert_eq!(pending.len(), 1);
 }

 #[test]
 fn begin_sending_moves_pending_without_disturbing_live_state() {
 let mut coord = coordinator();
 let handle = coord.open("d1").unwrap();
 coord.change(&handle, 10, |b| { b.replace("/title", json!("hi")); }).unwrap();

 let sent = coord.begin_sending(&handle).unwrap();
 assert_eq!(sent.len(), 1);
 assert!(coord.store.get_pending_ops("d1", None).unwrap().is_empty());
 assert_eq!(coord.state(&handle), Some(&json!({"title": "hi"})));
 }

 #[test]
 fn receive_server_changes_confirms_matching_pending_everywhere() {
 let mut coord = coordinator();
 let handle = coord.open("d1").unwrap();
 coord.change(&handle, 10, |b| { b.replace("/title", json!("mine")); }).unwrap();

 let confirmed = TimedOp { op: Op::replace("/title", json!("mine")), ts: 10, rev: Some(1) };
 coord.receive_server_changes(&handle, std::slice::from_ref(&confirmed)).unwrap();

 assert_eq!(coord.state(&handle), Some(&json!({"title": "mine"})));
 assert!(coord.store.get_pending_ops("d1", None).unwrap().is_empty());
 }

 #[test]
 fn close_all_references_tears_down_the_entry() {
 let mut coord = coordinator();
 let h1 = coord.open("d1").unwrap();
 let h2 = coord.open("d1").unwrap();
 coord.close(&h1);
 assert!(coord.entries.contains_key("d1"));
 coord.close(&h2);
 assert!(!coord.entries.contains_key("d1"));
 }
}
