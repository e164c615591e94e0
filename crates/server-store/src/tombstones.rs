//! Tombstones by `docId`: prevents accidental recreation of a deleted document.

use std::collections::HashMap;

use change_model::Tombstone;
use smartstring::alias::String as SmartString;

pub trait TombstoneStore {
 fn get(&self, doc_id: &str) -> Option<Tombstone>;
 fn set(&mut self, tombstone: Tombstone);
 fn clear(&mut self, doc_id: &str);
}

#[derive(Default)]
pub struct InMemoryTombstoneStore {
 tombstones: HashMap<SmartString, Tombstone>,
}

impl InMemoryTombstoneStore {
 pub fn new() -> Self {
 Self::default()
 }
}

impl TombstoneStore for InMemoryTombstoneStore {
 fn get(&self, doc_id: &str) -> Option<Tombstone> {
 self.tombstones.get(doc_id).cloned()
 }

 fn set(&mut self, tombstone: Tombstone) {
 self.tombstones.insert(tombstone.doc_id.clone(), tombstone);
 }

 fn clear(&mut self, doc_id: &str) {
 self.tombstones.remove(doc_id);
 }
}

#[cfg(test)]
mod test {
 use super::*;

 #[test]
 fn set_then_get_round_trips() {
 let mut store = InMemoryTombstoneStore::new();
 store.set(Tombstone { doc_id: "d1".into(), deleted_at_rev: 5, deleted_by: Some("alice".into()) });
 assert_eq!(store.get("d1").unwrap().deleted_at_rev, 5);
 }

 #[test]
 fn undelete_clears_the_tombstone() {
 let mut store = InMemoryTombstoneStore::new();
 store.set(Tombstone { doc_id: "d1".into(), deleted_at_rev: 5, deleted_by: None });
 store.clear("d1");
 assert!(store.get("d1").is_none());
 }
}
