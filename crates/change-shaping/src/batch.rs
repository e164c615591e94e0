//! `breakIntoBatches`: pack changes into groups under a byte budget, first running
//! any oversize individual change through [`crate::shape::break_change`].

use change_model::Change;
use smartstring::alias::String as SmartString;

use crate::shape::break_change;

fn fresh_batch_id(seed: &str, index: usize) -> SmartString {
 format!("batch-{seed}-{index}").into()
}

pub fn break_into_batches(changes: &[Change], max_bytes: Option<usize>, max_payload_bytes: usize) -> Vec<Vec<Change>> {
 let max_bytes = max_bytes.unwrap_or(max_payload_bytes);

 let mut shaped: Vec<Change> = Vec::new();
 for change in changes {
 shaped.extend(break_change(change, max_bytes));
 }

 let mut batches: Vec<Vec<Change>> = Vec::new();
 let mut current: Vec<Change> = Vec::new();
 let mut current_bytes = 0usize;

 for change in shaped {
 let size = change.byte_size();
 if !current.is_empty() && current_bytes + size > max_bytes {
 batches.push(std::mem::take(&mut current));
 current_bytes = 0;
 }
 current_bytes += size;
 current.push(change);
 }
 if !current.is_empty() {
 batches.push(current);
 }

 // changes sharing a batch get a common batchId; a singleton batch needs none.
 for (i, batch) in batches.iter_mut().enumerate() {
 if batch.len() > 1 {
 let seed = batch[0].id.to_string();
 let id = fresh_batch_id(&seed, i);
 for c in batch.iter_mut() {
 c.batch_id = Some(id.clone());
 }
 }
 }

 batches
}

#[cfg(test)]
mod test {
 use super::*;
 use patch_algebra::Op;
 use serde_json::json;

 fn small_change(id: &str, rev: u64) -> Change {
 Change { id: id.into(), rev, base_rev: 0, ops: vec![Op::replace("/a", json!(rev))], created_at: 0, committed_at: 0, metadata: None, batch_id: None }
 }

 #[test]
 fn packs_small_changes_into_one_batch() {
 let changes: Vec<Change> = (1..=5).map(|i| small_change("c", i)).collect();
 let batches = break_into_batches(&changes, None, 1_000_000);
 assert_eq!(batches.len(), 1);
 assert_eq!(batches[0].len(), 5);
 assert!(batches[0].iter().all(|c| c.batch_id.is_some()));
 }

 #[test]
 fn splits_across_batches_when_over_budget() {
 let changes: Vec<Change> = (1..=5).map(|i| small_change("c", i)).collect();
 let one_change_bytes = changes[0].byte_size();
 let batches = break_into_batches(&changes, Some(one_change_bytes + 1), 1_000_000);
 assert!(batches.len() > 1);
 }
}
