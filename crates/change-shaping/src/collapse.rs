//! `collapsePendingChanges`: elide redundant single-op primitive replaces on the same
//! path, without disturbing structural ops (add/remove/move) that may have shifted what a path
//! even refers to.

use std::collections::HashMap;

use change_model::Change;
use patch_algebra::{path, Op};
use smartstring::alias::String as SmartString;

pub fn collapse_pending_changes(changes: &[Change], after_rev: Option<u64>) -> Vec<Change> {
 let after_rev = after_rev.unwrap_or(0);
 let mut out: Vec<Option<Change>> = Vec::with_capacity(changes.len());
 let mut tracked: HashMap<SmartString, usize> = HashMap::new();

 for change in changes {
 invalidate_structural(&change.ops, &mut tracked, &mut out);

 let skip = change.rev <= after_rev;
 if !skip {
 if let [op] = change.ops.as_slice() {
 if op.is_primitive_replace() {
 let path: SmartString = op.path().into();
 if let Some(&old_idx) = tracked.get(&path) {
 out[old_idx] = None;
 }
 tracked.insert(path, out.len());
 out.push(Some(change.clone()));
 continue;
 }
 }
 }
 out.push(Some(change.clone()));
 }

 out.into_iter().flatten().collect()
}

fn invalidate_structural(ops: &[Op], tracked: &mut HashMap<SmartString, usize>, out: &mut [Option<Change>]) {
 for op in ops {
 match op {
 Op::Remove { path } => evict_subtree(path, tracked, out),
 Op::Move { from, path } => {
 evict_subtree(path, tracked, out);
 evict_subtree(from, tracked, out);
 }
 _ => {}
 }
 // add/remove of an array element can shift every sibling's index, so any tracked path
 // under that same array is no longer trustworthy.
 let touched_path = match op {
 Op::Add { path,.. } | Op::Remove { path } => Some(path.as_str()),
 _ => None,
 };
 if let Some(p) = touched_path {
 if let Some(arr) = path::array_parent(p) {
 evict_subtree(&arr, tracked, out);
 }
 }
 }
}

fn evict_subtree(root: &str, tracked: &mut HashMap<SmartString, usize>, out: &mut [Option<Change>]) {
 tracked.retain(|tracked_path, &mut idx| {
 if path::is_at_or_under(tracked_path, root) {
 out[idx] = None;
 false
 } else {
 true
 }
 });
}

#[cfg(test)]
mod test {
 use super::*;
 use serde_json::json;

 fn replace_change(id: &str, rev: u64, path: &str, value: serde_json::Value) -> Change {
 Change {
 id: id.into(),
 rev,
 base_rev: 0,
 ops: vec![Op::replace(path, value)],
 created_at: 0,
 committed_at: 0,
 metadata: None,
 batch_id: None,
 }
 }

 #[test]
 fn scenario_a_collapses_100_toggles_to_one() {
 let mut changes = Vec::new();
 for i in 0..100u64 {
 changes.push(replace_change("c", i + 1, "/opened", json!(i % 2 == 1)));
 }
 let collapsed = collapse_pending_changes(&changes, None);
 assert_eq!(collapsed.len(), 1);
 assert_eq!(collapsed[0].ops[0], Op::replace("/opened", json!(true)));
 }

 #[test]
 fn changes_at_or_before_bookmark_are_left_alone() {
 let changes = vec![
 replace_change("a", 1, "/x", json!(1)),
 replace_change("b", 2, "/x", json!(2)),
 ];
 let collapsed = collapse_pending_changes(&changes, Some(1));
 assert_eq!(collapsed.len(), 2);
 }

 #[test]
 fn remove_evicts_tracked_descendant() {
 let changes = vec![
 replace_change("a", 1, "/obj/field", json!(1)),
 Change {
 id: "b".into(), rev: 2, base_rev: 0,
 ops: vec![Op::remove("/obj")], created_at: 0, committed_at: 0,
 metadata: None, batch_id: None,
 },
 replace_change("c", 3, "/obj/field", json!(2)),
 ];
 let collapsed = collapse_pending_changes(&changes, None);
 // the remove and the final replace both survive; the first replace was evicted by remove,
 // not collapsed into the third (they're no longer the same tracked slot).
 assert_eq!(collapsed.len(), 2);
 }

 #[test]
 fn non_primitive_replace_does_not_collapse() {
 let changes = vec![
 replace_change("a", 1, "/obj", json!({"x": 1})),
 replace_change("b", 2, "/obj", json!({"x": 2})),
 ];
 let collapsed = collapse_pending_changes(&changes, None);
 assert_eq!(collapsed.len(), 2);
 }
}
