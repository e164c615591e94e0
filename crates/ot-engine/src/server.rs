//! Server half of the OT engine: the `commitChanges` pipeline and the
//! snapshot/state reconstruction helpers it and `ServerStore` both need.
//!
//! These are pure functions over explicitly-passed state rather than methods on a store trait --
//! `server-store` wraps this with actual persistence, so the transform/commit logic stays testable
//! without any storage I/O.

use std::collections::HashSet;

use change_model::{Change, SyncConfig, SyncError, VersionMetadata, VersionOrigin};
use patch_algebra::{apply, Op};
use serde_json::Value;
use smartstring::alias::String as SmartString;

use crate::client::transform_incoming_ops;

pub struct CommitRequest<'a> {
 pub current_rev: u64,
 /// The batch to commit; every change must share the same `base_rev`.
 pub incoming: Vec<Change>,
 /// Committed state as of `base_rev`.
 pub state_at_base_rev: &'a Value,
 /// Already-committed changes with `rev > base_rev` (the "catchup history").
 pub committed_since_base: &'a [Change],
 /// Ids already present in `committed_since_base`, for idempotent-retry detection.
 pub existing_ids: &'a HashSet<SmartString>,
 pub last_committed_at: i64,
 pub now: i64,
 pub config: &'a SyncConfig,
 /// Keep changes whose transformed ops are a structural no-op (spec §4.3 step 6 exception).
 pub force_commit: bool,
 /// True if this document already existed before the submitting client ever saw it -- see
 /// `validate_batch`. Defaults to `false` for a client creating a brand new document.
 pub doc_predates_session: bool,
}

pub struct CommitResponse {
 /// Changes the caller hadn't seen yet (the history after `base_rev`); always returned, even
 /// when the whole incoming batch turns out to be a duplicate retry.
 pub catchup_changes: Vec<Change>,
 pub committed_changes: Vec<Change>,
 /// Offline-session versions to persist (spec §4.3 step 5), empty unless an offline gap fired.
 pub offline_versions: Vec<(VersionMetadata, Value)>,
 /// True if the caller should snapshot `state_at_base_rev` as a new main version before
 /// persisting anything else (the prior commit predates the session timeout).
 pub needs_main_snapshot: bool,
}

/// `doc_predates_session`: true if the store already had this document before the client ever
/// observed it (distinct from `current_rev`, which a sibling batch committed moments earlier can
/// bump mid-session) -- catches a client that assumes it's creating a brand new document when one
/// already exists, without misfiring on ordinary concurrent commits that both started at rev 0.
fn validate_batch(incoming: &[Change], current_rev: u64, doc_predates_session: bool) -> Result<u64, SyncError> {
 let first = incoming.first().ok_or_else(|| SyncError::Validation("empty batch".into()))?;
 let base_rev = first.base_rev;
 if incoming.iter().any(|c| c.base_rev != base_rev) {
 return Err(SyncError::Validation("batch changes do not share a baseRev".into()));
 }
 if base_rev > current_rev {
 return Err(SyncError::StaleBase { base_rev, server_rev: current_rev });
 }
 if base_rev == 0 && doc_predates_session {
 return Err(SyncError::StaleBase { base_rev, server_rev: current_rev });
 }
 Ok(base_rev)
}

fn clamp_created_at(changes: &[Change], now: i64) -> Vec<Change> {
 changes
.iter()
.map(|c| {
 let mut c = c.clone();
 c.created_at = c.created_at.min(now);
 c
 })
.collect()
}

fn is_offline_batch(changes: &[Change], now: i64, session_timeout_millis: i64) -> bool {
 changes.first().map_or(false, |c| c.created_at < now - session_timeout_millis)
}

fn group_into_sessions(changes: &[Change], session_timeout_millis: i64) -> Vec<Vec<Change>> {
 let mut sessions: Vec<Vec<Change>> = Vec::new();
 for change in changes {
 let starts_new_session = match sessions.last().and_then(|s| s.last()) {
 Some(prev) => change.created_at - prev.created_at > session_timeout_millis,
 None => true,
 };
 if starts_new_session {
 sessions.push(vec![change.clone()]);
 } else {
 sessions.last_mut().unwrap().push(change.clone());
 }
 }
 sessions
}

/// Build one `offline`-origin version per detected session (chained by `parent_id`, sharing a
/// `group_id`), then collapse every session's ops into a single change for the transform step.
fn build_offline_versions(
 sessions: &[Vec<Change>],
 state_at_base_rev: &Value,
 base_rev: u64,
 now: i64,
) -> Result<(Vec<(VersionMetadata, Value)>, Change), SyncError> {
 let group_id: SmartString = format!("offline-{base_rev}-{now}").into();
 let mut versions = Vec::new();
 let mut state = state_at_base_rev.clone();
 let mut parent_id: Option<SmartString> = None;
 let mut rev_cursor = base_rev;
 let mut all_ops = Vec::new();

 for (i, session) in sessions.iter().enumerate() {
 let start_rev = rev_cursor;
 let session_ops: Vec<Op> = session.iter().flat_map(|c| c.ops.iter().cloned()).collect();
 state = apply(&state, &session_ops, true)?;
 rev_cursor += session_ops.len() as u64;

 let version_id: SmartString = format!("{group_id}-{i}").into();
 let version = VersionMetadata {
 id: version_id.clone(),
 parent_id: parent_id.clone(),
 group_id: Some(group_id.clone()),
 origin: VersionOrigin::Offline,
 started_at: session.first().map(|c| c.created_at).unwrap_or(now),
 ended_at: session.last().map(|c| c.created_at).unwrap_or(now),
 start_rev,
 end_rev: rev_cursor,
 base_rev,
 name: None,
 branch_name: None,
 };
 versions.push((version, state.clone()));
 parent_id = Some(version_id);
 all_ops.extend(session_ops);
 }

 let first_change = sessions
.iter()
.flatten()
.next()
.cloned()
.ok_or_else(|| SyncError::Validation("offline batch had no changes".into()))?;
 let collapsed = Change {
 id: first_change.id,
 rev: 0,
 base_rev,
 ops: all_ops,
 created_at: first_change.created_at,
 committed_at: 0,
 metadata: None,
 batch_id: None,
 };

 Ok((versions, collapsed))
}

/// Transform each change against everything committed ahead of it (the pre-existing
/// committed-since-base ops, then each prior change in this batch as it's processed), applying as
/// it goes. Drops a change whose transformed ops are a structural no-op unless `force_commit`.
fn transform_and_commit(
 to_transform: &[Change],
 committed_since_base: &[Change],
 state_at_base_rev: &Value,
 current_rev: u64,
 now: i64,
 force_commit: bool,
) -> Result<Vec<Change>, SyncError> {
 let mut ops_so_far: Vec<Op> = committed_since_base.iter().flat_map(|c| c.ops.iter().cloned()).collect();
 let mut evolving_state = state_at_base_rev.clone();
 let mut committed = Vec::new();
 let mut next_rev = current_rev;

 for change in to_transform {
 let transformed = transform_incoming_ops(&change.ops, &ops_so_far, false);
 let new_state = apply(&evolving_state, &transformed, true)?;
 let is_noop = new_state == evolving_state;
 if is_noop && !force_commit {
 continue;
 }
 next_rev += 1;
 committed.push(Change {
 id: change.id.clone(),
 rev: next_rev,
 base_rev: change.base_rev,
 ops: transformed.clone(),
 created_at: change.created_at,
 committed_at: now,
 metadata: change.metadata.clone(),
 batch_id: change.batch_id.clone(),
 });
 evolving_state = new_state;
 ops_so_far.extend(transformed);
 }

 Ok(committed)
}

/// The `commitChanges` pipeline (spec §4.3 steps 1-7).
pub fn commit_changes(req: CommitRequest) -> Result<CommitResponse, SyncError> {
 let base_rev = validate_batch(&req.incoming, req.current_rev, req.doc_predates_session)?;
 let clamped = clamp_created_at(&req.incoming, req.now);
 let needs_main_snapshot =
 req.current_rev > 0 && req.now - req.last_committed_at > req.config.session_timeout_millis();

 let deduped: Vec<Change> = clamped.into_iter().filter(|c| !req.existing_ids.contains(c.id.as_str())).collect();
 if deduped.is_empty() {
 return Ok(CommitResponse {
 catchup_changes: req.committed_since_base.to_vec(),
 committed_changes: Vec::new(),
 offline_versions: Vec::new(),
 needs_main_snapshot,
 });
 }

 let (to_transform, offline_versions) =
 if is_offline_batch(&deduped, req.now, req.config.session_timeout_millis()) {
 let sessions = group_into_sessions(&deduped, req.config.session_timeout_millis());
 let (versions, collapsed) =
 build_offline_versions(&sessions, req.state_at_base_rev, base_rev, req.now)?;
 (vec![collapsed], versions)
 } else {
 (deduped, Vec::new())
 };

 let committed_changes = transform_and_commit(
 &to_transform,
 req.committed_since_base,
 req.state_at_base_rev,
 req.current_rev,
 req.now,
 req.force_commit,
 )?;

 Ok(CommitResponse {
 catchup_changes: req.committed_since_base.to_vec(),
 committed_changes,
 offline_versions,
 needs_main_snapshot,
 })
}

pub struct SnapshotAtRevision {
 pub state: Value,
 pub rev: u64,
 pub changes: Vec<Change>,
}

/// `getSnapshotAtRevision`: the latest main-origin version at or before `target_rev` (or the
/// latest overall if unset), plus the committed changes still needed to reach `target_rev`.
pub fn get_snapshot_at_revision(
 main_versions: &[(VersionMetadata, Value)],
 changes_after: &[Change],
 target_rev: Option<u64>,
) -> Option<SnapshotAtRevision> {
 let (version, state) = main_versions
.iter()
.filter(|(v, _)| target_rev.map_or(true, |r| v.end_rev <= r))
.max_by_key(|(v, _)| v.end_rev)?;

 let changes = changes_after
.iter()
.filter(|c| c.rev > version.end_rev && target_rev.map_or(true, |r| c.rev <= r))
.cloned()
.collect();

 Some(SnapshotAtRevision { state: state.clone(), rev: version.end_rev, changes })
}

/// `getStateAtRevision`: collapse `getSnapshotAtRevision`'s result into a single applied state.
pub fn get_state_at_revision(
 main_versions: &[(VersionMetadata, Value)],
 changes_after: &[Change],
 target_rev: Option<u64>,
) -> Result<Option<Value>, SyncError> {
 let Some(snapshot) = get_snapshot_at_revision(main_versions, changes_after, target_rev) else {
 return Ok(None);
 };
 let mut state = snapshot.state;
 for change in &snapshot.changes {
 state = apply(&state, &change.ops, true)?;
 }
 Ok(Some(state))
}

#[cfg(test)]
mod test {
 use super::*;
 use serde_json::json;

 fn change(id: &str, base_rev: u64, created_at: i64, ops: Vec<Op>) -> Change {
 Change { id: id.into(), rev: 0, base_rev, ops, created_at, committed_at: 0, metadata: None, batch_id: None }
 }

 #[test]
 fn scenario_b_concurrent_adds_both_land_in_order() {
 let state = json!({"items": []});
 let config = SyncConfig::default();
 let empty_ids = HashSet::new();

 let a = commit_changes(CommitRequest {
 current_rev: 0,
 incoming: vec![change("a", 0, 0, vec![Op::add("/items/0", json!("x"))])],
 state_at_base_rev: &state,
 committed_since_base: &[],
 existing_ids: &empty_ids,
 last_committed_at: 0,
 now: 0,
 config: &config,
 force_commit: false,
 doc_predates_session: false,
 })
.unwrap();
 assert_eq!(a.committed_changes.len(), 1);
 assert_eq!(a.committed_changes[0].rev, 1);

 let state_after_a = apply(&state, &a.committed_changes[0].ops, true).unwrap();
 assert_eq!(state_after_a, json!({"items": ["x"]}));

 let b = commit_changes(CommitRequest {
 current_rev: 1,
 incoming: vec![change("b", 0, 0, vec![Op::add("/items/0", json!("y"))])],
 state_at_base_rev: &state,
 committed_since_base: &a.committed_changes,
 existing_ids: &empty_ids,
 last_committed_at: 0,
 now: 0,
 config: &config,
 force_commit: false,
 doc_predates_session: false,
 })
.unwrap();
 assert_eq!(b.committed_changes.len(), 1);
 assert_eq!(b.committed_changes[0].rev, 2);
 assert_eq!(b.committed_changes[0].ops, vec![Op::add("/items/1", json!("y"))]);

 let final_state = apply(&state_after_a, &b.committed_changes[0].ops, true).unwrap();
 assert_eq!(final_state, json!({"items": ["x", "y"]}));
 }

 #[test]
 fn scenario_c_offline_batch_produces_two_sessions() {
 let state = json!({"a": 0});
 let config = SyncConfig::default();
 let empty_ids = HashSet::new();
 let session_timeout = config.session_timeout_millis();
 let now = 10_000_000i64;

 let incoming = vec![
 change("c1", 0, now - 2 * 3_600_000, vec![Op::replace("/a", json!(1))]),
 change("c2", 0, now - 2 * 3_600_000 + 5 * 60_000, vec![Op::replace("/a", json!(2))]),
 change("c3", 0, now - 25 * 60_000, vec![Op::replace("/a", json!(3))]),
 ];

 let result = commit_changes(CommitRequest {
 current_rev: 0,
 incoming,
 state_at_base_rev: &state,
 committed_since_base: &[],
 existing_ids: &empty_ids,
 last_committed_at: 0,
 now,
 config: &config,
 force_commit: false,
 doc_predates_session: false,
 })
.unwrap();

 assert_eq!(session_timeout, 30 * 60_000);
 assert_eq!(result.offline_versions.len(), 2);
 assert_eq!(result.offline_versions[0].0.start_rev, 0);
 assert_eq!(result.offline_versions[0].0.end_rev, 1);
 assert_eq!(result.offline_versions[1].0.end_rev, 2);
 assert_eq!(result.offline_versions[0].0.group_id, result.offline_versions[1].0.group_id);
 assert_eq!(result.offline_versions[1].0.parent_id.as_deref(), Some(result.offline_versions[0].0.id.as_str()));

 assert_eq!(result.committed_changes.len(), 1);
 assert_eq!(result.committed_changes[0].rev, 1);
 }

 #[test]
 fn idempotent_retry_of_whole_batch_drops_to_catchup() {
 let state = json!({"a": 0});
 let config = SyncConfig::default();
 let mut ids = HashSet::new();
 ids.insert(SmartString::from("dup"));
 let already = vec![change("dup", 0, 0, vec![Op::replace("/a", json!(1))])];

 let result = commit_changes(CommitRequest {
 current_rev: 1,
 incoming: vec![change("dup", 0, 0, vec![Op::replace("/a", json!(1))])],
 state_at_base_rev: &state,
 committed_since_base: &already,
 existing_ids: &ids,
 last_committed_at: 0,
 now: 0,
 config: &config,
 force_commit: false,
 doc_predates_session: false,
 })
.unwrap();

 assert!(result.committed_changes.is_empty());
 assert_eq!(result.catchup_changes, already);
 }

 #[test]
 fn rejects_stale_base_rev_ahead_of_server() {
 let state = json!({});
 let config = SyncConfig::default();
 let empty_ids = HashSet::new();
 let result = commit_changes(CommitRequest {
 current_rev: 1,
 incoming: vec![change("x", 5, 0, vec![])],
 state_at_base_rev: &state,
 committed_since_base: &[],
 existing_ids: &empty_ids,
 last_committed_at: 0,
 now: 0,
 config: &config,
 force_commit: false,
 doc_predates_session: false,
 });
 assert!(matches!(result, Err(SyncError::StaleBase {.. })));
 }

 #[test]
 fn no_op_transform_result_is_dropped_unless_forced() {
 let state = json!({"a": 1});
 let config = SyncConfig::default();
 let empty_ids = HashSet::new();
 let committed = vec![change("already", 0, 0, vec![Op::replace("/a", json!(1))])];

 let dropped = commit_changes(CommitRequest {
 current_rev: 1,
 incoming: vec![change("mine", 0, 0, vec![Op::replace("/a", json!(1))])],
 state_at_base_rev: &state,
 committed_since_base: &committed,
 existing_ids: &empty_ids,
 last_committed_at: 0,
 now: 0,
 config: &config,
 force_commit: false,
 doc_predates_session: false,
 })
.unwrap();
 assert!(dropped.committed_changes.is_empty());

 let forced = commit_changes(CommitRequest {
 current_rev: 1,
 incoming: vec![change("mine2", 0, 0, vec![Op::replace("/a", json!(1))])],
 state_at_base_rev: &state,
 committed_since_base: &committed,
 existing_ids: &empty_ids,
 last_committed_at: 0,
 now: 0,
 config: &config,
 force_commit: true,
 doc_predates_session: false,
 })
.unwrap();
 assert_eq!(forced.committed_changes.len(), 1);
 }

 #[test]
 fn snapshot_reconstruction_applies_tail_changes() {
 let v1 = (
 VersionMetadata {
 id: "v1".into(),
 parent_id: None,
 group_id: None,
 origin: VersionOrigin::Main,
 started_at: 0,
 ended_at: 0,
 start_rev: 0,
 end_rev: 10,
 base_rev: 0,
 name: None,
 branch_name: None,
 },
 json!({"a": 1}),
 );
 let tail = vec![Change {
 id: "t1".into(),
 rev: 11,
 base_rev: 10,
 ops: vec![Op::replace("/a", json!(2))],
 created_at: 0,
 committed_at: 0,
 metadata: None,
 batch_id: None,
 }];
 let state = get_state_at_revision(&[v1], &tail, Some(11)).unwrap().unwrap();
 assert_eq!(state, json!({"a": 2}));
 }
}
