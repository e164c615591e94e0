//! `createBranch`: fork `source_doc_id` into a brand new `branch_doc_id`, seeded with
//! the source's state. Rejects forking a document that is itself already a branch.

use change_model::{Branch, BranchStatus, SyncError};
use ot_engine::server::get_state_at_revision;
use serde_json::Value;
use server_store::{BranchStore, LwwServerLog, OtServerLog};
use smartstring::alias::String as SmartString;

fn reject_branch_of_branch(branch_store: &impl BranchStore, source_doc_id: &str) -> Result<(), SyncError> {
 if branch_store.get(source_doc_id).is_some() {
 return Err(SyncError::Validation(format!("{source_doc_id} is itself a branch; branching a branch is not supported")));
 }
 Ok(())
}

pub fn create_branch_ot(
 log: &mut impl OtServerLog,
 branch_store: &mut impl BranchStore,
 source_doc_id: &str,
 branch_doc_id: impl Into<SmartString>,
 at_rev: u64,
 metadata: Option<Value>,
) -> Result<Branch, SyncError> {
 reject_branch_of_branch(branch_store, source_doc_id)?;

 let state = get_state_at_revision(&log.main_versions(source_doc_id), &log.changes_since(source_doc_id, 0), Some(at_rev))?
.ok_or_else(|| SyncError::Validation(format!("no state for {source_doc_id} at rev {at_rev}")))?;

 let branch_doc_id: SmartString = branch_doc_id.into();
 log.create_doc(&branch_doc_id, state);

 let branch = Branch {
 id: branch_doc_id,
 doc_id: source_doc_id.into(),
 branched_at_rev: at_rev,
 status: BranchStatus::Open,
 name: None,
 metadata,
 };
 branch_store.save(branch.clone());
 Ok(branch)
}

/// LWW has no single document revision to fork at -- the branch always starts from the source's
/// current reconstructed state or current state for LWW.
pub fn create_branch_lww(
 log: &mut impl LwwServerLog,
 branch_store: &mut impl BranchStore,
 source_doc_id: &str,
 branch_doc_id: impl Into<SmartString>,
 current_state: Value,
 metadata: Option<Value>,
) -> Result<Branch, SyncError> {
 reject_branch_of_branch(branch_store, source_doc_id)?;

 let branch_doc_id: SmartString = branch_doc_id.into();
 log.create_doc(&branch_doc_id, current_state);

 let branch = Branch {
 id: branch_doc_id,
 doc_id: source_doc_id.into(),
 branched_at_rev: 0,
 status: BranchStatus::Open,
 name: None,
 metadata,
 };
 branch_store.save(branch.clone());
 Ok(branch)
}
