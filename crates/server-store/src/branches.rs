//! Branches by `branchId`.

use std::collections::HashMap;

use change_model::Branch;
use smartstring::alias::String as SmartString;

pub trait BranchStore {
 fn get(&self, branch_id: &str) -> Option<Branch>;
 fn list_for_doc(&self, doc_id: &str) -> Vec<Branch>;
 fn save(&mut self, branch: Branch);
}

#[derive(Default)]
pub struct InMemoryBranchStore {
 branches: HashMap<SmartString, Branch>,
}

impl InMemoryBranchStore {
 pub fn new() -> Self {
 Self::default()
 }
}

impl BranchStore for InMemoryBranchStore {
 fn get(&self, branch_id: &str) -> Option<Branch> {
 self.branches.get(branch_id).cloned()
 }

 fn list_for_doc(&self, doc_id: &str) -> Vec<Branch> {
 self.branches.values().filter(|b| b.doc_id == doc_id).cloned().collect()
 }

 fn save(&mut self, branch: Branch) {
 self.branches.insert(branch.id.clone(), branch);
 }
}
