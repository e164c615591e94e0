//! Shared record shapes for the client store contract.

use change_model::Change;
use serde_json::Value;
use smartstring::alias::String as SmartString;

/// One row of `listDocs`: everything needed to decide what to do with a tracked doc without
/// paying for a full `getDoc` reconstruction.
#[derive(Debug, Clone, PartialEq)]
pub struct DocIndexEntry {
 pub id: SmartString,
 pub committed_rev: u64,
 pub deleted: bool,
}

/// `getDoc`'s reconstructed view: the baked-in snapshot folded with whatever committed tail and
/// pending changes haven't been folded into it yet.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDoc {
 pub state: Value,
 pub rev: u64,
 pub pending: Vec<Change>,
}

/// `getDoc`'s LWW counterpart: there is no single document revision, just the folded snapshot and
/// the highest per-path rev observed so far.
#[derive(Debug, Clone, PartialEq)]
pub struct LwwStoredDoc {
 pub state: Value,
 pub rev: u64,
}
