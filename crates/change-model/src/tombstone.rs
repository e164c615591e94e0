//! `Tombstone`: prevents accidental recreation of a deleted document.

use serde::{Deserialize, Serialize};
use smartstring::alias::String as SmartString;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tombstone {
 pub doc_id: SmartString,
 pub deleted_at_rev: u64,
 pub deleted_by: Option<SmartString>,
}
