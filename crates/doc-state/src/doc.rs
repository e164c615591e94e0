//! `Doc` (spec §3, §9 design note "Tagged variants over inheritance"): "Doc variants are sum
//! types, not subclasses -- an OT doc and an LWW doc share a capability set but diverge on
//! `applyChanges`'s input shape, so match on the variant instead of forcing both down one
//! interface." Shared read-only capabilities dispatch through `match`; variant-specific methods
//! (`apply_changes` et al.) are reached through the `as_ot`/`as_lww` accessors.

use serde_json::Value;

use crate::lww_doc::LwwDoc;
use crate::ot_doc::OtDoc;
use crate::syncing::SyncingState;

pub enum Doc {
 Ot(OtDoc),
 Lww(LwwDoc),
}

impl Doc {
 pub fn id(&self) -> &str {
 match self {
 Doc::Ot(d) => d.id(),
 Doc::Lww(d) => d.id(),
 }
 }

 pub fn state(&self) -> &Value {
 match self {
 Doc::Ot(d) => d.state(),
 Doc::Lww(d) => d.state(),
 }
 }

 pub fn committed_rev(&self) -> u64 {
 match self {
 Doc::Ot(d) => d.committed_rev(),
 Doc::Lww(d) => d.committed_rev(),
 }
 }

 pub fn has_pending(&self) -> bool {
 match self {
 Doc::Ot(d) => d.has_pending(),
 Doc::Lww(d) => d.has_pending(),
 }
 }

 pub fn syncing(&self) -> &SyncingState {
 match self {
 Doc::Ot(d) => d.syncing(),
 Doc::Lww(d) => d.syncing(),
 }
 }

 pub fn set_syncing(&mut self, state: SyncingState) {
 match self {
 Doc::Ot(d) => d.set_syncing(state),
 Doc::Lww(d) => d.set_syncing(state),
 }
 }

 pub fn as_ot(&self) -> Option<&OtDoc> {
 match self {
 Doc::Ot(d) => Some(d),
 Doc::Lww(_) => None,
 }
 }

 pub fn as_ot_mut(&mut self) -> Option<&mut OtDoc> {
 match self {
 Doc::Ot(d) => Some(d),
 Doc::Lww(_) => None,
 }
 }

 pub fn as_lww(&self) -> Option<&LwwDoc> {
 match self {
 Doc::Lww(d) => Some(d),
 Doc::Ot(_) => None,
 }
 }

 pub fn as_lww_mut(&mut self) -> Option<&mut LwwDoc> {
 match self {
 Doc::Lww(d) => Some(d),
 Doc::Ot(_) => None,
 }
 }
}
