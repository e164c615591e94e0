//! `SyncingState`: "the sync coordinator never swallows errors silently -- it emits a
//! `syncing = Error(...)` state on the affected doc and keeps pending intact."

use change_model::SyncError;

#[derive(Debug, Clone, PartialEq)]
pub enum SyncingState {
 Idle,
 Syncing,
 Error(SyncError),
}

impl SyncingState {
 pub fn is_error(&self) -> bool {
 matches!(self, SyncingState::Error(_))
 }
}
