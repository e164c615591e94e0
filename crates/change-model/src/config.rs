//! `SyncConfig`: explicit configuration passed to every component that needs it. No
//! config-file crate is introduced here -- the spec is explicit that "configuration is passed
//! explicitly", so a plain struct with a `Default` impl is the whole of this module.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncConfig {
 pub session_timeout_minutes: u32,
 pub max_payload_bytes: usize,
 /// `None` means unbounded (spec lists this as unset by default).
 pub max_storage_bytes: Option<u64>,
 pub snapshot_interval: u32,
}

impl Default for SyncConfig {
 fn default() -> Self {
 SyncConfig {
 session_timeout_minutes: 30,
 max_payload_bytes: 1024 * 1024,
 max_storage_bytes: None,
 snapshot_interval: 200,
 }
 }
}

impl SyncConfig {
 pub fn session_timeout_millis(&self) -> i64 {
 self.session_timeout_minutes as i64 * 60_000
 }
}
