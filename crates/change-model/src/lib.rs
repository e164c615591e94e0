//! Data records shared by the OT/LWW engines, client/server stores and branch manager: `Change`,
//! `TimedOp`, `VersionMetadata`, `Branch`, `Tombstone`, `SyncConfig`, and the `SyncError` taxonomy
//!.

pub mod branch;
pub mod change;
pub mod config;
pub mod error;
pub mod tombstone;
pub mod version;

pub use branch::{Branch, BranchStatus};
pub use change::{Change, TimedOp};
pub use config::SyncConfig;
pub use error::SyncError;
pub use tombstone::Tombstone;
pub use version::{VersionMetadata, VersionOrigin};
