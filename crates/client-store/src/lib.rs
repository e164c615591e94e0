//! Client-side persistence: a persistence-agnostic contract plus an in-memory
//! reference and a sled-backed indexed-kv reference implementation.

pub mod error;
pub mod lww_store;
pub mod ot_store;
pub mod sled_store;
pub mod types;

pub use error::StoreError;
pub use lww_store::{InMemoryLwwStore, LwwClientStore};
pub use ot_store::{InMemoryOtStore, OtClientStore};
pub use sled_store::{SledLwwStore, SledOtStore};
pub use types::{DocIndexEntry, LwwStoredDoc, StoredDoc};
