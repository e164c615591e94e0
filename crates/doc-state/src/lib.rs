//! Document replica state machines: the in-memory `Doc` a client holds for one
//! document, independent of how it got there (transport, storage) or who drives it (the sync
//! coordinator).

pub mod doc;
pub mod lww_doc;
pub mod ot_doc;
pub mod signal;
pub mod syncing;

pub use doc::Doc;
pub use lww_doc::LwwDoc;
pub use ot_doc::OtDoc;
pub use signal::{Signal, SignalHandle};
pub use syncing::SyncingState;
