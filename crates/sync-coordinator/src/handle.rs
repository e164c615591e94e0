//! Ref-counted doc lifecycle: "doc handles are ref-counted by the coordinator and
//! closed when the last reference releases." A `DocHandle`'s `generation` lets the coordinator
//! detect a call racing against a close that already tore the entry down -- "a close/untrack of a
//! doc invalidates in-flight operations... by checking a per-doc generation token before applying
//! their results."

use smartstring::alias::String as SmartString;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocHandle {
 pub(crate) id: SmartString,
 pub(crate) generation: u64,
}

impl DocHandle {
 pub fn id(&self) -> &str {
 &self.id
 }
}

pub(crate) struct Entry<D> {
 pub(crate) doc: D,
 pub(crate) refcount: usize,
 pub(crate) generation: u64,
}
