//! `syncdoc`: a synchronization core for collaborative JSON documents, with two reconciliation
//! strategies over one JSON-Patch algebra -- operational transform for documents where op order
//! matters, and last-write-wins for independent per-field edits.
//!
//! This crate is a thin facade; the actual work lives in the workspace members it re-exports:
//! [`patch_algebra`] (the op algebra), [`change_model`] (shared records and errors),
//! [`change_shaping`] (pending-change lifecycle), [`ot_engine`] / [`lww_engine`] (the two
//! reconciliation strategies), [`doc_state`] (the client-held document replica), [`client_store`]
//! / [`server_store`] (persistence contracts), [`branch_manager`] (fork/merge), and
//! [`sync_coordinator`] (the thing embedders actually drive).

pub use branch_manager;
pub use change_model;
pub use change_shaping;
pub use client_store;
pub use doc_state;
pub use lww_engine;
pub use ot_engine;
pub use patch_algebra;
pub use server_store;
pub use sync_coordinator;

pub use change_model::{Change, SyncConfig, SyncError, TimedOp};
pub use doc_state::{Doc, LwwDoc, OtDoc, SyncingState};
pub use patch_algebra::Op;
pub use sync_coordinator::{DocHandle, LwwCoordinator, OtCoordinator};
