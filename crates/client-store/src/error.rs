pub use change_model::SyncError as StoreError;
