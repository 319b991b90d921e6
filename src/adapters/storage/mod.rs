//! Storage Adapters
//!
//! - **FileSnapshotStore** - context snapshots as JSON files on disk

mod file_snapshot_store;

pub use file_snapshot_store::FileSnapshotStore;
