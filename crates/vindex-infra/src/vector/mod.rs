//! Vector store persistence.

pub mod snapshot;

pub use snapshot::{LoadedSnapshot, Snapshot, load_snapshot, read_snapshot, save_snapshot};
