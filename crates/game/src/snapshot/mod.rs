mod buffer;

pub use buffer::{DEFAULT_SNAPSHOT_CAPACITY, RemoteState, SnapshotBuffer};
