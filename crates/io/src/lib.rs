// Register storage: CSV codec, version stamps, and the Load/Save stores

pub mod csv;
pub mod error;
pub mod store;
pub mod version;

pub use error::StoreError;
pub use store::{CachedStore, CsvStore, MemoryStore, Snapshot, Store};
pub use version::Version;
