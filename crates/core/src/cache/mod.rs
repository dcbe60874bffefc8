//! Response cache for intercepted requests.
//!
//! - [`CacheStorage`] is the store abstraction; [`CacheDb`] persists it in
//!   SQLite (WAL mode, migrations) and [`MemoryStore`] keeps it in memory
//! - [`CacheRegistry`] names, opens and sweeps versioned stores
//! - [`RequestKey`] and [`ResponseSnapshot`] are the entry key and value

pub mod connection;
pub mod entries;
pub mod hash;
pub mod memory;
pub mod migrations;
pub mod registry;
pub mod snapshot;
pub mod store;

pub use crate::Error;

pub use connection::CacheDb;
pub use hash::RequestKey;
pub use memory::MemoryStore;
pub use registry::{CacheHandle, CacheName, CacheRegistry, Purpose, StoreStats};
pub use snapshot::ResponseSnapshot;
pub use store::CacheStorage;
