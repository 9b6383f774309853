//! Adapters behind the domain ports: session stores and bank providers.

pub mod in_memory;
pub mod providers;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
