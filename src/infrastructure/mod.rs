//! Adapters implementing the domain ports: the HTTP backend client, the
//! locally reported payment provider and the key-value stores.

pub mod file;
pub mod http;
pub mod in_memory;
pub mod provider;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
