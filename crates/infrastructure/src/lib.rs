//! Passage Infrastructure - Adapters and implementations
//!
//! This crate provides concrete implementations of the ports
//! defined in the application layer, plus configuration loading.

pub mod adapters;
pub mod config;
pub mod persistence;
pub mod serialization;

pub use adapters::ReqwestTransport;
pub use self::config::{ClientConfig, ConfigError};
pub use persistence::{FileKeyValueStore, MemoryKeyValueStore};
pub use serialization::{SerializationError, to_json_stable};
