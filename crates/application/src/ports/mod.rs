//! Port definitions (interfaces)
//!
//! Ports define the boundaries between the auth core and the outside
//! world. Each port is a trait implemented by adapters in the
//! infrastructure layer, or by in-process fakes in tests.

mod http_transport;
mod key_value_store;
mod navigator;

pub use http_transport::{HttpTransport, TransportError};
pub use key_value_store::{KeyValueStore, StorageError};
pub use navigator::{Navigator, Notifier};
