//! Passage Application - Auth core and ports
//!
//! This crate defines the application layer with:
//! - Port traits (persistence, transport, navigation, notices)
//! - The token store and the stateless auth gateway
//! - The request pipeline that coordinates token refresh
//! - The session controller driving login/logout flows

pub mod auth;
pub mod pipeline;
pub mod ports;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use auth::{AuthGateway, TokenRefresher, TokenStore};
pub use pipeline::{ApiClient, RefreshCoordinator};
pub use ports::{
    HttpTransport, KeyValueStore, Navigator, Notifier, StorageError, TransportError,
};
pub use session::SessionController;
