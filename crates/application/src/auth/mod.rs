//! Authentication module for the Passage client.
//!
//! This module provides:
//! - Persisted token storage for the current session
//! - The stateless gateway for the four remote auth operations plus profile

mod gateway;
mod token_store;

pub use gateway::{AuthGateway, TokenRefresher};
pub use token_store::{TokenStore, keys};
