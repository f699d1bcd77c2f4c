//! Passage Domain - Core authentication types
//!
//! This crate defines the domain model for the Passage client: the
//! persisted session, the wire payloads exchanged with the auth API,
//! request/response values, navigation targets and the error taxonomy.
//! All types here are pure Rust with no I/O dependencies.

pub mod auth;
pub mod error;
pub mod id;
pub mod navigation;
pub mod request;
pub mod response;

pub use auth::{
    ApiErrorBody, Credentials, LoginResponse, RefreshResponse, RegisterResponse, Session,
    SessionState, User,
};
pub use error::{AuthError, AuthResult};
pub use id::generate_id_v7;
pub use navigation::{Navigation, Notice, NoticeLevel, Route, RouteAccess, guard};
pub use request::{ApiRequest, Endpoints, HttpMethod};
pub use response::{ApiResponse, StatusCode};
