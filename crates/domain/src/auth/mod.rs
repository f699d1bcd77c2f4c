//! Authentication domain types

mod types;

pub use types::{
    ApiErrorBody, Credentials, LoginResponse, RefreshResponse, RegisterResponse, Session,
    SessionState, User, token_preview,
};
