//! Persisted token storage.
//!
//! Holds the access token, refresh token and user record in memory and
//! mirrors every change to a [`KeyValueStore`]. Reads never touch the
//! backing store; they are snapshots of the in-memory session.
//!
//! Every load, set and clear starts a new session epoch. Work that began
//! under one session, such as a token refresh, applies its result with
//! [`TokenStore::set_access_token_if`] and is dropped if the session has
//! moved on in the meantime.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use passage_domain::{Session, User};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::ports::KeyValueStore;

/// Names of the persisted entries.
pub mod keys {
    /// Access token (plain string).
    pub const ACCESS_TOKEN: &str = "access_token";
    /// Refresh token (plain string).
    pub const REFRESH_TOKEN: &str = "refresh_token";
    /// User record (JSON).
    pub const USER: &str = "user";
}

/// Thread-safe session store backed by durable storage.
///
/// Mutations never fail: the in-memory session is always updated and a
/// storage failure is logged and otherwise ignored.
pub struct TokenStore {
    session: RwLock<Session>,
    storage: Arc<dyn KeyValueStore>,
    /// Serializes mutations so memory and storage see them in the same order.
    writes: Mutex<()>,
    epoch: AtomicU64,
}

impl TokenStore {
    /// Create an empty store over the given backing storage.
    ///
    /// Call [`TokenStore::load`] to pick up a previously persisted session.
    #[must_use]
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            session: RwLock::new(Session::default()),
            storage,
            writes: Mutex::new(()),
            epoch: AtomicU64::new(0),
        }
    }

    /// Current session epoch.
    #[must_use]
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    fn next_epoch(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }

    /// Recover the persisted session into memory.
    ///
    /// Returns true if an access token was found; the user record is
    /// optional and may be fetched later.
    pub async fn load(&self) -> bool {
        let _write = self.writes.lock().await;

        let access_token = self.read_entry(keys::ACCESS_TOKEN).await;
        let refresh_token = self.read_entry(keys::REFRESH_TOKEN).await;
        let user = match self.read_entry(keys::USER).await {
            Some(raw) => match serde_json::from_str::<User>(&raw) {
                Ok(user) => Some(user),
                Err(e) => {
                    warn!(error = %e, "discarding unreadable persisted user record");
                    None
                }
            },
            None => None,
        };

        let recovered = Session {
            access_token,
            refresh_token,
            user,
        };
        let usable = recovered.is_authenticated();
        debug!(usable, has_user = recovered.user.is_some(), "loaded persisted session");
        *self.session.write() = recovered;
        self.next_epoch();
        usable
    }

    /// Replace the access token and, when given, the refresh token and user.
    pub async fn set(&self, access_token: String, refresh_token: Option<String>, user: Option<User>) {
        let _write = self.writes.lock().await;
        self.next_epoch();

        {
            let mut session = self.session.write();
            session.access_token = Some(access_token.clone());
            if let Some(refresh_token) = &refresh_token {
                session.refresh_token = Some(refresh_token.clone());
            }
            if let Some(user) = &user {
                session.user = Some(user.clone());
            }
        }

        self.write_entry(keys::ACCESS_TOKEN, &access_token).await;
        if let Some(refresh_token) = refresh_token {
            self.write_entry(keys::REFRESH_TOKEN, &refresh_token).await;
        }
        if let Some(user) = user {
            self.write_user(&user).await;
        }
    }

    /// Replace only the access token, if the session is still at `epoch`.
    ///
    /// Returns false and leaves the store untouched otherwise.
    pub async fn set_access_token_if(&self, epoch: u64, access_token: String) -> bool {
        let _write = self.writes.lock().await;
        if self.epoch() != epoch {
            debug!(epoch, current = self.epoch(), "session changed, dropping access token");
            return false;
        }

        self.session.write().access_token = Some(access_token.clone());
        self.write_entry(keys::ACCESS_TOKEN, &access_token).await;
        true
    }

    /// Replace only the user record.
    pub async fn update_user(&self, user: User) {
        let _write = self.writes.lock().await;
        self.session.write().user = Some(user.clone());
        self.write_user(&user).await;
    }

    /// Remove all three fields from memory and storage.
    ///
    /// Safe to call on an empty store.
    pub async fn clear(&self) {
        let _write = self.writes.lock().await;
        self.clear_locked().await;
    }

    /// Clear the store, if the session is still at `epoch`.
    ///
    /// Returns false and leaves the store untouched otherwise.
    pub async fn clear_if(&self, epoch: u64) -> bool {
        let _write = self.writes.lock().await;
        if self.epoch() != epoch {
            return false;
        }
        self.clear_locked().await;
        true
    }

    /// Caller holds `writes`.
    async fn clear_locked(&self) {
        *self.session.write() = Session::default();
        self.next_epoch();

        for key in [keys::ACCESS_TOKEN, keys::REFRESH_TOKEN, keys::USER] {
            if let Err(e) = self.storage.remove(key).await {
                warn!(key, error = %e, "failed to remove persisted entry");
            }
        }
    }

    /// Current access token.
    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.session.read().access_token.clone()
    }

    /// Current refresh token.
    #[must_use]
    pub fn refresh_token(&self) -> Option<String> {
        self.session.read().refresh_token.clone()
    }

    /// Current user record.
    #[must_use]
    pub fn user(&self) -> Option<User> {
        self.session.read().user.clone()
    }

    /// Snapshot of the whole session.
    #[must_use]
    pub fn session(&self) -> Session {
        self.session.read().clone()
    }

    /// Returns true if an access token is held.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.session.read().is_authenticated()
    }

    async fn read_entry(&self, key: &str) -> Option<String> {
        match self.storage.read(key).await {
            Ok(value) => value.filter(|v| !v.is_empty()),
            Err(e) => {
                warn!(key, error = %e, "failed to read persisted entry");
                None
            }
        }
    }

    async fn write_entry(&self, key: &str, value: &str) {
        if let Err(e) = self.storage.write(key, value).await {
            warn!(key, error = %e, "failed to persist entry");
        }
    }

    async fn write_user(&self, user: &User) {
        match serde_json::to_string(user) {
            Ok(json) => self.write_entry(keys::USER, &json).await,
            Err(e) => warn!(error = %e, "failed to serialize user record"),
        }
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let session = self.session.read();
        f.debug_struct("TokenStore")
            .field("authenticated", &session.is_authenticated())
            .field("has_refresh_token", &session.refresh_token.is_some())
            .field("user", &session.user.as_ref().map(|u| u.username.as_str()))
            .finish()
    }
}
