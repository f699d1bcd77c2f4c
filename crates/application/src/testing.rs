//! In-process fakes for the ports.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use passage_domain::{ApiRequest, ApiResponse, Endpoints, HttpMethod, Notice, Route, User};
use serde_json::json;
use tokio::sync::watch;

use crate::auth::{AuthGateway, TokenStore};
use crate::pipeline::ApiClient;
use crate::ports::{HttpTransport, KeyValueStore, Navigator, Notifier, StorageError, TransportError};
use crate::session::SessionController;

/// Key-value store held in a map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    failing: bool,
}

impl MemoryStore {
    /// A store whose every operation fails.
    pub fn failing() -> Self {
        Self {
            entries: Mutex::default(),
            failing: true,
        }
    }

    pub fn insert(&self, key: &str, value: &str) {
        self.entries.lock().insert(key.to_string(), value.to_string());
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.failing {
            Err(StorageError::Unavailable("disk on fire".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.check()?;
        Ok(self.get(key))
    }

    async fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check()?;
        self.insert(key, value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.check()?;
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// Scripted auth API.
///
/// `alice`/`pw` logs in as T1/R1, `R1` refreshes to T2, and protected
/// endpoints accept only `valid_access`.
#[derive(Debug, Clone)]
pub struct FakeApi {
    pub valid_access: String,
    pub valid_refresh: String,
    pub offline: bool,
    pub stall_logout: bool,
}

impl Default for FakeApi {
    fn default() -> Self {
        Self {
            valid_access: "T2".to_string(),
            valid_refresh: "R1".to_string(),
            offline: false,
            stall_logout: false,
        }
    }
}

impl FakeApi {
    pub fn accepting(token: &str) -> Self {
        Self {
            valid_access: token.to_string(),
            ..Self::default()
        }
    }

    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::default()
        }
    }

    pub fn alice() -> User {
        let mut user = User::named("alice");
        user.id = Some(1);
        user.roles = vec!["user".to_string()];
        user
    }

    fn handle(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        if self.offline {
            return Err(TransportError::ConnectionFailed("connection refused".to_string()));
        }

        let body = request.body.clone().unwrap_or_default();
        let username = body["username"].as_str().unwrap_or_default();
        let bearer = request.bearer();

        let response = match (request.method, request.path.as_str()) {
            (HttpMethod::Post, Endpoints::REGISTER) if username == "alice" => ApiResponse::json(
                409,
                &json!({"message": "Username 'alice' is already taken"}),
            ),
            (HttpMethod::Post, Endpoints::REGISTER) => ApiResponse::json(
                201,
                &json!({"message": format!("User '{username}' registered, please log in")}),
            ),
            (HttpMethod::Post, Endpoints::LOGIN)
                if username == "alice" && body["password"] == "pw" =>
            {
                ApiResponse::json(
                    200,
                    &json!({
                        "access_token": "T1",
                        "refresh_token": "R1",
                        "message": "Welcome back, alice",
                        "user": Self::alice(),
                    }),
                )
            }
            (HttpMethod::Post, Endpoints::LOGIN) => ApiResponse::json(
                401,
                &json!({"message": "Invalid username or password"}),
            ),
            (HttpMethod::Post, Endpoints::REFRESH) if bearer == Some(self.valid_refresh.as_str()) => {
                ApiResponse::json(200, &json!({"access_token": "T2"}))
            }
            (HttpMethod::Post, Endpoints::REFRESH) => {
                ApiResponse::json(401, &json!({"message": "Refresh token is invalid"}))
            }
            (_, Endpoints::PROFILE | Endpoints::LOGOUT) if bearer != Some(self.valid_access.as_str()) => {
                ApiResponse::json(401, &json!({"message": "Token has expired"}))
            }
            (HttpMethod::Get, Endpoints::PROFILE) => {
                let mut profile = serde_json::to_value(Self::alice()).unwrap_or_default();
                profile["token_type"] = json!("access");
                ApiResponse::json(200, &profile)
            }
            (HttpMethod::Delete, Endpoints::LOGOUT) => {
                ApiResponse::json(200, &json!({"message": "Logged out"}))
            }
            _ => ApiResponse::json(404, &json!({"message": "Not found"})),
        };
        Ok(response)
    }
}

/// Transport that answers from a [`FakeApi`] and records every call.
pub struct FakeTransport {
    api: FakeApi,
    calls: Mutex<Vec<ApiRequest>>,
    /// Count of 401 responses served plus manual releases.
    released: watch::Sender<usize>,
    hold_refresh_until: Option<usize>,
}

impl FakeTransport {
    pub fn new(api: FakeApi) -> Self {
        Self {
            api,
            calls: Mutex::default(),
            released: watch::Sender::new(0),
            hold_refresh_until: None,
        }
    }

    /// Hold refresh calls until `count` requests have been rejected.
    pub const fn hold_refresh_until(mut self, count: usize) -> Self {
        self.hold_refresh_until = Some(count);
        self
    }

    pub fn release_refresh(&self) {
        self.released.send_modify(|n| *n += 1);
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls_to(&self, path: &str) -> Vec<ApiRequest> {
        self.calls
            .lock()
            .iter()
            .filter(|call| call.path == path)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl HttpTransport for FakeTransport {
    async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        self.calls.lock().push(request.clone());

        if let Some(count) = self.hold_refresh_until
            && request.is_refresh_call()
        {
            let mut released = self.released.subscribe();
            let _ = released.wait_for(|n| *n >= count).await;
        }
        if self.api.stall_logout && request.path == Endpoints::LOGOUT {
            std::future::pending::<()>().await;
        }

        let response = self.api.handle(request)?;
        if response.status.is_unauthorized() {
            self.release_refresh();
        }
        Ok(response)
    }
}

#[derive(Debug, Default)]
pub struct RecordingNavigator {
    routes: Mutex<Vec<Route>>,
}

impl RecordingNavigator {
    pub fn routes(&self) -> Vec<Route> {
        self.routes.lock().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: Route) {
        self.routes.lock().push(route);
    }
}

#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().push(notice);
    }
}

/// A fully wired client over fakes.
pub struct Harness {
    pub storage: Arc<MemoryStore>,
    pub transport: Arc<FakeTransport>,
    pub navigator: Arc<RecordingNavigator>,
    pub notifier: Arc<RecordingNotifier>,
    pub tokens: Arc<TokenStore>,
    pub client: Arc<ApiClient>,
}

impl Harness {
    pub fn new(api: FakeApi) -> Self {
        Self::with_transport(FakeTransport::new(api))
    }

    pub fn with_transport(transport: FakeTransport) -> Self {
        let storage = Arc::new(MemoryStore::default());
        let transport = Arc::new(transport);
        let navigator = Arc::new(RecordingNavigator::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let tokens = Arc::new(TokenStore::new(storage.clone()));
        let client = Arc::new(ApiClient::new(
            transport.clone(),
            Arc::clone(&tokens),
            navigator.clone(),
            notifier.clone(),
        ));
        Self {
            storage,
            transport,
            navigator,
            notifier,
            tokens,
            client,
        }
    }

    pub fn gateway(&self) -> AuthGateway {
        AuthGateway::new(Arc::clone(&self.client))
    }

    pub fn controller(&self) -> SessionController {
        SessionController::new(Arc::clone(&self.client), self.navigator.clone())
    }

    /// Store a session for alice with the given tokens.
    pub async fn sign_in(&self, access_token: &str, refresh_token: &str) {
        self.tokens
            .set(
                access_token.to_string(),
                Some(refresh_token.to_string()),
                Some(FakeApi::alice()),
            )
            .await;
    }
}
