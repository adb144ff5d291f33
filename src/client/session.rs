use serde::Deserialize;
use serde_json::{json, Value};

use super::api::{ApiClient, ApiClientError};
use super::storage::{FileStore, SessionStore, TOKEN_KEY, USERNAME_KEY, USER_ID_KEY};
use crate::config::ClientConfig;

pub const LOGIN_FALLBACK: &str = "Login Failed";
pub const REGISTER_FALLBACK: &str = "Register Failed";

/// Proof of authentication held by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub user_id: String,
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthResponse {
    Success { data: Value },
    Failure { message: String },
}

impl AuthResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, AuthResponse::Success { .. })
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            AuthResponse::Success { data } => Some(data),
            AuthResponse::Failure { .. } => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            AuthResponse::Failure { message } => Some(message),
            AuthResponse::Success { .. } => None,
        }
    }
}

#[derive(Deserialize)]
struct LoginPayload {
    token: String,
    #[serde(rename = "userId")]
    user_id: Value,
    #[serde(default)]
    username: Option<String>,
}

// userId arrives as a string or a number depending on the backend
fn id_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl LoginPayload {
    fn into_session(self) -> Option<Session> {
        if self.token.is_empty() {
            return None;
        }
        let user_id = id_string(&self.user_id)?;
        Some(Session {
            token: self.token,
            user_id,
            username: self.username.filter(|u| !u.is_empty()),
        })
    }
}

fn failure(op: &str, err: &ApiClientError, fallback: &str) -> AuthResponse {
    log::warn!("{op} failed: {err}");
    let message = err.server_message().filter(|m| !m.is_empty()).unwrap_or(fallback);
    AuthResponse::Failure { message: message.to_string() }
}

/// Login/register against the API and keep the resulting session in `store`.
///
/// Storage is written only by a successful [`login`](Self::login) and cleared
/// only by [`logout`](Self::logout). Remote failures come back as
/// [`AuthResponse::Failure`]; nothing is retried.
pub struct SessionManager<S: SessionStore> {
    api: ApiClient,
    store: S,
}

impl<S: SessionStore> SessionManager<S> {
    pub fn new(api: ApiClient, store: S) -> Self {
        Self { api, store }
    }

    pub fn store(&self) -> &S { &self.store }

    pub fn api(&self) -> &ApiClient { &self.api }

    /// On success stores token, user id and username. A response without a
    /// username also clears any username left by an earlier session, so
    /// [`username`](Self::username) never reports another account's name.
    pub async fn login(&self, email: &str, password: &str) -> AuthResponse {
        let body = json!({ "email": email, "password": password });
        let data = match self.api.post_json("/auth/login", &body).await {
            Ok(data) => data,
            Err(e) => return failure("login", &e, LOGIN_FALLBACK),
        };
        let session = serde_json::from_value::<LoginPayload>(data.clone())
            .ok()
            .and_then(LoginPayload::into_session);
        let Some(session) = session else {
            log::warn!("login response lacks token or userId");
            return AuthResponse::Failure { message: LOGIN_FALLBACK.to_string() };
        };

        self.store.set(TOKEN_KEY, &session.token);
        self.store.set(USER_ID_KEY, &session.user_id);
        match &session.username {
            Some(name) => self.store.set(USERNAME_KEY, name),
            // don't leave a previous user's name behind
            None => self.store.remove(USERNAME_KEY),
        }
        log::info!("session established for user {}", session.user_id);
        AuthResponse::Success { data }
    }

    /// Never signs the new account in.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> AuthResponse {
        let body = json!({ "username": username, "email": email, "password": password });
        match self.api.post_json("/auth/register", &body).await {
            Ok(data) => AuthResponse::Success { data },
            Err(e) => failure("register", &e, REGISTER_FALLBACK),
        }
    }

    pub fn logout(&self) {
        self.store.remove(TOKEN_KEY);
        self.store.remove(USER_ID_KEY);
        self.store.remove(USERNAME_KEY);
    }

    /// Presence check only; the token is not validated.
    pub fn is_authenticated(&self) -> bool {
        self.token().is_some_and(|t| !t.is_empty())
    }

    pub fn token(&self) -> Option<String> { self.store.get(TOKEN_KEY) }

    pub fn user_id(&self) -> Option<String> { self.store.get(USER_ID_KEY) }

    pub fn username(&self) -> Option<String> { self.store.get(USERNAME_KEY) }

    pub fn session(&self) -> Option<Session> {
        let token = self.token().filter(|t| !t.is_empty())?;
        let user_id = self.user_id()?;
        Some(Session { token, user_id, username: self.username() })
    }
}

impl SessionManager<FileStore> {
    pub fn from_config(cfg: &ClientConfig) -> Self {
        Self::new(ApiClient::new(cfg.api_base_url.clone()), FileStore::open(cfg.session_file.clone()))
    }
}
