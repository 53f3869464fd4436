//! Bearer credentials for the photo server.
//!
//! The rest of the client only ever sees the token as an opaque string.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Environment variable that overrides any stored session.
pub const TOKEN_ENV: &str = "ARDA_TOKEN";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Login request failed: {0}")]
    Request(String),
    #[error("Login rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("Session store error: {0}")]
    Store(String),
    #[error("Not logged in; run `arda login` or set ARDA_TOKEN")]
    NotLoggedIn,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub username: String,
    pub token: String,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
    #[serde(default)]
    message: Option<String>,
}

/// Exchange credentials for a bearer token via `POST /auth/login`.
#[cfg_attr(feature = "trace-spans", tracing::instrument(skip(password)))]
pub async fn login(base_url: &str, username: &str, password: &str) -> Result<Session, AuthError> {
    let url = format!("{}/auth/login", base_url.trim_end_matches('/'));
    let response = reqwest::Client::new()
        .post(url)
        .json(&serde_json::json!({ "username": username, "password": password }))
        .send()
        .await
        .map_err(|e| AuthError::Request(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let message = response.text().await.unwrap_or_default();
        tracing::warn!(status = status.as_u16(), "login rejected");
        return Err(AuthError::Rejected {
            status: status.as_u16(),
            message,
        });
    }

    let body: LoginResponse = response
        .json()
        .await
        .map_err(|e| AuthError::Request(format!("invalid login response: {}", e)))?;
    if let Some(message) = body.message.as_deref() {
        tracing::info!(username, server_message = message, "logged in");
    }
    Ok(Session {
        username: username.to_string(),
        token: body.token,
    })
}

/// JSON file holding the current session.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> Result<Option<Session>, AuthError> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AuthError::Store(e.to_string())),
        };
        serde_json::from_str(&data)
            .map(Some)
            .map_err(|e| AuthError::Store(format!("corrupt session file: {}", e)))
    }

    pub fn save(&self, session: &Session) -> Result<(), AuthError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AuthError::Store(e.to_string()))?;
        }
        let data =
            serde_json::to_string_pretty(session).map_err(|e| AuthError::Store(e.to_string()))?;
        std::fs::write(&self.path, data).map_err(|e| AuthError::Store(e.to_string()))
    }

    /// Returns whether a session was removed.
    pub fn clear(&self) -> Result<bool, AuthError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AuthError::Store(e.to_string())),
        }
    }
}

/// The token to attach to requests: `ARDA_TOKEN` if set, else the stored session.
pub fn get_access_token(store: &SessionStore) -> Result<String, AuthError> {
    if let Ok(token) = std::env::var(TOKEN_ENV) {
        if !token.is_empty() {
            return Ok(token);
        }
    }
    store
        .load()?
        .map(|s| s.token)
        .ok_or(AuthError::NotLoggedIn)
}
