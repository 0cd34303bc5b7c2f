//! HTTP client for the desk-booking backend.
//!
//! The backend owns all real state: pairing, bookings, persistence, and the
//! device link to the physical desks. This module wraps its endpoints in a
//! typed client and never caches anything itself.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Backend connection settings.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Base URL, e.g. `http://127.0.0.1:8000` (no trailing slash)
    pub base_url: String,
    /// CSRF token; mutating calls carry it as a cookie and echo it in the
    /// `X-CSRFToken` header
    pub csrf_token: String,
}

impl BackendConfig {
    /// Create a new backend configuration.
    pub fn new(base_url: impl Into<String>, csrf_token: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            csrf_token: csrf_token.into(),
        }
    }

    /// Per-desk pairing and live height endpoint.
    pub fn user_status_url(&self, desk_id: &str) -> String {
        format!("{}/api/user-status/{}/", self.base_url, desk_id)
    }

    pub fn pair_url(&self) -> String {
        format!("{}/pair_desk/", self.base_url)
    }

    pub fn unpair_url(&self) -> String {
        format!("{}/unpair_desk/", self.base_url)
    }

    pub fn set_height_url(&self) -> String {
        format!("{}/api/set_desk_height/", self.base_url)
    }

    pub fn desks_status_url(&self) -> String {
        format!("{}/api/desks_status/", self.base_url)
    }

    /// Server-rendered view fragment endpoint.
    pub fn load_view_url(&self, view: &str, room: Option<&str>) -> String {
        match room {
            Some(room) => format!(
                "{}/load_view/{}/?room=Room%20{}",
                self.base_url, view, room
            ),
            None => format!("{}/load_view/{}/", self.base_url, view),
        }
    }

    pub fn admin_desks_url(&self) -> String {
        format!("{}/api/desks", self.base_url)
    }

    pub fn admin_desk_url(&self, desk_id: &str) -> String {
        format!("{}/api/desks/{}", self.base_url, desk_id)
    }
}

/// Backend client error types.
#[derive(Debug)]
pub enum BackendError {
    /// Configuration error
    Config(String),
    /// Network/transport error
    Network(String),
    /// Server returned a non-success HTTP status
    Server { status: u16, message: String },
    /// Response body did not match the expected shape
    Decode(String),
}

impl std::fmt::Display for BackendError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendError::Config(msg) => write!(f, "Backend config error: {msg}"),
            BackendError::Network(msg) => write!(f, "Backend network error: {msg}"),
            BackendError::Server { status, message } => {
                write!(f, "Backend server error ({status}): {message}")
            }
            BackendError::Decode(msg) => write!(f, "Backend response error: {msg}"),
        }
    }
}

impl std::error::Error for BackendError {}

/// Live pairing and height state for one desk, as reported by the backend.
///
/// `current_height` and `is_moving` are only populated while the requesting
/// user is paired with the desk.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DeskStatus {
    pub is_paired: bool,
    #[serde(default)]
    pub current_height: Option<i64>,
    #[serde(default)]
    pub is_moving: Option<bool>,
}

/// Outcome of a command dispatch (pair, unpair, move).
///
/// Logical failures arrive as `success: false` with HTTP 200; the message is
/// meant to be surfaced to the user verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    pub success: bool,
    pub message: String,
}

/// Occupant entry in the bulk desk status map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Occupant {
    pub user: String,
}

/// A desk record from the admin CRUD endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminDesk {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub meta: serde_json::Value,
}

/// Async client for the desk backend.
pub struct BackendClient {
    config: BackendConfig,
    client: reqwest::Client,
    client_id: String,
}

impl BackendClient {
    /// Create a new backend client.
    pub fn new(config: BackendConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        // Identify this agent instance to the backend logs
        let host = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        let client_id = format!(
            "ergodesk-{}-{}",
            host,
            &uuid::Uuid::new_v4().to_string()[..8]
        );

        Self {
            config,
            client,
            client_id,
        }
    }

    /// Get the agent's client id.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Fetch pairing state and live height for one desk.
    pub async fn desk_status(&self, desk_id: &str) -> Result<DeskStatus, BackendError> {
        let response = self
            .client
            .get(self.config.user_status_url(desk_id))
            .header("User-Agent", &self.client_id)
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        Self::decode_json(response).await
    }

    /// Pair the current user with a desk.
    pub async fn pair(&self, desk_id: &str) -> Result<CommandResponse, BackendError> {
        self.post_form(self.config.pair_url(), &[("desk_id", desk_id)])
            .await
    }

    /// Unpair the current user from their active desk.
    pub async fn unpair(&self) -> Result<CommandResponse, BackendError> {
        self.post_form(self.config.unpair_url(), &[]).await
    }

    /// Issue a move command. Acceptance does not mean arrival; callers poll
    /// `desk_status` until the desk reaches the target, stalls, or times out.
    pub async fn set_desk_height(
        &self,
        desk_id: &str,
        height_cm: i64,
    ) -> Result<CommandResponse, BackendError> {
        let height = height_cm.to_string();
        self.post_form(
            self.config.set_height_url(),
            &[("desk_id", desk_id), ("height", &height)],
        )
        .await
    }

    /// Bulk occupancy map for the desk grid.
    pub async fn desks_status(&self) -> Result<HashMap<String, Occupant>, BackendError> {
        let response = self
            .client
            .get(self.config.desks_status_url())
            .header("User-Agent", &self.client_id)
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        Self::decode_json(response).await
    }

    /// Fetch a server-rendered HTML fragment for a view.
    pub async fn load_view(
        &self,
        view: &str,
        room: Option<&str>,
    ) -> Result<String, BackendError> {
        let response = self
            .client
            .get(self.config.load_view_url(view, room))
            .header("User-Agent", &self.client_id)
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(BackendError::Server {
                status: status.as_u16(),
                message,
            });
        }
        response
            .text()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }

    /// List desks (admin).
    pub async fn admin_list_desks(&self) -> Result<Vec<AdminDesk>, BackendError> {
        let response = self
            .client
            .get(self.config.admin_desks_url())
            .header("User-Agent", &self.client_id)
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        Self::decode_json(response).await
    }

    /// Create a desk (admin).
    pub async fn admin_create_desk(&self, name: &str) -> Result<AdminDesk, BackendError> {
        let response = self
            .client
            .post(self.config.admin_desks_url())
            .header("X-CSRFToken", &self.config.csrf_token)
            .header(
                reqwest::header::COOKIE,
                format!("csrftoken={}", self.config.csrf_token),
            )
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        Self::decode_json(response).await
    }

    /// Remove a desk (admin).
    pub async fn admin_remove_desk(&self, desk_id: &str) -> Result<(), BackendError> {
        let response = self
            .client
            .delete(self.config.admin_desk_url(desk_id))
            .header("X-CSRFToken", &self.config.csrf_token)
            .header(
                reqwest::header::COOKIE,
                format!("csrftoken={}", self.config.csrf_token),
            )
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(BackendError::Server {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }

    /// Form-encoded POST with CSRF cookie + header, decoded as a
    /// `CommandResponse`.
    async fn post_form(
        &self,
        url: String,
        fields: &[(&str, &str)],
    ) -> Result<CommandResponse, BackendError> {
        let response = self
            .client
            .post(url)
            .header("X-CSRFToken", &self.config.csrf_token)
            .header(
                reqwest::header::COOKIE,
                format!("csrftoken={}", self.config.csrf_token),
            )
            .header("User-Agent", &self.client_id)
            .form(fields)
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        Self::decode_json(response).await
    }

    async fn decode_json<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, BackendError> {
        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(BackendError::Server {
                status: status.as_u16(),
                message,
            });
        }
        response
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }
}

/// Blocking backend client for one-shot CLI commands.
pub struct BlockingBackendClient {
    inner: BackendClient,
    runtime: tokio::runtime::Runtime,
}

impl BlockingBackendClient {
    /// Create a new blocking backend client.
    pub fn new(config: BackendConfig) -> Result<Self, BackendError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| BackendError::Config(format!("Failed to create runtime: {e}")))?;

        Ok(Self {
            inner: BackendClient::new(config),
            runtime,
        })
    }

    pub fn desk_status(&self, desk_id: &str) -> Result<DeskStatus, BackendError> {
        self.runtime.block_on(self.inner.desk_status(desk_id))
    }

    pub fn pair(&self, desk_id: &str) -> Result<CommandResponse, BackendError> {
        self.runtime.block_on(self.inner.pair(desk_id))
    }

    pub fn unpair(&self) -> Result<CommandResponse, BackendError> {
        self.runtime.block_on(self.inner.unpair())
    }

    pub fn set_desk_height(
        &self,
        desk_id: &str,
        height_cm: i64,
    ) -> Result<CommandResponse, BackendError> {
        self.runtime
            .block_on(self.inner.set_desk_height(desk_id, height_cm))
    }

    pub fn desks_status(&self) -> Result<HashMap<String, Occupant>, BackendError> {
        self.runtime.block_on(self.inner.desks_status())
    }

    pub fn load_view(&self, view: &str, room: Option<&str>) -> Result<String, BackendError> {
        self.runtime.block_on(self.inner.load_view(view, room))
    }

    pub fn admin_list_desks(&self) -> Result<Vec<AdminDesk>, BackendError> {
        self.runtime.block_on(self.inner.admin_list_desks())
    }

    pub fn admin_create_desk(&self, name: &str) -> Result<AdminDesk, BackendError> {
        self.runtime.block_on(self.inner.admin_create_desk(name))
    }

    pub fn admin_remove_desk(&self, desk_id: &str) -> Result<(), BackendError> {
        self.runtime.block_on(self.inner.admin_remove_desk(desk_id))
    }

    pub fn client_id(&self) -> &str {
        self.inner.client_id()
    }
}
