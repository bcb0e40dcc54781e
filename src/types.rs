//! Wire and domain types for the Playmanity backend
//!
//! Request bodies use snake_case keys; advertisement payloads use camelCase.

use crate::error::{ErrorKind, NO_ACTIVE_SESSION};
use serde::{Deserialize, Serialize};

/// Error object carried by a rejected response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorBody {
    /// Machine-readable error code (e.g., "NO_ACTIVE_SESSION")
    pub code: String,

    /// Human-readable description
    #[serde(default)]
    pub message: String,
}

/// Generic response envelope for session endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse {
    /// Whether the server accepted the request
    #[serde(default)]
    pub success: bool,

    /// Optional informational message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Error details when the request was rejected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiErrorBody>,
}

impl ApiResponse {
    /// The bare `{"success": true}` acknowledgement
    pub fn minimal_success() -> Self {
        Self {
            success: true,
            message: None,
            error: None,
        }
    }

    /// Response built from an error object
    pub fn rejected(error: ApiErrorBody) -> Self {
        Self {
            success: false,
            message: None,
            error: Some(error),
        }
    }

    /// `success == true` and no error object present
    pub fn is_success(&self) -> bool {
        self.success && self.error.is_none()
    }

    /// Server holds no record of the session
    pub fn is_no_active_session(&self) -> bool {
        self.error
            .as_ref()
            .is_some_and(|e| e.code == NO_ACTIVE_SESSION)
    }
}

/// Advertisement type, sent by the backend either as a name or a numeric code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AdKind {
    Code(i64),
    Name(String),
}

impl Default for AdKind {
    fn default() -> Self {
        Self::Name(String::new())
    }
}

/// A single advertisement served for the current session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Advertisement {
    pub id: i64,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub description: String,

    #[serde(rename = "type", default)]
    pub kind: AdKind,

    /// Owning campaign (`campaign` in older backends)
    #[serde(default, alias = "campaign")]
    pub campaign_id: i64,

    /// Click-through destination (`url` in older backends)
    #[serde(default, alias = "url")]
    pub target_url: String,

    /// Creative asset location (`media` in older backends)
    #[serde(default, alias = "media")]
    pub media_url: String,

    #[serde(default)]
    pub is_active: bool,
}

/// Envelope returned by the advertisement endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdvertisementResponse {
    #[serde(default)]
    pub ad: Option<Advertisement>,
}

/// Body for initiate / heartbeat / end
#[derive(Debug, Clone, Serialize)]
pub struct SessionRequest<'a> {
    pub auth_token: &'a str,
}

/// Body for the advertisement endpoint
#[derive(Debug, Clone, Serialize)]
pub struct AdvertisementRequest<'a> {
    pub game_uuid: &'a str,
    pub auth_token: &'a str,
}

/// Body for starting the device authorization flow
#[derive(Debug, Clone, Serialize)]
pub struct AuthInitiateRequest<'a> {
    pub game_uuid: &'a str,
    pub device_id: &'a str,
}

/// Pending device authorization returned by the backend
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PendingAuthorization {
    /// Identifier used to poll for the outcome
    pub auth_id: String,

    /// URL the player opens to approve the device
    pub auth_url: String,
}

/// Authorization state reported by the status endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthStatus {
    Valid,
    Denied,
    Unresolved,
}

/// Body of `GET /games/auth/status/{auth_id}`
#[derive(Debug, Clone, Deserialize)]
pub struct AuthStatusResponse {
    pub status: AuthStatus,

    #[serde(default)]
    pub token: Option<String>,

    #[serde(default)]
    pub error: Option<ApiErrorBody>,
}

/// Lifecycle phase derived from the session flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Initializing,
    Active,
    Ending,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Initializing => "initializing",
            Self::Active => "active",
            Self::Ending => "ending",
        };
        f.write_str(name)
    }
}

/// Events broadcast by the session manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Session validity flipped
    StateChanged(bool),

    /// A request failed; `context` names the operation
    ApiError {
        context: String,
        kind: ErrorKind,
        message: String,
    },
}
