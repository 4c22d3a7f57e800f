//! Payloads exchanged while issuing ephemeral keys.

use crate::audio::Voice;

/// Body returned by `POST /api/ephemeral-key`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EphemeralKeyResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ephemeral_key: Option<String>,
    /// Seconds since the epoch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl EphemeralKeyResponse {
    pub fn issued(ephemeral_key: &str, expires_at: u64) -> Self {
        Self {
            success: true,
            ephemeral_key: Some(ephemeral_key.to_string()),
            expires_at: Some(expires_at),
            error: None,
        }
    }

    pub fn failed(error: &str) -> Self {
        Self {
            success: false,
            ephemeral_key: None,
            expires_at: None,
            error: Some(error.to_string()),
        }
    }
}

/// Body of the upstream `POST /realtime/sessions` request.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RealtimeSessionRequest {
    pub model: String,
    pub voice: Voice,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ClientSecret {
    pub value: String,
    pub expires_at: u64,
}

/// The fields of the upstream session response the backend relays.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RealtimeSessionResponse {
    pub client_secret: ClientSecret,
}
