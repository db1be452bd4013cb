//! HTTP client for the Steam bridge.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::Moderation;

use super::events::SteamEvent;
use super::persist::ServerEndpoint;
use super::SteamError;

/// HTTP connect timeout.
const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Request timeout for normal operations.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Request timeout for the long-poll endpoint.
const POLL_TIMEOUT_SECS: u64 = 60;

/// Response envelope from the bridge HTTP API.
#[derive(Debug, Deserialize)]
struct BridgeResponse<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

/// Body of `POST /logon`.
#[derive(Clone, Serialize)]
pub struct LogonRequest {
    /// Steam account name.
    pub account_name: String,
    /// Steam password.
    pub password: String,
    /// Steam Guard code, needed only for the first logon.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_code: Option<String>,
    /// Base64 sentry blob from an earlier session.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentry: Option<String>,
    /// Cached CM server list.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<ServerEndpoint>,
}

impl std::fmt::Debug for LogonRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogonRequest")
            .field("account_name", &self.account_name)
            .field("password", &"[REDACTED]")
            .field("auth_code", &self.auth_code.as_ref().map(|_| "[REDACTED]"))
            .field("sentry", &self.sentry.is_some())
            .field("servers", &self.servers.len())
            .finish()
    }
}

/// A chat room member as reported by the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BridgeMember {
    /// SteamID64.
    pub steam_id: String,
    /// Persona name.
    pub name: String,
    /// Chat permission bits.
    #[serde(default)]
    pub permissions: u32,
}

/// Client for the Steam bridge HTTP API.
#[derive(Debug, Clone)]
pub struct BridgeClient {
    client: reqwest::Client,
    poll_client: reqwest::Client,
    base_url: String,
}

fn build_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(std::time::Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "failed to build HTTP client with timeouts, using default");
            reqwest::Client::default()
        })
}

impl BridgeClient {
    /// Create a client for the bridge at `base_url`.
    pub fn new(base_url: &str) -> Self {
        Self {
            client: build_client(REQUEST_TIMEOUT_SECS),
            poll_client: build_client(POLL_TIMEOUT_SECS),
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    /// Bridge base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn unwrap_envelope<T: DeserializeOwned>(
        resp: reqwest::Response,
    ) -> Result<Option<T>, SteamError> {
        let status = resp.status();
        let body: BridgeResponse<T> = match resp.json().await {
            Ok(body) => body,
            Err(e) if !status.is_success() => {
                return Err(SteamError::Bridge(format!("HTTP {status}: {e}")));
            }
            Err(e) => return Err(e.into()),
        };
        if !status.is_success() || !body.success {
            return Err(SteamError::Bridge(
                body.error.unwrap_or_else(|| format!("HTTP {status}")),
            ));
        }
        Ok(body.data)
    }

    async fn post(&self, path: &str, body: &serde_json::Value) -> Result<(), SteamError> {
        let url = format!("{}{path}", self.base_url);
        let resp = self.client.post(&url).json(body).send().await?;
        Self::unwrap_envelope::<serde_json::Value>(resp).await?;
        Ok(())
    }

    /// Start a logon. Completion arrives as a `logged_on` event.
    pub async fn logon(&self, request: &LogonRequest) -> Result<(), SteamError> {
        let url = format!("{}/logon", self.base_url);
        let resp = self.client.post(&url).json(request).send().await?;
        Self::unwrap_envelope::<serde_json::Value>(resp).await?;
        debug!(account = %request.account_name, "steam logon submitted");
        Ok(())
    }

    /// Set the persona state to online.
    pub async fn set_online(&self) -> Result<(), SteamError> {
        self.post("/persona", &serde_json::json!({ "state": "online" }))
            .await
    }

    /// Join a group chat room.
    pub async fn join_chat(&self, room: &str) -> Result<(), SteamError> {
        self.post("/chat/join", &serde_json::json!({ "room": room }))
            .await
    }

    /// Send a chat message to a room or a single user.
    pub async fn send_chat(&self, target: &str, text: &str) -> Result<(), SteamError> {
        self.post(
            "/chat/send",
            &serde_json::json!({ "target": target, "text": text }),
        )
        .await
    }

    /// Current members of a room.
    pub async fn members(&self, room: &str) -> Result<Vec<BridgeMember>, SteamError> {
        let url = format!("{}/chat/{room}/members", self.base_url);
        let resp = self.client.get(&url).send().await?;
        Ok(Self::unwrap_envelope(resp).await?.unwrap_or_default())
    }

    /// Kick, ban or unban a member.
    pub async fn moderate(
        &self,
        room: &str,
        steam_id: &str,
        action: Moderation,
    ) -> Result<(), SteamError> {
        self.post(
            "/chat/moderate",
            &serde_json::json!({ "room": room, "steam_id": steam_id, "action": action }),
        )
        .await
    }

    /// Long-poll for events. An idle poll returns an empty list.
    pub async fn poll_events(&self) -> Result<Vec<SteamEvent>, SteamError> {
        let url = format!("{}/events/poll", self.base_url);
        let resp = self.poll_client.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(SteamError::Bridge(format!(
                "event poll returned {}",
                resp.status()
            )));
        }
        Ok(resp.json().await?)
    }
}
