//! `reqwest` implementation of [`RemoteApi`]

use async_trait::async_trait;
use reqwest::{Client, Method, Url};
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::debug;

use super::remote::{RemoteApi, RemoteResult};
use crate::error::{ActionError, SyncError, SyncResult};
use crate::queue::ActionType;

/// Header carrying the client-generated key of a create
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// REST endpoint for each action type. `{field}` segments are filled from the payload.
pub fn route(action_type: ActionType) -> (Method, &'static str) {
    match action_type {
        ActionType::CreateRide => (Method::POST, "/rides"),
        ActionType::UpdateRide => (Method::PATCH, "/rides/{id}"),
        ActionType::DeleteRide => (Method::DELETE, "/rides/{id}"),
        ActionType::CreateGroup => (Method::POST, "/groups"),
        ActionType::UpdateGroup => (Method::PATCH, "/groups/{id}"),
        ActionType::JoinGroup => (Method::POST, "/groups/{group_id}/members"),
        ActionType::LeaveGroup => (Method::DELETE, "/groups/{group_id}/members/me"),
        ActionType::CreateChallenge => (Method::POST, "/challenges"),
        ActionType::UpdateChallengeProgress => (Method::PATCH, "/challenges/{challenge_id}/progress"),
        ActionType::CreatePost => (Method::POST, "/posts"),
        ActionType::TogglePostLike => (Method::POST, "/posts/{post_id}/like"),
        ActionType::CreateComment => (Method::POST, "/posts/{post_id}/comments"),
        ActionType::CreateVehicle => (Method::POST, "/vehicles"),
        ActionType::UpdateVehicle => (Method::PATCH, "/vehicles/{id}"),
        ActionType::DeleteVehicle => (Method::DELETE, "/vehicles/{id}"),
        ActionType::PromoteToAdmin => (Method::POST, "/groups/{group_id}/admins"),
        ActionType::DemoteFromAdmin => (Method::DELETE, "/groups/{group_id}/admins/{user_id}"),
        ActionType::RemoveMember => (Method::DELETE, "/groups/{group_id}/members/{user_id}"),
        ActionType::TransferOwnership => (Method::POST, "/groups/{group_id}/owner"),
        ActionType::DeleteGroup => (Method::DELETE, "/groups/{id}"),
        ActionType::RequestToJoin => (Method::POST, "/groups/{group_id}/join-requests"),
        ActionType::CancelJoinRequest => (Method::DELETE, "/groups/{group_id}/join-requests/me"),
        ActionType::ApproveJoinRequest => (Method::POST, "/groups/{group_id}/join-requests/{user_id}/approve"),
        ActionType::RejectJoinRequest => (Method::POST, "/groups/{group_id}/join-requests/{user_id}/reject"),
    }
}

/// Split a route into path segments, filling `{field}` segments from
/// top-level payload fields. Values are returned raw; they are encoded when
/// the URL is built. A missing or non-scalar field makes the action unusable.
pub fn render_path(template: &str, payload: &JsonValue) -> Result<Vec<String>, ActionError> {
    template
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let Some(field) = segment.strip_prefix('{') else {
                return Ok(segment.to_string());
            };
            let field = field
                .strip_suffix('}')
                .ok_or_else(|| ActionError::Corrupt(format!("Unterminated placeholder in {}", template)))?;
            match payload.get(field) {
                Some(JsonValue::String(s)) if !s.is_empty() => Ok(s.clone()),
                Some(JsonValue::Number(n)) => Ok(n.to_string()),
                _ => Err(ActionError::Corrupt(format!("Payload is missing '{}'", field))),
            }
        })
        .collect()
}

pub struct HttpRemoteApi {
    client: Client,
    base_url: Url,
    token: Option<String>,
    health_path: String,
    probe_timeout: Duration,
}

impl HttpRemoteApi {
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        request_timeout: Duration,
        probe_timeout: Duration,
    ) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .connect_timeout(request_timeout.min(Duration::from_secs(5)))
            .build()
            .map_err(|e| SyncError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        let base_url: String = base_url.into();
        let base_url = Url::parse(&base_url)
            .ok()
            .filter(|url| !url.cannot_be_a_base())
            .ok_or_else(|| SyncError::ConfigError(format!("Invalid API base URL: {}", base_url)))?;

        Ok(Self {
            client,
            base_url,
            token,
            health_path: "/health".to_string(),
            probe_timeout,
        })
    }

    pub fn with_health_path(mut self, path: impl Into<String>) -> Self {
        self.health_path = path.into();
        self
    }

    /// Append segments to the base URL, percent-encoding each one
    fn url<I>(&self, segments: I) -> Url
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

#[async_trait]
impl RemoteApi for HttpRemoteApi {
    async fn call(&self, action_type: ActionType, payload: &JsonValue, idempotency_key: Option<&str>) -> RemoteResult {
        let (method, template) = route(action_type);
        let url = self.url(render_path(template, payload)?);
        debug!("{} {} for {}", method, url.path(), action_type);

        let mut request = self.client.request(method.clone(), url);
        if method != Method::DELETE {
            request = request.json(payload);
        }
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(key) = idempotency_key {
            request = request.header(IDEMPOTENCY_HEADER, key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ActionError::from_status(status.as_u16(), body));
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(JsonValue::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| ActionError::Corrupt(format!("Unreadable response: {}", e)))
    }

    async fn is_reachable(&self) -> bool {
        let request = self
            .client
            .get(self.url(self.health_path.split('/').filter(|s| !s.is_empty())))
            .timeout(self.probe_timeout)
            .send();
        match request.await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!("Reachability probe failed: {}", e);
                false
            }
        }
    }
}
