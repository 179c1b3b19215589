//! `reqwest`-backed [`Transport`].
//!
//! ERROR HANDLING
//! ==============
//! Send failures (connect, timeout, body read) become `ApiError::Network`;
//! 401/403 become `ApiError::Unauthorized`; other non-2xx statuses keep the
//! body for logging. Nothing here retries; that policy lives in the tracker.

use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::types::{
    ApiError, AuthUser, EndSessionRequest, ProjectSwitchRequest, SmartJoinRequest, SmartJoinResponse,
    StartSessionResponse,
};
use super::{SESSION_HEADER, Transport};
use crate::config::{HttpTimeouts, TrackerConfig};
use crate::events::QueuedEvent;
use crate::session::PresenceSnapshot;

pub(crate) const START_PATH: &str = "/session/start";
pub(crate) const END_PATH: &str = "/session/end";
pub(crate) const HEARTBEAT_PATH: &str = "/heartbeat";
pub(crate) const TRACK_PATH: &str = "/track";
pub(crate) const PROJECT_SWITCH_PATH: &str = "/project/switch";
pub(crate) const SMART_JOIN_PATH: &str = "/smart-join";
pub(crate) const AUTH_ME_PATH: &str = "/auth/me";

pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
    auth_token: Option<String>,
}

impl HttpTransport {
    /// Build a transport for `base_url` with the given timeouts.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(base_url: &str, auth_token: Option<String>, timeouts: HttpTimeouts) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeouts.request)
            .connect_timeout(timeouts.connect)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_owned(), auth_token })
    }

    /// Build a transport from tracker config.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn from_config(config: &TrackerConfig) -> Result<Self, ApiError> {
        Self::new(&config.api_base_url, config.auth_token.clone(), config.timeouts)
    }

    fn url(&self, path: &str) -> String {
        endpoint(&self.base_url, path)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        session_id: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> Result<String, ApiError> {
        let mut request = self.http.request(method, self.url(path));
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }
        if let Some(session_id) = session_id {
            request = request.header(SESSION_HEADER, session_id);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        if !(200..300).contains(&status) {
            return Err(ApiError::from_status(status, text));
        }
        Ok(text)
    }

    async fn post_json<B: Serialize + Sync>(
        &self,
        path: &str,
        session_id: Option<&str>,
        body: &B,
    ) -> Result<String, ApiError> {
        let body = serde_json::to_value(body).map_err(|e| ApiError::Parse(e.to_string()))?;
        self.send(Method::POST, path, session_id, Some(body)).await
    }
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{base_url}{path}")
}

fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T, ApiError> {
    serde_json::from_str(text).map_err(|e| ApiError::Parse(e.to_string()))
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn start_session(&self) -> Result<StartSessionResponse, ApiError> {
        let text = self
            .post_json(START_PATH, None, &serde_json::json!({}))
            .await?;
        parse_json(&text)
    }

    async fn end_session(&self, request: &EndSessionRequest) -> Result<(), ApiError> {
        self.post_json(END_PATH, Some(&request.session_id), request)
            .await?;
        Ok(())
    }

    async fn heartbeat(&self, snapshot: &PresenceSnapshot) -> Result<(), ApiError> {
        self.post_json(HEARTBEAT_PATH, Some(&snapshot.session_id), snapshot)
            .await?;
        Ok(())
    }

    async fn track(&self, event: &QueuedEvent) -> Result<(), ApiError> {
        self.post_json(TRACK_PATH, Some(&event.session_id), event)
            .await?;
        Ok(())
    }

    async fn switch_project(&self, request: &ProjectSwitchRequest) -> Result<(), ApiError> {
        self.post_json(PROJECT_SWITCH_PATH, Some(&request.session_id), request)
            .await?;
        Ok(())
    }

    async fn smart_join(&self, request: &SmartJoinRequest) -> Result<SmartJoinResponse, ApiError> {
        let text = self
            .post_json(SMART_JOIN_PATH, Some(&request.session_id), request)
            .await?;
        parse_json(&text)
    }

    async fn current_user(&self) -> Result<AuthUser, ApiError> {
        let text = self.send(Method::GET, AUTH_ME_PATH, None, None).await?;
        parse_json(&text)
    }
}

#[cfg(test)]
#[path = "http_test.rs"]
mod tests;
