//! API client for communicating with the events REST API.
//!
//! This module provides the `ApiClient` struct for making authenticated
//! requests against the events service, and the `EventsApi` trait that the
//! page and table controllers are written against.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{header, Client, Method, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::SessionData;
use crate::models::{
    Event, EventCreate, EventRegistration, EventUpdate, EventsResponse, Message, Token, User,
};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Base URL used when nothing is configured (local development backend)
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api/v1";

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Operations the events screen needs from the backend.
///
/// `ApiClient` is the production implementation; controllers only see this trait.
#[async_trait]
pub trait EventsApi: Send + Sync {
    /// Fetch one slice of the events collection
    async fn list_events(&self, skip: u32, limit: u32) -> Result<EventsResponse>;

    async fn read_event(&self, id: Uuid) -> Result<Event>;

    async fn create_event(&self, event: &EventCreate) -> Result<Event>;

    async fn update_event(&self, id: Uuid, update: &EventUpdate) -> Result<Event>;

    async fn delete_event(&self, id: Uuid) -> Result<Message>;

    /// Events the signed-in user is registered for
    async fn registered_events(&self) -> Result<EventsResponse>;

    async fn register_for_event(&self, id: Uuid) -> Result<EventRegistration>;

    async fn unregister_from_event(&self, id: Uuid) -> Result<Message>;
}

/// API client for the events service.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a new API client against the given base URL
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Set the bearer token for authenticated requests
    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Log in with username/password and return session data for the account
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<SessionData> {
        let url = self.url("/login/access-token");

        let response = self
            .client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .form(&[("username", username), ("password", password)])
            .send()
            .await
            .context("Failed to send authentication request")?;

        let response = Self::check_response(response).await?;
        let token: Token = response
            .json()
            .await
            .context("Failed to parse token response")?;

        let user = self
            .with_token(token.access_token.clone())
            .fetch_current_user()
            .await
            .context("Failed to fetch signed-in user")?;

        debug!(user_id = %user.id, "Authenticated");

        Ok(SessionData {
            token: token.access_token,
            user,
            username: username.to_string(),
            created_at: Utc::now(),
        })
    }

    /// Fetch the account the current token belongs to
    pub async fn fetch_current_user(&self) -> Result<User> {
        self.request(Method::GET, "/users/me").await
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.token {
            Some(ref token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "Request rejected by server");
            Err(ApiError::from_status(status, &body).into())
        }
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<reqwest::Response> {
        let url = self.url(path);
        let mut builder = self.authorized(self.client.request(method.clone(), &url));
        if let Some(ref body) = body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(ApiError::from)
            .with_context(|| format!("Failed to send {} request to {}", method, url))?;

        Self::check_response(response).await
    }

    async fn request<T: DeserializeOwned>(&self, method: Method, path: &str) -> Result<T> {
        let response = self.send(method, path, None).await?;
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse JSON response from {}", path))
    }

    async fn request_with_body<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let body = serde_json::to_value(body).context("Failed to encode request body")?;
        let response = self.send(method, path, Some(body)).await?;
        response
            .json()
            .await
            .with_context(|| format!("Failed to parse JSON response from {}", path))
    }

    /// Fetch a list endpoint, tolerating payloads that are not an event collection
    async fn fetch_events_payload(&self, path: &str) -> Result<EventsResponse> {
        let response = self.send(Method::GET, path, None).await?;
        let text = response
            .text()
            .await
            .with_context(|| format!("Failed to read response body from {}", path))?;

        let page = EventsResponse::from_payload(&text);
        if page.invalid {
            warn!(path, "Events payload was not a collection");
        } else {
            debug!(path, count = page.data.len(), total = ?page.count, "Events response received");
        }
        Ok(page)
    }
}

#[async_trait]
impl EventsApi for ApiClient {
    async fn list_events(&self, skip: u32, limit: u32) -> Result<EventsResponse> {
        self.fetch_events_payload(&format!("/events/?skip={}&limit={}", skip, limit))
            .await
    }

    async fn read_event(&self, id: Uuid) -> Result<Event> {
        self.request(Method::GET, &format!("/events/{}", id)).await
    }

    async fn create_event(&self, event: &EventCreate) -> Result<Event> {
        self.request_with_body(Method::POST, "/events/", event).await
    }

    async fn update_event(&self, id: Uuid, update: &EventUpdate) -> Result<Event> {
        self.request_with_body(Method::PUT, &format!("/events/{}", id), update)
            .await
    }

    async fn delete_event(&self, id: Uuid) -> Result<Message> {
        self.request(Method::DELETE, &format!("/events/{}", id)).await
    }

    async fn registered_events(&self) -> Result<EventsResponse> {
        self.fetch_events_payload("/events/registered").await
    }

    async fn register_for_event(&self, id: Uuid) -> Result<EventRegistration> {
        self.request(Method::POST, &format!("/events/{}/register", id))
            .await
    }

    async fn unregister_from_event(&self, id: Uuid) -> Result<Message> {
        self.request(Method::DELETE, &format!("/events/{}/unregister", id))
            .await
    }
}
