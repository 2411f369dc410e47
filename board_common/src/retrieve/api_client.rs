//! # Authenticated API Client
//!
//! Wrapper around `reqwest` that attaches the session's bearer token to every
//! call and recovers once from an expired access token.
//!
//! ## Call flow:
//!
//! 1. Query parameters are URL-encoded onto the target URL.
//! 2. Default headers (`Content-Type: application/json`, `Authorization:
//!    Bearer <access>`) are applied first, caller headers after them.
//! 3. A `401` in the [`AttemptState::Initial`] state with a refresh token on
//!    hand triggers one refresh. On success the call is replayed once in the
//!    [`AttemptState::Retried`] state with the new token. On failure the
//!    session is cleared and the call fails with "session expired".
//! 4. Any other non-2xx response fails with the server's `message` (or
//!    `detail`) field, else `HTTP error! Status: <code>`.
//!
//! Every outcome is reported through [`ApiResponse`]; `call` never returns an
//! `Err`.

use std::fmt;
use std::sync::Arc;

use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CACHE_CONTROL, CONTENT_TYPE,
};
use reqwest::{Method, StatusCode};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::configs::ClientConfig;
use crate::error::ClientError;
use crate::session::SessionService;

/// Outcome of a call: exactly one of `data` / `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse<T> {
    /// `true` when the final response was 2xx and decoded cleanly.
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    /// HTTP status of the final response, when one was received and is
    /// meaningful for the failure.
    pub status: Option<u16>,
}

impl<T> ApiResponse<T> {
    fn ok(status: u16, data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            status: Some(status),
        }
    }

    pub(crate) fn failed(error: &ClientError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
            status: error.status(),
        }
    }

    /// The decoded body, dropping any error.
    #[must_use]
    pub fn into_data(self) -> Option<T> {
        self.data
    }

    /// Convert the payload while keeping the outcome metadata.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResponse<U> {
        ApiResponse {
            success: self.success,
            data: self.data.map(f),
            error: self.error,
            status: self.status,
        }
    }
}

/// Which attempt of a call is executing. A call starts `Initial` and may
/// move to `Retried` once; there is no state after `Retried`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptState {
    Initial,
    Retried,
}

impl AttemptState {
    /// The state of the replay after a successful refresh, if one is allowed.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Initial => Some(Self::Retried),
            Self::Retried => None,
        }
    }
}

/// HTTP verbs the backend accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    /// Whether a JSON body is sent with this verb.
    #[must_use]
    pub fn carries_body(self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }

    fn as_reqwest(self) -> Method {
        match self {
            Self::Get => Method::GET,
            Self::Post => Method::POST,
            Self::Put => Method::PUT,
            Self::Patch => Method::PATCH,
            Self::Delete => Method::DELETE,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.as_reqwest(), f)
    }
}

impl std::str::FromStr for HttpMethod {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            other => Err(ClientError::InvalidRequest(format!(
                "unsupported method '{other}'"
            ))),
        }
    }
}

/// A call description. `url` is either absolute or a path relative to the
/// configured backend.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub url: String,
    pub method: HttpMethod,
    pub headers: Vec<(String, String)>,
    pub params: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Whether a `401` may trigger the refresh-and-retry step.
    pub refresh_on_unauthorized: bool,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            headers: Vec::new(),
            params: Vec::new(),
            body: None,
            refresh_on_unauthorized: true,
        }
    }

    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    /// Add a header. Later calls with the same name win, and all of them win
    /// over the client's defaults.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Report a `401` as is, without touching the session.
    #[must_use]
    pub fn without_refresh(mut self) -> Self {
        self.refresh_on_unauthorized = false;
        self
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    #[serde(rename = "accessKey")]
    access_key: String,
}

/// Session-aware HTTP client. Cheap to share behind an `Arc`.
pub struct ApiClient {
    inner: ClientWithMiddleware,
    config: ClientConfig,
    refresh_url: Url,
    session: Arc<SessionService>,
}

impl ApiClient {
    /// Build a client for the configured backend.
    ///
    /// Transient transport failures are retried with exponential backoff only
    /// when `transport_retries > 0`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] if the refresh URL is invalid or the
    /// underlying HTTP client cannot be built.
    pub fn new(config: ClientConfig, session: Arc<SessionService>) -> Result<Self, ClientError> {
        let refresh_url = Url::parse(&config.refresh_url())
            .map_err(|e| ClientError::Config(format!("refresh url: {e}")))?;

        let http = reqwest::Client::builder()
            .connect_timeout(config.request_timeout())
            .build()
            .map_err(|e| ClientError::Config(e.to_string()))?;

        let mut builder = ClientBuilder::new(http);
        if config.transport_retries > 0 {
            let retry_policy =
                ExponentialBackoff::builder().build_with_max_retries(config.transport_retries);
            builder = builder.with(RetryTransientMiddleware::new_with_policy(retry_policy));
        }

        Ok(Self {
            inner: builder.build(),
            config,
            refresh_url,
            session,
        })
    }

    #[must_use]
    pub fn session(&self) -> &Arc<SessionService> {
        &self.session
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Perform `request`, refreshing the access token at most once.
    pub async fn call<T: DeserializeOwned>(&self, request: &ApiRequest) -> ApiResponse<T> {
        match self.execute(request).await {
            Ok((status, data)) => ApiResponse::ok(status, data),
            Err(e) => {
                tracing::warn!(
                    method = %request.method,
                    url = %request.url,
                    error = %e,
                    "API call failed"
                );
                ApiResponse::failed(&e)
            }
        }
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
    ) -> Result<(u16, T), ClientError> {
        let url = self.resolve(request)?;
        let mut attempt = AttemptState::Initial;
        let mut renewed_token: Option<String> = None;

        loop {
            let response = self
                .send(request, url.clone(), renewed_token.as_deref())
                .await?;
            let status = response.status();

            if status == StatusCode::UNAUTHORIZED && request.refresh_on_unauthorized {
                if let (Some(next), Some(refresh_token)) =
                    (attempt.next(), self.session.refresh_token())
                {
                    tracing::info!(url = %url, "Access token rejected, refreshing");
                    renewed_token = Some(self.refresh(&refresh_token).await?);
                    attempt = next;
                    continue;
                }
            }

            if !status.is_success() {
                let body = response.bytes().await.unwrap_or_default();
                return Err(ClientError::Http {
                    status: status.as_u16(),
                    message: error_message(status.as_u16(), &body),
                });
            }

            let body = response.bytes().await?;
            let data = decode_body(&body)?;
            tracing::debug!(url = %url, status = status.as_u16(), ?attempt, "API call succeeded");
            return Ok((status.as_u16(), data));
        }
    }

    async fn send(
        &self,
        request: &ApiRequest,
        url: Url,
        renewed_token: Option<&str>,
    ) -> Result<reqwest::Response, ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = self.session.access_token() {
            headers.insert(AUTHORIZATION, bearer(&token)?);
        }
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ClientError::InvalidRequest(format!("header '{name}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ClientError::InvalidRequest(format!("header '{name}': {e}")))?;
            headers.insert(name, value);
        }
        if let Some(token) = renewed_token {
            headers.insert(AUTHORIZATION, bearer(token)?);
        }

        let mut builder = self
            .inner
            .request(request.method.as_reqwest(), url)
            .headers(headers)
            .timeout(self.config.request_timeout());

        if request.method.carries_body() {
            if let Some(body) = &request.body {
                let payload = serde_json::to_vec(body)
                    .map_err(|e| ClientError::InvalidRequest(e.to_string()))?;
                builder = builder.body(payload);
            }
        }

        Ok(builder.send().await?)
    }

    /// Exchange the refresh token for a new access token and store it.
    /// Any failure clears the session.
    async fn refresh(&self, refresh_token: &str) -> Result<String, ClientError> {
        let outcome = async {
            let response = self
                .inner
                .get(self.refresh_url.clone())
                .bearer_auth(refresh_token)
                .timeout(self.config.request_timeout())
                .send()
                .await?;
            let status = response.status();
            if !status.is_success() {
                return Err(ClientError::Http {
                    status: status.as_u16(),
                    message: format!("refresh rejected with status {status}"),
                });
            }
            let body: RefreshResponse = response.json().await?;
            Ok(body.access_key)
        }
        .await;

        match outcome {
            Ok(access_token) => {
                if self.session.replace_access_token(&access_token)? {
                    tracing::info!("Access token refreshed");
                    Ok(access_token)
                } else {
                    tracing::warn!("Session was cleared while the refresh was in flight");
                    Err(ClientError::SessionExpired)
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Token refresh failed, clearing session");
                if let Err(clear_err) = self.session.clear() {
                    tracing::error!(error = %clear_err, "Failed to clear persisted session");
                }
                Err(ClientError::SessionExpired)
            }
        }
    }

    /// Open the live event stream at `path`. The returned response has a 2xx
    /// status; its body is the raw `text/event-stream`.
    #[cfg_attr(not(feature = "ingestors"), allow(dead_code))]
    pub(crate) async fn open_event_stream(
        &self,
        path: &str,
    ) -> Result<reqwest::Response, ClientError> {
        let url = self.config.endpoint(path)?;
        let mut builder = self
            .inner
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");
        if let Some(token) = self.session.access_token() {
            builder = builder.header(AUTHORIZATION, bearer(&token)?);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().await.unwrap_or_default();
            return Err(ClientError::Http {
                status: status.as_u16(),
                message: error_message(status.as_u16(), &body),
            });
        }
        Ok(response)
    }

    fn resolve(&self, request: &ApiRequest) -> Result<Url, ClientError> {
        let mut url = match Url::parse(&request.url) {
            Ok(absolute) => absolute,
            Err(url::ParseError::RelativeUrlWithoutBase) => self.config.endpoint(&request.url)?,
            Err(e) => return Err(e.into()),
        };
        if !request.params.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.params);
        }
        Ok(url)
    }
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("backend_url", &self.config.backend_url)
            .field("refresh_url", &self.refresh_url.as_str())
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

fn bearer(token: &str) -> Result<HeaderValue, ClientError> {
    let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
        .map_err(|e| ClientError::InvalidRequest(format!("authorization header: {e}")))?;
    value.set_sensitive(true);
    Ok(value)
}

/// Decode a 2xx body. An empty body decodes as JSON `null`, so `()` and
/// `Option<_>` targets accept `204 No Content`.
fn decode_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ClientError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return serde_json::from_value(Value::Null).map_err(|e| ClientError::Decode(e.to_string()));
    }
    serde_json::from_slice(body).map_err(|e| ClientError::Decode(e.to_string()))
}

/// Best human-readable message for a failed response.
pub(crate) fn error_message(status: u16, body: &[u8]) -> String {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|json| {
            ["message", "detail"].iter().find_map(|key| {
                json.get(key)
                    .and_then(Value::as_str)
                    .filter(|s| !s.trim().is_empty())
                    .map(str::to_string)
            })
        })
        .unwrap_or_else(|| format!("HTTP error! Status: {status}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempt_state_allows_a_single_replay() {
        assert_eq!(AttemptState::Initial.next(), Some(AttemptState::Retried));
        assert_eq!(AttemptState::Retried.next(), None);
    }

    #[test]
    fn only_write_verbs_carry_a_body() {
        assert!(HttpMethod::Post.carries_body());
        assert!(HttpMethod::Patch.carries_body());
        assert!(!HttpMethod::Get.carries_body());
        assert!(!HttpMethod::Delete.carries_body());
        assert_eq!("put".parse::<HttpMethod>().unwrap(), HttpMethod::Put);
        assert!("HEAD".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn error_message_prefers_message_then_detail() {
        assert_eq!(error_message(400, br#"{"message": "bad input"}"#), "bad input");
        assert_eq!(error_message(404, br#"{"detail": "User not found"}"#), "User not found");
        assert_eq!(error_message(500, b"<html>oops</html>"), "HTTP error! Status: 500");
        assert_eq!(error_message(502, br#"{"message": ""}"#), "HTTP error! Status: 502");
    }

    #[test]
    fn empty_body_decodes_as_null() {
        let unit: () = decode_body(b"").unwrap();
        assert_eq!(unit, ());
        let value: Value = decode_body(b"  ").unwrap();
        assert_eq!(value, Value::Null);
        assert!(matches!(
            decode_body::<Vec<u8>>(b"{}"),
            Err(ClientError::Decode(_))
        ));
    }

    #[test]
    fn relative_urls_resolve_against_backend_with_params() {
        let config = ClientConfig::for_backend("http://backend.test/api").unwrap();
        let client = ApiClient::new(config, Arc::new(SessionService::in_memory())).unwrap();

        let request = ApiRequest::get("/profile").query("user", "alice smith");
        assert_eq!(
            client.resolve(&request).unwrap().as_str(),
            "http://backend.test/api/profile?user=alice+smith"
        );

        let absolute = ApiRequest::get("https://elsewhere.test/x");
        assert_eq!(
            client.resolve(&absolute).unwrap().as_str(),
            "https://elsewhere.test/x"
        );
    }

    #[test]
    fn failures_keep_status_only_when_http_related() {
        let http: ApiResponse<()> = ApiResponse::failed(&ClientError::Http {
            status: 404,
            message: "missing".into(),
        });
        assert_eq!(http.status, Some(404));
        assert_eq!(http.error.as_deref(), Some("missing"));

        let transport: ApiResponse<()> =
            ApiResponse::failed(&ClientError::Transport("connection refused".into()));
        assert!(!transport.success);
        assert_eq!(transport.status, None);
    }
}
