use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    domain::UserId,
    error::{ApiError, ErrorCode},
};
use url::Url;

use crate::error::ControllerError;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Base URL, HTTP client and acting user shared by the list and item clients.
#[derive(Clone)]
pub struct HttpTransport {
    http: Client,
    base_url: Url,
    user_id: UserId,
}

impl HttpTransport {
    pub fn new(server_url: &str, user_id: UserId) -> Result<Self, ControllerError> {
        let http = Client::builder()
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(ControllerError::from)?;
        Self::with_client(http, server_url, user_id)
    }

    pub fn with_client(
        http: Client,
        server_url: &str,
        user_id: UserId,
    ) -> Result<Self, ControllerError> {
        let base_url = parse_server_url(server_url)?;
        Ok(Self {
            http,
            base_url,
            user_id,
        })
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn with_user(&self, user_id: UserId) -> Self {
        Self {
            user_id,
            ..self.clone()
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Joins percent-encoded `segments` onto the base URL.
    pub fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Builds a request carrying the acting user.
    pub fn request(&self, method: reqwest::Method, segments: &[&str]) -> RequestBuilder {
        self.http
            .request(method, self.endpoint(segments))
            .query(&[("user_id", self.user_id.0)])
    }

    pub fn unauthenticated(&self, method: reqwest::Method, segments: &[&str]) -> RequestBuilder {
        self.http.request(method, self.endpoint(segments))
    }
}

fn parse_server_url(server_url: &str) -> Result<Url, ControllerError> {
    let url = Url::parse(server_url.trim())
        .map_err(|e| ControllerError::Validation(format!("invalid server url '{server_url}': {e}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
        return Err(ControllerError::Validation(format!(
            "server url must be http(s): '{server_url}'"
        )));
    }
    Ok(url)
}

pub(crate) async fn send(request: RequestBuilder) -> Result<Response, ControllerError> {
    let response = request.send().await?;
    check_status(response).await
}

pub(crate) async fn send_json<T: DeserializeOwned>(
    request: RequestBuilder,
) -> Result<T, ControllerError> {
    let response = send(request).await?;
    Ok(response.json::<T>().await?)
}

/// Turns a non-2xx response into `RemoteRejected`, preferring the server's
/// `ApiError` body.
pub(crate) async fn check_status(response: Response) -> Result<Response, ControllerError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.bytes().await.unwrap_or_default();
    let err = serde_json::from_slice::<ApiError>(&body).unwrap_or_else(|_| {
        ApiError::new(code_for_status(status), format!("HTTP {}", status.as_u16()))
    });
    Err(err.into())
}

fn code_for_status(status: StatusCode) -> ErrorCode {
    match status {
        StatusCode::UNAUTHORIZED => ErrorCode::Unauthorized,
        StatusCode::FORBIDDEN => ErrorCode::Forbidden,
        StatusCode::NOT_FOUND => ErrorCode::NotFound,
        StatusCode::BAD_REQUEST | StatusCode::PAYLOAD_TOO_LARGE => ErrorCode::Validation,
        StatusCode::CONFLICT => ErrorCode::Conflict,
        StatusCode::TOO_MANY_REQUESTS => ErrorCode::RateLimited,
        _ => ErrorCode::Internal,
    }
}
