use std::sync::Arc;

use reqwest::header::AUTHORIZATION;
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use super::{authorization_header, status_to_error, ApiRequest, ApiResponse, HttpTransport};
use crate::auth::TokenManager;
use crate::error::{Result, SdkError};

/// Sends platform requests with the current bearer token attached.
///
/// A 401 response to a request that carried a token clears that token, which
/// fires `tokenExpired` locally and in other contexts. A token stored while
/// the request was in flight is kept.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn HttpTransport>,
    tokens: TokenManager,
    base_url: Url,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .finish()
    }
}

impl ApiClient {
    pub fn new(transport: Arc<dyn HttpTransport>, tokens: TokenManager, base_url: Url) -> Self {
        Self {
            transport,
            tokens,
            base_url,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    /// Resolve `path` against the application base URL.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| SdkError::InvalidArgument(format!("invalid endpoint {path}: {err}")))
    }

    /// Send a request, failing on non-success statuses.
    pub async fn send(&self, mut request: ApiRequest) -> Result<ApiResponse> {
        let mut sent: Option<String> = None;
        if !request.headers.contains_key(AUTHORIZATION) {
            if let Some(token) = self.tokens.get() {
                if let Some((name, value)) = authorization_header(&token.authorization_header()) {
                    request.headers.insert(name, value);
                    sent = Some(token.token);
                }
            }
        }

        debug!(method = %request.method, url = %request.url, authorized = sent.is_some(), "Sending request");
        let response = self.transport.send(request).await?;

        if response.status == 401 {
            if let Some(sent) = sent {
                self.reject_token(&sent);
            }
        }
        if !response.is_success() {
            return Err(status_to_error(response.status, &response.body));
        }
        Ok(response)
    }

    /// Clear the token a 401 was issued for, unless it has been replaced
    /// while the request was in flight.
    fn reject_token(&self, sent: &str) {
        match self.tokens.get() {
            Some(current) if current.token == sent => {
                debug!("Request rejected with 401; clearing token");
                self.tokens.store(None);
            }
            _ => debug!("Request rejected with 401; token already replaced or cleared"),
        }
    }

    /// Send a request and decode the JSON response body.
    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        self.send(request).await?.json()
    }

    pub async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        self.send_json(ApiRequest::new(Method::GET, url)).await
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, url: Url, body: &B) -> Result<T> {
        let request = ApiRequest::new(Method::POST, url).with_json(serde_json::to_value(body)?);
        self.send_json(request).await
    }

    pub async fn put_json<B: Serialize + ?Sized, T: DeserializeOwned>(&self, url: Url, body: &B) -> Result<T> {
        let request = ApiRequest::new(Method::PUT, url).with_json(serde_json::to_value(body)?);
        self.send_json(request).await
    }

    /// PUT; the response body is ignored.
    pub async fn put<B: Serialize + ?Sized>(&self, url: Url, body: &B) -> Result<()> {
        let request = ApiRequest::new(Method::PUT, url).with_json(serde_json::to_value(body)?);
        self.send(request).await?;
        Ok(())
    }

    /// DELETE with an optional JSON body; the response body is ignored.
    pub async fn delete<B: Serialize + ?Sized>(&self, url: Url, body: Option<&B>) -> Result<()> {
        let mut request = ApiRequest::new(Method::DELETE, url);
        if let Some(body) = body {
            request = request.with_json(serde_json::to_value(body)?);
        }
        self.send(request).await?;
        Ok(())
    }
}
