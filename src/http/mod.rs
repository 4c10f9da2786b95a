//! HTTP abstraction: request/response types, the transport seam, and the
//! token-aware [`ApiClient`].

pub mod client;
pub mod transport;

pub use client::ApiClient;
pub use transport::ReqwestTransport;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;

use crate::error::{ErrorDetails, Result, SdkError};

/// Body of an outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(serde_json::Value),
    Form(Vec<(String, String)>),
}

/// A fully-expanded request handed to an [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<RequestBody>,
}

impl ApiRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn with_json(mut self, body: serde_json::Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    pub fn with_form<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.body = Some(RequestBody::Form(
            pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        ));
        self
    }
}

/// Response as seen by SDK code, with the body read to a string.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Sends requests on behalf of the SDK.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse>;
}

/// `Authorization` header value for a raw header string.
pub fn authorization_header(value: &str) -> Option<(reqwest::header::HeaderName, HeaderValue)> {
    HeaderValue::from_str(value)
        .ok()
        .map(|header| (AUTHORIZATION, header))
}

/// Map a non-success status and body to an error.
pub fn status_to_error(status: u16, body: &str) -> SdkError {
    let details = ErrorDetails::parse(body);
    let message = details
        .as_ref()
        .and_then(ErrorDetails::summary)
        .map(str::to_string)
        .unwrap_or_else(|| body.to_string());
    match (status, details) {
        (401 | 403, _) => SdkError::Authentication(message),
        (_, Some(details)) => SdkError::api_with_details(status, message, details),
        (_, None) => SdkError::api(status, message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_maps_to_authentication() {
        let err = status_to_error(401, r#"{"message":"Token expired"}"#);
        assert!(matches!(err, SdkError::Authentication(ref m) if m == "Token expired"));
    }

    #[test]
    fn api_errors_keep_platform_details() {
        let err = status_to_error(400, r#"{"error":"invalid_grant","errorCode":7}"#);
        match err {
            SdkError::Api {
                status,
                message,
                details,
            } => {
                assert_eq!(status, 400);
                assert_eq!(message, "invalid_grant");
                assert_eq!(details.unwrap().error_code, Some(7));
            }
            other => panic!("expected Api, got {other:?}"),
        }
    }

    #[test]
    fn plain_bodies_become_messages() {
        let err = status_to_error(500, "boom");
        assert!(matches!(err, SdkError::Api { status: 500, ref message, details: None } if message == "boom"));
    }

    #[test]
    fn form_pairs_are_owned() {
        let request = ApiRequest::new(Method::POST, Url::parse("https://api.example.com/").unwrap())
            .with_form([("grant_type", "password")]);
        assert_eq!(
            request.body,
            Some(RequestBody::Form(vec![(
                "grant_type".to_string(),
                "password".to_string()
            )]))
        );
    }
}
