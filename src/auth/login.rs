use std::fmt;

use bon::Builder;
use reqwest::Method;
use serde_json::json;
use tracing::{debug, info};

use super::manager::TokenManager;
use super::token::{ProviderTokenResponse, Token};
use super::user::{UserInfo, UserStore};
use crate::error::{Result, SdkError};
use crate::http::{ApiClient, ApiRequest};

const LOGIN_PATH: &str = "login";

/// Password-grant credentials.
#[derive(Clone, Builder)]
pub struct LoginRequest {
    #[builder(into)]
    pub username: String,
    #[builder(into)]
    pub password: String,
    /// Token options understood by the platform, e.g. `"sliding"`.
    #[builder(into)]
    pub options: Option<String>,
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("options", &self.options)
            .finish()
    }
}

/// Obtains and releases platform tokens.
///
/// Successful logins go through [`TokenManager::store`], so other contexts
/// observe them as `tokenUpdated`.
#[derive(Debug, Clone)]
pub struct LoginClient {
    api: ApiClient,
    users: UserStore,
}

impl LoginClient {
    pub fn new(api: ApiClient, users: UserStore) -> Self {
        Self { api, users }
    }

    fn tokens(&self) -> &TokenManager {
        self.api.tokens()
    }

    pub async fn login(&self, request: LoginRequest) -> Result<Token> {
        if request.username.is_empty() {
            return Err(SdkError::InvalidArgument("username is required".to_string()));
        }
        let mut url = self.api.endpoint(LOGIN_PATH)?;
        if let Some(options) = request.options.as_deref().filter(|o| !o.is_empty()) {
            url.query_pairs_mut().append_pair("options", options);
        }
        let form = [
            ("grant_type", "password".to_string()),
            ("username", request.username.clone()),
            ("password", request.password),
        ];

        debug!(username = %request.username, "Logging in");
        let response: ProviderTokenResponse = self
            .api
            .send_json(ApiRequest::new(Method::POST, url).with_form(form))
            .await
            .map_err(|err| match err {
                SdkError::Api {
                    status: 400,
                    message,
                    ..
                } => SdkError::Authentication(message),
                other => other,
            })?;

        let token = Token::from_provider_response(response);
        self.tokens().store(Some(token));
        // `store` derives the deadline; hand back what was persisted.
        let stored = self.tokens().get().ok_or_else(|| {
            SdkError::Authentication("platform issued an already expired token".to_string())
        })?;
        info!(username = %request.username, "Logged in");
        Ok(stored)
    }

    /// Fetch the authenticated user and cache it.
    pub async fn load_user(&self, embed: Option<&str>) -> Result<UserInfo> {
        if !self.tokens().is_authenticated() {
            return Err(SdkError::InvalidState("not logged in".to_string()));
        }
        let mut url = self.api.endpoint(LOGIN_PATH)?;
        if let Some(embed) = embed.filter(|e| !e.is_empty()) {
            url.query_pairs_mut().append_pair("embed", embed);
        }
        let user: UserInfo = self.api.get(url).await?;
        self.users.set(Some(user.clone()));
        Ok(user)
    }

    /// Cached user info, if any.
    pub fn user(&self) -> Option<UserInfo> {
        self.users.get()
    }

    /// Revoke the current token. Local state is cleared even when the
    /// request fails; the request error is still returned.
    pub async fn logout(&self) -> Result<()> {
        let result = match self.tokens().get() {
            Some(token) => self.revoke(&token).await,
            None => Ok(()),
        };
        self.tokens().store(None);
        self.users.clear();
        if let Err(err) = &result {
            debug!(error = %err, "Logout request failed; local session cleared");
        }
        result
    }

    async fn revoke(&self, token: &Token) -> Result<()> {
        let url = self.api.endpoint(LOGIN_PATH)?;
        let body = json!({ "token": token.token, "type": token.token_type });
        self.api.delete(url, Some(&body)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_password() {
        let request = LoginRequest::builder()
            .username("ana")
            .password("hunter2")
            .options("sliding")
            .build();
        let rendered = format!("{request:?}");
        assert!(rendered.contains("ana"));
        assert!(!rendered.contains("hunter2"));
    }
}
