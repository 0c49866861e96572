use thiserror::Error;

use gdrive_core::OAuthClient;

use crate::storage::OAuthState;

#[derive(Debug, Error)]
pub enum TokenProviderError {
    #[error("oauth client is required to refresh expired token")]
    MissingOAuthClient,
    #[error("refresh token is missing")]
    MissingRefreshToken,
    #[error("oauth refresh failed: {0}")]
    OAuth(#[from] gdrive_core::OAuthError),
}

/// The run's authentication handle. Acquired once before any remote call and
/// passed into the client; there is no ambient session state.
pub struct TokenProvider {
    state: OAuthState,
    oauth_client: Option<OAuthClient>,
    refresh_skew_secs: i64,
}

impl TokenProvider {
    pub fn new(state: OAuthState, oauth_client: Option<OAuthClient>) -> Self {
        Self {
            state,
            oauth_client,
            refresh_skew_secs: 60,
        }
    }

    pub async fn valid_access_token(&mut self) -> Result<String, TokenProviderError> {
        if self.should_refresh() {
            self.refresh().await?;
        }
        Ok(self.state.access_token.clone())
    }

    pub fn state(&self) -> &OAuthState {
        &self.state
    }

    fn should_refresh(&self) -> bool {
        let Some(expires_at) = self.state.expires_at else {
            return false;
        };
        expires_at <= now_unix().saturating_add(self.refresh_skew_secs)
    }

    async fn refresh(&mut self) -> Result<(), TokenProviderError> {
        let refresh_token = self
            .state
            .refresh_token
            .clone()
            .ok_or(TokenProviderError::MissingRefreshToken)?;
        let client = self
            .oauth_client
            .as_ref()
            .ok_or(TokenProviderError::MissingOAuthClient)?;
        let token = client.refresh_token(&refresh_token).await?;
        let mut refreshed = OAuthState::from_token(&token);
        // Google omits the refresh token and scope on refresh responses.
        if refreshed.refresh_token.is_none() {
            refreshed.refresh_token = Some(refresh_token);
        }
        if refreshed.scope.is_none() {
            refreshed.scope = self.state.scope.clone();
        }
        self.state = refreshed;
        Ok(())
    }
}

fn now_unix() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn state(access: &str, refresh: Option<&str>, expires_at: Option<i64>) -> OAuthState {
        OAuthState {
            access_token: access.into(),
            refresh_token: refresh.map(str::to_string),
            expires_at,
            scope: Some("https://www.googleapis.com/auth/drive".into()),
            token_type: Some("Bearer".into()),
        }
    }

    #[tokio::test]
    async fn returns_current_token_when_not_expired() {
        let mut provider = TokenProvider::new(state("token-1", Some("refresh-1"), Some(i64::MAX)), None);

        let token = provider
            .valid_access_token()
            .await
            .expect("token should be valid");
        assert_eq!(token, "token-1");
    }

    #[tokio::test]
    async fn refreshes_token_when_expired() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=refresh_token"))
            .and(body_string_contains("refresh_token=refresh-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "token-2",
                "token_type": "Bearer",
                "expires_in": 3599
            })))
            .mount(&server)
            .await;
        let oauth_client = OAuthClient::with_base_url(&server.uri(), "client-1", "secret-1")
            .expect("oauth client should be built");
        let mut provider =
            TokenProvider::new(state("token-1", Some("refresh-1"), Some(0)), Some(oauth_client));

        let token = provider
            .valid_access_token()
            .await
            .expect("token should refresh");
        assert_eq!(token, "token-2");
        // The refresh token is carried over when the response omits it.
        assert_eq!(provider.state().refresh_token.as_deref(), Some("refresh-1"));
        assert!(provider.state().expires_at.unwrap() > now_unix());
    }

    #[tokio::test]
    async fn returns_error_when_expired_and_no_refresh_token() {
        let mut provider = TokenProvider::new(state("token-1", None, Some(0)), None);

        let err = provider
            .valid_access_token()
            .await
            .expect_err("expected missing refresh token error");
        assert!(matches!(err, TokenProviderError::MissingRefreshToken));
    }

    #[tokio::test]
    async fn returns_error_when_expired_without_oauth_client() {
        let mut provider = TokenProvider::new(state("token-1", Some("refresh-1"), Some(0)), None);

        let err = provider
            .valid_access_token()
            .await
            .expect_err("expected missing client error");
        assert!(matches!(err, TokenProviderError::MissingOAuthClient));
    }
}
