//! Session token handshake.

use std::fmt;

use tracing::{info, instrument, warn};
use url::Url;

use super::client::PortalClient;
use super::error::PortalError;
use super::markup::extract_token;

/// Short-lived token the search endpoint requires on every POST.
///
/// Scoped to one run; its expiry is unknown to the client.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    /// Wraps a raw token value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Raw token value for form submission.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Tokens stay out of logs.
impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionToken(<{} chars>)", self.0.len())
    }
}

/// Obtains a [`SessionToken`] from the search landing page.
#[derive(Debug, Clone)]
pub struct SessionResolver {
    client: PortalClient,
    token_field: String,
}

impl SessionResolver {
    /// Resolver reading the hidden input named `token_field`.
    #[must_use]
    pub fn new(client: PortalClient, token_field: impl Into<String>) -> Self {
        Self {
            client,
            token_field: token_field.into(),
        }
    }

    /// Issues one GET to `landing_url` and extracts the token.
    ///
    /// Not retried: a missing token is a structural change, not a transient fault.
    ///
    /// # Errors
    ///
    /// Returns [`PortalError::AuthTokenMissing`] when the request fails or the
    /// page has no token field.
    #[instrument(skip(self), fields(url = %landing_url))]
    pub async fn resolve(&self, landing_url: &Url) -> Result<SessionToken, PortalError> {
        let html = self.client.get_once(landing_url).await.map_err(|e| {
            warn!(error = %e, "landing page request failed");
            PortalError::token_request_failed(landing_url.as_str(), e)
        })?;

        let token = extract_token(&html, &self.token_field)
            .ok_or_else(|| PortalError::token_field_absent(landing_url.as_str(), &self.token_field))?;
        info!(field = %self.token_field, "session token obtained");
        Ok(SessionToken::new(token))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use crate::download::{RateLimiter, RetryPolicy};
    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    fn resolver() -> SessionResolver {
        let client =
            PortalClient::new(RetryPolicy::default(), Arc::new(RateLimiter::disabled())).unwrap();
        SessionResolver::new(client, "p_auth")
    }

    #[test]
    fn test_session_token_debug_hides_value() {
        let token = SessionToken::new("secret-value");
        let shown = format!("{token:?}");
        assert!(!shown.contains("secret-value"));
        assert_eq!(token.as_str(), "secret-value");
    }

    #[tokio::test]
    async fn test_resolve_extracts_token() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/pubcris"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<form><input type="hidden" name="p_auth" value="Xy9"></form>"#,
            ))
            .mount(&mock_server)
            .await;

        let url = Url::parse(&format!("{}/pubcris", mock_server.uri())).unwrap();
        let token = resolver().resolve(&url).await.unwrap();
        assert_eq!(token.as_str(), "Xy9");
    }

    #[tokio::test]
    async fn test_resolve_missing_field_is_auth_token_missing() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/pubcris"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&mock_server)
            .await;

        let url = Url::parse(&format!("{}/pubcris", mock_server.uri())).unwrap();
        let err = resolver().resolve(&url).await.unwrap_err();
        assert!(matches!(err, PortalError::AuthTokenMissing { source: None, .. }));
    }

    #[tokio::test]
    async fn test_resolve_server_error_is_not_retried() {
        let Some(mock_server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/pubcris"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&mock_server)
            .await;

        let url = Url::parse(&format!("{}/pubcris", mock_server.uri())).unwrap();
        let err = resolver().resolve(&url).await.unwrap_err();
        assert!(matches!(err, PortalError::AuthTokenMissing { source: Some(_), .. }));
    }
}
