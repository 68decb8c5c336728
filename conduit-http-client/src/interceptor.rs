//! Request interceptors applying an API's authorization scheme.

use crate::{HttpClientError, Result};
use async_trait::async_trait;
use http::header::{AUTHORIZATION, HeaderName, HeaderValue};
use reqwest::Request;
use std::sync::Arc;

/// Header carrying API keys.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Interceptor invoked on every outbound request before it is sent.
///
/// Signing schemes (for example SigV4) plug in here; the client only
/// guarantees interceptors run in registration order.
#[async_trait]
pub trait RequestInterceptor: Send + Sync {
    /// Intercept and optionally modify the request.
    async fn intercept(&self, request: Request) -> Result<Request>;
}

/// Supplies a credential on demand (API key, user pool token, OIDC token, ...).
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Return the current credential value.
    async fn token(&self) -> Result<String>;
}

/// A credential that never changes.
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Interceptor that writes a provider's credential into a header.
pub struct AuthInterceptor {
    header: HeaderName,
    provider: Arc<dyn TokenProvider>,
}

impl AuthInterceptor {
    /// Send the credential in the `x-api-key` header.
    pub fn api_key(provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            header: HeaderName::from_static(API_KEY_HEADER),
            provider,
        }
    }

    /// Send the credential as the raw `Authorization` header value.
    pub fn authorization(provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            header: AUTHORIZATION,
            provider,
        }
    }

    /// Header this interceptor writes.
    pub fn header(&self) -> &HeaderName {
        &self.header
    }
}

#[async_trait]
impl RequestInterceptor for AuthInterceptor {
    async fn intercept(&self, mut request: Request) -> Result<Request> {
        let token = self.provider.token().await?;
        let mut value = HeaderValue::from_str(&token)
            .map_err(|e| HttpClientError::Interceptor(format!("invalid {} value: {}", self.header, e)))?;
        value.set_sensitive(true);

        request.headers_mut().insert(self.header.clone(), value);
        Ok(request)
    }
}
