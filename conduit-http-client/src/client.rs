//! HTTP client implementation.

use http::Method;
use reqwest::Request;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

use crate::{HttpClientConfig, RequestBuilder, RequestInterceptor, Response, Result};

/// HTTP transport client for one configured API.
///
/// Cheap to clone; clones share the connection pool and interceptor chain.
#[derive(Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
    config: Arc<HttpClientConfig>,
    interceptors: Vec<Arc<dyn RequestInterceptor>>,
}

impl HttpClient {
    /// Create a new HTTP client with the given configuration.
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let redirect = if config.max_redirects == 0 {
            reqwest::redirect::Policy::none()
        } else {
            reqwest::redirect::Policy::limited(config.max_redirects)
        };

        let inner = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .user_agent(&config.user_agent)
            .gzip(config.compression)
            .brotli(config.compression)
            .redirect(redirect)
            .build()?;

        Ok(Self {
            inner,
            config: Arc::new(config),
            interceptors: Vec::new(),
        })
    }

    /// Append an interceptor to the chain.
    pub fn with_interceptor(mut self, interceptor: Arc<dyn RequestInterceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Get the underlying reqwest client.
    pub fn inner(&self) -> &reqwest::Client {
        &self.inner
    }

    /// Get the client configuration.
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Number of interceptors applied to each request.
    pub fn interceptor_count(&self) -> usize {
        self.interceptors.len()
    }

    /// Create a GET request builder.
    pub fn get(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::GET, url)
    }

    /// Create a POST request builder.
    pub fn post(&self, url: impl Into<String>) -> RequestBuilder<'_> {
        self.request(Method::POST, url)
    }

    /// Create a request builder with a custom method.
    pub fn request(&self, method: Method, url: impl Into<String>) -> RequestBuilder<'_> {
        RequestBuilder::new(self, method, url.into())
    }

    /// Run the interceptor chain over a request without sending it.
    ///
    /// Used to derive authorization headers for non-HTTP handshakes.
    pub async fn intercept(&self, mut request: Request) -> Result<Request> {
        for interceptor in &self.interceptors {
            request = interceptor.intercept(request).await?;
        }
        Ok(request)
    }

    /// Intercept and send a request.
    ///
    /// Dropping the returned future aborts the in-flight call.
    pub async fn execute(&self, request: Request) -> Result<Response> {
        let request = self.intercept(request).await?;

        debug!(
            method = %request.method(),
            url = %request.url(),
            "Sending HTTP request"
        );

        let response = self.inner.execute(request).await?;
        let response = Response::from_reqwest(response).await?;

        debug!(status = %response.status(), "Received HTTP response");
        Ok(response)
    }
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("interceptors", &self.interceptors.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AuthInterceptor, StaticToken};
    use std::time::Duration;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_client_with_config() {
        let config = HttpClientConfig::builder()
            .timeout(Duration::from_secs(60))
            .max_redirects(0)
            .build();

        let client = HttpClient::new(config).unwrap();
        assert_eq!(client.config().timeout, Duration::from_secs(60));
        assert_eq!(client.interceptor_count(), 0);
    }

    #[tokio::test]
    async fn test_send_applies_interceptors_and_defaults() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/items"))
            .and(query_param("limit", "5"))
            .and(header("x-api-key", "da2-key"))
            .and(header("x-trace", "on"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .expect(1)
            .mount(&server)
            .await;

        let config = HttpClientConfig::builder().default_header("x-trace", "on").build();
        let client = HttpClient::new(config)
            .unwrap()
            .with_interceptor(Arc::new(AuthInterceptor::api_key(Arc::new(StaticToken(
                "da2-key".into(),
            )))));

        let response = client
            .get(format!("{}/items", server.uri()))
            .query("limit", "5")
            .send()
            .await
            .unwrap();

        assert!(response.is_success());
        assert_eq!(response.text().unwrap(), "[]");
    }

    #[tokio::test]
    async fn test_invalid_header_reported_on_send() {
        let client = HttpClient::new(HttpClientConfig::default()).unwrap();
        let result = client
            .post("http://localhost/graphql")
            .header("bad header", "value")
            .send()
            .await;

        assert!(result.unwrap_err().is_request_error());
    }

    #[tokio::test]
    async fn test_slow_response_is_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let client = HttpClient::new(HttpClientConfig::default()).unwrap();
        let err = client
            .get(server.uri())
            .timeout(Duration::from_millis(50))
            .send()
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert!(!err.is_connection());
    }

    #[tokio::test]
    async fn test_refused_connection_is_connection_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = HttpClient::new(HttpClientConfig::default()).unwrap();
        let err = client.get(format!("http://{}/", addr)).send().await.unwrap_err();

        assert!(err.is_connection());
        assert!(!err.is_timeout());
    }
}
