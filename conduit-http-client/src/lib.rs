//! # Conduit HTTP Client
//!
//! The transport used by every configured API: a pooled `reqwest` client
//! plus an ordered chain of request interceptors that apply the API's
//! authorization scheme.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use conduit_http_client::{AuthInterceptor, HttpClient, HttpClientConfig, StaticToken};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = HttpClient::new(HttpClientConfig::default())?
//!         .with_interceptor(Arc::new(AuthInterceptor::api_key(Arc::new(
//!             StaticToken("da2-example".into()),
//!         ))));
//!
//!     let response = client
//!         .get("https://api.example.com/items")
//!         .query("limit", "10")
//!         .send()
//!         .await?;
//!
//!     println!("Status: {}", response.status());
//!     Ok(())
//! }
//! ```

mod client;
mod config;
mod error;
mod interceptor;
mod request;
mod response;

pub use client::HttpClient;
pub use config::{HttpClientConfig, HttpClientConfigBuilder};
pub use error::{HttpClientError, Result};
pub use interceptor::{API_KEY_HEADER, AuthInterceptor, RequestInterceptor, StaticToken, TokenProvider};
pub use request::RequestBuilder;
pub use response::Response;

// Re-export common types
pub use bytes::Bytes;
pub use http::{HeaderMap, HeaderValue, Method, StatusCode, header};
pub use url::Url;
