//! REST requests.

use bytes::Bytes;
use conduit_http_client::{HeaderMap, HttpClient, Method, StatusCode};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::{ApiError, Result};

/// Methods a REST operation may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Head,
    Delete,
    Put,
    Post,
    Patch,
}

impl HttpMethod {
    /// Whether requests with this method may carry a body.
    pub fn allows_body(&self) -> bool {
        matches!(self, Self::Put | Self::Post | Self::Patch)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Delete => "DELETE",
            Self::Put => "PUT",
            Self::Post => "POST",
            Self::Patch => "PATCH",
        }
    }

    fn to_method(self) -> Method {
        match self {
            Self::Get => Method::GET,
            Self::Head => Method::HEAD,
            Self::Delete => Method::DELETE,
            Self::Put => Method::PUT,
            Self::Post => Method::POST,
            Self::Patch => Method::PATCH,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "HEAD" => Ok(Self::Head),
            "DELETE" => Ok(Self::Delete),
            "PUT" => Ok(Self::Put),
            "POST" => Ok(Self::Post),
            "PATCH" => Ok(Self::Patch),
            _ => Err(ApiError::RequestShape(format!(
                "Unknown REST operation type: {}",
                s
            ))),
        }
    }
}

/// Caller-supplied parts of a REST request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RestOptions {
    pub path: String,
    pub data: Option<Bytes>,
    pub query_parameters: BTreeMap<String, String>,
    pub headers: BTreeMap<String, String>,
}

impl RestOptions {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn with_query_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_parameters.insert(name.into(), value.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// A validated REST request.
#[derive(Debug, Clone, PartialEq)]
pub struct RestRequest {
    method: HttpMethod,
    options: RestOptions,
}

impl RestRequest {
    /// Validate `options` for `method`.
    ///
    /// GET, HEAD and DELETE requests cannot carry a body.
    pub fn new(method: HttpMethod, options: RestOptions) -> Result<Self> {
        if options.data.is_some() && !method.allows_body() {
            return Err(ApiError::RequestShape(format!(
                "HTTP method does not support data object! {}",
                method
            )));
        }
        Ok(Self { method, options })
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.options.path
    }

    pub fn data(&self) -> Option<&Bytes> {
        self.options.data.as_ref()
    }

    pub fn query_parameters(&self) -> &BTreeMap<String, String> {
        &self.options.query_parameters
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.options.headers
    }

    /// Endpoint joined with the request path, without query parameters.
    pub fn url(&self, endpoint: &str) -> String {
        let endpoint = endpoint.trim_end_matches('/');
        let path = self.options.path.as_str();
        if path.is_empty() {
            endpoint.to_string()
        } else if path.starts_with('/') {
            format!("{}{}", endpoint, path)
        } else {
            format!("{}/{}", endpoint, path)
        }
    }

    pub(crate) async fn execute(&self, client: &HttpClient, endpoint: &str) -> Result<RestResponse> {
        let mut builder = client
            .request(self.method.to_method(), self.url(endpoint))
            .queries(&self.options.query_parameters);

        for (name, value) in &self.options.headers {
            builder = builder.header(name, value);
        }
        if let Some(data) = &self.options.data {
            builder = builder.body(data.clone());
        }

        let (status, headers, body) = builder.send().await?.into_parts();
        if !status.is_success() {
            return Err(ApiError::Http {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        Ok(RestResponse {
            status,
            headers,
            body,
        })
    }
}

/// A successful REST response.
#[derive(Debug, Clone)]
pub struct RestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RestResponse {
    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.to_vec()).map_err(|e| ApiError::Protocol(e.to_string()))
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bodyless_methods_reject_data() {
        for method in [HttpMethod::Get, HttpMethod::Head, HttpMethod::Delete] {
            let err = RestRequest::new(method, RestOptions::new("/items").with_data("x")).unwrap_err();
            assert!(err.is_request_shape());
            assert_eq!(
                err.to_string(),
                format!("HTTP method does not support data object! {}", method)
            );
        }
    }

    #[test]
    fn test_body_methods_accept_data() {
        for method in [HttpMethod::Put, HttpMethod::Post, HttpMethod::Patch] {
            let request = RestRequest::new(method, RestOptions::new("/items").with_data("x")).unwrap();
            assert_eq!(request.data(), Some(&Bytes::from_static(b"x")));
        }
        assert!(RestRequest::new(HttpMethod::Get, RestOptions::new("/items")).is_ok());
    }

    #[test]
    fn test_unknown_method() {
        assert_eq!("patch".parse::<HttpMethod>().unwrap(), HttpMethod::Patch);
        let err = "OPTIONS".parse::<HttpMethod>().unwrap_err();
        assert_eq!(err.to_string(), "Unknown REST operation type: OPTIONS");
    }

    #[test]
    fn test_url_joining() {
        let request = RestRequest::new(HttpMethod::Get, RestOptions::new("items/1")).unwrap();
        assert_eq!(request.url("https://api.example.com/"), "https://api.example.com/items/1");

        let request = RestRequest::new(HttpMethod::Get, RestOptions::new("/items")).unwrap();
        assert_eq!(request.url("https://api.example.com/prod"), "https://api.example.com/prod/items");

        let request = RestRequest::new(HttpMethod::Get, RestOptions::default()).unwrap();
        assert_eq!(request.url("https://api.example.com/"), "https://api.example.com");
    }

    #[test]
    fn test_response_helpers() {
        let response = RestResponse {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::from_static(br#"{"ok":true}"#),
        };
        assert_eq!(response.text().unwrap(), r#"{"ok":true}"#);
        let value: serde_json::Value = response.json().unwrap();
        assert_eq!(value["ok"], true);
    }
}
