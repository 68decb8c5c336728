//! Typed GraphQL requests and response decoding.

use conduit_graphql_client::{GraphQLResponse, RequestDocument};
use conduit_http_client::HttpClient;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;

use crate::{ApiError, Result};

/// Shape of the result a GraphQL request expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// One item.
    Single,
    /// One collection, delivered at once.
    Array,
    /// A stream of items from a subscription.
    Stream,
}

/// An immutable GraphQL request decoding its results as `R`.
pub struct GraphQLRequest<R> {
    document: RequestDocument,
    shape: ResponseShape,
    _response: PhantomData<fn() -> R>,
}

impl<R> GraphQLRequest<R> {
    pub fn new(document: RequestDocument, shape: ResponseShape) -> Self {
        Self {
            document,
            shape,
            _response: PhantomData,
        }
    }

    /// A query or mutation returning one item.
    pub fn single(query: impl Into<String>) -> Self {
        Self::new(RequestDocument::new(query), ResponseShape::Single)
    }

    /// A query returning a collection.
    pub fn array(query: impl Into<String>) -> Self {
        Self::new(RequestDocument::new(query), ResponseShape::Array)
    }

    /// A subscription.
    pub fn stream(query: impl Into<String>) -> Self {
        Self::new(RequestDocument::new(query), ResponseShape::Stream)
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: Value) -> Self {
        self.document = self.document.with_variable(name, value);
        self
    }

    pub fn with_variables(mut self, variables: Value) -> Self {
        self.document = self.document.with_variables(variables);
        self
    }

    pub fn with_operation_name(mut self, name: impl Into<String>) -> Self {
        self.document = self.document.with_operation_name(name);
        self
    }

    pub fn document(&self) -> &RequestDocument {
        &self.document
    }

    pub fn shape(&self) -> ResponseShape {
        self.shape
    }

    pub fn query(&self) -> &str {
        &self.document.query
    }

    pub fn variables(&self) -> Option<&Value> {
        self.document.variables.as_ref()
    }
}

impl<R> Clone for GraphQLRequest<R> {
    fn clone(&self) -> Self {
        Self::new(self.document.clone(), self.shape)
    }
}

impl<R> fmt::Debug for GraphQLRequest<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphQLRequest")
            .field("document", &self.document)
            .field("shape", &self.shape)
            .finish()
    }
}

/// Unwrap the `data` envelope down to the requested value.
///
/// A single root field is unwrapped to its value; for collections an
/// `{ items: [...] }` page is unwrapped to the items.
fn unwrap_data(data: Value, shape: ResponseShape) -> Value {
    let data = match data {
        Value::Object(fields) if fields.len() == 1 => {
            fields.into_iter().next().map_or(Value::Null, |(_, value)| value)
        }
        other => other,
    };

    match data {
        Value::Object(mut page) if shape == ResponseShape::Array && page.contains_key("items") => {
            page.remove("items").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// Decode a GraphQL response body. Field errors stay in the response.
pub(crate) fn decode_response<R: DeserializeOwned>(
    body: Value,
    shape: ResponseShape,
) -> Result<GraphQLResponse<R>> {
    let envelope: GraphQLResponse<Value> = serde_json::from_value(body)?;

    let data = match envelope.data.map(|data| unwrap_data(data, shape)) {
        None | Some(Value::Null) => None,
        Some(value) => Some(serde_json::from_value(value)?),
    };

    Ok(GraphQLResponse {
        data,
        errors: envelope.errors,
        extensions: envelope.extensions,
    })
}

/// POST a request document and decode the result.
pub(crate) async fn execute<R: DeserializeOwned>(
    client: &HttpClient,
    endpoint: &str,
    document: &RequestDocument,
    shape: ResponseShape,
) -> Result<GraphQLResponse<R>> {
    let response = client.post(endpoint).json(document).send().await?;

    if !response.is_success() {
        return Err(ApiError::Http {
            status: response.status().as_u16(),
            body: response.text().unwrap_or_default(),
        });
    }

    let body: Value = response
        .json()
        .map_err(|e| ApiError::Protocol(e.to_string()))?;
    decode_response(body, shape)
}
