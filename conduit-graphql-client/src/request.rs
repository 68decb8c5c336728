//! GraphQL request document.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The transport-agnostic body of a GraphQL operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDocument {
    /// The GraphQL query, mutation or subscription text.
    pub query: String,
    /// Operation name (for documents with multiple operations).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    /// Variables for the operation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
    /// Extensions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Value>,
}

impl RequestDocument {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            operation_name: None,
            variables: None,
            extensions: None,
        }
    }

    pub fn with_operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    /// Replace all variables.
    pub fn with_variables(mut self, variables: Value) -> Self {
        self.variables = Some(variables);
        self
    }

    /// Set a single variable, creating the variables object if needed.
    pub fn with_variable(mut self, name: impl Into<String>, value: Value) -> Self {
        let vars = self
            .variables
            .get_or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(map) = vars {
            map.insert(name.into(), value);
        }
        self
    }

    pub fn with_extensions(mut self, extensions: Value) -> Self {
        self.extensions = Some(extensions);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serialized_shape() {
        let document = RequestDocument::new("query GetPost($id: ID!) { getPost(id: $id) { id } }")
            .with_operation_name("GetPost")
            .with_variable("id", json!("p1"));

        let value = serde_json::to_value(&document).unwrap();
        assert_eq!(value["operationName"], "GetPost");
        assert_eq!(value["variables"], json!({ "id": "p1" }));
        assert!(value.get("extensions").is_none());
    }
}
