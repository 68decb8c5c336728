// Per-API configuration entries

use crate::validation::{ConfigValidator, Validate};
use crate::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Kind of backend an API entry points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EndpointType {
    #[default]
    #[serde(rename = "GraphQL", alias = "GRAPHQL", alias = "graphql")]
    GraphQL,
    #[serde(rename = "REST", alias = "Rest", alias = "rest")]
    Rest,
}

/// Authorization scheme applied to every request sent to an API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthorizationType {
    #[default]
    None,
    ApiKey,
    AwsIam,
    AmazonCognitoUserPools,
    OpenidConnect,
    AwsLambda,
}

impl AuthorizationType {
    /// Whether requests carry an `Authorization` token from a provider
    pub fn uses_token(&self) -> bool {
        matches!(
            self,
            Self::AmazonCognitoUserPools | Self::OpenidConnect | Self::AwsLambda
        )
    }
}

impl fmt::Display for AuthorizationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "NONE",
            Self::ApiKey => "API_KEY",
            Self::AwsIam => "AWS_IAM",
            Self::AmazonCognitoUserPools => "AMAZON_COGNITO_USER_POOLS",
            Self::OpenidConnect => "OPENID_CONNECT",
            Self::AwsLambda => "AWS_LAMBDA",
        };
        f.write_str(name)
    }
}

/// Configuration of a single named API. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfiguration {
    /// API name; filled in from the mapping key
    #[serde(default, skip_serializing)]
    pub name: String,
    #[serde(default)]
    pub endpoint_type: EndpointType,
    pub endpoint: String,
    /// Websocket endpoint for subscriptions, derived from `endpoint` when absent
    #[serde(default)]
    pub realtime_endpoint: Option<String>,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub authorization_type: AuthorizationType,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl ApiConfiguration {
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            endpoint_type: EndpointType::GraphQL,
            endpoint: endpoint.into(),
            realtime_endpoint: None,
            region: None,
            authorization_type: AuthorizationType::None,
            api_key: None,
        }
    }

    pub fn with_endpoint_type(mut self, endpoint_type: EndpointType) -> Self {
        self.endpoint_type = endpoint_type;
        self
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.authorization_type = AuthorizationType::ApiKey;
        self.api_key = Some(key.into());
        self
    }

    pub fn with_authorization(mut self, authorization_type: AuthorizationType) -> Self {
        self.authorization_type = authorization_type;
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_realtime_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.realtime_endpoint = Some(endpoint.into());
        self
    }

    /// Websocket URL used for subscriptions
    pub fn subscription_url(&self) -> String {
        if let Some(realtime) = &self.realtime_endpoint {
            return realtime.clone();
        }
        if let Some(rest) = self.endpoint.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = self.endpoint.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            self.endpoint.clone()
        }
    }
}

impl Validate for ApiConfiguration {
    fn validate(&self) -> Result<()> {
        ConfigValidator::not_empty(&self.name, &self.name, "name")?;
        ConfigValidator::not_empty(&self.name, &self.endpoint, "endpoint")?;
        ConfigValidator::is_url(&self.name, &self.endpoint, "endpoint")?;

        if let Some(realtime) = &self.realtime_endpoint {
            ConfigValidator::is_url(&self.name, realtime, "realtimeEndpoint")?;
        }

        match self.authorization_type {
            AuthorizationType::ApiKey => {
                ConfigValidator::required(&self.name, self.api_key.as_deref(), "apiKey")
            }
            AuthorizationType::AwsIam => {
                ConfigValidator::required(&self.name, self.region.as_deref(), "region")
            }
            _ => Ok(()),
        }
    }
}

/// The full mapping from API name to its configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApiPluginConfiguration {
    apis: BTreeMap<String, ApiConfiguration>,
}

impl ApiPluginConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an API entry. Names must be unique.
    pub fn with_api(mut self, api: ApiConfiguration) -> Result<Self> {
        self.insert(api)?;
        Ok(self)
    }

    fn insert(&mut self, api: ApiConfiguration) -> Result<()> {
        api.validate()?;
        if self.apis.contains_key(&api.name) {
            return Err(ConfigError::invalid(&api.name, "API name is configured twice"));
        }
        self.apis.insert(api.name.clone(), api);
        Ok(())
    }

    /// Build from a parsed JSON tree of `{ "<name>": { ...entry... } }`
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(entries) = value else {
            return Err(ConfigError::ParseError(
                "API configuration must be an object keyed by API name".to_string(),
            ));
        };

        let mut config = Self::new();
        for (name, entry) in entries {
            let mut api: ApiConfiguration = serde_json::from_value(entry).map_err(|e| {
                ConfigError::DeserializationError(format!("API '{}': {}", name, e))
            })?;
            api.name = name;
            config.insert(api)?;
        }
        Ok(config)
    }

    pub fn get(&self, name: &str) -> Option<&ApiConfiguration> {
        self.apis.get(name)
    }

    pub fn apis(&self) -> impl Iterator<Item = &ApiConfiguration> {
        self.apis.values()
    }

    pub fn len(&self) -> usize {
        self.apis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apis.is_empty()
    }
}
