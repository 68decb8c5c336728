//! Authorization providers for configured APIs.

use conduit_config::{ApiConfiguration, AuthorizationType};
use conduit_http_client::{AuthInterceptor, RequestInterceptor, StaticToken, TokenProvider};
use std::fmt;
use std::sync::Arc;

use crate::{ApiError, Result};

/// Credentials and signers supplied by the application.
///
/// Acquiring tokens and signing requests is left to these providers; the
/// dispatcher only selects one per API from its authorization type.
#[derive(Clone, Default)]
pub struct ApiAuthProviders {
    api_key: Option<Arc<dyn TokenProvider>>,
    cognito_user_pools: Option<Arc<dyn TokenProvider>>,
    oidc: Option<Arc<dyn TokenProvider>>,
    lambda: Option<Arc<dyn TokenProvider>>,
    iam_signer: Option<Arc<dyn RequestInterceptor>>,
}

impl ApiAuthProviders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the `apiKey` from configuration.
    pub fn with_api_key_provider(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.api_key = Some(provider);
        self
    }

    pub fn with_cognito_user_pools_provider(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.cognito_user_pools = Some(provider);
        self
    }

    pub fn with_oidc_provider(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.oidc = Some(provider);
        self
    }

    pub fn with_lambda_provider(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.lambda = Some(provider);
        self
    }

    /// Signs requests for `AWS_IAM` APIs.
    pub fn with_iam_signer(mut self, signer: Arc<dyn RequestInterceptor>) -> Self {
        self.iam_signer = Some(signer);
        self
    }

    /// Interceptor implementing the API's authorization type, if any.
    pub(crate) fn interceptor_for(&self, api: &ApiConfiguration) -> Result<Option<Arc<dyn RequestInterceptor>>> {
        let auth = api.authorization_type;
        let interceptor: Arc<dyn RequestInterceptor> = match auth {
            AuthorizationType::None => return Ok(None),
            AuthorizationType::ApiKey => {
                let provider = match (&self.api_key, &api.api_key) {
                    (Some(provider), _) => provider.clone(),
                    (None, Some(key)) => Arc::new(StaticToken(key.clone())),
                    (None, None) => return Err(missing_provider(api, "an API key")),
                };
                Arc::new(AuthInterceptor::api_key(provider))
            }
            AuthorizationType::AmazonCognitoUserPools => {
                token_interceptor(&self.cognito_user_pools, api, "a Cognito User Pools token provider")?
            }
            AuthorizationType::OpenidConnect => token_interceptor(&self.oidc, api, "an OIDC token provider")?,
            AuthorizationType::AwsLambda => token_interceptor(&self.lambda, api, "a Lambda token provider")?,
            AuthorizationType::AwsIam => self
                .iam_signer
                .clone()
                .ok_or_else(|| missing_provider(api, "an IAM request signer"))?,
        };
        Ok(Some(interceptor))
    }
}

fn token_interceptor(
    provider: &Option<Arc<dyn TokenProvider>>,
    api: &ApiConfiguration,
    what: &str,
) -> Result<Arc<dyn RequestInterceptor>> {
    let provider = provider.clone().ok_or_else(|| missing_provider(api, what))?;
    Ok(Arc::new(AuthInterceptor::authorization(provider)))
}

fn missing_provider(api: &ApiConfiguration, what: &str) -> ApiError {
    ApiError::configuration(
        format!(
            "API {} uses {} authorization but no {} was supplied",
            api.name,
            api.authorization_type,
            what.trim_start_matches("an ").trim_start_matches("a ")
        ),
        format!("Register {} for {} on ApiAuthProviders", what, api.authorization_type),
    )
}

impl fmt::Debug for ApiAuthProviders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiAuthProviders")
            .field("api_key", &self.api_key.is_some())
            .field("cognito_user_pools", &self.cognito_user_pools.is_some())
            .field("oidc", &self.oidc.is_some())
            .field("lambda", &self.lambda.is_some())
            .field("iam_signer", &self.iam_signer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(auth: AuthorizationType) -> ApiConfiguration {
        ApiConfiguration::new("blog", "https://example.com/graphql").with_authorization(auth)
    }

    #[test]
    fn test_none_has_no_interceptor() {
        let providers = ApiAuthProviders::new();
        assert!(providers.interceptor_for(&api(AuthorizationType::None)).unwrap().is_none());
    }

    #[test]
    fn test_api_key_from_configuration() {
        let providers = ApiAuthProviders::new();
        let config = api(AuthorizationType::ApiKey).with_api_key("da2-key");
        assert!(providers.interceptor_for(&config).unwrap().is_some());

        let err = providers.interceptor_for(&api(AuthorizationType::ApiKey)).err().unwrap();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_token_types_need_providers() {
        let providers = ApiAuthProviders::new();
        let err = providers
            .interceptor_for(&api(AuthorizationType::OpenidConnect))
            .err()
            .unwrap();
        assert_eq!(
            err.to_string(),
            "API blog uses OPENID_CONNECT authorization but no OIDC token provider was supplied"
        );

        let providers = providers.with_oidc_provider(Arc::new(StaticToken("jwt".into())));
        assert!(
            providers
                .interceptor_for(&api(AuthorizationType::OpenidConnect))
                .unwrap()
                .is_some()
        );
    }

    #[test]
    fn test_iam_needs_signer() {
        let providers = ApiAuthProviders::new();
        let config = api(AuthorizationType::AwsIam).with_region("us-east-1");
        assert!(providers.interceptor_for(&config).err().unwrap().is_configuration());
    }
}
