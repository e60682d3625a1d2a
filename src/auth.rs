use crate::config::{AppConfig, UpstreamConfig};
use crate::error::BridgeError;
use http::header::{HeaderName, AUTHORIZATION};
use rustc_hash::FxHashSet;

const X_API_KEY: HeaderName = HeaderName::from_static("x-api-key");

// ---------------------------------------------------------------------------
// Upstream credentials
// ---------------------------------------------------------------------------

/// Source of the credential presented to the upstream.
///
/// Implementations must be `Send + Sync`; the provider is shared across
/// request handlers behind an `Arc`.
#[async_trait::async_trait]
pub trait TokenProvider: Send + Sync {
    /// A currently valid token, or `None` when no credential is available.
    async fn valid_bearer_token(&self) -> Option<String>;
}

/// Fixed credential resolved once from configuration.
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: Option<String>,
}

impl StaticTokenProvider {
    #[must_use]
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.trim().is_empty()),
        }
    }

    /// Inline `api_key` wins; otherwise the variable named by `api_key_env`
    /// is read from the process environment.
    #[must_use]
    pub fn from_config(upstream: &UpstreamConfig) -> Self {
        if let Some(key) = upstream.api_key.as_deref() {
            if !key.trim().is_empty() {
                return Self::new(Some(key.trim().to_string()));
            }
        }
        let from_env = upstream.api_key_env.as_deref().and_then(|name| {
            let value = std::env::var(name).ok();
            if value.is_none() {
                tracing::warn!("upstream credential variable {name} is not set");
            }
            value
        });
        Self::new(from_env.map(|value| value.trim().to_string()))
    }
}

#[async_trait::async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn valid_bearer_token(&self) -> Option<String> {
        self.token.clone()
    }
}

/// Fetch a token or fail with an authentication error.
///
/// # Errors
///
/// Returns `BridgeError::Upstream` with status 401 when the provider has no
/// credential, so the client sees the same status the upstream would send.
pub async fn require_token(provider: &dyn TokenProvider) -> Result<String, BridgeError> {
    provider
        .valid_bearer_token()
        .await
        .ok_or_else(|| BridgeError::Upstream {
            status: 401,
            message: "No upstream credential available".to_string(),
        })
}

// ---------------------------------------------------------------------------
// Client authentication
// ---------------------------------------------------------------------------

/// Hash-set index of accepted client keys.
#[derive(Debug, Default)]
pub struct AllowedClientKeys {
    keys: FxHashSet<Box<str>>,
}

impl AllowedClientKeys {
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Build the client key index from configuration.
#[must_use]
pub fn build_allowed_key_set(config: &AppConfig) -> AllowedClientKeys {
    AllowedClientKeys {
        keys: config
            .client_authentication
            .allowed_keys
            .iter()
            .map(|key| Box::from(key.as_str()))
            .collect(),
    }
}

/// Extract the client key: `Authorization: Bearer <key>` first, then
/// `x-api-key: <key>`.
///
/// # Errors
///
/// Returns `BridgeError::Auth` when neither header carries a key.
pub fn extract_api_key(headers: &http::HeaderMap) -> Result<&str, BridgeError> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .or_else(|| headers.get(X_API_KEY).and_then(|v| v.to_str().ok()))
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .ok_or_else(|| BridgeError::Auth("Missing API key".to_string()))
}

/// Authenticate an incoming request against the key index.
///
/// # Errors
///
/// Returns `BridgeError::Auth` when the API key is missing or invalid.
pub fn authenticate(
    headers: &http::HeaderMap,
    allowed_keys: &AllowedClientKeys,
) -> Result<(), BridgeError> {
    let client_key = extract_api_key(headers)?;
    if allowed_keys.contains(client_key) {
        Ok(())
    } else {
        Err(BridgeError::Auth("Invalid API key".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        AuthScheme, ClientAuthConfig, FeaturesConfig, ServerConfig, UpstreamConfig,
    };

    fn upstream(api_key: Option<&str>, api_key_env: Option<&str>) -> UpstreamConfig {
        UpstreamConfig {
            base_url: "https://api.anthropic.com".to_string(),
            api_version: "2023-06-01".to_string(),
            api_key: api_key.map(str::to_string),
            api_key_env: api_key_env.map(str::to_string),
            auth_scheme: AuthScheme::Bearer,
            beta: None,
            proxy: None,
            default_max_tokens: 4096,
            model_map: rustc_hash::FxHashMap::default(),
        }
    }

    fn make_config(allowed_keys: Vec<String>) -> AppConfig {
        AppConfig {
            server: ServerConfig::default(),
            upstream: upstream(Some("sk-ant"), None),
            client_authentication: ClientAuthConfig { allowed_keys },
            features: FeaturesConfig::default(),
        }
    }

    #[test]
    fn test_extract_bearer() {
        let mut headers = http::HeaderMap::new();
        headers.insert("authorization", "Bearer sk-test123".parse().unwrap());
        assert_eq!(extract_api_key(&headers).unwrap(), "sk-test123");
    }

    #[test]
    fn test_extract_x_api_key_fallback() {
        let mut headers = http::HeaderMap::new();
        headers.insert("x-api-key", "key789".parse().unwrap());
        assert_eq!(extract_api_key(&headers).unwrap(), "key789");
    }

    #[test]
    fn test_extract_prefers_bearer() {
        let mut headers = http::HeaderMap::new();
        headers.insert("authorization", "Bearer preferred".parse().unwrap());
        headers.insert("x-api-key", "fallback".parse().unwrap());
        assert_eq!(extract_api_key(&headers).unwrap(), "preferred");
    }

    #[test]
    fn test_extract_missing_key() {
        let headers = http::HeaderMap::new();
        let err = extract_api_key(&headers).unwrap_err();
        assert!(matches!(err, BridgeError::Auth(_)));

        let mut headers = http::HeaderMap::new();
        headers.insert("authorization", "Basic abc".parse().unwrap());
        assert!(extract_api_key(&headers).is_err());
    }

    #[test]
    fn test_authenticate_valid_and_invalid_key() {
        let index = build_allowed_key_set(&make_config(vec!["valid-key".to_string()]));
        let mut headers = http::HeaderMap::new();
        headers.insert("authorization", "Bearer valid-key".parse().unwrap());
        assert!(authenticate(&headers, &index).is_ok());

        headers.insert("authorization", "Bearer wrong-key".parse().unwrap());
        let err = authenticate(&headers, &index).unwrap_err();
        assert!(matches!(err, BridgeError::Auth(_)));
    }

    #[test]
    fn test_build_allowed_key_set_dedupes() {
        let index = build_allowed_key_set(&make_config(vec![
            "a".to_string(),
            "b".to_string(),
            "a".to_string(),
        ]));
        assert_eq!(index.len(), 2);
        assert!(index.contains("a"));
        assert!(index.contains("b"));
        assert!(!index.contains("c"));
    }

    #[tokio::test]
    async fn test_static_provider_prefers_inline_key() {
        let provider = StaticTokenProvider::from_config(&upstream(
            Some(" sk-inline "),
            Some("MSGBRIDGE_TEST_UNUSED_VAR"),
        ));
        assert_eq!(provider.valid_bearer_token().await.as_deref(), Some("sk-inline"));
    }

    #[tokio::test]
    async fn test_static_provider_missing_env_is_none() {
        let provider = StaticTokenProvider::from_config(&upstream(
            None,
            Some("MSGBRIDGE_TEST_SURELY_UNSET_VARIABLE"),
        ));
        assert!(provider.valid_bearer_token().await.is_none());
        let err = require_token(&provider).await.unwrap_err();
        assert_eq!(err.status_code(), http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_blank_token_is_none() {
        let provider = StaticTokenProvider::new(Some("   ".to_string()));
        assert!(provider.valid_bearer_token().await.is_none());
    }
}
