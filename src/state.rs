use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::auth::{authenticate, build_allowed_key_set, AllowedClientKeys, StaticTokenProvider, TokenProvider};
use crate::config::AppConfig;
use crate::error::BridgeError;
use crate::transport::{HttpTransport, PreparedUpstream};

/// Shared application state accessible to all handlers.
pub struct AppState {
    pub config: AppConfig,
    pub transport: HttpTransport,
    pub upstream: PreparedUpstream,
    pub token_provider: Arc<dyn TokenProvider>,
    allowed_client_keys: AllowedClientKeys,
    request_seq: AtomicU64,
}

impl AppState {
    #[must_use]
    pub fn new(
        config: AppConfig,
        transport: HttpTransport,
        upstream: PreparedUpstream,
        token_provider: Arc<dyn TokenProvider>,
        allowed_client_keys: AllowedClientKeys,
    ) -> Self {
        Self {
            config,
            transport,
            upstream,
            token_provider,
            allowed_client_keys,
            request_seq: AtomicU64::new(1),
        }
    }

    /// Build the full state from a validated config, with the credential
    /// taken from `upstream.api_key` / `upstream.api_key_env`.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Config`] when the upstream endpoint or the HTTP
    /// client cannot be prepared.
    pub fn from_config(config: AppConfig) -> Result<Self, BridgeError> {
        let token_provider: Arc<dyn TokenProvider> =
            Arc::new(StaticTokenProvider::from_config(&config.upstream));
        Self::with_token_provider(config, token_provider)
    }

    /// Like [`AppState::from_config`] with a caller-supplied credential source.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Config`] when the upstream endpoint or the HTTP
    /// client cannot be prepared.
    pub fn with_token_provider(
        config: AppConfig,
        token_provider: Arc<dyn TokenProvider>,
    ) -> Result<Self, BridgeError> {
        let upstream = PreparedUpstream::new(&config.upstream)?;
        let transport = HttpTransport::new(&config.server, upstream.proxy())?;
        let allowed_client_keys = build_allowed_key_set(&config);
        Ok(Self::new(
            config,
            transport,
            upstream,
            token_provider,
            allowed_client_keys,
        ))
    }

    /// Monotonic sequence number for log correlation.
    pub fn next_request_seq(&self) -> u64 {
        self.request_seq.fetch_add(1, Ordering::Relaxed)
    }

    /// Authenticate a client request using the prebuilt key index.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::Auth` when the API key is missing or invalid.
    pub fn authenticate(&self, headers: &http::HeaderMap) -> Result<(), BridgeError> {
        authenticate(headers, &self.allowed_client_keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    fn state() -> AppState {
        let config = parse_config(
            "upstream:\n  base_url: http://127.0.0.1:9\n  api_key: sk-ant\n\
             client_authentication:\n  allowed_keys: [client-1]\n",
        )
        .unwrap();
        AppState::from_config(config).unwrap()
    }

    #[test]
    fn test_request_seq_increments() {
        let state = state();
        let first = state.next_request_seq();
        assert_eq!(state.next_request_seq(), first + 1);
    }

    #[test]
    fn test_authenticate_uses_configured_keys() {
        let state = state();
        let mut headers = http::HeaderMap::new();
        headers.insert("x-api-key", "client-1".parse().unwrap());
        assert!(state.authenticate(&headers).is_ok());
        headers.insert("x-api-key", "client-2".parse().unwrap());
        assert!(state.authenticate(&headers).is_err());
    }

    #[tokio::test]
    async fn test_from_config_uses_inline_key() {
        let state = state();
        assert_eq!(
            state.token_provider.valid_bearer_token().await.as_deref(),
            Some("sk-ant")
        );
    }
}
