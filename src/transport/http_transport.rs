use std::time::Duration;

use crate::config::ServerConfig;
use crate::error::BridgeError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

fn build_reqwest_client(
    pool_max_idle_per_host: usize,
    pool_idle_timeout: Option<Duration>,
    timeout: Duration,
    use_env_proxy: bool,
    proxy_url: Option<&str>,
) -> Result<reqwest::Client, BridgeError> {
    let mut builder = reqwest::Client::builder()
        .pool_max_idle_per_host(pool_max_idle_per_host)
        .pool_idle_timeout(pool_idle_timeout)
        .tcp_nodelay(true)
        .connect_timeout(CONNECT_TIMEOUT)
        .redirect(reqwest::redirect::Policy::none())
        .timeout(timeout);

    if let Some(proxy_url) = proxy_url {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|err| BridgeError::Config(format!("Invalid proxy URL: {err}")))?;
        builder = builder.no_proxy().proxy(proxy);
    } else if !use_env_proxy {
        builder = builder.no_proxy();
    }

    builder
        .build()
        .map_err(|err| BridgeError::Transport(format!("Failed to build HTTP client: {err}")))
}

/// Pooled HTTP client for the upstream Messages endpoint.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with connection pooling, timeouts and proxy from
    /// the server config.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError`] when the proxy URL is invalid or the client
    /// cannot be built.
    pub fn new(config: &ServerConfig, proxy_url: Option<&str>) -> Result<Self, BridgeError> {
        let pool_idle_timeout = if config.http_pool_idle_timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(config.http_pool_idle_timeout_secs))
        };
        let client = build_reqwest_client(
            config.http_pool_max_idle_per_host.max(1),
            pool_idle_timeout,
            Duration::from_secs(config.timeout),
            config.http_use_env_proxy,
            proxy_url,
        )?;
        Ok(Self { client })
    }

    /// POST a JSON body upstream and return the response unread, so the
    /// caller can consume it whole or as a byte stream.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Transport`] when the request cannot be executed.
    pub async fn post(
        &self,
        url: &url::Url,
        headers: http::HeaderMap,
        body: bytes::Bytes,
    ) -> Result<reqwest::Response, BridgeError> {
        let mut request = reqwest::Request::new(http::Method::POST, url.clone());
        *request.headers_mut() = headers;
        *request.body_mut() = Some(reqwest::Body::from(body));

        self.client.execute(request).await.map_err(|err| {
            tracing::debug!(error = %err, "upstream request failed");
            BridgeError::Transport(err.to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_with_defaults() {
        assert!(HttpTransport::new(&ServerConfig::default(), None).is_ok());
    }

    #[test]
    fn test_new_with_proxy() {
        let transport = HttpTransport::new(&ServerConfig::default(), Some("http://127.0.0.1:8080"));
        assert!(transport.is_ok());
    }

    #[test]
    fn test_invalid_proxy_is_config_error() {
        let err = HttpTransport::new(&ServerConfig::default(), Some("::not a proxy::")).unwrap_err();
        assert!(matches!(err, BridgeError::Config(_)));
    }
}
