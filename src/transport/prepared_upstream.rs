use http::header::{HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};

use crate::config::{AuthScheme, UpstreamConfig};
use crate::error::BridgeError;
use crate::util::join_url;

pub const ANTHROPIC_VERSION: HeaderName = HeaderName::from_static("anthropic-version");
pub const ANTHROPIC_BETA: HeaderName = HeaderName::from_static("anthropic-beta");
const X_API_KEY: HeaderName = HeaderName::from_static("x-api-key");
const MESSAGES_PATH: &str = "v1/messages";

/// Startup-prepared endpoint and static headers for the Messages upstream.
#[derive(Debug, Clone)]
pub struct PreparedUpstream {
    messages_url: url::Url,
    static_headers: http::HeaderMap,
    auth_scheme: AuthScheme,
    proxy: Option<String>,
}

impl PreparedUpstream {
    /// Build the prepared upstream from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Config`] when the endpoint URL or a static header
    /// value cannot be built.
    pub fn new(upstream: &UpstreamConfig) -> Result<Self, BridgeError> {
        let messages_url_raw = join_url(&upstream.base_url, MESSAGES_PATH);
        let messages_url = url::Url::parse(&messages_url_raw).map_err(|err| {
            BridgeError::Config(format!("invalid upstream URL '{messages_url_raw}': {err}"))
        })?;

        let mut static_headers = http::HeaderMap::new();
        static_headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        static_headers.insert(ANTHROPIC_VERSION, header_value(&upstream.api_version)?);
        if let Some(beta) = upstream.beta.as_deref() {
            static_headers.insert(ANTHROPIC_BETA, header_value(beta.trim())?);
        }

        Ok(Self {
            messages_url,
            static_headers,
            auth_scheme: upstream.auth_scheme,
            proxy: normalize_proxy(upstream.proxy.as_deref()),
        })
    }

    #[must_use]
    pub fn messages_url(&self) -> &url::Url {
        &self.messages_url
    }

    #[must_use]
    pub fn proxy(&self) -> Option<&str> {
        self.proxy.as_deref()
    }

    /// Full header set for one upstream call, credential included.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Auth`] when the token is not a valid header value.
    pub fn request_headers(&self, token: &str, stream: bool) -> Result<http::HeaderMap, BridgeError> {
        let mut headers = self.static_headers.clone();
        let credential = match self.auth_scheme {
            AuthScheme::Bearer => HeaderValue::from_str(&format!("Bearer {token}")),
            AuthScheme::XApiKey => HeaderValue::from_str(token),
        };
        let mut credential = credential.map_err(|_| {
            BridgeError::Auth("upstream credential is not a valid header value".to_string())
        })?;
        credential.set_sensitive(true);
        match self.auth_scheme {
            AuthScheme::Bearer => headers.insert(AUTHORIZATION, credential),
            AuthScheme::XApiKey => headers.insert(X_API_KEY, credential),
        };
        if stream {
            headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        } else {
            headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        }
        Ok(headers)
    }
}

fn header_value(value: &str) -> Result<HeaderValue, BridgeError> {
    HeaderValue::from_str(value)
        .map_err(|_| BridgeError::Config(format!("invalid header value '{value}'")))
}

fn normalize_proxy(proxy: Option<&str>) -> Option<String> {
    proxy.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}
