use rustc_hash::FxHashSet;

use super::{AppConfig, ConfigError};

/// Validate the full application config, returning an error if any rule is violated.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] when any configuration invariant is violated.
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    validate_server_config(config)?;
    validate_allowed_keys(config)?;
    validate_upstream(config)?;
    validate_log_level(config)?;
    Ok(())
}

fn validation_err(msg: impl Into<String>) -> ConfigError {
    ConfigError::Validation(msg.into())
}

fn validate_server_config(config: &AppConfig) -> Result<(), ConfigError> {
    let server = &config.server;
    if server.timeout == 0 {
        return Err(validation_err("server.timeout must be greater than 0"));
    }
    if server.http_pool_max_idle_per_host == 0 {
        return Err(validation_err(
            "server.http_pool_max_idle_per_host must be greater than 0",
        ));
    }
    if server.runtime_worker_threads == Some(0) {
        return Err(validation_err(
            "server.runtime_worker_threads must be greater than 0 when set",
        ));
    }
    Ok(())
}

fn validate_allowed_keys(config: &AppConfig) -> Result<(), ConfigError> {
    if config.client_authentication.allowed_keys.is_empty() {
        return Err(validation_err("allowed_keys cannot be empty"));
    }
    let mut seen = FxHashSet::default();
    for key in &config.client_authentication.allowed_keys {
        if key.trim().is_empty() {
            return Err(validation_err("allowed_keys contains an empty key"));
        }
        if !seen.insert(key.as_str()) {
            return Err(validation_err("allowed_keys contains a duplicate key"));
        }
    }
    Ok(())
}

fn validate_upstream(config: &AppConfig) -> Result<(), ConfigError> {
    let upstream = &config.upstream;
    validate_http_url("upstream.base_url", &upstream.base_url)?;
    if upstream.api_version.trim().is_empty() {
        return Err(validation_err("upstream.api_version cannot be empty"));
    }

    let has_key = upstream
        .api_key
        .as_deref()
        .is_some_and(|key| !key.trim().is_empty());
    let has_env = upstream
        .api_key_env
        .as_deref()
        .is_some_and(|name| !name.trim().is_empty());
    if !has_key && !has_env {
        return Err(validation_err(
            "upstream: one of api_key or api_key_env must be set",
        ));
    }

    if upstream.default_max_tokens == 0 {
        return Err(validation_err(
            "upstream.default_max_tokens must be greater than 0",
        ));
    }
    if let Some(beta) = upstream.beta.as_deref() {
        if beta.trim().is_empty() {
            return Err(validation_err("upstream.beta cannot be empty when set"));
        }
    }
    if let Some(proxy) = upstream.proxy.as_deref() {
        validate_http_url("upstream.proxy", proxy.trim())?;
    }
    for (from, to) in &upstream.model_map {
        if from.trim().is_empty() || to.trim().is_empty() {
            return Err(validation_err(format!(
                "upstream.model_map entry '{from}' -> '{to}': both names must not be empty"
            )));
        }
    }
    Ok(())
}

fn validate_http_url(field_name: &str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(validation_err(format!("{field_name} cannot be empty")));
    }
    let parsed = url::Url::parse(value)
        .map_err(|err| validation_err(format!("{field_name} is not a valid URL: {err}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(validation_err(format!(
            "{field_name} must use http:// or https://"
        )));
    }
    Ok(())
}

fn validate_log_level(config: &AppConfig) -> Result<(), ConfigError> {
    let valid_levels = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL", "DISABLED"];
    if !valid_levels.contains(&config.features.log_level.to_uppercase().as_str()) {
        return Err(validation_err(format!(
            "log_level must be one of {valid_levels:?}"
        )));
    }
    Ok(())
}
