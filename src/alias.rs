//! Short-alias lookups.
//!
//! Every post may carry a short alias (`amd.im/x1y`) minted by an external
//! service. The service is optional: [`AliasResolver::resolve`] never fails,
//! it degrades to an empty alias and the build goes on.

use crate::config::AliasConfig;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AliasError {
    #[error("alias service disabled")]
    Disabled,
    #[error("alias service unavailable: {0}")]
    ExternalServiceUnavailable(String),
    #[error("alias request failed: {0}")]
    Network(String),
    #[error("alias service returned an empty alias")]
    EmptyResponse,
}

/// Mints a short alias for a canonical URL.
pub trait AliasService: Send + Sync {
    fn create_alias(&self, canonical_url: &str) -> Result<String, AliasError>;
}

impl<S: AliasService + ?Sized> AliasService for std::sync::Arc<S> {
    fn create_alias(&self, canonical_url: &str) -> Result<String, AliasError> {
        (**self).create_alias(canonical_url)
    }
}

/// Service used when lookups are turned off (`--no-http` or no endpoint).
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledAliases;

impl AliasService for DisabledAliases {
    fn create_alias(&self, _canonical_url: &str) -> Result<String, AliasError> {
        Err(AliasError::Disabled)
    }
}

/// HTTP alias creation: `GET <endpoint><canonical_url>` answers with the
/// public alias URL, whose `public_prefix` is stripped.
pub struct HttpAliasService {
    agent: ureq::Agent,
    endpoint: String,
    public_prefix: String,
}

impl HttpAliasService {
    pub fn new(endpoint: &str, public_prefix: &str, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
            endpoint: endpoint.to_string(),
            public_prefix: public_prefix.to_string(),
        }
    }
}

impl AliasService for HttpAliasService {
    fn create_alias(&self, canonical_url: &str) -> Result<String, AliasError> {
        let url = format!("{}{}", self.endpoint, canonical_url);
        let mut response = self.agent.get(&url).call().map_err(|e| match e {
            ureq::Error::StatusCode(code) => {
                AliasError::ExternalServiceUnavailable(format!("HTTP {code}"))
            }
            other => AliasError::Network(other.to_string()),
        })?;
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| AliasError::Network(format!("failed to read response: {e}")))?;
        strip_public_prefix(&body, &self.public_prefix)
    }
}

/// Reduce a service reply to the bare alias.
pub fn strip_public_prefix(reply: &str, public_prefix: &str) -> Result<String, AliasError> {
    let reply = reply.trim();
    let alias = reply.strip_prefix(public_prefix).unwrap_or(reply).trim();
    if alias.is_empty() {
        return Err(AliasError::EmptyResponse);
    }
    Ok(alias.to_string())
}

/// Fail-open front of an [`AliasService`].
pub struct AliasResolver {
    service: Box<dyn AliasService>,
}

impl AliasResolver {
    pub fn new(service: Box<dyn AliasService>) -> Self {
        Self { service }
    }

    /// Resolver that never performs lookups.
    pub fn disabled() -> Self {
        Self::new(Box::new(DisabledAliases))
    }

    /// Build from config. `allow_http = false` forces the disabled service.
    pub fn from_config(config: &AliasConfig, allow_http: bool) -> Self {
        match &config.endpoint {
            Some(endpoint) if allow_http => Self::new(Box::new(HttpAliasService::new(
                endpoint,
                &config.public_prefix,
                Duration::from_secs(config.timeout_secs),
            ))),
            _ => Self::disabled(),
        }
    }

    /// Alias for `canonical_url`, or an empty string when none is available.
    pub fn resolve(&self, canonical_url: &str) -> String {
        match self.service.create_alias(canonical_url) {
            Ok(alias) => alias,
            Err(AliasError::Disabled) => {
                tracing::debug!(url = canonical_url, "alias lookups disabled");
                String::new()
            }
            Err(e) => {
                tracing::warn!(url = canonical_url, error = %e, "short alias unavailable");
                String::new()
            }
        }
    }
}
