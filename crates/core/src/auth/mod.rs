//! Request authentication.
//!
//! The authenticated identity's owner reference is what ingestion records on
//! each catalog record. With `method = "none"` every request is anonymous.

mod api_key;

pub use api_key::ApiKeyAuthenticator;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;
use thiserror::Error;

use crate::config::{AuthConfig, AuthMethod};

/// Owner reference used when authentication is disabled.
pub const ANONYMOUS_OWNER: &str = "anonymous";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Authentication required")]
    NotAuthenticated,

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

/// What an authenticator gets to look at. Header names are lowercase.
#[derive(Debug, Clone)]
pub struct AuthRequest {
    pub headers: HashMap<String, String>,
    pub source_ip: IpAddr,
}

impl AuthRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// Authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Owner reference recorded on uploads.
    pub owner: String,
    pub method: String,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self {
            owner: ANONYMOUS_OWNER.to_string(),
            method: "none".to_string(),
        }
    }
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Authenticate a request and return the identity
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError>;

    /// Name of this authentication method
    fn method_name(&self) -> &'static str;
}

/// Accepts every request as anonymous. Only used when configured explicitly.
#[derive(Debug, Default)]
pub struct NoneAuthenticator;

impl NoneAuthenticator {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Authenticator for NoneAuthenticator {
    async fn authenticate(&self, _request: &AuthRequest) -> Result<Identity, AuthError> {
        Ok(Identity::anonymous())
    }

    fn method_name(&self) -> &'static str {
        "none"
    }
}

/// Builds the authenticator selected in config.
pub fn create_authenticator(config: &AuthConfig) -> Result<Box<dyn Authenticator>, AuthError> {
    match config.method {
        AuthMethod::None => Ok(Box::new(NoneAuthenticator::new())),
        AuthMethod::ApiKey => {
            if config.api_keys.is_empty() {
                return Err(AuthError::ConfigurationError(
                    "at least one api key must be set when using api_key auth".to_string(),
                ));
            }
            let keys = config
                .api_keys
                .iter()
                .map(|entry| (entry.key.clone(), entry.owner.clone()));
            Ok(Box::new(ApiKeyAuthenticator::new(keys)))
        }
    }
}
