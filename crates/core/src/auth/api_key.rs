//! API key authentication.

use async_trait::async_trait;

use super::{AuthError, AuthRequest, Authenticator, Identity};

/// Validates requests against a set of API keys, each bound to an owner.
///
/// Accepts the key in either:
/// - `Authorization: Bearer <key>` header
/// - `X-API-Key: <key>` header
pub struct ApiKeyAuthenticator {
    /// (key, owner)
    keys: Vec<(String, String)>,
}

impl ApiKeyAuthenticator {
    pub fn new(keys: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            keys: keys.into_iter().collect(),
        }
    }

    fn extract_key<'a>(&self, request: &'a AuthRequest) -> Option<&'a str> {
        if let Some(value) = request.header("authorization") {
            if let Some(key) = value
                .strip_prefix("Bearer ")
                .or_else(|| value.strip_prefix("bearer "))
            {
                return Some(key.trim());
            }
        }
        request.header("x-api-key").map(str::trim)
    }
}

#[async_trait]
impl Authenticator for ApiKeyAuthenticator {
    async fn authenticate(&self, request: &AuthRequest) -> Result<Identity, AuthError> {
        let provided = self
            .extract_key(request)
            .ok_or(AuthError::NotAuthenticated)?;

        // Every key is compared so the match position does not leak timing.
        let mut owner = None;
        for (key, key_owner) in &self.keys {
            if constant_time_eq(provided.as_bytes(), key.as_bytes()) && owner.is_none() {
                owner = Some(key_owner);
            }
        }

        match owner {
            Some(owner) => Ok(Identity {
                owner: owner.clone(),
                method: "api_key".to_string(),
            }),
            None => Err(AuthError::InvalidCredentials("Invalid API key".to_string())),
        }
    }

    fn method_name(&self) -> &'static str {
        "api_key"
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
