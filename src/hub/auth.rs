//! Optional verification of `auth` messages.

use async_trait::async_trait;
use serde_json::Value;

use super::error::AuthError;

/// Checks the payload of an `auth` message and returns the identity to attach.
///
/// Without a verifier the hub attaches the payload as-is.
#[async_trait]
pub trait AuthVerifier: Send + Sync {
    async fn verify(&self, payload: &Value) -> Result<Value, AuthError>;
}

/// Accepts payloads carrying a `token` equal to the configured one.
///
/// Attaches the payload minus the token.
pub struct StaticTokenVerifier {
    token: String,
}

impl StaticTokenVerifier {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl AuthVerifier for StaticTokenVerifier {
    async fn verify(&self, payload: &Value) -> Result<Value, AuthError> {
        match payload.get("token").and_then(Value::as_str) {
            Some(token) if token == self.token => {
                let mut identity = payload.clone();
                if let Some(object) = identity.as_object_mut() {
                    object.remove("token");
                }
                Ok(identity)
            }
            Some(_) => Err(AuthError::Rejected("token mismatch".into())),
            None => Err(AuthError::Rejected("missing token".into())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_static_token_accepts_match() {
        let verifier = StaticTokenVerifier::new("s3cret");
        let identity = verifier
            .verify(&json!({ "token": "s3cret", "user": "ops" }))
            .await
            .unwrap();
        assert_eq!(identity, json!({ "user": "ops" }));
    }

    #[tokio::test]
    async fn test_static_token_rejects() {
        let verifier = StaticTokenVerifier::new("s3cret");
        assert_eq!(
            verifier.verify(&json!({ "token": "nope" })).await,
            Err(AuthError::Rejected("token mismatch".into()))
        );
        assert_eq!(
            verifier.verify(&json!({})).await,
            Err(AuthError::Rejected("missing token".into()))
        );
    }
}
