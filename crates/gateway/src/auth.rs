//! Reference [`AuthProvider`] implementations for the composition root.
//!
//! Neither of these is meant to be the last word on authenticating a
//! gateway deployment — they exist so `gateway` runs out of the box and so
//! the trait's seam is exercised. A production deployment substitutes its
//! own [`AuthProvider`] (OAuth, mTLS, whatever the operator's identity
//! provider is) without touching `gateway-server`.

use std::future::Future;
use std::pin::Pin;

use gateway_server::{AuthProvider, Principal};

/// Accepts every request, assigning the bearer token itself (or a fixed
/// anonymous id, if none was sent) as the principal's user id. Suitable for
/// local development and the zero-config default; never for a deployment
/// exposed beyond a trusted network.
#[derive(Debug, Default)]
pub struct AllowAllAuthProvider;

impl AuthProvider for AllowAllAuthProvider {
    fn authenticate<'a>(&'a self, authorization_header: Option<&'a str>) -> Pin<Box<dyn Future<Output = Option<Principal>> + Send + 'a>> {
        Box::pin(async move {
            let user_id = authorization_header
                .and_then(|h| h.strip_prefix("Bearer "))
                .unwrap_or("anonymous")
                .to_string();
            Some(Principal { user_id, organization_id: None })
        })
    }
}

/// Accepts only `Authorization: Bearer <token>` headers matching one of a
/// fixed set of configured tokens, one per principal.
#[derive(Debug)]
pub struct StaticBearerAuthProvider {
    tokens: std::collections::HashMap<String, Principal>,
}

impl StaticBearerAuthProvider {
    /// Build a provider from `token -> user_id` pairs, all assigned to the
    /// same `organization_id` (or none, for a single-tenant deployment).
    pub fn new(tokens: impl IntoIterator<Item = (String, String)>, organization_id: Option<String>) -> Self {
        let tokens = tokens
            .into_iter()
            .map(|(token, user_id)| (token, Principal { user_id, organization_id: organization_id.clone() }))
            .collect();
        Self { tokens }
    }
}

impl AuthProvider for StaticBearerAuthProvider {
    fn authenticate<'a>(&'a self, authorization_header: Option<&'a str>) -> Pin<Box<dyn Future<Output = Option<Principal>> + Send + 'a>> {
        Box::pin(async move {
            let token = authorization_header?.strip_prefix("Bearer ")?;
            self.tokens.get(token).cloned()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allow_all_uses_bearer_token_as_user_id() {
        let provider = AllowAllAuthProvider;
        let principal = provider.authenticate(Some("Bearer alice")).await.unwrap();
        assert_eq!(principal.user_id, "alice");
    }

    #[tokio::test]
    async fn allow_all_falls_back_to_anonymous_with_no_header() {
        let provider = AllowAllAuthProvider;
        let principal = provider.authenticate(None).await.unwrap();
        assert_eq!(principal.user_id, "anonymous");
    }

    #[tokio::test]
    async fn static_bearer_rejects_an_unknown_token() {
        let provider = StaticBearerAuthProvider::new([("s3cret".to_string(), "alice".to_string())], None);
        assert!(provider.authenticate(Some("Bearer wrong")).await.is_none());
    }

    #[tokio::test]
    async fn static_bearer_accepts_a_known_token() {
        let provider = StaticBearerAuthProvider::new([("s3cret".to_string(), "alice".to_string())], None);
        let principal = provider.authenticate(Some("Bearer s3cret")).await.unwrap();
        assert_eq!(principal.user_id, "alice");
    }
}
