//! Principal resolution.
//!
//! Every entry point receives an already-authenticated caller identity; the
//! messaging core never checks credentials itself, only
//! authorization-by-participant. Whatever shape the platform's auth context
//! takes (session entity, OAuth claim set, raw identifier), it is resolved
//! to a [`UserId`] exactly once, by the single injected resolver below --
//! handlers never re-derive identity on their own.

use axum::http::HeaderMap;

use agora_shared::types::UserId;

use crate::error::ApiError;

/// Maps a raw auth context (here: a bearer token) to a user id.
pub trait PrincipalResolver: Send + Sync {
    fn resolve(&self, raw: &str) -> Option<UserId>;
}

/// Development resolver: the bearer token is the caller's UUID, verbatim.
///
/// Production deployments inject a resolver backed by the platform's
/// session or OAuth infrastructure instead.
#[derive(Debug, Clone, Default)]
pub struct BearerUuidResolver;

impl PrincipalResolver for BearerUuidResolver {
    fn resolve(&self, raw: &str) -> Option<UserId> {
        UserId::parse(raw.trim()).ok()
    }
}

/// Extract and resolve the caller identity from request headers.
pub fn principal_from_headers(
    resolver: &dyn PrincipalResolver,
    headers: &HeaderMap,
) -> Result<UserId, ApiError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or(auth);
    if token.is_empty() {
        return Err(ApiError::Unauthorized);
    }

    resolver.resolve(token).ok_or(ApiError::Unauthorized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_bearer_uuid_resolver() {
        let resolver = BearerUuidResolver;
        let id = Uuid::new_v4();

        assert_eq!(resolver.resolve(&id.to_string()), Some(UserId(id)));
        assert_eq!(resolver.resolve("not-a-uuid"), None);
    }

    #[test]
    fn test_principal_from_headers() {
        let resolver = BearerUuidResolver;
        let id = Uuid::new_v4();

        let mut headers = HeaderMap::new();
        headers.insert("authorization", format!("Bearer {id}").parse().unwrap());
        assert_eq!(
            principal_from_headers(&resolver, &headers).unwrap(),
            UserId(id)
        );

        let empty = HeaderMap::new();
        assert!(matches!(
            principal_from_headers(&resolver, &empty),
            Err(ApiError::Unauthorized)
        ));
    }
}
