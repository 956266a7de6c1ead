//! Caller identity and ownership guards.
//!
//! Authentication is delegated to an [`IdentityProvider`]; the
//! [`authenticate`] middleware only attaches whatever identity it vouches
//! for. Handlers that need a caller take [`Caller`] as an extractor, and
//! services check ownership with [`ensure_owner`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use serde::Serialize;
use shelf_http::error::AppError;
use shelf_kernel::settings::AuthUser;

/// A verified user identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Caller {
    pub id: String,
    pub name: String,
}

/// Verifies bearer credentials and resolves them to a caller.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn verify(&self, token: &str) -> Option<Caller>;
}

/// Provider backed by a fixed token table from configuration.
pub struct StaticTokenProvider {
    tokens: HashMap<String, Caller>,
}

impl StaticTokenProvider {
    pub fn new(users: &[AuthUser]) -> Self {
        let tokens = users
            .iter()
            .map(|user| {
                (
                    user.token.clone(),
                    Caller {
                        id: user.id.clone(),
                        name: user.name.clone(),
                    },
                )
            })
            .collect();
        Self { tokens }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl IdentityProvider for StaticTokenProvider {
    async fn verify(&self, token: &str) -> Option<Caller> {
        self.tokens.get(token).cloned()
    }
}

fn bearer_token(parts: &axum::http::HeaderMap) -> Option<&str> {
    let value = parts.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

/// Attach the verified caller, if any, to the request extensions.
///
/// Requests without valid credentials pass through untouched; routes that
/// require a caller reject them at extraction time.
pub async fn authenticate(
    State(provider): State<Arc<dyn IdentityProvider>>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = bearer_token(request.headers()) {
        match provider.verify(token).await {
            Some(caller) => {
                tracing::debug!(user_id = %caller.id, "caller authenticated");
                request.extensions_mut().insert(caller);
            }
            None => tracing::debug!("bearer token rejected"),
        }
    }
    next.run(request).await
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Caller>()
            .cloned()
            .ok_or_else(|| AppError::unauthorized("Not authorized to access this route"))
    }
}

/// Fail with `Forbidden` unless `caller` owns the resource.
pub fn ensure_owner(caller: &Caller, owner_id: &str, action: &str) -> Result<(), AppError> {
    if caller.id == owner_id {
        return Ok(());
    }
    tracing::warn!(user_id = %caller.id, owner_id, action, "ownership check failed");
    Err(AppError::forbidden(format!("Not authorized to {action}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    fn provider() -> Arc<dyn IdentityProvider> {
        Arc::new(StaticTokenProvider::new(&[AuthUser {
            id: "u-1".to_string(),
            name: "Ada".to_string(),
            token: "ada-token".to_string(),
        }]))
    }

    fn app() -> Router {
        Router::new()
            .route("/me", get(|caller: Caller| async move { caller.name }))
            .layer(axum::middleware::from_fn_with_state(provider(), authenticate))
    }

    #[tokio::test]
    async fn verified_caller_reaches_handler() {
        let response = app()
            .oneshot(
                Request::get("/me")
                    .header(AUTHORIZATION, "Bearer ada-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_or_unknown_token_is_unauthorized() {
        let missing = app()
            .oneshot(Request::get("/me").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let unknown = app()
            .oneshot(
                Request::get("/me")
                    .header(AUTHORIZATION, "Bearer nope")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn ensure_owner_rejects_other_users() {
        let caller = Caller {
            id: "u-1".to_string(),
            name: "Ada".to_string(),
        };
        assert!(ensure_owner(&caller, "u-1", "update this review").is_ok());

        let err = ensure_owner(&caller, "u-2", "update this review").unwrap_err();
        assert!(matches!(err, AppError::Forbidden { .. }));
        assert!(err.to_string().contains("update this review"));
    }

    #[test]
    fn bearer_token_requires_scheme() {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert(AUTHORIZATION, "Basic abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, "Bearer abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc"));
    }
}
