//! Axum integration: attach the validated identity to the request.
//!
//! The identity is stored in the request's extensions, so it is owned by
//! that request and dropped with it whether the handler succeeds, fails or
//! is cancelled. Nothing is kept per worker.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{Request, request::Parts},
    middleware::Next,
    response::Response,
};

use super::validator::{Identity, SessionValidator};

/// Session middleware for use with `axum::middleware::from_fn_with_state`.
///
/// This middleware never rejects a request: an absent, unknown or
/// unverifiable token leaves the request anonymous. Routes that require a
/// user check [`CurrentUser`] themselves.
pub async fn session_middleware(
    State(validator): State<Arc<SessionValidator>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let token = req
        .headers()
        .get(validator.header())
        .and_then(|h| h.to_str().ok())
        .map(|raw| raw.strip_prefix("Bearer ").unwrap_or(raw).to_string());

    match validator.validate(token.as_deref()).await {
        Ok(Some(identity)) => {
            req.extensions_mut().insert(identity);
        }
        Ok(None) => {}
        Err(e) => {
            tracing::warn!(error = %e, path = %req.uri().path(), "session lookup failed, continuing anonymously");
        }
    }

    next.run(req).await
}

/// Extractor for the identity attached by [`session_middleware`].
///
/// `CurrentUser(None)` means the request is anonymous.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Option<Identity>);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(CurrentUser(parts.extensions.get::<Identity>().cloned()))
    }
}
