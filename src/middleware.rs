//! Bearer token middleware
//!
//! Verifies `Authorization: Bearer <token>` and makes the resulting
//! [`Claims`] available to handlers through the [`Caller`] extractor.
//!
//! A request without the header proceeds with no claims; the engine then
//! refuses anything that needs them. A header that is present but malformed
//! or fails verification is rejected here with 401.
//!
//! # Usage
//!
//! ```ignore
//! use axum::{middleware, routing::get, Router};
//! use postern::middleware::{verify_bearer, Caller};
//!
//! async fn me(Caller(claims): Caller) -> String {
//!     claims.map(|c| c.sub).unwrap_or_default()
//! }
//!
//! let app = Router::new()
//!     .route("/me", get(me))
//!     .layer(middleware::from_fn_with_state(verifier, verify_bearer));
//! ```

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};

use crate::claims::Claims;
use crate::error::AppError;
use crate::observability::SecurityEvent;
use crate::token::TokenVerifier;

const INVALID_TOKEN: &str = "Invalid or expired token";

/// Verify the bearer token, if any, and attach its claims to the request.
pub async fn verify_bearer(
    State(verifier): State<Arc<TokenVerifier>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(value) = request.headers().get(header::AUTHORIZATION) else {
        return Ok(next.run(request).await);
    };

    let token = value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| {
            crate::security_event!(
                SecurityEvent::TokenRejected,
                path = %request.uri().path(),
                reason = "malformed_header",
                "Token rejected"
            );
            AppError::invalid_credentials(INVALID_TOKEN)
        })?;

    let claims = verifier.verify(token).map_err(|e| {
        crate::security_event!(
            SecurityEvent::TokenRejected,
            path = %request.uri().path(),
            reason = %e,
            "Token rejected"
        );
        AppError::invalid_credentials(INVALID_TOKEN)
    })?;

    tracing::debug!(subject = %claims.sub, audience = %claims.aud, "Bearer token verified");
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}

/// Verified claims of the caller, if a token was presented
#[derive(Debug, Clone)]
pub struct Caller(pub Option<Claims>);

impl Caller {
    pub fn claims(&self) -> Option<&Claims> {
        self.0.as_ref()
    }
}

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(parts.extensions.get::<Claims>().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    use crate::testing::{account, test_issuer, FOREIGN_PUBLIC_PEM};
    use crate::token::DEFAULT_ISSUER;

    async fn whoami(caller: Caller) -> String {
        caller
            .claims()
            .map(|c| c.sub.clone())
            .unwrap_or_else(|| "anonymous".to_string())
    }

    fn app(verifier: TokenVerifier) -> Router {
        Router::new()
            .route("/whoami", get(whoami))
            .layer(middleware::from_fn_with_state(Arc::new(verifier), verify_bearer))
    }

    fn request(authorization: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/whoami");
        if let Some(value) = authorization {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_no_header_passes_without_claims() {
        let response = app(test_issuer().verifier()).oneshot(request(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "anonymous");
    }

    #[tokio::test]
    async fn test_valid_token_attaches_claims() {
        let issuer = test_issuer();
        let token = issuer.issue(&account("42", "alice", "a@x.com"), false).unwrap().token;

        let response = app(issuer.verifier())
            .oneshot(request(Some(&format!("Bearer {token}"))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "42");
    }

    #[tokio::test]
    async fn test_malformed_header_rejected() {
        for value in ["Basic dXNlcjpwYXNz", "Bearer ", "bearer-token"] {
            let response = app(test_issuer().verifier())
                .oneshot(request(Some(value)))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "header: {value}");
        }
    }

    #[tokio::test]
    async fn test_foreign_signature_rejected() {
        let token = test_issuer()
            .issue(&account("42", "alice", "a@x.com"), true)
            .unwrap()
            .token;
        let verifier = TokenVerifier::from_public_pem(FOREIGN_PUBLIC_PEM, DEFAULT_ISSUER).unwrap();

        let response = app(verifier)
            .oneshot(request(Some(&format!("Bearer {token}"))))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let body = body_text(response).await;
        assert!(body.contains("invalid_credentials"));
        assert!(!body.contains("signature"));
    }
}
