//! Request identity
//!
//! Authentication lives upstream of this service; by the time a request
//! reaches the API it carries an opaque owner id in the `x-user-id` header.
//! This middleware rejects anonymous requests and exposes the id to
//! handlers as an extension.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use super::handlers::ErrorResponse;

/// Opaque owner id of the authenticated caller.
#[derive(Debug, Clone)]
pub struct Identity(pub String);

pub async fn identity_middleware(mut request: Request<Body>, next: Next) -> Response {
    let owner = request
        .headers()
        .get("x-user-id")
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(str::to_string);

    match owner {
        Some(owner) => {
            request.extensions_mut().insert(Identity(owner));
            next.run(request).await
        }
        None => (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "Missing user identity".to_string(),
            }),
        )
            .into_response(),
    }
}
