//! Request pipeline stages other than the access log.

use crate::auth::{extract_bearer_token, AuthError, CurrentUser};
use crate::handlers::{ApiError, AppState};
use crate::models::ErrorResponse;
use crate::services::ServiceError;
use axum::{
    extract::{Request, State},
    http::{header, request::Parts, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use std::any::Any;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{debug, error};

/// CORS policy granting credentialed access to exactly one origin.
///
/// Requests from any other origin get no `Access-Control-Allow-Origin`
/// header, so browsers refuse to expose the response.
pub fn cors_layer(allowed_origin: &str) -> CorsLayer {
    let allowed = allowed_origin.to_string();

    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _parts: &Parts| origin.as_bytes() == allowed.as_bytes(),
        ))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::ORIGIN, header::AUTHORIZATION])
        .allow_credentials(true)
}

/// Turn a handler panic into a generic 500. The panic message is logged,
/// never returned.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let details = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "Unknown panic message".to_string()
    };

    error!(panic = %details, "Handler panicked");

    let body = Json(ErrorResponse {
        error: "internal server error".to_string(),
        code: "INTERNAL_ERROR",
    });
    (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
}

/// Resolve the bearer token to a user and attach it as [`CurrentUser`].
///
/// On failure the request stops here and the handler never runs.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header_value = req
        .headers()
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidHeader)?;
    let token = extract_bearer_token(header_value).ok_or(AuthError::InvalidHeader)?;

    let user = state.services.authenticate(token).await.map_err(|e| match e {
        ServiceError::InvalidSession => {
            debug!("Bearer token rejected");
            ApiError::Auth(AuthError::Unauthorized)
        }
        other => ApiError::Service(other),
    })?;

    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}
