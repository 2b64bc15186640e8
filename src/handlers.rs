//! HTTP request handlers for the feed API.
//!
//! Handlers only parse input, call [`Services`] and serialize the result.
//! Private handlers take [`CurrentUser`], which the auth stage provides.

use crate::auth::{AuthError, CurrentUser};
use crate::models::*;
use crate::services::{ServiceError, Services};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRequest, FromRequestParts, Query, State,
    },
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use tracing::error;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub services: Arc<dyn Services>,
}

impl AppState {
    pub fn new(services: Arc<dyn Services>) -> Self {
        Self { services }
    }
}

/// JSON request body whose rejections use the API error shape
#[derive(FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);

/// Query string whose rejections use the API error shape
#[derive(FromRequestParts)]
#[from_request(via(Query), rejection(ApiError))]
pub struct QueryParams<T>(pub T);

// === Health Check ===

/// GET /health - Health check endpoint
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// === Accounts ===

/// POST /signup
pub async fn sign_up(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<SignupRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let user = state.services.signup(req).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /login
pub async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> Result<Json<SessionToken>, ApiError> {
    Ok(Json(state.services.login(req).await?))
}

/// GET / - profile of the authenticated user
pub async fn main_page(CurrentUser(user): CurrentUser) -> Json<MainPageResponse> {
    Json(user.into())
}

// === Channels ===

/// GET /channels - channels owned by the caller
pub async fn get_channels(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Channel>>, ApiError> {
    Ok(Json(state.services.channels_owned_by(&user).await?))
}

/// POST /channels
pub async fn create_channel(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    JsonBody(req): JsonBody<CreateChannelRequest>,
) -> Result<(StatusCode, Json<Channel>), ApiError> {
    let channel = state.services.create_channel(&user, req).await?;
    Ok((StatusCode::CREATED, Json(channel)))
}

/// PATCH /channels
pub async fn update_channel(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    JsonBody(req): JsonBody<UpdateChannelRequest>,
) -> Result<Json<Channel>, ApiError> {
    Ok(Json(state.services.update_channel(&user, req).await?))
}

/// DELETE /channels
pub async fn delete_channel(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    JsonBody(req): JsonBody<DeleteChannelRequest>,
) -> Result<StatusCode, ApiError> {
    state.services.delete_channel(&user, req.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// === Posts ===

/// POST /post
pub async fn create_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    JsonBody(req): JsonBody<CreatePostRequest>,
) -> Result<(StatusCode, Json<Post>), ApiError> {
    let post = state.services.create_post(&user, req).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

/// GET /post?channelId= - posts of one channel
pub async fn get_posts(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    QueryParams(query): QueryParams<ChannelPostsQuery>,
) -> Result<Json<Vec<Post>>, ApiError> {
    Ok(Json(
        state
            .services
            .posts_in_channel(&user, query.channel_id)
            .await?,
    ))
}

/// DELETE /post
pub async fn delete_post(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    JsonBody(req): JsonBody<DeletePostRequest>,
) -> Result<StatusCode, ApiError> {
    state.services.delete_post(&user, req.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /myPost - posts in the caller's own channels
pub async fn get_my_channel_posts(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Post>>, ApiError> {
    Ok(Json(state.services.posts_in_owned_channels(&user).await?))
}

// === Follows and feed ===

/// POST /follow
pub async fn follow(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    JsonBody(req): JsonBody<FollowRequest>,
) -> Result<(StatusCode, Json<FollowResponse>), ApiError> {
    state.services.follow(&user, req.channel_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(FollowResponse {
            channel_id: req.channel_id,
        }),
    ))
}

/// DELETE /follow
pub async fn unfollow(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    JsonBody(req): JsonBody<FollowRequest>,
) -> Result<StatusCode, ApiError> {
    state.services.unfollow(&user, req.channel_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /newPost - newest posts from followed channels
pub async fn get_new_posts(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    QueryParams(query): QueryParams<FeedQuery>,
) -> Result<Json<Vec<Post>>, ApiError> {
    Ok(Json(state.services.feed(&user, query.limit).await?))
}

/// GET /following - channels the caller follows
pub async fn get_following(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Channel>>, ApiError> {
    Ok(Json(state.services.following(&user).await?))
}

/// Fallback for unmatched routes
pub async fn not_found() -> ApiError {
    ApiError::RouteNotFound
}

// === Error Handling ===

/// API error types
#[derive(Debug)]
pub enum ApiError {
    /// No route matches the request
    RouteNotFound,
    /// Business-layer failure
    Service(ServiceError),
    /// Authorization error (wraps AuthError)
    Auth(AuthError),
    /// Request body missing, malformed or of the wrong content type
    Body(JsonRejection),
    /// Query string missing fields or malformed
    Query(QueryRejection),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Body(rejection)
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Query(rejection)
    }
}

/// Enables ? on service calls in handlers
impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError::Service(err)
    }
}

/// Implement From<AuthError> to enable ? operator in middleware
impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Auth(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, code, message) = match self {
            ApiError::Auth(auth_err) => return auth_err.into_response(),
            ApiError::RouteNotFound => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                "no route matches this request".to_string(),
            ),
            ApiError::Body(rejection) => {
                let status = rejection.status();
                let code = match status {
                    StatusCode::PAYLOAD_TOO_LARGE => "PAYLOAD_TOO_LARGE",
                    StatusCode::UNSUPPORTED_MEDIA_TYPE => "UNSUPPORTED_MEDIA_TYPE",
                    _ => "INVALID_INPUT",
                };
                (status, code, rejection.body_text())
            }
            ApiError::Query(rejection) => (
                StatusCode::BAD_REQUEST,
                "INVALID_INPUT",
                rejection.body_text(),
            ),
            ApiError::Service(err) => {
                let (status, code) = match &err {
                    ServiceError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "INVALID_INPUT"),
                    ServiceError::UsernameTaken => (StatusCode::CONFLICT, "USERNAME_TAKEN"),
                    ServiceError::InvalidCredentials => {
                        (StatusCode::UNAUTHORIZED, "INVALID_CREDENTIALS")
                    }
                    ServiceError::InvalidSession => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
                    ServiceError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                    ServiceError::Forbidden => (StatusCode::FORBIDDEN, "FORBIDDEN"),
                    ServiceError::AlreadyFollowing => (StatusCode::CONFLICT, "ALREADY_FOLLOWING"),
                    ServiceError::NotFollowing => (StatusCode::NOT_FOUND, "NOT_FOLLOWING"),
                    ServiceError::Internal(_) => {
                        (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
                    }
                };

                let message = if let ServiceError::Internal(details) = &err {
                    error!(error = %details, "Service failure");
                    "internal server error".to_string()
                } else {
                    err.to_string()
                };

                (status, code, message)
            }
        };

        let body = Json(ErrorResponse {
            error: message,
            code,
        });

        (status, body).into_response()
    }
}
