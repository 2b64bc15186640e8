//! Credentials and identity for the feed server.
//!
//! # Sessions
//!
//! `POST /login` issues a random bearer token. The server keeps only
//! SHA-256(token), so a leaked session table cannot be replayed.
//!
//! # Passwords
//!
//! Passwords are stored as PBKDF2-HMAC-SHA256 with a per-user random salt,
//! encoded as `pbkdf2-sha256$<iterations>$<salt hex>$<hash hex>`.
//!
//! # Identity
//!
//! The auth middleware resolves the bearer token and stores a [`CurrentUser`]
//! in the request extensions. Private handlers take `CurrentUser` as an
//! extractor; a request that never went through the middleware is rejected.

use crate::models::{ErrorResponse, User};
use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use base64::Engine;
use ring::digest::{digest, SHA256};
use ring::error::Unspecified;
use ring::pbkdf2;
use ring::rand::SecureRandom;
use std::num::NonZeroU32;

/// Raw session token length in bytes (before base64url encoding)
pub const SESSION_TOKEN_BYTES: usize = 32;

const SALT_LEN: usize = 16;
const CREDENTIAL_LEN: usize = ring::digest::SHA256_OUTPUT_LEN;
const PASSWORD_SCHEME: &str = "pbkdf2-sha256";

/// Hash a token using SHA-256 and return hex-encoded result
pub fn hash_token(token: &str) -> String {
    let hash = digest(&SHA256, token.as_bytes());
    hex::encode(hash.as_ref())
}

/// Generate a fresh base64url session token
pub fn generate_session_token(rng: &dyn SecureRandom) -> Result<String, Unspecified> {
    let mut bytes = [0u8; SESSION_TOKEN_BYTES];
    rng.fill(&mut bytes)?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}

/// Derive a storable password hash with a fresh random salt.
pub fn hash_password(
    password: &str,
    iterations: NonZeroU32,
    rng: &dyn SecureRandom,
) -> Result<String, Unspecified> {
    let mut salt = [0u8; SALT_LEN];
    rng.fill(&mut salt)?;

    let mut derived = [0u8; CREDENTIAL_LEN];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        iterations,
        &salt,
        password.as_bytes(),
        &mut derived,
    );

    Ok(format!(
        "{PASSWORD_SCHEME}${iterations}${}${}",
        hex::encode(salt),
        hex::encode(derived)
    ))
}

/// Check a password against a hash produced by [`hash_password`].
///
/// Malformed hashes never verify.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    let (Some(scheme), Some(iterations), Some(salt), Some(expected), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };

    if scheme != PASSWORD_SCHEME {
        return false;
    }
    let Some(iterations) = iterations.parse::<u32>().ok().and_then(NonZeroU32::new) else {
        return false;
    };
    let (Ok(salt), Ok(expected)) = (hex::decode(salt), hex::decode(expected)) else {
        return false;
    };

    pbkdf2::verify(
        pbkdf2::PBKDF2_HMAC_SHA256,
        iterations,
        &salt,
        password.as_bytes(),
        &expected,
    )
    .is_ok()
}

/// Extract Bearer token from Authorization header.
///
/// The scheme name is matched case-insensitively.
pub fn extract_bearer_token(authorization: &str) -> Option<&str> {
    let (scheme, token) = authorization.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    Some(token).filter(|token| !token.is_empty())
}

/// Authenticated identity for the current request.
///
/// Inserted by the auth middleware, read by private handlers.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or(AuthError::Unauthorized)
    }
}

/// Authorization error
#[derive(Debug)]
pub enum AuthError {
    /// Missing Authorization header
    MissingHeader,
    /// Invalid Authorization header format
    InvalidHeader,
    /// Token unknown or expired
    Unauthorized,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AuthError::MissingHeader => (
                StatusCode::UNAUTHORIZED,
                "MISSING_AUTH",
                "Authorization header required",
            ),
            AuthError::InvalidHeader => (
                StatusCode::BAD_REQUEST,
                "INVALID_AUTH",
                "Invalid Authorization header format",
            ),
            AuthError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Invalid or expired token",
            ),
        };

        let body = Json(ErrorResponse {
            error: message.to_string(),
            code,
        });

        (status, body).into_response()
    }
}
