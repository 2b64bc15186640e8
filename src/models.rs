//! Data models for the feed server.
//!
//! Domain records (users, channels, posts) plus the request/response
//! bodies exchanged over HTTP. All JSON uses camelCase field names.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// User identifier
pub type UserId = u64;

/// Channel identifier
pub type ChannelId = u64;

/// Post identifier
pub type PostId = u64;

/// Public view of a user. Credentials never appear here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

/// A channel owned by a single user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: ChannelId,
    pub owner_id: UserId,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// A post published into a channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: PostId,
    pub channel_id: ChannelId,
    pub author_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Issued session credential
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionToken {
    /// Opaque bearer token (base64url). Only its hash is kept server-side.
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

// === API Request/Response Models ===

/// POST /signup body
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

/// POST /login body
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// GET / response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MainPageResponse {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub id: UserId,
}

impl From<User> for MainPageResponse {
    fn from(user: User) -> Self {
        Self {
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            id: user.id,
        }
    }
}

/// POST /channels body
#[derive(Debug, Clone, Deserialize)]
pub struct CreateChannelRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// PATCH /channels body. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateChannelRequest {
    pub id: ChannelId,
    pub name: Option<String>,
    pub description: Option<String>,
}

/// DELETE /channels body
#[derive(Debug, Deserialize)]
pub struct DeleteChannelRequest {
    pub id: ChannelId,
}

/// POST /post body
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePostRequest {
    pub channel_id: ChannelId,
    pub content: String,
}

/// GET /post query parameters
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelPostsQuery {
    pub channel_id: ChannelId,
}

/// DELETE /post body
#[derive(Debug, Deserialize)]
pub struct DeletePostRequest {
    pub id: PostId,
}

/// POST /follow and DELETE /follow body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowRequest {
    pub channel_id: ChannelId,
}

/// POST /follow response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowResponse {
    pub channel_id: ChannelId,
}

/// GET /newPost query parameters
#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    /// Maximum number of posts (default 50, capped at 100)
    pub limit: Option<usize>,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn main_page_uses_camel_case_fields() {
        let user = User {
            id: 1,
            username: "a".into(),
            first_name: "B".into(),
            last_name: "C".into(),
        };

        let value = serde_json::to_value(MainPageResponse::from(user)).unwrap();
        assert_eq!(
            value,
            json!({"username": "a", "firstName": "B", "lastName": "C", "id": 1})
        );
    }

    #[test]
    fn channel_description_defaults_to_empty() {
        let req: CreateChannelRequest = serde_json::from_value(json!({"name": "news"})).unwrap();
        assert_eq!(req.name, "news");
        assert!(req.description.is_empty());
    }

    #[test]
    fn update_channel_fields_are_optional() {
        let req: UpdateChannelRequest =
            serde_json::from_value(json!({"id": 7, "description": "new"})).unwrap();
        assert_eq!(req.id, 7);
        assert!(req.name.is_none());
        assert_eq!(req.description.as_deref(), Some("new"));
    }
}
