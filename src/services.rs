//! The business layer consumed by HTTP handlers.
//!
//! Handlers only parse requests and serialize results; every rule about
//! users, channels, posts and follows lives behind [`Services`]. The crate
//! ships [`MemoryServices`](crate::store::MemoryServices); a database-backed
//! implementation can be swapped in without touching the router.

use crate::models::*;
use async_trait::async_trait;

/// Default number of posts returned by the feed
pub const DEFAULT_FEED_LIMIT: usize = 50;

/// Upper bound on posts returned by the feed
pub const MAX_FEED_LIMIT: usize = 100;

#[async_trait]
pub trait Services: Send + Sync + 'static {
    // === Accounts ===

    /// Create a new account.
    async fn signup(&self, req: SignupRequest) -> Result<User, ServiceError>;

    /// Exchange username and password for a session token.
    async fn login(&self, req: LoginRequest) -> Result<SessionToken, ServiceError>;

    /// Resolve a raw bearer token to its user.
    async fn authenticate(&self, token: &str) -> Result<User, ServiceError>;

    // === Channels ===

    async fn channels_owned_by(&self, user: &User) -> Result<Vec<Channel>, ServiceError>;

    async fn create_channel(
        &self,
        user: &User,
        req: CreateChannelRequest,
    ) -> Result<Channel, ServiceError>;

    async fn update_channel(
        &self,
        user: &User,
        req: UpdateChannelRequest,
    ) -> Result<Channel, ServiceError>;

    /// Delete a channel together with its posts and follows.
    async fn delete_channel(&self, user: &User, channel_id: ChannelId)
        -> Result<(), ServiceError>;

    // === Posts ===

    async fn create_post(&self, user: &User, req: CreatePostRequest)
        -> Result<Post, ServiceError>;

    /// Posts of one channel, newest first.
    async fn posts_in_channel(
        &self,
        user: &User,
        channel_id: ChannelId,
    ) -> Result<Vec<Post>, ServiceError>;

    async fn delete_post(&self, user: &User, post_id: PostId) -> Result<(), ServiceError>;

    /// Posts across every channel the user owns, newest first.
    async fn posts_in_owned_channels(&self, user: &User) -> Result<Vec<Post>, ServiceError>;

    // === Follows and feed ===

    async fn follow(&self, user: &User, channel_id: ChannelId) -> Result<(), ServiceError>;

    async fn unfollow(&self, user: &User, channel_id: ChannelId) -> Result<(), ServiceError>;

    /// Newest posts from followed channels.
    ///
    /// `limit` defaults to [`DEFAULT_FEED_LIMIT`] and is clamped to
    /// `1..=MAX_FEED_LIMIT`.
    async fn feed(&self, user: &User, limit: Option<usize>) -> Result<Vec<Post>, ServiceError>;

    async fn following(&self, user: &User) -> Result<Vec<Channel>, ServiceError>;
}

/// Resolve an optional feed limit to the effective value.
pub fn effective_feed_limit(limit: Option<usize>) -> usize {
    limit
        .unwrap_or(DEFAULT_FEED_LIMIT)
        .clamp(1, MAX_FEED_LIMIT)
}

/// Service errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    InvalidInput(&'static str),

    #[error("username is already taken")]
    UsernameTaken,

    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("invalid or expired session")]
    InvalidSession,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("not allowed to modify this resource")]
    Forbidden,

    #[error("already following this channel")]
    AlreadyFollowing,

    #[error("not following this channel")]
    NotFollowing,

    #[error("internal error: {0}")]
    Internal(String),
}
