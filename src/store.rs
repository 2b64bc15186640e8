//! In-memory implementation of [`Services`].
//!
//! Everything lives in concurrent maps and is lost on restart. Expired
//! sessions are swept by a background task.

use crate::auth::{generate_session_token, hash_password, hash_token, verify_password};
use crate::config::Config;
use crate::models::*;
use crate::services::{effective_feed_limit, ServiceError, Services};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use ring::rand::SystemRandom;
use std::collections::HashSet;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

const MAX_USERNAME_LEN: usize = 32;
const MAX_PERSON_NAME_LEN: usize = 64;
const MIN_PASSWORD_LEN: usize = 6;
const MAX_PASSWORD_LEN: usize = 128;
const MAX_CHANNEL_NAME_LEN: usize = 64;
const MAX_DESCRIPTION_LEN: usize = 512;
const MAX_POST_LEN: usize = 4096;

/// Stored account: public profile plus password hash
#[derive(Debug, Clone)]
struct UserRecord {
    user: User,
    password_hash: String,
}

/// Active session, keyed by SHA-256 of the bearer token
#[derive(Debug, Clone)]
struct Session {
    user_id: UserId,
    expires_at: DateTime<Utc>,
}

/// Thread-safe in-memory services
pub struct MemoryServices {
    users: DashMap<UserId, UserRecord>,

    /// Username -> id, the uniqueness index
    usernames: DashMap<String, UserId>,

    sessions: DashMap<String, Session>,

    channels: DashMap<ChannelId, Channel>,

    posts: DashMap<PostId, Post>,

    /// Channels followed by each user
    follows: DashMap<UserId, HashSet<ChannelId>>,

    next_user_id: AtomicU64,
    next_channel_id: AtomicU64,
    next_post_id: AtomicU64,

    rng: SystemRandom,
    password_iterations: NonZeroU32,
    config: Arc<Config>,
}

impl MemoryServices {
    /// Create empty services
    pub fn new(config: Config) -> Self {
        Self {
            users: DashMap::new(),
            usernames: DashMap::new(),
            sessions: DashMap::new(),
            channels: DashMap::new(),
            posts: DashMap::new(),
            follows: DashMap::new(),
            next_user_id: AtomicU64::new(1),
            next_channel_id: AtomicU64::new(1),
            next_post_id: AtomicU64::new(1),
            rng: SystemRandom::new(),
            password_iterations: NonZeroU32::new(config.password_iterations)
                .unwrap_or(NonZeroU32::MIN),
            config: Arc::new(config),
        }
    }

    /// Start background task sweeping expired sessions
    pub fn start_cleanup_task(self: Arc<Self>) {
        let services = self.clone();
        let interval = self.config.cleanup_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                services.cleanup_expired_sessions();
            }
        });

        info!(
            interval_secs = interval.as_secs(),
            "Started session cleanup task"
        );
    }

    /// Drop expired sessions, returning how many were removed
    pub fn cleanup_expired_sessions(&self) -> usize {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.expires_at > now);
        let removed = before.saturating_sub(self.sessions.len());

        if removed > 0 {
            debug!(removed, "Cleaned up expired sessions");
        }
        removed
    }

    /// Number of live session entries (expired ones included until swept)
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn channel(&self, channel_id: ChannelId) -> Result<Channel, ServiceError> {
        self.channels
            .get(&channel_id)
            .map(|c| c.value().clone())
            .ok_or(ServiceError::NotFound("channel"))
    }

    fn owned_channel(&self, user: &User, channel_id: ChannelId) -> Result<Channel, ServiceError> {
        let channel = self.channel(channel_id)?;
        if channel.owner_id != user.id {
            return Err(ServiceError::Forbidden);
        }
        Ok(channel)
    }

    fn posts_where(&self, keep: impl Fn(&Post) -> bool) -> Vec<Post> {
        let mut posts: Vec<Post> = self
            .posts
            .iter()
            .filter(|p| keep(p.value()))
            .map(|p| p.value().clone())
            .collect();
        sort_newest_first(&mut posts);
        posts
    }
}

#[async_trait]
impl Services for MemoryServices {
    async fn signup(&self, req: SignupRequest) -> Result<User, ServiceError> {
        validate_username(&req.username)?;
        validate_person_name(&req.first_name, "first name must be 1-64 characters")?;
        validate_person_name(&req.last_name, "last name must be 1-64 characters")?;
        validate_password(&req.password)?;

        if self.usernames.contains_key(&req.username) {
            return Err(ServiceError::UsernameTaken);
        }

        let rng = self.rng.clone();
        let iterations = self.password_iterations;
        let password = req.password;
        let password_hash =
            tokio::task::spawn_blocking(move || hash_password(&password, iterations, &rng))
                .await
                .map_err(|e| ServiceError::Internal(e.to_string()))?
                .map_err(|_| ServiceError::Internal("password hashing failed".into()))?;

        let user = match self.usernames.entry(req.username.clone()) {
            Entry::Occupied(_) => return Err(ServiceError::UsernameTaken),
            Entry::Vacant(slot) => {
                let id = self.next_user_id.fetch_add(1, Ordering::Relaxed);
                let user = User {
                    id,
                    username: req.username,
                    first_name: req.first_name,
                    last_name: req.last_name,
                };
                self.users.insert(
                    id,
                    UserRecord {
                        user: user.clone(),
                        password_hash,
                    },
                );
                slot.insert(id);
                user
            }
        };

        info!(user_id = user.id, "User signed up");
        Ok(user)
    }

    async fn login(&self, req: LoginRequest) -> Result<SessionToken, ServiceError> {
        let record = self
            .usernames
            .get(&req.username)
            .map(|id| *id.value())
            .and_then(|id| self.users.get(&id).map(|r| r.value().clone()))
            .ok_or(ServiceError::InvalidCredentials)?;

        let stored = record.password_hash;
        let password = req.password;
        let valid = tokio::task::spawn_blocking(move || verify_password(&password, &stored))
            .await
            .map_err(|e| ServiceError::Internal(e.to_string()))?;
        if !valid {
            debug!(user_id = record.user.id, "Login rejected");
            return Err(ServiceError::InvalidCredentials);
        }

        let token = generate_session_token(&self.rng)
            .map_err(|_| ServiceError::Internal("token generation failed".into()))?;
        let expires_at = Utc::now()
            + chrono::Duration::from_std(self.config.session_ttl)
                .map_err(|e| ServiceError::Internal(e.to_string()))?;

        self.sessions.insert(
            hash_token(&token),
            Session {
                user_id: record.user.id,
                expires_at,
            },
        );

        info!(user_id = record.user.id, "Session issued");
        Ok(SessionToken { token, expires_at })
    }

    async fn authenticate(&self, token: &str) -> Result<User, ServiceError> {
        let token_hash = hash_token(token);
        let session = self
            .sessions
            .get(&token_hash)
            .map(|s| s.value().clone())
            .ok_or(ServiceError::InvalidSession)?;

        if session.expires_at <= Utc::now() {
            self.sessions.remove(&token_hash);
            return Err(ServiceError::InvalidSession);
        }

        self.users
            .get(&session.user_id)
            .map(|r| r.user.clone())
            .ok_or(ServiceError::InvalidSession)
    }

    async fn channels_owned_by(&self, user: &User) -> Result<Vec<Channel>, ServiceError> {
        let mut channels: Vec<Channel> = self
            .channels
            .iter()
            .filter(|c| c.owner_id == user.id)
            .map(|c| c.value().clone())
            .collect();
        channels.sort_by_key(|c| c.id);
        Ok(channels)
    }

    async fn create_channel(
        &self,
        user: &User,
        req: CreateChannelRequest,
    ) -> Result<Channel, ServiceError> {
        validate_channel_name(&req.name)?;
        validate_description(&req.description)?;

        let channel = Channel {
            id: self.next_channel_id.fetch_add(1, Ordering::Relaxed),
            owner_id: user.id,
            name: req.name,
            description: req.description,
            created_at: Utc::now(),
        };
        self.channels.insert(channel.id, channel.clone());

        debug!(channel_id = channel.id, owner_id = user.id, "Channel created");
        Ok(channel)
    }

    async fn update_channel(
        &self,
        user: &User,
        req: UpdateChannelRequest,
    ) -> Result<Channel, ServiceError> {
        if let Some(name) = &req.name {
            validate_channel_name(name)?;
        }
        if let Some(description) = &req.description {
            validate_description(description)?;
        }

        let mut entry = self
            .channels
            .get_mut(&req.id)
            .ok_or(ServiceError::NotFound("channel"))?;
        if entry.owner_id != user.id {
            return Err(ServiceError::Forbidden);
        }

        if let Some(name) = req.name {
            entry.name = name;
        }
        if let Some(description) = req.description {
            entry.description = description;
        }

        debug!(channel_id = req.id, "Channel updated");
        Ok(entry.value().clone())
    }

    async fn delete_channel(
        &self,
        user: &User,
        channel_id: ChannelId,
    ) -> Result<(), ServiceError> {
        self.owned_channel(user, channel_id)?;

        self.channels.remove(&channel_id);
        self.posts.retain(|_, p| p.channel_id != channel_id);
        for mut followed in self.follows.iter_mut() {
            followed.remove(&channel_id);
        }

        debug!(channel_id, "Channel deleted");
        Ok(())
    }

    async fn create_post(
        &self,
        user: &User,
        req: CreatePostRequest,
    ) -> Result<Post, ServiceError> {
        validate_post_content(&req.content)?;
        self.owned_channel(user, req.channel_id)?;

        let post = Post {
            id: self.next_post_id.fetch_add(1, Ordering::Relaxed),
            channel_id: req.channel_id,
            author_id: user.id,
            content: req.content,
            created_at: Utc::now(),
        };
        self.posts.insert(post.id, post.clone());

        // A concurrent delete_channel may have swept posts before this insert
        if !self.channels.contains_key(&post.channel_id) {
            self.posts.remove(&post.id);
            return Err(ServiceError::NotFound("channel"));
        }

        debug!(post_id = post.id, channel_id = post.channel_id, "Post created");
        Ok(post)
    }

    async fn posts_in_channel(
        &self,
        _user: &User,
        channel_id: ChannelId,
    ) -> Result<Vec<Post>, ServiceError> {
        self.channel(channel_id)?;
        Ok(self.posts_where(|p| p.channel_id == channel_id))
    }

    async fn delete_post(&self, user: &User, post_id: PostId) -> Result<(), ServiceError> {
        let author_id = self
            .posts
            .get(&post_id)
            .map(|p| p.author_id)
            .ok_or(ServiceError::NotFound("post"))?;
        if author_id != user.id {
            return Err(ServiceError::Forbidden);
        }

        self.posts.remove(&post_id);
        debug!(post_id, "Post deleted");
        Ok(())
    }

    async fn posts_in_owned_channels(&self, user: &User) -> Result<Vec<Post>, ServiceError> {
        let owned: HashSet<ChannelId> = self
            .channels
            .iter()
            .filter(|c| c.owner_id == user.id)
            .map(|c| c.id)
            .collect();
        Ok(self.posts_where(|p| owned.contains(&p.channel_id)))
    }

    async fn follow(&self, user: &User, channel_id: ChannelId) -> Result<(), ServiceError> {
        self.channel(channel_id)?;

        let inserted = self
            .follows
            .entry(user.id)
            .or_default()
            .insert(channel_id);
        if !inserted {
            return Err(ServiceError::AlreadyFollowing);
        }

        // Same race as create_post: never keep a follow of a deleted channel
        if !self.channels.contains_key(&channel_id) {
            if let Some(mut followed) = self.follows.get_mut(&user.id) {
                followed.remove(&channel_id);
            }
            return Err(ServiceError::NotFound("channel"));
        }

        debug!(user_id = user.id, channel_id, "Channel followed");
        Ok(())
    }

    async fn unfollow(&self, user: &User, channel_id: ChannelId) -> Result<(), ServiceError> {
        let removed = self
            .follows
            .get_mut(&user.id)
            .map(|mut followed| followed.remove(&channel_id))
            .unwrap_or(false);
        if !removed {
            return Err(ServiceError::NotFollowing);
        }

        debug!(user_id = user.id, channel_id, "Channel unfollowed");
        Ok(())
    }

    async fn feed(&self, user: &User, limit: Option<usize>) -> Result<Vec<Post>, ServiceError> {
        let followed = self.followed_ids(user.id);
        let mut posts = self.posts_where(|p| followed.contains(&p.channel_id));
        posts.truncate(effective_feed_limit(limit));
        Ok(posts)
    }

    async fn following(&self, user: &User) -> Result<Vec<Channel>, ServiceError> {
        let followed = self.followed_ids(user.id);
        let mut channels: Vec<Channel> = followed
            .iter()
            .filter_map(|id| self.channels.get(id).map(|c| c.value().clone()))
            .collect();
        channels.sort_by_key(|c| c.id);
        Ok(channels)
    }
}

impl MemoryServices {
    fn followed_ids(&self, user_id: UserId) -> HashSet<ChannelId> {
        self.follows
            .get(&user_id)
            .map(|f| f.value().clone())
            .unwrap_or_default()
    }
}

fn sort_newest_first(posts: &mut [Post]) {
    posts.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| b.id.cmp(&a.id))
    });
}

// === Validation ===

fn validate_username(username: &str) -> Result<(), ServiceError> {
    let valid = !username.is_empty()
        && username.len() <= MAX_USERNAME_LEN
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    if !valid {
        return Err(ServiceError::InvalidInput(
            "username must be 1-32 characters of letters, digits, '_', '.' or '-'",
        ));
    }
    Ok(())
}

fn validate_person_name(name: &str, message: &'static str) -> Result<(), ServiceError> {
    let len = name.trim().chars().count();
    if len == 0 || name.chars().count() > MAX_PERSON_NAME_LEN {
        return Err(ServiceError::InvalidInput(message));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ServiceError> {
    let len = password.chars().count();
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
        return Err(ServiceError::InvalidInput(
            "password must be 6-128 characters",
        ));
    }
    Ok(())
}

fn validate_channel_name(name: &str) -> Result<(), ServiceError> {
    if name.trim().is_empty() || name.chars().count() > MAX_CHANNEL_NAME_LEN {
        return Err(ServiceError::InvalidInput(
            "channel name must be 1-64 characters",
        ));
    }
    Ok(())
}

fn validate_description(description: &str) -> Result<(), ServiceError> {
    if description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(ServiceError::InvalidInput(
            "description must be at most 512 characters",
        ));
    }
    Ok(())
}

fn validate_post_content(content: &str) -> Result<(), ServiceError> {
    if content.trim().is_empty() || content.chars().count() > MAX_POST_LEN {
        return Err(ServiceError::InvalidInput(
            "post content must be 1-4096 characters",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_config() -> Config {
        Config {
            password_iterations: 1_000,
            ..Config::from_env()
        }
    }

    fn services() -> MemoryServices {
        MemoryServices::new(test_config())
    }

    fn signup_request(username: &str) -> SignupRequest {
        SignupRequest {
            username: username.to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            password: "hunter22".to_string(),
        }
    }

    async fn user(services: &MemoryServices, username: &str) -> User {
        services.signup(signup_request(username)).await.unwrap()
    }

    async fn channel(services: &MemoryServices, owner: &User, name: &str) -> Channel {
        services
            .create_channel(
                owner,
                CreateChannelRequest {
                    name: name.to_string(),
                    description: String::new(),
                },
            )
            .await
            .unwrap()
    }

    async fn post(services: &MemoryServices, author: &User, channel_id: ChannelId) -> Post {
        services
            .create_post(
                author,
                CreatePostRequest {
                    channel_id,
                    content: "hello".to_string(),
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn signup_assigns_sequential_ids() {
        let services = services();

        assert_eq!(user(&services, "alice").await.id, 1);
        assert_eq!(user(&services, "bob").await.id, 2);
    }

    #[tokio::test]
    async fn signup_rejects_duplicate_username() {
        let services = services();
        user(&services, "alice").await;

        let err = services.signup(signup_request("alice")).await.unwrap_err();
        assert!(matches!(err, ServiceError::UsernameTaken));
    }

    #[tokio::test]
    async fn signup_validates_input() {
        let services = services();

        let mut req = signup_request("bad name");
        assert!(matches!(
            services.signup(req.clone()).await,
            Err(ServiceError::InvalidInput(_))
        ));

        req.username = "fine".into();
        req.password = "short".into();
        assert!(matches!(
            services.signup(req.clone()).await,
            Err(ServiceError::InvalidInput(_))
        ));

        req.password = "long-enough".into();
        req.first_name = "   ".into();
        assert!(matches!(
            services.signup(req).await,
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn login_then_authenticate() {
        let services = services();
        let alice = user(&services, "alice").await;

        let session = services
            .login(LoginRequest {
                username: "alice".into(),
                password: "hunter22".into(),
            })
            .await
            .unwrap();

        assert!(session.expires_at > Utc::now());
        assert_eq!(services.authenticate(&session.token).await.unwrap(), alice);
        assert!(matches!(
            services.authenticate("not-a-token").await,
            Err(ServiceError::InvalidSession)
        ));
    }

    #[tokio::test]
    async fn login_rejects_bad_credentials() {
        let services = services();
        user(&services, "alice").await;

        let wrong_password = services
            .login(LoginRequest {
                username: "alice".into(),
                password: "wrong-password".into(),
            })
            .await;
        assert!(matches!(wrong_password, Err(ServiceError::InvalidCredentials)));

        let unknown_user = services
            .login(LoginRequest {
                username: "mallory".into(),
                password: "hunter22".into(),
            })
            .await;
        assert!(matches!(unknown_user, Err(ServiceError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn expired_sessions_are_rejected_and_swept() {
        let services = MemoryServices::new(Config {
            session_ttl: Duration::ZERO,
            ..test_config()
        });
        user(&services, "alice").await;

        let session = services
            .login(LoginRequest {
                username: "alice".into(),
                password: "hunter22".into(),
            })
            .await
            .unwrap();
        assert_eq!(services.session_count(), 1);
        assert_eq!(services.cleanup_expired_sessions(), 1);
        assert_eq!(services.session_count(), 0);

        assert!(matches!(
            services.authenticate(&session.token).await,
            Err(ServiceError::InvalidSession)
        ));
    }

    #[tokio::test]
    async fn only_owner_can_modify_channel() {
        let services = services();
        let alice = user(&services, "alice").await;
        let bob = user(&services, "bob").await;
        let news = channel(&services, &alice, "news").await;

        let update = UpdateChannelRequest {
            id: news.id,
            name: Some("breaking".into()),
            description: None,
        };
        assert!(matches!(
            services.update_channel(&bob, update.clone()).await,
            Err(ServiceError::Forbidden)
        ));

        let updated = services.update_channel(&alice, update).await.unwrap();
        assert_eq!(updated.name, "breaking");
        assert_eq!(updated.description, "");

        assert!(matches!(
            services.delete_channel(&bob, news.id).await,
            Err(ServiceError::Forbidden)
        ));
        assert!(matches!(
            services.delete_channel(&alice, 999).await,
            Err(ServiceError::NotFound("channel"))
        ));
    }

    #[tokio::test]
    async fn channels_owned_by_lists_only_own_channels() {
        let services = services();
        let alice = user(&services, "alice").await;
        let bob = user(&services, "bob").await;
        channel(&services, &alice, "one").await;
        channel(&services, &bob, "two").await;
        channel(&services, &alice, "three").await;

        let names: Vec<String> = services
            .channels_owned_by(&alice)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, ["one", "three"]);
    }

    #[tokio::test]
    async fn only_channel_owner_can_post() {
        let services = services();
        let alice = user(&services, "alice").await;
        let bob = user(&services, "bob").await;
        let news = channel(&services, &alice, "news").await;

        let req = CreatePostRequest {
            channel_id: news.id,
            content: "hi".into(),
        };
        assert!(matches!(
            services.create_post(&bob, req).await,
            Err(ServiceError::Forbidden)
        ));

        let empty = CreatePostRequest {
            channel_id: news.id,
            content: "  ".into(),
        };
        assert!(matches!(
            services.create_post(&alice, empty).await,
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn posts_are_listed_newest_first() {
        let services = services();
        let alice = user(&services, "alice").await;
        let news = channel(&services, &alice, "news").await;

        let first = post(&services, &alice, news.id).await;
        let second = post(&services, &alice, news.id).await;

        let ids: Vec<PostId> = services
            .posts_in_channel(&alice, news.id)
            .await
            .unwrap()
            .iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, [second.id, first.id]);

        assert!(matches!(
            services.posts_in_channel(&alice, 42).await,
            Err(ServiceError::NotFound("channel"))
        ));
    }

    #[tokio::test]
    async fn delete_post_checks_author() {
        let services = services();
        let alice = user(&services, "alice").await;
        let bob = user(&services, "bob").await;
        let news = channel(&services, &alice, "news").await;
        let p = post(&services, &alice, news.id).await;

        assert!(matches!(
            services.delete_post(&bob, p.id).await,
            Err(ServiceError::Forbidden)
        ));
        services.delete_post(&alice, p.id).await.unwrap();
        assert!(matches!(
            services.delete_post(&alice, p.id).await,
            Err(ServiceError::NotFound("post"))
        ));
    }

    #[tokio::test]
    async fn my_posts_cover_all_owned_channels() {
        let services = services();
        let alice = user(&services, "alice").await;
        let bob = user(&services, "bob").await;
        let a1 = channel(&services, &alice, "a1").await;
        let a2 = channel(&services, &alice, "a2").await;
        let b1 = channel(&services, &bob, "b1").await;

        post(&services, &alice, a1.id).await;
        post(&services, &alice, a2.id).await;
        post(&services, &bob, b1.id).await;

        let mine = services.posts_in_owned_channels(&alice).await.unwrap();
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().all(|p| p.author_id == alice.id));
    }

    #[tokio::test]
    async fn follow_unfollow_and_feed() {
        let services = services();
        let alice = user(&services, "alice").await;
        let bob = user(&services, "bob").await;
        let news = channel(&services, &alice, "news").await;
        let other = channel(&services, &alice, "other").await;

        services.follow(&bob, news.id).await.unwrap();
        assert!(matches!(
            services.follow(&bob, news.id).await,
            Err(ServiceError::AlreadyFollowing)
        ));
        assert!(matches!(
            services.follow(&bob, 404).await,
            Err(ServiceError::NotFound("channel"))
        ));

        let followed = post(&services, &alice, news.id).await;
        post(&services, &alice, other.id).await;

        let feed = services.feed(&bob, None).await.unwrap();
        assert_eq!(feed, vec![followed]);

        let following = services.following(&bob).await.unwrap();
        assert_eq!(following, vec![news.clone()]);

        services.unfollow(&bob, news.id).await.unwrap();
        assert!(services.feed(&bob, None).await.unwrap().is_empty());
        assert!(matches!(
            services.unfollow(&bob, news.id).await,
            Err(ServiceError::NotFollowing)
        ));
    }

    #[tokio::test]
    async fn unfollow_without_any_follows() {
        let services = services();
        let alice = user(&services, "alice").await;

        assert!(matches!(
            services.unfollow(&alice, 1).await,
            Err(ServiceError::NotFollowing)
        ));
    }

    #[tokio::test]
    async fn feed_respects_limit() {
        let services = services();
        let alice = user(&services, "alice").await;
        let bob = user(&services, "bob").await;
        let news = channel(&services, &alice, "news").await;
        services.follow(&bob, news.id).await.unwrap();

        for _ in 0..5 {
            post(&services, &alice, news.id).await;
        }

        assert_eq!(services.feed(&bob, Some(3)).await.unwrap().len(), 3);
        assert_eq!(services.feed(&bob, Some(0)).await.unwrap().len(), 1);
        assert_eq!(services.feed(&bob, None).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn deleting_channel_drops_posts_and_follows() {
        let services = services();
        let alice = user(&services, "alice").await;
        let bob = user(&services, "bob").await;
        let news = channel(&services, &alice, "news").await;
        post(&services, &alice, news.id).await;
        services.follow(&bob, news.id).await.unwrap();

        services.delete_channel(&alice, news.id).await.unwrap();

        assert!(services.posts_in_owned_channels(&alice).await.unwrap().is_empty());
        assert!(services.following(&bob).await.unwrap().is_empty());
        assert!(services.feed(&bob, None).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn posts_and_follows_racing_channel_delete_leave_no_orphans() {
        let services = Arc::new(services());
        let alice = user(&services, "alice").await;
        let bob = user(&services, "bob").await;

        for round in 0..50 {
            let channel_id = channel(&services, &alice, &format!("news{round}")).await.id;

            let writers: Vec<_> = (0..4)
                .map(|_| {
                    let services = services.clone();
                    let (alice, bob) = (alice.clone(), bob.clone());
                    tokio::spawn(async move {
                        let req = CreatePostRequest {
                            channel_id,
                            content: "racing".to_string(),
                        };
                        let _ = services.create_post(&alice, req).await;
                        let _ = services.follow(&bob, channel_id).await;
                    })
                })
                .collect();
            let deleter = {
                let services = services.clone();
                let alice = alice.clone();
                tokio::spawn(async move { services.delete_channel(&alice, channel_id).await })
            };

            for writer in writers {
                writer.await.unwrap();
            }
            deleter.await.unwrap().unwrap();
        }

        assert!(services.channels.is_empty());
        assert!(services.posts.is_empty());
        assert!(services.followed_ids(bob.id).is_empty());
    }
}
