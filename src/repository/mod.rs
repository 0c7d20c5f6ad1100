//! Data-access contracts, one trait per entity.
//!
//! Services receive only the repositories they need. Two backends implement
//! every trait:
//!
//! | Backend | Module | Description |
//! |---------|--------|-------------|
//! | `MemoryStore` | `memory` | single-lock tables, used for tests and local runs |
//! | `PgStore` | `postgres` | sqlx over PostgreSQL with unique/check constraints |
//!
//! Edge inserts (`FollowRepository::insert`, `LikeRepository::insert`) report
//! whether a row was actually created. The store guarantees that concurrent
//! inserts of the same pair create exactly one row, so callers can attach
//! once-only side effects to a `true` result.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{
    comment::{Comment, NewComment},
    notification::{NewNotification, Notification},
    post::{NewPost, Post, PostChanges, PostFilter},
    user::{NewUser, ProfileChanges, User},
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `Conflict` when the username or email (case-insensitive) is taken.
    async fn insert(&self, user: NewUser) -> Result<User>;
    async fn find_by_id(&self, id: i64) -> Result<Option<User>>;
    /// Returns the found users in the order of `ids`; missing ids are skipped.
    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<User>>;
    async fn find_by_username(&self, username: &str) -> Result<Option<User>>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn update_profile(
        &self,
        id: i64,
        changes: ProfileChanges,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<User>>;
}

#[async_trait]
pub trait FollowRepository: Send + Sync {
    async fn insert(&self, follower_id: i64, followee_id: i64, created_at: DateTime<Utc>) -> Result<bool>;
    async fn delete(&self, follower_id: i64, followee_id: i64) -> Result<bool>;
    async fn exists(&self, follower_id: i64, followee_id: i64) -> Result<bool>;
    /// Ids of users `user_id` follows, ascending.
    async fn following_ids(&self, user_id: i64) -> Result<Vec<i64>>;
    /// Ids of users following `user_id`, ascending.
    async fn follower_ids(&self, user_id: i64) -> Result<Vec<i64>>;
    async fn count_following(&self, user_id: i64) -> Result<u64>;
    async fn count_followers(&self, user_id: i64) -> Result<u64>;
}

#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn insert(&self, post: NewPost) -> Result<Post>;
    async fn find_by_id(&self, id: i64) -> Result<Option<Post>>;
    async fn update(&self, id: i64, changes: PostChanges, updated_at: DateTime<Utc>) -> Result<Option<Post>>;
    /// Removes the post together with its likes and comments.
    async fn delete(&self, id: i64) -> Result<bool>;
    async fn list(&self, filter: &PostFilter, offset: u64, limit: u64) -> Result<(Vec<Post>, u64)>;
    /// Posts by any of `author_ids`, newest first with id as tie-breaker.
    async fn list_by_authors(&self, author_ids: &[i64], offset: u64, limit: u64) -> Result<(Vec<Post>, u64)>;
}

#[async_trait]
pub trait LikeRepository: Send + Sync {
    async fn insert(&self, user_id: i64, post_id: i64, created_at: DateTime<Utc>) -> Result<bool>;
    async fn delete(&self, user_id: i64, post_id: i64) -> Result<bool>;
    async fn exists(&self, user_id: i64, post_id: i64) -> Result<bool>;
    async fn count_for_post(&self, post_id: i64) -> Result<u64>;
}

#[async_trait]
pub trait CommentRepository: Send + Sync {
    async fn insert(&self, comment: NewComment) -> Result<Comment>;
    async fn find_by_id(&self, id: i64) -> Result<Option<Comment>>;
    async fn update(&self, id: i64, content: String, updated_at: DateTime<Utc>) -> Result<Option<Comment>>;
    async fn delete(&self, id: i64) -> Result<bool>;
    /// Oldest first, optionally restricted to one post.
    async fn list(&self, post_id: Option<i64>, offset: u64, limit: u64) -> Result<(Vec<Comment>, u64)>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert(&self, notification: NewNotification) -> Result<Notification>;
    /// Newest first, id descending on equal timestamps.
    async fn list_for_recipient(&self, recipient_id: i64) -> Result<Vec<Notification>>;
    async fn mark_read(&self, id: i64, recipient_id: i64) -> Result<bool>;
    async fn mark_all_read(&self, recipient_id: i64) -> Result<u64>;
    async fn count_unread(&self, recipient_id: i64) -> Result<u64>;
}
