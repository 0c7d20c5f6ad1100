//! In-memory storage backend.
//!
//! Every table sits behind one `parking_lot::RwLock`, so each repository call
//! is a single critical section: the existence check and the write of an
//! edge insert cannot interleave with another caller. Nothing is persisted.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use super::{
    CommentRepository, FollowRepository, LikeRepository, NotificationRepository, PostRepository,
    UserRepository,
};
use crate::error::{AppError, Result};
use crate::models::{
    comment::{Comment, NewComment},
    follow::Follow,
    like::Like,
    notification::{NewNotification, Notification},
    post::{NewPost, Post, PostChanges, PostFilter, PostSortField},
    user::{NewUser, ProfileChanges, User},
};

#[derive(Default)]
struct Tables {
    users: BTreeMap<i64, User>,
    follows: BTreeMap<(i64, i64), Follow>,
    posts: BTreeMap<i64, Post>,
    likes: BTreeMap<(i64, i64), Like>,
    comments: BTreeMap<i64, Comment>,
    notifications: BTreeMap<i64, Notification>,
    user_seq: i64,
    post_seq: i64,
    comment_seq: i64,
    notification_seq: i64,
}

fn next_id(seq: &mut i64) -> i64 {
    *seq += 1;
    *seq
}

fn window<T>(items: Vec<T>, offset: u64, limit: u64) -> (Vec<T>, u64) {
    let total = items.len() as u64;
    let page = items
        .into_iter()
        .skip(usize::try_from(offset).unwrap_or(usize::MAX))
        .take(usize::try_from(limit).unwrap_or(usize::MAX))
        .collect();
    (page, total)
}

fn newest_first(a: &Post, b: &Post) -> Ordering {
    b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id))
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn insert(&self, user: NewUser) -> Result<User> {
        let mut tables = self.tables.write();

        let email = user.email.to_lowercase();
        for existing in tables.users.values() {
            if existing.username == user.username {
                return Err(AppError::conflict("A user with that username already exists."));
            }
            if existing.email.to_lowercase() == email {
                return Err(AppError::conflict("A user with that email already exists."));
            }
        }

        let id = next_id(&mut tables.user_seq);
        let created = User {
            id,
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            bio: None,
            profile_picture: None,
            created_at: user.created_at,
            updated_at: user.created_at,
        };
        tables.users.insert(id, created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        Ok(self.tables.read().users.get(&id).cloned())
    }

    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<User>> {
        let tables = self.tables.read();
        Ok(ids.iter().filter_map(|id| tables.users.get(id).cloned()).collect())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let tables = self.tables.read();
        Ok(tables.users.values().find(|u| u.username == username).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = email.to_lowercase();
        let tables = self.tables.read();
        Ok(tables
            .users
            .values()
            .find(|u| u.email.to_lowercase() == email)
            .cloned())
    }

    async fn update_profile(
        &self,
        id: i64,
        changes: ProfileChanges,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<User>> {
        let mut tables = self.tables.write();
        let Some(user) = tables.users.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(bio) = changes.bio {
            user.bio = Some(bio);
        }
        if let Some(picture) = changes.profile_picture {
            user.profile_picture = Some(picture);
        }
        user.updated_at = updated_at;
        Ok(Some(user.clone()))
    }
}

#[async_trait]
impl FollowRepository for MemoryStore {
    async fn insert(&self, follower_id: i64, followee_id: i64, created_at: DateTime<Utc>) -> Result<bool> {
        if follower_id == followee_id {
            return Err(AppError::self_action("Cannot follow yourself."));
        }
        let mut tables = self.tables.write();
        if tables.follows.contains_key(&(follower_id, followee_id)) {
            return Ok(false);
        }
        tables.follows.insert(
            (follower_id, followee_id),
            Follow {
                follower_id,
                followee_id,
                created_at,
            },
        );
        Ok(true)
    }

    async fn delete(&self, follower_id: i64, followee_id: i64) -> Result<bool> {
        Ok(self
            .tables
            .write()
            .follows
            .remove(&(follower_id, followee_id))
            .is_some())
    }

    async fn exists(&self, follower_id: i64, followee_id: i64) -> Result<bool> {
        Ok(self.tables.read().follows.contains_key(&(follower_id, followee_id)))
    }

    async fn following_ids(&self, user_id: i64) -> Result<Vec<i64>> {
        // keys are ordered by (follower, followee), so this is already ascending
        Ok(self
            .tables
            .read()
            .follows
            .range((user_id, i64::MIN)..=(user_id, i64::MAX))
            .map(|((_, followee), _)| *followee)
            .collect())
    }

    async fn follower_ids(&self, user_id: i64) -> Result<Vec<i64>> {
        let mut ids: Vec<i64> = self
            .tables
            .read()
            .follows
            .keys()
            .filter(|(_, followee)| *followee == user_id)
            .map(|(follower, _)| *follower)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn count_following(&self, user_id: i64) -> Result<u64> {
        Ok(self.following_ids(user_id).await?.len() as u64)
    }

    async fn count_followers(&self, user_id: i64) -> Result<u64> {
        Ok(self
            .tables
            .read()
            .follows
            .keys()
            .filter(|(_, followee)| *followee == user_id)
            .count() as u64)
    }
}

#[async_trait]
impl PostRepository for MemoryStore {
    async fn insert(&self, post: NewPost) -> Result<Post> {
        let mut tables = self.tables.write();
        if !tables.users.contains_key(&post.author_id) {
            return Err(AppError::not_found("User"));
        }
        let id = next_id(&mut tables.post_seq);
        let created = Post {
            id,
            author_id: post.author_id,
            title: post.title,
            content: post.content,
            created_at: post.created_at,
            updated_at: post.created_at,
        };
        tables.posts.insert(id, created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Post>> {
        Ok(self.tables.read().posts.get(&id).cloned())
    }

    async fn update(&self, id: i64, changes: PostChanges, updated_at: DateTime<Utc>) -> Result<Option<Post>> {
        let mut tables = self.tables.write();
        let Some(post) = tables.posts.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(title) = changes.title {
            post.title = title;
        }
        if let Some(content) = changes.content {
            post.content = content;
        }
        post.updated_at = updated_at;
        Ok(Some(post.clone()))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let mut tables = self.tables.write();
        if tables.posts.remove(&id).is_none() {
            return Ok(false);
        }
        tables.likes.retain(|(_, post_id), _| *post_id != id);
        tables.comments.retain(|_, comment| comment.post_id != id);
        Ok(true)
    }

    async fn list(&self, filter: &PostFilter, offset: u64, limit: u64) -> Result<(Vec<Post>, u64)> {
        let tables = self.tables.read();
        let needle = filter.search.as_ref().map(|s| s.to_lowercase());

        let mut posts: Vec<Post> = tables
            .posts
            .values()
            .filter(|post| filter.author_id.map_or(true, |author| post.author_id == author))
            .filter(|post| match &needle {
                None => true,
                Some(needle) => {
                    let author_matches = tables
                        .users
                        .get(&post.author_id)
                        .map_or(false, |u| u.username.to_lowercase().contains(needle.as_str()));
                    post.title.to_lowercase().contains(needle.as_str())
                        || post.content.to_lowercase().contains(needle.as_str())
                        || author_matches
                }
            })
            .cloned()
            .collect();

        let ordering = filter.ordering;
        posts.sort_by(|a, b| {
            let by_field = match ordering.field {
                PostSortField::CreatedAt => a.created_at.cmp(&b.created_at),
                PostSortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
                PostSortField::Title => a.title.cmp(&b.title),
            }
            .then(a.id.cmp(&b.id));
            if ordering.descending {
                by_field.reverse()
            } else {
                by_field
            }
        });

        Ok(window(posts, offset, limit))
    }

    async fn list_by_authors(&self, author_ids: &[i64], offset: u64, limit: u64) -> Result<(Vec<Post>, u64)> {
        if author_ids.is_empty() {
            return Ok((Vec::new(), 0));
        }
        let tables = self.tables.read();
        let mut posts: Vec<Post> = tables
            .posts
            .values()
            .filter(|post| author_ids.contains(&post.author_id))
            .cloned()
            .collect();
        posts.sort_by(newest_first);
        Ok(window(posts, offset, limit))
    }
}

#[async_trait]
impl LikeRepository for MemoryStore {
    async fn insert(&self, user_id: i64, post_id: i64, created_at: DateTime<Utc>) -> Result<bool> {
        let mut tables = self.tables.write();
        if !tables.posts.contains_key(&post_id) {
            return Err(AppError::not_found("Post"));
        }
        if tables.likes.contains_key(&(user_id, post_id)) {
            return Ok(false);
        }
        tables.likes.insert(
            (user_id, post_id),
            Like {
                user_id,
                post_id,
                created_at,
            },
        );
        Ok(true)
    }

    async fn delete(&self, user_id: i64, post_id: i64) -> Result<bool> {
        Ok(self.tables.write().likes.remove(&(user_id, post_id)).is_some())
    }

    async fn exists(&self, user_id: i64, post_id: i64) -> Result<bool> {
        Ok(self.tables.read().likes.contains_key(&(user_id, post_id)))
    }

    async fn count_for_post(&self, post_id: i64) -> Result<u64> {
        Ok(self
            .tables
            .read()
            .likes
            .keys()
            .filter(|(_, liked)| *liked == post_id)
            .count() as u64)
    }
}

#[async_trait]
impl CommentRepository for MemoryStore {
    async fn insert(&self, comment: NewComment) -> Result<Comment> {
        let mut tables = self.tables.write();
        if !tables.posts.contains_key(&comment.post_id) {
            return Err(AppError::not_found("Post"));
        }
        let id = next_id(&mut tables.comment_seq);
        let created = Comment {
            id,
            post_id: comment.post_id,
            author_id: comment.author_id,
            content: comment.content,
            created_at: comment.created_at,
            updated_at: comment.created_at,
        };
        tables.comments.insert(id, created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Comment>> {
        Ok(self.tables.read().comments.get(&id).cloned())
    }

    async fn update(&self, id: i64, content: String, updated_at: DateTime<Utc>) -> Result<Option<Comment>> {
        let mut tables = self.tables.write();
        let Some(comment) = tables.comments.get_mut(&id) else {
            return Ok(None);
        };
        comment.content = content;
        comment.updated_at = updated_at;
        Ok(Some(comment.clone()))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        Ok(self.tables.write().comments.remove(&id).is_some())
    }

    async fn list(&self, post_id: Option<i64>, offset: u64, limit: u64) -> Result<(Vec<Comment>, u64)> {
        let tables = self.tables.read();
        let mut comments: Vec<Comment> = tables
            .comments
            .values()
            .filter(|c| post_id.map_or(true, |post| c.post_id == post))
            .cloned()
            .collect();
        comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(window(comments, offset, limit))
    }
}

#[async_trait]
impl NotificationRepository for MemoryStore {
    async fn insert(&self, notification: NewNotification) -> Result<Notification> {
        let mut tables = self.tables.write();
        let id = next_id(&mut tables.notification_seq);
        let created = Notification {
            id,
            recipient_id: notification.recipient_id,
            actor_id: notification.actor_id,
            verb: notification.verb,
            target: notification.target,
            is_read: false,
            created_at: notification.created_at,
        };
        tables.notifications.insert(id, created.clone());
        Ok(created)
    }

    async fn list_for_recipient(&self, recipient_id: i64) -> Result<Vec<Notification>> {
        let tables = self.tables.read();
        let mut notifications: Vec<Notification> = tables
            .notifications
            .values()
            .filter(|n| n.recipient_id == recipient_id)
            .cloned()
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(notifications)
    }

    async fn mark_read(&self, id: i64, recipient_id: i64) -> Result<bool> {
        let mut tables = self.tables.write();
        match tables.notifications.get_mut(&id) {
            Some(n) if n.recipient_id == recipient_id => {
                n.is_read = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_all_read(&self, recipient_id: i64) -> Result<u64> {
        let mut tables = self.tables.write();
        let mut updated = 0;
        for n in tables.notifications.values_mut() {
            if n.recipient_id == recipient_id && !n.is_read {
                n.is_read = true;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn count_unread(&self, recipient_id: i64) -> Result<u64> {
        Ok(self
            .tables
            .read()
            .notifications
            .values()
            .filter(|n| n.recipient_id == recipient_id && !n.is_read)
            .count() as u64)
    }
}
