use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::{debug, info};

use super::{
    CommentRepository, FollowRepository, LikeRepository, NotificationRepository, PostRepository,
    UserRepository,
};
use crate::error::{AppError, Result};
use crate::models::{
    comment::{Comment, NewComment},
    notification::{NewNotification, Notification, NotificationRow},
    post::{NewPost, Post, PostChanges, PostFilter, PostSortField},
    user::{NewUser, ProfileChanges, User},
};

/// PostgreSQL backend. Uniqueness of follow and like edges is enforced by
/// primary keys; inserts use `ON CONFLICT DO NOTHING` and report whether a
/// row was written.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        info!("Connecting to PostgreSQL (max {} connections)", max_connections);
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to run migrations: {}", e)))?;
        info!("Database migrations applied");
        Ok(())
    }

    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn map_insert_error(err: sqlx::Error, missing: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => AppError::not_found(missing),
        _ => AppError::Database(err),
    }
}

fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl UserRepository for PgStore {
    async fn insert(&self, user: NewUser) -> Result<User> {
        let result = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password_hash, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING *
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .fetch_one(&self.pool)
        .await;

        result.map_err(|err| match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                if db.constraint() == Some("users_username_key") {
                    AppError::conflict("A user with that username already exists.")
                } else {
                    AppError::conflict("A user with that email already exists.")
                }
            }
            _ => AppError::Database(err),
        })
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_ids(&self, ids: &[i64]) -> Result<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let users = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(ids
            .iter()
            .filter_map(|id| users.iter().find(|u| u.id == *id).cloned())
            .collect())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn update_profile(
        &self,
        id: i64,
        changes: ProfileChanges,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET bio = COALESCE($2, bio),
                profile_picture = COALESCE($3, profile_picture),
                updated_at = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(changes.bio)
        .bind(changes.profile_picture)
        .bind(updated_at)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }
}

#[async_trait]
impl FollowRepository for PgStore {
    async fn insert(&self, follower_id: i64, followee_id: i64, created_at: DateTime<Utc>) -> Result<bool> {
        if follower_id == followee_id {
            return Err(AppError::self_action("Cannot follow yourself."));
        }
        let result = sqlx::query(
            r#"
            INSERT INTO follows (follower_id, followee_id, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (follower_id, followee_id) DO NOTHING
            "#,
        )
        .bind(follower_id)
        .bind(followee_id)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, "User"))?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete(&self, follower_id: i64, followee_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM follows WHERE follower_id = $1 AND followee_id = $2")
            .bind(follower_id)
            .bind(followee_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn exists(&self, follower_id: i64, followee_id: i64) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM follows WHERE follower_id = $1 AND followee_id = $2)",
        )
        .bind(follower_id)
        .bind(followee_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn following_ids(&self, user_id: i64) -> Result<Vec<i64>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT followee_id FROM follows WHERE follower_id = $1 ORDER BY followee_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn follower_ids(&self, user_id: i64) -> Result<Vec<i64>> {
        let ids: Vec<i64> = sqlx::query_scalar(
            "SELECT follower_id FROM follows WHERE followee_id = $1 ORDER BY follower_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn count_following(&self, user_id: i64) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE follower_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn count_followers(&self, user_id: i64) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM follows WHERE followee_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

#[async_trait]
impl PostRepository for PgStore {
    async fn insert(&self, post: NewPost) -> Result<Post> {
        sqlx::query_as::<_, Post>(
            r#"
            INSERT INTO posts (author_id, title, content, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING *
            "#,
        )
        .bind(post.author_id)
        .bind(&post.title)
        .bind(&post.content)
        .bind(post.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, "User"))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Post>> {
        let post = sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(post)
    }

    async fn update(&self, id: i64, changes: PostChanges, updated_at: DateTime<Utc>) -> Result<Option<Post>> {
        let post = sqlx::query_as::<_, Post>(
            r#"
            UPDATE posts
            SET title = COALESCE($2, title),
                content = COALESCE($3, content),
                updated_at = $4
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(changes.title)
        .bind(changes.content)
        .bind(updated_at)
        .fetch_optional(&self.pool)
        .await?;
        Ok(post)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        // likes and comments go with the post via ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, filter: &PostFilter, offset: u64, limit: u64) -> Result<(Vec<Post>, u64)> {
        let column = match filter.ordering.field {
            PostSortField::CreatedAt => "p.created_at",
            PostSortField::UpdatedAt => "p.updated_at",
            PostSortField::Title => "p.title",
        };
        let direction = if filter.ordering.descending { "DESC" } else { "ASC" };
        let pattern = filter.search.as_deref().map(like_pattern);

        let predicate = r#"
            FROM posts p
            JOIN users u ON u.id = p.author_id
            WHERE ($1::BIGINT IS NULL OR p.author_id = $1)
              AND ($2::TEXT IS NULL
                   OR p.title ILIKE $2
                   OR p.content ILIKE $2
                   OR u.username ILIKE $2)
        "#;

        let query = format!(
            "SELECT p.* {} ORDER BY {} {}, p.id {} LIMIT $3 OFFSET $4",
            predicate, column, direction, direction
        );
        debug!("Listing posts: {}", query);

        let posts = sqlx::query_as::<_, Post>(&query)
            .bind(filter.author_id)
            .bind(&pattern)
            .bind(to_i64(limit))
            .bind(to_i64(offset))
            .fetch_all(&self.pool)
            .await?;

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) {}", predicate))
            .bind(filter.author_id)
            .bind(&pattern)
            .fetch_one(&self.pool)
            .await?;

        Ok((posts, total as u64))
    }

    async fn list_by_authors(&self, author_ids: &[i64], offset: u64, limit: u64) -> Result<(Vec<Post>, u64)> {
        if author_ids.is_empty() {
            return Ok((Vec::new(), 0));
        }

        let posts = sqlx::query_as::<_, Post>(
            r#"
            SELECT * FROM posts
            WHERE author_id = ANY($1)
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(author_ids)
        .bind(to_i64(limit))
        .bind(to_i64(offset))
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE author_id = ANY($1)")
            .bind(author_ids)
            .fetch_one(&self.pool)
            .await?;

        Ok((posts, total as u64))
    }
}

#[async_trait]
impl LikeRepository for PgStore {
    async fn insert(&self, user_id: i64, post_id: i64, created_at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO likes (user_id, post_id, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, post_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(post_id)
        .bind(created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, "Post"))?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete(&self, user_id: i64, post_id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM likes WHERE user_id = $1 AND post_id = $2")
            .bind(user_id)
            .bind(post_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn exists(&self, user_id: i64, post_id: i64) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM likes WHERE user_id = $1 AND post_id = $2)",
        )
        .bind(user_id)
        .bind(post_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn count_for_post(&self, post_id: i64) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }
}

#[async_trait]
impl CommentRepository for PgStore {
    async fn insert(&self, comment: NewComment) -> Result<Comment> {
        sqlx::query_as::<_, Comment>(
            r#"
            INSERT INTO comments (post_id, author_id, content, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            RETURNING *
            "#,
        )
        .bind(comment.post_id)
        .bind(comment.author_id)
        .bind(&comment.content)
        .bind(comment.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, "Post"))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Comment>> {
        let comment = sqlx::query_as::<_, Comment>("SELECT * FROM comments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(comment)
    }

    async fn update(&self, id: i64, content: String, updated_at: DateTime<Utc>) -> Result<Option<Comment>> {
        let comment = sqlx::query_as::<_, Comment>(
            "UPDATE comments SET content = $2, updated_at = $3 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(content)
        .bind(updated_at)
        .fetch_optional(&self.pool)
        .await?;
        Ok(comment)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(&self, post_id: Option<i64>, offset: u64, limit: u64) -> Result<(Vec<Comment>, u64)> {
        let comments = sqlx::query_as::<_, Comment>(
            r#"
            SELECT * FROM comments
            WHERE ($1::BIGINT IS NULL OR post_id = $1)
            ORDER BY created_at ASC, id ASC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(post_id)
        .bind(to_i64(limit))
        .bind(to_i64(offset))
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM comments WHERE ($1::BIGINT IS NULL OR post_id = $1)",
        )
        .bind(post_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((comments, total as u64))
    }
}

#[async_trait]
impl NotificationRepository for PgStore {
    async fn insert(&self, notification: NewNotification) -> Result<Notification> {
        let row = sqlx::query_as::<_, NotificationRow>(
            r#"
            INSERT INTO notifications (recipient_id, actor_id, verb, target_kind, target_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(notification.recipient_id)
        .bind(notification.actor_id)
        .bind(notification.verb.as_str())
        .bind(notification.target.map(|t| t.kind()))
        .bind(notification.target.map(|t| t.id()))
        .bind(notification.created_at)
        .fetch_one(&self.pool)
        .await?;

        Notification::try_from(row)
    }

    async fn list_for_recipient(&self, recipient_id: i64) -> Result<Vec<Notification>> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT * FROM notifications
            WHERE recipient_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(recipient_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Notification::try_from).collect()
    }

    async fn mark_read(&self, id: i64, recipient_id: i64) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE WHERE id = $1 AND recipient_id = $2",
        )
        .bind(id)
        .bind(recipient_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_all_read(&self, recipient_id: i64) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE WHERE recipient_id = $1 AND is_read = FALSE",
        )
        .bind(recipient_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn count_unread(&self, recipient_id: i64) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE recipient_id = $1 AND is_read = FALSE",
        )
        .bind(recipient_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("plain"), "%plain%");
    }

    // The tests below need a PostgreSQL server; run them with
    // `DATABASE_URL=postgres://... cargo test -- --ignored`.

    async fn user(store: &PgStore, name: &str) -> i64 {
        UserRepository::insert(
            store,
            NewUser {
                username: name.to_string(),
                email: format!("{}@example.com", name),
                password_hash: "x".to_string(),
                created_at: Utc::now(),
            },
        )
        .await
        .unwrap()
        .id
    }

    async fn post_by(store: &PgStore, author_id: i64) -> i64 {
        PostRepository::insert(
            store,
            NewPost {
                author_id,
                title: "hello".to_string(),
                content: "world".to_string(),
                created_at: Utc::now(),
            },
        )
        .await
        .unwrap()
        .id
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "Requires PostgreSQL database"]
    async fn duplicate_username_and_email_conflict(pool: PgPool) {
        let store = PgStore::from_pool(pool);
        user(&store, "alice").await;

        let err = UserRepository::insert(
            &store,
            NewUser {
                username: "alice".to_string(),
                email: "other@example.com".to_string(),
                password_hash: "x".to_string(),
                created_at: Utc::now(),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Conflict: A user with that username already exists.");

        let err = UserRepository::insert(
            &store,
            NewUser {
                username: "alice2".to_string(),
                email: "ALICE@example.com".to_string(),
                password_hash: "x".to_string(),
                created_at: Utc::now(),
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Conflict: A user with that email already exists.");
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "Requires PostgreSQL database"]
    async fn follow_edges_are_unique(pool: PgPool) {
        let store = PgStore::from_pool(pool);
        let a = user(&store, "alice").await;
        let b = user(&store, "bob").await;
        let now = Utc::now();

        assert!(FollowRepository::insert(&store, a, b, now).await.unwrap());
        assert!(!FollowRepository::insert(&store, a, b, now).await.unwrap());
        assert_eq!(store.count_followers(b).await.unwrap(), 1);

        let err = FollowRepository::insert(&store, a, a, now).await.unwrap_err();
        assert!(matches!(err, AppError::SelfAction(_)));

        let err = FollowRepository::insert(&store, a, 9_999, now).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore = "Requires PostgreSQL database"]
    async fn racing_like_inserts_write_one_row(pool: PgPool) {
        let store = PgStore::from_pool(pool);
        let a = user(&store, "alice").await;
        let b = user(&store, "bob").await;
        let post = post_by(&store, b).await;

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { LikeRepository::insert(&store, a, post, Utc::now()).await })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().unwrap() {
                created += 1;
            }
        }
        assert_eq!(created, 1);
        assert_eq!(store.count_for_post(post).await.unwrap(), 1);

        let err = LikeRepository::insert(&store, a, 9_999, Utc::now()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
