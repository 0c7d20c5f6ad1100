use crate::{
    config::Config,
    error::{AppError, Result},
    models::{
        comment::*,
        notification::{NotificationTarget, NotificationVerb},
        response::PaginatedResult,
    },
    repository::{CommentRepository, PostRepository, UserRepository},
    services::NotificationService,
    utils::pagination::PageRequest,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};
use validator::Validate;

#[derive(Clone)]
pub struct CommentService {
    users: Arc<dyn UserRepository>,
    posts: Arc<dyn PostRepository>,
    comments: Arc<dyn CommentRepository>,
    notification_service: NotificationService,
}

impl CommentService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        posts: Arc<dyn PostRepository>,
        comments: Arc<dyn CommentRepository>,
        notification_service: NotificationService,
    ) -> Self {
        Self {
            users,
            posts,
            comments,
            notification_service,
        }
    }

    pub async fn create_comment(&self, user_id: i64, request: CreateCommentRequest) -> Result<CommentResponse> {
        debug!("Creating comment for post: {}", request.post);
        request.validate()?;

        let post = self
            .posts
            .find_by_id(request.post)
            .await?
            .ok_or_else(|| AppError::not_found("Post"))?;

        let comment = self
            .comments
            .insert(NewComment {
                post_id: post.id,
                author_id: user_id,
                content: request.content,
                created_at: Utc::now(),
            })
            .await?;

        self.notification_service
            .notify_best_effort(
                user_id,
                post.author_id,
                NotificationVerb::CommentedOnPost,
                Some(NotificationTarget::Comment(comment.id)),
            )
            .await;

        info!("User {} commented on post {}", user_id, post.id);
        self.to_response(comment).await
    }

    pub async fn get_comment(&self, comment_id: i64) -> Result<CommentResponse> {
        let comment = self.find_comment(comment_id).await?;
        self.to_response(comment).await
    }

    /// Oldest first. `query.post` narrows the listing to one post.
    pub async fn list_comments(
        &self,
        query: CommentListQuery,
        config: &Config,
    ) -> Result<PaginatedResult<CommentResponse>> {
        let page = PageRequest::resolve(query.page, query.page_size, config)?;

        if let Some(post_id) = query.post {
            if self.posts.find_by_id(post_id).await?.is_none() {
                return Err(AppError::not_found("Post"));
            }
        }

        let (comments, total) = self
            .comments
            .list(query.post, page.offset(), page.limit())
            .await?;

        let mut author_ids: Vec<i64> = comments.iter().map(|c| c.author_id).collect();
        author_ids.sort_unstable();
        author_ids.dedup();
        let authors = self.users.find_by_ids(&author_ids).await?;

        let data = comments
            .iter()
            .map(|c| {
                let username = authors
                    .iter()
                    .find(|u| u.id == c.author_id)
                    .map(|u| u.username.clone())
                    .unwrap_or_default();
                c.to_response(username)
            })
            .collect();

        Ok(PaginatedResult::new(data, total, page))
    }

    pub async fn update_comment(
        &self,
        comment_id: i64,
        user_id: i64,
        request: UpdateCommentRequest,
    ) -> Result<CommentResponse> {
        request.validate()?;

        let comment = self.find_comment(comment_id).await?;
        if comment.author_id != user_id {
            return Err(AppError::forbidden("You can only edit your own comments."));
        }

        let updated = self
            .comments
            .update(comment_id, request.content, Utc::now())
            .await?
            .ok_or_else(|| AppError::not_found("Comment"))?;

        info!("Updated comment {}", comment_id);
        self.to_response(updated).await
    }

    pub async fn delete_comment(&self, comment_id: i64, user_id: i64) -> Result<()> {
        let comment = self.find_comment(comment_id).await?;
        if comment.author_id != user_id {
            return Err(AppError::forbidden("You can only delete your own comments."));
        }

        self.comments.delete(comment_id).await?;
        info!("Deleted comment {}", comment_id);
        Ok(())
    }

    async fn find_comment(&self, comment_id: i64) -> Result<Comment> {
        self.comments
            .find_by_id(comment_id)
            .await?
            .ok_or_else(|| AppError::not_found("Comment"))
    }

    async fn to_response(&self, comment: Comment) -> Result<CommentResponse> {
        let username = self
            .users
            .find_by_id(comment.author_id)
            .await?
            .map(|u| u.username)
            .unwrap_or_default();
        Ok(comment.to_response(username))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{post::NewPost, user::NewUser};
    use crate::repository::{MemoryStore, NotificationRepository};

    struct Fixture {
        store: Arc<MemoryStore>,
        service: CommentService,
        config: Config,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let notifications = NotificationService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
        );
        let service = CommentService::new(store.clone(), store.clone(), store.clone(), notifications);
        Fixture {
            store,
            service,
            config: Config::default(),
        }
    }

    async fn user(store: &MemoryStore, name: &str) -> i64 {
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

    async fn post_by(store: &MemoryStore, author_id: i64) -> i64 {
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

    fn comment_on(post: i64, content: &str) -> CreateCommentRequest {
        CreateCommentRequest {
            post,
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn commenting_notifies_post_author() {
        let f = fixture();
        let a = user(&f.store, "alice").await;
        let b = user(&f.store, "bob").await;
        let post = post_by(&f.store, b).await;

        let comment = f.service.create_comment(a, comment_on(post, "nice")).await.unwrap();
        assert_eq!(comment.author_username, "alice");
        assert_eq!(comment.post, post);

        let listed = f.store.list_for_recipient(b).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].verb, NotificationVerb::CommentedOnPost);
        assert_eq!(listed[0].target, Some(NotificationTarget::Comment(comment.id)));
    }

    #[tokio::test]
    async fn commenting_on_missing_post_is_not_found() {
        let f = fixture();
        let a = user(&f.store, "alice").await;
        let err = f.service.create_comment(a, comment_on(99, "hi")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_is_oldest_first_per_post() {
        let f = fixture();
        let a = user(&f.store, "alice").await;
        let first = post_by(&f.store, a).await;
        let second = post_by(&f.store, a).await;

        f.service.create_comment(a, comment_on(first, "one")).await.unwrap();
        f.service.create_comment(a, comment_on(second, "elsewhere")).await.unwrap();
        f.service.create_comment(a, comment_on(first, "two")).await.unwrap();

        let page = f
            .service
            .list_comments(
                CommentListQuery {
                    post: Some(first),
                    page: None,
                    page_size: None,
                },
                &f.config,
            )
            .await
            .unwrap();
        let contents: Vec<&str> = page.data.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two"]);
        assert_eq!(page.total, 2);
    }

    #[tokio::test]
    async fn only_author_can_edit_or_delete() {
        let f = fixture();
        let a = user(&f.store, "alice").await;
        let b = user(&f.store, "bob").await;
        let post = post_by(&f.store, a).await;
        let comment = f.service.create_comment(a, comment_on(post, "mine")).await.unwrap();

        let edit = UpdateCommentRequest {
            content: "hijacked".to_string(),
        };
        let err = f.service.update_comment(comment.id, b, edit).await.unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));

        let edit = UpdateCommentRequest {
            content: "edited".to_string(),
        };
        let updated = f.service.update_comment(comment.id, a, edit).await.unwrap();
        assert_eq!(updated.content, "edited");

        f.service.delete_comment(comment.id, a).await.unwrap();
        let err = f.service.get_comment(comment.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
