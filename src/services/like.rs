use crate::{
    error::{AppError, Result},
    models::{
        like::{LikeOutcome, LikeStatus},
        notification::{NotificationTarget, NotificationVerb},
        post::Post,
    },
    repository::{LikeRepository, PostRepository},
    services::NotificationService,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Clone)]
pub struct LikeService {
    posts: Arc<dyn PostRepository>,
    likes: Arc<dyn LikeRepository>,
    notification_service: NotificationService,
}

impl LikeService {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        likes: Arc<dyn LikeRepository>,
        notification_service: NotificationService,
    ) -> Self {
        Self {
            posts,
            likes,
            notification_service,
        }
    }

    /// Likes a post at most once. Only the call that creates the like
    /// notifies the author.
    pub async fn like_post(&self, user_id: i64, post_id: i64) -> Result<LikeOutcome> {
        let post = self.find_post(post_id).await?;

        if !self.likes.insert(user_id, post_id, Utc::now()).await? {
            debug!("User {} already liked post {}", user_id, post_id);
            return Ok(LikeOutcome::AlreadyLiked);
        }

        self.notification_service
            .notify_best_effort(
                user_id,
                post.author_id,
                NotificationVerb::LikedPost,
                Some(NotificationTarget::Post(post.id)),
            )
            .await;

        info!("User {} liked post {}", user_id, post_id);
        Ok(LikeOutcome::Liked)
    }

    /// Removes the like if present. Unliking a post you never liked succeeds.
    pub async fn unlike_post(&self, user_id: i64, post_id: i64) -> Result<()> {
        self.find_post(post_id).await?;

        if self.likes.delete(user_id, post_id).await? {
            info!("User {} unliked post {}", user_id, post_id);
        }
        Ok(())
    }

    pub async fn like_status(&self, user_id: Option<i64>, post_id: i64) -> Result<LikeStatus> {
        self.find_post(post_id).await?;

        let likes_count = self.likes.count_for_post(post_id).await?;
        let liked_by_user = match user_id {
            Some(id) => self.likes.exists(id, post_id).await?,
            None => false,
        };

        Ok(LikeStatus {
            post_id,
            likes_count,
            liked_by_user,
        })
    }

    async fn find_post(&self, post_id: i64) -> Result<Post> {
        self.posts
            .find_by_id(post_id)
            .await?
            .ok_or_else(|| AppError::not_found("Post"))
    }
}
