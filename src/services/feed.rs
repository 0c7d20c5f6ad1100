use crate::{
    error::Result,
    models::{post::PostResponse, response::PaginatedResult},
    repository::{FollowRepository, PostRepository},
    services::PostService,
    utils::pagination::PageRequest,
};
use std::sync::Arc;
use tracing::debug;

/// Builds the home timeline: posts by the people a user follows, newest
/// first.
#[derive(Clone)]
pub struct FeedService {
    follows: Arc<dyn FollowRepository>,
    posts: Arc<dyn PostRepository>,
    post_service: PostService,
    include_own_posts: bool,
}

impl FeedService {
    pub fn new(
        follows: Arc<dyn FollowRepository>,
        posts: Arc<dyn PostRepository>,
        post_service: PostService,
        include_own_posts: bool,
    ) -> Self {
        Self {
            follows,
            posts,
            post_service,
            include_own_posts,
        }
    }

    pub async fn get_feed(&self, user_id: i64, page: PageRequest) -> Result<PaginatedResult<PostResponse>> {
        let mut authors = self.follows.following_ids(user_id).await?;
        if self.include_own_posts {
            authors.push(user_id);
        }

        debug!("Building feed for user {} from {} authors", user_id, authors.len());
        if authors.is_empty() {
            return Ok(PaginatedResult::empty(page));
        }

        let (posts, total) = self
            .posts
            .list_by_authors(&authors, page.offset(), page.limit())
            .await?;
        let data = self.post_service.to_responses(posts, Some(user_id)).await?;
        Ok(PaginatedResult::new(data, total, page))
    }
}
