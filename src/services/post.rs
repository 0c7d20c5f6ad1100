use crate::{
    config::Config,
    error::{AppError, Result},
    models::{post::*, response::PaginatedResult},
    repository::{LikeRepository, PostRepository, UserRepository},
    utils::pagination::PageRequest,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};
use validator::Validate;

#[derive(Clone)]
pub struct PostService {
    users: Arc<dyn UserRepository>,
    posts: Arc<dyn PostRepository>,
    likes: Arc<dyn LikeRepository>,
}

impl PostService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        posts: Arc<dyn PostRepository>,
        likes: Arc<dyn LikeRepository>,
    ) -> Self {
        Self { users, posts, likes }
    }

    pub async fn create_post(&self, author_id: i64, request: CreatePostRequest) -> Result<PostResponse> {
        debug!("Creating post for user: {}", author_id);
        request.validate()?;

        let post = self
            .posts
            .insert(NewPost {
                author_id,
                title: request.title,
                content: request.content,
                created_at: Utc::now(),
            })
            .await?;

        info!("Created post {} by user {}", post.id, author_id);
        self.to_response(post, Some(author_id)).await
    }

    pub async fn get_post(&self, post_id: i64, viewer: Option<i64>) -> Result<PostResponse> {
        let post = self.find_post(post_id).await?;
        self.to_response(post, viewer).await
    }

    pub async fn find_post(&self, post_id: i64) -> Result<Post> {
        self.posts
            .find_by_id(post_id)
            .await?
            .ok_or_else(|| AppError::not_found("Post"))
    }

    /// Partial update. Only the author may edit a post.
    pub async fn update_post(
        &self,
        post_id: i64,
        user_id: i64,
        request: UpdatePostRequest,
    ) -> Result<PostResponse> {
        request.validate()?;

        let post = self.find_post(post_id).await?;
        if post.author_id != user_id {
            return Err(AppError::forbidden("You can only edit your own posts."));
        }

        let changes = PostChanges {
            title: request.title,
            content: request.content,
        };
        let updated = self
            .posts
            .update(post_id, changes, Utc::now())
            .await?
            .ok_or_else(|| AppError::not_found("Post"))?;

        info!("Updated post {}", post_id);
        self.to_response(updated, Some(user_id)).await
    }

    pub async fn delete_post(&self, post_id: i64, user_id: i64) -> Result<()> {
        let post = self.find_post(post_id).await?;
        if post.author_id != user_id {
            return Err(AppError::forbidden("You can only delete your own posts."));
        }

        if !self.posts.delete(post_id).await? {
            return Err(AppError::not_found("Post"));
        }

        info!("Deleted post {}", post_id);
        Ok(())
    }

    pub async fn list_posts(
        &self,
        query: PostListQuery,
        viewer: Option<i64>,
        config: &Config,
    ) -> Result<PaginatedResult<PostResponse>> {
        let page = PageRequest::resolve(query.page, query.page_size, config)?;
        let ordering = match query.ordering.as_deref() {
            Some(raw) if !raw.trim().is_empty() => raw.trim().parse()?,
            _ => PostOrdering::default(),
        };
        let filter = PostFilter {
            search: query
                .search
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            author_id: query.author,
            ordering,
        };

        debug!("Listing posts with filter: {:?}", filter);
        let (posts, total) = self.posts.list(&filter, page.offset(), page.limit()).await?;
        let data = self.to_responses(posts, viewer).await?;
        Ok(PaginatedResult::new(data, total, page))
    }

    pub async fn to_response(&self, post: Post, viewer: Option<i64>) -> Result<PostResponse> {
        let mut responses = self.to_responses(vec![post], viewer).await?;
        responses
            .pop()
            .ok_or_else(|| AppError::internal("post response was not built"))
    }

    /// Decorates posts with author name, like count and whether `viewer`
    /// liked each one. Order is preserved.
    pub async fn to_responses(&self, posts: Vec<Post>, viewer: Option<i64>) -> Result<Vec<PostResponse>> {
        let mut author_ids: Vec<i64> = posts.iter().map(|p| p.author_id).collect();
        author_ids.sort_unstable();
        author_ids.dedup();
        let authors = self.users.find_by_ids(&author_ids).await?;

        let mut responses = Vec::with_capacity(posts.len());
        for post in posts {
            let author_username = authors
                .iter()
                .find(|u| u.id == post.author_id)
                .map(|u| u.username.clone())
                .unwrap_or_default();
            let likes_count = self.likes.count_for_post(post.id).await?;
            let liked_by_user = match viewer {
                Some(user_id) => self.likes.exists(user_id, post.id).await?,
                None => false,
            };

            responses.push(PostResponse {
                id: post.id,
                author: post.author_id,
                author_username,
                title: post.title,
                content: post.content,
                created_at: post.created_at,
                updated_at: post.updated_at,
                likes_count,
                liked_by_user,
            });
        }

        Ok(responses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::NewUser;
    use crate::repository::MemoryStore;

    struct Fixture {
        store: Arc<MemoryStore>,
        service: PostService,
        config: Config,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let service = PostService::new(store.clone(), store.clone(), store.clone());
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

    fn new_post(title: &str, content: &str) -> CreatePostRequest {
        CreatePostRequest {
            title: title.to_string(),
            content: content.to_string(),
        }
    }

    fn query() -> PostListQuery {
        PostListQuery {
            search: None,
            author: None,
            ordering: None,
            page: None,
            page_size: None,
        }
    }

    #[tokio::test]
    async fn create_and_fetch_post() {
        let f = fixture();
        let a = user(&f.store, "alice").await;

        let created = f.service.create_post(a, new_post("Hello", "world")).await.unwrap();
        assert_eq!(created.author_username, "alice");
        assert_eq!(created.likes_count, 0);
        assert!(!created.liked_by_user);

        let fetched = f.service.get_post(created.id, None).await.unwrap();
        assert_eq!(fetched.title, "Hello");
    }

    #[tokio::test]
    async fn empty_title_is_rejected() {
        let f = fixture();
        let a = user(&f.store, "alice").await;
        let err = f.service.create_post(a, new_post("", "body")).await.unwrap_err();
        assert!(matches!(err, AppError::ValidatorError(_)));
    }

    #[tokio::test]
    async fn only_author_can_edit_or_delete() {
        let f = fixture();
        let a = user(&f.store, "alice").await;
        let b = user(&f.store, "bob").await;
        let post = f.service.create_post(a, new_post("Mine", "body")).await.unwrap();

        let edit = UpdatePostRequest {
            title: Some("Stolen".to_string()),
            content: None,
        };
        let err = f.service.update_post(post.id, b, edit).await.unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));
        let err = f.service.delete_post(post.id, b).await.unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));

        let edit = UpdatePostRequest {
            title: Some("Renamed".to_string()),
            content: None,
        };
        let updated = f.service.update_post(post.id, a, edit).await.unwrap();
        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.content, "body");

        f.service.delete_post(post.id, a).await.unwrap();
        let err = f.service.get_post(post.id, None).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_filters_by_search_and_author() {
        let f = fixture();
        let a = user(&f.store, "alice").await;
        let b = user(&f.store, "bob").await;
        f.service.create_post(a, new_post("Rust tips", "ownership")).await.unwrap();
        f.service.create_post(b, new_post("Cooking", "pasta")).await.unwrap();
        f.service.create_post(b, new_post("More rust", "lifetimes")).await.unwrap();

        let mut q = query();
        q.search = Some("RUST".to_string());
        let page = f.service.list_posts(q, None, &f.config).await.unwrap();
        assert_eq!(page.total, 2);

        let mut q = query();
        q.author = Some(b);
        let page = f.service.list_posts(q, None, &f.config).await.unwrap();
        assert_eq!(page.total, 2);
        assert!(page.data.iter().all(|p| p.author == b));
        assert_eq!(page.data[0].title, "More rust");
    }

    #[tokio::test]
    async fn unknown_ordering_is_a_validation_error() {
        let f = fixture();
        let mut q = query();
        q.ordering = Some("-popularity".to_string());
        let err = f.service.list_posts(q, None, &f.config).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
