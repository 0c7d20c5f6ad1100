use crate::{
    error::{AppError, Result},
    models::{
        follow::FollowOutcome,
        notification::NotificationVerb,
        response::PaginatedResult,
        user::MiniUser,
    },
    repository::{FollowRepository, UserRepository},
    services::NotificationService,
    utils::pagination::PageRequest,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Clone)]
pub struct FollowService {
    users: Arc<dyn UserRepository>,
    follows: Arc<dyn FollowRepository>,
    notification_service: NotificationService,
}

impl FollowService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        follows: Arc<dyn FollowRepository>,
        notification_service: NotificationService,
    ) -> Self {
        Self {
            users,
            follows,
            notification_service,
        }
    }

    /// Ensures `follower_id` follows `following_id`. Repeating the call is a
    /// no-op reported as `AlreadyFollowing`.
    pub async fn follow_user(&self, follower_id: i64, following_id: i64) -> Result<(MiniUser, FollowOutcome)> {
        debug!("User {} following user {}", follower_id, following_id);

        // 防止自己关注自己
        if follower_id == following_id {
            return Err(AppError::self_action("Cannot follow yourself."));
        }

        let target = self
            .users
            .find_by_id(following_id)
            .await?
            .ok_or_else(|| AppError::not_found("User"))?;

        let created = self.follows.insert(follower_id, following_id, Utc::now()).await?;
        if !created {
            debug!("User {} already follows user {}", follower_id, following_id);
            return Ok((target.to_mini(), FollowOutcome::AlreadyFollowing));
        }

        self.notification_service
            .notify_best_effort(follower_id, following_id, NotificationVerb::Followed, None)
            .await;

        info!("User {} followed user {}", follower_id, following_id);
        Ok((target.to_mini(), FollowOutcome::Followed))
    }

    /// Ensures the edge is gone. Unfollowing someone you don't follow, or
    /// yourself, succeeds without changes.
    pub async fn unfollow_user(&self, follower_id: i64, following_id: i64) -> Result<MiniUser> {
        debug!("User {} unfollowing user {}", follower_id, following_id);

        let target = self
            .users
            .find_by_id(following_id)
            .await?
            .ok_or_else(|| AppError::not_found("User"))?;

        if self.follows.delete(follower_id, following_id).await? {
            info!("User {} unfollowed user {}", follower_id, following_id);
        }

        Ok(target.to_mini())
    }

    /// Ids of everyone `user_id` follows, ascending.
    pub async fn following_ids(&self, user_id: i64) -> Result<Vec<i64>> {
        self.follows.following_ids(user_id).await
    }

    pub async fn list_following(&self, user_id: i64, page: PageRequest) -> Result<PaginatedResult<MiniUser>> {
        debug!("Getting following for user: {}", user_id);
        self.ensure_user(user_id).await?;
        let ids = self.follows.following_ids(user_id).await?;
        self.page_of_users(&ids, page).await
    }

    pub async fn list_followers(&self, user_id: i64, page: PageRequest) -> Result<PaginatedResult<MiniUser>> {
        debug!("Getting followers for user: {}", user_id);
        self.ensure_user(user_id).await?;
        let ids = self.follows.follower_ids(user_id).await?;
        self.page_of_users(&ids, page).await
    }

    pub async fn is_following(&self, follower_id: i64, following_id: i64) -> Result<bool> {
        self.follows.exists(follower_id, following_id).await
    }

    /// (followers, following) counts.
    pub async fn follow_counts(&self, user_id: i64) -> Result<(u64, u64)> {
        let followers = self.follows.count_followers(user_id).await?;
        let following = self.follows.count_following(user_id).await?;
        Ok((followers, following))
    }

    async fn ensure_user(&self, user_id: i64) -> Result<()> {
        match self.users.find_by_id(user_id).await? {
            Some(_) => Ok(()),
            None => Err(AppError::not_found("User")),
        }
    }

    async fn page_of_users(&self, ids: &[i64], page: PageRequest) -> Result<PaginatedResult<MiniUser>> {
        let window = page.slice(ids);
        let users = self.users.find_by_ids(&window).await?;
        Ok(PaginatedResult::new(
            users.iter().map(|u| u.to_mini()).collect(),
            ids.len() as u64,
            page,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::NewUser;
    use crate::repository::{MemoryStore, NotificationRepository};
    use proptest::prelude::*;

    struct Fixture {
        store: Arc<MemoryStore>,
        service: FollowService,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let notifications = NotificationService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
        );
        let service = FollowService::new(store.clone(), store.clone(), notifications);
        Fixture { store, service }
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

    fn first_page() -> PageRequest {
        PageRequest { page: 1, page_size: 10 }
    }

    #[tokio::test]
    async fn follow_then_unfollow() {
        let f = fixture();
        let a = user(&f.store, "alice").await;
        let b = user(&f.store, "bob").await;

        let (target, outcome) = f.service.follow_user(a, b).await.unwrap();
        assert_eq!(target.username, "bob");
        assert_eq!(outcome, FollowOutcome::Followed);
        assert_eq!(f.service.following_ids(a).await.unwrap(), vec![b]);
        assert!(f.service.is_following(a, b).await.unwrap());
        assert!(!f.service.is_following(b, a).await.unwrap());

        f.service.unfollow_user(a, b).await.unwrap();
        assert!(f.service.following_ids(a).await.unwrap().is_empty());

        // second unfollow is a no-op
        f.service.unfollow_user(a, b).await.unwrap();
    }

    #[tokio::test]
    async fn repeat_follow_notifies_once() {
        let f = fixture();
        let a = user(&f.store, "alice").await;
        let b = user(&f.store, "bob").await;

        f.service.follow_user(a, b).await.unwrap();
        let (_, outcome) = f.service.follow_user(a, b).await.unwrap();
        assert_eq!(outcome, FollowOutcome::AlreadyFollowing);

        let notifications = f.store.list_for_recipient(b).await.unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].verb, NotificationVerb::Followed);
        assert_eq!(f.service.follow_counts(b).await.unwrap(), (1, 0));
    }

    #[tokio::test]
    async fn following_unknown_user_is_not_found() {
        let f = fixture();
        let a = user(&f.store, "alice").await;
        let err = f.service.follow_user(a, 999).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        let err = f.service.unfollow_user(a, 999).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn lists_are_paginated_by_user_id() {
        let f = fixture();
        let a = user(&f.store, "alice").await;
        let mut others = Vec::new();
        for name in ["bob", "carol", "dave"] {
            let id = user(&f.store, name).await;
            f.service.follow_user(a, id).await.unwrap();
            f.service.follow_user(id, a).await.unwrap();
            others.push(id);
        }

        let page = f
            .service
            .list_following(a, PageRequest { page: 2, page_size: 2 })
            .await
            .unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.data.len(), 1);
        assert_eq!(page.data[0].id, others[2]);

        let followers = f.service.list_followers(a, first_page()).await.unwrap();
        let ids: Vec<i64> = followers.data.iter().map(|u| u.id).collect();
        assert_eq!(ids, others);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_follows_settle_on_one_edge() {
        let f = fixture();
        let a = user(&f.store, "alice").await;
        let b = user(&f.store, "bob").await;

        let handles: Vec<_> = (0..32)
            .map(|_| {
                let service = f.service.clone();
                tokio::spawn(async move { service.follow_user(a, b).await })
            })
            .collect();

        let mut followed = 0;
        for handle in handles {
            let (_, outcome) = handle.await.unwrap().unwrap();
            if outcome == FollowOutcome::Followed {
                followed += 1;
            }
        }

        assert_eq!(followed, 1);
        assert_eq!(f.service.follow_counts(b).await.unwrap(), (1, 0));
        assert_eq!(f.store.list_for_recipient(b).await.unwrap().len(), 1);
    }

    proptest! {
        #[test]
        fn self_follow_always_fails(n in 1usize..5) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let f = fixture();
                let mut ids = Vec::new();
                for i in 0..n {
                    ids.push(user(&f.store, &format!("user{}", i)).await);
                }
                for id in ids {
                    let err = f.service.follow_user(id, id).await.unwrap_err();
                    assert!(matches!(err, AppError::SelfAction(_)));
                    assert!(f.service.following_ids(id).await.unwrap().is_empty());
                }
            });
        }

        #[test]
        fn follow_is_idempotent(repeats in 1usize..6) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let f = fixture();
                let a = user(&f.store, "alice").await;
                let b = user(&f.store, "bob").await;
                for _ in 0..repeats {
                    f.service.follow_user(a, b).await.unwrap();
                }
                assert_eq!(f.service.following_ids(a).await.unwrap(), vec![b]);
                assert_eq!(f.store.list_for_recipient(b).await.unwrap().len(), 1);
            });
        }
    }
}
