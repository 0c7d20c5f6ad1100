use crate::{
    error::{AppError, Result},
    models::notification::*,
    repository::{CommentRepository, NotificationRepository, PostRepository, UserRepository},
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};

const COMMENT_PREVIEW_CHARS: usize = 50;

#[derive(Clone)]
pub struct NotificationService {
    notifications: Arc<dyn NotificationRepository>,
    users: Arc<dyn UserRepository>,
    posts: Arc<dyn PostRepository>,
    comments: Arc<dyn CommentRepository>,
}

impl NotificationService {
    pub fn new(
        notifications: Arc<dyn NotificationRepository>,
        users: Arc<dyn UserRepository>,
        posts: Arc<dyn PostRepository>,
        comments: Arc<dyn CommentRepository>,
    ) -> Self {
        Self {
            notifications,
            users,
            posts,
            comments,
        }
    }

    /// Records that `actor_id` did `verb` to something owned by `recipient_id`.
    /// Acting on your own content produces nothing.
    pub async fn notify(
        &self,
        actor_id: i64,
        recipient_id: i64,
        verb: NotificationVerb,
        target: Option<NotificationTarget>,
    ) -> Result<Option<Notification>> {
        if actor_id == recipient_id {
            debug!("Skipping self notification for user {}", actor_id);
            return Ok(None);
        }

        let created = self
            .notifications
            .insert(NewNotification {
                recipient_id,
                actor_id,
                verb,
                target,
                created_at: Utc::now(),
            })
            .await?;

        info!(
            "Notified user {} that user {} {}",
            recipient_id,
            actor_id,
            verb.as_str()
        );
        Ok(Some(created))
    }

    /// Like `notify`, but a failure is logged instead of failing the caller's
    /// already-committed action.
    pub async fn notify_best_effort(
        &self,
        actor_id: i64,
        recipient_id: i64,
        verb: NotificationVerb,
        target: Option<NotificationTarget>,
    ) {
        if let Err(e) = self.notify(actor_id, recipient_id, verb, target).await {
            warn!(
                "Failed to create '{}' notification for user {}: {}",
                verb.as_str(),
                recipient_id,
                e
            );
        }
    }

    pub async fn list_notifications(&self, recipient_id: i64) -> Result<Vec<NotificationResponse>> {
        debug!("Listing notifications for user {}", recipient_id);

        let notifications = self.notifications.list_for_recipient(recipient_id).await?;

        let mut actor_ids: Vec<i64> = notifications.iter().map(|n| n.actor_id).collect();
        actor_ids.sort_unstable();
        actor_ids.dedup();
        let actors = self.users.find_by_ids(&actor_ids).await?;

        let mut result = Vec::with_capacity(notifications.len());
        for notification in notifications {
            let actor_username = actors
                .iter()
                .find(|u| u.id == notification.actor_id)
                .map(|u| u.username.clone());

            let target = match notification.target {
                Some(target) => self.resolve_target(target).await,
                None => None,
            };

            result.push(NotificationResponse {
                id: notification.id,
                actor: notification.actor_id,
                actor_username,
                verb: notification.verb,
                read: notification.is_read,
                timestamp: notification.created_at,
                target,
            });
        }

        Ok(result)
    }

    /// Looks up the target for display. A deleted target, or any lookup
    /// failure, yields `None`.
    async fn resolve_target(&self, target: NotificationTarget) -> Option<TargetSummary> {
        let display = match target {
            NotificationTarget::Post(id) => match self.posts.find_by_id(id).await {
                Ok(post) => post.map(|p| p.title),
                Err(e) => {
                    warn!("Failed to resolve notification target post {}: {}", id, e);
                    None
                }
            },
            NotificationTarget::Comment(id) => match self.comments.find_by_id(id).await {
                Ok(comment) => comment.map(|c| preview(&c.content)),
                Err(e) => {
                    warn!("Failed to resolve notification target comment {}: {}", id, e);
                    None
                }
            },
        }?;

        Some(TargetSummary {
            kind: target.kind().to_string(),
            id: target.id(),
            display,
        })
    }

    pub async fn mark_read(&self, recipient_id: i64, notification_id: i64) -> Result<()> {
        if !self.notifications.mark_read(notification_id, recipient_id).await? {
            return Err(AppError::not_found("Notification"));
        }
        Ok(())
    }

    pub async fn mark_all_read(&self, recipient_id: i64) -> Result<u64> {
        let updated = self.notifications.mark_all_read(recipient_id).await?;
        debug!("Marked {} notifications read for user {}", updated, recipient_id);
        Ok(updated)
    }

    pub async fn unread_count(&self, recipient_id: i64) -> Result<u64> {
        self.notifications.count_unread(recipient_id).await
    }
}

fn preview(content: &str) -> String {
    if content.chars().count() <= COMMENT_PREVIEW_CHARS {
        return content.to_string();
    }
    let mut cut: String = content.chars().take(COMMENT_PREVIEW_CHARS).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        comment::NewComment,
        post::NewPost,
        user::NewUser,
    };
    use crate::repository::MemoryStore;

    struct Fixture {
        store: Arc<MemoryStore>,
        service: NotificationService,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let service = NotificationService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
        );
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

    #[tokio::test]
    async fn self_notifications_are_skipped() {
        let f = fixture();
        let a = user(&f.store, "alice").await;
        let created = f
            .service
            .notify(a, a, NotificationVerb::LikedPost, None)
            .await
            .unwrap();
        assert!(created.is_none());
        assert!(f.service.list_notifications(a).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn listing_is_newest_first_with_resolved_targets() {
        let f = fixture();
        let a = user(&f.store, "alice").await;
        let b = user(&f.store, "bob").await;
        let post = PostRepository::insert(
            f.store.as_ref(),
            NewPost {
                author_id: b,
                title: "Hello".to_string(),
                content: "world".to_string(),
                created_at: Utc::now(),
            },
        )
        .await
        .unwrap();

        f.service
            .notify(a, b, NotificationVerb::Followed, None)
            .await
            .unwrap();
        f.service
            .notify(a, b, NotificationVerb::LikedPost, Some(NotificationTarget::Post(post.id)))
            .await
            .unwrap();

        let listed = f.service.list_notifications(b).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].verb, NotificationVerb::LikedPost);
        assert_eq!(listed[0].actor_username.as_deref(), Some("alice"));
        assert_eq!(
            listed[0].target,
            Some(TargetSummary {
                kind: "post".to_string(),
                id: post.id,
                display: "Hello".to_string(),
            })
        );
        assert_eq!(listed[1].verb, NotificationVerb::Followed);
        assert!(listed[1].target.is_none());
    }

    #[tokio::test]
    async fn deleted_target_degrades_to_none() {
        let f = fixture();
        let a = user(&f.store, "alice").await;
        let b = user(&f.store, "bob").await;
        let post = PostRepository::insert(
            f.store.as_ref(),
            NewPost {
                author_id: b,
                title: "Soon gone".to_string(),
                content: "x".to_string(),
                created_at: Utc::now(),
            },
        )
        .await
        .unwrap();
        let comment = CommentRepository::insert(
            f.store.as_ref(),
            NewComment {
                post_id: post.id,
                author_id: a,
                content: "nice".to_string(),
                created_at: Utc::now(),
            },
        )
        .await
        .unwrap();

        f.service
            .notify(a, b, NotificationVerb::CommentedOnPost, Some(NotificationTarget::Comment(comment.id)))
            .await
            .unwrap();
        PostRepository::delete(f.store.as_ref(), post.id).await.unwrap();

        let listed = f.service.list_notifications(b).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(listed[0].target.is_none());
    }

    #[tokio::test]
    async fn mark_read_is_scoped_to_recipient() {
        let f = fixture();
        let a = user(&f.store, "alice").await;
        let b = user(&f.store, "bob").await;
        let n = f
            .service
            .notify(a, b, NotificationVerb::Followed, None)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(f.service.unread_count(b).await.unwrap(), 1);
        let err = f.service.mark_read(a, n.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        f.service.mark_read(b, n.id).await.unwrap();
        assert_eq!(f.service.unread_count(b).await.unwrap(), 0);
        assert_eq!(f.service.mark_all_read(b).await.unwrap(), 0);
    }

    #[test]
    fn long_comments_are_truncated() {
        let long = "x".repeat(80);
        let cut = preview(&long);
        assert_eq!(cut.chars().count(), COMMENT_PREVIEW_CHARS + 1);
        assert_eq!(preview("short"), "short");
    }
}
