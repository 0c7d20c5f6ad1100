use crate::{
    config::Config,
    error::{AppError, Result},
    services::{
        AuthService, CommentService, Database, FeedService, FollowService, LikeService,
        NotificationService, PostService, UserService,
    },
};
use governor::{clock::DefaultClock, state::keyed::DashMapStateStore, Quota, RateLimiter};
use std::{num::NonZeroU32, sync::Arc, time::Duration};
use tracing::debug;

const RATE_LIMITER_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

pub type KeyedRateLimiter = RateLimiter<String, DashMapStateStore<String>, DefaultClock>;

/// 应用程序的共享状态
/// 包含所有服务和配置的引用
#[derive(Clone)]
pub struct AppState {
    /// 应用配置
    pub config: Config,

    /// 数据库连接
    pub db: Database,

    /// 认证服务
    pub auth_service: AuthService,

    /// 用户服务
    pub user_service: UserService,

    /// 关注服务
    pub follow_service: FollowService,

    pub post_service: PostService,
    pub feed_service: FeedService,
    pub like_service: LikeService,

    /// 评论服务
    pub comment_service: CommentService,

    /// 通知服务
    pub notification_service: NotificationService,

    /// Per client IP request budget.
    pub rate_limiter: Arc<KeyedRateLimiter>,
}

impl AppState {
    pub fn new(config: Config, db: Database) -> Result<Self> {
        let notification_service = NotificationService::new(
            db.notifications.clone(),
            db.users.clone(),
            db.posts.clone(),
            db.comments.clone(),
        );
        let post_service = PostService::new(db.users.clone(), db.posts.clone(), db.likes.clone());

        let state = Self {
            auth_service: AuthService::new(db.users.clone(), &config),
            user_service: UserService::new(db.users.clone(), db.follows.clone()),
            follow_service: FollowService::new(
                db.users.clone(),
                db.follows.clone(),
                notification_service.clone(),
            ),
            feed_service: FeedService::new(
                db.follows.clone(),
                db.posts.clone(),
                post_service.clone(),
                config.feed_include_own_posts,
            ),
            like_service: LikeService::new(
                db.posts.clone(),
                db.likes.clone(),
                notification_service.clone(),
            ),
            comment_service: CommentService::new(
                db.users.clone(),
                db.posts.clone(),
                db.comments.clone(),
                notification_service.clone(),
            ),
            post_service,
            notification_service,
            rate_limiter: Arc::new(build_rate_limiter(&config)?),
            config,
            db,
        };
        Ok(state)
    }

    /// 检查是否为生产环境
    pub fn is_production(&self) -> bool {
        self.config.is_production()
    }
}

fn build_rate_limiter(config: &Config) -> Result<KeyedRateLimiter> {
    let per_minute = NonZeroU32::new(config.rate_limit_requests)
        .ok_or_else(|| AppError::internal("RATE_LIMIT_REQUESTS must be positive"))?;
    let burst = NonZeroU32::new(config.rate_limit_burst)
        .ok_or_else(|| AppError::internal("RATE_LIMIT_BURST must be positive"))?;
    Ok(RateLimiter::dashmap(Quota::per_minute(per_minute).allow_burst(burst)))
}

/// Drops per-client entries whose quota has fully replenished. Returns the
/// number of clients still tracked.
pub fn prune_rate_limiter(limiter: &KeyedRateLimiter) -> usize {
    limiter.retain_recent();
    limiter.shrink_to_fit();
    limiter.len()
}

/// 启动速率限制清理任务
pub fn spawn_rate_limiter_cleanup(limiter: Arc<KeyedRateLimiter>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(RATE_LIMITER_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            let tracked = prune_rate_limiter(&limiter);
            debug!("Rate limiter tracking {} clients", tracked);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn pruning_drops_replenished_clients() {
        let config = Config {
            rate_limit_requests: 60_000,
            rate_limit_burst: 1,
            ..Config::default()
        };
        let limiter = build_rate_limiter(&config).unwrap();

        for ip in ["10.0.0.1", "10.0.0.2", "10.0.0.3"] {
            assert!(limiter.check_key(&ip.to_string()).is_ok());
        }
        assert_eq!(limiter.len(), 3);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(prune_rate_limiter(&limiter), 0);
    }

    #[test]
    fn zero_quota_is_rejected() {
        let config = Config {
            rate_limit_requests: 0,
            ..Config::default()
        };
        assert!(build_rate_limiter(&config).is_err());
    }
}
