use crate::config::Config;
use crate::error::Result;
use crate::repository::{
    CommentRepository, FollowRepository, LikeRepository, MemoryStore, NotificationRepository,
    PgStore, PostRepository, UserRepository,
};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Clone)]
enum Backend {
    Memory,
    Postgres(PgStore),
}

/// 数据库服务
///
/// Holds one handle per entity repository. Services are built from the
/// handles they need rather than from the whole registry.
#[derive(Clone)]
pub struct Database {
    backend: Backend,
    pub users: Arc<dyn UserRepository>,
    pub follows: Arc<dyn FollowRepository>,
    pub posts: Arc<dyn PostRepository>,
    pub likes: Arc<dyn LikeRepository>,
    pub comments: Arc<dyn CommentRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
}

impl Database {
    /// 创建新的数据库实例
    pub async fn new(config: &Config) -> Result<Self> {
        if config.uses_memory_store() {
            info!("Using in-memory store; data will not survive a restart");
            return Ok(Self::memory());
        }

        info!("Initializing database connection");
        let store = PgStore::connect(&config.database_url, config.database_max_connections).await?;
        store.migrate().await?;
        Ok(Self::postgres(store))
    }

    pub fn memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            backend: Backend::Memory,
            users: store.clone(),
            follows: store.clone(),
            posts: store.clone(),
            likes: store.clone(),
            comments: store.clone(),
            notifications: store,
        }
    }

    pub fn postgres(store: PgStore) -> Self {
        let shared = Arc::new(store.clone());
        Self {
            backend: Backend::Postgres(store),
            users: shared.clone(),
            follows: shared.clone(),
            posts: shared.clone(),
            likes: shared.clone(),
            comments: shared.clone(),
            notifications: shared,
        }
    }

    /// 验证数据库连接
    pub async fn verify_connection(&self) -> Result<()> {
        match &self.backend {
            Backend::Memory => Ok(()),
            Backend::Postgres(store) => match store.ping().await {
                Ok(()) => {
                    info!("Database connection verified successfully");
                    Ok(())
                }
                Err(e) => {
                    error!("Failed to verify database connection: {}", e);
                    Err(e)
                }
            },
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self.backend {
            Backend::Memory => "memory",
            Backend::Postgres(_) => "postgres",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_config_uses_memory_backend() {
        let config = Config::default();
        let db = Database::new(&config).await.unwrap();
        assert_eq!(db.backend_name(), "memory");
        assert!(db.verify_connection().await.is_ok());
    }
}
