use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, sqlx::FromRow)]
pub struct Like {
    pub user_id: i64,
    pub post_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LikeOutcome {
    Liked,
    AlreadyLiked,
}

impl LikeOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            LikeOutcome::Liked => "Post liked successfully.",
            LikeOutcome::AlreadyLiked => "Already liked.",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LikeStatus {
    pub post_id: i64,
    pub likes_count: u64,
    pub liked_by_user: bool,
}
