use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use validator::Validate;

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub author_id: i64,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub author_id: i64,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct PostChanges {
    pub title: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostSortField {
    CreatedAt,
    UpdatedAt,
    Title,
}

/// Sort order for post listings. Ties always fall back to id in the same
/// direction so pages never overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostOrdering {
    pub field: PostSortField,
    pub descending: bool,
}

impl Default for PostOrdering {
    fn default() -> Self {
        Self {
            field: PostSortField::CreatedAt,
            descending: true,
        }
    }
}

impl FromStr for PostOrdering {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (descending, name) = match raw.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, raw),
        };

        let field = match name {
            "created_at" => PostSortField::CreatedAt,
            "updated_at" => PostSortField::UpdatedAt,
            "title" => PostSortField::Title,
            other => {
                return Err(AppError::Validation(format!(
                    "Unknown ordering field '{}'",
                    other
                )))
            }
        };

        Ok(Self { field, descending })
    }
}

#[derive(Debug, Clone, Default)]
pub struct PostFilter {
    pub search: Option<String>,
    pub author_id: Option<i64>,
    pub ordering: PostOrdering,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreatePostRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1))]
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdatePostRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(min = 1))]
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PostListQuery {
    pub search: Option<String>,
    pub author: Option<i64>,
    pub ordering: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostResponse {
    pub id: i64,
    pub author: i64,
    pub author_username: String,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub likes_count: u64,
    pub liked_by_user: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ordering() {
        let ordering: PostOrdering = "-created_at".parse().unwrap();
        assert_eq!(ordering, PostOrdering::default());

        let ordering: PostOrdering = "title".parse().unwrap();
        assert_eq!(ordering.field, PostSortField::Title);
        assert!(!ordering.descending);
    }

    #[test]
    fn rejects_unknown_ordering() {
        assert!("-likes".parse::<PostOrdering>().is_err());
        assert!("".parse::<PostOrdering>().is_err());
    }
}
