use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Stored account row. Profile fields live on the user itself so there is
/// no separate profile record to keep in sync.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 150))]
    pub username: String,

    #[validate(email(message = "Enter a valid email address."))]
    pub email: String,

    #[validate(length(min = 8, message = "Ensure this field has at least 8 characters."))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(max = 500))]
    pub bio: Option<String>,

    #[validate(url)]
    pub profile_picture: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub id: i64,
    pub username: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MiniUser {
    pub id: i64,
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserProfileResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub bio: Option<String>,
    pub profile_picture: Option<String>,
    pub follower_count: u64,
    pub following_count: u64,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn to_mini(&self) -> MiniUser {
        MiniUser {
            id: self.id,
            username: self.username.clone(),
        }
    }

    pub fn to_profile(&self, follower_count: u64, following_count: u64) -> UserProfileResponse {
        UserProfileResponse {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            bio: self.bio.clone(),
            profile_picture: self.profile_picture.clone(),
            follower_count,
            following_count,
            created_at: self.created_at,
        }
    }
}
