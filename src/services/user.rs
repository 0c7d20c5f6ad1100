use crate::{
    error::{AppError, Result},
    models::user::*,
    repository::{FollowRepository, UserRepository},
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info};
use validator::Validate;

#[derive(Clone)]
pub struct UserService {
    users: Arc<dyn UserRepository>,
    follows: Arc<dyn FollowRepository>,
}

impl UserService {
    pub fn new(users: Arc<dyn UserRepository>, follows: Arc<dyn FollowRepository>) -> Self {
        Self { users, follows }
    }

    pub async fn get_user(&self, user_id: i64) -> Result<User> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::not_found("User"))
    }

    pub async fn get_profile(&self, user_id: i64) -> Result<UserProfileResponse> {
        debug!("Getting profile for user: {}", user_id);
        let user = self.get_user(user_id).await?;
        self.with_counts(&user).await
    }

    pub async fn update_profile(
        &self,
        user_id: i64,
        request: UpdateProfileRequest,
    ) -> Result<UserProfileResponse> {
        request.validate()?;

        let changes = ProfileChanges {
            bio: request.bio,
            profile_picture: request.profile_picture,
        };

        let user = self
            .users
            .update_profile(user_id, changes, Utc::now())
            .await?
            .ok_or_else(|| AppError::not_found("User"))?;

        info!("Updated profile for user {}", user_id);
        self.with_counts(&user).await
    }

    async fn with_counts(&self, user: &User) -> Result<UserProfileResponse> {
        let followers = self.follows.count_followers(user.id).await?;
        let following = self.follows.count_following(user.id).await?;
        Ok(user.to_profile(followers, following))
    }
}
