use crate::{
    config::{Config, MAX_JWT_EXPIRY_HOURS},
    error::{AppError, Result},
    models::user::*,
    repository::UserRepository,
    utils::validation::validate_username,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};
use validator::Validate;

const INVALID_CREDENTIALS: &str = "Unable to log in with provided credentials.";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,        // 用户ID
    pub exp: i64,           // 过期时间
    pub iat: i64,           // 签发时间
}

/// The authenticated caller, attached to the request by `auth_middleware`.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
}

#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    jwt_secret: String,
    jwt_expiry_hours: i64,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserRepository>, config: &Config) -> Self {
        Self {
            users,
            jwt_secret: config.jwt_secret.clone(),
            jwt_expiry_hours: config.jwt_expiry_hours.clamp(1, MAX_JWT_EXPIRY_HOURS),
        }
    }

    pub async fn register(&self, request: RegisterRequest) -> Result<AuthResponse> {
        debug!("Registering user: {}", request.username);
        request.validate()?;
        validate_username(&request.username)?;

        if self.users.find_by_username(&request.username).await?.is_some() {
            return Err(AppError::conflict("A user with that username already exists."));
        }
        if self.users.find_by_email(&request.email).await?.is_some() {
            return Err(AppError::conflict("A user with that email already exists."));
        }

        let password_hash = hash_password(&request.password)?;
        let user = self
            .users
            .insert(NewUser {
                username: request.username,
                email: request.email.trim().to_string(),
                password_hash,
                created_at: Utc::now(),
            })
            .await?;

        info!("Registered user {} ({})", user.username, user.id);
        self.auth_response(&user)
    }

    /// Accepts either a username or an email. Every failure reads the same so
    /// callers cannot tell which accounts exist.
    pub async fn login(&self, request: LoginRequest) -> Result<AuthResponse> {
        let user = match (request.username.as_deref(), request.email.as_deref()) {
            (Some(username), _) if !username.trim().is_empty() => {
                self.users.find_by_username(username.trim()).await?
            }
            (_, Some(email)) if !email.trim().is_empty() => self.users.find_by_email(email.trim()).await?,
            _ => return Err(AppError::validation("Provide a username or email.")),
        };

        let user = match user {
            Some(user) if verify_password(&request.password, &user.password_hash) => user,
            _ => {
                warn!("Failed login attempt");
                return Err(AppError::unauthorized(INVALID_CREDENTIALS));
            }
        };

        info!("User {} logged in", user.id);
        self.auth_response(&user)
    }

    pub fn issue_token(&self, user: &User) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user.id.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::hours(self.jwt_expiry_hours)).timestamp(),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )?;
        Ok(token)
    }

    pub fn verify_jwt(&self, token: &str) -> Result<Claims> {
        let decoding_key = DecodingKey::from_secret(self.jwt_secret.as_bytes());
        let validation = Validation::new(Algorithm::HS256);

        match decode::<Claims>(token, &decoding_key, &validation) {
            Ok(token_data) => {
                debug!("JWT token verified for user: {}", token_data.claims.sub);
                Ok(token_data.claims)
            }
            Err(e) => {
                warn!("JWT verification failed: {}", e);
                Err(AppError::Authentication("Invalid token".to_string()))
            }
        }
    }

    /// Resolves a bearer token to a user that still exists.
    pub async fn authenticate(&self, token: &str) -> Result<CurrentUser> {
        let claims = self.verify_jwt(token)?;
        let id: i64 = claims
            .sub
            .parse()
            .map_err(|_| AppError::unauthorized("Invalid token"))?;

        let user = self
            .users
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::unauthorized("User not found"))?;

        Ok(CurrentUser {
            id: user.id,
            username: user.username,
        })
    }

    fn auth_response(&self, user: &User) -> Result<AuthResponse> {
        Ok(AuthResponse {
            token: self.issue_token(user)?,
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
        })
    }
}

fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

fn verify_password(password: &str, password_hash: &str) -> bool {
    match PasswordHash::new(password_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            warn!("Stored password hash is unreadable: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryStore;

    fn service() -> AuthService {
        let store = Arc::new(MemoryStore::new());
        AuthService::new(store, &Config::default())
    }

    fn register(username: &str, email: &str) -> RegisterRequest {
        RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: "correct horse".to_string(),
        }
    }

    fn login_with(username: Option<&str>, email: Option<&str>, password: &str) -> LoginRequest {
        LoginRequest {
            username: username.map(str::to_string),
            email: email.map(str::to_string),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn register_then_login_by_username_or_email() {
        let auth = service();
        let registered = auth.register(register("alice", "Alice@Example.com")).await.unwrap();
        assert_eq!(registered.username, "alice");

        let claims = auth.verify_jwt(&registered.token).unwrap();
        assert_eq!(claims.sub, registered.id.to_string());
        assert!(claims.exp > claims.iat);

        let by_name = auth
            .login(login_with(Some("alice"), None, "correct horse"))
            .await
            .unwrap();
        assert_eq!(by_name.id, registered.id);

        let by_email = auth
            .login(login_with(None, Some("alice@example.com"), "correct horse"))
            .await
            .unwrap();
        assert_eq!(by_email.id, registered.id);

        let current = auth.authenticate(&by_email.token).await.unwrap();
        assert_eq!(
            current,
            CurrentUser {
                id: registered.id,
                username: "alice".to_string()
            }
        );
    }

    #[tokio::test]
    async fn duplicate_username_or_email_conflicts() {
        let auth = service();
        auth.register(register("alice", "alice@example.com")).await.unwrap();

        let err = auth.register(register("alice", "other@example.com")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let err = auth.register(register("alice2", "ALICE@example.com")).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn bad_registration_input_is_rejected() {
        let auth = service();
        let mut req = register("alice", "alice@example.com");
        req.password = "short".to_string();
        assert!(matches!(auth.register(req).await.unwrap_err(), AppError::ValidatorError(_)));

        let req = register("bad name!", "bad@example.com");
        assert!(matches!(auth.register(req).await.unwrap_err(), AppError::Validation(_)));

        let req = register("bob", "not-an-email");
        assert!(matches!(auth.register(req).await.unwrap_err(), AppError::ValidatorError(_)));
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_read_the_same() {
        let auth = service();
        auth.register(register("alice", "alice@example.com")).await.unwrap();

        let wrong = auth
            .login(login_with(Some("alice"), None, "nope nope"))
            .await
            .unwrap_err();
        let unknown = auth
            .login(login_with(Some("ghost"), None, "nope nope"))
            .await
            .unwrap_err();
        assert_eq!(wrong.to_string(), unknown.to_string());
        assert!(matches!(wrong, AppError::Authentication(_)));
    }

    #[test]
    fn tampered_token_is_rejected() {
        let auth = service();
        assert!(auth.verify_jwt("not.a.token").is_err());

        let other = AuthService {
            users: Arc::new(MemoryStore::new()),
            jwt_secret: "another-secret".to_string(),
            jwt_expiry_hours: 1,
        };
        let user = User {
            id: 1,
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: String::new(),
            bio: None,
            profile_picture: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let token = other.issue_token(&user).unwrap();
        assert!(auth.verify_jwt(&token).is_err());
    }

    #[tokio::test]
    async fn oversized_expiry_is_clamped_when_issuing() {
        let config = Config {
            jwt_expiry_hours: i64::MAX,
            ..Config::default()
        };
        let auth = AuthService::new(Arc::new(MemoryStore::new()), &config);

        let registered = auth.register(register("alice", "alice@example.com")).await.unwrap();
        let claims = auth.verify_jwt(&registered.token).unwrap();
        assert_eq!(claims.exp - claims.iat, MAX_JWT_EXPIRY_HOURS * 3600);
    }
}
