//! User service
//!
//! Business logic for accounts and authentication:
//! - Registration (first registered user becomes admin)
//! - Login/logout with session tokens
//! - Profile and password management
//! - Password-reset tokens (digest stored, one-hour expiry)

use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{Session, UpdateProfileInput, User, UserRole};
use crate::services::password::{hash_password, verify_password};
use anyhow::Context;
use chrono::{Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

/// Default session expiration time in days
const DEFAULT_SESSION_EXPIRATION_DAYS: i64 = 7;

/// Reset tokens stop being accepted after this long
const RESET_TOKEN_EXPIRATION_MINUTES: i64 = 60;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex"));
static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("username regex"));
static WEBSITE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://.+").expect("website regex"));

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Authentication failed (invalid credentials or token)
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// Validation error (invalid input)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Username or email already taken
    #[error("{0}")]
    Conflict(String),

    /// User not found
    #[error("User not found")]
    NotFound,

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Input for registration
#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub name: String,
    pub email: String,
    pub password: String,
    pub username: Option<String>,
}

/// Input for login
#[derive(Debug, Clone)]
pub struct LoginInput {
    pub username_or_email: String,
    pub password: String,
}

impl LoginInput {
    pub fn new(username_or_email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username_or_email: username_or_email.into(),
            password: password.into(),
        }
    }
}

/// User service for managing accounts and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    session_expiration_days: i64,
}

impl UserService {
    /// Create a new user service with the given repositories
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            session_expiration_days: DEFAULT_SESSION_EXPIRATION_DAYS,
        }
    }

    /// Register a new user.
    ///
    /// The first user in the system is assigned the Admin role; everyone
    /// after that registers as an Artist. When no username is supplied one
    /// is derived from the display name, suffixed with a counter until
    /// unique.
    pub async fn register(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        self.validate_register_input(&input)?;

        let email = input.email.trim().to_lowercase();

        if self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(UserServiceError::Conflict(
                "An account with this email already exists".to_string(),
            ));
        }

        let username = match &input.username {
            Some(username) => {
                let username = username.trim().to_lowercase();
                if self
                    .user_repo
                    .get_by_username(&username)
                    .await
                    .context("Failed to check username")?
                    .is_some()
                {
                    return Err(UserServiceError::Conflict(
                        "This username is already taken".to_string(),
                    ));
                }
                username
            }
            None => self.derive_username(&input.name).await?,
        };

        // First user becomes admin
        let role = if self.is_first_user().await? {
            UserRole::Admin
        } else {
            UserRole::Artist
        };

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;

        let user = User::new(
            username,
            email,
            password_hash,
            input.name.trim().to_string(),
            role,
        );

        let created = self
            .user_repo
            .create(&user)
            .await
            .context("Failed to create user")?;

        Ok(created)
    }

    /// Login with credentials, creating a session on success.
    pub async fn login(&self, input: LoginInput) -> Result<Session, UserServiceError> {
        let user = self
            .find_by_username_or_email(&input.username_or_email)
            .await?
            .ok_or_else(|| {
                UserServiceError::AuthenticationError(
                    "Invalid username or password".to_string(),
                )
            })?;

        let password_valid = verify_password(&input.password, &user.password_hash)
            .context("Failed to verify password")?;

        if !password_valid {
            return Err(UserServiceError::AuthenticationError(
                "Invalid username or password".to_string(),
            ));
        }

        self.create_session(user.id).await
    }

    /// Logout (invalidate session)
    pub async fn logout(&self, session_id: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(session_id)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// Create a new session for a user
    pub async fn create_session(&self, user_id: i64) -> Result<Session, UserServiceError> {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id,
            expires_at: now + Duration::days(self.session_expiration_days),
            created_at: now,
        };

        let created = self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;

        Ok(created)
    }

    /// Validate a session token, returning the logged-in user.
    ///
    /// Expired sessions are removed and treated as absent.
    pub async fn validate_session(
        &self,
        session_id: &str,
    ) -> Result<Option<User>, UserServiceError> {
        let session = self
            .session_repo
            .get_by_id(session_id)
            .await
            .context("Failed to get session")?;

        let Some(session) = session else {
            return Ok(None);
        };

        if session.is_expired() {
            self.session_repo
                .delete(session_id)
                .await
                .context("Failed to delete expired session")?;
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get session user")?;

        Ok(user)
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserServiceError> {
        Ok(self
            .user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user by ID")?)
    }

    /// Get user by username
    pub async fn get_by_username(
        &self,
        username: &str,
    ) -> Result<Option<User>, UserServiceError> {
        Ok(self
            .user_repo
            .get_by_username(&username.to_lowercase())
            .await
            .context("Failed to get user by username")?)
    }

    /// Update a user's profile fields
    pub async fn update_profile(
        &self,
        user_id: i64,
        input: UpdateProfileInput,
    ) -> Result<User, UserServiceError> {
        let mut user = self
            .user_repo
            .get_by_id(user_id)
            .await
            .context("Failed to get user")?
            .ok_or(UserServiceError::NotFound)?;

        if let Some(name) = input.name {
            let name = name.trim().to_string();
            if name.len() < 2 || name.len() > 100 {
                return Err(UserServiceError::ValidationError(
                    "Name must be between 2 and 100 characters".to_string(),
                ));
            }
            user.name = name;
        }
        if let Some(bio) = input.bio {
            if bio.len() > 500 {
                return Err(UserServiceError::ValidationError(
                    "Bio must be at most 500 characters".to_string(),
                ));
            }
            user.bio = (!bio.is_empty()).then_some(bio);
        }
        if let Some(website) = input.website {
            if !website.is_empty() && !WEBSITE_RE.is_match(&website) {
                return Err(UserServiceError::ValidationError(
                    "Website must be a valid URL starting with http:// or https://".to_string(),
                ));
            }
            user.website = (!website.is_empty()).then_some(website);
        }
        if let Some(location) = input.location {
            if location.len() > 100 {
                return Err(UserServiceError::ValidationError(
                    "Location must be at most 100 characters".to_string(),
                ));
            }
            user.location = (!location.is_empty()).then_some(location);
        }
        if let Some(avatar) = input.avatar {
            user.avatar = (!avatar.is_empty()).then_some(avatar);
        }

        Ok(self
            .user_repo
            .update(&user)
            .await
            .context("Failed to update profile")?)
    }

    /// Change password, verifying the current one first
    pub async fn change_password(
        &self,
        user_id: i64,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), UserServiceError> {
        let mut user = self
            .user_repo
            .get_by_id(user_id)
            .await
            .context("Failed to get user")?
            .ok_or(UserServiceError::NotFound)?;

        let valid = verify_password(current_password, &user.password_hash)
            .context("Failed to verify password")?;
        if !valid {
            return Err(UserServiceError::AuthenticationError(
                "Current password is incorrect".to_string(),
            ));
        }

        validate_password(new_password)?;

        user.password_hash =
            hash_password(new_password).context("Failed to hash password")?;
        self.user_repo
            .update(&user)
            .await
            .context("Failed to update password")?;

        Ok(())
    }

    /// Begin a password reset.
    ///
    /// Stores a digest of a fresh token on the account and returns the
    /// plaintext token for mailing. Returns `None` when no account matches
    /// the email; the caller answers identically either way to avoid
    /// account probing.
    pub async fn forgot_password(
        &self,
        email: &str,
    ) -> Result<Option<(User, String)>, UserServiceError> {
        let user = self
            .user_repo
            .get_by_email(&email.trim().to_lowercase())
            .await
            .context("Failed to get user by email")?;

        let Some(user) = user else {
            return Ok(None);
        };

        let token = Uuid::new_v4().simple().to_string();
        let expires_at = Utc::now() + Duration::minutes(RESET_TOKEN_EXPIRATION_MINUTES);

        self.user_repo
            .set_reset_token(user.id, &digest(&token), expires_at)
            .await
            .context("Failed to store reset token")?;

        Ok(Some((user, token)))
    }

    /// Complete a password reset: consume the token, set the new password,
    /// and invalidate every session of the account.
    pub async fn reset_password(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<(), UserServiceError> {
        let user = self
            .user_repo
            .get_by_reset_token(&digest(token))
            .await
            .context("Failed to look up reset token")?;

        let Some(mut user) = user else {
            return Err(UserServiceError::AuthenticationError(
                "Invalid or expired reset token".to_string(),
            ));
        };

        let live = user
            .reset_token_expires_at
            .map(|expires| expires > Utc::now())
            .unwrap_or(false);
        if !live {
            return Err(UserServiceError::AuthenticationError(
                "Invalid or expired reset token".to_string(),
            ));
        }

        validate_password(new_password)?;

        user.password_hash =
            hash_password(new_password).context("Failed to hash password")?;
        user.reset_token_hash = None;
        user.reset_token_expires_at = None;
        self.user_repo
            .update(&user)
            .await
            .context("Failed to update password")?;

        self.session_repo
            .delete_by_user(user.id)
            .await
            .context("Failed to invalidate sessions")?;

        Ok(())
    }

    /// Whether no users exist yet
    pub async fn is_first_user(&self) -> Result<bool, UserServiceError> {
        Ok(self.count().await? == 0)
    }

    /// Total number of registered users
    pub async fn count(&self) -> Result<i64, UserServiceError> {
        Ok(self
            .user_repo
            .count()
            .await
            .context("Failed to count users")?)
    }

    /// Remove expired sessions, returning the number dropped
    pub async fn sweep_sessions(&self) -> Result<i64, UserServiceError> {
        Ok(self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to sweep sessions")?)
    }

    async fn find_by_username_or_email(
        &self,
        identity: &str,
    ) -> Result<Option<User>, UserServiceError> {
        let identity = identity.trim().to_lowercase();
        if let Some(user) = self
            .user_repo
            .get_by_username(&identity)
            .await
            .context("Failed to check username")?
        {
            return Ok(Some(user));
        }
        Ok(self
            .user_repo
            .get_by_email(&identity)
            .await
            .context("Failed to check email")?)
    }

    /// Derive a unique username from the display name
    async fn derive_username(&self, name: &str) -> Result<String, UserServiceError> {
        let base: String = name
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .take(20)
            .collect();
        let base = if base.is_empty() {
            "artist".to_string()
        } else {
            base
        };

        let mut candidate = base.clone();
        let mut counter = 0;
        while self
            .user_repo
            .get_by_username(&candidate)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            counter += 1;
            candidate = format!("{}{}", base, counter);
        }
        Ok(candidate)
    }

    fn validate_register_input(&self, input: &RegisterInput) -> Result<(), UserServiceError> {
        let name = input.name.trim();
        if name.len() < 2 || name.len() > 100 {
            return Err(UserServiceError::ValidationError(
                "Name must be between 2 and 100 characters".to_string(),
            ));
        }

        if !EMAIL_RE.is_match(input.email.trim()) {
            return Err(UserServiceError::ValidationError(
                "Please enter a valid email address".to_string(),
            ));
        }

        validate_password(&input.password)?;

        if let Some(username) = &input.username {
            let username = username.trim();
            if username.len() < 3 || username.len() > 30 {
                return Err(UserServiceError::ValidationError(
                    "Username must be between 3 and 30 characters".to_string(),
                ));
            }
            if !USERNAME_RE.is_match(username) {
                return Err(UserServiceError::ValidationError(
                    "Username can only contain letters, numbers, and underscores".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Password policy: at least 8 characters with upper, lower, and digit
fn validate_password(password: &str) -> Result<(), UserServiceError> {
    if password.len() < 8 {
        return Err(UserServiceError::ValidationError(
            "Password must be at least 8 characters long".to_string(),
        ));
    }
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !(has_lower && has_upper && has_digit) {
        return Err(UserServiceError::ValidationError(
            "Password must contain at least one uppercase letter, one lowercase letter, and one number"
                .to_string(),
        ));
    }
    Ok(())
}

/// SHA-256 hex digest of a reset token
fn digest(token: &str) -> String {
    format!("{:x}", Sha256::digest(token.as_bytes()))
}
