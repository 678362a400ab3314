//! Authentication API endpoints
//!
//! - POST /api/v1/auth/register - User registration
//! - POST /api/v1/auth/login - User login
//! - POST /api/v1/auth/logout - User logout
//! - GET /api/v1/auth/me - Get current user
//! - PUT /api/v1/auth/profile - Update profile
//! - PUT /api/v1/auth/password - Change password
//! - POST /api/v1/auth/forgot-password / reset-password - Reset flow

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{
    extract_ip, extract_session_token, ApiError, AppState, AuthenticatedUser,
};
use crate::models::UpdateProfileInput;
use crate::services::user::{LoginInput, RegisterInput};

/// Session cookie lifetime in seconds (7 days)
const SESSION_COOKIE_MAX_AGE: i64 = 7 * 24 * 60 * 60;

/// Request body for user registration
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub username: Option<String>,
}

/// Request body for user login
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username_or_email: String,
    pub password: String,
}

/// Request body for changing the password
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Request body for starting a password reset
#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

/// Request body for completing a password reset
#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

/// Response for successful authentication
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub token: String,
}

/// Response for user info
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub name: String,
    pub role: String,
    pub bio: Option<String>,
    pub website: Option<String>,
    pub location: Option<String>,
    pub avatar: String,
    pub created_at: String,
}

impl From<crate::models::User> for UserResponse {
    fn from(user: crate::models::User) -> Self {
        let avatar = user.avatar_or_gravatar();
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            name: user.name,
            role: user.role.to_string(),
            bio: user.bio,
            website: user.website,
            location: user.location,
            avatar,
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

/// Build protected auth routes (requires auth middleware)
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(get_current_user))
        .route("/profile", put(update_profile))
        .route("/password", put(change_password))
}

/// Build public auth routes (no auth required)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
}

fn session_cookie(token: &str, max_age: i64) -> HeaderMap {
    let cookie = format!(
        "session={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        token, max_age
    );
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        headers.insert(header::SET_COOKIE, value);
    }
    headers
}

/// POST /api/v1/auth/register - User registration
async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let input = RegisterInput {
        name: body.name,
        email: body.email,
        password: body.password,
        username: body.username,
    };

    let user = state.user_service.register(input).await?;

    // Log the new account in immediately
    let session = state.user_service.create_session(user.id).await?;
    let headers = session_cookie(&session.id, SESSION_COOKIE_MAX_AGE);

    Ok((
        StatusCode::CREATED,
        headers,
        Json(AuthResponse {
            user: user.into(),
            token: session.id,
        }),
    ))
}

/// POST /api/v1/auth/login - User login
async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let ip_address = extract_ip(&headers);

    // IP ceiling first, then the per-account lockout
    if let Some(ip) = ip_address.as_ref().and_then(|s| s.parse().ok()) {
        if state.rate_limiter.is_ip_limited(ip).await {
            return Err(ApiError::with_details(
                "RATE_LIMIT",
                "Too many requests. Please try again later.",
                serde_json::json!({"retry_after": 60}),
            ));
        }
        state.rate_limiter.record_ip_request(ip).await;
    }

    if state
        .rate_limiter
        .is_account_limited(&body.username_or_email)
        .await
    {
        return Err(ApiError::with_details(
            "RATE_LIMIT",
            "Too many failed attempts. Please try again in 15 minutes.",
            serde_json::json!({"retry_after": 900}),
        ));
    }

    let input = LoginInput::new(body.username_or_email.clone(), body.password);

    let session = match state.user_service.login(input).await {
        Ok(session) => session,
        Err(e) => {
            // Only actual credential failures count toward the lockout
            if matches!(
                e,
                crate::services::UserServiceError::AuthenticationError(_)
            ) {
                state
                    .rate_limiter
                    .record_failure(&body.username_or_email)
                    .await;
            }
            return Err(e.into());
        }
    };

    state
        .rate_limiter
        .clear_failures(&body.username_or_email)
        .await;

    let user = state
        .user_service
        .validate_session(&session.id)
        .await?
        .ok_or_else(|| ApiError::internal_error("Session validation failed"))?;

    let cookie_headers = session_cookie(&session.id, SESSION_COOKIE_MAX_AGE);

    Ok((
        StatusCode::OK,
        cookie_headers,
        Json(AuthResponse {
            user: user.into(),
            token: session.id,
        }),
    ))
}

/// POST /api/v1/auth/logout - User logout
async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    _user: AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = extract_session_token(&headers) {
        state.user_service.logout(&token).await?;
    }

    // Expire the cookie
    let headers = session_cookie("", 0);
    Ok((StatusCode::OK, headers, Json(serde_json::json!({"success": true}))))
}

/// GET /api/v1/auth/me - Get current user
async fn get_current_user(user: AuthenticatedUser) -> Json<UserResponse> {
    Json(user.0.into())
}

/// PUT /api/v1/auth/profile - Update profile
async fn update_profile(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<UpdateProfileInput>,
) -> Result<Json<UserResponse>, ApiError> {
    let updated = state.user_service.update_profile(user.0.id, body).await?;
    Ok(Json(updated.into()))
}

/// PUT /api/v1/auth/password - Change password
async fn change_password(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .user_service
        .change_password(user.0.id, &body.current_password, &body.new_password)
        .await?;
    Ok(Json(serde_json::json!({"success": true})))
}

/// POST /api/v1/auth/forgot-password - Begin a password reset
///
/// Always answers 200 so the endpoint cannot be used to probe which
/// emails have accounts.
async fn forgot_password(
    State(state): State<AppState>,
    Json(body): Json<ForgotPasswordRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if let Some((user, token)) = state.user_service.forgot_password(&body.email).await? {
        let email_service = state.email_service.clone();
        tokio::spawn(async move {
            if let Err(e) = email_service
                .send_password_reset(&user.email, &user.name, &token)
                .await
            {
                tracing::warn!(error = %e, "failed to send password-reset email");
            }
        });
    }

    Ok(Json(serde_json::json!({
        "message": "If an account exists for that email, a reset link has been sent."
    })))
}

/// POST /api/v1/auth/reset-password - Complete a password reset
async fn reset_password(
    State(state): State<AppState>,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .user_service
        .reset_password(&body.token, &body.password)
        .await?;
    Ok(Json(serde_json::json!({"success": true})))
}
