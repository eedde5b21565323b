//! Admin signup, login, and the bearer-token guard
//!
//! Tokens are issued by `login` and checked by [`require_admin`] on every
//! protected route. The guard stores the verified [`Claims`] in request
//! extensions for handlers that need the caller's id.

use axum::{
    extract::{rejection::JsonRejection, Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};
use serde::{Deserialize, Serialize};
use taskdesk_common::api::{self, Claims, MessageResponse};
use taskdesk_common::db;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

/// Signup request; every field is required
#[derive(Debug, Default, Deserialize)]
pub struct SignupRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub mobile: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub user_id: Uuid,
}

/// Non-blank value of an optional field
pub(crate) fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// Run bcrypt on the blocking pool
pub(crate) async fn hash_password_blocking(password: String) -> ApiResult<String> {
    tokio::task::spawn_blocking(move || api::hash_password(&password))
        .await
        .map_err(|e| ApiError::Internal(format!("Hash task failed: {}", e)))?
        .map_err(ApiError::from)
}

/// POST /api/auth/signup
pub async fn signup(
    State(state): State<AppState>,
    body: Result<Json<SignupRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    let req = body.map(|Json(req)| req).unwrap_or_default();

    let (Some(name), Some(email), Some(mobile), Some(password)) = (
        present(&req.name),
        present(&req.email),
        present(&req.mobile),
        present(&req.password),
    ) else {
        return Err(ApiError::BadRequest("All fields are required".to_string()));
    };

    if db::users::find_user_by_email(&state.db, email).await?.is_some() {
        return Err(ApiError::BadRequest("User already exists".to_string()));
    }

    let password_hash = hash_password_blocking(password.to_string()).await?;
    let user = db::users::create_user(&state.db, name, email, mobile, &password_hash)
        .await
        .map_err(|e| match e {
            taskdesk_common::Error::InvalidInput(_) => {
                ApiError::BadRequest("User already exists".to_string())
            }
            other => ApiError::from(other),
        })?;

    info!(user_id = %user.id, "Admin user created");
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("User created successfully")),
    ))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<LoginResponse>> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    let invalid = || ApiError::BadRequest("Invalid credentials".to_string());

    let (Some(email), Some(password)) = (req.email, req.password) else {
        return Err(invalid());
    };

    let user = db::users::find_user_by_email(&state.db, &email)
        .await?
        .ok_or_else(invalid)?;

    let stored_hash = user.password_hash.clone();
    let matches = tokio::task::spawn_blocking(move || api::verify_password(&password, &stored_hash))
        .await
        .map_err(|e| ApiError::Internal(format!("Verify task failed: {}", e)))?
        .unwrap_or(false);
    if !matches {
        debug!(user_id = %user.id, "Password mismatch");
        return Err(invalid());
    }

    let token = api::issue_token(user.id, &state.jwt_secret)?;
    info!(user_id = %user.id, "Admin logged in");

    Ok(Json(LoginResponse {
        token,
        user_id: user.id,
    }))
}

/// Second whitespace-separated part of the `Authorization` header
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .split_whitespace()
        .nth(1)
}

/// Admin guard for protected routes
///
/// - no token: 401 `No token, authorization denied`
/// - bad signature or expired: 401 `Token is not valid`
/// - role other than admin: 403 `Access denied: Admin only`
pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let token = bearer_token(request.headers())
        .ok_or_else(|| ApiError::Unauthorized("No token, authorization denied".to_string()))?;

    let claims: Claims = api::verify_token(token, &state.jwt_secret).map_err(|e| {
        debug!(error = %e, "Bearer token rejected");
        ApiError::Unauthorized("Token is not valid".to_string())
    })?;

    if !claims.is_admin() {
        return Err(ApiError::Forbidden("Access denied: Admin only".to_string()));
    }

    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}
