// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Login, token and password endpoints.
//!
//! The OTP and password login routes are open; the rest need a bearer
//! token. A successful OTP verification creates the principal on first
//! login. Both login paths return the same token response.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::{
        guard::RequireAdmin,
        password::{hash_password, validate_new_password, verify_password},
        Auth, Authorized, Role,
    },
    error::ApiError,
    otp::{normalize_phone, OtpStatus, SentChallenge},
    state::AppState,
    storage::PrincipalRepository,
};

const INVALID_OTP_MESSAGE: &str = "Invalid or expired OTP";
const INVALID_CREDENTIALS_MESSAGE: &str = "Incorrect phone number or password";

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendOtpRequest {
    /// Phone number with country code, e.g. `+919177980938`
    pub phone_number: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyOtpRequest {
    pub phone_number: String,
    /// The 4 to 8 digit code delivered by SMS
    pub otp_code: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SendOtpResponse {
    pub status: String,
    pub message: String,
    /// Reference id returned by the SMS provider
    pub reference_id: String,
    pub expires_in_minutes: i64,
}

impl SendOtpResponse {
    fn new(message: &str, sent: SentChallenge, expires_in_minutes: i64) -> Self {
        Self {
            status: "success".to_string(),
            message: message.to_string(),
            reference_id: sent.reference_id,
            expires_in_minutes,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    /// Always `bearer`
    pub token_type: String,
    pub user_id: Uuid,
    pub phone_number: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub phone_number: String,
    pub password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    /// 6 to 100 characters
    pub new_password: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ResetPasswordRequest {
    pub phone_number: String,
    /// 6 to 100 characters
    pub new_password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// Response for GET /auth/me
#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub user_id: Uuid,
    pub phone_number: String,
    pub is_active: bool,
    /// Roles currently assigned, as seen through the role cache
    pub roles: Vec<Role>,
}

// ============================================================================
// Helpers
// ============================================================================

/// Run CPU-bound work (password hashing) off the async workers.
async fn run_blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work).await.map_err(|e| {
        tracing::error!(error = %e, "Blocking task failed");
        ApiError::internal("Internal server error")
    })
}

fn issue_token(
    state: &AppState,
    principal_id: Uuid,
    phone_number: String,
) -> Result<TokenResponse, ApiError> {
    let token = state.tokens.issue(&principal_id)?;
    Ok(TokenResponse {
        access_token: token.access_token,
        token_type: "bearer".to_string(),
        user_id: principal_id,
        phone_number,
    })
}

fn invalid_credentials() -> ApiError {
    ApiError::new(StatusCode::UNAUTHORIZED, INVALID_CREDENTIALS_MESSAGE)
}

// ============================================================================
// Handlers
// ============================================================================

/// Send a login code to a phone number.
#[utoipa::path(
    post,
    path = "/auth/send-otp",
    tag = "Auth",
    request_body = SendOtpRequest,
    responses(
        (status = 200, description = "Code sent", body = SendOtpResponse),
        (status = 422, description = "Invalid phone number"),
        (status = 429, description = "Rate limited"),
        (status = 502, description = "SMS gateway failure")
    )
)]
pub async fn send_otp(
    State(state): State<AppState>,
    Json(request): Json<SendOtpRequest>,
) -> Result<Json<SendOtpResponse>, ApiError> {
    let phone_number = normalize_phone(&request.phone_number)?;
    let sent = state.otp.send_challenge(&phone_number).await?;
    let expires_in = state.otp.settings().expiry.num_minutes();

    Ok(Json(SendOtpResponse::new("OTP sent successfully", sent, expires_in)))
}

/// Retire pending codes and send a fresh one. Subject to the same rate limit.
#[utoipa::path(
    post,
    path = "/auth/resend-otp",
    tag = "Auth",
    request_body = SendOtpRequest,
    responses(
        (status = 200, description = "Code resent", body = SendOtpResponse),
        (status = 422, description = "Invalid phone number"),
        (status = 429, description = "Rate limited"),
        (status = 502, description = "SMS gateway failure")
    )
)]
pub async fn resend_otp(
    State(state): State<AppState>,
    Json(request): Json<SendOtpRequest>,
) -> Result<Json<SendOtpResponse>, ApiError> {
    let phone_number = normalize_phone(&request.phone_number)?;
    let sent = state.otp.resend_challenge(&phone_number).await?;
    let expires_in = state.otp.settings().expiry.num_minutes();

    Ok(Json(SendOtpResponse::new("OTP resent successfully", sent, expires_in)))
}

/// Verify a code and exchange it for an access token.
///
/// Invalid, expired and exhausted codes all get the same 400 response.
#[utoipa::path(
    post,
    path = "/auth/verify-otp",
    tag = "Auth",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Verified, token issued", body = TokenResponse),
        (status = 400, description = "Invalid or expired OTP"),
        (status = 401, description = "Inactive user"),
        (status = 422, description = "Malformed phone number or code")
    )
)]
pub async fn verify_otp(
    State(state): State<AppState>,
    Json(request): Json<VerifyOtpRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let phone_number = normalize_phone(&request.phone_number)?;
    let code = request.otp_code.trim();
    if !(4..=8).contains(&code.len()) || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ApiError::unprocessable("OTP code must be 4 to 8 digits"));
    }

    if !state.otp.verify_challenge(&phone_number, code)? {
        return Err(ApiError::bad_request(INVALID_OTP_MESSAGE));
    }

    let principals = PrincipalRepository::new(&state.db);
    let principal = principals.find_or_create_by_phone(&phone_number)?;
    if !principal.is_active {
        return Err(ApiError::new(StatusCode::UNAUTHORIZED, "Inactive user"));
    }
    let principal = principals.record_login(&principal.id)?;

    info!(principal_id = %principal.id, "Principal logged in");
    Ok(Json(issue_token(&state, principal.id, principal.phone_number)?))
}

/// Log in with phone number and password.
///
/// Unknown numbers, principals without a password and wrong passwords all
/// get the same 401.
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 401, description = "Incorrect credentials or inactive user")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let phone_number = normalize_phone(&request.phone_number).map_err(|_| invalid_credentials())?;
    let principals = PrincipalRepository::new(&state.db);
    let principal = principals
        .get_by_phone(&phone_number)?
        .ok_or_else(invalid_credentials)?;
    let hashed = principal
        .hashed_password
        .clone()
        .ok_or_else(invalid_credentials)?;

    let password = request.password;
    if !run_blocking(move || verify_password(&password, &hashed)).await? {
        info!(principal_id = %principal.id, "Password login rejected");
        return Err(invalid_credentials());
    }
    if !principal.is_active {
        return Err(ApiError::new(StatusCode::UNAUTHORIZED, "Inactive user"));
    }

    let principal = principals.record_login(&principal.id)?;
    info!(principal_id = %principal.id, "Principal logged in with password");
    Ok(Json(issue_token(&state, principal.id, principal.phone_number)?))
}

/// Exchange a valid token for a fresh one.
#[utoipa::path(
    post,
    path = "/auth/refresh",
    tag = "Auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Token issued", body = TokenResponse),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    Auth(principal): Auth,
) -> Result<Json<TokenResponse>, ApiError> {
    Ok(Json(issue_token(
        &state,
        principal.principal_id,
        principal.phone_number,
    )?))
}

/// Change the caller's password. Requires the current one.
#[utoipa::path(
    post,
    path = "/auth/change-password",
    tag = "Auth",
    security(("bearer_auth" = [])),
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "No password set, or current password wrong"),
        (status = 401, description = "Missing or invalid token"),
        (status = 422, description = "New password length out of range")
    )
)]
pub async fn change_password(
    State(state): State<AppState>,
    Auth(principal): Auth,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    validate_new_password(&request.new_password)?;

    let principals = PrincipalRepository::new(&state.db);
    let stored = principals
        .get(&principal.principal_id)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    let hashed = stored
        .hashed_password
        .ok_or_else(|| ApiError::bad_request("User does not have a password set"))?;

    let ChangePasswordRequest {
        current_password,
        new_password,
    } = request;
    let new_hash = run_blocking(move || {
        if verify_password(&current_password, &hashed) {
            hash_password(&new_password).map(Some)
        } else {
            Ok(None)
        }
    })
    .await??
    .ok_or_else(|| ApiError::bad_request("Incorrect current password"))?;

    principals.set_password_hash(&principal.principal_id, new_hash)?;
    info!(principal_id = %principal.principal_id, "Password changed");
    Ok(Json(MessageResponse {
        message: "Password changed successfully".to_string(),
    }))
}

/// Set any principal's password. Admin only.
#[utoipa::path(
    post,
    path = "/auth/reset-password",
    tag = "Auth",
    security(("bearer_auth" = [])),
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 403, description = "Forbidden - admin role required"),
        (status = 404, description = "User not found"),
        (status = 422, description = "Invalid phone number or password length")
    )
)]
pub async fn reset_password(
    State(state): State<AppState>,
    admin: Authorized<RequireAdmin>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    validate_new_password(&request.new_password)?;
    let phone_number = normalize_phone(&request.phone_number)?;

    let principals = PrincipalRepository::new(&state.db);
    let target = principals
        .get_by_phone(&phone_number)?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let new_password = request.new_password;
    let new_hash = run_blocking(move || hash_password(&new_password)).await??;
    principals.set_password_hash(&target.id, new_hash)?;

    info!(
        admin_id = %admin.0.principal_id,
        principal_id = %target.id,
        "Password reset by admin"
    );
    Ok(Json(MessageResponse {
        message: "Password reset successfully".to_string(),
    }))
}

/// Pending challenge state for a phone number.
#[utoipa::path(
    get,
    path = "/auth/otp-status/{phone_number}",
    tag = "Auth",
    params(("phone_number" = String, Path, description = "Phone number with country code")),
    responses(
        (status = 200, description = "Challenge status", body = OtpStatus),
        (status = 422, description = "Invalid phone number")
    )
)]
pub async fn otp_status(
    State(state): State<AppState>,
    Path(phone_number): Path<String>,
) -> Result<Json<OtpStatus>, ApiError> {
    let phone_number = normalize_phone(&phone_number)?;
    Ok(Json(state.otp.status_of(&phone_number)?))
}

/// The calling principal and its roles.
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current principal", body = MeResponse),
        (status = 401, description = "Missing or invalid token")
    )
)]
pub async fn me(
    State(state): State<AppState>,
    Auth(principal): Auth,
) -> Result<Json<MeResponse>, ApiError> {
    let roles = state.authz.resolver().resolve_roles(&principal.principal_id)?;
    Ok(Json(MeResponse {
        user_id: principal.principal_id,
        phone_number: principal.phone_number,
        is_active: principal.is_active,
        roles,
    }))
}
