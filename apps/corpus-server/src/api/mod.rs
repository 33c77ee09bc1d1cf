// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::{CacheStats, Role},
    otp::OtpStatus,
    state::AppState,
    storage::StoredRole,
};

pub mod auth;
pub mod health;
pub mod system;
pub mod users;

pub fn router(state: AppState) -> Router {
    let routes = Router::new()
        .route("/health/live", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .route("/auth/send-otp", post(auth::send_otp))
        .route("/auth/verify-otp", post(auth::verify_otp))
        .route("/auth/resend-otp", post(auth::resend_otp))
        .route("/auth/otp-status/{phone_number}", get(auth::otp_status))
        .route("/auth/me", get(auth::me))
        .route("/auth/login", post(auth::login))
        .route("/auth/refresh", post(auth::refresh))
        .route("/auth/change-password", post(auth::change_password))
        .route("/auth/reset-password", post(auth::reset_password))
        .route("/system/rbac/status", get(system::rbac_status))
        .route("/system/rbac/clear-cache", post(system::clear_rbac_cache))
        .route("/roles", get(users::list_roles))
        .route("/users/{user_id}/roles", get(users::get_user_roles))
        .route(
            "/users/{user_id}/roles/{role}",
            put(users::assign_role).delete(users::revoke_role),
        )
        .with_state(state);

    Router::new()
        .merge(routes)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::liveness,
        health::readiness,
        auth::send_otp,
        auth::verify_otp,
        auth::resend_otp,
        auth::otp_status,
        auth::me,
        auth::login,
        auth::refresh,
        auth::change_password,
        auth::reset_password,
        system::rbac_status,
        system::clear_rbac_cache,
        users::list_roles,
        users::get_user_roles,
        users::assign_role,
        users::revoke_role
    ),
    components(
        schemas(
            Role,
            StoredRole,
            CacheStats,
            OtpStatus,
            health::HealthResponse,
            health::ReadyResponse,
            health::HealthChecks,
            auth::SendOtpRequest,
            auth::VerifyOtpRequest,
            auth::SendOtpResponse,
            auth::TokenResponse,
            auth::MeResponse,
            auth::LoginRequest,
            auth::ChangePasswordRequest,
            auth::ResetPasswordRequest,
            auth::MessageResponse,
            system::MatrixSummary,
            system::RbacStatusResponse,
            system::ClearCacheResponse,
            users::UserRolesResponse,
            users::RoleListResponse
        )
    ),
    tags(
        (name = "Health", description = "Liveness and readiness checks"),
        (name = "Auth", description = "OTP and password login, token issuance"),
        (name = "System", description = "RBAC status and cache control (admin)"),
        (name = "Roles", description = "Role reference data and assignments")
    )
)]
struct ApiDoc;
