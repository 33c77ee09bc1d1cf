// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Role reference data and per-user role administration.
//!
//! Assignment changes clear the role cache once they are committed, so
//! the next authorization decision sees them.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    auth::{
        guard::{RequireAdmin, UsersRead},
        Authorized, Role,
    },
    error::ApiError,
    state::AppState,
    storage::{PrincipalRepository, RoleRepository, StoredRole},
};

#[derive(Debug, Serialize, ToSchema)]
pub struct UserRolesResponse {
    pub user_id: Uuid,
    pub roles: Vec<Role>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoleListResponse {
    pub roles: Vec<StoredRole>,
}

fn parse_role(role: &str) -> Result<Role, ApiError> {
    role.parse()
        .map_err(|e: crate::auth::roles::UnknownRole| ApiError::unprocessable(e.to_string()))
}

fn require_principal(state: &AppState, user_id: &Uuid) -> Result<(), ApiError> {
    match PrincipalRepository::new(&state.db).get(user_id)? {
        Some(_) => Ok(()),
        None => Err(ApiError::not_found("User not found")),
    }
}

/// List every role with its id and description.
#[utoipa::path(
    get,
    path = "/roles",
    tag = "Roles",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "All roles", body = RoleListResponse),
        (status = 403, description = "Forbidden - admin role required")
    )
)]
pub async fn list_roles(
    State(state): State<AppState>,
    _admin: Authorized<RequireAdmin>,
) -> Result<Json<RoleListResponse>, ApiError> {
    let roles = RoleRepository::new(&state.db).list()?;
    Ok(Json(RoleListResponse { roles }))
}

/// Roles assigned to a user, read from the store.
#[utoipa::path(
    get,
    path = "/users/{user_id}/roles",
    tag = "Roles",
    security(("bearer_auth" = [])),
    params(("user_id" = Uuid, Path, description = "Principal id")),
    responses(
        (status = 200, description = "Assigned roles", body = UserRolesResponse),
        (status = 403, description = "Forbidden - users:GET required"),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user_roles(
    State(state): State<AppState>,
    _caller: Authorized<UsersRead>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserRolesResponse>, ApiError> {
    require_principal(&state, &user_id)?;
    let roles = RoleRepository::new(&state.db).roles_for(&user_id)?;
    Ok(Json(UserRolesResponse { user_id, roles }))
}

/// Assign a role. Assigning a role the user already holds is a no-op.
#[utoipa::path(
    put,
    path = "/users/{user_id}/roles/{role}",
    tag = "Roles",
    security(("bearer_auth" = [])),
    params(
        ("user_id" = Uuid, Path, description = "Principal id"),
        ("role" = String, Path, description = "Role name (admin, user, reviewer)")
    ),
    responses(
        (status = 200, description = "Updated role list", body = UserRolesResponse),
        (status = 403, description = "Forbidden - admin role required"),
        (status = 404, description = "User not found"),
        (status = 422, description = "Unknown role")
    )
)]
pub async fn assign_role(
    State(state): State<AppState>,
    admin: Authorized<RequireAdmin>,
    Path((user_id, role)): Path<(Uuid, String)>,
) -> Result<Json<UserRolesResponse>, ApiError> {
    let role = parse_role(&role)?;
    let repo = RoleRepository::new(&state.db);
    if repo.assign(&user_id, role)? {
        state.authz.resolver().clear_cache();
        info!(
            admin_id = %admin.0.principal_id,
            user_id = %user_id,
            role = %role,
            "Role assigned"
        );
    }

    let roles = repo.roles_for(&user_id)?;
    Ok(Json(UserRolesResponse { user_id, roles }))
}

/// Revoke a role. Revoking a role the user does not hold is a no-op.
#[utoipa::path(
    delete,
    path = "/users/{user_id}/roles/{role}",
    tag = "Roles",
    security(("bearer_auth" = [])),
    params(
        ("user_id" = Uuid, Path, description = "Principal id"),
        ("role" = String, Path, description = "Role name (admin, user, reviewer)")
    ),
    responses(
        (status = 200, description = "Updated role list", body = UserRolesResponse),
        (status = 403, description = "Forbidden - admin role required"),
        (status = 404, description = "User not found"),
        (status = 422, description = "Unknown role")
    )
)]
pub async fn revoke_role(
    State(state): State<AppState>,
    admin: Authorized<RequireAdmin>,
    Path((user_id, role)): Path<(Uuid, String)>,
) -> Result<Json<UserRolesResponse>, ApiError> {
    let role = parse_role(&role)?;
    require_principal(&state, &user_id)?;

    let repo = RoleRepository::new(&state.db);
    if repo.revoke(&user_id, role)? {
        state.authz.resolver().clear_cache();
        info!(
            admin_id = %admin.0.principal_id,
            user_id = %user_id,
            role = %role,
            "Role revoked"
        );
    }

    let roles = repo.roles_for(&user_id)?;
    Ok(Json(UserRolesResponse { user_id, roles }))
}
