// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Admin-only RBAC introspection and cache control.

use std::collections::BTreeMap;

use axum::{extract::State, Json};
use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;

use crate::{
    auth::{guard::RequireAdmin, Authorized, CacheStats, Operation, Resource, Role},
    state::AppState,
};

/// Shape of the permission matrix as exposed to admins.
#[derive(Debug, Serialize, ToSchema)]
pub struct MatrixSummary {
    pub role_count: usize,
    /// Total (role, resource, operation) grants
    pub grant_count: usize,
    /// role → resource → operations
    #[schema(value_type = Object)]
    pub grants: BTreeMap<Role, BTreeMap<Resource, Vec<Operation>>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RbacStatusResponse {
    pub status: String,
    pub cache_stats: CacheStats,
    pub roles: Vec<Role>,
    pub permission_matrix: MatrixSummary,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ClearCacheResponse {
    pub message: String,
    pub cache_before: CacheStats,
    pub cache_after: CacheStats,
}

/// Role cache statistics and the permission matrix.
#[utoipa::path(
    get,
    path = "/system/rbac/status",
    tag = "System",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "RBAC status", body = RbacStatusResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin role required")
    )
)]
pub async fn rbac_status(
    State(state): State<AppState>,
    _admin: Authorized<RequireAdmin>,
) -> Json<RbacStatusResponse> {
    let matrix = state.authz.matrix();
    Json(RbacStatusResponse {
        status: "active".to_string(),
        cache_stats: state.authz.resolver().stats(),
        roles: Role::ALL.to_vec(),
        permission_matrix: MatrixSummary {
            role_count: matrix.role_count(),
            grant_count: matrix.grant_count(),
            grants: matrix.summary(),
        },
    })
}

/// Drop every cached role list.
///
/// Role changes made directly in the store are not visible until this runs.
#[utoipa::path(
    post,
    path = "/system/rbac/clear-cache",
    tag = "System",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Cache cleared", body = ClearCacheResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden - admin role required")
    )
)]
pub async fn clear_rbac_cache(
    State(state): State<AppState>,
    admin: Authorized<RequireAdmin>,
) -> Json<ClearCacheResponse> {
    let resolver = state.authz.resolver();
    let cache_before = resolver.stats();
    resolver.clear_cache();
    let cache_after = resolver.stats();

    info!(
        admin_id = %admin.0.principal_id,
        cleared = cache_before.size,
        "RBAC cache cleared"
    );

    Json(ClearCacheResponse {
        message: "RBAC cache cleared successfully".to_string(),
        cache_before,
        cache_after,
    })
}
