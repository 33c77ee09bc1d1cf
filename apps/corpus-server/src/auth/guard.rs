// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Reusable access guards for protected operations.
//!
//! An [`AccessGuard`] wraps an [`AccessRequirement`] and turns engine
//! decisions into [`AuthError`] rejections. Named policies implement
//! [`GuardPolicy`] so handlers can declare them in their extractor type:
//!
//! ```rust,ignore
//! async fn clear_cache(
//!     Authorized(admin, _): Authorized<RequireAdmin>,
//!     State(state): State<AppState>,
//! ) -> impl IntoResponse { /* ... */ }
//! ```
//!
//! ## Policy Catalogue
//!
//! Routes in this crate use `RequireAdmin` and `UsersRead`. The remaining
//! policies are for the business routers (records, categories, user
//! management) mounted on the same `AppState`.

use super::engine::{AccessRequirement, AuthorizationEngine};
use super::permissions::{Operation, Resource};
use super::{AuthError, AuthenticatedPrincipal, Role};

/// Predicate attached to one protected operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessGuard {
    requirement: AccessRequirement,
}

impl AccessGuard {
    /// Build a guard from optional role and permission requirements.
    pub fn new(roles: Option<&[Role]>, permission: Option<(Resource, Operation)>) -> Self {
        Self {
            requirement: AccessRequirement {
                roles: roles.map(<[Role]>::to_vec),
                permission,
            },
        }
    }

    /// Any active, authenticated principal.
    pub fn authenticated() -> Self {
        Self::default()
    }

    pub fn any_role(roles: &[Role]) -> Self {
        Self::new(Some(roles), None)
    }

    pub fn permission(resource: Resource, operation: Operation) -> Self {
        Self::new(None, Some((resource, operation)))
    }

    /// Roles OR permission.
    pub fn any_role_or_permission(roles: &[Role], resource: Resource, operation: Operation) -> Self {
        Self::new(Some(roles), Some((resource, operation)))
    }

    pub fn requirement(&self) -> &AccessRequirement {
        &self.requirement
    }

    /// Pass the principal through on allow; reject otherwise.
    pub fn check(
        &self,
        engine: &AuthorizationEngine,
        principal: AuthenticatedPrincipal,
    ) -> Result<AuthenticatedPrincipal, AuthError> {
        engine.decide(&principal, &self.requirement)?;
        Ok(principal)
    }
}

/// A named guard, usable as the type parameter of
/// [`Authorized`](super::extractor::Authorized).
pub trait GuardPolicy: Send + Sync + 'static {
    fn guard() -> AccessGuard;
}

macro_rules! guard_policy {
    ($(#[$meta:meta])* $name:ident => $guard:expr) => {
        $(#[$meta])*
        pub struct $name;

        impl GuardPolicy for $name {
            fn guard() -> AccessGuard {
                $guard
            }
        }
    };
}

guard_policy!(
    /// Authentication only.
    RequireAuthenticated => AccessGuard::authenticated()
);
guard_policy!(
    /// Admin role.
    RequireAdmin => AccessGuard::any_role(&[Role::Admin])
);
guard_policy!(
    /// Admin or reviewer role.
    RequireReviewer => AccessGuard::any_role(&[Role::Admin, Role::Reviewer])
);
guard_policy!(
    /// Any assigned role.
    RequireAnyRole => AccessGuard::any_role(&[Role::Admin, Role::Reviewer, Role::User])
);

guard_policy!(UsersRead => AccessGuard::permission(Resource::Users, Operation::Get));
guard_policy!(UsersCreate => AccessGuard::permission(Resource::Users, Operation::Post));
guard_policy!(UsersUpdate => AccessGuard::permission(Resource::Users, Operation::Put));
guard_policy!(UsersDelete => AccessGuard::permission(Resource::Users, Operation::Delete));

guard_policy!(RecordsRead => AccessGuard::permission(Resource::Records, Operation::Get));
guard_policy!(RecordsCreate => AccessGuard::permission(Resource::Records, Operation::Post));
guard_policy!(
    /// Reviewers by role, or anyone the matrix lets update records.
    RecordsReview => AccessGuard::any_role_or_permission(
        &[Role::Reviewer],
        Resource::Records,
        Operation::Put
    )
);
guard_policy!(RecordsDelete => AccessGuard::permission(Resource::Records, Operation::Delete));

guard_policy!(CategoriesRead => AccessGuard::permission(Resource::Categories, Operation::Get));
guard_policy!(CategoriesWrite => AccessGuard::permission(Resource::Categories, Operation::Post));

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::test_support::temp_database;
    use crate::storage::{PrincipalRepository, RoleRepository};
    use crate::auth::resolver::RoleResolver;
    use axum::http::StatusCode;
    use std::sync::Arc;

    fn setup(roles: &[Role]) -> (AuthorizationEngine, AuthenticatedPrincipal, tempfile::TempDir) {
        let (db, dir) = temp_database();
        let db = Arc::new(db);
        let stored = PrincipalRepository::new(&db)
            .find_or_create_by_phone("+919000000040")
            .unwrap();
        for role in roles {
            RoleRepository::new(&db).assign(&stored.id, *role).unwrap();
        }
        let engine = AuthorizationEngine::new(Arc::new(RoleResolver::new(db, 8)));
        let principal = AuthenticatedPrincipal {
            principal_id: stored.id,
            phone_number: stored.phone_number,
            is_active: true,
            expires_at: 0,
        };
        (engine, principal, dir)
    }

    #[test]
    fn allow_passes_principal_through_unchanged() {
        let (engine, principal, _dir) = setup(&[Role::Reviewer]);
        let passed = RequireReviewer::guard()
            .check(&engine, principal.clone())
            .unwrap();
        assert_eq!(passed, principal);
    }

    #[test]
    fn deny_maps_to_forbidden() {
        let (engine, principal, _dir) = setup(&[Role::User]);
        let err = RequireAdmin::guard().check(&engine, principal).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert!(err.to_string().contains("Required roles: [admin]"));
    }

    #[test]
    fn inactive_maps_to_unauthorized() {
        let (engine, mut principal, _dir) = setup(&[Role::Admin]);
        principal.is_active = false;
        let err = RequireAuthenticated::guard()
            .check(&engine, principal)
            .unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn any_role_rejects_principal_without_roles() {
        let (engine, principal, _dir) = setup(&[]);
        assert!(RequireAnyRole::guard().check(&engine, principal.clone()).is_err());
        assert!(RequireAuthenticated::guard().check(&engine, principal).is_ok());
    }

    #[test]
    fn users_guards_follow_matrix() {
        let (engine, principal, _dir) = setup(&[Role::Reviewer]);
        assert!(UsersRead::guard().check(&engine, principal.clone()).is_ok());
        assert!(UsersCreate::guard().check(&engine, principal.clone()).is_err());
        assert!(UsersUpdate::guard().check(&engine, principal.clone()).is_err());
        assert!(UsersDelete::guard().check(&engine, principal).is_err());
    }

    #[test]
    fn records_review_accepts_role_or_permission() {
        let (engine, user, _dir) = setup(&[Role::User]);
        // user holds records:PUT through the matrix
        assert!(RecordsReview::guard().check(&engine, user.clone()).is_ok());
        assert!(RecordsDelete::guard().check(&engine, user.clone()).is_err());
        assert!(CategoriesRead::guard().check(&engine, user.clone()).is_ok());
        assert!(CategoriesWrite::guard().check(&engine, user).is_err());
    }

    #[test]
    fn guard_new_builds_combined_requirement() {
        let guard = AccessGuard::new(Some(&[Role::Admin]), Some((Resource::Records, Operation::Get)));
        assert_eq!(guard.requirement().roles, Some(vec![Role::Admin]));
        assert_eq!(
            guard.requirement().permission,
            Some((Resource::Records, Operation::Get))
        );
        assert!(AccessGuard::authenticated().requirement().is_empty());
    }
}
