// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authorization decisions.
//!
//! ## Decision Order
//!
//! 1. An inactive principal is denied before anything else.
//! 2. The principal's roles are resolved (cache or store).
//! 3. An empty requirement allows.
//! 4. The role branch matches when the principal holds any required role.
//! 5. The permission branch matches when any held role is granted the
//!    operation on the resource by the permission matrix.
//! 6. Either branch matching allows. Otherwise the request is denied.
//!
//! There is no implicit admin bypass of the role branch.

use std::fmt;
use std::sync::Arc;

use super::permissions::{Operation, PermissionMatrix, Resource, PERMISSION_MATRIX};
use super::resolver::RoleResolver;
use super::{AuthenticatedPrincipal, Role};
use crate::storage::StoreError;

/// What a protected operation requires.
///
/// `roles: Some(vec![])` is a role requirement nobody can meet; only the
/// permission branch can then allow.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessRequirement {
    pub roles: Option<Vec<Role>>,
    pub permission: Option<(Resource, Operation)>,
}

impl AccessRequirement {
    /// Authentication only.
    pub fn authenticated() -> Self {
        Self::default()
    }

    pub fn any_role(roles: &[Role]) -> Self {
        Self {
            roles: Some(roles.to_vec()),
            permission: None,
        }
    }

    pub fn permission(resource: Resource, operation: Operation) -> Self {
        Self {
            roles: None,
            permission: Some((resource, operation)),
        }
    }

    /// Add a permission alternative to a role requirement.
    pub fn or_permission(mut self, resource: Resource, operation: Operation) -> Self {
        self.permission = Some((resource, operation));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_none() && self.permission.is_none()
    }
}

/// Why a denied principal was denied.
///
/// Only names what was required and the principal's own roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenyReason {
    pub required_roles: Option<Vec<Role>>,
    pub required_permission: Option<(Resource, Operation)>,
    pub actual_roles: Vec<Role>,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Access denied.")?;
        if let Some(roles) = &self.required_roles {
            write!(f, " Required roles: {}.", format_roles(roles))?;
        }
        if let Some((resource, operation)) = &self.required_permission {
            write!(f, " Required permission: {resource}:{operation}.")?;
        }
        write!(f, " Your roles: {}", format_roles(&self.actual_roles))
    }
}

fn format_roles(roles: &[Role]) -> String {
    let names: Vec<&str> = roles.iter().map(Role::as_str).collect();
    format!("[{}]", names.join(", "))
}

/// Authorization failure.
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    #[error("Account is inactive")]
    InactiveAccount,

    #[error("{0}")]
    Denied(DenyReason),

    #[error("Role lookup failed: {0}")]
    RoleLookup(#[from] StoreError),
}

/// Evaluates access requirements against resolved roles and the matrix.
pub struct AuthorizationEngine {
    resolver: Arc<RoleResolver>,
    matrix: &'static PermissionMatrix,
}

impl AuthorizationEngine {
    pub fn new(resolver: Arc<RoleResolver>) -> Self {
        Self {
            resolver,
            matrix: &PERMISSION_MATRIX,
        }
    }

    pub fn resolver(&self) -> &RoleResolver {
        &self.resolver
    }

    pub fn matrix(&self) -> &PermissionMatrix {
        self.matrix
    }

    /// Decide whether `principal` satisfies `requirement`.
    pub fn decide(
        &self,
        principal: &AuthenticatedPrincipal,
        requirement: &AccessRequirement,
    ) -> Result<(), AuthzError> {
        if !principal.is_active {
            tracing::info!(principal_id = %principal.principal_id, "Access denied: inactive account");
            return Err(AuthzError::InactiveAccount);
        }

        let roles = self.resolver.resolve_roles(&principal.principal_id)?;

        if requirement.is_empty() {
            return Ok(());
        }

        let role_match = requirement
            .roles
            .as_ref()
            .is_some_and(|required| roles.iter().any(|role| required.contains(role)));

        let permission_match = requirement
            .permission
            .is_some_and(|(resource, operation)| {
                self.matrix.any_allows(&roles, resource, operation)
            });

        if role_match || permission_match {
            tracing::debug!(
                principal_id = %principal.principal_id,
                role_match,
                permission_match,
                "Access allowed"
            );
            return Ok(());
        }

        let reason = DenyReason {
            required_roles: requirement.roles.clone(),
            required_permission: requirement.permission,
            actual_roles: roles,
        };
        tracing::info!(
            principal_id = %principal.principal_id,
            reason = %reason,
            "Access denied"
        );
        Err(AuthzError::Denied(reason))
    }
}
