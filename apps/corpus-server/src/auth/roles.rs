// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Principal roles for authorization.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Roles a principal can be assigned.
///
/// ## Role Set
///
/// - `Admin` - Full access through the permission matrix
/// - `User` - Contributor; creates and edits records
/// - `Reviewer` - Reviews records, reads users and categories
///
/// There is no implicit hierarchy: an admin does not satisfy a check that
/// requires `reviewer` by name. Broad admin access comes from the
/// permission matrix only.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Full administrative access
    Admin,
    /// Regular contributor
    User,
    /// Record reviewer
    Reviewer,
}

impl Role {
    /// Every role, in id order.
    pub const ALL: [Role; 3] = [Role::Admin, Role::User, Role::Reviewer];

    /// Stable numeric id used as the `roles` table key.
    pub fn id(&self) -> u64 {
        match self {
            Role::Admin => 1,
            Role::User => 2,
            Role::Reviewer => 3,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Role::Admin => "Administrator with full access to users, records and categories",
            Role::User => "Contributor who uploads and edits their own records",
            Role::Reviewer => "Reviewer who reads and updates submitted records",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
            Role::Reviewer => "reviewer",
        }
    }
}

/// Error returned when parsing an unknown role name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role: {0}")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    /// Parse role from string (case-insensitive).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            "reviewer" => Ok(Role::Reviewer),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
